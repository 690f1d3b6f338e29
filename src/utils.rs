use chrono::{DateTime, Local};
use regex::Regex;
use std::sync::LazyLock;

// Constant pattern; compiling it cannot fail.
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("valid file name pattern"));

/// Story ids end up in file names; anything outside `[A-Za-z0-9_-]` becomes `_`.
pub fn sanitize_id(id: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(id.trim(), "_");
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "story".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn timestamp(at: DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

pub fn video_file_name(story_id: &str, stamp: &str) -> String {
    format!("reddit_story_{}_{}.mp4", sanitize_id(story_id), stamp)
}

pub fn thumbnail_file_name(story_id: &str, stamp: &str) -> String {
    format!("thumb_{}_{}.jpg", sanitize_id(story_id), stamp)
}
