//! Per-segment caption layers and the persistent subreddit badge.
//!
//! Styling is a table lookup on `(segment type, voice)`. Text is wrapped to a
//! per-role character width and clipped to [`MAX_CAPTION_LINES`]. Each line is
//! drawn by its own `drawtext` filter so lines stay individually centered.

use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::VideoAssemblyConfig;
use crate::ffmpeg::{escape_filter_value, window_expr};
use crate::script::{ScriptSegment, SegmentType, Voice};
use crate::timeline::TimelineEntry;

pub const MAX_CAPTION_LINES: usize = 8;
const ELLIPSIS: &str = "...";
const LINE_SPACING: f64 = 1.25;
const LOWER_THIRD: f64 = 0.75;
const BADGE_ORIGIN: (u32, u32) = (20, 20);
const BADGE_PADDING: u32 = 10;
const FALLBACK_FONT_FAMILY: &str = "Sans";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionRole {
    Title,
    Story,
    Commentary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionPosition {
    Center,
    LowerThird,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionColor {
    Text,
    Accent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptionStyle {
    pub role: CaptionRole,
    pub color: CaptionColor,
    pub position: CaptionPosition,
    /// Characters per line before wrapping.
    pub wrap_width: usize,
}

const TITLE_STYLE: CaptionStyle = CaptionStyle {
    role: CaptionRole::Title,
    color: CaptionColor::Text,
    position: CaptionPosition::Center,
    wrap_width: 30,
};

const COMMENTARY_STYLE: CaptionStyle = CaptionStyle {
    role: CaptionRole::Commentary,
    color: CaptionColor::Accent,
    position: CaptionPosition::LowerThird,
    wrap_width: 35,
};

const STORY_STYLE: CaptionStyle = CaptionStyle {
    role: CaptionRole::Story,
    color: CaptionColor::Text,
    position: CaptionPosition::Center,
    wrap_width: 35,
};

impl CaptionStyle {
    pub fn lookup(kind: SegmentType, voice: Voice) -> CaptionStyle {
        match (kind, voice) {
            (SegmentType::Intro | SegmentType::Outro, _) => TITLE_STYLE,
            (_, Voice::Commentator) => COMMENTARY_STYLE,
            (_, Voice::Narrator) => STORY_STYLE,
        }
    }

    pub fn font_size(&self, config: &VideoAssemblyConfig) -> u32 {
        match self.role {
            CaptionRole::Title => config.title_font_size,
            CaptionRole::Story => config.story_font_size,
            CaptionRole::Commentary => config.commentary_font_size,
        }
    }

    pub fn color<'a>(&self, config: &'a VideoAssemblyConfig) -> &'a str {
        match self.color {
            CaptionColor::Text => &config.text_color,
            CaptionColor::Accent => &config.accent_color,
        }
    }
}

/// Greedy word wrap; words longer than `width` are split across lines.
pub fn wrap_text(s: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in s.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }
        if current_len > 0 && current_len + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Wrap, then keep at most `max_lines`, marking the cut with an ellipsis.
pub fn layout_lines(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let mut lines = wrap_text(text, width);
    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            last.push_str(ELLIPSIS);
        }
    }
    lines
}

/// Font handed to `drawtext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    File(PathBuf),
    Family(String),
}

impl FontSource {
    /// Paths that do not exist fall back to a generic family instead of failing.
    pub fn resolve(font: &str) -> FontSource {
        let lower = font.to_ascii_lowercase();
        let looks_like_path = font.contains('/')
            || font.contains('\\')
            || [".ttf", ".otf", ".ttc"].iter().any(|ext| lower.ends_with(ext));
        if !looks_like_path {
            return FontSource::Family(font.to_string());
        }
        if Path::new(font).is_file() {
            FontSource::File(PathBuf::from(font))
        } else {
            warn!(
                "Font file {} not found; falling back to '{}'",
                font, FALLBACK_FONT_FAMILY
            );
            FontSource::Family(FALLBACK_FONT_FAMILY.to_string())
        }
    }

    fn option(&self) -> String {
        match self {
            FontSource::File(path) => {
                format!("fontfile={}", escape_filter_value(&path.to_string_lossy()))
            }
            FontSource::Family(name) => format!("font={}", escape_filter_value(name)),
        }
    }
}

/// One `drawtext` invocation reading its text from a staged file.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawText<'a> {
    pub textfile: &'a Path,
    pub font: &'a FontSource,
    pub font_size: u32,
    pub color: &'a str,
    pub stroke: Option<(&'a str, u32)>,
    pub boxed: Option<(&'a str, u32)>,
    pub x: String,
    pub y: String,
    pub enable: Option<String>,
}

impl DrawText<'_> {
    pub fn filter(&self) -> String {
        let mut opts = vec![
            self.font.option(),
            format!(
                "textfile={}",
                escape_filter_value(&self.textfile.to_string_lossy())
            ),
            "expansion=none".to_string(),
            format!("fontsize={}", self.font_size),
            format!("fontcolor={}", self.color),
        ];
        if let Some((color, width)) = self.stroke {
            opts.push(format!("borderw={}", width));
            opts.push(format!("bordercolor={}", color));
        }
        if let Some((color, padding)) = self.boxed {
            opts.push("box=1".to_string());
            opts.push(format!("boxcolor={}", color));
            opts.push(format!("boxborderw={}", padding));
        }
        opts.push(format!("x={}", self.x));
        opts.push(format!("y={}", self.y));
        if let Some(enable) = &self.enable {
            opts.push(format!("enable={}", enable));
        }
        format!("drawtext={}", opts.join(":"))
    }
}

/// Horizontally centered expression for `drawtext`.
pub const CENTER_X: &str = "(w-text_w)/2";

/// Top of each line for a block of `count` lines.
pub fn line_tops(
    count: usize,
    font_size: u32,
    position: CaptionPosition,
    frame_height: u32,
) -> Vec<u32> {
    let line_height = (font_size as f64 * LINE_SPACING).round() as u32;
    let block = line_height * count as u32;
    let top = match position {
        CaptionPosition::Center => frame_height.saturating_sub(block) / 2,
        CaptionPosition::LowerThird => (frame_height as f64 * LOWER_THIRD).round() as u32,
    };
    (0..count as u32).map(|i| top + i * line_height).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayer {
    pub segment_index: usize,
    pub style: CaptionStyle,
    pub lines: Vec<String>,
    pub start: f64,
    pub end: f64,
}

impl CaptionLayer {
    pub fn for_segment(segment: &ScriptSegment, entry: &TimelineEntry) -> Self {
        let style = CaptionStyle::lookup(segment.kind, segment.voice);
        Self {
            segment_index: entry.segment_index,
            style,
            lines: layout_lines(segment.display_text(), style.wrap_width, MAX_CAPTION_LINES),
            start: entry.start,
            end: entry.end(),
        }
    }

    /// `drawtext` filters for this caption, one per line; `textfiles[i]` holds
    /// `lines[i]`.
    pub fn filters(
        &self,
        textfiles: &[PathBuf],
        font: &FontSource,
        config: &VideoAssemblyConfig,
    ) -> Vec<String> {
        let font_size = self.style.font_size(config);
        let tops = line_tops(self.lines.len(), font_size, self.style.position, config.height);
        let enable = window_expr(self.start, self.end);
        textfiles
            .iter()
            .zip(tops)
            .map(|(file, top)| {
                DrawText {
                    textfile: file,
                    font,
                    font_size,
                    color: self.style.color(config),
                    stroke: Some((config.stroke_color.as_str(), config.stroke_width)),
                    boxed: None,
                    x: CENTER_X.to_string(),
                    y: top.to_string(),
                    enable: Some(enable.clone()),
                }
                .filter()
            })
            .collect()
    }
}

/// `r/<subreddit>` chip in the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub text: String,
    pub font_size: u32,
    pub origin: (u32, u32),
}

impl Badge {
    pub fn new(subreddit: &str, font_size: u32) -> Self {
        Self::at(subreddit, font_size, BADGE_ORIGIN)
    }

    pub fn at(subreddit: &str, font_size: u32, origin: (u32, u32)) -> Self {
        let name = subreddit.trim().trim_start_matches("r/");
        Self {
            text: format!("r/{}", name),
            font_size,
            origin,
        }
    }

    /// No `enable`: the badge spans the whole video.
    pub fn filter(&self, textfile: &Path, font: &FontSource, config: &VideoAssemblyConfig) -> String {
        DrawText {
            textfile,
            font,
            font_size: self.font_size,
            color: "white",
            stroke: None,
            boxed: Some((config.badge_color.as_str(), BADGE_PADDING)),
            x: (self.origin.0 + BADGE_PADDING).to_string(),
            y: (self.origin.1 + BADGE_PADDING).to_string(),
            enable: None,
        }
        .filter()
    }
}
