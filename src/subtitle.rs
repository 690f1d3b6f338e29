use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

use crate::captions::CaptionLayer;

#[derive(Debug, Clone, PartialEq)]
pub struct SrtEntry {
    pub start: f64,
    pub end: f64,
    pub lines: Vec<String>,
}

/// One cue per caption, carrying the same wrapped lines and window as the
/// burned-in text.
pub fn build_srt_entries(captions: &[CaptionLayer]) -> Vec<SrtEntry> {
    captions
        .iter()
        .filter(|c| !c.lines.is_empty())
        .map(|c| SrtEntry {
            start: c.start,
            end: c.end,
            lines: c.lines.clone(),
        })
        .collect()
}

pub fn render_srt(entries: &[SrtEntry]) -> String {
    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        out.push_str(&format!("{}\n", i + 1));
        out.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(entry.start),
            format_srt_time(entry.end)
        ));
        for line in &entry.lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// Write next to the destination and rename into place.
pub fn write_srt(path: &Path, entries: &[SrtEntry]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;
    let mut f = NamedTempFile::new_in(parent)?;
    f.write_all(render_srt(entries).as_bytes())?;
    f.persist(path)?;
    info!("Wrote {} subtitle cues to {}", entries.len(), path.display());
    Ok(())
}

fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_sec = total_ms / 1000;
    let s = total_sec % 60;
    let total_min = total_sec / 60;
    let m = total_min % 60;
    let h = total_min / 60;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}
