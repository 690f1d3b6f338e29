use serde::Deserialize;
use std::ffi::OsString;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::ffmpeg::{self, FfmpegError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    /// Display size of the first video stream, if any.
    pub dimensions: Option<(u32, u32)>,
    pub duration: f64,
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error(transparent)]
    Tool(#[from] FfmpegError),

    #[error("unreadable ffprobe output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no usable duration reported")]
    NoDuration,
}

/// Inspects media files. Assembly only depends on this seam, so planning can be
/// exercised without ffprobe installed.
pub trait MediaProbe {
    fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError>;
}

pub struct Ffprobe {
    bin: String,
}

impl Ffprobe {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl MediaProbe for Ffprobe {
    fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-print_format".into(),
            "json".into(),
            "-show_format".into(),
            "-show_streams".into(),
            path.as_os_str().to_owned(),
        ];
        let stdout = ffmpeg::run(&self.bin, &args)?;
        let info = parse_probe_output(&stdout)?;
        debug!(
            "Probed {}: {:?}, {:.2}s",
            path.display(),
            info.dimensions,
            info.duration
        );
        Ok(info)
    }
}

fn parse_probe_output(raw: &[u8]) -> Result<MediaInfo, ProbeError> {
    let parsed: ProbeOutput = serde_json::from_slice(raw)?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    let dimensions = video.and_then(|s| Some((s.width?, s.height?)));

    // Container duration first; some muxers only report it per stream.
    let duration = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or_else(|| video.and_then(|s| s.duration.as_deref()))
        .or_else(|| parsed.streams.iter().find_map(|s| s.duration.as_deref()))
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or(ProbeError::NoDuration)?;

    Ok(MediaInfo {
        dimensions,
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_video_dimensions_and_format_duration() {
        let raw = br#"{
            "streams": [
                {"codec_type": "audio", "duration": "9.98"},
                {"codec_type": "video", "width": 1920, "height": 1080, "duration": "10.01"}
            ],
            "format": {"duration": "10.000000"}
        }"#;
        let info = parse_probe_output(raw).unwrap();
        assert_eq!(info.dimensions, Some((1920, 1080)));
        assert_eq!(info.duration, 10.0);
    }

    #[test]
    fn audio_only_has_no_dimensions() {
        let raw = br#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3.5"}}"#;
        let info = parse_probe_output(raw).unwrap();
        assert_eq!(info.dimensions, None);
        assert_eq!(info.duration, 3.5);
    }

    #[test]
    fn falls_back_to_stream_duration() {
        let raw = br#"{"streams": [{"codec_type": "video", "width": 512, "height": 512, "duration": "2.5"}], "format": {}}"#;
        assert_eq!(parse_probe_output(raw).unwrap().duration, 2.5);
    }

    #[test]
    fn missing_duration_is_an_error() {
        let raw = br#"{"streams": [], "format": {"duration": "N/A"}}"#;
        assert!(matches!(
            parse_probe_output(raw),
            Err(ProbeError::NoDuration)
        ));
    }
}
