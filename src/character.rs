use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::{CharacterAnchor, VideoAssemblyConfig};
use crate::error::{AssemblyError, Result, Stage};
use crate::ffmpeg::{secs, window_expr};
use crate::probe::MediaProbe;
use crate::script::CharacterMap;
use crate::timeline::Timeline;

/// Distance from the frame edges.
pub const EDGE_MARGIN: u32 = 20;
/// Extra drop for `top_right` so the clip clears the badge row.
const TOP_RIGHT_BADGE_CLEARANCE: u32 = 60;
/// Extra shift for `top_left` so the clip sits right of the badge.
const TOP_LEFT_BADGE_CLEARANCE: u32 = 200;

/// Top-left corner for a `size` overlay on a `frame` canvas.
pub fn anchor_position(anchor: CharacterAnchor, size: (u32, u32), frame: (u32, u32)) -> (u32, u32) {
    let (w, h) = size;
    let (fw, fh) = frame;
    let right = fw.saturating_sub(w + EDGE_MARGIN);
    let bottom = fh.saturating_sub(h + EDGE_MARGIN);
    match anchor {
        CharacterAnchor::BottomRight => (right, bottom),
        CharacterAnchor::BottomLeft => (EDGE_MARGIN, bottom),
        CharacterAnchor::TopRight => (right, EDGE_MARGIN + TOP_RIGHT_BADGE_CLEARANCE),
        CharacterAnchor::TopLeft => (EDGE_MARGIN + TOP_LEFT_BADGE_CLEARANCE, EDGE_MARGIN),
        CharacterAnchor::CenterBottom => (fw.saturating_sub(w) / 2, bottom),
    }
}

/// Aspect-preserving size at `fraction` of the frame width.
pub fn scaled_size(native: (u32, u32), frame_width: u32, fraction: f64) -> (u32, u32) {
    let width = ((frame_width as f64 * fraction).floor() as u32).max(1);
    let scale = width as f64 / native.0 as f64;
    let height = ((native.1 as f64 * scale).floor() as u32).max(1);
    (width, height)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterLayer {
    pub segment_index: usize,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
    pub start: f64,
    /// Never longer than the clip itself: short clips end early.
    pub duration: f64,
}

impl CharacterLayer {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Position one clip inside its segment window.
    pub fn place(
        clip_native: (u32, u32),
        clip_duration: f64,
        segment_index: usize,
        path: PathBuf,
        start: f64,
        segment_duration: f64,
        config: &VideoAssemblyConfig,
    ) -> Self {
        let (width, height) = scaled_size(clip_native, config.width, config.character_size);
        let (x, y) = anchor_position(
            config.character_position,
            (width, height),
            (config.width, config.height),
        );
        Self {
            segment_index,
            path,
            width,
            height,
            x,
            y,
            start,
            duration: clip_duration.min(segment_duration),
        }
    }

    /// Build overlays for every timeline segment with a character clip.
    pub fn plan_all(
        characters: &CharacterMap,
        timeline: &Timeline,
        probe: &dyn MediaProbe,
        config: &VideoAssemblyConfig,
    ) -> Result<Vec<Self>> {
        let mut layers = Vec::new();
        for (index, clip) in characters {
            let entry = timeline.entry_for(*index).ok_or_else(|| AssemblyError::InvalidInput {
                stage: Stage::CharacterOverlay,
                reason: format!("character clip references segment {} which has no audio", index),
            })?;

            let info = probe
                .probe(&clip.video_path)
                .map_err(|e| AssemblyError::load(Stage::CharacterOverlay, &clip.video_path, e))?;
            let native = info.dimensions.filter(|(w, h)| *w > 0 && *h > 0).ok_or_else(|| {
                AssemblyError::load(Stage::CharacterOverlay, &clip.video_path, "no video stream")
            })?;

            let clip_duration = if clip.duration.is_finite() && clip.duration > 0.0 {
                info.duration.min(clip.duration)
            } else {
                info.duration
            };

            let layer = CharacterLayer::place(
                native,
                clip_duration,
                *index,
                clip.video_path.clone(),
                entry.start,
                entry.duration,
                config,
            );
            debug!(
                "Character for segment {} at ({}, {}) {}x{}, {:.2}s-{:.2}s",
                index,
                layer.x,
                layer.y,
                layer.width,
                layer.height,
                layer.start,
                layer.end()
            );
            layers.push(layer);
        }
        if !layers.is_empty() {
            info!("Planned {} character overlays", layers.len());
        }
        Ok(layers)
    }

    pub fn input_args(&self) -> Vec<OsString> {
        vec!["-i".into(), self.path.as_os_str().to_owned()]
    }

    /// Scale and shift the clip to its slot; output `[{label}]`. Audio is never
    /// mapped from this input.
    pub fn filter(&self, input: usize, label: &str) -> String {
        format!(
            "[{input}:v]trim=0:{dur},setpts=PTS-STARTPTS+{start}/TB,scale={w}:{h},format=yuva420p[{label}]",
            dur = secs(self.duration),
            start = secs(self.start),
            w = self.width,
            h = self.height,
        )
    }

    /// Overlay `[{label}]` onto `[{base}]`, producing `[{out}]`.
    pub fn overlay(&self, base: &str, label: &str, out: &str) -> String {
        format!(
            "[{base}][{label}]overlay=x={x}:y={y}:eof_action=pass:enable={enable}[{out}]",
            x = self.x,
            y = self.y,
            enable = window_expr(self.start, self.end()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{MediaInfo, ProbeError};
    use crate::script::{AudioSegment, CharacterVideoRef, SegmentType, Voice, character_map};
    use std::path::Path;

    struct FakeProbe(MediaInfo);

    impl MediaProbe for FakeProbe {
        fn probe(&self, _path: &Path) -> std::result::Result<MediaInfo, ProbeError> {
            Ok(self.0)
        }
    }

    fn audio(index: usize, duration: f64, kind: SegmentType, voice: Voice) -> AudioSegment {
        AudioSegment {
            segment_index: index,
            segment_type: kind,
            voice,
            text: String::new(),
            audio_path: format!("/a/{}.mp3", index).into(),
            duration,
        }
    }

    fn clip(index: usize, duration: f64) -> CharacterVideoRef {
        CharacterVideoRef {
            segment_index: index,
            audio_path: format!("/a/{}.mp3", index).into(),
            video_path: format!("/c/{}.mp4", index).into(),
            duration,
        }
    }

    #[test]
    fn anchor_table() {
        let frame = (1080, 1920);
        let size = (378, 378);
        assert_eq!(anchor_position(CharacterAnchor::BottomRight, size, frame), (682, 1522));
        assert_eq!(anchor_position(CharacterAnchor::BottomLeft, size, frame), (20, 1522));
        assert_eq!(anchor_position(CharacterAnchor::TopRight, size, frame), (682, 80));
        assert_eq!(anchor_position(CharacterAnchor::TopLeft, size, frame), (220, 20));
        assert_eq!(anchor_position(CharacterAnchor::CenterBottom, size, frame), (351, 1522));
    }

    #[test]
    fn size_follows_frame_width_fraction() {
        assert_eq!(scaled_size((512, 512), 1080, 0.35), (378, 378));
        assert_eq!(scaled_size((1280, 720), 1080, 0.5), (540, 303));
    }

    #[test]
    fn short_clip_ends_early() {
        let segments = vec![
            audio(0, 3.0, SegmentType::Story, Voice::Narrator),
            audio(1, 4.0, SegmentType::Commentary, Voice::Commentator),
        ];
        let timeline = Timeline::build(&segments, 0.3).unwrap();
        let probe = FakeProbe(MediaInfo {
            dimensions: Some((512, 512)),
            duration: 2.5,
        });
        let config = VideoAssemblyConfig::default();
        let layers =
            CharacterLayer::plan_all(&character_map([clip(1, 2.5)]), &timeline, &probe, &config)
                .unwrap();

        assert_eq!(layers.len(), 1);
        let layer = &layers[0];
        assert!((layer.start - 3.3).abs() < 1e-9);
        assert_eq!(layer.duration, 2.5);
        assert!((layer.end() - 5.8).abs() < 1e-9);

        let filter = layer.filter(3, "c0");
        assert!(filter.starts_with("[3:v]trim=0:2.5,setpts=PTS-STARTPTS+3.3/TB"));
        assert!(!filter.contains("loop"));
        assert!(layer.overlay("base", "c0", "v1").contains("enable=gte(t\\,3.3)*lt(t\\,5.8)"));
    }

    #[test]
    fn long_clip_is_cut_to_segment() {
        let segments = vec![audio(2, 4.0, SegmentType::Commentary, Voice::Commentator)];
        let timeline = Timeline::build(&segments, 0.3).unwrap();
        let probe = FakeProbe(MediaInfo {
            dimensions: Some((512, 768)),
            duration: 9.0,
        });
        let layers = CharacterLayer::plan_all(
            &character_map([clip(2, 9.0)]),
            &timeline,
            &probe,
            &VideoAssemblyConfig::default(),
        )
        .unwrap();
        assert_eq!(layers[0].duration, 4.0);
        assert_eq!((layers[0].width, layers[0].height), (378, 567));
    }

    #[test]
    fn clip_without_audio_segment_is_rejected() {
        let segments = vec![audio(0, 3.0, SegmentType::Story, Voice::Narrator)];
        let timeline = Timeline::build(&segments, 0.3).unwrap();
        let probe = FakeProbe(MediaInfo {
            dimensions: Some((512, 512)),
            duration: 2.0,
        });
        let err = CharacterLayer::plan_all(
            &character_map([clip(5, 2.0)]),
            &timeline,
            &probe,
            &VideoAssemblyConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.stage(), Stage::CharacterOverlay);
    }
}
