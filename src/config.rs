use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{AssemblyError, Result};

/// Where the character clip sits on the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterAnchor {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
    CenterBottom,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoAssemblyConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Font file path or family name.
    pub font: String,
    pub title_font_size: u32,
    pub story_font_size: u32,
    pub commentary_font_size: u32,
    pub text_color: String,
    pub accent_color: String,
    pub stroke_color: String,
    pub stroke_width: u32,
    /// Character overlay width as a fraction of frame width.
    pub character_size: f64,
    pub character_position: CharacterAnchor,
    /// Silence between consecutive segments, in seconds.
    pub segment_gap: f64,
    pub background_color: String,
    pub badge_color: String,
    pub badge_font_size: u32,
    pub thumbnail_sample_time: f64,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub threads: u32,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub seed: Option<u64>,
}

impl Default for VideoAssemblyConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            font: "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf".to_string(),
            title_font_size: 48,
            story_font_size: 36,
            commentary_font_size: 32,
            text_color: "white".to_string(),
            accent_color: "#FFD700".to_string(),
            stroke_color: "black".to_string(),
            stroke_width: 2,
            character_size: 0.35,
            character_position: CharacterAnchor::BottomRight,
            segment_gap: 0.3,
            background_color: "0x1E1E28".to_string(),
            badge_color: "#FF4500".to_string(),
            badge_font_size: 28,
            thumbnail_sample_time: 1.0,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "medium".to_string(),
            threads: 4,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            seed: None,
        }
    }
}

impl VideoAssemblyConfig {
    /// Load from a TOML file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: VideoAssemblyConfig = toml::from_str(&data)?;
        config.validate()?;
        info!("Loaded assembly config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(AssemblyError::invalid(format!(
                "frame size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(AssemblyError::invalid(format!(
                "frame size must be even for yuv420p, got {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(AssemblyError::invalid("fps must be positive"));
        }
        if !(self.character_size > 0.0 && self.character_size <= 1.0) {
            return Err(AssemblyError::invalid(format!(
                "character_size must be in (0, 1], got {}",
                self.character_size
            )));
        }
        if !(self.segment_gap.is_finite() && self.segment_gap >= 0.0) {
            return Err(AssemblyError::invalid(format!(
                "segment_gap must be a non-negative number, got {}",
                self.segment_gap
            )));
        }
        Ok(())
    }
}
