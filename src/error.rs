use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Assembly stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Input,
    Background,
    Caption,
    CharacterOverlay,
    Audio,
    Render,
    Thumbnail,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Input => "input",
            Stage::Background => "background",
            Stage::Caption => "caption",
            Stage::CharacterOverlay => "character overlay",
            Stage::Audio => "audio",
            Stage::Render => "render",
            Stage::Thumbnail => "thumbnail",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("[{stage}] invalid input: {reason}")]
    InvalidInput { stage: Stage, reason: String },

    #[error("[{stage}] failed to load {}: {reason}", path.display())]
    ResourceLoad {
        stage: Stage,
        path: PathBuf,
        reason: String,
    },

    #[error("[{stage}] render failed: {reason}")]
    Render { stage: Stage, reason: String },

    #[error("[input] IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("[input] manifest parse error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("[input] config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

impl AssemblyError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        AssemblyError::InvalidInput {
            stage: Stage::Input,
            reason: reason.into(),
        }
    }

    pub fn load(stage: Stage, path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        AssemblyError::ResourceLoad {
            stage,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn render(reason: impl fmt::Display) -> Self {
        AssemblyError::Render {
            stage: Stage::Render,
            reason: reason.to_string(),
        }
    }

    /// The stage to blame, without parsing the message.
    pub fn stage(&self) -> Stage {
        match self {
            AssemblyError::InvalidInput { stage, .. }
            | AssemblyError::ResourceLoad { stage, .. }
            | AssemblyError::Render { stage, .. } => *stage,
            AssemblyError::Io(_) | AssemblyError::Manifest(_) | AssemblyError::Config(_) => {
                Stage::Input
            }
        }
    }
}

/// Thumbnail failures are reported, never propagated into the assembly result.
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("could not read background {}: {reason}", path.display())]
    Background { path: PathBuf, reason: String },

    #[error("ffmpeg failed to render thumbnail: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AssemblyError>;
