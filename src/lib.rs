//! Video assembly for narrated Reddit story shorts.
//!
//! Takes a generated script, per-segment narration audio and optional
//! character clips, and renders one vertical video plus a thumbnail with
//! ffmpeg.

pub mod assembler;
pub mod audio;
pub mod background;
pub mod captions;
pub mod character;
pub mod compose;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod probe;
pub mod script;
pub mod subtitle;
pub mod thumbnail;
pub mod timeline;
pub mod utils;

// Re-export commonly used items at crate root
pub use assembler::{AssemblyReport, BackgroundKind, VideoAssembler};
pub use background::BackgroundPool;
pub use config::{CharacterAnchor, VideoAssemblyConfig};
pub use error::{AssemblyError, Result, Stage, ThumbnailError};
pub use probe::{Ffprobe, MediaInfo, MediaProbe};
pub use script::{
    AssemblyInputs, AudioSegment, CharacterMap, CharacterVideoRef, GeneratedScript,
    ScriptSegment, SegmentType, Voice,
};
pub use timeline::{Timeline, TimelineEntry};
