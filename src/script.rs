use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::audio::measure_duration;
use crate::error::{AssemblyError, Result, Stage};
use crate::probe::MediaProbe;

/// Declared and measured durations further apart than this get a warning.
const DURATION_DRIFT_WARN: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    Intro,
    Story,
    Commentary,
    Outro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Narrator,
    Commentator,
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SegmentType::Intro => "intro",
            SegmentType::Story => "story",
            SegmentType::Commentary => "commentary",
            SegmentType::Outro => "outro",
        })
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Voice::Narrator => "narrator",
            Voice::Commentator => "commentator",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSegment {
    #[serde(rename = "type")]
    pub kind: SegmentType,
    pub voice: Voice,
    pub text: String,
    #[serde(default)]
    pub display_text: Option<String>,
}

impl ScriptSegment {
    /// On-screen text, falling back to the spoken text.
    pub fn display_text(&self) -> &str {
        self.display_text.as_deref().unwrap_or(&self.text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedScript {
    pub story_id: String,
    pub title: String,
    pub subreddit: String,
    pub segments: Vec<ScriptSegment>,
    #[serde(default)]
    pub video_title: String,
    #[serde(default)]
    pub video_description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    pub segment_index: usize,
    pub segment_type: SegmentType,
    pub voice: Voice,
    pub text: String,
    pub audio_path: PathBuf,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CharacterVideoRef {
    pub segment_index: usize,
    pub audio_path: PathBuf,
    pub video_path: PathBuf,
    pub duration: f64,
}

/// Sparse segment index -> character clip association.
pub type CharacterMap = BTreeMap<usize, CharacterVideoRef>;

pub fn character_map(refs: impl IntoIterator<Item = CharacterVideoRef>) -> CharacterMap {
    refs.into_iter().map(|c| (c.segment_index, c)).collect()
}

#[derive(Debug, Deserialize)]
struct ManifestAudio {
    segment_index: usize,
    segment_type: SegmentType,
    voice: Voice,
    #[serde(default)]
    text: String,
    audio_path: PathBuf,
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    script: GeneratedScript,
    audio_segments: Vec<ManifestAudio>,
    #[serde(default)]
    character_videos: Vec<CharacterVideoRef>,
}

/// Everything the upstream stages hand to assembly.
#[derive(Debug, Clone)]
pub struct AssemblyInputs {
    pub script: GeneratedScript,
    pub audio_segments: Vec<AudioSegment>,
    pub characters: CharacterMap,
}

impl AssemblyInputs {
    /// Read a JSON manifest. Relative paths resolve against the manifest's
    /// directory; missing audio durations are measured from the files.
    pub fn load(path: &Path, probe: &dyn MediaProbe) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&data)?;
        let base = path.parent().unwrap_or(Path::new("."));

        let mut audio_segments = Vec::with_capacity(manifest.audio_segments.len());
        for entry in manifest.audio_segments {
            let audio_path = resolve(base, &entry.audio_path);
            let duration = match entry.duration {
                Some(declared) => {
                    if let Ok(measured) = measure_duration(&audio_path, probe) {
                        if (measured - declared).abs() > DURATION_DRIFT_WARN {
                            warn!(
                                "Segment {} declares {:.2}s but {} measures {:.2}s; using declared",
                                entry.segment_index,
                                declared,
                                audio_path.display(),
                                measured
                            );
                        }
                    }
                    declared
                }
                None => measure_duration(&audio_path, probe)
                    .map_err(|e| AssemblyError::load(Stage::Audio, &audio_path, e))?,
            };
            audio_segments.push(AudioSegment {
                segment_index: entry.segment_index,
                segment_type: entry.segment_type,
                voice: entry.voice,
                text: entry.text,
                audio_path,
                duration,
            });
        }

        let characters = character_map(manifest.character_videos.into_iter().map(|mut c| {
            c.video_path = resolve(base, &c.video_path);
            c.audio_path = resolve(base, &c.audio_path);
            c
        }));

        info!(
            "Loaded manifest {}: {} script segments, {} audio segments, {} character clips",
            path.display(),
            manifest.script.segments.len(),
            audio_segments.len(),
            characters.len()
        );

        Ok(Self {
            script: manifest.script,
            audio_segments,
            characters,
        })
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{MediaInfo, ProbeError};
    use tempfile::TempDir;

    struct NoProbe;

    impl MediaProbe for NoProbe {
        fn probe(&self, _path: &Path) -> std::result::Result<MediaInfo, ProbeError> {
            Err(ProbeError::NoDuration)
        }
    }

    #[test]
    fn display_text_defaults_to_text() {
        let segment: ScriptSegment =
            serde_json::from_str(r#"{"type": "story", "voice": "narrator", "text": "spoken"}"#)
                .unwrap();
        assert_eq!(segment.display_text(), "spoken");

        let segment = ScriptSegment {
            display_text: Some("shown".into()),
            ..segment
        };
        assert_eq!(segment.display_text(), "shown");
    }

    #[test]
    fn loads_manifest_and_resolves_paths() {
        let dir = TempDir::new().unwrap();
        let manifest = r#"{
            "script": {
                "story_id": "abc123",
                "title": "TIFU by testing",
                "subreddit": "tifu",
                "segments": [
                    {"type": "intro", "voice": "narrator", "text": "Hi"},
                    {"type": "commentary", "voice": "commentator", "text": "Wow", "display_text": "WOW"}
                ]
            },
            "audio_segments": [
                {"segment_index": 0, "segment_type": "intro", "voice": "narrator", "audio_path": "audio/0.mp3", "duration": 3.0},
                {"segment_index": 1, "segment_type": "commentary", "voice": "commentator", "audio_path": "/abs/1.mp3", "duration": 4.0}
            ],
            "character_videos": [
                {"segment_index": 1, "audio_path": "audio/1.mp3", "video_path": "chars/1.mp4", "duration": 2.5}
            ]
        }"#;
        let path = dir.path().join("manifest.json");
        fs::write(&path, manifest).unwrap();

        let inputs = AssemblyInputs::load(&path, &NoProbe).unwrap();
        assert_eq!(inputs.script.subreddit, "tifu");
        assert_eq!(inputs.audio_segments[0].audio_path, dir.path().join("audio/0.mp3"));
        assert_eq!(inputs.audio_segments[1].audio_path, PathBuf::from("/abs/1.mp3"));
        assert_eq!(
            inputs.characters[&1].video_path,
            dir.path().join("chars/1.mp4")
        );
        assert!(!inputs.characters.contains_key(&0));
    }

    #[test]
    fn unmeasurable_audio_without_duration_fails_in_audio_stage() {
        let dir = TempDir::new().unwrap();
        let manifest = r#"{
            "script": {"story_id": "x", "title": "t", "subreddit": "s", "segments": []},
            "audio_segments": [
                {"segment_index": 0, "segment_type": "story", "voice": "narrator", "audio_path": "missing.mp3"}
            ]
        }"#;
        let path = dir.path().join("manifest.json");
        fs::write(&path, manifest).unwrap();

        let err = AssemblyInputs::load(&path, &NoProbe).unwrap_err();
        assert_eq!(err.stage(), Stage::Audio);
    }
}
