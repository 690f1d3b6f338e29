use hound::WavReader;
use std::path::{Path, PathBuf};

use crate::ffmpeg::secs;
use crate::probe::MediaProbe;
use crate::script::AudioSegment;
use crate::timeline::Timeline;

pub fn wav_duration_seconds(path: &Path) -> anyhow::Result<f64> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples = reader.len();
    let frames = samples as f64 / spec.channels as f64;
    let duration = frames / spec.sample_rate as f64;
    Ok(duration)
}

/// Duration of an audio file: WAV headers are read directly, anything else goes
/// through the probe.
pub fn measure_duration(path: &Path, probe: &dyn MediaProbe) -> anyhow::Result<f64> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if is_wav {
        return wav_duration_seconds(path);
    }
    let info = probe.probe(path)?;
    Ok(info.duration)
}

/// One clip placed on the mixed track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPlacement {
    pub segment_index: usize,
    pub path: PathBuf,
    pub offset: f64,
    /// Slot length; the clip is cut here so it never bleeds into the next slot.
    pub duration: f64,
}

/// The mixed narration/commentary track spanning `[0, total_duration)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMix {
    pub placements: Vec<AudioPlacement>,
    pub total_duration: f64,
}

impl AudioMix {
    /// Place every clip at its timeline offset. `segments` and `timeline` are in
    /// the same order, as produced by `Timeline::build`.
    pub fn place(segments: &[AudioSegment], timeline: &Timeline) -> Self {
        let placements = segments
            .iter()
            .zip(&timeline.entries)
            .map(|(seg, entry)| AudioPlacement {
                segment_index: seg.segment_index,
                path: seg.audio_path.clone(),
                offset: entry.start,
                duration: entry.duration,
            })
            .collect();
        Self {
            placements,
            total_duration: timeline.total_duration,
        }
    }

    /// Filter chains for the mix. `first_input` is the ffmpeg input index of the
    /// first placement; the remaining placements follow in order. Output label
    /// is `[aout]`.
    pub fn filter(&self, first_input: usize) -> String {
        let mut chains = Vec::with_capacity(self.placements.len() + 1);
        let mut labels = String::new();

        for (i, p) in self.placements.iter().enumerate() {
            let delay_ms = (p.offset * 1000.0).round() as u64;
            chains.push(format!(
                "[{input}:a]atrim=0:{dur},asetpts=PTS-STARTPTS,\
                 aresample=44100,aformat=sample_fmts=fltp:channel_layouts=stereo,\
                 adelay={delay}:all=1[a{i}]",
                input = first_input + i,
                dur = secs(p.duration),
                delay = delay_ms,
                i = i,
            ));
            labels.push_str(&format!("[a{}]", i));
        }

        let total = secs(self.total_duration);
        if self.placements.len() == 1 {
            chains.push(format!("{labels}apad,atrim=0:{total}[aout]"));
        } else {
            chains.push(format!(
                "{labels}amix=inputs={n}:duration=longest:normalize=0,apad,atrim=0:{total}[aout]",
                n = self.placements.len(),
            ));
        }
        chains.join(";")
    }
}
