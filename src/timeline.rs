use tracing::debug;

use crate::error::{AssemblyError, Result};
use crate::script::AudioSegment;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineEntry {
    pub segment_index: usize,
    pub start: f64,
    pub duration: f64,
}

impl TimelineEntry {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Absolute schedule of every segment, in script order.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
    pub gap: f64,
    pub total_duration: f64,
}

impl Timeline {
    /// Lay segments end to end with `gap` seconds of silence between neighbours.
    pub fn build(segments: &[AudioSegment], gap: f64) -> Result<Self> {
        if segments.is_empty() {
            return Err(AssemblyError::invalid(
                "no audio segments; cannot assemble a zero-length video",
            ));
        }
        if !(gap.is_finite() && gap >= 0.0) {
            return Err(AssemblyError::invalid(format!("invalid segment gap {}", gap)));
        }

        let mut entries = Vec::with_capacity(segments.len());
        let mut cursor = 0.0_f64;
        let mut previous: Option<usize> = None;

        for (i, seg) in segments.iter().enumerate() {
            if let Some(prev) = previous {
                if seg.segment_index <= prev {
                    return Err(AssemblyError::invalid(format!(
                        "segment_index must be strictly increasing: {} follows {}",
                        seg.segment_index, prev
                    )));
                }
            }
            if !(seg.duration.is_finite() && seg.duration > 0.0) {
                return Err(AssemblyError::invalid(format!(
                    "segment {} has invalid duration {}",
                    seg.segment_index, seg.duration
                )));
            }
            if i > 0 {
                cursor += gap;
            }
            entries.push(TimelineEntry {
                segment_index: seg.segment_index,
                start: cursor,
                duration: seg.duration,
            });
            debug!(
                "Segment {} scheduled at {:.2}s for {:.2}s",
                seg.segment_index, cursor, seg.duration
            );
            cursor += seg.duration;
            previous = Some(seg.segment_index);
        }

        Ok(Self {
            entries,
            gap,
            total_duration: cursor,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_for(&self, segment_index: usize) -> Option<&TimelineEntry> {
        self.entries
            .iter()
            .find(|e| e.segment_index == segment_index)
    }
}
