//! Orchestrates one story from inputs to a rendered video.
//!
//! Stages run in order: timeline, then background, character overlays,
//! captions and audio (each independent of the others), then compositing.

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::audio::AudioMix;
use crate::background::{BackgroundLayer, BackgroundPool};
use crate::captions::{Badge, CaptionLayer};
use crate::character::CharacterLayer;
use crate::compose::{self, AssemblyPlan};
use crate::config::VideoAssemblyConfig;
use crate::error::{AssemblyError, Result, Stage};
use crate::probe::{Ffprobe, MediaProbe};
use crate::script::{AudioSegment, CharacterMap, GeneratedScript};
use crate::subtitle::{build_srt_entries, write_srt};
use crate::thumbnail::{ThumbnailSource, render_thumbnail};
use crate::timeline::Timeline;

#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundKind {
    Solid,
    Footage(PathBuf),
}

impl From<&BackgroundLayer> for BackgroundKind {
    fn from(layer: &BackgroundLayer) -> Self {
        match layer {
            BackgroundLayer::Solid { .. } => BackgroundKind::Solid,
            BackgroundLayer::Footage { path, .. } => BackgroundKind::Footage(path.clone()),
        }
    }
}

/// What a successful assembly produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyReport {
    pub output: PathBuf,
    pub total_duration: f64,
    pub segment_count: usize,
    pub character_overlays: usize,
    pub background: BackgroundKind,
}

pub struct VideoAssembler<P: MediaProbe = Ffprobe> {
    config: VideoAssemblyConfig,
    pool: BackgroundPool,
    probe: P,
    rng: StdRng,
}

impl VideoAssembler<Ffprobe> {
    pub fn new(config: VideoAssemblyConfig, pool: BackgroundPool) -> Self {
        let probe = Ffprobe::new(config.ffprobe_bin.clone());
        Self::with_probe(config, pool, probe)
    }
}

impl<P: MediaProbe> VideoAssembler<P> {
    pub fn with_probe(config: VideoAssemblyConfig, pool: BackgroundPool, probe: P) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            pool,
            probe,
            rng,
        }
    }

    pub fn config(&self) -> &VideoAssemblyConfig {
        &self.config
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Resolve every layer without touching the output path.
    pub fn plan(
        &mut self,
        script: &GeneratedScript,
        audio_segments: &[AudioSegment],
        characters: &CharacterMap,
    ) -> Result<AssemblyPlan> {
        self.config.validate()?;
        if script.segments.is_empty() {
            return Err(AssemblyError::invalid("script has no segments"));
        }
        if let Some(stray) = audio_segments
            .iter()
            .find(|a| a.segment_index >= script.segments.len())
        {
            return Err(AssemblyError::invalid(format!(
                "audio segment {} has no script segment (script has {})",
                stray.segment_index,
                script.segments.len()
            )));
        }

        info!("Building timeline from {} audio segments", audio_segments.len());
        let timeline = Timeline::build(audio_segments, self.config.segment_gap)?;
        info!(
            "Timeline: {} segments, {:.2}s total",
            timeline.len(),
            timeline.total_duration
        );

        let background = BackgroundLayer::select(
            &self.pool,
            &self.probe,
            &mut self.rng,
            &self.config.background_color,
            (self.config.width, self.config.height),
            timeline.total_duration,
        )?;

        let characters =
            CharacterLayer::plan_all(characters, &timeline, &self.probe, &self.config)?;

        let captions: Vec<CaptionLayer> = timeline
            .entries
            .iter()
            .map(|entry| CaptionLayer::for_segment(&script.segments[entry.segment_index], entry))
            .collect();
        info!("Prepared {} caption layers", captions.len());

        let badge = Badge::new(&script.subreddit, self.config.badge_font_size);
        let audio = AudioMix::place(audio_segments, &timeline);

        Ok(AssemblyPlan {
            timeline,
            background,
            characters,
            badge,
            captions,
            audio,
        })
    }

    /// Render a plan produced by [`plan`](Self::plan).
    pub fn render(&self, plan: &AssemblyPlan, output: &Path) -> Result<AssemblyReport> {
        compose::render(plan, output, &self.config)?;
        Ok(AssemblyReport {
            output: output.to_path_buf(),
            total_duration: plan.total_duration(),
            segment_count: plan.timeline.len(),
            character_overlays: plan.characters.len(),
            background: BackgroundKind::from(&plan.background),
        })
    }

    pub fn assemble_video(
        &mut self,
        script: &GeneratedScript,
        audio_segments: &[AudioSegment],
        characters: &CharacterMap,
        output: &Path,
    ) -> Result<AssemblyReport> {
        info!("Assembling video for story {}", script.story_id);
        let plan = self.plan(script, audio_segments, characters).inspect_err(|e| {
            error!("Assembly failed at {} stage: {}", e.stage(), e);
        })?;
        self.render(&plan, output).inspect_err(|e| {
            error!("Assembly failed at {} stage: {}", e.stage(), e);
        })
    }

    /// Never fails the pipeline: problems are logged and reported as `false`.
    pub fn create_thumbnail(&mut self, script: &GeneratedScript, output: &Path) -> bool {
        let source =
            match ThumbnailSource::select(&self.pool, &self.probe, &mut self.rng, &self.config) {
                Ok(source) => source,
                Err(e) => {
                    warn!("[{}] {}; using solid color", Stage::Thumbnail, e);
                    ThumbnailSource::Solid
                }
            };
        match render_thumbnail(&source, &script.title, &script.subreddit, output, &self.config) {
            Ok(()) => true,
            Err(e) => {
                warn!("[{}] Error creating thumbnail: {}", Stage::Thumbnail, e);
                false
            }
        }
    }

    pub fn write_subtitles(&self, plan: &AssemblyPlan, output: &Path) -> anyhow::Result<()> {
        write_srt(output, &build_srt_entries(&plan.captions))
    }
}
