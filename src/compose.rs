//! Layer compositing and export.
//!
//! An [`AssemblyPlan`] is pure data. [`render`] stages the caption text files
//! and the filter graph in a scratch directory, encodes into a temporary file
//! next to the destination, and renames it into place only after ffmpeg exits
//! cleanly. Both temporaries are dropped (and deleted) on every error path.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile, TempDir};
use tracing::{debug, info};

use crate::audio::AudioMix;
use crate::background::BackgroundLayer;
use crate::captions::{Badge, CaptionLayer, FontSource};
use crate::character::CharacterLayer;
use crate::config::VideoAssemblyConfig;
use crate::error::{AssemblyError, Result, Stage};
use crate::ffmpeg::{self, secs};
use crate::timeline::Timeline;

#[derive(Debug, Clone)]
pub struct AssemblyPlan {
    pub timeline: Timeline,
    pub background: BackgroundLayer,
    pub characters: Vec<CharacterLayer>,
    pub badge: Badge,
    pub captions: Vec<CaptionLayer>,
    pub audio: AudioMix,
}

/// A visual layer, in compositing order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Layer<'a> {
    Background(&'a BackgroundLayer),
    Character(&'a CharacterLayer),
    Badge(&'a Badge),
    Caption(&'a CaptionLayer),
}

impl AssemblyPlan {
    pub fn total_duration(&self) -> f64 {
        self.timeline.total_duration
    }

    /// Bottom to top: background, characters, badge, captions.
    pub fn layers(&self) -> Vec<Layer<'_>> {
        let mut layers = Vec::with_capacity(2 + self.characters.len() + self.captions.len());
        layers.push(Layer::Background(&self.background));
        layers.extend(self.characters.iter().map(Layer::Character));
        layers.push(Layer::Badge(&self.badge));
        layers.extend(self.captions.iter().map(Layer::Caption));
        layers
    }
}

/// Caption text written to disk for `drawtext textfile=`.
#[derive(Debug)]
pub struct StagedText {
    pub badge: PathBuf,
    /// `captions[i][j]` holds line `j` of caption `i`.
    pub captions: Vec<Vec<PathBuf>>,
}

pub fn stage_text(plan: &AssemblyPlan, dir: &Path) -> Result<StagedText> {
    let write = |name: String, text: &str| -> Result<PathBuf> {
        let path = dir.join(name);
        fs::write(&path, text).map_err(|e| AssemblyError::load(Stage::Caption, &path, e))?;
        Ok(path)
    };

    let badge = write("badge.txt".to_string(), &plan.badge.text)?;
    let mut captions = Vec::with_capacity(plan.captions.len());
    for (i, caption) in plan.captions.iter().enumerate() {
        let mut files = Vec::with_capacity(caption.lines.len());
        for (j, line) in caption.lines.iter().enumerate() {
            files.push(write(format!("caption_{:03}_{}.txt", i, j), line)?);
        }
        captions.push(files);
    }
    Ok(StagedText { badge, captions })
}

/// Input index of the first audio clip.
fn first_audio_input(plan: &AssemblyPlan) -> usize {
    1 + plan.characters.len()
}

pub fn build_filter_graph(
    plan: &AssemblyPlan,
    staged: &StagedText,
    font: &FontSource,
    config: &VideoAssemblyConfig,
) -> String {
    let mut chains = vec![plan.background.filter(0, config.fps, "bg")];
    let mut base = "bg".to_string();

    for (i, character) in plan.characters.iter().enumerate() {
        let label = format!("c{}", i);
        let out = format!("v{}", i);
        chains.push(character.filter(1 + i, &label));
        chains.push(character.overlay(&base, &label, &out));
        base = out;
    }

    let mut text = vec![plan.badge.filter(&staged.badge, font, config)];
    for (caption, files) in plan.captions.iter().zip(&staged.captions) {
        text.extend(caption.filters(files, font, config));
    }
    chains.push(format!("[{}]{}[vout]", base, text.join(",")));

    chains.push(plan.audio.filter(first_audio_input(plan)));
    chains.join(";\n")
}

pub fn build_args(
    plan: &AssemblyPlan,
    filter_script: &Path,
    output: &Path,
    config: &VideoAssemblyConfig,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-hide_banner".into()];
    args.extend(plan.background.input_args(config.fps));
    for character in &plan.characters {
        args.extend(character.input_args());
    }
    for placement in &plan.audio.placements {
        args.push("-i".into());
        args.push(placement.path.as_os_str().to_owned());
    }

    let tail: [&str; 24] = [
        "-filter_complex_script",
        &filter_script.to_string_lossy(),
        "-map",
        "[vout]",
        "-map",
        "[aout]",
        "-c:v",
        &config.video_codec,
        "-preset",
        &config.preset,
        "-pix_fmt",
        "yuv420p",
        "-r",
        &config.fps.to_string(),
        "-c:a",
        &config.audio_codec,
        "-b:a",
        "192k",
        "-threads",
        &config.threads.to_string(),
        "-t",
        &secs(plan.total_duration()),
        "-movflags",
        "+faststart",
    ];
    args.extend(tail.iter().map(OsString::from));
    args.push(output.as_os_str().to_owned());
    args
}

/// Encode `plan` to `output`. Nothing is left at `output` unless this returns `Ok`.
pub fn render(plan: &AssemblyPlan, output: &Path, config: &VideoAssemblyConfig) -> Result<()> {
    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(AssemblyError::render)?;

    let scratch: TempDir = Builder::new()
        .prefix("storyreel-")
        .tempdir()
        .map_err(AssemblyError::render)?;
    let staged = stage_text(plan, scratch.path())?;
    let font = FontSource::resolve(&config.font);

    let graph = build_filter_graph(plan, &staged, &font, config);
    let graph_path = scratch.path().join("graph.txt");
    fs::write(&graph_path, &graph).map_err(AssemblyError::render)?;
    debug!("Filter graph:\n{}", graph);

    let extension = output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    let partial: NamedTempFile = Builder::new()
        .prefix(".storyreel-")
        .suffix(&format!(".{}", extension))
        .tempfile_in(parent)
        .map_err(AssemblyError::render)?;

    info!(
        "Encoding {:.1}s video ({} captions, {} character overlays)",
        plan.total_duration(),
        plan.captions.len(),
        plan.characters.len()
    );
    let args = build_args(plan, &graph_path, partial.path(), config);
    ffmpeg::run(&config.ffmpeg_bin, &args).map_err(AssemblyError::render)?;

    let written = fs::metadata(partial.path())
        .map_err(AssemblyError::render)?
        .len();
    if written == 0 {
        return Err(AssemblyError::render("encoder produced an empty file"));
    }

    partial
        .persist(output)
        .map_err(|e| AssemblyError::render(e.error))?;
    info!("Video saved to {}", output.display());
    Ok(())
}
