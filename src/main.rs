mod args;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use args::Args;
use storyreel::utils::{thumbnail_file_name, timestamp, video_file_name};
use storyreel::{AssemblyInputs, BackgroundKind, BackgroundPool, VideoAssembler, VideoAssemblyConfig};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("Starting video assembly");

    let mut config = match &args.config {
        Some(path) => VideoAssemblyConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => VideoAssemblyConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let pool = BackgroundPool::load(&args.backgrounds)
        .with_context(|| format!("reading backgrounds from {}", args.backgrounds.display()))?;
    let mut assembler = VideoAssembler::new(config, pool);

    let inputs = AssemblyInputs::load(&args.manifest, assembler.probe())
        .with_context(|| format!("loading manifest {}", args.manifest.display()))?;
    info!(
        "Story {} (r/{}): {} script segments, {} audio segments, {} character clips",
        inputs.script.story_id,
        inputs.script.subreddit,
        inputs.script.segments.len(),
        inputs.audio_segments.len(),
        inputs.characters.len()
    );

    let stamp = timestamp(Local::now());
    let video_path = args
        .output_dir
        .join(video_file_name(&inputs.script.story_id, &stamp));

    let plan = assembler
        .plan(&inputs.script, &inputs.audio_segments, &inputs.characters)
        .context("planning video")?;
    let report = assembler
        .render(&plan, &video_path)
        .context("rendering video")?;
    info!(
        "Rendered {} segments ({:.1}s, {} character overlays) to {}",
        report.segment_count,
        report.total_duration,
        report.character_overlays,
        report.output.display()
    );
    if let BackgroundKind::Footage(path) = &report.background {
        info!("Background footage: {}", path.display());
    }

    if args.srt {
        let srt_path = video_path.with_extension("srt");
        if let Err(e) = assembler.write_subtitles(&plan, &srt_path) {
            warn!("Failed to write subtitles {}: {:#}", srt_path.display(), e);
        }
    }

    if !args.no_thumbnail {
        let thumb_path = args
            .output_dir
            .join(thumbnail_file_name(&inputs.script.story_id, &stamp));
        if !assembler.create_thumbnail(&inputs.script, &thumb_path) {
            warn!("Continuing without thumbnail");
        }
    }

    info!("Process complete.");
    Ok(())
}
