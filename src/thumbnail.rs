use rand::Rng;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::Builder;
use tracing::{debug, info};

use crate::background::{BackgroundPool, CropPlan};
use crate::captions::{
    Badge, CENTER_X, CaptionPosition, DrawText, FontSource, layout_lines, line_tops,
};
use crate::config::VideoAssemblyConfig;
use crate::error::ThumbnailError;
use crate::ffmpeg::{self, secs};
use crate::probe::MediaProbe;

const TITLE_MAX_CHARS: usize = 50;
const TITLE_WRAP: usize = 20;
const TITLE_FONT_SIZE: u32 = 60;
const TITLE_STROKE: (&str, u32) = ("black", 3);
const BADGE_FONT_SIZE: u32 = 40;
const BADGE_ORIGIN: (u32, u32) = (50, 50);

/// Title as shown on the thumbnail: at most 50 characters, then an ellipsis.
pub fn thumbnail_title(title: &str) -> String {
    let title = title.trim();
    if title.chars().count() > TITLE_MAX_CHARS {
        let cut: String = title.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", cut)
    } else {
        title.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThumbnailSource {
    Solid,
    Frame {
        path: PathBuf,
        crop: CropPlan,
        at: f64,
    },
}

impl ThumbnailSource {
    pub fn select<R: Rng + ?Sized>(
        pool: &BackgroundPool,
        probe: &dyn MediaProbe,
        rng: &mut R,
        config: &VideoAssemblyConfig,
    ) -> Result<Self, ThumbnailError> {
        let Some(path) = pool.choose(rng) else {
            return Ok(ThumbnailSource::Solid);
        };
        let info = probe.probe(path).map_err(|e| ThumbnailError::Background {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let crop = info
            .dimensions
            .filter(|(w, h)| *w > 0 && *h > 0)
            .and_then(|dimensions| CropPlan::fill(dimensions, (config.width, config.height)))
            .ok_or_else(|| ThumbnailError::Background {
                path: path.to_path_buf(),
                reason: "no usable video stream".to_string(),
            })?;
        let at = if info.duration > config.thumbnail_sample_time {
            config.thumbnail_sample_time
        } else {
            0.0
        };
        Ok(ThumbnailSource::Frame {
            path: path.to_path_buf(),
            crop,
            at,
        })
    }

    fn input_args(&self, config: &VideoAssemblyConfig) -> Vec<OsString> {
        match self {
            ThumbnailSource::Solid => vec![
                "-f".into(),
                "lavfi".into(),
                "-i".into(),
                format!(
                    "color=c={}:s={}x{}:d=1",
                    config.background_color, config.width, config.height
                )
                .into(),
            ],
            ThumbnailSource::Frame { path, at, .. } => vec![
                "-ss".into(),
                secs(*at).into(),
                "-i".into(),
                path.as_os_str().to_owned(),
            ],
        }
    }
}

/// Filter producing `[thumb]` from input 0. `title_files[i]` holds title line `i`.
pub fn thumbnail_filter(
    source: &ThumbnailSource,
    title_files: &[PathBuf],
    badge: &Badge,
    badge_file: &Path,
    font: &FontSource,
    config: &VideoAssemblyConfig,
) -> String {
    let mut steps = Vec::new();
    if let ThumbnailSource::Frame { crop, .. } = source {
        steps.push(crop.filter());
    }
    let tops = line_tops(
        title_files.len(),
        TITLE_FONT_SIZE,
        CaptionPosition::Center,
        config.height,
    );
    for (file, top) in title_files.iter().zip(tops) {
        steps.push(
            DrawText {
                textfile: file,
                font,
                font_size: TITLE_FONT_SIZE,
                color: "white",
                stroke: Some(TITLE_STROKE),
                boxed: None,
                x: CENTER_X.to_string(),
                y: top.to_string(),
                enable: None,
            }
            .filter(),
        );
    }
    steps.push(badge.filter(badge_file, font, config));
    // mjpeg wants full-range input.
    steps.push("format=yuvj420p".to_string());
    format!("[0:v]{}[thumb]", steps.join(","))
}

/// Render a still with title and badge to `output`, atomically.
pub fn render_thumbnail(
    source: &ThumbnailSource,
    title: &str,
    subreddit: &str,
    output: &Path,
    config: &VideoAssemblyConfig,
) -> Result<(), ThumbnailError> {
    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;

    let scratch = Builder::new().prefix("storyreel-thumb-").tempdir()?;
    let mut title_files = Vec::new();
    for (i, line) in layout_lines(&thumbnail_title(title), TITLE_WRAP, usize::MAX)
        .iter()
        .enumerate()
    {
        let path = scratch.path().join(format!("title_{}.txt", i));
        fs::write(&path, line)?;
        title_files.push(path);
    }
    let badge = Badge::at(subreddit, BADGE_FONT_SIZE, BADGE_ORIGIN);
    let badge_file = scratch.path().join("badge.txt");
    fs::write(&badge_file, &badge.text)?;

    let font = FontSource::resolve(&config.font);
    let filter = thumbnail_filter(source, &title_files, &badge, &badge_file, &font, config);
    debug!("Thumbnail filter: {}", filter);

    let extension = output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("jpg");
    let partial = Builder::new()
        .prefix(".storyreel-thumb-")
        .suffix(&format!(".{}", extension))
        .tempfile_in(parent)?;

    let mut args: Vec<OsString> = vec!["-y".into(), "-hide_banner".into()];
    args.extend(source.input_args(config));
    args.extend(
        [
            "-filter_complex",
            filter.as_str(),
            "-map",
            "[thumb]",
            "-frames:v",
            "1",
            "-q:v",
            "2",
            "-update",
            "1",
        ]
        .map(OsString::from),
    );
    args.push(partial.path().as_os_str().to_owned());

    ffmpeg::run(&config.ffmpeg_bin, &args).map_err(|e| ThumbnailError::Render(e.to_string()))?;
    if fs::metadata(partial.path())?.len() == 0 {
        return Err(ThumbnailError::Render("empty image written".to_string()));
    }
    partial
        .persist(output)
        .map_err(|e| ThumbnailError::Io(e.error))?;
    info!("Thumbnail saved to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{MediaInfo, ProbeError};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::TempDir;

    struct FakeProbe(MediaInfo);

    impl MediaProbe for FakeProbe {
        fn probe(&self, _path: &Path) -> std::result::Result<MediaInfo, ProbeError> {
            Ok(self.0)
        }
    }

    #[test]
    fn long_titles_are_truncated() {
        let title = "a".repeat(80);
        let shown = thumbnail_title(&title);
        assert_eq!(shown.chars().count(), 53);
        assert!(shown.ends_with("..."));
        assert_eq!(thumbnail_title("  AITA for testing?  "), "AITA for testing?");
    }

    #[test]
    fn samples_one_second_in() {
        let pool = BackgroundPool::new(vec!["/bg/a.mp4".into()]);
        let probe = FakeProbe(MediaInfo {
            dimensions: Some((1920, 1080)),
            duration: 60.0,
        });
        let config = VideoAssemblyConfig::default();
        let source =
            ThumbnailSource::select(&pool, &probe, &mut StdRng::seed_from_u64(3), &config).unwrap();
        let ThumbnailSource::Frame { at, crop, .. } = &source else {
            panic!("expected a frame source");
        };
        assert_eq!(*at, 1.0);
        assert_eq!((crop.width, crop.height), (1080, 1920));
    }

    #[test]
    fn very_short_source_samples_first_frame() {
        let pool = BackgroundPool::new(vec!["/bg/a.mp4".into()]);
        let probe = FakeProbe(MediaInfo {
            dimensions: Some((1080, 1920)),
            duration: 0.5,
        });
        let source = ThumbnailSource::select(
            &pool,
            &probe,
            &mut StdRng::seed_from_u64(3),
            &VideoAssemblyConfig::default(),
        )
        .unwrap();
        assert!(matches!(source, ThumbnailSource::Frame { at, .. } if at == 0.0));
    }

    #[test]
    fn unsized_stream_is_an_error_not_a_panic() {
        let pool = BackgroundPool::new(vec!["/bg/a.mp4".into()]);
        let probe = FakeProbe(MediaInfo {
            dimensions: Some((0, 0)),
            duration: 30.0,
        });
        let err = ThumbnailSource::select(
            &pool,
            &probe,
            &mut StdRng::seed_from_u64(3),
            &VideoAssemblyConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ThumbnailError::Background { .. }));
    }

    #[test]
    fn filter_draws_title_then_badge() {
        let config = VideoAssemblyConfig::default();
        let font = FontSource::Family("Sans".into());
        let badge = Badge::at("tifu", 40, (50, 50));
        let files = vec![PathBuf::from("/t/0.txt"), PathBuf::from("/t/1.txt")];
        let filter = thumbnail_filter(
            &ThumbnailSource::Solid,
            &files,
            &badge,
            Path::new("/t/b.txt"),
            &font,
            &config,
        );
        assert!(filter.starts_with("[0:v]drawtext="));
        assert!(filter.ends_with("[thumb]"));
        assert_eq!(filter.matches("fontsize=60").count(), 2);
        assert!(filter.find("fontsize=60").unwrap() < filter.find("fontsize=40").unwrap());
        assert!(filter.contains("borderw=3:bordercolor=black"));
        assert!(filter.contains("x=60:y=60"));
    }

    #[test]
    fn failure_is_reported_and_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("thumb.jpg");
        let config = VideoAssemblyConfig {
            ffmpeg_bin: "storyreel-missing-ffmpeg".into(),
            ..Default::default()
        };
        let err = render_thumbnail(&ThumbnailSource::Solid, "Title", "tifu", &output, &config)
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::Render(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
