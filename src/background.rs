use rand::Rng;
use rand::seq::SliceRandom;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{AssemblyError, Result, Stage};
use crate::ffmpeg::secs;
use crate::probe::MediaProbe;

const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "mov"];

/// Background gameplay footage available for a run.
#[derive(Debug, Clone, Default)]
pub struct BackgroundPool {
    sources: Vec<PathBuf>,
}

impl BackgroundPool {
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self { sources }
    }

    /// Collect `*.mp4` / `*.mov` files from `dir`. A missing directory is
    /// created and yields an empty pool.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
            warn!(
                "Created background footage directory {}; add gameplay videos there",
                dir.display()
            );
            return Ok(Self::default());
        }

        let mut sources = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_video = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| VIDEO_EXTENSIONS.iter().any(|v| e.eq_ignore_ascii_case(v)));
            if path.is_file() && is_video {
                sources.push(path);
            }
        }
        sources.sort();
        info!("Found {} background videos in {}", sources.len(), dir.display());
        Ok(Self { sources })
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Uniform random pick.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Path> {
        self.sources.choose(rng).map(PathBuf::as_path)
    }
}

/// Scale-then-center-crop geometry that fills the target with no bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropPlan {
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub crop_x: u32,
    pub crop_y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropPlan {
    /// `None` when either size has a zero side.
    pub fn fill(source: (u32, u32), target: (u32, u32)) -> Option<Self> {
        if source.0 == 0 || source.1 == 0 || target.0 == 0 || target.1 == 0 {
            return None;
        }
        let (sw, sh) = (source.0 as u64, source.1 as u64);
        let (tw, th) = (target.0 as u64, target.1 as u64);

        // source_ratio > target_ratio, compared without rounding.
        let (scaled_width, scaled_height) = if sw * th > tw * sh {
            // Wider than target: match height, crop the sides.
            (even_up(sw * th / sh).max(tw), th)
        } else {
            (tw, even_up(tw * sh / sw).max(th))
        };

        Some(Self {
            scaled_width: scaled_width as u32,
            scaled_height: scaled_height as u32,
            crop_x: ((scaled_width - tw) / 2) as u32,
            crop_y: ((scaled_height - th) / 2) as u32,
            width: target.0,
            height: target.1,
        })
    }

    pub fn filter(&self) -> String {
        format!(
            "scale={}:{},crop={}:{}:{}:{},setsar=1",
            self.scaled_width,
            self.scaled_height,
            self.width,
            self.height,
            self.crop_x,
            self.crop_y
        )
    }
}

/// yuv420p wants even dimensions; rounding up keeps the crop bar-free.
fn even_up(v: u64) -> u64 {
    v + (v & 1)
}

/// Whole plays of a `source`-long clip needed to cover `required` seconds.
pub fn plays_needed(source: f64, required: f64) -> u32 {
    if source <= 0.0 || required <= source {
        return 1;
    }
    (required / source).ceil() as u32
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundLayer {
    Solid {
        color: String,
        width: u32,
        height: u32,
        duration: f64,
    },
    Footage {
        path: PathBuf,
        crop: CropPlan,
        source_duration: f64,
        plays: u32,
        duration: f64,
    },
}

impl BackgroundLayer {
    /// Build the background covering `duration` at `target` size.
    pub fn select<R: Rng + ?Sized>(
        pool: &BackgroundPool,
        probe: &dyn MediaProbe,
        rng: &mut R,
        color: &str,
        target: (u32, u32),
        duration: f64,
    ) -> Result<Self> {
        let Some(path) = pool.choose(rng) else {
            warn!("No background videos found; using solid color {}", color);
            return Ok(BackgroundLayer::Solid {
                color: color.to_string(),
                width: target.0,
                height: target.1,
                duration,
            });
        };

        let info = probe
            .probe(path)
            .map_err(|e| AssemblyError::load(Stage::Background, path, e))?;
        let dimensions = info
            .dimensions
            .filter(|(w, h)| *w > 0 && *h > 0)
            .ok_or_else(|| AssemblyError::load(Stage::Background, path, "no video stream"))?;

        let crop = CropPlan::fill(dimensions, target).ok_or_else(|| {
            AssemblyError::invalid(format!("frame size {}x{} has a zero side", target.0, target.1))
        })?;
        let plays = plays_needed(info.duration, duration);
        info!(
            "Background {} ({}x{}, {:.1}s) played {}x, cropped to {}x{}",
            path.display(),
            dimensions.0,
            dimensions.1,
            info.duration,
            plays,
            target.0,
            target.1
        );

        Ok(BackgroundLayer::Footage {
            path: path.to_path_buf(),
            crop,
            source_duration: info.duration,
            plays,
            duration,
        })
    }

    pub fn duration(&self) -> f64 {
        match self {
            BackgroundLayer::Solid { duration, .. } | BackgroundLayer::Footage { duration, .. } => {
                *duration
            }
        }
    }

    /// Input arguments for ffmpeg.
    pub fn input_args(&self, fps: u32) -> Vec<OsString> {
        match self {
            BackgroundLayer::Solid {
                color,
                width,
                height,
                duration,
            } => vec![
                "-f".into(),
                "lavfi".into(),
                "-i".into(),
                format!(
                    "color=c={}:s={}x{}:r={}:d={}",
                    color,
                    width,
                    height,
                    fps,
                    secs(*duration)
                )
                .into(),
            ],
            BackgroundLayer::Footage { path, plays, .. } => {
                let mut args: Vec<OsString> = Vec::new();
                if *plays > 1 {
                    args.push("-stream_loop".into());
                    args.push((plays - 1).to_string().into());
                }
                args.push("-i".into());
                args.push(path.as_os_str().to_owned());
                args
            }
        }
    }

    /// Filter chain turning input `input` into `[{label}]`.
    pub fn filter(&self, input: usize, fps: u32, label: &str) -> String {
        match self {
            BackgroundLayer::Solid { .. } => {
                format!("[{input}:v]format=yuv420p,setsar=1[{label}]")
            }
            BackgroundLayer::Footage { crop, duration, .. } => format!(
                "[{input}:v]{},fps={fps},trim=0:{},setpts=PTS-STARTPTS,format=yuv420p[{label}]",
                crop.filter(),
                secs(*duration),
            ),
        }
    }
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

    fn assert_fills(plan: &CropPlan, target: (u32, u32)) {
        assert_eq!((plan.width, plan.height), target);
        assert!(plan.scaled_width >= target.0);
        assert!(plan.scaled_height >= target.1);
        assert!(plan.crop_x + plan.width <= plan.scaled_width);
        assert!(plan.crop_y + plan.height <= plan.scaled_height);
    }

    #[test]
    fn landscape_source_fits_height_and_crops_width() {
        let plan = CropPlan::fill((1920, 1080), (1080, 1920)).unwrap();
        assert_eq!(plan.scaled_height, 1920);
        assert_eq!(plan.scaled_width, 3414);
        assert_eq!(plan.crop_x, 1167);
        assert_eq!(plan.crop_y, 0);
        assert_fills(&plan, (1080, 1920));
    }

    #[test]
    fn tall_source_fits_width_and_crops_height() {
        let plan = CropPlan::fill((720, 1600), (1080, 1920)).unwrap();
        assert_eq!(plan.scaled_width, 1080);
        assert_eq!(plan.scaled_height, 2400);
        assert_eq!(plan.crop_y, 240);
        assert_fills(&plan, (1080, 1920));
    }

    #[test]
    fn crop_always_fills_target() {
        let sources = [(1920, 1080), (1080, 1920), (640, 480), (1, 1000), (1000, 1), (1081, 1921), (540, 960)];
        let targets = [(1080, 1920), (1920, 1080), (720, 720)];
        for source in sources {
            for target in targets {
                assert_fills(&CropPlan::fill(source, target).unwrap(), target);
            }
        }
    }

    #[test]
    fn zero_sized_source_has_no_crop() {
        assert_eq!(CropPlan::fill((0, 0), (1080, 1920)), None);
        assert_eq!(CropPlan::fill((1920, 0), (1080, 1920)), None);
        assert_eq!(CropPlan::fill((1920, 1080), (0, 1920)), None);
    }

    #[test]
    fn loops_cover_required_duration() {
        assert_eq!(plays_needed(10.0, 22.0), 3);
        assert_eq!(plays_needed(10.0, 20.0), 2);
        assert_eq!(plays_needed(10.0, 8.0), 1);
        assert_eq!(plays_needed(10.0, 10.0), 1);
    }

    #[test]
    fn short_source_is_looped_then_trimmed() {
        let pool = BackgroundPool::new(vec!["/bg/parkour.mp4".into()]);
        let probe = FakeProbe(MediaInfo {
            dimensions: Some((1920, 1080)),
            duration: 10.0,
        });
        let mut rng = StdRng::seed_from_u64(7);
        let layer =
            BackgroundLayer::select(&pool, &probe, &mut rng, "black", (1080, 1920), 22.0).unwrap();

        assert_eq!(layer.duration(), 22.0);
        let BackgroundLayer::Footage { plays, .. } = &layer else {
            panic!("expected footage");
        };
        assert_eq!(*plays, 3);
        assert_eq!(
            layer.input_args(30),
            ["-stream_loop", "2", "-i", "/bg/parkour.mp4"].map(OsString::from)
        );
        assert!(layer.filter(0, 30, "bg").contains("trim=0:22,"));
    }

    #[test]
    fn empty_pool_falls_back_to_solid_color() {
        let probe = FakeProbe(MediaInfo {
            dimensions: None,
            duration: 0.0,
        });
        let mut rng = StdRng::seed_from_u64(1);
        let layer = BackgroundLayer::select(
            &BackgroundPool::default(),
            &probe,
            &mut rng,
            "0x1E1E28",
            (1080, 1920),
            8.3,
        )
        .unwrap();
        assert_eq!(
            layer,
            BackgroundLayer::Solid {
                color: "0x1E1E28".into(),
                width: 1080,
                height: 1920,
                duration: 8.3,
            }
        );
        assert_eq!(
            layer.input_args(30)[3],
            OsString::from("color=c=0x1E1E28:s=1080x1920:r=30:d=8.3")
        );
    }

    #[test]
    fn audio_only_source_is_a_background_load_error() {
        let pool = BackgroundPool::new(vec!["/bg/song.mp4".into()]);
        let probe = FakeProbe(MediaInfo {
            dimensions: None,
            duration: 30.0,
        });
        let mut rng = StdRng::seed_from_u64(1);
        let err = BackgroundLayer::select(&pool, &probe, &mut rng, "black", (1080, 1920), 5.0)
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Background);
    }

    #[test]
    fn pool_loads_only_videos() {
        let dir = TempDir::new().unwrap();
        for name in ["b.mp4", "a.MOV", "notes.txt", "c.mkv"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let pool = BackgroundPool::load(dir.path()).unwrap();
        assert_eq!(pool.len(), 2);
        assert!(pool.sources()[0].ends_with("a.MOV"));
        assert!(pool.sources()[1].ends_with("b.mp4"));
    }

    #[test]
    fn missing_pool_directory_is_created() {
        let dir = TempDir::new().unwrap();
        let bg_dir = dir.path().join("assets").join("background_footage");
        let pool = BackgroundPool::load(&bg_dir).unwrap();
        assert!(pool.is_empty());
        assert!(bg_dir.is_dir());
    }

    #[test]
    fn choice_is_reproducible_with_a_seed() {
        let pool = BackgroundPool::new((0..5).map(|i| format!("/bg/{}.mp4", i).into()).collect());
        let first = pool.choose(&mut StdRng::seed_from_u64(42)).map(Path::to_path_buf);
        let second = pool.choose(&mut StdRng::seed_from_u64(42)).map(Path::to_path_buf);
        assert_eq!(first, second);
        assert!(first.is_some());
    }
}
