use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Assemble a narrated story video from a manifest")]
pub struct Args {
    /// JSON manifest with the script, audio segments and character clips.
    #[clap(long)]
    pub manifest: PathBuf,

    /// TOML file overriding assembly defaults.
    #[clap(long)]
    pub config: Option<PathBuf>,

    #[clap(long, default_value = "./assets/background_footage")]
    pub backgrounds: PathBuf,

    #[clap(long, default_value = "./output")]
    pub output_dir: PathBuf,

    #[clap(long)]
    pub no_thumbnail: bool,

    /// Also write the captions as an .srt next to the video.
    #[clap(long)]
    pub srt: bool,

    /// Fixes the background choice; overrides `seed` in the config file.
    #[clap(long)]
    pub seed: Option<u64>,
}
