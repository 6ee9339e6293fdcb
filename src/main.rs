use anyhow::{Context, Result};
use attention_tracker::{
    app::{AppConfig, AttentionApp, VideoSource},
    config::Config,
};
use clap::Parser;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera index to use
    #[arg(long)]
    cam: Option<i32>,

    /// Video file to process instead of a camera
    #[arg(short, long)]
    video: Option<String>,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Disable the object-based distraction signal
    #[arg(long)]
    no_distraction: bool,

    /// Flip frames horizontally before processing
    #[arg(short, long)]
    mirror: bool,

    /// Run without a display window
    #[arg(long)]
    headless: bool,

    /// Duration of the head calibration phase in seconds
    #[arg(long)]
    head_calibration_secs: Option<f64>,

    /// Duration of the pupil calibration phase in seconds
    #[arg(long)]
    pupil_calibration_secs: Option<f64>,
}

impl Args {
    /// Command-line flags take precedence over the configuration file
    fn apply_overrides(&self, settings: &mut Config) {
        if let Some(cam) = self.cam {
            settings.camera.index = cam;
        }
        if self.no_distraction {
            settings.distraction.enabled = false;
        }
        if self.mirror {
            settings.camera.mirror = true;
        }
        if self.headless {
            settings.display.show_window = false;
        }
        if let Some(secs) = self.head_calibration_secs {
            settings.calibration.head_duration_secs = secs;
        }
        if let Some(secs) = self.pupil_calibration_secs {
            settings.calibration.pupil_duration_secs = secs;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    info!("Attention tracker {}", env!("CARGO_PKG_VERSION"));

    let mut settings = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {path}");
            Config::from_file(path).with_context(|| format!("Failed to load configuration from {path}"))?
        }
        None => Config::default(),
    };
    args.apply_overrides(&mut settings);

    let video_source = match &args.video {
        Some(path) => VideoSource::File(path.clone()),
        None => VideoSource::Camera(settings.camera.index),
    };

    let mut app = AttentionApp::new(AppConfig {
        video_source,
        settings,
    })
    .context("Failed to initialize attention tracker")?;
    app.run()?;

    Ok(())
}
