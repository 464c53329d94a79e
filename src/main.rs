//! Pi-cam-sweep binary: runs the settings sweep against a V4L2 camera.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::info;

use pi_cam_sweep::traits::Result;
use pi_cam_sweep::{CameraError, Config, RpiCamera, SettingValue, Settings, V4L2Camera};

/// Capture sample images over a range of camera settings.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// V4L2 device index, overriding the config file.
    #[arg(short, long)]
    device: Option<u32>,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Preview time before each capture, in seconds.
    #[arg(long)]
    preview_secs: Option<f64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Shoot every exposure/AWB/brightness/contrast combination (default).
    Sweep {
        /// Output directory.
        #[arg(default_value = ".")]
        directory: PathBuf,
    },
    /// Capture one still image.
    Shoot {
        /// Output image path.
        location: PathBuf,
        /// Setting applied for this shot only, as key=value.
        #[arg(long = "set", value_parser = parse_setting)]
        settings: Vec<(String, SettingValue)>,
    },
    /// Record a video clip.
    Record {
        /// Output video path.
        location: PathBuf,
        /// Recording length in seconds.
        #[arg(long, default_value_t = 5.0)]
        secs: f64,
        /// Setting applied for this clip only, as key=value.
        #[arg(long = "set", value_parser = parse_setting)]
        settings: Vec<(String, SettingValue)>,
    },
}

fn parse_setting(arg: &str) -> std::result::Result<(String, SettingValue), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {arg}"))?;
    let value = value
        .parse::<SettingValue>()
        .unwrap_or_else(|never| match never {});
    Ok((key.trim().to_owned(), value))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(err) = run(args) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(device) = args.device {
        config.device = device;
    }
    if let Some(secs) = args.preview_secs {
        config.preview_secs = secs;
    }
    let preview = config.preview_duration()?;

    let mut handle = V4L2Camera::open(config.device)?.with_warmup_frames(config.warmup_frames);
    info!(
        "Camera: {} ({})",
        handle.capabilities().card,
        handle.capabilities().driver
    );

    let mut camera = RpiCamera::new(&mut handle).with_preview_duration(preview);

    let command = args.command.unwrap_or(Command::Sweep {
        directory: PathBuf::from("."),
    });
    match command {
        Command::Sweep { directory } => {
            camera.try_settings_with(&directory, &config.sweep)?;
        }
        Command::Shoot { location, settings } => {
            let settings: Settings = settings.into_iter().collect();
            camera.shoot(&location, preview, Some(&settings))?;
        }
        Command::Record {
            location,
            secs,
            settings,
        } => {
            let duration = Duration::try_from_secs_f64(secs)
                .map_err(|err| CameraError::Config(format!("invalid --secs {secs}: {err}")))?;
            let settings: Settings = settings.into_iter().collect();
            camera.record(&location, duration, Some(&settings))?;
        }
    }

    Ok(())
}
