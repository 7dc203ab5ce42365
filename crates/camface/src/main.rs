use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod app;
mod badge;
mod cadence;
mod capture_loop;
mod config;
mod detection;
mod guard;
mod inspect;
mod landmarks;
mod match_engine;
mod passport;
mod render;
mod surface;

use app::{App, Command};
use cadence::Cadence;
use camface_core::OnnxAnalyzer;
use camface_hw::{Camera, FrameSource, StillSource};
use config::Config;
use render::Painter;
use surface::FileSurface;

#[derive(Parser)]
#[command(name = "camface", version, about = "Live camera face tools")]
struct Cli {
    /// V4L2 device path (overrides CAMFACE_CAMERA_DEVICE)
    #[arg(long, global = true)]
    device: Option<String>,

    /// Replay a still image instead of opening a camera
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Directory containing the ONNX models (overrides CAMFACE_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Directory for live/preview/badge images (overrides CAMFACE_PREVIEW_DIR)
    #[arg(long, global = true)]
    preview_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Live face boxes; `c` saves a passport photo of every face
    Passport {
        /// Output directory (overrides CAMFACE_OUTPUT_DIR)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Live facial landmark viewer
    Landmarks,
    /// Face lock: `s` saves the current face, `l <path>` loads one
    Guard {
        /// Load this reference face at startup
        #[arg(long)]
        reference: Option<PathBuf>,
    },
    /// Detect faces in an image and print them as JSON
    Detect {
        image: PathBuf,
        /// Include face encodings
        #[arg(long)]
        encode: bool,
    },
    /// List V4L2 capture devices
    Devices,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(device) = cli.device {
        config.camera_device = device;
    }
    if let Some(dir) = cli.model_dir {
        config.model_dir = dir;
    }
    if let Some(dir) = cli.preview_dir {
        config.preview_dir = dir;
    }

    match cli.command {
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for d in devices {
                println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
            }
            Ok(())
        }
        Commands::Detect { image, encode } => {
            let mut analyzer = load_analyzer(&config)?;
            let report = inspect::inspect_image(&mut analyzer, &image, encode)
                .with_context(|| format!("analyzing {}", image.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Passport { output_dir } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            let mut app = passport::PassportApp::new(
                config.detect_interval.map_or_else(Cadence::every_tick, Cadence::new),
                config.downscale.unwrap_or(1),
                config.output_dir.clone(),
            );
            println!("Commands: c = capture passport photos, q = quit");
            run_app(&config, cli.input, &mut app, None).await
        }
        Commands::Landmarks => {
            let mut app = landmarks::LandmarkApp::new(
                Painter::new(render::load_font(config.font_path.as_deref())),
                Cadence::new(config.detect_interval.unwrap_or(5)),
                config.downscale.unwrap_or(2),
            );
            println!("Commands: q = quit");
            run_app(&config, cli.input, &mut app, None).await
        }
        Commands::Guard { reference } => {
            let mut app = guard::GuardApp::new(
                Painter::new(render::load_font(config.font_path.as_deref())),
                Cadence::new(config.detect_interval.unwrap_or(2)),
                config.downscale.unwrap_or(4),
                config.match_tolerance,
                config.reference_dir.clone(),
            );
            println!("Commands: s = save current face, l <path> = load face, q = quit");
            run_app(&config, cli.input, &mut app, reference.map(Command::LoadFace)).await
        }
    }
}

fn load_analyzer(config: &Config) -> Result<OnnxAnalyzer> {
    let analyzer = OnnxAnalyzer::load(&config.scrfd_model_path(), &config.arcface_model_path())
        .with_context(|| format!("loading models from {}", config.model_dir.display()))?;
    tracing::info!(model_dir = %config.model_dir.display(), "face models loaded");
    Ok(analyzer)
}

fn open_source(config: &Config, input: Option<PathBuf>) -> Result<Box<dyn FrameSource>> {
    match input {
        Some(path) => {
            let source = StillSource::open(&path)
                .with_context(|| format!("opening {}", path.display()))?;
            Ok(Box::new(source))
        }
        None => {
            let camera = Camera::open(&config.camera_device)
                .with_context(|| format!("opening camera {}", config.camera_device))?;
            Ok(Box::new(camera))
        }
    }
}

async fn run_app(
    config: &Config,
    input: Option<PathBuf>,
    app: &mut dyn App,
    first: Option<Command>,
) -> Result<()> {
    let mut source = open_source(config, input)?;
    let mut analyzer = load_analyzer(config)?;
    let mut surface = FileSurface::new(&config.preview_dir, config.preview_every)
        .with_context(|| format!("preparing {}", config.preview_dir.display()))?;

    let (tx, rx) = mpsc::channel(16);
    if let Some(command) = first {
        tx.try_send(command).context("queueing startup command")?;
    }
    capture_loop::spawn_stdin_reader(tx).context("starting command reader")?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    capture_loop::run(
        app,
        source.as_mut(),
        &mut analyzer,
        &mut surface,
        config.tick_period(),
        rx,
        shutdown,
    )
    .await;

    Ok(())
}
