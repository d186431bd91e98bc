use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::signal;

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use vc0706_lib::{BaudRate, CameraConfig, ImageSize, SerialTransport, VC0706, capture_image, next_photo_path};

type Camera = VC0706<SerialTransport>;

/// Drive a VC0706 serial JPEG camera: query it, snap pictures, watch for motion.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial port the camera is wired to (e.g. /dev/ttyUSB0).
    #[arg(short, long)]
    port: String,
    /// Baud rate to open the port at. Overrides the config file.
    #[arg(short, long)]
    baud: Option<u32>,
    /// Camera serial number. Overrides the config file.
    #[arg(short, long)]
    serial_number: Option<u8>,
    /// JSON file with session and timing settings.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Bytes per frame buffer read (1..=95). Overrides the config file.
    #[arg(long)]
    chunk_size: Option<u8>,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print firmware version and current image settings.
    Info,
    /// Capture a single picture.
    Snapshot {
        /// Output file. Defaults to the next free IMAGEnnnnn.jpg in the current directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Capture a picture every time the camera reports motion.
    Watch {
        /// Stop after this many pictures.
        #[arg(short, long, default_value_t = 10)]
        max_pictures: u32,
        /// Directory the pictures are written to.
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        #[arg(long, default_value = "IMAGE")]
        prefix: String,
    },
    /// Change the capture resolution. Takes effect after a reset.
    Resolution {
        #[arg(value_enum)]
        size: Resolution,
    },
    /// Overlay text on the video output.
    Osd {
        /// Column, 0..=3
        x: u8,
        /// Row, 0..=15
        y: u8,
        text: String,
    },
    /// Switch the camera's serial speed.
    Baud { rate: u32 },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Resolution {
    #[value(name = "640x480")]
    Vga,
    #[value(name = "320x240")]
    Qvga,
    #[value(name = "160x120")]
    Qqvga,
    #[value(name = "1024x768")]
    Xga,
    #[value(name = "1280x720")]
    Hd720,
    #[value(name = "1280x960")]
    Sxga,
    #[value(name = "1920x1080")]
    Hd1080,
}

impl From<Resolution> for ImageSize {
    fn from(value: Resolution) -> Self {
        match value {
            Resolution::Vga => ImageSize::Vga,
            Resolution::Qvga => ImageSize::Qvga,
            Resolution::Qqvga => ImageSize::Qqvga,
            Resolution::Xga => ImageSize::Xga,
            Resolution::Hd720 => ImageSize::Hd720,
            Resolution::Sxga => ImageSize::Sxga,
            Resolution::Hd1080 => ImageSize::Hd1080,
        }
    }
}

fn setup_logging(
    log_file_path: Option<PathBuf>,
    verbosity: &Verbosity<InfoLevel>,
) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path)
            .with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // INFO by default, DEBUG with -v (serial traffic), TRACE with -vv
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

fn load_config(cli: &Cli) -> Result<CameraConfig> {
    let mut config = match &cli.config {
        Some(path) => CameraConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => CameraConfig::default(),
    };
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    if let Some(serial_number) = cli.serial_number {
        config.serial_number = serial_number;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    debug!(?config, "Effective configuration");
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;
    let config = load_config(&cli)?;

    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = Arc::clone(&stop);
    let mut worker = tokio::task::spawn_blocking(move || run(cli, config, &worker_stop));

    tokio::select! {
        res = &mut worker => {
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("Camera session failed: {:?}", e);
                    process::exit(1);
                }
                Err(e) => {
                    error!("Camera task panicked: {:?}", e);
                    process::exit(1);
                }
            }
        }
        _ = signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down gracefully.");
            stop.store(true, Ordering::Relaxed);
            if let Ok(Err(e)) = worker.await {
                warn!("Camera session ended with error: {:?}", e);
            }
        }
    }
    Ok(())
}

fn run(cli: Cli, config: CameraConfig, stop: &AtomicBool) -> Result<()> {
    info!(port = %cli.port, baud = config.baud_rate, "Opening camera");
    let mut camera = VC0706::from_config(SerialTransport::new(cli.port.as_str()), &config);
    camera
        .begin(config.baud_rate)
        .with_context(|| format!("Failed to start camera on {}", cli.port))?;

    match cli.command {
        Command::Info => print_info(&mut camera),
        Command::Snapshot { output } => {
            let path = match output {
                Some(path) => path,
                None => next_photo_path(".", "IMAGE")?,
            };
            let image = capture_image(&mut camera, config.chunk_size, config.chunk_retries)
                .context("Failed to capture image")?;
            save_image(&path, &image)?;
            camera.resume_video()?;
            Ok(())
        }
        Command::Watch {
            max_pictures,
            output_dir,
            prefix,
        } => watch(&mut camera, &config, stop, max_pictures, &output_dir, &prefix),
        Command::Resolution { size } => {
            let size = ImageSize::from(size);
            camera.set_image_size(size)?;
            // New size only applies after a reset
            camera.reset()?;
            println!("Image size: {}", camera.get_image_size()?);
            Ok(())
        }
        Command::Osd { x, y, text } => {
            if x > 3 || y > 15 {
                bail!("OSD position ({}, {}) is outside the 4x16 grid", x, y);
            }
            camera.osd(x, y, &text)?;
            Ok(())
        }
        Command::Baud { rate } => {
            let rate = BaudRate::from_bps(rate)?;
            let reply = camera.set_baud_rate(rate)?;
            info!("Camera replied: {:02x?}", reply.as_ref());
            camera
                .reopen(rate.as_bps())
                .context("Failed to reopen port at new baud rate")?;
            println!("Baud rate set to {}", rate);
            Ok(())
        }
    }
}

fn print_info(camera: &mut Camera) -> Result<()> {
    println!("Version:     {}", camera.get_version()?);
    println!("Image size:  {}", camera.get_image_size()?);
    println!("Compression: {:#04x}", camera.get_compression()?);
    println!("Downsize:    {:#04x}", camera.get_downsize()?);
    let report = camera.get_ptz()?;
    println!("Window:      {}x{}", report.width, report.height);
    println!(
        "PTZ:         rotation {} horizontal {} pan {} tilt {}",
        report.ptz.rotation, report.ptz.horizontal, report.ptz.pan, report.ptz.tilt
    );
    Ok(())
}

fn save_image(path: &Path, image: &Bytes) -> Result<()> {
    fs::write(path, image).with_context(|| format!("Failed to write image to {:?}", path))?;
    info!(bytes = image.len(), "Saved {:?}", path);
    Ok(())
}

fn watch(
    camera: &mut Camera,
    config: &CameraConfig,
    stop: &AtomicBool,
    max_pictures: u32,
    output_dir: &Path,
    prefix: &str,
) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;
    camera.set_motion_detect(true)?;
    info!("Watching for motion...");

    let mut taken = 0;
    while taken < max_pictures && !stop.load(Ordering::Relaxed) {
        match camera.motion_detected() {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) if e.is_recoverable() => {
                warn!("Ignoring stray bytes while watching: {}", e);
                camera.flush_input()?;
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        // Motion reports would interleave with the frame data
        camera.set_motion_detect(false)?;
        match capture_image(camera, config.chunk_size, config.chunk_retries) {
            Ok(image) => {
                let path = next_photo_path(output_dir, prefix)?;
                save_image(&path, &image)?;
                taken += 1;
            }
            Err(e) if e.is_recoverable() => warn!("Capture failed, waiting for next motion: {}", e),
            Err(e) => return Err(e.into()),
        }
        camera.resume_video()?;
        camera.set_motion_detect(true)?;
    }

    camera.set_motion_detect(false)?;
    info!(taken, "Finished watching");
    Ok(())
}
