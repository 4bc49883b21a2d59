use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use framepack::{
    ArchiveBuilder, ArchiveCompression, ExtractOptions, ExtractionSession, FfmpegLogLevel,
    FrameImageFormat, MediaSource, OperationType, PixelFormat, ProgressCallback, ProgressInfo,
    ReencodeOptions, Reencoder, SamplingStrategy, ThumbnailOptions, VideoCodec,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

#[cfg(feature = "hardware")]
use framepack::{HardwareAccelerationMode, HardwareDeviceType};

const CLI_AFTER_HELP: &str = "Examples:\n  framepack probe input.mp4 --json\n  framepack extract input.mp4 --interval 2 --out frames.zip --progress\n  framepack extract input.mp4 --interval 0.5 --out frames.zip --format jpg --previews previews\n  framepack reencode input.mp4 --out reversed.webm --speed 2 --reverse\n  framepack completions zsh > _framepack";

#[derive(Debug, Parser)]
#[command(
    name = "framepack",
    version,
    about = "Sample video frames into zip archives and re-encode them",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Log debug output from the library.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg's own log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, global = true)]
    ffmpeg_log_level: Option<FfmpegLogLevel>,

    /// Hardware decode mode for --strategy accelerated (auto, software, cuda, vaapi, dxva2, d3d11va, videotoolbox, qsv).
    #[arg(long, global = true)]
    hardware: Option<String>,
}

#[derive(Debug, Clone, Parser)]
struct SamplingArgs {
    /// Seconds between sampled frames.
    #[arg(long)]
    interval: f64,
    /// Sampling strategy: seek | frame | accelerated.
    #[arg(long, default_value = "frame")]
    strategy: String,
    /// Pixel layout of sampled frames: rgb8 | rgba8 | gray8.
    #[arg(long, default_value = "rgb8")]
    pixel_format: String,
    /// Seconds to wait for each frame before giving up.
    #[arg(long, default_value_t = 10.0)]
    timeout: f64,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print video metadata.
    #[command(
        about = "Print video metadata",
        visible_alias = "info",
        after_help = "Examples:\n  framepack probe input.mp4\n  framepack probe input.mp4 --json"
    )]
    Probe {
        /// Input video path.
        input: PathBuf,
        /// Output metadata as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Sample frames into a zip archive.
    #[command(
        about = "Sample frames into a zip archive",
        after_help = "Examples:\n  framepack extract input.mp4 --interval 2 --out frames.zip\n  framepack extract input.mp4 --interval 1 --out frames.zip --strategy seek --format webp --store"
    )]
    Extract {
        /// Input video path.
        input: PathBuf,
        #[command(flatten)]
        sampling: SamplingArgs,
        /// Output zip path.
        #[arg(long, default_value = framepack::DEFAULT_ARCHIVE_NAME)]
        out: PathBuf,
        /// Frame image format: png | jpg | bmp | webp.
        #[arg(long, default_value = "png")]
        format: String,
        /// Store entries without compression.
        #[arg(long)]
        store: bool,
        /// Directory to write preview thumbnails into.
        #[arg(long)]
        previews: Option<PathBuf>,
        /// Keep a preview for every Nth frame.
        #[arg(long, default_value_t = 1)]
        preview_every: u64,
        /// Longest edge of a preview, in pixels.
        #[arg(long, default_value_t = 160)]
        preview_size: u32,
    },

    /// Re-encode sampled frames into a new video.
    #[command(
        about = "Re-encode sampled frames at a new speed or in reverse",
        after_help = "Examples:\n  framepack reencode input.mp4 --out fast.webm --speed 2\n  framepack reencode input.mp4 --interval 0.1 --out slow.mp4 --codec h264 --speed 0.5 --reverse"
    )]
    Reencode {
        /// Input video path.
        input: PathBuf,
        /// Output video path.
        #[arg(long)]
        out: PathBuf,
        /// Seconds between sampled frames (default: one source frame).
        #[arg(long)]
        interval: Option<f64>,
        /// Playback speed multiplier.
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
        /// Play frames back to front.
        #[arg(long)]
        reverse: bool,
        /// Output frame rate at speed 1 (default: 1 / interval, real time).
        #[arg(long)]
        fps: Option<f64>,
        /// Output codec: vp9 | vp8 | h264.
        #[arg(long, default_value = "vp9")]
        codec: String,
        /// Sampling strategy: seek | frame | accelerated.
        #[arg(long, default_value = "frame")]
        strategy: String,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_strategy(value: &str) -> Option<SamplingStrategy> {
    match value.to_ascii_lowercase().as_str() {
        "seek" | "seek-and-wait" => Some(SamplingStrategy::SeekAndWait),
        "frame" | "callback" | "frame-callback" => Some(SamplingStrategy::FrameCallback),
        "accelerated" | "hw" | "gpu" => Some(SamplingStrategy::Accelerated),
        _ => None,
    }
}

fn parse_pixel_format(value: &str) -> Option<PixelFormat> {
    match value.to_ascii_lowercase().as_str() {
        "rgb8" | "rgb" => Some(PixelFormat::Rgb8),
        "rgba8" | "rgba" => Some(PixelFormat::Rgba8),
        "gray8" | "gray" | "greyscale" | "grayscale" => Some(PixelFormat::Gray8),
        _ => None,
    }
}

fn parse_codec(value: &str) -> Option<VideoCodec> {
    match value.to_ascii_lowercase().as_str() {
        "vp9" => Some(VideoCodec::Vp9),
        "vp8" => Some(VideoCodec::Vp8),
        "h264" | "avc" => Some(VideoCodec::H264),
        _ => None,
    }
}

#[cfg(feature = "hardware")]
fn parse_hardware_mode(value: &str) -> Option<HardwareAccelerationMode> {
    let device = match value.to_ascii_lowercase().as_str() {
        "auto" => return Some(HardwareAccelerationMode::Auto),
        "software" | "sw" | "cpu" => return Some(HardwareAccelerationMode::Software),
        "cuda" => HardwareDeviceType::Cuda,
        "vaapi" => HardwareDeviceType::Vaapi,
        "dxva2" => HardwareDeviceType::Dxva2,
        "d3d11va" => HardwareDeviceType::D3d11va,
        "videotoolbox" => HardwareDeviceType::VideoToolbox,
        "qsv" => HardwareDeviceType::Qsv,
        _ => return None,
    };
    Some(HardwareAccelerationMode::Specific(device))
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn init_logging(global: &GlobalOptions) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if global.verbose {
        builder.filter_module("framepack", log::LevelFilter::Debug);
    }
    builder.init();

    if let Some(level) = global.ffmpeg_log_level {
        framepack::set_ffmpeg_log_level(level);
    }
}

fn extract_options(
    global: &GlobalOptions,
    strategy: &str,
    pixel_format: &str,
    timeout: f64,
) -> Result<ExtractOptions, Box<dyn std::error::Error>> {
    let strategy =
        parse_strategy(strategy).ok_or(format!("unsupported --strategy: {strategy}"))?;
    let pixel = parse_pixel_format(pixel_format)
        .ok_or(format!("unsupported --pixel-format: {pixel_format}"))?;
    if !(timeout.is_finite() && timeout > 0.0) {
        return Err("--timeout must be a positive number of seconds".into());
    }

    let mut options = ExtractOptions::new()
        .with_strategy(strategy)
        .with_pixel_format(pixel)
        .with_decode_timeout(Duration::from_secs_f64(timeout));

    #[cfg(feature = "hardware")]
    if let Some(hardware) = &global.hardware {
        let mode = parse_hardware_mode(hardware)
            .ok_or(format!("unsupported --hardware mode: {hardware}"))?;
        options = options.with_hardware_acceleration(mode);
    }
    #[cfg(not(feature = "hardware"))]
    if global.hardware.is_some() {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            "--hardware requires building with the `hardware` feature".yellow()
        );
    }

    if global.progress {
        options = options.with_progress(Arc::new(BarProgress::new()?));
    }
    Ok(options)
}

/// Drives one indicatif bar from progress callbacks.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg} ({eta})",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        let label = match info.operation {
            OperationType::FrameSampling => "sampling",
            OperationType::ArchiveBuilding => "archiving",
            OperationType::Reencoding => "encoding",
            _ => "working",
        };
        self.bar.set_message(label);
        if info.total.is_some_and(|total| info.current >= total) {
            self.bar.finish_and_clear();
        }
    }
}

/// Pacing defaults to the sampling interval so speed 1 is real time.
fn reencode_options(
    interval: f64,
    fps: Option<f64>,
    speed: f64,
    reverse: bool,
    codec: VideoCodec,
    progress: bool,
) -> Result<ReencodeOptions, Box<dyn std::error::Error>> {
    let mut options = ReencodeOptions::new()
        .with_speed_factor(speed)
        .with_reverse(reverse)
        .with_codec(codec);
    options = match fps {
        Some(fps) => options.with_base_frame_rate(fps),
        None => options.with_sampling_interval(interval),
    };
    if progress {
        options = options.with_progress(Arc::new(BarProgress::new()?));
    }
    Ok(options)
}

fn save_previews(
    directory: &Path,
    frames: &framepack::FrameCollection,
) -> Result<usize, Box<dyn std::error::Error>> {
    fs::create_dir_all(directory)?;
    for thumbnail in frames.thumbnails() {
        let path = directory.join(format!("preview_{:05}.png", thumbnail.index));
        thumbnail.image.save(&path)?;
    }
    Ok(frames.thumbnails().len())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    match cli.command {
        Commands::Probe { input, json } => {
            let source = MediaSource::open(&input)?;
            let metadata = source.metadata();
            if json {
                let payload = json!({
                    "path": input.display().to_string(),
                    "format": metadata.format,
                    "codec": metadata.codec,
                    "width": metadata.width,
                    "height": metadata.height,
                    "fps": metadata.frames_per_second,
                    "frame_count": metadata.frame_count,
                    "duration_seconds": metadata.duration.as_secs_f64(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Format: {}", metadata.format);
                println!("Duration: {:.3}s", metadata.duration.as_secs_f64());
                println!(
                    "Video: {}x{} @ {:.2} fps, {} frames [{}]",
                    metadata.width,
                    metadata.height,
                    metadata.frames_per_second,
                    metadata.frame_count,
                    metadata.codec,
                );
            }
        }
        Commands::Extract {
            input,
            sampling,
            out,
            format,
            store,
            previews,
            preview_every,
            preview_size,
        } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let image_format = FrameImageFormat::from_extension(&format)
                .ok_or(format!("unsupported --format: {format}"))?;

            let mut options = extract_options(
                &cli.global,
                &sampling.strategy,
                &sampling.pixel_format,
                sampling.timeout,
            )?
            .with_image_format(image_format);
            if previews.is_some() {
                options = options
                    .with_thumbnails(ThumbnailOptions::new(preview_size).every(preview_every));
            }

            let mut session = ExtractionSession::open(&input, options)?;
            let frames = session.extract(sampling.interval)?;

            let compression = if store {
                ArchiveCompression::Stored
            } else {
                ArchiveCompression::Deflate
            };
            let mut builder = ArchiveBuilder::new().with_compression(compression);
            if cli.global.progress {
                builder = builder.with_progress(Arc::new(BarProgress::new()?));
            }

            match builder.build(&frames)? {
                Some(archive) => {
                    archive.save(&out)?;
                    println!(
                        "{} {} frames to {} ({:?})",
                        "saved".green().bold(),
                        archive.entry_count(),
                        out.display(),
                        session.strategy(),
                    );
                }
                None => println!("{}", "no frames sampled; nothing written".yellow()),
            }

            if let Some(directory) = previews {
                let count = save_previews(&directory, &frames)?;
                println!(
                    "{} {count} previews to {}",
                    "saved".green().bold(),
                    directory.display()
                );
            }
        }
        Commands::Reencode {
            input,
            out,
            interval,
            speed,
            reverse,
            fps,
            codec,
            strategy,
        } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let codec = parse_codec(&codec).ok_or(format!("unsupported --codec: {codec}"))?;

            let options = extract_options(&cli.global, &strategy, "rgb8", 10.0)?;
            let mut session = ExtractionSession::open(&input, options)?;
            let interval =
                interval.unwrap_or_else(|| session.metadata().frame_duration().as_secs_f64());

            let reencoder = Reencoder::new(reencode_options(
                interval,
                fps,
                speed,
                reverse,
                codec,
                cli.global.progress,
            )?)?;
            let frames = session.extract(interval)?;

            let written = reencoder.write(&frames, &out)?;
            if written == 0 {
                println!("{}", "no frames sampled; nothing written".yellow());
            } else {
                println!(
                    "{} {written} frames at {:.3} fps to {}",
                    "encoded".green().bold(),
                    reencoder.pacing().frame_rate(),
                    out.display()
                );
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "framepack", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
