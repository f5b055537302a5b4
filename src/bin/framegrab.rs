use std::{
    io::{self, BufRead},
    path::PathBuf,
    sync::Arc,
    thread,
    time::Duration,
};

use clap::{ArgGroup, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use framegrab::{
    CancellationToken, DEFAULT_CAMERA_PROBE_LIMIT, DEFAULT_JPEG_QUALITY, ExtractOptions,
    ExtractionEngine, ExtractionHandle, ExtractionOutcome, ExtractionRequest, ExtractionWorker,
    FfmpegLogLevel, FfmpegSource, FrameOutputOptions, ImageFormat, MediaSession, MediaSource,
    ProgressCallback, ProgressInfo, SamplingConfig, SourceDescriptor, StatusEvent,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  framegrab info input.mp4 --json\n  framegrab extract input.mp4 --out frames --interval 2\n  framegrab extract input.mp4 --out frames --count 20 --format png --progress\n  framegrab extract camera:0 --out captures --interval 00:05\n  framegrab cameras\n  framegrab completions zsh > _framegrab";

/// Fixed bar length; progress is a fraction, not a frame count.
const PROGRESS_BAR_LENGTH: u64 = 1000;

#[derive(Debug, Parser)]
#[command(
    name = "framegrab",
    version,
    about = "Sample still frames from videos and cameras by interval or count",
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
    /// Show additional logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar while extracting.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print source metadata.
    #[command(
        visible_alias = "probe",
        after_help = "Examples:\n  framegrab info input.mp4\n  framegrab info camera:0 --json"
    )]
    Info {
        /// Video file path, or `camera:N` for a capture device.
        source: String,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// List capture devices that open and deliver a frame.
    Cameras {
        /// Number of device indices to probe, starting at 0.
        #[arg(long, default_value_t = DEFAULT_CAMERA_PROBE_LIMIT)]
        limit: u32,

        /// Output the device list as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract frames to an output directory.
    #[command(
        group(ArgGroup::new("sampling").required(true).args(["interval", "count"])),
        after_help = "Examples:\n  framegrab extract input.mp4 --out frames --interval 1.5\n  framegrab extract input.mp4 --out frames --count 12 --format png\n  framegrab extract camera:0 --out captures --count 5\n\nCamera + --count captures manually: press Enter (or type c) to capture, q to stop."
    )]
    Extract {
        /// Video file path, or `camera:N` for a capture device.
        source: String,

        /// Output directory, created if missing.
        #[arg(long)]
        out: PathBuf,

        /// Save one frame per interval (seconds, MM:SS, or HH:MM:SS).
        #[arg(long)]
        interval: Option<String>,

        /// Save this many evenly spaced frames.
        #[arg(long)]
        count: Option<u64>,

        /// Output image format (jpg, png).
        #[arg(long, default_value = "jpg")]
        format: String,

        /// JPEG quality (1-100).
        #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
        quality: u8,

        /// Output width in pixels. Height follows the aspect ratio if omitted.
        #[arg(long)]
        width: Option<u32>,

        /// Output height in pixels. Width follows the aspect ratio if omitted.
        #[arg(long)]
        height: Option<u32>,

        /// Re-seek and re-read attempts before a failing frame is skipped.
        #[arg(long, default_value_t = 1)]
        retries: u32,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn parse_timecode(value: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".into());
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds)
            .map_err(|_| format!("invalid time value: {trimmed}").into());
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(format!("invalid time format: {trimmed}").into());
    }

    let (hours, minutes, seconds_str) = if parts.len() == 3 {
        (parts[0].parse::<u64>()?, parts[1].parse::<u64>()?, parts[2])
    } else {
        (0_u64, parts[0].parse::<u64>()?, parts[1])
    };

    let seconds = seconds_str.parse::<f64>()?;
    let total_seconds = (hours as f64 * 3600.0) + (minutes as f64 * 60.0) + seconds;
    Duration::try_from_secs_f64(total_seconds)
        .map_err(|_| format!("invalid time value: {trimmed}").into())
}

fn parse_source(value: &str) -> SourceDescriptor {
    let Ok(descriptor) = value.parse::<SourceDescriptor>();
    descriptor
}

fn sampling_from_args(
    interval: Option<&str>,
    count: Option<u64>,
) -> Result<SamplingConfig, Box<dyn std::error::Error>> {
    match (interval, count) {
        (Some(interval), None) => {
            let interval = parse_timecode(interval)?;
            let sampling = SamplingConfig::ByInterval { interval };
            sampling.validate()?;
            Ok(sampling)
        }
        (None, Some(count)) => Ok(SamplingConfig::by_count(count)?),
        _ => Err("exactly one of --interval or --count is required".into()),
    }
}

fn init_logging(global: &GlobalOptions) {
    let default_filter = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(global);

    let level = match &global.log_level {
        Some(level) => level.parse::<FfmpegLogLevel>()?,
        None if global.verbose => FfmpegLogLevel::Info,
        None => FfmpegLogLevel::Error,
    };
    framegrab::set_ffmpeg_log_level(level);

    Ok(())
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(PROGRESS_BAR_LENGTH);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {percent:>3}% {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar
            .set_position((info.fraction * PROGRESS_BAR_LENGTH as f64) as u64);
        self.bar
            .set_message(format!("{} frame(s) saved", info.frames_saved));
    }
}

/// Print a status line without tearing the progress bar.
fn print_line(bar: Option<&ProgressBar>, line: String) {
    match bar {
        Some(bar) => bar.println(line),
        None => eprintln!("{line}"),
    }
}

fn print_event(event: &StatusEvent, verbose: bool, bar: Option<&ProgressBar>) {
    match event {
        StatusEvent::Message(message) => print_line(bar, message.to_string()),
        StatusEvent::Warning(warning) => print_line(
            bar,
            format!("{} {}", "warning:".yellow().bold(), warning.to_string().yellow()),
        ),
        StatusEvent::FrameSaved { path, .. } if verbose => {
            print_line(bar, format!("{} {}", "saved".green(), path.display()));
        }
        StatusEvent::FrameSkipped { index, reason } => print_line(
            bar,
            format!("{} frame #{index}: {reason}", "skipped".yellow()),
        ),
        _ => {}
    }
}

/// Forward stdin lines to manual capture: empty or `c` captures, `q` stops.
fn spawn_capture_reader(handle: &ExtractionHandle) -> io::Result<()> {
    let token = handle.cancellation_token().clone();
    let control = handle.capture_control().clone();

    thread::Builder::new()
        .name("framegrab-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if token.is_cancelled() {
                    break;
                }
                match line.trim().to_ascii_lowercase().as_str() {
                    "" | "c" => control.capture(),
                    "q" => {
                        control.stop();
                        break;
                    }
                    other => eprintln!("unknown command {other:?}: Enter/c captures, q stops"),
                }
            }
        })?;

    Ok(())
}

fn run_info(source: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let descriptor = parse_source(source);
    let mut session = FfmpegSource::new().open(&descriptor)?;
    let info = session.info().clone();
    let live = session.is_live();
    session.close();

    if json {
        let payload = json!({
            "source": descriptor.to_string(),
            "live": live,
            "width": info.width,
            "height": info.height,
            "fps": info.frames_per_second,
            "frame_count": info.has_frame_count().then_some(info.frame_count),
            "duration_seconds": info.duration().map(|duration| duration.as_secs_f64()),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{} {}", "Source:".bold(), descriptor);
        println!("{} {}", "Video:".bold(), info);
    }

    Ok(())
}

fn run_cameras(limit: u32, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let devices = framegrab::probe_cameras(&FfmpegSource::new(), limit);

    if json {
        let payload: Vec<_> = devices
            .iter()
            .map(|device| {
                json!({
                    "index": device.index,
                    "name": device.name,
                    "source": format!("camera:{}", device.index),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if devices.is_empty() {
        println!("{}", "No cameras found".yellow());
    } else {
        for device in devices {
            println!("{} (camera:{})", device.name.bold(), device.index);
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_extract(
    global: &GlobalOptions,
    source: &str,
    out: PathBuf,
    interval: Option<&str>,
    count: Option<u64>,
    format: &str,
    quality: u8,
    width: Option<u32>,
    height: Option<u32>,
    retries: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let descriptor = parse_source(source);
    let sampling = sampling_from_args(interval, count)?;
    let format: ImageFormat = format.parse()?;
    let manual_capture =
        descriptor.is_camera() && matches!(sampling, SamplingConfig::ByCount { .. });

    let frame_output = FrameOutputOptions {
        width,
        height,
        ..FrameOutputOptions::default()
    };
    let engine = Arc::new(ExtractionEngine::new(
        FfmpegSource::new().with_frame_output(frame_output),
    ));

    let token = CancellationToken::new();
    let ctrlc_token = token.clone();
    ctrlc::set_handler(move || ctrlc_token.cancel())?;

    let mut options = ExtractOptions::new()
        .with_cancellation(token)
        .with_jpeg_quality(quality)
        .with_read_retries(retries);

    let progress_bar = if global.progress {
        let progress = Arc::new(TerminalProgress::new()?);
        let bar = progress.bar.clone();
        options = options.with_progress(progress);
        Some(bar)
    } else {
        None
    };

    let request = ExtractionRequest::new(descriptor, out, sampling).with_format(format);
    let handle = ExtractionWorker::spawn(engine, request, options)?;

    if manual_capture {
        print_line(
            progress_bar.as_ref(),
            format!(
                "{} press Enter (or type c) to capture a frame, q to stop",
                "camera:".cyan().bold()
            ),
        );
        spawn_capture_reader(&handle)?;
    }

    for event in handle.events() {
        print_event(&event, global.verbose, progress_bar.as_ref());
    }

    let report = handle.join()?;
    if let Some(bar) = &progress_bar {
        bar.finish_and_clear();
    }

    match report.outcome {
        ExtractionOutcome::Completed { frames_saved } => {
            println!(
                "{} {frames_saved} frame(s) in {:.1}s",
                "done:".green().bold(),
                report.elapsed.as_secs_f64()
            );
            Ok(())
        }
        ExtractionOutcome::Cancelled { frames_saved } => {
            println!("{} after {frames_saved} frame(s)", "cancelled".yellow().bold());
            Ok(())
        }
        ExtractionOutcome::Failed { reason } => Err(reason.into()),
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Info { source, json } => run_info(&source, json)?,
        Commands::Cameras { limit, json } => run_cameras(limit, json)?,
        Commands::Extract {
            source,
            out,
            interval,
            count,
            format,
            quality,
            width,
            height,
            retries,
        } => run_extract(
            &cli.global,
            &source,
            out,
            interval.as_deref(),
            count,
            &format,
            quality,
            width,
            height,
            retries,
        )?,
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "framegrab", &mut std::io::stdout());
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
