use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hearme_recorder::{
    create_router, input_device, rewrite_header, AppState, AudioFile, CaptureSession, Config,
    InputSource, Microphone, RecordingHandler, ReviewUploader, SessionConfig, HEADER_LEN,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hearme-recorder")]
#[command(about = "Record audio reviews to WAV files")]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/hearme-recorder")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control API
    Serve,

    /// Record a single review
    Record {
        /// Seconds to record before stopping (Ctrl-C stops early)
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Discard the recording instead of finalizing it
        #[arg(long)]
        cancel: bool,

        /// Replay a WAV file instead of using the microphone
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Print the header and contents of a WAV file
    Inspect { path: PathBuf },

    /// Rewrite a WAV header from the file length
    Repair { path: PathBuf },

    /// List available input devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve => serve(Config::load(&cli.config)?).await,
        Command::Record {
            duration,
            cancel,
            input,
        } => record(Config::load(&cli.config)?, duration, cancel, input).await,
        Command::Inspect { path } => inspect(path),
        Command::Repair { path } => {
            let cfg = Config::load(&cli.config)?;
            let data_len = rewrite_header(&path, cfg.audio.format())?;
            info!("Header rewritten: {} ({} data bytes)", path.display(), data_len);
            Ok(())
        }
        Command::Devices => {
            for name in Microphone::list_devices() {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

async fn serve(cfg: Config) -> Result<()> {
    info!("{} starting", cfg.service.name);
    info!("Recordings directory: {}", cfg.audio.recordings_dir().display());
    info!("Uploads directory: {}", cfg.uploads.dir().display());

    let handler: Arc<dyn RecordingHandler> = Arc::new(ReviewUploader::new(cfg.uploads.dir()));
    let state = AppState::new(cfg.audio.recordings_dir(), cfg.audio.format(), handler);
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

async fn record(cfg: Config, duration: u64, cancel: bool, input: Option<PathBuf>) -> Result<()> {
    let config = SessionConfig::in_dir(cfg.audio.recordings_dir()).with_format(cfg.audio.format());
    let session_id = config.session_id.clone();
    let session = CaptureSession::new(config);
    let uploader = ReviewUploader::new(cfg.uploads.dir());

    let source = match input {
        Some(path) => InputSource::File(path),
        None => InputSource::Microphone,
    };

    session
        .start(input_device(&source))
        .await
        .context("Failed to start recording")?;

    info!("Recording for {} seconds (Ctrl-C to stop early)", duration);

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(duration)) => {}
        _ = tokio::signal::ctrl_c() => warn!("Interrupted, stopping early"),
    }

    if cancel {
        session.cancel().await?;
        uploader.on_cancelled(&session_id).await?;
        return Ok(());
    }

    let recording = session.finish().await?;
    uploader.on_recorded(&recording).await?;

    println!("{}", recording.path.display());

    Ok(())
}

fn inspect(path: PathBuf) -> Result<()> {
    let header = AudioFile::read_header(&path)?;
    let file_len = std::fs::metadata(&path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();

    println!("File:            {}", path.display());
    println!("File length:     {} bytes", file_len);
    println!("Sample rate:     {} Hz", header.format.sample_rate);
    println!("Channels:        {}", header.format.channels);
    println!("Bits per sample: {}", header.format.bits_per_sample);
    println!("Byte rate:       {}", header.byte_rate);
    println!("Block align:     {}", header.block_align);
    println!("RIFF chunk size: {}", header.chunk_size);
    println!("Data size:       {}", header.data_len);

    let on_disk = file_len.saturating_sub(HEADER_LEN as u64);
    if on_disk != header.data_len as u64 {
        warn!(
            "Header declares {} data bytes but file holds {}; run `repair` to fix",
            header.data_len, on_disk
        );
        return Ok(());
    }

    let audio = AudioFile::open(&path)?;
    println!("Duration:        {:.2} s", audio.duration_seconds);
    println!("Samples:         {}", audio.samples.len());

    Ok(())
}
