use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use chime_device::config::{Config, Overrides, CLIP_BLOB};
use chime_device::connectivity::{
    ConnectivityManager, NmcliLink, PortalProvisioner,
};
use chime_device::device::{AudioBus, CpalAudioBus, FsStore, HttpTransport};
use chime_device::trigger::TriggerButton;
use chime_device::workflow::capture;
use chime_device::Daemon;

/// Chime - push-to-talk voice assistant appliance
#[derive(Parser)]
#[command(name = "chime", version, about)]
struct Cli {
    /// Base URL of the processing service
    #[arg(long, env = "CHIME_BASE_URL")]
    base_url: Option<String>,

    /// Statically configured network name
    #[arg(long, env = "CHIME_SSID")]
    ssid: Option<String>,

    /// Statically configured passphrase
    #[arg(long, env = "CHIME_PASSWORD")]
    password: Option<String>,

    /// Data directory for the audio blobs
    #[arg(long, env = "CHIME_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Recording duration in seconds
    #[arg(long)]
    record_secs: Option<u32>,

    /// Wireless interface to pin nmcli to
    #[arg(long, env = "CHIME_INTERFACE")]
    interface: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Record one clip to a file without uploading it
    Record {
        /// Output WAV path
        #[arg(default_value = "clip.wav")]
        output: PathBuf,
    },
    /// Run one provisioning portal session
    Provision,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,chime_device=info",
        1 => "info,chime_device=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(Overrides {
        base_url: cli.base_url,
        data_dir: cli.data_dir,
        ssid: cli.ssid,
        password: cli.password,
        record_secs: cli.record_secs,
    })?;

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::Record { output } => record(&config, &output).await,
            Command::Provision => provision(&config, cli.interface).await,
        };
    }

    tracing::info!(
        base_url = %config.base_url,
        record_secs = config.capture.record_secs,
        "starting chime"
    );

    // Storage initialization is the one boot-fatal failure
    let store = FsStore::init(config.data_dir.clone())?;
    let bus = CpalAudioBus::new()?;
    let transport = HttpTransport::new()?;

    let link = NmcliLink::new(cli.interface);
    let provisioner = PortalProvisioner::new(config.portal.clone());
    let connectivity = ConnectivityManager::new(
        Box::new(link),
        Box::new(provisioner),
        config.connectivity.clone(),
        config.credentials.clone(),
        config.fallback_credentials.clone(),
    );

    let daemon = Daemon::new(
        config,
        Box::new(bus),
        Box::new(store),
        Box::new(transport),
        connectivity,
    );

    spawn_stdin_trigger(daemon.trigger());
    tracing::info!("press Enter to talk");

    daemon.run().await?;
    Ok(())
}

/// Feed stdin line events into the trigger, standing in for the GPIO edge
/// source on machines without the button wired up
fn spawn_stdin_trigger(trigger: Arc<TriggerButton>) {
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            trigger.press();
        }
    });
}

/// Test microphone input with a level meter
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut bus = CpalAudioBus::new()?;

    // One second of 16 kHz/16-bit mono per read
    let mut block = vec![0u8; 32_000];
    for i in 0..duration {
        bus.read(&mut block, Duration::from_secs(3)).await?;

        let samples: Vec<i16> = block
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let rms = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = ((rms * 100.0).min(50.0)) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {rms:.4} | Peak: {peak:5} | [{meter}]", i + 1);
    }

    println!("\nIf you saw movement in the meter, your mic is working.");
    Ok(())
}

/// RMS energy of 16-bit samples, normalized to [0, 1]
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples
        .iter()
        .map(|&s| {
            let v = f32::from(s) / 32768.0;
            v * v
        })
        .sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine tone
#[allow(clippy::future_not_send)]
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440 Hz tone for 2 seconds\n");

    let mut bus = CpalAudioBus::new()?;

    let sample_rate = 16_000.0_f32;
    let frequency = 440.0_f32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let num_samples = (sample_rate * 2.0) as usize;

    let mut pcm = Vec::with_capacity(num_samples * 2);
    for i in 0..num_samples {
        #[allow(clippy::cast_precision_loss)]
        let t = i as f32 / sample_rate;
        #[allow(clippy::cast_possible_truncation)]
        let sample = ((2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 * 32767.0) as i16;
        pcm.extend_from_slice(&sample.to_le_bytes());
    }

    let mut offset = 0;
    while offset < pcm.len() {
        offset += bus
            .write(&pcm[offset..], Duration::from_millis(100))
            .await?;
    }
    bus.flush_playback().await?;

    println!("If you heard the tone, your speaker is working.");
    Ok(())
}

/// Record one clip through the capture pipeline and save it
#[allow(clippy::future_not_send)]
async fn record(config: &Config, output: &PathBuf) -> anyhow::Result<()> {
    println!(
        "Recording {} seconds to {}...",
        config.capture.record_secs,
        output.display()
    );

    let store = FsStore::init(config.data_dir.clone())?;
    let mut bus = CpalAudioBus::new()?;

    let written = capture::capture_clip(&mut bus, &store, CLIP_BLOB, &config.capture).await?;
    std::fs::copy(config.data_dir.join(CLIP_BLOB), output)?;

    println!("Wrote {written} data bytes to {}", output.display());
    Ok(())
}

/// Run one provisioning portal session and print the result
#[allow(clippy::future_not_send)]
async fn provision(config: &Config, interface: Option<String>) -> anyhow::Result<()> {
    println!(
        "Starting provisioning access point \"{}\" (portal on port {})...",
        config.portal.ssid, config.portal.http_port
    );

    let link = NmcliLink::new(interface);
    match chime_device::connectivity::portal::run(&link, &config.portal).await? {
        Some(credentials) => println!("Collected credentials for \"{}\"", credentials.ssid),
        None => println!("Provisioning timed out without a submission"),
    }
    Ok(())
}
