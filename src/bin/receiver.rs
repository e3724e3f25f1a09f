//! Audio Receiver Application
//!
//! Receives the UDP audio stream and plays it on a local output device.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lan_audio_receiver::{
    audio::{list_output_devices, CpalSink},
    codec::{CodecMode, OpusFrameDecoder},
    config::ReceiverConfig,
    constants::EVENT_CHANNEL_CAPACITY,
    network::{EventPublisher, UdpBinder},
    stream::{StreamHandle, StreamLoop},
};

fn cli() -> Command {
    Command::new("receiver")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Configuration file (TOML)"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_parser(clap::value_parser!(u16))
                .help("UDP port to listen on"),
        )
        .arg(
            Arg::new("compressed")
                .long("compressed")
                .action(ArgAction::SetTrue)
                .help("Expect Opus frames instead of raw PCM"),
        )
        .arg(
            Arg::new("device")
                .short('d')
                .long("device")
                .value_name("ID")
                .help("Output device id (see --list-devices)"),
        )
        .arg(
            Arg::new("list-devices")
                .long("list-devices")
                .action(ArgAction::SetTrue)
                .help("List output devices and exit"),
        )
        .arg(
            Arg::new("stats-interval")
                .long("stats-interval")
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(u64))
                .default_value("5")
                .help("Seconds between statistics log lines, 0 to disable"),
        )
}

fn print_devices() {
    println!("\n=== Available Output Devices ===");
    for device in list_output_devices() {
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {}{}:", device.name, default_marker);
        println!("    ID: {}", device.id);
        println!("    Sample rates: {:?}", device.sample_rates);
        println!("    Channels: {:?}", device.channels);
    }
    println!();
}

fn load_config(matches: &clap::ArgMatches) -> Result<ReceiverConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ReceiverConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ReceiverConfig::load_or_default()?,
    };

    if let Some(port) = matches.get_one::<u16>("port") {
        config.network.port = *port;
    }
    if matches.get_flag("compressed") {
        config.codec.mode = CodecMode::Compressed;
    }
    if let Some(device) = matches.get_one::<String>("device") {
        config.sink.device_id = device.clone();
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let matches = cli().get_matches();
    if matches.get_flag("list-devices") {
        print_devices();
        return Ok(());
    }

    let config = load_config(&matches)?;
    tracing::info!("Starting LAN Audio Receiver on UDP port {}", config.network.port);

    let sink = CpalSink::open(&config.sink).context("opening output device")?;
    let decoder = OpusFrameDecoder::new(
        config.sink.sample_rate,
        config.sink.channels,
        config.codec.opus_frame_ms,
    )?;
    let (events, event_rx) = EventPublisher::bounded(EVENT_CHANNEL_CAPACITY);

    let stream = StreamLoop::new(&config, UdpBinder, sink)
        .with_decoder(decoder)
        .with_events(events);
    let handle = StreamHandle::spawn(stream)?;

    // Presentation side: report sender changes
    std::thread::Builder::new()
        .name("sender-events".to_string())
        .spawn(move || {
            for event in event_rx {
                tracing::info!("Sender: {}", event);
            }
        })?;

    let stats_interval = *matches.get_one::<u64>("stats-interval").unwrap_or(&5);
    let mut ticker = tokio::time::interval(Duration::from_secs(stats_interval.max(1)));
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                if handle.is_finished() {
                    break;
                }
                if stats_interval > 0 {
                    let stats = handle.stats().snapshot();
                    tracing::info!(
                        "Receiver stats: {} datagrams, {:.1} KB, {} played, {:.1}% silent, {} decode faults, {} reconnects, sender {}",
                        stats.datagrams,
                        stats.bytes as f64 / 1024.0,
                        stats.frames_played,
                        stats.silence_rate() * 100.0,
                        stats.decode_faults,
                        stats.reconnects,
                        handle
                            .sender()
                            .current()
                            .map_or_else(|| "disconnected".to_string(), |ip| ip.to_string()),
                    );
                }
            }
        }
    }

    // Joining blocks for up to one receive timeout
    tokio::task::spawn_blocking(move || handle.stop())
        .await
        .context("joining stream loop")??;

    tracing::info!("Receiver stopped");
    Ok(())
}
