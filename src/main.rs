//! Eye tracker bridge: writes status, gaze and error records to stdout as JSON lines.
//!
//! Usage:
//!   gaze-bridge --policy placeholder            # synthetic sample every second
//!   gaze-bridge --policy callback --backend tobii
//!   gaze-bridge --policy callback --backend simulated --sim-rate-hz 120
//!
//! Logs go to stderr (`RUST_LOG=debug` for more); stdout carries only the stream.

use clap::Parser;
use gaze_bridge::{Backend, Bridge, BridgeError, Config, EyeTrackerSdk, JsonLineSink, Policy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "gaze-bridge", version)]
#[command(about = "Stream eye tracker gaze data to stdout as newline-delimited JSON", long_about = None)]
struct Cli {
    /// Sampling policy.
    #[arg(long, value_enum, env = "GAZE_BRIDGE_POLICY", default_value = "placeholder")]
    policy: Policy,

    /// Device access backend.
    #[arg(long, value_enum, env = "GAZE_BRIDGE_BACKEND", default_value = "hid")]
    backend: Backend,

    /// Placeholder tick in milliseconds.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Stop after this many placeholder iterations or callback gaze records.
    #[arg(long)]
    max_samples: Option<u64>,

    /// Capacity of the delivery channel (callback policy).
    #[arg(long, default_value_t = 256)]
    channel_capacity: usize,

    /// Shutdown poll period in milliseconds (callback policy).
    #[arg(long, default_value_t = 10)]
    poll_ms: u64,

    /// Number of simulated trackers.
    #[arg(long, default_value_t = 1)]
    sim_devices: usize,

    /// Simulated sample rate.
    #[arg(long, default_value_t = 60)]
    sim_rate_hz: u32,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            policy: self.policy,
            backend: self.backend,
            interval: Duration::from_millis(self.interval_ms),
            max_samples: self.max_samples,
            channel_capacity: self.channel_capacity,
            poll_interval: Duration::from_millis(self.poll_ms),
            sim_devices: self.sim_devices,
            sim_rate_hz: self.sim_rate_hz,
        }
    }
}

fn open_sdk(config: &Config) -> Result<Box<dyn EyeTrackerSdk>, BridgeError> {
    match config.backend {
        #[cfg(feature = "hid")]
        Backend::Hid => Ok(Box::new(gaze_bridge::hid::HidSdk::new())),
        #[cfg(not(feature = "hid"))]
        Backend::Hid => Err(BridgeError::BackendUnavailable("hid")),
        #[cfg(feature = "tobii")]
        Backend::Tobii => Ok(Box::new(gaze_bridge::tobii::TobiiSdk::new())),
        #[cfg(not(feature = "tobii"))]
        Backend::Tobii => Err(BridgeError::BackendUnavailable("tobii")),
        Backend::Simulated => Ok(Box::new(gaze_bridge::SimulatedSdk::new(
            config.sim_devices,
            config.sim_rate_hz,
        ))),
    }
}

fn run(config: &Config) -> Result<(), BridgeError> {
    config.validate()?;
    let sdk = open_sdk(config)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    // The placeholder stream has no clean exit; SIGINT keeps its default meaning there.
    if config.policy == Policy::Callback {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            log::info!("Received interrupt, stopping gaze stream");
            flag.store(true, Ordering::SeqCst);
        }) {
            log::warn!("Failed to install interrupt handler: {}", e);
        }
    }

    log::info!(
        "Starting bridge: policy={:?} backend={}",
        config.policy,
        sdk.name()
    );
    let mut bridge = Bridge::with_shutdown(JsonLineSink::stdout(), shutdown);
    let summary = bridge.run(sdk.as_ref(), config)?;
    log::info!(
        "Bridge finished: device_found={} gaze={} runtime_errors={} dropped={}",
        summary.device_found,
        summary.gaze_records,
        summary.runtime_errors,
        summary.dropped_samples
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli.config()) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
