//! # gaze-bridge - eye tracker to JSON-lines bridge
//!
//! Detects an eye tracker and streams its gaze data to a parent process as
//! newline-delimited JSON. Provides:
//! - Device enumeration through pluggable backends (HID bus, vendor SDK, simulator)
//! - A fixed-interval placeholder stream and a real callback-driven stream
//! - Typed records and a line parser for the consuming side
//!
//! ## Quick Start
//! ```no_run
//! use gaze_bridge::{Bridge, Config, JsonLineSink, Policy, SimulatedSdk};
//!
//! let config = Config {
//!     policy: Policy::Callback,
//!     max_samples: Some(100),
//!     ..Config::default()
//! };
//! let mut bridge = Bridge::new(JsonLineSink::stdout());
//! let summary = bridge.run(&SimulatedSdk::new(1, 60), &config).unwrap();
//! eprintln!("streamed {} samples", summary.gaze_records);
//! ```

pub mod error;
pub mod types;
pub mod protocol;
pub mod sink;
pub mod sdk;
pub mod hid;
pub mod simulated;
#[cfg(feature = "tobii")]
pub mod tobii;
pub mod config;
pub mod bridge;
pub mod listener;

pub use error::BridgeError;
pub use types::*;
pub use protocol::{parse_line, ParsedLine, Record};
pub use sink::{JsonLineSink, RecordSink};
pub use sdk::{EyeTracker, EyeTrackerSdk, GazeCallback};
pub use simulated::SimulatedSdk;
pub use config::{Backend, Config, Policy};
pub use bridge::{Bridge, BridgeState, RunSummary};

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
