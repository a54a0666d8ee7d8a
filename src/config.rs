use crate::{BridgeError, Result};
use std::time::Duration;

/// How the sampling phase produces gaze records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Policy {
    /// Synthetic sample on a fixed interval; with no device, one sample then `no_device`.
    Placeholder,
    /// Real samples from the tracker's callback; with no device, `no_device` and exit.
    Callback,
}

/// Which device access library to enumerate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// USB HID bus (detection only).
    Hid,
    /// Vendor `tobii_research` library.
    Tobii,
    /// Fabricated trackers, no hardware needed.
    Simulated,
}

/// Run configuration of the bridge.
#[derive(Debug, Clone)]
pub struct Config {
    pub policy: Policy,
    pub backend: Backend,
    /// Placeholder policy tick.
    pub interval: Duration,
    /// Sample limit; `None` runs forever. The placeholder loop counts
    /// iterations (`runtime_error` ones included), the callback stream counts
    /// gaze records written.
    pub max_samples: Option<u64>,
    /// Bound of the delivery-thread → writer channel (callback policy).
    pub channel_capacity: usize,
    /// How often the writer wakes to check for shutdown (callback policy).
    pub poll_interval: Duration,
    pub sim_devices: usize,
    pub sim_rate_hz: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            policy: Policy::Placeholder,
            backend: Backend::Hid,
            interval: Duration::from_secs(1),
            max_samples: None,
            channel_capacity: 256,
            poll_interval: Duration::from_millis(10),
            sim_devices: 1,
            sim_rate_hz: 60,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(BridgeError::InvalidConfig(
                "channel capacity must be at least 1".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(BridgeError::InvalidConfig(
                "poll interval must be non-zero".into(),
            ));
        }
        if self.sim_rate_hz == 0 {
            return Err(BridgeError::InvalidConfig(
                "simulated sample rate must be at least 1 Hz".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.policy, Policy::Placeholder);
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.channel_capacity, 256);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = Config {
            channel_capacity: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(BridgeError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_poll() {
        let config = Config {
            poll_interval: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
