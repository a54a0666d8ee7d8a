use crate::sdk::{EyeTracker, EyeTrackerSdk, GazeCallback};
use crate::types::{Capabilities, DeviceInfo, EyeSample, GazeSample, Validity};
use crate::{BridgeError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Chance per eye per sample that the eye is reported lost.
const BLINK_PROBABILITY: f64 = 0.03;

/// Backend that fabricates trackers, for development without hardware.
#[derive(Debug, Clone)]
pub struct SimulatedSdk {
    devices: usize,
    rate_hz: u32,
}

impl SimulatedSdk {
    pub fn new(devices: usize, rate_hz: u32) -> Self {
        Self {
            devices,
            rate_hz: rate_hz.max(1),
        }
    }
}

impl EyeTrackerSdk for SimulatedSdk {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn find_all_eyetrackers(&self) -> Result<Vec<Box<dyn EyeTracker>>> {
        Ok((0..self.devices)
            .map(|i| Box::new(SimulatedTracker::new(i, self.rate_hz)) as Box<dyn EyeTracker>)
            .collect())
    }
}

/// Synthetic tracker with its own delivery thread, like a real SDK.
pub struct SimulatedTracker {
    info: DeviceInfo,
    period: Duration,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SimulatedTracker {
    pub fn new(index: usize, rate_hz: u32) -> Self {
        SimulatedTracker {
            info: DeviceInfo {
                model: "Simulated Tracker".into(),
                device_name: format!("sim-{}", index),
                serial_number: format!("SIM{:04}", index),
                address: format!("sim://{}", index),
                capabilities: Capabilities::HAS_GAZE_DATA,
            },
            period: Duration::from_secs_f64(1.0 / f64::from(rate_hz.max(1))),
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.thread.is_some()
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl EyeTracker for SimulatedTracker {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn subscribe_gaze(&mut self, callback: GazeCallback) -> Result<()> {
        if self.thread.is_some() {
            return Err(BridgeError::AlreadySubscribed);
        }

        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();
        let period = self.period;

        let thread = std::thread::Builder::new()
            .name(format!("gaze-{}", self.info.device_name))
            .spawn(move || delivery_loop(callback, period, stop_clone))?;

        self.stop_flag = stop_flag;
        self.thread = Some(thread);
        Ok(())
    }

    fn unsubscribe_gaze(&mut self) -> Result<()> {
        self.shutdown();
        Ok(())
    }
}

impl Drop for SimulatedTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs on the delivery thread until the stop flag is set.
///
/// The eyes wander slowly around the display so consecutive samples look
/// like fixations rather than noise.
fn delivery_loop(mut callback: GazeCallback, period: Duration, stop_flag: Arc<AtomicBool>) {
    let epoch = Instant::now();
    let mut rng = fastrand::Rng::new();
    let (mut x, mut y) = (0.5_f64, 0.5_f64);

    log::info!("Simulated gaze delivery started ({:?} period)", period);

    while !stop_flag.load(Ordering::Relaxed) {
        x = (x + (rng.f64() - 0.5) * 0.02).clamp(0.0, 1.0);
        y = (y + (rng.f64() - 0.5) * 0.02).clamp(0.0, 1.0);

        let t_us = epoch.elapsed().as_micros() as i64;
        let sample = GazeSample {
            left: simulated_eye(&mut rng, x - 0.005, y),
            right: simulated_eye(&mut rng, x + 0.005, y),
            device_timestamp_us: t_us,
            system_timestamp_us: t_us,
        };
        callback(sample);

        std::thread::sleep(period);
    }

    log::info!("Simulated gaze delivery stopped");
}

fn simulated_eye(rng: &mut fastrand::Rng, x: f64, y: f64) -> EyeSample {
    if rng.f64() < BLINK_PROBABILITY {
        return EyeSample::lost();
    }
    let pupil = 2.5 + rng.f64() * 2.0;
    EyeSample::from_raw(
        x.clamp(0.0, 1.0),
        y.clamp(0.0, 1.0),
        Validity::Valid,
        pupil,
        Validity::Valid,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_enumerates_requested_count() {
        let sdk = SimulatedSdk::new(3, 60);
        let trackers = sdk.find_all_eyetrackers().unwrap();
        assert_eq!(trackers.len(), 3);
        assert_eq!(trackers[2].device_name(), "sim-2");
        assert_eq!(trackers[0].model(), "Simulated Tracker");
        assert!(SimulatedSdk::new(0, 60).find_all_eyetrackers().unwrap().is_empty());
    }

    #[test]
    fn test_delivers_until_unsubscribed() {
        let (tx, rx) = bounded::<GazeSample>(1024);
        let mut tracker = SimulatedTracker::new(0, 500);
        tracker
            .subscribe_gaze(Box::new(move |s| {
                let _ = tx.try_send(s);
            }))
            .unwrap();
        assert!(tracker.is_subscribed());

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        for eye in [first.left, first.right] {
            if let Some((x, y)) = eye.gaze_point {
                assert!((0.0..=1.0).contains(&x));
                assert!((0.0..=1.0).contains(&y));
            }
        }

        tracker.unsubscribe_gaze().unwrap();
        assert!(!tracker.is_subscribed());
        // Drain anything sent before the thread stopped; the sender is gone afterwards.
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_double_subscribe_rejected() {
        let mut tracker = SimulatedTracker::new(0, 100);
        tracker.subscribe_gaze(Box::new(|_| {})).unwrap();
        let err = tracker.subscribe_gaze(Box::new(|_| {})).unwrap_err();
        assert!(matches!(err, BridgeError::AlreadySubscribed));
        tracker.unsubscribe_gaze().unwrap();
        // Unsubscribing twice is harmless.
        tracker.unsubscribe_gaze().unwrap();
    }
}
