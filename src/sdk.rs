//! The device SDK contract the bridge is written against.
//!
//! Backends (`hid`, `tobii`, `simulated`) implement these traits; the bridge
//! only ever sees `dyn EyeTrackerSdk` / `dyn EyeTracker`.

use crate::types::{DeviceInfo, GazeSample};
use crate::Result;

/// Invoked once per hardware gaze sample, on the backend's delivery thread.
pub type GazeCallback = Box<dyn FnMut(GazeSample) + Send + 'static>;

/// Entry point of a device access library.
pub trait EyeTrackerSdk {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Enumerate attached trackers. A single synchronous call; an empty list is not an error.
    fn find_all_eyetrackers(&self) -> Result<Vec<Box<dyn EyeTracker>>>;
}

/// Handle to one enumerated tracker.
pub trait EyeTracker: Send {
    fn info(&self) -> &DeviceInfo;

    fn model(&self) -> &str {
        &self.info().model
    }

    fn device_name(&self) -> &str {
        &self.info().device_name
    }

    /// Start delivering gaze samples to `callback`.
    ///
    /// Fails with `AlreadySubscribed` if a subscription is active.
    fn subscribe_gaze(&mut self, callback: GazeCallback) -> Result<()>;

    /// Stop delivery. No-op when not subscribed. After it returns the callback
    /// is not invoked again.
    fn unsubscribe_gaze(&mut self) -> Result<()>;
}
