//! The device bridge: enumerate, report, then stream.
//!
//! Two sampling policies share the same front half:
//!
//! - **Placeholder**: a synthetic gaze record every `interval`. Each iteration
//!   yields a [`SampleOutcome`]; a failed iteration becomes a `runtime_error`
//!   record and the loop carries on. With no device, one synthetic record is
//!   still emitted before the `no_device` error.
//! - **Callback**: the tracker's delivery thread pushes records into a bounded
//!   channel; the bridge's thread is the only writer to the sink. Stops on the
//!   shutdown flag, unsubscribes once and writes `Stopped.`.

use crate::config::{Config, Policy};
use crate::protocol::{BinocularGaze, GazeRecord, Record, STOPPED_LINE};
use crate::sdk::{EyeTracker, EyeTrackerSdk};
use crate::sink::RecordSink;
use crate::{BridgeError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Where the bridge is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    NoDevice,
    DeviceReady,
    Streaming,
}

/// Result of one placeholder iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    Sample(Record),
    Failed(String),
}

/// Wall-clock source, swappable for tests.
pub type Clock = fn() -> SystemTime;

/// Produces synthetic gaze records with uniformly random coordinates in [0, 1).
pub struct PlaceholderSource {
    rng: fastrand::Rng,
    clock: Clock,
}

impl Default for PlaceholderSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaceholderSource {
    pub fn new() -> Self {
        Self::with_clock(SystemTime::now)
    }

    pub fn with_clock(clock: Clock) -> Self {
        PlaceholderSource {
            rng: fastrand::Rng::new(),
            clock,
        }
    }

    pub fn next_sample(&mut self) -> SampleOutcome {
        match (self.clock)().duration_since(UNIX_EPOCH) {
            Ok(now) => SampleOutcome::Sample(Record::placeholder(
                now.as_secs_f64(),
                self.rng.f64(),
                self.rng.f64(),
            )),
            Err(e) => SampleOutcome::Failed(format!("system clock is before the Unix epoch: {}", e)),
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub gaze_records: u64,
    pub runtime_errors: u64,
    /// Callback samples dropped because the channel was full.
    pub dropped_samples: u64,
    pub device_found: bool,
}

/// Bridges one tracker to a record sink.
pub struct Bridge<S: RecordSink> {
    sink: S,
    state: BridgeState,
    shutdown: Arc<AtomicBool>,
    /// Stamps real gaze records at delivery.
    clock: Clock,
}

impl<S: RecordSink> Bridge<S> {
    pub fn new(sink: S) -> Self {
        Self::with_shutdown(sink, Arc::new(AtomicBool::new(false)))
    }

    /// Use an externally owned shutdown flag (e.g. one set from a signal handler).
    pub fn with_shutdown(sink: S, shutdown: Arc<AtomicBool>) -> Self {
        Bridge {
            sink,
            state: BridgeState::Uninitialized,
            shutdown,
            clock: SystemTime::now,
        }
    }

    /// Replace the wall clock used to timestamp callback records.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn transition(&mut self, next: BridgeState) {
        log::debug!("bridge state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn stop_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Write one record to the sink.
    pub fn emit(&mut self, record: &Record) -> Result<()> {
        self.sink.emit(record)
    }

    /// Ask the SDK for attached trackers. Moves to `NoDevice` or `DeviceReady`.
    pub fn enumerate(&mut self, sdk: &dyn EyeTrackerSdk) -> Result<Vec<Box<dyn EyeTracker>>> {
        let trackers = sdk.find_all_eyetrackers()?;
        log::info!("{} backend found {} tracker(s)", sdk.name(), trackers.len());
        if trackers.is_empty() {
            self.transition(BridgeState::NoDevice);
        } else {
            self.transition(BridgeState::DeviceReady);
        }
        Ok(trackers)
    }

    /// Emit the `device_detected` status record for `tracker`.
    pub fn report_status(&mut self, tracker: &dyn EyeTracker) -> Result<()> {
        log::info!(
            "Using tracker model={} name={}",
            tracker.model(),
            tracker.device_name()
        );
        self.emit(&Record::device_detected(tracker.info()))
    }

    /// Enumerate and stream according to `config.policy`.
    pub fn run(&mut self, sdk: &dyn EyeTrackerSdk, config: &Config) -> Result<RunSummary> {
        config.validate()?;
        match config.policy {
            Policy::Placeholder => self.run_placeholder(sdk, config, PlaceholderSource::new()),
            Policy::Callback => self.run_callback(sdk, config),
        }
    }

    /// Fixed-interval synthetic stream.
    pub fn run_placeholder(
        &mut self,
        sdk: &dyn EyeTrackerSdk,
        config: &Config,
        mut source: PlaceholderSource,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let trackers = self.enumerate(sdk)?;

        let Some(tracker) = trackers.first() else {
            self.placeholder_iteration(&mut source, &mut summary)?;
            self.emit(&Record::no_device())?;
            return Ok(summary);
        };

        summary.device_found = true;
        self.report_status(tracker.as_ref())?;
        self.transition(BridgeState::Streaming);

        let mut iterations: u64 = 0;
        loop {
            if self.stop_requested() {
                log::info!("Placeholder stream stopped after {} iteration(s)", iterations);
                break;
            }
            if config.max_samples.is_some_and(|max| iterations >= max) {
                break;
            }

            self.placeholder_iteration(&mut source, &mut summary)?;
            iterations += 1;

            if config.max_samples.is_some_and(|max| iterations >= max) {
                break;
            }
            std::thread::sleep(config.interval);
        }

        Ok(summary)
    }

    /// One tick of the placeholder loop.
    ///
    /// Only fails when even the `runtime_error` record cannot be written.
    fn placeholder_iteration(
        &mut self,
        source: &mut PlaceholderSource,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let failure = match source.next_sample() {
            SampleOutcome::Sample(record) => match self.emit(&record) {
                Ok(()) => {
                    summary.gaze_records += 1;
                    return Ok(());
                }
                Err(e) => e.to_string(),
            },
            SampleOutcome::Failed(reason) => reason,
        };

        log::warn!("Placeholder sample failed: {}", failure);
        self.emit(&Record::runtime_error(failure))?;
        summary.runtime_errors += 1;
        Ok(())
    }

    /// Stream real samples from the first tracker's callback.
    pub fn run_callback(&mut self, sdk: &dyn EyeTrackerSdk, config: &Config) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut trackers = self.enumerate(sdk)?;

        if trackers.is_empty() {
            self.emit(&Record::no_device())?;
            return Ok(summary);
        }

        summary.device_found = true;
        let mut tracker = trackers.swap_remove(0);
        drop(trackers);
        self.report_status(tracker.as_ref())?;

        let (sender, receiver) = crossbeam_channel::bounded::<BinocularGaze>(config.channel_capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        let dropped_clone = dropped.clone();
        let clock = self.clock;

        tracker.subscribe_gaze(Box::new(move |sample| {
            let gaze = BinocularGaze::from_sample(&sample, unix_millis(clock));
            match sender.try_send(gaze) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    dropped_clone.fetch_add(1, Ordering::Relaxed);
                    log::trace!("gaze channel full, dropping sample");
                }
                Err(TrySendError::Disconnected(_)) => {}
            }
        }))?;
        self.transition(BridgeState::Streaming);

        let streamed = self.drain_samples(&receiver, config, &mut summary);
        let unsubscribed = tracker.unsubscribe_gaze();
        summary.dropped_samples = dropped.load(Ordering::Relaxed);
        if summary.dropped_samples > 0 {
            log::warn!("{} gaze sample(s) dropped on a full channel", summary.dropped_samples);
        }

        streamed?;
        unsubscribed?;
        self.sink.notice(STOPPED_LINE)?;
        log::info!("Gaze stream stopped after {} record(s)", summary.gaze_records);
        Ok(summary)
    }

    /// Single-writer loop: move records from the channel to the sink until
    /// shutdown is requested or the sample limit is reached.
    fn drain_samples(
        &mut self,
        receiver: &Receiver<BinocularGaze>,
        config: &Config,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let mut last_timestamp: u64 = 0;

        loop {
            if self.stop_requested() {
                return Ok(());
            }
            if config.max_samples.is_some_and(|max| summary.gaze_records >= max) {
                return Ok(());
            }

            let mut gaze = match receiver.recv_timeout(config.poll_interval) {
                Ok(gaze) => gaze,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(BridgeError::StreamStopped),
            };
            if self.stop_requested() {
                return Ok(());
            }

            // Wall clock may step backwards; the stream must not.
            gaze.timestamp = gaze.timestamp.max(last_timestamp);
            last_timestamp = gaze.timestamp;

            self.emit(&Record::Gaze(GazeRecord::Binocular(gaze)))?;
            summary.gaze_records += 1;
        }
    }
}

fn unix_millis(clock: Clock) -> u64 {
    match clock().duration_since(UNIX_EPOCH) {
        Ok(now) => now.as_millis() as u64,
        Err(e) => {
            log::warn!("System clock is before the Unix epoch ({}), stamping 0", e);
            0
        }
    }
}
