//! Binding to the vendor `tobii_research` C library.
//!
//! Only the calls the bridge needs are declared: enumeration, identity
//! getters, capabilities and the gaze data subscription. The library owns the
//! tracker list; every handle keeps the list alive through an `Arc` so the raw
//! tracker pointers stay valid until the last handle is dropped.

use crate::sdk::{EyeTracker, EyeTrackerSdk, GazeCallback};
use crate::types::{Capabilities, DeviceInfo, EyeSample, GazeSample, Validity};
use crate::{BridgeError, Result};
use std::ffi::{c_char, c_int, c_void, CStr};
use std::panic::AssertUnwindSafe;
use std::ptr;
use std::sync::Arc;

const STATUS_OK: c_int = 0;
const VALIDITY_VALID: c_int = 1;

#[repr(C)]
struct RawTracker {
    _private: [u8; 0],
}

#[repr(C)]
struct RawTrackerList {
    eyetrackers: *mut *mut RawTracker,
    count: usize,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct NormalizedPoint2D {
    x: f32,
    y: f32,
}

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(dead_code)]
struct Point3D {
    x: f32,
    y: f32,
    z: f32,
}

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(dead_code)]
struct RawGazePoint {
    position_on_display_area: NormalizedPoint2D,
    position_in_user_coordinates: Point3D,
    validity: c_int,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct RawPupilData {
    diameter: f32,
    validity: c_int,
}

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(dead_code)]
struct RawGazeOrigin {
    position_in_user_coordinates: Point3D,
    position_in_track_box_coordinates: Point3D,
    validity: c_int,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct RawEyeData {
    gaze_point: RawGazePoint,
    pupil_data: RawPupilData,
    gaze_origin: RawGazeOrigin,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct RawGazeData {
    left_eye: RawEyeData,
    right_eye: RawEyeData,
    device_time_stamp: i64,
    system_time_stamp: i64,
}

type RawGazeCallback = unsafe extern "C" fn(gaze_data: *mut RawGazeData, user_data: *mut c_void);
type StringGetter = unsafe extern "C" fn(tracker: *mut RawTracker, out: *mut *mut c_char) -> c_int;

#[link(name = "tobii_research")]
extern "C" {
    fn tobii_research_find_all_eyetrackers(eyetrackers: *mut *mut RawTrackerList) -> c_int;
    fn tobii_research_free_eyetrackers(eyetrackers: *mut RawTrackerList);
    fn tobii_research_get_model(tracker: *mut RawTracker, model: *mut *mut c_char) -> c_int;
    fn tobii_research_get_device_name(tracker: *mut RawTracker, name: *mut *mut c_char) -> c_int;
    fn tobii_research_get_serial_number(tracker: *mut RawTracker, serial: *mut *mut c_char) -> c_int;
    fn tobii_research_get_address(tracker: *mut RawTracker, address: *mut *mut c_char) -> c_int;
    fn tobii_research_get_capabilities(tracker: *mut RawTracker, capabilities: *mut u32) -> c_int;
    fn tobii_research_free_string(s: *mut c_char);
    fn tobii_research_subscribe_to_gaze_data(
        tracker: *mut RawTracker,
        callback: RawGazeCallback,
        user_data: *mut c_void,
    ) -> c_int;
    fn tobii_research_unsubscribe_from_gaze_data(
        tracker: *mut RawTracker,
        callback: RawGazeCallback,
    ) -> c_int;
}

fn check(status: c_int, call: &'static str) -> Result<()> {
    if status == STATUS_OK {
        Ok(())
    } else {
        Err(BridgeError::Sdk { call, status })
    }
}

/// Tracker list returned by the library, freed when the last handle goes away.
struct TrackerList(*mut RawTrackerList);

// The library's tracker objects are safe to use from any thread.
unsafe impl Send for TrackerList {}
unsafe impl Sync for TrackerList {}

impl Drop for TrackerList {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { tobii_research_free_eyetrackers(self.0) };
        }
    }
}

/// Vendor SDK entry point.
#[derive(Debug, Default)]
pub struct TobiiSdk;

impl TobiiSdk {
    pub fn new() -> Self {
        TobiiSdk
    }
}

impl EyeTrackerSdk for TobiiSdk {
    fn name(&self) -> &'static str {
        "tobii"
    }

    fn find_all_eyetrackers(&self) -> Result<Vec<Box<dyn EyeTracker>>> {
        let mut raw_list: *mut RawTrackerList = ptr::null_mut();
        check(
            unsafe { tobii_research_find_all_eyetrackers(&mut raw_list) },
            "find_all_eyetrackers",
        )?;
        if raw_list.is_null() {
            return Ok(Vec::new());
        }

        let list = Arc::new(TrackerList(raw_list));
        let (entries, count) = unsafe { ((*raw_list).eyetrackers, (*raw_list).count) };

        let raws: Vec<*mut RawTracker> = (0..count)
            .map(|i| unsafe { *entries.add(i) })
            .filter(|raw| !raw.is_null())
            .collect();

        let trackers: Vec<Box<dyn EyeTracker>> = readable_trackers(raws, |raw| unsafe { query_info(raw) })
            .into_iter()
            .map(|(raw, info)| {
                log::info!(
                    "Found tracker: model={} name={} serial={} address={} capabilities={:?}",
                    info.model,
                    info.device_name,
                    info.serial_number,
                    info.address,
                    info.capabilities
                );
                Box::new(TobiiTracker {
                    _list: list.clone(),
                    raw,
                    info,
                    subscription: None,
                }) as Box<dyn EyeTracker>
            })
            .collect();
        Ok(trackers)
    }
}

/// Pairs each tracker with its identity, skipping trackers whose getters fail.
fn readable_trackers<T>(
    raws: Vec<T>,
    mut query: impl FnMut(T) -> Result<DeviceInfo>,
) -> Vec<(T, DeviceInfo)>
where
    T: Copy,
{
    let mut found = Vec::with_capacity(raws.len());
    for (i, raw) in raws.into_iter().enumerate() {
        match query(raw) {
            Ok(info) => found.push((raw, info)),
            Err(e) => log::warn!("Skipping tracker {}: {}", i, e),
        }
    }
    found
}

unsafe fn read_string(raw: *mut RawTracker, getter: StringGetter, call: &'static str) -> Result<String> {
    let mut out: *mut c_char = ptr::null_mut();
    check(getter(raw, &mut out), call)?;
    if out.is_null() {
        return Ok(String::new());
    }
    let value = CStr::from_ptr(out).to_string_lossy().into_owned();
    tobii_research_free_string(out);
    Ok(value)
}

unsafe fn query_info(raw: *mut RawTracker) -> Result<DeviceInfo> {
    let mut caps: u32 = 0;
    check(tobii_research_get_capabilities(raw, &mut caps), "get_capabilities")?;

    Ok(DeviceInfo {
        model: read_string(raw, tobii_research_get_model, "get_model")?,
        device_name: read_string(raw, tobii_research_get_device_name, "get_device_name")?,
        serial_number: read_string(raw, tobii_research_get_serial_number, "get_serial_number")?,
        address: read_string(raw, tobii_research_get_address, "get_address")?,
        capabilities: Capabilities::from_bits_truncate(caps),
    })
}

/// Boxed so its address can be handed to the library as `user_data`.
struct Subscription {
    callback: GazeCallback,
}

/// One tracker from the vendor library.
pub struct TobiiTracker {
    _list: Arc<TrackerList>,
    raw: *mut RawTracker,
    info: DeviceInfo,
    subscription: Option<Box<Subscription>>,
}

// `raw` points into the list kept alive by `_list`.
unsafe impl Send for TobiiTracker {}

impl EyeTracker for TobiiTracker {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn subscribe_gaze(&mut self, callback: GazeCallback) -> Result<()> {
        if self.subscription.is_some() {
            return Err(BridgeError::AlreadySubscribed);
        }

        let mut subscription = Box::new(Subscription { callback });
        let user_data = &mut *subscription as *mut Subscription as *mut c_void;
        check(
            unsafe { tobii_research_subscribe_to_gaze_data(self.raw, gaze_trampoline, user_data) },
            "subscribe_to_gaze_data",
        )?;
        self.subscription = Some(subscription);
        log::info!("Subscribed to gaze data on {}", self.info.address);
        Ok(())
    }

    fn unsubscribe_gaze(&mut self) -> Result<()> {
        if self.subscription.is_none() {
            return Ok(());
        }
        let status = unsafe { tobii_research_unsubscribe_from_gaze_data(self.raw, gaze_trampoline) };
        match self.subscription.take() {
            Some(subscription) => release_subscription(subscription, status),
            None => Ok(()),
        }
    }
}

impl Drop for TobiiTracker {
    fn drop(&mut self) {
        if let Err(e) = self.unsubscribe_gaze() {
            log::warn!("Failed to unsubscribe on drop: {}", e);
        }
    }
}

/// Frees the subscription once the library has let go of it.
///
/// After a failed unsubscribe the library may still call back with this
/// `user_data`, so the box is leaked instead of freed.
fn release_subscription(subscription: Box<Subscription>, status: c_int) -> Result<()> {
    if let Err(e) = check(status, "unsubscribe_from_gaze_data") {
        log::warn!("{}; leaking gaze callback state", e);
        Box::leak(subscription);
        return Err(e);
    }
    drop(subscription);
    Ok(())
}

unsafe extern "C" fn gaze_trampoline(gaze_data: *mut RawGazeData, user_data: *mut c_void) {
    if gaze_data.is_null() || user_data.is_null() {
        return;
    }
    let subscription = &mut *(user_data as *mut Subscription);
    let sample = convert_gaze_data(&*gaze_data);

    // Unwinding into C is undefined behavior.
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| (subscription.callback)(sample)));
    if result.is_err() {
        log::error!("Gaze callback panicked; sample dropped");
    }
}

fn validity(raw: c_int) -> Validity {
    Validity::from(raw == VALIDITY_VALID)
}

fn convert_eye(eye: &RawEyeData) -> EyeSample {
    EyeSample::from_raw(
        f64::from(eye.gaze_point.position_on_display_area.x),
        f64::from(eye.gaze_point.position_on_display_area.y),
        validity(eye.gaze_point.validity),
        f64::from(eye.pupil_data.diameter),
        validity(eye.pupil_data.validity),
    )
}

fn convert_gaze_data(data: &RawGazeData) -> GazeSample {
    GazeSample {
        left: convert_eye(&data.left_eye),
        right: convert_eye(&data.right_eye),
        device_timestamp_us: data.device_time_stamp,
        system_timestamp_us: data.system_time_stamp,
    }
}
