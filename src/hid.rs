//! USB HID enumeration backend.
//!
//! Finds trackers on the HID bus by vendor id. A tracker usually exposes
//! several HID interfaces; entries are merged per physical device. This backend
//! only detects hardware: the gaze protocol is proprietary, so subscription is
//! unsupported and the placeholder policy is the one to pair it with.

use crate::sdk::{EyeTracker, GazeCallback};
use crate::types::{Capabilities, DeviceInfo};
use crate::{BridgeError, Result};

// -- USB identifiers --
pub const TOBII_VID: u16 = 0x2104;

/// The parts of a HID enumeration entry the backend looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidEntry {
    pub vendor_id: u16,
    pub product_id: u16,
    pub path: String,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl HidEntry {
    /// Key identifying the physical device behind this interface.
    fn device_key(&self) -> String {
        match self.serial_number.as_deref().filter(|s| !s.is_empty()) {
            Some(serial) => format!("{:04x}:{:04x}:{}", self.vendor_id, self.product_id, serial),
            None => self.path.clone(),
        }
    }
}

/// Keep only tracker entries and merge interfaces of the same device,
/// preserving enumeration order.
pub fn collect_trackers(entries: &[HidEntry]) -> Vec<DeviceInfo> {
    let mut seen: Vec<String> = Vec::new();
    let mut devices = Vec::new();

    for entry in entries {
        if entry.vendor_id != TOBII_VID {
            continue;
        }
        let key = entry.device_key();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        devices.push(device_info(entry));
    }

    devices
}

fn device_info(entry: &HidEntry) -> DeviceInfo {
    let product = entry
        .product
        .clone()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| format!("Tracker {:04x}", entry.product_id));
    let device_name = match entry.manufacturer.as_deref().map(str::trim) {
        Some(m) if !m.is_empty() && !product.starts_with(m) => format!("{} {}", m, product),
        _ => product.clone(),
    };

    DeviceInfo {
        model: product,
        device_name,
        serial_number: entry.serial_number.clone().unwrap_or_default(),
        address: entry.path.clone(),
        capabilities: Capabilities::empty(),
    }
}

/// A tracker seen on the HID bus.
pub struct HidTracker {
    info: DeviceInfo,
}

impl HidTracker {
    pub fn new(info: DeviceInfo) -> Self {
        Self { info }
    }
}

impl EyeTracker for HidTracker {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn subscribe_gaze(&mut self, _callback: GazeCallback) -> Result<()> {
        Err(BridgeError::Unsupported("hid"))
    }

    fn unsubscribe_gaze(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(feature = "hid")]
pub use self::hidapi_backend::HidSdk;

#[cfg(feature = "hid")]
mod hidapi_backend {
    use super::{collect_trackers, HidEntry, HidTracker};
    use crate::sdk::{EyeTracker, EyeTrackerSdk};
    use crate::{BridgeError, Result};
    use hidapi::HidApi;

    fn create_hid_api() -> Result<HidApi> {
        let api = HidApi::new().map_err(|e| BridgeError::Hid(e.to_string()))?;
        #[cfg(target_os = "macos")]
        {
            // Keep HID opens shared on macOS to avoid seizing the interface.
            api.set_open_exclusive(false);
        }
        Ok(api)
    }

    fn to_entry(d: &hidapi::DeviceInfo) -> HidEntry {
        HidEntry {
            vendor_id: d.vendor_id(),
            product_id: d.product_id(),
            path: d.path().to_string_lossy().into_owned(),
            serial_number: d.serial_number().map(str::to_owned),
            manufacturer: d.manufacturer_string().map(str::to_owned),
            product: d.product_string().map(str::to_owned),
        }
    }

    /// Enumerates trackers via hidapi.
    #[derive(Debug, Default)]
    pub struct HidSdk;

    impl HidSdk {
        pub fn new() -> Self {
            HidSdk
        }
    }

    impl EyeTrackerSdk for HidSdk {
        fn name(&self) -> &'static str {
            "hid"
        }

        fn find_all_eyetrackers(&self) -> Result<Vec<Box<dyn EyeTracker>>> {
            let api = create_hid_api()?;
            let entries: Vec<HidEntry> = api.device_list().map(to_entry).collect();
            log::debug!("HID bus lists {} interface(s)", entries.len());

            let trackers = collect_trackers(&entries)
                .into_iter()
                .map(|info| {
                    log::info!(
                        "Found tracker on HID bus: model={} serial={} path={}",
                        info.model,
                        info.serial_number,
                        info.address
                    );
                    Box::new(HidTracker::new(info)) as Box<dyn EyeTracker>
                })
                .collect();
            Ok(trackers)
        }
    }
}
