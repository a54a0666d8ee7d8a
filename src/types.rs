use serde::{Deserialize, Serialize};

/// Identifying metadata of an enumerated tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: String,
    pub device_name: String,
    pub serial_number: String,
    /// Backend-specific address (SDK URI, HID path, or `sim://N`).
    pub address: String,
    pub capabilities: Capabilities,
}

bitflags::bitflags! {
    /// Capability mask as reported by the vendor SDK.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(C)]
    pub struct Capabilities: u32 {
        const CAN_SET_DISPLAY_AREA            = 1 << 0;
        const HAS_EXTERNAL_SIGNAL             = 1 << 1;
        const HAS_EYE_IMAGES                  = 1 << 2;
        const HAS_GAZE_DATA                   = 1 << 3;
        const HAS_HMD_GAZE_DATA               = 1 << 4;
        const CAN_DO_SCREEN_BASED_CALIBRATION = 1 << 5;
        const CAN_DO_HMD_BASED_CALIBRATION    = 1 << 6;
        const HAS_HMD_LENS_CONFIG             = 1 << 7;
        const CAN_DO_MONOCULAR_CALIBRATION    = 1 << 8;
    }
}

/// Hardware confidence bit for one eye measurement.
///
/// On the wire this is the integer `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Validity {
    Invalid = 0,
    Valid = 1,
}

impl Validity {
    pub fn is_valid(self) -> bool {
        self == Validity::Valid
    }
}

impl From<bool> for Validity {
    fn from(valid: bool) -> Self {
        if valid {
            Validity::Valid
        } else {
            Validity::Invalid
        }
    }
}

impl From<Validity> for u8 {
    fn from(v: Validity) -> u8 {
        v as u8
    }
}

impl TryFrom<u8> for Validity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Validity::Invalid),
            1 => Ok(Validity::Valid),
            other => Err(format!("validity must be 0 or 1, got {}", other)),
        }
    }
}

/// One eye's share of a hardware gaze sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeSample {
    /// Normalized display-area coordinates [x, y]. `None` when the hardware
    /// reported no usable position (NaN).
    pub gaze_point: Option<(f64, f64)>,
    pub gaze_validity: Validity,
    /// Pupil diameter in millimeters.
    pub pupil_diameter: Option<f64>,
    pub pupil_validity: Validity,
}

impl EyeSample {
    /// Build from raw SDK floats, mapping non-finite values to `None`.
    pub fn from_raw(
        x: f64,
        y: f64,
        gaze_validity: Validity,
        pupil: f64,
        pupil_validity: Validity,
    ) -> Self {
        let gaze_point = if x.is_finite() && y.is_finite() {
            Some((x, y))
        } else {
            None
        };
        EyeSample {
            gaze_point,
            gaze_validity,
            pupil_diameter: pupil.is_finite().then_some(pupil),
            pupil_validity,
        }
    }

    /// An eye the tracker lost (blink, out of track box).
    pub fn lost() -> Self {
        EyeSample {
            gaze_point: None,
            gaze_validity: Validity::Invalid,
            pupil_diameter: None,
            pupil_validity: Validity::Invalid,
        }
    }
}

/// One payload delivered by a tracker's gaze callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeSample {
    pub left: EyeSample,
    pub right: EyeSample,
    /// Device clock in microseconds.
    pub device_timestamp_us: i64,
    /// SDK system clock in microseconds (monotonic, not wall time).
    pub system_timestamp_us: i64,
}
