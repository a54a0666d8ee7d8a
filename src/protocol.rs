//! Record shapes of the newline-delimited JSON stream.
//!
//! Every line on stdout is exactly one of:
//!
//! ```text
//! {"type":"status","status":"device_detected","model":"...","deviceName":"..."}
//! {"type":"gaze","timestamp":1712.5,"eyeX":0.41,"eyeY":0.77}
//! {"type":"gaze","timestamp":1712500,"leftX":0.4,"leftY":0.5,"rightX":null,...}
//! {"type":"error","errorType":"no_device","message":"Eye Tracker is not detected"}
//! ```

use crate::types::{DeviceInfo, GazeSample, Validity};
use serde::{Deserialize, Serialize};

pub const NO_DEVICE_MESSAGE: &str = "Eye Tracker is not detected";

/// Plain-text line written after a clean callback-policy shutdown.
pub const STOPPED_LINE: &str = "Stopped.";

/// A single line of the output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Record {
    Status(StatusRecord),
    Gaze(GazeRecord),
    Error(ErrorRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub status: DeviceStatus,
    pub model: String,
    pub device_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    DeviceDetected,
}

/// Both gaze shapes share `"type":"gaze"`; they are told apart by their fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GazeRecord {
    Binocular(BinocularGaze),
    Placeholder(PlaceholderGaze),
}

/// Synthetic sample, no hardware behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderGaze {
    /// Unix seconds.
    pub timestamp: f64,
    pub eye_x: f64,
    pub eye_y: f64,
}

/// Per-eye sample sourced from a tracker callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinocularGaze {
    /// Unix milliseconds.
    pub timestamp: u64,
    pub left_x: Option<f64>,
    pub left_y: Option<f64>,
    pub right_x: Option<f64>,
    pub right_y: Option<f64>,
    pub left_validity: Validity,
    pub right_validity: Validity,
    pub left_pupil: Option<f64>,
    pub right_pupil: Option<f64>,
    pub left_pupil_validity: Validity,
    pub right_pupil_validity: Validity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub error_type: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoDevice,
    RuntimeError,
}

impl Record {
    pub fn device_detected(info: &DeviceInfo) -> Record {
        Record::Status(StatusRecord {
            status: DeviceStatus::DeviceDetected,
            model: info.model.clone(),
            device_name: info.device_name.clone(),
        })
    }

    pub fn placeholder(timestamp: f64, eye_x: f64, eye_y: f64) -> Record {
        Record::Gaze(GazeRecord::Placeholder(PlaceholderGaze {
            timestamp,
            eye_x,
            eye_y,
        }))
    }

    pub fn no_device() -> Record {
        Record::Error(ErrorRecord {
            error_type: ErrorKind::NoDevice,
            message: NO_DEVICE_MESSAGE.to_string(),
        })
    }

    pub fn runtime_error(message: impl Into<String>) -> Record {
        Record::Error(ErrorRecord {
            error_type: ErrorKind::RuntimeError,
            message: message.into(),
        })
    }

    /// Value of the `type` discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Status(_) => "status",
            Record::Gaze(_) => "gaze",
            Record::Error(_) => "error",
        }
    }
}

impl BinocularGaze {
    /// Convert a hardware callback payload, stamped with `timestamp_ms` (unix ms).
    pub fn from_sample(sample: &GazeSample, timestamp_ms: u64) -> BinocularGaze {
        let (left_x, left_y) = split_point(sample.left.gaze_point);
        let (right_x, right_y) = split_point(sample.right.gaze_point);
        BinocularGaze {
            timestamp: timestamp_ms,
            left_x,
            left_y,
            right_x,
            right_y,
            left_validity: sample.left.gaze_validity,
            right_validity: sample.right.gaze_validity,
            left_pupil: sample.left.pupil_diameter,
            right_pupil: sample.right.pupil_diameter,
            left_pupil_validity: sample.left.pupil_validity,
            right_pupil_validity: sample.right.pupil_validity,
        }
    }

    fn left_point(&self) -> Option<(f64, f64)> {
        valid_point(self.left_validity, self.left_x, self.left_y)
    }

    fn right_point(&self) -> Option<(f64, f64)> {
        valid_point(self.right_validity, self.right_x, self.right_y)
    }
}

impl GazeRecord {
    pub fn timestamp_secs(&self) -> f64 {
        match self {
            GazeRecord::Placeholder(p) => p.timestamp,
            GazeRecord::Binocular(b) => b.timestamp as f64 / 1000.0,
        }
    }

    /// Single gaze point for this record.
    ///
    /// Real samples average both eyes when both are valid and fall back to
    /// whichever eye is valid; `None` when neither is.
    pub fn combined_point(&self) -> Option<(f64, f64)> {
        match self {
            GazeRecord::Placeholder(p) => Some((p.eye_x, p.eye_y)),
            GazeRecord::Binocular(b) => match (b.left_point(), b.right_point()) {
                (Some((lx, ly)), Some((rx, ry))) => Some(((lx + rx) / 2.0, (ly + ry) / 2.0)),
                (Some(p), None) | (None, Some(p)) => Some(p),
                (None, None) => None,
            },
        }
    }
}

fn split_point(point: Option<(f64, f64)>) -> (Option<f64>, Option<f64>) {
    match point {
        Some((x, y)) => (Some(x), Some(y)),
        None => (None, None),
    }
}

fn valid_point(validity: Validity, x: Option<f64>, y: Option<f64>) -> Option<(f64, f64)> {
    match (validity, x, y) {
        (v, Some(x), Some(y)) if v.is_valid() && x.is_finite() && y.is_finite() => Some((x, y)),
        _ => None,
    }
}

/// Encode a record as one JSON line (no trailing newline).
pub fn encode(record: &Record) -> crate::Result<String> {
    Ok(serde_json::to_string(record)?)
}

/// One line read back from the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Empty,
    /// Not shaped like a bare JSON object, e.g. the `Stopped.` line.
    Text(String),
    Record(Record),
    Malformed { line: String, error: String },
}

/// Classify and decode a single stream line.
pub fn parse_line(raw: &str) -> ParsedLine {
    let line = raw.trim();
    if line.is_empty() {
        return ParsedLine::Empty;
    }
    if !line.starts_with('{') || !line.ends_with('}') {
        return ParsedLine::Text(line.to_string());
    }

    match serde_json::from_str::<Record>(line) {
        Ok(record) => ParsedLine::Record(record),
        Err(e) => ParsedLine::Malformed {
            line: line.to_string(),
            error: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Capabilities, EyeSample};
    use serde_json::Value;

    fn sample(left: EyeSample, right: EyeSample) -> GazeSample {
        GazeSample {
            left,
            right,
            device_timestamp_us: 10,
            system_timestamp_us: 20,
        }
    }

    fn valid_eye(x: f64, y: f64) -> EyeSample {
        EyeSample::from_raw(x, y, Validity::Valid, 3.2, Validity::Valid)
    }

    #[test]
    fn test_status_record_shape() {
        let info = DeviceInfo {
            model: "Tobii Pro Nano".into(),
            device_name: "Lab Nano".into(),
            serial_number: "TPNA1".into(),
            address: "tobii-prp://TPNA1".into(),
            capabilities: Capabilities::HAS_GAZE_DATA,
        };
        let v: Value = serde_json::from_str(&encode(&Record::device_detected(&info)).unwrap()).unwrap();
        assert_eq!(v["type"], "status");
        assert_eq!(v["status"], "device_detected");
        assert_eq!(v["model"], "Tobii Pro Nano");
        assert_eq!(v["deviceName"], "Lab Nano");
    }

    #[test]
    fn test_error_record_shapes() {
        let v: Value = serde_json::from_str(&encode(&Record::no_device()).unwrap()).unwrap();
        assert_eq!(v["type"], "error");
        assert_eq!(v["errorType"], "no_device");
        assert_eq!(v["message"], NO_DEVICE_MESSAGE);

        let v: Value =
            serde_json::from_str(&encode(&Record::runtime_error("boom")).unwrap()).unwrap();
        assert_eq!(v["errorType"], "runtime_error");
        assert_eq!(v["message"], "boom");
    }

    #[test]
    fn test_binocular_keeps_null_keys() {
        let s = sample(valid_eye(0.25, 0.5), EyeSample::lost());
        let rec = Record::Gaze(GazeRecord::Binocular(BinocularGaze::from_sample(&s, 1_700_000_000_123)));
        let line = encode(&rec).unwrap();
        let v: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(v["timestamp"], 1_700_000_000_123u64);
        assert_eq!(v["leftX"], 0.25);
        assert_eq!(v["leftValidity"], 1);
        assert_eq!(v["leftPupilValidity"], 1);
        assert!(v.get("rightX").unwrap().is_null());
        assert!(v.get("rightPupil").unwrap().is_null());
        assert_eq!(v["rightValidity"], 0);
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_nan_from_hardware_becomes_null() {
        let eye = EyeSample::from_raw(f64::NAN, 0.5, Validity::Invalid, f64::NAN, Validity::Invalid);
        assert_eq!(eye.gaze_point, None);
        assert_eq!(eye.pupil_diameter, None);

        let rec = BinocularGaze::from_sample(&sample(eye, eye), 1);
        let v: Value = serde_json::to_value(&rec).unwrap();
        assert!(v["leftX"].is_null());
        assert!(v["leftY"].is_null());
    }

    #[test]
    fn test_parse_distinguishes_gaze_shapes() {
        match parse_line(r#"{"type":"gaze","timestamp":1712.5,"eyeX":0.1,"eyeY":0.9}"#) {
            ParsedLine::Record(Record::Gaze(GazeRecord::Placeholder(p))) => {
                assert_eq!(p.eye_x, 0.1);
                assert_eq!(p.eye_y, 0.9);
            }
            other => panic!("unexpected: {:?}", other),
        }

        let real = encode(&Record::Gaze(GazeRecord::Binocular(BinocularGaze::from_sample(
            &sample(valid_eye(0.1, 0.2), valid_eye(0.3, 0.4)),
            42,
        ))))
        .unwrap();
        match parse_line(&real) {
            ParsedLine::Record(Record::Gaze(GazeRecord::Binocular(b))) => {
                assert_eq!(b.timestamp, 42);
                assert_eq!(b.right_x, Some(0.3));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_text_and_malformed() {
        assert_eq!(parse_line("   "), ParsedLine::Empty);
        assert_eq!(parse_line("Stopped.\n"), ParsedLine::Text(STOPPED_LINE.to_string()));
        assert!(matches!(
            parse_line(r#"{"type":"bogus"}"#),
            ParsedLine::Malformed { .. }
        ));
        assert!(matches!(
            parse_line(r#"{"type":"gaze","timestamp":1,"leftValidity":2}"#),
            ParsedLine::Malformed { .. }
        ));
    }

    #[test]
    fn test_combined_point() {
        let both = BinocularGaze::from_sample(&sample(valid_eye(0.2, 0.4), valid_eye(0.4, 0.6)), 1500);
        let both = GazeRecord::Binocular(both);
        assert_eq!(both.timestamp_secs(), 1.5);
        let (x, y) = both.combined_point().unwrap();
        assert!((x - 0.3).abs() < 1e-12);
        assert!((y - 0.5).abs() < 1e-12);

        let right_only =
            BinocularGaze::from_sample(&sample(EyeSample::lost(), valid_eye(0.7, 0.1)), 0);
        assert_eq!(GazeRecord::Binocular(right_only).combined_point(), Some((0.7, 0.1)));

        // Coordinates present but flagged invalid do not count.
        let flagged = EyeSample::from_raw(0.5, 0.5, Validity::Invalid, 3.0, Validity::Valid);
        let none = BinocularGaze::from_sample(&sample(flagged, EyeSample::lost()), 0);
        assert_eq!(GazeRecord::Binocular(none).combined_point(), None);

        let placeholder = GazeRecord::Placeholder(PlaceholderGaze {
            timestamp: 1.0,
            eye_x: 0.3,
            eye_y: 0.6,
        });
        assert_eq!(placeholder.combined_point(), Some((0.3, 0.6)));
        assert_eq!(placeholder.timestamp_secs(), 1.0);
    }
}
