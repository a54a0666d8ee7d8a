//! Reading the stream back, for the process on the other end of the pipe.

use crate::protocol::{parse_line, ErrorRecord, GazeRecord, ParsedLine, Record, StatusRecord};
use crate::Result;
use std::io::BufRead;

/// Callbacks for each kind of line a consumer sees.
pub trait RecordListener {
    /// `point` is the record's single combined gaze point, if any eye was usable.
    fn on_gaze(&mut self, record: &GazeRecord, point: Option<(f64, f64)>);

    fn on_status(&mut self, record: &StatusRecord);

    fn on_error(&mut self, record: &ErrorRecord);

    /// Non-JSON output such as the shutdown line.
    fn on_text(&mut self, _text: &str) {}
}

/// Parse one line and hand it to `listener`. Returns what the line was.
pub fn dispatch_line<L: RecordListener + ?Sized>(listener: &mut L, line: &str) -> ParsedLine {
    let parsed = parse_line(line);
    match &parsed {
        ParsedLine::Record(Record::Gaze(gaze)) => {
            listener.on_gaze(gaze, gaze.combined_point())
        }
        ParsedLine::Record(Record::Status(status)) => listener.on_status(status),
        ParsedLine::Record(Record::Error(error)) => listener.on_error(error),
        ParsedLine::Text(text) => listener.on_text(text),
        ParsedLine::Malformed { line, error } => {
            log::debug!("Skipping undecodable line {:?}: {}", line, error)
        }
        ParsedLine::Empty => {}
    }
    parsed
}

/// Line counts from [`read_stream`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub records: u64,
    pub text_lines: u64,
    pub malformed: u64,
}

/// Feed every line of `reader` to `listener` until EOF.
pub fn read_stream<R: BufRead, L: RecordListener + ?Sized>(
    reader: R,
    listener: &mut L,
) -> Result<StreamStats> {
    let mut stats = StreamStats::default();
    for line in reader.lines() {
        match dispatch_line(listener, &line?) {
            ParsedLine::Record(_) => stats.records += 1,
            ParsedLine::Text(_) => stats.text_lines += 1,
            ParsedLine::Malformed { .. } => stats.malformed += 1,
            ParsedLine::Empty => {}
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ErrorKind;

    #[derive(Default)]
    struct Collect {
        points: Vec<Option<(f64, f64)>>,
        statuses: Vec<String>,
        errors: Vec<ErrorKind>,
        texts: Vec<String>,
    }

    impl RecordListener for Collect {
        fn on_gaze(&mut self, _record: &GazeRecord, point: Option<(f64, f64)>) {
            self.points.push(point);
        }

        fn on_status(&mut self, record: &StatusRecord) {
            self.statuses.push(record.model.clone());
        }

        fn on_error(&mut self, record: &ErrorRecord) {
            self.errors.push(record.error_type);
        }

        fn on_text(&mut self, text: &str) {
            self.texts.push(text.to_string());
        }
    }

    #[test]
    fn test_read_mixed_stream() {
        let input = concat!(
            r#"{"type":"status","status":"device_detected","model":"Tobii Pro Fusion","deviceName":"fusion"}"#,
            "\n",
            r#"{"type":"gaze","timestamp":1700000000000,"leftX":0.2,"leftY":0.4,"rightX":0.4,"rightY":0.6,"leftValidity":1,"rightValidity":1,"leftPupil":3.1,"rightPupil":3.0,"leftPupilValidity":1,"rightPupilValidity":1}"#,
            "\n",
            r#"{"type":"gaze","timestamp":1700000000016,"leftX":null,"leftY":null,"rightX":null,"rightY":null,"leftValidity":0,"rightValidity":0,"leftPupil":null,"rightPupil":null,"leftPupilValidity":0,"rightPupilValidity":0}"#,
            "\n",
            "\n",
            r#"{"type":"error","errorType":"runtime_error","message":"x"}"#,
            "\n",
            "{not json}\n",
            "Stopped.\n",
        );

        let mut collect = Collect::default();
        let stats = read_stream(input.as_bytes(), &mut collect).unwrap();

        assert_eq!(
            stats,
            StreamStats {
                records: 4,
                text_lines: 1,
                malformed: 1,
            }
        );
        assert_eq!(collect.statuses, ["Tobii Pro Fusion"]);
        assert_eq!(collect.errors, [ErrorKind::RuntimeError]);
        assert_eq!(collect.texts, ["Stopped."]);
        assert_eq!(collect.points.len(), 2);
        let (x, y) = collect.points[0].unwrap();
        assert!((x - 0.3).abs() < 1e-9);
        assert!((y - 0.5).abs() < 1e-9);
        assert_eq!(collect.points[1], None);
    }

    #[test]
    fn test_bridge_output_reads_back() {
        use crate::bridge::Bridge;
        use crate::config::{Config, Policy};
        use crate::simulated::SimulatedSdk;
        use crate::sink::JsonLineSink;

        let mut bridge = Bridge::new(JsonLineSink::new(Vec::new()));
        let config = Config {
            policy: Policy::Placeholder,
            interval: std::time::Duration::ZERO,
            max_samples: Some(3),
            ..Config::default()
        };
        bridge.run(&SimulatedSdk::new(1, 60), &config).unwrap();
        let bytes = bridge.into_sink().into_inner();

        let mut collect = Collect::default();
        let stats = read_stream(bytes.as_slice(), &mut collect).unwrap();
        assert_eq!(stats.records, 4);
        assert_eq!(collect.statuses, ["Simulated Tracker"]);
        assert!(collect.points.iter().all(|p| p.is_some()));
    }
}
