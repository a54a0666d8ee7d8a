use crate::protocol::Record;
use crate::Result;
use std::io::Write;

/// Destination for the record stream.
///
/// The bridge never prints directly; everything observable goes through a sink.
pub trait RecordSink {
    /// Write one record as a single line and make it visible to the reader immediately.
    fn emit(&mut self, record: &Record) -> Result<()>;

    /// Write a plain-text (non-JSON) line, e.g. the shutdown notice.
    fn notice(&mut self, text: &str) -> Result<()>;
}

/// Newline-delimited JSON over any writer, flushed after every line.
pub struct JsonLineSink<W: Write> {
    out: W,
    lines: u64,
}

impl<W: Write> JsonLineSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, lines: 0 }
    }

    /// Number of lines written so far.
    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.out.write_all(line)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.lines += 1;
        Ok(())
    }
}

impl JsonLineSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> RecordSink for JsonLineSink<W> {
    fn emit(&mut self, record: &Record) -> Result<()> {
        let line = serde_json::to_vec(record)?;
        self.write_line(&line)?;
        log::trace!("emitted {} record", record.kind());
        Ok(())
    }

    fn notice(&mut self, text: &str) -> Result<()> {
        self.write_line(text.as_bytes())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn emit(&mut self, record: &Record) -> Result<()> {
        (**self).emit(record)
    }

    fn notice(&mut self, text: &str) -> Result<()> {
        (**self).notice(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writer that records how many times it was flushed.
    struct CountingWriter {
        buf: Vec<u8>,
        flushes: usize,
    }

    impl Write for CountingWriter {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.buf.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_each_record_is_one_flushed_line() {
        let mut sink = JsonLineSink::new(CountingWriter {
            buf: Vec::new(),
            flushes: 0,
        });
        sink.emit(&Record::no_device()).unwrap();
        sink.emit(&Record::placeholder(1.5, 0.1, 0.2)).unwrap();
        sink.notice("Stopped.").unwrap();

        assert_eq!(sink.lines_written(), 3);
        assert_eq!(sink.get_ref().flushes, 3);
        let out = sink.into_inner();
        assert_eq!(out.flushes, 3);

        let text = String::from_utf8(out.buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with(r#"{"type":"error""#));
        assert!(lines[1].starts_with(r#"{"type":"gaze""#));
        assert_eq!(lines[2], "Stopped.");
    }

    #[test]
    fn test_write_failure_is_reported() {
        struct Closed;
        impl Write for Closed {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut sink = JsonLineSink::new(Closed);
        let err = sink.emit(&Record::no_device()).unwrap_err();
        assert!(matches!(err, crate::BridgeError::Io(_)));
        assert_eq!(sink.lines_written(), 0);
    }
}
