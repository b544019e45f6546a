use anyhow::Context as _;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::Config;

/// Destination for records drained from the ring buffer.
pub trait RecordSink {
    fn handle(&mut self, record: &[u8]) -> anyhow::Result<()>;

    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Emits one trace event per record.
pub struct LogSink;

impl RecordSink for LogSink {
    fn handle(&mut self, record: &[u8]) -> anyhow::Result<()> {
        tracing::trace!(bytes = record.len(), "frame record");
        Ok(())
    }
}

/// Appends records verbatim, back to back, with no framing.
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterSink<BufWriter<File>> {
    pub fn append(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> RecordSink for WriterSink<W> {
    fn handle(&mut self, record: &[u8]) -> anyhow::Result<()> {
        self.writer.write_all(record)?;
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Hands every record to each sink in order.
#[derive(Default)]
pub struct Sinks(Vec<Box<dyn RecordSink + Send>>);

impl Sinks {
    pub fn push(&mut self, sink: impl RecordSink + Send + 'static) {
        self.0.push(Box::new(sink));
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut sinks = Self::default();
        sinks.push(LogSink);
        if let Some(ref path) = config.output {
            tracing::info!("Appending records to {}", path.display());
            sinks.push(WriterSink::append(path)?);
        }
        Ok(sinks)
    }
}

impl RecordSink for Sinks {
    fn handle(&mut self, record: &[u8]) -> anyhow::Result<()> {
        for sink in &mut self.0 {
            sink.handle(record)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        for sink in &mut self.0 {
            sink.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_sink_appends_raw() {
        let mut sink = WriterSink::new(Vec::new());
        sink.handle(&[1, 2, 3]).unwrap();
        sink.handle(&[4, 5]).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.into_inner(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_sinks_fan_in_order() {
        let first = Shared::default();
        let second = Shared::default();
        let mut sinks = Sinks::default();
        sinks.push(LogSink);
        sinks.push(WriterSink::new(first.clone()));
        sinks.push(WriterSink::new(second.clone()));

        sinks.handle(&[7, 8]).unwrap();
        sinks.handle(&[9]).unwrap();
        sinks.flush().unwrap();

        assert_eq!(*first.0.lock().unwrap(), vec![7, 8, 9]);
        assert_eq!(*second.0.lock().unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn test_from_config_without_output_only_logs() {
        let sinks = Sinks::from_config(&Config::default()).unwrap();
        assert_eq!(sinks.0.len(), 1);
    }
}
