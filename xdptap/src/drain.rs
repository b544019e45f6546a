use std::future::Future;
use std::ops::Deref;
use tokio::time::Duration;

use xdptap_common::RECORD_LEN;

use crate::sink::RecordSink;

/// Source of drained records. Implemented for the aya `RingBuf` map and by
/// in-memory queues in tests.
pub trait RecordSource {
    type Item<'a>: Deref<Target = [u8]>
    where
        Self: 'a;

    fn next(&mut self) -> Option<Self::Item<'_>>;
}

impl RecordSource for aya::maps::RingBuf<aya::maps::MapData> {
    type Item<'a> = aya::maps::ring_buf::RingBufItem<'a>;

    fn next(&mut self) -> Option<Self::Item<'_>> {
        aya::maps::RingBuf::next(self)
    }
}

/// Forwards one record to `sink`, skipping anything that is not exactly
/// `RECORD_LEN` bytes.
pub fn dispatch(record: &[u8], sink: &mut impl RecordSink) -> anyhow::Result<bool> {
    if record.len() != RECORD_LEN {
        tracing::warn!(
            "Skipping ring buffer record of {} bytes (expected {})",
            record.len(),
            RECORD_LEN
        );
        return Ok(false);
    }
    sink.handle(record)?;
    Ok(true)
}

/// Drains whatever is currently in `source` into `sink`.
pub fn drain_ready(source: &mut impl RecordSource, sink: &mut impl RecordSink) -> anyhow::Result<()> {
    while let Some(item) = source.next() {
        dispatch(&item, sink)?;
    }
    Ok(())
}

/// Continuously poll the ring buffer, forwarding records to `sink` in the
/// order the kernel published them, until `shutdown` resolves.
pub async fn run<S, K, F>(
    mut source: S,
    mut sink: K,
    poll_interval: Duration,
    shutdown: F,
) -> anyhow::Result<()>
where
    S: RecordSource,
    K: RecordSink,
    F: Future,
{
    tokio::pin!(shutdown);
    loop {
        drain_ready(&mut source, &mut sink)?;

        // Yield briefly to avoid busy-spinning when the ring buffer is empty.
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }

    drain_ready(&mut source, &mut sink)?;
    sink.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::WriterSink;
    use std::collections::VecDeque;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted ring buffer: each `next` pops one entry, `None` entries read
    /// as "empty right now".
    struct Queue(VecDeque<Option<Vec<u8>>>);

    impl Queue {
        fn ready(records: Vec<Vec<u8>>) -> Self {
            Self(records.into_iter().map(Some).collect())
        }
    }

    impl RecordSource for Queue {
        type Item<'a> = Vec<u8>;

        fn next(&mut self) -> Option<Vec<u8>> {
            self.0.pop_front().flatten()
        }
    }

    /// Writer whose bytes and flush count stay observable after the sink is
    /// moved into `run`.
    #[derive(Clone, Default)]
    struct Recorder {
        bytes: Arc<Mutex<Vec<u8>>>,
        flushes: Arc<AtomicUsize>,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.bytes.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn record(tag: u8) -> Vec<u8> {
        vec![tag; RECORD_LEN]
    }

    #[test]
    fn test_dispatch_skips_short_records() {
        let mut sink = WriterSink::new(Vec::new());
        assert!(!dispatch(&[0u8; 64], &mut sink).unwrap());
        assert!(dispatch(&record(1), &mut sink).unwrap());
        assert_eq!(sink.into_inner().len(), RECORD_LEN);
    }

    #[test]
    fn test_drain_ready_keeps_order() {
        let mut queue = Queue::ready(vec![record(1), vec![0; 8], record(2)]);
        let mut sink = WriterSink::new(Vec::new());

        drain_ready(&mut queue, &mut sink).unwrap();

        let written = sink.into_inner();
        assert_eq!(written.len(), 2 * RECORD_LEN);
        assert_eq!(written[0], 1);
        assert_eq!(written[RECORD_LEN], 2);
        assert!(queue.0.is_empty());
    }

    #[tokio::test]
    async fn test_run_writes_queued_record_once_and_flushes() {
        let recorder = Recorder::default();
        let queue = Queue::ready(vec![record(3)]);

        run(
            queue,
            WriterSink::new(recorder.clone()),
            Duration::from_millis(1),
            async {},
        )
        .await
        .unwrap();

        let written = recorder.bytes.lock().unwrap();
        assert_eq!(written.len(), RECORD_LEN);
        assert!(written.iter().all(|&b| b == 3));
        assert_eq!(recorder.flushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_drains_records_published_before_shutdown() {
        let recorder = Recorder::default();
        // empty on the first poll, one record by the time shutdown fires
        let queue = Queue(VecDeque::from(vec![None, Some(record(4))]));

        run(
            queue,
            WriterSink::new(recorder.clone()),
            Duration::from_secs(60),
            async {},
        )
        .await
        .unwrap();

        let written = recorder.bytes.lock().unwrap();
        assert_eq!(written.len(), RECORD_LEN);
        assert_eq!(written[0], 4);
        assert_eq!(recorder.flushes.load(Ordering::SeqCst), 1);
    }
}
