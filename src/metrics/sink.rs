use std::collections::BTreeSet;
use std::io::Write;

use parking_lot::Mutex;

use super::{MetricSample, Sink};

// ─── In-memory sink ──────────────────────────────────────────────

/// Thread-safe, append-only sample store.
/// Collectors call `record()`, callers read with `samples()` / `metric_names()`.
#[derive(Debug, Default)]
pub struct MemorySink {
    inner: Mutex<Vec<MetricSample>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far, in arrival order.
    pub fn samples(&self) -> Vec<MetricSample> {
        self.inner.lock().clone()
    }

    pub fn metric_names(&self) -> BTreeSet<String> {
        self.inner.lock().iter().map(|s| s.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().iter().any(|s| s.name == name)
    }

    /// All samples with the given name.
    pub fn find(&self, name: &str) -> Vec<MetricSample> {
        self.inner
            .lock()
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Wipe all data, e.g. between two checks in a test.
    pub fn reset(&self) {
        self.inner.lock().clear();
    }
}

impl Sink for MemorySink {
    fn record(&self, sample: MetricSample) {
        self.inner.lock().push(sample);
    }
}

// ─── JSON lines sink ─────────────────────────────────────────────

/// Writes each sample as one JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> Sink for JsonLinesSink<W> {
    fn record(&self, sample: MetricSample) {
        let line = match serde_json::to_string(&sample) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(metric = %sample.name, %err, "cannot serialize sample");
                return;
            }
        };

        let mut writer = self.writer.lock();
        if let Err(err) = writeln!(writer, "{line}") {
            tracing::warn!(metric = %sample.name, %err, "cannot write sample");
        }
    }
}
