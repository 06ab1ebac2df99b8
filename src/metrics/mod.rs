pub mod sink;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use sink::{JsonLinesSink, MemorySink};

/// How the aggregator should treat a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Gauge,
    /// Raw cumulative counter; the aggregator derives the per-second rate.
    Rate,
    /// One observation of a distribution (e.g. a slowlog entry).
    Histogram,
}

/// A single named observation.
/// This is the "write" side: the collector creates these and pushes them in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    /// Dotted identifier, e.g. "redis.net.commands"
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
    pub tags: BTreeSet<String>,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new<I, T>(name: impl Into<String>, kind: MetricKind, value: f64, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            kind,
            value,
            tags: tags.into_iter().map(Into::into).collect(),
            timestamp: Utc::now(),
        }
    }

    pub fn gauge<I, T>(name: impl Into<String>, value: f64, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new(name, MetricKind::Gauge, value, tags)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Receiver of recorded samples. Shared by concurrent checks, so `record`
/// takes `&self`.
pub trait Sink: Send + Sync {
    fn record(&self, sample: MetricSample);
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn record(&self, sample: MetricSample) {
        (**self).record(sample)
    }
}

impl<S: Sink + ?Sized> Sink for &S {
    fn record(&self, sample: MetricSample) {
        (**self).record(sample)
    }
}
