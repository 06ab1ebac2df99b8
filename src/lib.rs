//! Redis monitoring check: connects to an instance, authenticates, and records
//! metrics from `INFO` and optional introspection commands into a [`Sink`].

pub mod collector;
pub mod config;
pub mod error;
pub mod info;
pub mod metrics;
pub mod redis_client;

pub use collector::{CheckState, CheckSummary, Collector, SkippedCollection};
pub use config::{CheckConfig, ConnectionParams, Credentials};
pub use error::{CheckError, ErrorClass};
pub use metrics::{JsonLinesSink, MemorySink, MetricKind, MetricSample, Sink};
