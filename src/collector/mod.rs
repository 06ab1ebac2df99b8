//! The check itself: connect, authenticate, collect, record.

mod clients;
mod command_stats;
mod keys;
mod slowlog;

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ConnectionParams;
use crate::error::{CheckError, Result};
use crate::info::Info;
use crate::metrics::{MetricSample, Sink};
use crate::redis_client::Session;

pub use clients::parse_client_list;

// ─── Public types ────────────────────────────────────────────────

/// Progress of a single check invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    Disconnected,
    Connecting,
    Authenticating,
    Authenticated,
    Collecting,
    Done,
    AuthFailed,
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Collecting => "collecting",
            Self::Done => "done",
            Self::AuthFailed => "auth_failed",
        };
        f.write_str(s)
    }
}

/// An optional sub-collection that failed and was skipped.
#[derive(Debug, Clone)]
pub struct SkippedCollection {
    pub collection: &'static str,
    pub error: CheckError,
}

/// Outcome of a successful check.
#[derive(Debug, Clone)]
pub struct CheckSummary {
    /// Samples handed to the sink during this invocation.
    pub recorded: usize,
    pub skipped: Vec<SkippedCollection>,
    pub state: CheckState,
}

impl CheckSummary {
    pub fn was_skipped(&self, collection: &str) -> bool {
        self.skipped.iter().any(|s| s.collection == collection)
    }
}

/// Counts what goes into the sink for the summary.
pub(crate) struct Recorder<'a> {
    sink: &'a dyn Sink,
    recorded: usize,
}

impl Recorder<'_> {
    pub(crate) fn record(&mut self, sample: MetricSample) {
        self.sink.record(sample);
        self.recorded += 1;
    }

    pub(crate) fn extend(&mut self, samples: impl IntoIterator<Item = MetricSample>) {
        for sample in samples {
            self.record(sample);
        }
    }
}

// ─── Collector ───────────────────────────────────────────────────

/// Polls one Redis instance. Holds no state between invocations.
#[derive(Debug, Clone)]
pub struct Collector {
    params: ConnectionParams,
    tags: Vec<String>,
}

impl Collector {
    pub fn new(params: ConnectionParams) -> Result<Self> {
        params.validate()?;
        if params.username.is_some() && params.credentials().is_none() {
            warn!(
                username = params.username.as_deref().unwrap_or_default(),
                "username configured without a password, connecting unauthenticated"
            );
        }
        let tags = params.instance_tags();
        Ok(Self { params, tags })
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Human-readable instance name for logs.
    pub fn instance(&self) -> String {
        match &self.params.unix_socket_path {
            Some(path) => path.clone(),
            None => format!("{}:{}", self.params.host, self.params.port),
        }
    }

    /// Run one check, recording samples into `sink`.
    ///
    /// Authentication and transport failures end the check. Permission and
    /// command failures inside optional sub-collections are logged and listed
    /// in the summary; baseline samples are recorded regardless.
    #[tracing::instrument(name = "redis_check", skip_all, fields(instance = %self.instance()))]
    pub async fn check(&self, sink: &dyn Sink) -> Result<CheckSummary> {
        let mut out = Recorder { sink, recorded: 0 };
        let mut summary = CheckSummary {
            recorded: 0,
            skipped: Vec::new(),
            state: CheckState::Disconnected,
        };

        transition(&mut summary, CheckState::Connecting);
        let mut session = Session::connect(&self.params).await?;

        if let Some(credentials) = self.params.credentials() {
            transition(&mut summary, CheckState::Authenticating);
            if let Err(err) = session.authenticate(credentials).await {
                transition(&mut summary, CheckState::AuthFailed);
                return Err(err);
            }
        }
        transition(&mut summary, CheckState::Authenticated);

        transition(&mut summary, CheckState::Collecting);
        let info = match self.baseline(&mut session, &mut out).await {
            Ok(info) => info,
            Err(err) => {
                // An unauthenticated connection only learns here that
                // credentials were required.
                if err.is_auth() {
                    transition(&mut summary, CheckState::AuthFailed);
                }
                return Err(err);
            }
        };
        let tags = info.tags(&self.tags);

        if !self.params.keys.is_empty() {
            let result = keys::collect(&mut session, &self.params, &self.tags, &mut out).await;
            recover("keys", result, &mut summary)?;
        }
        if self.params.slowlog_max_len > 0 {
            let result = slowlog::collect(&mut session, &self.params, &tags, &mut out).await;
            recover("slowlog", result, &mut summary)?;
        }
        if self.params.command_stats {
            let result = command_stats::collect(&mut session, &tags, &mut out).await;
            recover("command_stats", result, &mut summary)?;
        }
        if self.params.collect_client_metrics {
            let result = clients::collect(&mut session, &tags, &mut out).await;
            recover("client_metrics", result, &mut summary)?;
        }

        transition(&mut summary, CheckState::Done);
        summary.recorded = out.recorded;
        Ok(summary)
    }

    /// Select the configured db, then collect the INFO metrics. Both are
    /// mandatory: a failure here fails the check.
    async fn baseline(&self, session: &mut Session, out: &mut Recorder<'_>) -> Result<Info> {
        if self.params.db != 0 {
            session.select(self.params.db).await?;
        }
        self.collect_info(session, out).await
    }

    /// Everything plain `INFO` reports.
    async fn collect_info(&self, session: &mut Session, out: &mut Recorder<'_>) -> Result<Info> {
        let started = Instant::now();
        let text: String = session.query("INFO", &redis::cmd("INFO")).await?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let info = Info::parse(&text);
        out.extend(info.samples(&self.tags));
        out.record(MetricSample::gauge(
            "redis.info.latency_ms",
            latency_ms,
            info.tags(&self.tags),
        ));
        Ok(info)
    }
}

fn transition(summary: &mut CheckSummary, next: CheckState) {
    debug!(from = %summary.state, to = %next, "check state");
    summary.state = next;
}

/// Swallow recoverable failures of an optional sub-collection.
fn recover(collection: &'static str, result: Result<()>, summary: &mut CheckSummary) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(error) if error.is_recoverable() => {
            warn!(collection, class = ?error.class(), %error, "skipping optional collection");
            summary.skipped.push(SkippedCollection { collection, error });
            Ok(())
        }
        Err(error) => Err(error),
    }
}
