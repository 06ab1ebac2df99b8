use redis::Value;

use super::Recorder;
use crate::config::ConnectionParams;
use crate::error::Result;
use crate::metrics::{MetricKind, MetricSample};
use crate::redis_client::Session;

/// Every entry returned by `SLOWLOG GET`, one histogram sample each.
pub(super) async fn collect(
    session: &mut Session,
    params: &ConnectionParams,
    tags: &[String],
    out: &mut Recorder<'_>,
) -> Result<()> {
    let mut cmd = redis::cmd("SLOWLOG");
    cmd.arg("GET").arg(params.slowlog_max_len);
    let entries: Vec<Vec<Value>> = session.query("SLOWLOG GET", &cmd).await?;

    for entry in &entries {
        let Some((micros, command)) = parse_entry(entry) else {
            tracing::debug!("ignoring malformed slowlog entry");
            continue;
        };
        let mut entry_tags = tags.to_vec();
        entry_tags.push(format!("command:{command}"));
        out.record(MetricSample::new(
            "redis.slowlog.micros",
            MetricKind::Histogram,
            micros,
            entry_tags,
        ));
    }
    Ok(())
}

/// `[id, unix_time, duration_us, [argv...], client_addr, client_name]`;
/// servers before 4.0 stop after argv.
fn parse_entry(entry: &[Value]) -> Option<(f64, String)> {
    let micros: i64 = redis::from_redis_value(entry.get(2)?).ok()?;
    let argv: Vec<String> = redis::from_redis_value(entry.get(3)?).ok()?;
    let command = argv.first()?.to_lowercase();
    Some((micros as f64, command))
}
