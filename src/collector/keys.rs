use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::Recorder;
use crate::config::ConnectionParams;
use crate::error::Result;
use crate::metrics::MetricSample;
use crate::redis_client::Session;

const SCAN_COUNT: usize = 1_000;

/// Length of every key matching the configured names or patterns.
pub(super) async fn collect(
    session: &mut Session,
    params: &ConnectionParams,
    tags: &[String],
    out: &mut Recorder<'_>,
) -> Result<()> {
    let db_tag = format!("redis_db:db{}", params.db);

    for pattern in &params.keys {
        let names = scan(session, pattern).await?;

        if names.is_empty() {
            if params.warn_on_missing_keys {
                warn!(pattern = %pattern, db = params.db, "no key matches configured pattern");
            }
            let mut key_tags = tags.to_vec();
            key_tags.extend([format!("key:{pattern}"), "key_type:none".into(), db_tag.clone()]);
            out.record(MetricSample::gauge("redis.key.length", 0.0, key_tags));
            continue;
        }

        for name in names {
            let key_type: String = session
                .query("TYPE", redis::cmd("TYPE").arg(&name))
                .await?;
            let Some(length_cmd) = length_command(&key_type) else {
                debug!(key = %name, key_type = %key_type, "no length for key type");
                continue;
            };

            let length: i64 = session
                .query(length_cmd, redis::cmd(length_cmd).arg(&name))
                .await?;

            let mut key_tags = tags.to_vec();
            key_tags.extend([
                format!("key:{name}"),
                format!("key_type:{key_type}"),
                db_tag.clone(),
            ]);
            out.record(MetricSample::gauge("redis.key.length", length as f64, key_tags));
        }
    }
    Ok(())
}

async fn scan(session: &mut Session, pattern: &str) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    let mut cursor: u64 = 0;

    loop {
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_COUNT);
        let (next, batch): (u64, Vec<String>) = session.query("SCAN", &cmd).await?;
        names.extend(batch);
        if next == 0 {
            return Ok(names);
        }
        cursor = next;
    }
}

/// `None` for types without a meaningful length, and for keys that expired
/// between `SCAN` and `TYPE`.
fn length_command(key_type: &str) -> Option<&'static str> {
    match key_type {
        "list" => Some("LLEN"),
        "set" => Some("SCARD"),
        "zset" => Some("ZCARD"),
        "hash" => Some("HLEN"),
        "stream" => Some("XLEN"),
        "string" => Some("STRLEN"),
        _ => None,
    }
}
