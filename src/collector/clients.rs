use std::collections::BTreeMap;

use super::Recorder;
use crate::error::Result;
use crate::metrics::MetricSample;
use crate::redis_client::Session;

/// Connection count per client name from a `CLIENT LIST` reply.
/// Unnamed clients are grouped under `unknown`.
pub fn parse_client_list(text: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let name = line
            .split(' ')
            .find_map(|field| field.strip_prefix("name="))
            .filter(|name| !name.is_empty())
            .unwrap_or("unknown");
        *counts.entry(name.to_owned()).or_insert(0) += 1;
    }

    counts
}

pub(super) async fn collect(
    session: &mut Session,
    tags: &[String],
    out: &mut Recorder<'_>,
) -> Result<()> {
    let mut cmd = redis::cmd("CLIENT");
    cmd.arg("LIST");
    let text: String = session.query("CLIENT LIST", &cmd).await?;

    for (name, count) in parse_client_list(&text) {
        let mut sample_tags = tags.to_vec();
        sample_tags.push(format!("source:{name}"));
        out.record(MetricSample::gauge(
            "redis.net.connections",
            count as f64,
            sample_tags,
        ));
    }
    Ok(())
}
