use super::Recorder;
use crate::error::Result;
use crate::info::parse_command_stats;
use crate::metrics::MetricSample;
use crate::redis_client::Session;

pub(super) async fn collect(
    session: &mut Session,
    tags: &[String],
    out: &mut Recorder<'_>,
) -> Result<()> {
    let mut cmd = redis::cmd("INFO");
    cmd.arg("commandstats");
    let text: String = session.query("INFO commandstats", &cmd).await?;

    for stats in parse_command_stats(&text) {
        let mut command_tags = tags.to_vec();
        command_tags.push(format!("command:{}", stats.command));

        out.record(MetricSample::gauge(
            "redis.command.calls",
            stats.calls,
            &command_tags,
        ));
        out.record(MetricSample::gauge(
            "redis.command.usec_per_call",
            stats.usec_per_call,
            &command_tags,
        ));
    }
    Ok(())
}
