use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use redisdb_check::{CheckConfig, Collector, ConnectionParams, JsonLinesSink, Sink};

#[derive(Parser)]
#[command(name = "redisdb-check")]
#[command(about = "Run the Redis check once and print samples as JSON lines")]
struct Args {
    /// JSON file with `{"instances": [...]}`; overrides the instance flags
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "localhost")]
    host: String,

    #[arg(short, long, default_value_t = 6379)]
    port: u16,

    /// ACL user (needs --password)
    #[arg(short, long)]
    username: Option<String>,

    #[arg(short = 'a', long, env = "REDISDB_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long)]
    collect_client_metrics: bool,

    #[arg(long)]
    command_stats: bool,

    /// Extra tag, repeatable (e.g. --tag env:prod)
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Seconds allowed for the connect and each command
    #[arg(long, default_value_t = 5.0)]
    timeout: f64,
}

impl Args {
    fn instances(&self) -> anyhow::Result<Vec<ConnectionParams>> {
        if let Some(path) = &self.config {
            return Ok(CheckConfig::load(path)?.instances);
        }

        Ok(vec![ConnectionParams {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            collect_client_metrics: self.collect_client_metrics,
            command_stats: self.command_stats,
            tags: self.tags.clone(),
            socket_timeout: self.timeout,
            ..ConnectionParams::default()
        }])
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Samples go to stdout, logs to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // ── 1. Build collectors ──────────────────────────────────────
    let instances = args.instances()?;
    if instances.is_empty() {
        anyhow::bail!("no instances configured");
    }
    let collectors = instances
        .into_iter()
        .map(Collector::new)
        .collect::<Result<Vec<_>, _>>()?;

    // ── 2. Run every instance concurrently into one sink ─────────
    let sink: Arc<dyn Sink> = Arc::new(JsonLinesSink::new(std::io::stdout()));
    let mut handles = Vec::with_capacity(collectors.len());

    for collector in collectors {
        let sink = sink.clone();
        handles.push(tokio::spawn(async move {
            let result = collector.check(&*sink).await;
            (collector.instance(), result)
        }));
    }

    // ── 3. Report ────────────────────────────────────────────────
    let mut failed = 0usize;
    for h in handles {
        let (instance, result) = h.await?;
        match result {
            Ok(summary) => {
                tracing::info!(
                    %instance,
                    recorded = summary.recorded,
                    skipped = summary.skipped.len(),
                    "check ok"
                );
            }
            Err(err) => {
                failed += 1;
                tracing::error!(%instance, class = ?err.class(), %err, "check failed");
            }
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
