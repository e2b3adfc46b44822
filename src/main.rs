use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use subhealth::duration::parse_duration;
use subhealth::{InMemoryRegistry, MissingMetricsPolicy, Settings};
use subhealth_adapters::{MetricsSource, StaticMetrics};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "subhealth")]
#[command(about = "List the unhealthy subscriptions of a subscription owner")]
struct Args {
    /// Path to the registry JSON file
    #[arg(short, long)]
    registry: PathBuf,

    /// Graphite render API base URL (overrides metrics.graphite_url)
    #[arg(short, long, conflicts_with = "metrics")]
    graphite: Option<String>,

    /// Path to a static metrics JSON file
    #[arg(short, long, conflicts_with = "graphite")]
    metrics: Option<PathBuf>,

    /// Path to a TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Owner source (Plaintext, Crowd, "Service Catalog")
    #[arg(long, default_value = "Plaintext")]
    owner_source: String,

    /// Owner identifier within the source
    #[arg(short, long)]
    owner: String,

    /// Rate window (e.g., "2m", "90s")
    #[arg(long)]
    window: Option<String>,

    /// Fraction of the topic rate below which a subscription is slow
    #[arg(long)]
    slow_ratio: Option<f64>,

    /// Query deadline (e.g., "30s"); "0s" disables it
    #[arg(long)]
    timeout: Option<String>,

    /// Report subscriptions without metrics as UNKNOWN instead of skipping them
    #[arg(long)]
    report_unknown: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let settings = settings_from(&args)?;

    let registry = InMemoryRegistry::load(&args.registry)
        .with_context(|| format!("Failed to load registry {}", args.registry.display()))?;
    let metrics: Arc<dyn MetricsSource> = match &args.metrics {
        Some(path) => Arc::new(
            StaticMetrics::load(path)
                .with_context(|| format!("Failed to load metrics {}", path.display()))?,
        ),
        None => settings.graphite_source()?,
    };
    debug!(metrics = metrics.description(), "metrics source ready");

    let service = settings.query_service(Arc::new(registry), metrics);

    // Build a tokio runtime for the query
    let rt = tokio::runtime::Runtime::new()?;
    let unhealthy =
        rt.block_on(service.list_unhealthy_for_owner(&args.owner_source, &args.owner))?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&unhealthy)?
    } else {
        serde_json::to_string(&unhealthy)?
    };
    println!("{}", json);
    Ok(())
}

/// Settings from the config file and environment, with CLI flags applied on top.
fn settings_from(args: &Args) -> Result<Settings> {
    let mut settings = Settings::load(args.config.as_deref())?;

    if let Some(url) = &args.graphite {
        settings.metrics.graphite_url = Some(url.clone());
    }
    if let Some(window) = &args.window {
        settings.metrics.window = parse_duration(window)?;
    }
    if let Some(ratio) = args.slow_ratio {
        settings.health.slow_ratio = ratio;
    }
    if let Some(timeout) = &args.timeout {
        settings.query.timeout = parse_duration(timeout)?;
    }
    if args.report_unknown {
        settings.query.missing_metrics = MissingMetricsPolicy::ReportUnknown;
    }
    Ok(settings)
}
