use controller_core::telemetry;
use restarter::{directory::DEFAULT_PAGE_SIZE, filter::{NameFilter, DEFAULT_NAME_FILTER}, RestarterConfig, State};

use anyhow::Context as _;
use clap::{builder::NonEmptyStringValueParser, Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Rollout-restart the Deployments and StatefulSets that own matching pods
#[derive(Parser, Debug)]
#[command(name = "restarter", version)]
struct Args {
    /// Path to a kubeconfig file; inferred from the environment when omitted
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use instead of the current one
    #[arg(long)]
    context: Option<String>,

    /// Substring a pod name must contain (case-sensitive)
    #[arg(long, env = "RESTARTER_NAME_FILTER", default_value = DEFAULT_NAME_FILTER, value_parser = NonEmptyStringValueParser::new())]
    name_filter: String,

    /// Number of pods requested per list call
    #[arg(long, env = "RESTARTER_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
    page_size: u32,

    /// Validate updates on the server without persisting them
    #[arg(long)]
    dry_run: bool,

    /// Re-read and retry a controller update this many times on conflict
    #[arg(long, env = "RESTARTER_CONFLICT_RETRIES", default_value_t = 0)]
    conflict_retries: u32,

    /// Restart each controller at most once, even when several of its pods match
    #[arg(long)]
    once_per_controller: bool,

    /// How to print the run summary
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Write Prometheus metrics for the pass to this file
    #[arg(long)]
    metrics_file: Option<PathBuf>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Args {
    fn config(&self) -> RestarterConfig {
        RestarterConfig {
            name_filter: NameFilter::new(self.name_filter.clone()),
            page_size: self.page_size,
            dry_run: self.dry_run,
            conflict_retries: self.conflict_retries,
            once_per_controller: self.once_per_controller,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init(args.log_format == LogFormat::Json)
        .await
        .context("failed to initialize telemetry")?;

    let client = restarter::kube_client(args.kubeconfig.as_deref(), args.context.clone())
        .await
        .context("failed to create kube client")?;

    let state = State::default();
    let ctx = state.to_context(client, args.config())?;

    let signal_ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current pod");
            signal_ctx.request_stop();
        }
    });

    let summary = restarter::run(ctx).await.context("restart pass failed")?;

    match args.output {
        OutputFormat::Text => print!("{summary}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&summary)?),
    }

    if let Some(path) = &args.metrics_file {
        std::fs::write(path, state.render_metrics()?)
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
        info!("Wrote metrics to {}", path.display());
    }
    Ok(())
}
