use crate::config::RestarterConfig;
use crate::directory::WorkloadDirectory;
use crate::model::{OwnerOutcome, PodRecord, RunSummary, ALREADY_RESTARTED_REASON, NO_CONTROLLER_REASON};
use crate::owner::resolve_owner;
use crate::rollout::RolloutTrigger;

use controller_core::{telemetry, Error, Metrics, ObjectKey, Result};

use futures::StreamExt;
use kube::client::Client;
use std::collections::HashSet;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::*;

// Context for a restart pass
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Prometheus metrics
    pub metrics: Metrics,
    /// Pass settings
    pub config: RestarterConfig,
    /// Set to stop the pass before the next pod
    pub stop_requested: Arc<AtomicBool>,
}

impl Context {
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    fn should_stop(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }
}

/// Run one pass: restart the controllers of every pod matching the name filter.
///
/// Per-pod failures end up in the summary. Only a failure to list the first page
/// of pods is returned as an error.
#[instrument(skip(ctx), fields(trace_id))]
pub async fn run(ctx: Arc<Context>) -> Result<RunSummary> {
    let trace_id = telemetry::get_trace_id();
    Span::current().record("trace_id", &field::display(&trace_id));
    let _timer = ctx.metrics.measure_pass();

    info!(
        "Restarting controllers of pods matching \"{}\" in all namespaces",
        ctx.config.name_filter.needle(),
    );

    let directory = WorkloadDirectory::new(ctx.client.clone(), ctx.config.page_size);
    let mut pass = Pass {
        ctx: &ctx,
        trigger: RolloutTrigger::new(ctx.client.clone(), &ctx.config),
        restarted_owners: HashSet::new(),
        summary: RunSummary {
            dry_run: ctx.config.dry_run,
            ..Default::default()
        },
    };

    let pages = directory.pages();
    futures::pin_mut!(pages);
    let mut listed_pages = 0;
    'pages: while let Some(page) = pages.next().await {
        let pods = match page {
            Ok(pods) => pods,
            Err(err) if listed_pages == 0 => {
                error!("Failed to list pods: {}", err);
                return Err(err);
            }
            Err(err) => {
                error!("Failed to list further pods, stopping the pass: {}", err);
                pass.summary.truncated = Some(err.to_string());
                break;
            }
        };
        listed_pages += 1;

        for pod in pods {
            if ctx.should_stop() {
                warn!("Stop requested, leaving the remaining pods untouched");
                pass.summary.truncated = Some("stop requested".to_string());
                break 'pages;
            }
            if ctx.config.name_filter.matches(&pod) {
                pass.process(pod).await;
            }
        }
    }

    let summary = pass.summary;
    info!(
        "Pass finished: {} matched, {} restarted, {} skipped, {} errored",
        summary.matched(),
        summary.restarted.len(),
        summary.skipped.len(),
        summary.errored.len(),
    );
    Ok(summary)
}

struct Pass<'a> {
    ctx: &'a Context,
    trigger: RolloutTrigger,
    restarted_owners: HashSet<ObjectKey>,
    summary: RunSummary,
}

impl Pass<'_> {
    async fn process(&mut self, pod: PodRecord) {
        let (kind, owner) = match resolve_owner(&pod) {
            OwnerOutcome::Supported { kind, name, namespace } => (kind, ObjectKey::new(kind.as_str(), namespace, name)),
            OwnerOutcome::UnsupportedKind { kind } => {
                info!("Skipping pod {}: unsupported controller kind {}", pod, kind);
                self.ctx.metrics.restart_skipped("unsupported_kind");
                self.summary
                    .record_skipped(&pod, None, format!("unsupported controller kind {kind}"));
                return;
            }
            OwnerOutcome::NoController => {
                info!("Skipping pod {}: {}", pod, NO_CONTROLLER_REASON);
                self.ctx.metrics.restart_skipped("no_controller");
                self.summary.record_skipped(&pod, None, NO_CONTROLLER_REASON);
                return;
            }
        };

        if self.ctx.config.once_per_controller && self.restarted_owners.contains(&owner) {
            info!("Skipping pod {}: {} was already restarted", pod, owner);
            self.ctx.metrics.restart_skipped("already_restarted");
            self.summary
                .record_skipped(&pod, Some(&owner), ALREADY_RESTARTED_REASON);
            return;
        }

        info!("Restarting pod {} through {}", pod, owner);
        match self
            .trigger
            .trigger_restart(kind, &owner.namespace, &owner.name)
            .await
        {
            Ok(marker) => {
                self.ctx.metrics.restart_triggered(kind.as_str());
                self.summary.record_restarted(&pod, &owner, &marker);
                self.restarted_owners.insert(owner);
            }
            Err(err) => {
                warn!("Failed to restart pod {} through {}: {}", pod, owner, err);
                self.ctx.metrics.restart_failed(kind.as_str(), &err);
                self.summary.record_errored(&pod, &owner, err.to_string());
            }
        }
    }
}

/// State shared between the pass and the process around it
#[derive(Clone, Default)]
pub struct State {
    /// Metrics registry
    registry: prometheus::Registry,
}

impl State {
    /// Metrics in the Prometheus text exposition format
    pub fn render_metrics(&self) -> Result<String> {
        Metrics::render(&self.registry)
    }

    // Create a pass Context that reports into this State
    pub fn to_context(&self, client: Client, config: RestarterConfig) -> Result<Arc<Context>> {
        Ok(Arc::new(Context {
            client,
            metrics: Metrics::default()
                .register(&self.registry)
                .map_err(Error::MetricsError)?,
            config,
            stop_requested: Arc::default(),
        }))
    }
}
