//! Event loop with a bounded worker pool and graceful shutdown.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::controller::PipelineController;
use super::stability::SizeProbe;
use super::types::{IngressEvent, ItemOutcome};

/// Outcome counts for one run of the loop.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub events: u64,
    pub outcomes: BTreeMap<&'static str, u64>,
    /// Units of work that panicked.
    pub panicked: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &ItemOutcome) {
        *self.outcomes.entry(outcome.label()).or_default() += 1;
    }

    pub fn count(&self, label: &str) -> u64 {
        self.outcomes.get(label).copied().unwrap_or(0)
    }
}

/// Consume events until the channel closes or `shutdown` fires.
///
/// At most `workers` events are handled at once. After the loop stops
/// accepting events it waits for in-flight work, so every lock taken by
/// this run is released before returning.
pub async fn run<P>(
    controller: Arc<PipelineController<P>>,
    mut events: mpsc::Receiver<IngressEvent>,
    workers: usize,
    shutdown: CancellationToken,
) -> RunSummary
where
    P: SizeProbe + 'static,
{
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks: JoinSet<ItemOutcome> = JoinSet::new();
    let mut summary = RunSummary::default();

    crate::log_event!("runner", "started", "{} workers", workers.max(1));

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                crate::log_event!("runner", "shutdown requested");
                break;
            }

            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                record_joined(&mut summary, joined);
            }

            maybe_event = events.recv() => {
                let Some(event) = maybe_event else {
                    crate::debug_event!("runner", "event source closed");
                    break;
                };
                summary.events += 1;

                let permit = tokio::select! {
                    _ = shutdown.cancelled() => {
                        crate::log_event!("runner", "shutdown requested");
                        break;
                    }
                    permit = permits.clone().acquire_owned() => permit,
                };
                let Ok(permit) = permit else {
                    break;
                };

                let controller = controller.clone();
                tasks.spawn(async move {
                    let outcome = controller.handle(event).await;
                    drop(permit);
                    outcome
                });
            }
        }
    }

    // Stop accepting; drain in-flight work.
    events.close();
    if !tasks.is_empty() {
        crate::log_event!("runner", "draining", "{} in flight", tasks.len());
    }
    while let Some(joined) = tasks.join_next().await {
        record_joined(&mut summary, joined);
    }

    crate::log_event!(
        "runner",
        "stopped",
        "{}",
        serde_json::to_string(&summary).unwrap_or_default()
    );
    summary
}

fn record_joined(summary: &mut RunSummary, joined: Result<ItemOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(outcome) => summary.record(&outcome),
        Err(e) => {
            summary.panicked += 1;
            tracing::error!("[runner] unit of work aborted: {e}");
        }
    }
}
