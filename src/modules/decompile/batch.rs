use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::info;

use super::backend::DecompilerTool;
use super::model::{InvocationConfig, InvocationOutcome};
use super::orchestrator::DecompilationOrchestrator;

#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub target: String,
    pub outcome: InvocationOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecompileBatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<BatchItem>,
}

impl<T: DecompilerTool> DecompilationOrchestrator<T> {
    /// Runs every request with bounded concurrency. Items come back in input order.
    pub async fn decompile_batch(&self, requests: &[InvocationConfig]) -> DecompileBatchReport {
        let concurrency = self.config().effective_batch_concurrency();
        let items: Vec<BatchItem> = stream::iter(requests.iter().map(|req| async move {
            BatchItem {
                target: req.target().to_string(),
                outcome: self.decompile(req).await,
            }
        }))
        .buffered(concurrency)
        .collect()
        .await;

        let succeeded = items.iter().filter(|i| i.outcome.is_success()).count();
        let report = DecompileBatchReport {
            total: items.len(),
            succeeded,
            failed: items.len() - succeeded,
            items,
        };
        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            concurrency,
            "batch finished"
        );
        report
    }
}
