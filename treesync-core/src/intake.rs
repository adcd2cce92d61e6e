//! Message intake: one inbound message in, one notification and one acknowledgment out.
//!
//! # Responsibilities
//! - Parse the message body into a folder tree and run the [`TreeDownloader`] on it.
//! - Convert every failure, including panics raised while processing, into a failed [`JobOutcome`].
//! - Report the outcome, then acknowledge the message exactly once whatever the result.
//!   A message that reached the handler is never redelivered.
//!
//! # Concurrency
//! [`drain`] pulls messages until the transport has nothing left, running up to
//! `max_concurrent_jobs` handlers at once. Each handler runs its own traversal sequentially.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tracing::{error, info, info_span, Instrument};

use crate::contract::{InboundMessage, QueueTransport};
use crate::download::{DownloadReport, TreeDownloader};
use crate::error::{SyncError, SyncResult};
use crate::outcome::{JobOutcome, OutcomeReporter};
use crate::tree::parse_tree;

pub struct MessageHandler {
    downloader: TreeDownloader,
    reporter: OutcomeReporter,
}

impl MessageHandler {
    pub fn new(downloader: TreeDownloader, reporter: OutcomeReporter) -> Self {
        Self {
            downloader,
            reporter,
        }
    }

    /// Processes and reports a message, then acknowledges it on `transport`.
    pub async fn handle(
        &self,
        message: InboundMessage,
        transport: &dyn QueueTransport,
    ) -> JobOutcome {
        let span = info_span!("message", message_id = %message.id);
        async {
            let outcome = self.execute(&message).await;
            if let Err(e) = transport.acknowledge(&message.id).await {
                error!(error = %e, "Failed to acknowledge message");
            }
            outcome
        }
        .instrument(span)
        .await
    }

    /// Processes and reports a message without touching any queue.
    pub async fn execute(&self, message: &InboundMessage) -> JobOutcome {
        let outcome = self.process(message).await;
        self.reporter.report(&outcome).await;
        outcome
    }

    /// Runs the download for a message and folds the result into an outcome.
    pub async fn process(&self, message: &InboundMessage) -> JobOutcome {
        let result = AssertUnwindSafe(self.run_job(&message.body))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(SyncError::Fault(panic_description(panic))));

        match result {
            Ok(report) => {
                info!(
                    message_id = %message.id,
                    files_fetched = report.files_fetched,
                    skipped = report.skipped.len(),
                    "Message processed"
                );
                JobOutcome::succeeded(&message.id)
            }
            Err(e) => {
                error!(message_id = %message.id, error = %e, "Message processing failed");
                JobOutcome::failed(&message.id, e.to_string())
            }
        }
    }

    async fn run_job(&self, body: &[u8]) -> SyncResult<DownloadReport> {
        let tree = parse_tree(body)?
            .ok_or_else(|| SyncError::Parse("message body carries no tree".to_owned()))?;
        self.downloader.download(&tree, "").await
    }
}

fn panic_description(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected fault while processing message".to_owned()
    }
}

/// Counts for one pass over the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeSummary {
    pub received: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Handles messages until `transport` reports no more, at most `max_concurrent_jobs` at a time.
///
/// A receive error is passed to the transport's error hook and ends the pass.
pub async fn drain(
    handler: &MessageHandler,
    transport: &dyn QueueTransport,
    max_concurrent_jobs: usize,
) -> IntakeSummary {
    let messages = stream::unfold(transport, |transport| async move {
        match transport.receive().await {
            Ok(Some(message)) => Some((message, transport)),
            Ok(None) => None,
            Err(e) => {
                error!(error = %e, "Failed to receive message");
                transport.report_transport_error(&e.to_string());
                None
            }
        }
    });

    let summary = messages
        .map(|message| handler.handle(message, transport))
        .buffer_unordered(max_concurrent_jobs.max(1))
        .fold(IntakeSummary::default(), |mut summary, outcome| async move {
            summary.received += 1;
            if outcome.success {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            summary
        })
        .await;

    info!(
        received = summary.received,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Queue drained"
    );
    summary
}
