//! Agent session
//!
//! A session is the lifetime of the batch listener: it owns one patient
//! context and one router, takes batches off the inbound channel and emits
//! correlated responses on the outbound one. It ends when the agent drops the
//! inbound sender.
//!
//! Under [`BatchOrdering::ContextFirst`] batches are handled one after the
//! other in arrival order, so a patient search in one batch is visible to
//! the next batch and responses leave in the order batches came in. Under
//! [`BatchOrdering::Concurrent`] each batch runs as its own task and
//! responses leave as batches complete.

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::BatchOrdering;
use crate::context::ResourceContext;
use crate::envelope::{Correlator, ResponseEnvelope, ToolResponse};
use crate::operations::{ToolCallBatch, ToolCallRequest};
use crate::router::CallRouter;

#[derive(Debug, Clone)]
pub struct AgentSession {
    router: CallRouter,
    context: ResourceContext,
}

impl AgentSession {
    pub fn new(router: CallRouter) -> Self {
        Self::with_context(router, ResourceContext::new())
    }

    pub fn with_context(router: CallRouter, context: ResourceContext) -> Self {
        Self { router, context }
    }

    pub fn context(&self) -> &ResourceContext {
        &self.context
    }

    pub async fn handle_batch(&self, batch: &ToolCallBatch) -> ToolResponse {
        ToolResponse {
            function_responses: self.router.dispatch(batch, &self.context).await,
        }
    }

    pub async fn handle_call(&self, request: &ToolCallRequest) -> Option<ResponseEnvelope> {
        self.router.dispatch_one(request, &self.context).await
    }

    /// Listen for batches until `inbound` closes, then wait for in-flight
    /// batches to finish
    pub async fn run(self, mut inbound: mpsc::Receiver<ToolCallBatch>, correlator: Correlator) {
        info!("Agent session started ({:?} ordering)", self.router.ordering());
        let mut in_flight = JoinSet::new();

        while let Some(batch) = inbound.recv().await {
            debug!("Received batch of {} call(s)", batch.function_calls.len());

            if self.router.ordering() == BatchOrdering::ContextFirst {
                let response = self.handle_batch(&batch).await;
                correlator.emit(response.function_responses).await;
                continue;
            }

            let session = self.clone();
            let correlator = correlator.clone();
            in_flight.spawn(async move {
                let response = session.handle_batch(&batch).await;
                correlator.emit(response.function_responses).await;
            });

            // Reap finished batches so the set does not grow unbounded
            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    warn!("Batch task failed: {}", e);
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                warn!("Batch task failed: {}", e);
            }
        }
        info!("Agent session ended");
    }
}

/// Spawn a session on the runtime and hand back the agent-side channel ends
pub fn spawn_session(
    session: AgentSession,
    buffer: usize,
) -> (mpsc::Sender<ToolCallBatch>, mpsc::Receiver<ToolResponse>) {
    let (batch_tx, batch_rx) = mpsc::channel(buffer);
    let (response_tx, response_rx) = mpsc::channel(buffer);
    tokio::spawn(session.run(batch_rx, Correlator::new(response_tx)));
    (batch_tx, response_rx)
}
