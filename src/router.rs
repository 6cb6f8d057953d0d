//! Call routing
//!
//! Matches a batch of function calls against the operation registry and runs
//! the matched calls. Per operation only the first call in the batch with
//! that name is acted on; calls naming unknown operations are dropped without
//! a response.

use futures_util::future::join_all;
use tracing::debug;

use crate::config::BatchOrdering;
use crate::context::ResourceContext;
use crate::envelope::ResponseEnvelope;
use crate::handlers::Handlers;
use crate::operations::{OperationKind, ToolCallBatch, ToolCallRequest};

/// A call selected for execution
#[derive(Debug, Clone, Copy)]
pub struct RoutedCall<'a> {
    /// Index of the call in its batch
    pub position: usize,
    pub kind: OperationKind,
    pub request: &'a ToolCallRequest,
}

/// Select the calls to execute, in batch order
pub fn route(batch: &ToolCallBatch) -> Vec<RoutedCall<'_>> {
    let mut routed: Vec<RoutedCall<'_>> = OperationKind::ALL
        .into_iter()
        .filter_map(|kind| {
            batch
                .function_calls
                .iter()
                .enumerate()
                .find(|(_, request)| request.name == kind.name())
                .map(|(position, request)| RoutedCall {
                    position,
                    kind,
                    request,
                })
        })
        .collect();

    for (position, request) in batch.function_calls.iter().enumerate() {
        if OperationKind::from_name(&request.name).is_none() {
            debug!("Ignoring unregistered tool call '{}' ({})", request.name, request.id);
        } else if !routed.iter().any(|call| call.position == position) {
            debug!("Ignoring repeated tool call '{}' ({})", request.name, request.id);
        }
    }

    routed.sort_by_key(|call| call.position);
    routed
}

#[derive(Debug, Clone)]
pub struct CallRouter {
    handlers: Handlers,
    ordering: BatchOrdering,
}

impl CallRouter {
    pub fn new(handlers: Handlers, ordering: BatchOrdering) -> Self {
        Self { handlers, ordering }
    }

    pub fn ordering(&self) -> BatchOrdering {
        self.ordering
    }

    /// Run every routed call of `batch`; one envelope per routed call, in
    /// batch order
    pub async fn dispatch(
        &self,
        batch: &ToolCallBatch,
        ctx: &ResourceContext,
    ) -> Vec<ResponseEnvelope> {
        let calls = route(batch);

        match self.ordering {
            BatchOrdering::Concurrent => join_all(calls.iter().map(|call| self.run(call, ctx))).await,
            BatchOrdering::ContextFirst => {
                let (writers, readers): (Vec<&RoutedCall<'_>>, Vec<&RoutedCall<'_>>) =
                    calls.iter().partition(|call| call.kind.writes_context());

                let mut done = Vec::with_capacity(calls.len());
                for call in writers {
                    done.push((call.position, self.run(call, ctx).await));
                }
                let rest = join_all(
                    readers
                        .into_iter()
                        .map(|call| async move { (call.position, self.run(call, ctx).await) }),
                )
                .await;
                done.extend(rest);

                done.sort_by_key(|(position, _)| *position);
                done.into_iter().map(|(_, envelope)| envelope).collect()
            }
        }
    }

    /// Run a single call outside of a batch. `None` for unknown names.
    pub async fn dispatch_one(
        &self,
        request: &ToolCallRequest,
        ctx: &ResourceContext,
    ) -> Option<ResponseEnvelope> {
        let kind = OperationKind::from_name(&request.name)?;
        Some(self.handlers.handle(kind, &request.args, &request.id, ctx).await)
    }

    async fn run(&self, call: &RoutedCall<'_>, ctx: &ResourceContext) -> ResponseEnvelope {
        self.handlers
            .handle(call.kind, &call.request.args, &call.request.id, ctx)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, id: &str) -> ToolCallRequest {
        ToolCallRequest::new(name, id, json!({}))
    }

    #[test]
    fn test_route_drops_unknown_names() {
        let batch = ToolCallBatch::from(vec![
            call("render_altair", "a"),
            call("get_schedule", "b"),
            call("search_recrod", "c"),
        ]);
        let routed = route(&batch);
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].request.id, "b");
        assert_eq!(routed[0].kind, OperationKind::GetSchedule);
    }

    #[test]
    fn test_route_first_match_wins() {
        let batch = ToolCallBatch::from(vec![
            call("get_schedule", "first"),
            call("get_schedule", "second"),
        ]);
        let routed = route(&batch);
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].request.id, "first");
    }

    #[test]
    fn test_route_keeps_batch_order() {
        let batch = ToolCallBatch::from(vec![
            call("book_appointment", "x"),
            call("search_observation", "y"),
            call("create_record", "z"),
        ]);
        let ids: Vec<_> = route(&batch).iter().map(|c| c.request.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
        assert_eq!(route(&batch)[0].position, 0);
    }

    #[test]
    fn test_route_empty_batch() {
        assert!(route(&ToolCallBatch::default()).is_empty());
    }
}
