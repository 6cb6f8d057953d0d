//! Tool-call dispatch core for a clinic front-desk voice agent.
//!
//! The agent emits batches of named function calls; this crate routes each
//! to a handler, talks to the FHIR R4 records API with a freshly fetched
//! bearer token, and answers with one correlated response envelope per
//! handled call.

pub mod config;
pub mod context;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod fhir;
pub mod handlers;
pub mod mcp;
pub mod operations;
pub mod router;
pub mod session;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

pub use config::{BatchOrdering, Config};
pub use context::ResourceContext;
pub use envelope::{ResponseEnvelope, ToolOutput, ToolResponse};
pub use error::DispatchError;
pub use operations::{ToolCallBatch, ToolCallRequest};
pub use session::AgentSession;

/// Build a session from configuration: token-endpoint credentials, FHIR
/// client, handlers and router, with an empty patient context
pub fn build_session(config: &Config) -> Result<AgentSession, DispatchError> {
    let fhir = fhir::FhirClient::from_config(config)?;
    let handlers = handlers::Handlers::new(Arc::new(fhir));
    let router = router::CallRouter::new(handlers, config.batch_ordering);
    Ok(AgentSession::new(router))
}
