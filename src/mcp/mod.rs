//! Agent-facing HTTP surface for the tool-call core.
//!
//! Agents either post a whole batch of function calls to `/toolcall`, or
//! speak MCP-style JSON-RPC 2.0 on `/mcp`:
//!
//! ```json
//! {
//!     "jsonrpc": "2.0",
//!     "id": 1,
//!     "method": "tools/call",
//!     "params": {
//!         "name": "search_record",
//!         "arguments": {"givenName": "Camila", "familyName": "Lopez"}
//!     }
//! }
//! ```
//!
//! The result's text content is the envelope output
//! (`{"success": ..., "data": ...}` or `{"success": false, "error": ...}`).
//! Unlike a batch, a single `tools/call` with an unknown name gets an error
//! result back, since there is nothing else in flight to drop it from.
//!
//! All requests to one server share one agent session and therefore one
//! patient context.

mod handlers;
mod server;
mod types;

pub use handlers::AGENT_ID;
pub use server::{router, start_server};
