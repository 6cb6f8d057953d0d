//! In-process stand-ins for the token endpoint and the FHIR server.
//!
//! `MockUpstream` serves both on an ephemeral loopback port, counts hits and
//! records every FHIR request so tests can assert on what went over the wire.

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use crate::config::BatchOrdering;
use crate::context::ResourceContext;
use crate::credentials::{Credential, CredentialProvider, TokenEndpoint};
use crate::error::DispatchError;
use crate::fhir::FhirClient;
use crate::handlers::Handlers;
use crate::router::CallRouter;
use crate::session::AgentSession;

pub const MOCK_TOKEN: &str = "mock-access-token";

/// Id of the single patient the mock finds for `given=Camila`.
/// `given=Outage` answers 500 with a one-entry bundle.
pub const CAMILA_ID: &str = "erXuFYUfucBZaryVksYEcMg3";

/// Credential provider that never touches the network
pub struct StaticCredential;

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn acquire(&self) -> Result<Credential, DispatchError> {
        Ok(Credential {
            token: "static-test-token".to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct MockState {
    token_hits: AtomicUsize,
    fhir_hits: AtomicUsize,
    token_failure: Mutex<Option<String>>,
    patient_search_delay_ms: AtomicU64,
    requests: Mutex<Vec<SeenRequest>>,
}

pub struct MockUpstream {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/getToken", get(token_handler))
            .route("/fhir/*path", any(fhir_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn token_url(&self) -> String {
        format!("http://{}/getToken", self.addr)
    }

    pub fn fhir_base(&self) -> String {
        format!("http://{}/fhir", self.addr)
    }

    pub fn token_hits(&self) -> usize {
        self.state.token_hits.load(Ordering::SeqCst)
    }

    pub fn fhir_hits(&self) -> usize {
        self.state.fhir_hits.load(Ordering::SeqCst)
    }

    /// Total requests to either endpoint
    pub fn network_calls(&self) -> usize {
        self.token_hits() + self.fhir_hits()
    }

    pub fn last_request(&self) -> Option<SeenRequest> {
        self.state.requests.lock().unwrap().last().cloned()
    }

    /// Make the token endpoint answer 500 with `body`
    pub fn fail_token_endpoint(&self, body: &str) {
        *self.state.token_failure.lock().unwrap() = Some(body.to_string());
    }

    /// Hold Patient searches for `delay` before answering
    pub fn delay_patient_search(&self, delay: Duration) {
        self.state
            .patient_search_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

async fn token_handler(State(state): State<Arc<MockState>>) -> Response {
    state.token_hits.fetch_add(1, Ordering::SeqCst);
    let failure = state.token_failure.lock().unwrap().clone();
    match failure {
        Some(body) => (StatusCode::INTERNAL_SERVER_ERROR, body).into_response(),
        None => Json(json!({
            "access_token": MOCK_TOKEN,
            "token_type": "Bearer",
            "expires_in": 3600
        }))
        .into_response(),
    }
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn search_bundle(entries: Vec<Value>) -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "total": entries.len(),
        "entry": entries
    })
}

async fn fhir_handler(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.fhir_hits.fetch_add(1, Ordering::SeqCst);

    let path = uri.path().to_string();
    let query = uri.query().map(|q| q.to_string());
    state.requests.lock().unwrap().push(SeenRequest {
        method: method.as_str().to_string(),
        path: path.clone(),
        query: query.clone(),
        authorization: header_string(&headers, header::AUTHORIZATION),
        accept: header_string(&headers, header::ACCEPT),
        content_type: header_string(&headers, header::CONTENT_TYPE),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let query = query.unwrap_or_default();
    let segments: Vec<&str> = path
        .trim_start_matches("/fhir/")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match (method.as_str(), segments.as_slice()) {
        ("POST", ["Patient"]) => (
            StatusCode::CREATED,
            [(header::LOCATION, "Patient/new-patient-1")],
            Json(json!({"resourceType": "Patient", "id": "new-patient-1"})),
        )
            .into_response(),
        ("GET", ["Patient"]) => {
            let delay = state.patient_search_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if query.contains("given=Outage") {
                // Error status whose body still looks like a hit
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(search_bundle(vec![json!({
                        "resource": {"resourceType": "Patient", "id": "stale-patient"}
                    })])),
                )
                    .into_response();
            }
            let entries = if query.contains("given=Camila") {
                vec![json!({
                    "fullUrl": format!("Patient/{}", CAMILA_ID),
                    "resource": {
                        "resourceType": "Patient",
                        "id": CAMILA_ID,
                        "name": [{"family": "Lopez", "given": ["Camila"]}]
                    }
                })]
            } else {
                vec![]
            };
            Json(search_bundle(entries)).into_response()
        }
        ("GET", ["Medication", "garbled"]) => (StatusCode::OK, "<<not json>>").into_response(),
        ("GET", ["Medication", "missing"]) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "resourceType": "OperationOutcome",
                "issue": [{"severity": "error", "code": "not-found"}]
            })),
        )
            .into_response(),
        ("GET", ["Medication", id]) => Json(json!({
            "resourceType": "Medication",
            "id": id,
            "code": {"text": "Lisinopril 10 MG Oral Tablet"}
        }))
        .into_response(),
        ("GET", [resource_type]) => {
            let patient = query
                .split('&')
                .find_map(|kv| kv.strip_prefix("patient="))
                .unwrap_or_default();
            Json(search_bundle(vec![json!({
                "resource": {
                    "resourceType": resource_type,
                    "id": format!("{}-1", resource_type.to_lowercase()),
                    "subject": {"reference": format!("Patient/{}", patient)}
                }
            })]))
            .into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Session wired to `upstream` through the real token-endpoint provider
pub fn mock_session_with(upstream: &MockUpstream, ordering: BatchOrdering) -> AgentSession {
    let credentials = TokenEndpoint::new(&upstream.token_url(), Duration::from_secs(5)).unwrap();
    let fhir = FhirClient::new(
        &upstream.fhir_base(),
        Arc::new(credentials),
        Duration::from_secs(5),
    )
    .unwrap();
    let router = CallRouter::new(Handlers::new(Arc::new(fhir)), ordering);
    AgentSession::with_context(router, ResourceContext::new())
}

pub fn mock_session(upstream: &MockUpstream) -> AgentSession {
    mock_session_with(upstream, BatchOrdering::ContextFirst)
}
