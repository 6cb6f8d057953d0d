//! Session context: the most recently resolved patient id.
//!
//! Single slot, last writer wins, never cleared. One instance per agent
//! session; clones share the slot.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct ResourceContext {
    primary_resource_id: Arc<RwLock<Option<String>>>,
}

impl ResourceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a patient already resolved
    pub fn with_patient(id: impl Into<String>) -> Self {
        Self {
            primary_resource_id: Arc::new(RwLock::new(Some(id.into()))),
        }
    }

    pub async fn patient_id(&self) -> Option<String> {
        self.primary_resource_id.read().await.clone()
    }

    /// Overwrite the stored patient id
    pub async fn set_patient_id(&self, id: impl Into<String>) {
        let id = id.into();
        info!("Session patient context set to {}", id);
        *self.primary_resource_id.write().await = Some(id);
    }

    /// An explicit, non-empty argument wins; otherwise the stored id
    pub async fn resolve(&self, explicit: Option<&str>) -> Option<String> {
        match explicit.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => Some(id.to_string()),
            None => self.patient_id().await,
        }
    }
}
