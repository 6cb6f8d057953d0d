//! Resource handlers
//!
//! One function per operation, grouped by concern:
//!
//! - [`patient`] - create and search Patient records (search feeds the
//!   session context)
//! - [`clinical`] - patient-scoped sub-resource searches and Medication reads
//! - [`schedule`] - the in-process appointment schedule and booking
//!
//! [`Handlers::handle`] is the only entry point the router uses. It never
//! fails: every error is turned into a failed envelope here.

pub mod clinical;
pub mod patient;
pub mod schedule;

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::context::ResourceContext;
use crate::envelope::{Outcome, ResponseEnvelope};
use crate::error::DispatchError;
use crate::fhir::FhirClient;
use crate::operations::{Operation, OperationKind};

#[derive(Debug, Clone)]
pub struct Handlers {
    fhir: Arc<FhirClient>,
}

impl Handlers {
    pub fn new(fhir: Arc<FhirClient>) -> Self {
        Self { fhir }
    }

    /// Decode, execute and correlate one call
    pub async fn handle(
        &self,
        kind: OperationKind,
        args: &Value,
        id: &str,
        ctx: &ResourceContext,
    ) -> ResponseEnvelope {
        let started = Instant::now();
        info!("Tool call {} ({})", kind.name(), id);

        let result = match Operation::decode(kind, args) {
            Ok(op) => self.execute(op, ctx).await,
            Err(e) => Err(e),
        };

        debug!(
            "Tool call {} ({}) finished in {}ms",
            kind.name(),
            id,
            started.elapsed().as_millis()
        );
        ResponseEnvelope::from_result(id, result)
    }

    pub async fn execute(
        &self,
        op: Operation,
        ctx: &ResourceContext,
    ) -> Result<Outcome, DispatchError> {
        match op {
            Operation::CreateRecord(args) => patient::create_record(&self.fhir, &args).await,
            Operation::SearchRecord(args) => patient::search_record(&self.fhir, &args, ctx).await,
            Operation::SearchSubResource { resource, args } => {
                clinical::search_sub_resource(&self.fhir, resource, &args, ctx).await
            }
            Operation::ReadMedication(args) => clinical::read_medication(&self.fhir, &args).await,
            Operation::GetSchedule(args) => Ok(schedule::get_schedule(&args)),
            Operation::BookAppointment(args) => schedule::book_appointment(&args),
        }
    }
}
