//! Patient-scoped clinical searches and Medication reads

use tracing::warn;

use crate::context::ResourceContext;
use crate::envelope::Outcome;
use crate::error::DispatchError;
use crate::fhir::FhirClient;
use crate::operations::{ReadMedicationArgs, SubResource, SubResourceArgs};

/// Query parameters for a sub-resource search of `patient_id`
pub fn sub_resource_params(resource: SubResource, patient_id: &str) -> Vec<(&'static str, String)> {
    let mut params = vec![("patient", patient_id.to_string())];
    params.extend(
        resource
            .fixed_filters()
            .iter()
            .map(|(key, value)| (*key, value.to_string())),
    );
    params
}

/// Search `resource` for a patient. Without a `patientId` argument the
/// session context is used; with neither, fail before any network call.
pub async fn search_sub_resource(
    fhir: &FhirClient,
    resource: SubResource,
    args: &SubResourceArgs,
    ctx: &ResourceContext,
) -> Result<Outcome, DispatchError> {
    let patient_id = match ctx.resolve(args.patient_id.as_deref()).await {
        Some(id) => id,
        None => {
            warn!("{} search without a patient id", resource.resource_type());
            return Err(DispatchError::no_identifier());
        }
    };

    let params = sub_resource_params(resource, &patient_id);
    let response = fhir.search(resource.resource_type(), &params).await?;
    Ok(response.into())
}

/// Read a Medication by its own id. Never falls back to the patient context.
pub async fn read_medication(
    fhir: &FhirClient,
    args: &ReadMedicationArgs,
) -> Result<Outcome, DispatchError> {
    let response = fhir.read("Medication", &args.medication_id).await?;
    Ok(response.into())
}
