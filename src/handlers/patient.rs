//! Patient create and search

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::context::ResourceContext;
use crate::envelope::Outcome;
use crate::error::DispatchError;
use crate::fhir::FhirClient;
use crate::operations::{CreateRecordArgs, SearchRecordArgs};

/// US SSN identifier system; new records carry a placeholder value in it
pub const SSN_SYSTEM: &str = "urn:oid:2.16.840.1.113883.4.1";
pub const PLACEHOLDER_SSN: &str = "000-00-0000";

/// Build the Patient document sent on create
pub fn build_patient_resource(args: &CreateRecordArgs) -> Value {
    let mut patient = json!({
        "resourceType": "Patient",
        "identifier": [{
            "use": "usual",
            "system": SSN_SYSTEM,
            "value": PLACEHOLDER_SSN
        }],
        "active": true,
        "name": [{
            "use": "usual",
            "family": args.family_name,
            "given": [args.given_name]
        }],
        "telecom": [{
            "system": "phone",
            "value": args.telecom,
            "use": "home"
        }],
        "gender": args.gender.as_str(),
        "address": [],
        "maritalStatus": { "text": "" },
        "generalPractitioner": [],
        "extension": []
    });

    if let Some(birth_date) = &args.birth_date {
        patient["birthDate"] = Value::String(birth_date.clone());
    }

    patient
}

/// FHIR search parameters for the fields that were actually given
pub fn search_params(args: &SearchRecordArgs) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(given) = &args.given_name {
        params.push(("given", given.clone()));
    }
    if let Some(family) = &args.family_name {
        params.push(("family", family.clone()));
    }
    if let Some(birth_date) = &args.birth_date {
        params.push(("birthdate", birth_date.clone()));
    }
    if let Some(gender) = args.gender {
        params.push(("gender", gender.as_str().to_string()));
    }
    if let Some(telecom) = &args.telecom {
        params.push(("telecom", telecom.clone()));
    }
    params
}

/// Id of the first resource in a search Bundle, if any
pub fn first_entry_id(bundle: &Value) -> Option<&str> {
    bundle["entry"]
        .as_array()?
        .first()?
        .get("resource")?
        .get("id")?
        .as_str()
        .filter(|id| !id.is_empty())
}

pub async fn create_record(
    fhir: &FhirClient,
    args: &CreateRecordArgs,
) -> Result<Outcome, DispatchError> {
    let patient = build_patient_resource(args);
    let response = fhir.create("Patient", &patient).await?;
    debug!("Patient.Create response data: {}", response.body);
    Ok(response.into())
}

/// Search patients; on a 2xx with at least one match the first patient
/// becomes the session context
pub async fn search_record(
    fhir: &FhirClient,
    args: &SearchRecordArgs,
    ctx: &ResourceContext,
) -> Result<Outcome, DispatchError> {
    let params = search_params(args);
    let response = fhir.search("Patient", &params).await?;

    if response.status.is_success() {
        match first_entry_id(&response.body) {
            Some(id) => ctx.set_patient_id(id).await,
            None => info!("Patient search returned no matches"),
        }
    }

    Ok(response.into())
}
