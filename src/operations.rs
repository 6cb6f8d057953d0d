//! The dispatch surface: tool-call wire types, the closed set of operations
//! and their typed arguments, and the function declarations the agent is
//! configured with.
//!
//! Operation names are the protocol between the agent and this crate. They
//! must stay stable or the agent's calls stop routing.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::DispatchError;

// ============================================================================
// Wire types
// ============================================================================

/// One function call emitted by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    /// Correlation id, echoed on the response
    pub id: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, id: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            args,
        }
    }
}

/// Inbound batch of function calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallBatch {
    pub function_calls: Vec<ToolCallRequest>,
}

impl From<Vec<ToolCallRequest>> for ToolCallBatch {
    fn from(function_calls: Vec<ToolCallRequest>) -> Self {
        Self { function_calls }
    }
}

// ============================================================================
// Operation registry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    CreateRecord,
    SearchRecord,
    SearchSubResource(SubResource),
    ReadMedication,
    GetSchedule,
    BookAppointment,
}

impl OperationKind {
    /// Registry order
    pub const ALL: [OperationKind; 11] = [
        OperationKind::CreateRecord,
        OperationKind::SearchRecord,
        OperationKind::SearchSubResource(SubResource::DiagnosticReport),
        OperationKind::SearchSubResource(SubResource::Goal),
        OperationKind::SearchSubResource(SubResource::MedicationRequest),
        OperationKind::ReadMedication,
        OperationKind::SearchSubResource(SubResource::Observation),
        OperationKind::SearchSubResource(SubResource::Procedure),
        OperationKind::SearchSubResource(SubResource::MedicationStatement),
        OperationKind::GetSchedule,
        OperationKind::BookAppointment,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OperationKind::CreateRecord => "create_record",
            OperationKind::SearchRecord => "search_record",
            OperationKind::SearchSubResource(resource) => resource.operation_name(),
            OperationKind::ReadMedication => "read_medication",
            OperationKind::GetSchedule => "get_schedule",
            OperationKind::BookAppointment => "book_appointment",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Operations that may overwrite the session's patient context
    pub fn writes_context(self) -> bool {
        matches!(self, OperationKind::SearchRecord)
    }
}

/// Patient-scoped resources searched with `?patient=<id>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubResource {
    DiagnosticReport,
    Goal,
    MedicationRequest,
    Observation,
    Procedure,
    MedicationStatement,
}

impl SubResource {
    pub fn resource_type(self) -> &'static str {
        match self {
            SubResource::DiagnosticReport => "DiagnosticReport",
            SubResource::Goal => "Goal",
            SubResource::MedicationRequest => "MedicationRequest",
            SubResource::Observation => "Observation",
            SubResource::Procedure => "Procedure",
            SubResource::MedicationStatement => "MedicationStatement",
        }
    }

    pub fn operation_name(self) -> &'static str {
        match self {
            SubResource::DiagnosticReport => "search_diagnostic_report",
            SubResource::Goal => "search_goal",
            SubResource::MedicationRequest => "search_medication_request",
            SubResource::Observation => "search_observation",
            SubResource::Procedure => "search_procedure",
            SubResource::MedicationStatement => "search_medication_statement",
        }
    }

    /// Filters always added to the search. Observation searches require a
    /// category on Epic.
    pub fn fixed_filters(self) -> &'static [(&'static str, &'static str)] {
        match self {
            SubResource::Observation => &[("category", "vital-signs")],
            _ => &[],
        }
    }

    fn description(self) -> &'static str {
        match self {
            SubResource::DiagnosticReport => "Lists the patient's diagnostic reports",
            SubResource::Goal => "Lists the patient's care goals",
            SubResource::MedicationRequest => "Lists medication orders for the patient",
            SubResource::Observation => "Lists the patient's vital-sign observations",
            SubResource::Procedure => "Lists procedures performed on the patient",
            SubResource::MedicationStatement => "Lists medications the patient reports taking",
        }
    }
}

// ============================================================================
// Typed arguments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    Unknown,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordArgs {
    pub given_name: String,
    pub family_name: String,
    pub telecom: String,
    pub gender: Gender,
    #[serde(default)]
    pub birth_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRecordArgs {
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub telecom: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubResourceArgs {
    #[serde(default)]
    pub patient_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadMedicationArgs {
    pub medication_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleArgs {
    #[serde(default)]
    pub doctor_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingArgs {
    pub doctor_id: String,
    pub day: String,
    pub time: String,
    pub patient_name: String,
}

/// A decoded tool call, ready to execute
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateRecord(CreateRecordArgs),
    SearchRecord(SearchRecordArgs),
    SearchSubResource {
        resource: SubResource,
        args: SubResourceArgs,
    },
    ReadMedication(ReadMedicationArgs),
    GetSchedule(ScheduleArgs),
    BookAppointment(BookingArgs),
}

impl Operation {
    /// Decode raw call arguments into the typed record for `kind`
    pub fn decode(kind: OperationKind, args: &Value) -> Result<Self, DispatchError> {
        let args = normalize_args(args);
        let invalid = |e: serde_json::Error| {
            DispatchError::Validation(format!("Invalid arguments for {}: {}", kind.name(), e))
        };

        let op = match kind {
            OperationKind::CreateRecord => {
                Operation::CreateRecord(serde_json::from_value(args).map_err(invalid)?)
            }
            OperationKind::SearchRecord => {
                Operation::SearchRecord(serde_json::from_value(args).map_err(invalid)?)
            }
            OperationKind::SearchSubResource(resource) => Operation::SearchSubResource {
                resource,
                args: serde_json::from_value(args).map_err(invalid)?,
            },
            OperationKind::ReadMedication => {
                Operation::ReadMedication(serde_json::from_value(args).map_err(invalid)?)
            }
            OperationKind::GetSchedule => {
                Operation::GetSchedule(serde_json::from_value(args).map_err(invalid)?)
            }
            OperationKind::BookAppointment => {
                Operation::BookAppointment(serde_json::from_value(args).map_err(invalid)?)
            }
        };
        Ok(op)
    }
}

/// Agents send scalars loosely: numbers for ids, `null` for "not given".
/// Coerce numbers and booleans to strings and drop nulls and empty strings
/// so optional fields decode as absent.
fn normalize_args(args: &Value) -> Value {
    let mut out = Map::new();
    if let Value::Object(map) = args {
        for (key, value) in map {
            let value = match value {
                Value::Null => continue,
                Value::String(s) if s.trim().is_empty() => continue,
                Value::String(s) => Value::String(s.trim().to_string()),
                Value::Number(n) => Value::String(n.to_string()),
                Value::Bool(b) => Value::String(b.to_string()),
                other => other.clone(),
            };
            out.insert(key.clone(), value);
        }
    }
    Value::Object(out)
}

// ============================================================================
// Function declarations
// ============================================================================

/// A function declaration as handed to the agent's tool configuration
#[derive(Debug, Clone, Serialize)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

fn patient_id_schema(description: &'static str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "patientId": {
                "type": "string",
                "description": format!(
                    "{} Optional; defaults to the patient found by the last search_record call.",
                    description
                )
            }
        },
        "required": []
    })
}

impl OperationKind {
    pub fn declaration(self) -> ToolDeclaration {
        let gender = json!({
            "type": "string",
            "description": "Patient's gender (male, female, other, unknown)",
            "enum": ["male", "female", "other", "unknown"]
        });

        let (description, parameters) = match self {
            OperationKind::CreateRecord => (
                "Creates a patient record in the EHR",
                json!({
                    "type": "object",
                    "properties": {
                        "givenName": {"type": "string", "description": "Patient's given (first) name"},
                        "familyName": {"type": "string", "description": "Patient's family (last) name"},
                        "telecom": {"type": "string", "description": "Patient's telecom info (e.g. phone number)"},
                        "gender": gender,
                        "birthDate": {"type": "string", "description": "Patient's birth date (YYYY-MM-DD) if needed"}
                    },
                    "required": ["givenName", "familyName", "telecom", "gender"]
                }),
            ),
            OperationKind::SearchRecord => (
                "Searches for patients in the EHR based on demographics",
                json!({
                    "type": "object",
                    "properties": {
                        "givenName": {"type": "string", "description": "Patient's given (first) name"},
                        "familyName": {"type": "string", "description": "Patient's family (last) name"},
                        "birthDate": {"type": "string", "description": "YYYY-MM-DD format birth date"},
                        "gender": gender,
                        "telecom": {"type": "string", "description": "Patient's phone number to match on"}
                    },
                    "required": []
                }),
            ),
            OperationKind::SearchSubResource(resource) => (
                resource.description(),
                patient_id_schema("FHIR id of the patient."),
            ),
            OperationKind::ReadMedication => (
                "Reads a single Medication resource by id",
                json!({
                    "type": "object",
                    "properties": {
                        "medicationId": {"type": "string", "description": "FHIR id of the Medication (not a patient id)"}
                    },
                    "required": ["medicationId"]
                }),
            ),
            OperationKind::GetSchedule => (
                "Lists the clinic's doctors and their open appointment slots",
                json!({
                    "type": "object",
                    "properties": {
                        "doctorName": {"type": "string", "description": "Optional part of a doctor's name to filter by"}
                    },
                    "required": []
                }),
            ),
            OperationKind::BookAppointment => (
                "Books an open appointment slot for a patient",
                json!({
                    "type": "object",
                    "properties": {
                        "doctorId": {"type": "string", "description": "Doctor id from get_schedule"},
                        "day": {"type": "string", "description": "Day of the slot, as listed by get_schedule"},
                        "time": {"type": "string", "description": "Time of the slot, as listed by get_schedule"},
                        "patientName": {"type": "string", "description": "Full name of the patient"}
                    },
                    "required": ["doctorId", "day", "time", "patientName"]
                }),
            ),
        };

        ToolDeclaration {
            name: self.name(),
            description,
            parameters,
        }
    }
}

/// Declarations for every registered operation, in registry order
pub fn declarations() -> Vec<ToolDeclaration> {
    OperationKind::ALL.into_iter().map(OperationKind::declaration).collect()
}
