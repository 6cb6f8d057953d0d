//! In-process appointment schedule.
//!
//! The clinic has no scheduling API yet, so the open slots are a fixed table
//! and bookings produce a confirmation record without persisting anything.
//! Neither operation touches the network.

use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::envelope::Outcome;
use crate::error::DispatchError;
use crate::operations::{BookingArgs, ScheduleArgs};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Slot {
    pub day: &'static str,
    pub time: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Doctor {
    pub id: &'static str,
    pub name: &'static str,
    pub specialty: &'static str,
    pub slots: &'static [Slot],
}

pub const DOCTORS: &[Doctor] = &[
    Doctor {
        id: "1",
        name: "Dr. Sarah Chen",
        specialty: "Family Medicine",
        slots: &[
            Slot { day: "Monday", time: "09:00" },
            Slot { day: "Monday", time: "10:30" },
            Slot { day: "Wednesday", time: "14:00" },
            Slot { day: "Friday", time: "11:00" },
        ],
    },
    Doctor {
        id: "2",
        name: "Dr. Michael Rodriguez",
        specialty: "Internal Medicine",
        slots: &[
            Slot { day: "Tuesday", time: "08:30" },
            Slot { day: "Tuesday", time: "13:00" },
            Slot { day: "Thursday", time: "15:30" },
        ],
    },
    Doctor {
        id: "3",
        name: "Dr. Emily Johnson",
        specialty: "Pediatrics",
        slots: &[
            Slot { day: "Monday", time: "13:00" },
            Slot { day: "Thursday", time: "09:00" },
            Slot { day: "Thursday", time: "10:00" },
        ],
    },
    Doctor {
        id: "4",
        name: "Dr. James Okafor",
        specialty: "Cardiology",
        slots: &[
            Slot { day: "Wednesday", time: "09:30" },
            Slot { day: "Friday", time: "14:30" },
        ],
    },
];

/// Doctors whose name contains `filter`, ignoring case. No filter lists all.
pub fn matching_doctors(filter: Option<&str>) -> Vec<&'static Doctor> {
    let needle = filter.map(str::to_lowercase);
    DOCTORS
        .iter()
        .filter(|doctor| match &needle {
            Some(needle) => doctor.name.to_lowercase().contains(needle.as_str()),
            None => true,
        })
        .collect()
}

pub fn get_schedule(args: &ScheduleArgs) -> Outcome {
    let doctors = matching_doctors(args.doctor_name.as_deref());
    info!("Schedule lookup matched {} doctor(s)", doctors.len());
    Outcome::ok(json!(doctors))
}

/// Deterministic confirmation id for a slot, e.g. `APT-2-TUE-0830`
pub fn confirmation_id(doctor_id: &str, slot: &Slot) -> String {
    let day: String = slot.day.chars().take(3).collect::<String>().to_uppercase();
    let time: String = slot.time.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("APT-{}-{}-{}", doctor_id, day, time)
}

pub fn book_appointment(args: &BookingArgs) -> Result<Outcome, DispatchError> {
    let doctor = DOCTORS
        .iter()
        .find(|d| d.id == args.doctor_id)
        .ok_or_else(|| DispatchError::Validation(format!("Unknown doctor id: {}", args.doctor_id)))?;

    let slot = doctor
        .slots
        .iter()
        .find(|s| s.day.eq_ignore_ascii_case(&args.day) && s.time == args.time)
        .ok_or_else(|| {
            DispatchError::Validation(format!(
                "{} has no open slot on {} at {}",
                doctor.name, args.day, args.time
            ))
        })?;

    let confirmation = confirmation_id(doctor.id, slot);
    info!("Booked {} with {}", confirmation, doctor.name);

    Ok(Outcome::ok(json!({
        "confirmationId": confirmation,
        "status": "confirmed",
        "doctorId": doctor.id,
        "doctorName": doctor.name,
        "specialty": doctor.specialty,
        "day": slot.day,
        "time": slot.time,
        "patientName": args.patient_name
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn booking(doctor_id: &str, day: &str, time: &str) -> BookingArgs {
        BookingArgs {
            doctor_id: doctor_id.to_string(),
            day: day.to_string(),
            time: time.to_string(),
            patient_name: "Camila Lopez".to_string(),
        }
    }

    #[test]
    fn test_schedule_unfiltered_lists_all() {
        let outcome = get_schedule(&ScheduleArgs::default());
        assert!(outcome.success);
        assert_eq!(outcome.data.as_array().unwrap().len(), DOCTORS.len());
    }

    #[test]
    fn test_schedule_filter_is_case_insensitive_substring() {
        let outcome = get_schedule(&ScheduleArgs {
            doctor_name: Some("CHEN".to_string()),
        });
        let doctors = outcome.data.as_array().unwrap();
        assert_eq!(doctors.len(), 1);
        assert_eq!(doctors[0]["name"], "Dr. Sarah Chen");
        assert_eq!(doctors[0]["slots"][0]["day"], "Monday");
    }

    #[test]
    fn test_schedule_no_match_is_empty_success() {
        let outcome = get_schedule(&ScheduleArgs {
            doctor_name: Some("house".to_string()),
        });
        assert!(outcome.success);
        assert_eq!(outcome.data, Value::Array(vec![]));
    }

    #[test]
    fn test_booking_is_deterministic() {
        let first = book_appointment(&booking("2", "tuesday", "08:30")).unwrap();
        let second = book_appointment(&booking("2", "Tuesday", "08:30")).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.data["confirmationId"], "APT-2-TUE-0830");
        assert_eq!(first.data["doctorName"], "Dr. Michael Rodriguez");
        assert_eq!(first.data["day"], "Tuesday");
        assert_eq!(first.data["patientName"], "Camila Lopez");
    }

    #[test]
    fn test_booking_unknown_doctor() {
        let err = book_appointment(&booking("99", "Monday", "09:00")).unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[test]
    fn test_booking_unlisted_slot() {
        let err = book_appointment(&booking("1", "Sunday", "09:00")).unwrap_err();
        assert!(err.to_string().contains("no open slot"));
    }
}
