use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime};

use crate::api::types::{AppointmentConfirmation, AssessmentResult, DoctorAssignment};
use crate::error::AppError;

/// Where confirmed-appointment tickets end up.
pub trait TicketSink: Send + Sync {
    /// Store `contents` under `file_name`, returning where it went.
    fn write(&self, file_name: &str, contents: &str) -> Result<PathBuf, AppError>;
}

/// Writes tickets as plain files into one directory.
pub struct DirectoryTicketSink {
    dir: PathBuf,
}

impl DirectoryTicketSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TicketSink for DirectoryTicketSink {
    fn write(&self, file_name: &str, contents: &str) -> Result<PathBuf, AppError> {
        if file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return Err(AppError::Validation(format!("invalid ticket file name {file_name:?}")));
        }
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, contents)?;
        tracing::info!(path = %path.display(), "Wrote appointment ticket");
        Ok(path)
    }
}

pub fn file_name(epoch_ms: i64) -> String {
    format!("appointment-ticket-{epoch_ms}.txt")
}

/// Everything printed on a ticket.
pub struct Ticket<'a> {
    pub patient_name: &'a str,
    pub patient_email: &'a str,
    pub assignment: &'a DoctorAssignment,
    pub confirmation: &'a AppointmentConfirmation,
    pub assessment: Option<&'a AssessmentResult>,
}

/// Appointment times arrive as naive ISO strings, sometimes with an offset.
pub fn parse_appointment_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.naive_local())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").ok())
}

/// `10/17/2026, 9:30:00 AM`, or a placeholder when the time is missing.
pub fn format_appointment_time(raw: Option<&str>) -> String {
    match raw.and_then(parse_appointment_time) {
        Some(t) => t.format("%m/%d/%Y, %-I:%M:%S %p").to_string(),
        None => "To be scheduled".to_string(),
    }
}

fn summary_lines(assessment: Option<&AssessmentResult>) -> String {
    let Some(entries) = assessment.and_then(|a| a.summary_entries()) else {
        return "N/A".to_string();
    };
    if entries.is_empty() {
        return "N/A".to_string();
    }
    entries
        .iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => format!("{key}: {s}"),
            other => format!("{key}: {other}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render(ticket: &Ticket<'_>) -> String {
    let assignment = ticket.assignment;
    let when = assignment
        .appointment_time
        .as_deref()
        .or(ticket.confirmation.appointment_date.as_deref())
        .and_then(parse_appointment_time);
    let (date, time) = match when {
        Some(t) => (
            t.format("%m/%d/%Y").to_string(),
            t.format("%-I:%M:%S %p").to_string(),
        ),
        None => ("To be scheduled".to_string(), "To be scheduled".to_string()),
    };
    let appointment_id = ticket
        .confirmation
        .appointment_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "CareBridge Medical Center
Appointment E-Ticket
=====================================

Patient Information:
Name: {patient_name}
Email: {patient_email}

Doctor Information:
Name: {doctor}
Specialization: {specialization}

Appointment Details:
Date: {date}
Time: {time}
Hospital: {hospital}

Assessment Summary:
{summary}

Important Notes:
- Please arrive 15 minutes early
- Bring a valid ID and insurance card
- Contact us if you need to reschedule

Appointment ID: {appointment_id}

Thank you for choosing CareBridge!
",
        patient_name = ticket.patient_name,
        patient_email = ticket.patient_email,
        doctor = assignment.doctor_name(),
        specialization = assignment.specialization(),
        hospital = assignment.hospital_name(),
        summary = summary_lines(ticket.assessment),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assignment() -> DoctorAssignment {
        serde_json::from_value(json!({
            "doctor_id": 2,
            "patient_id": 9,
            "doctor_name": "Dr. Okafor",
            "doctor_specialization": "Psychiatry",
            "appointment_time": "2026-10-19T14:30:00"
        }))
        .unwrap()
    }

    #[test]
    fn test_render_fills_every_section() {
        let assignment = assignment();
        let confirmation = AppointmentConfirmation {
            appointment_id: Some(55),
            appointment_date: None,
            hospital_name: None,
        };
        let assessment: AssessmentResult = serde_json::from_value(json!({
            "assessment_id": 4,
            "interpretations": {"Anxiety": "Moderate", "Depression": "Mild"}
        }))
        .unwrap();

        let text = render(&Ticket {
            patient_name: "Ana",
            patient_email: "ana@example.com",
            assignment: &assignment,
            confirmation: &confirmation,
            assessment: Some(&assessment),
        });

        assert!(text.starts_with("CareBridge Medical Center\nAppointment E-Ticket\n"));
        assert!(text.contains("Name: Dr. Okafor\nSpecialization: Psychiatry\n"));
        assert!(text.contains("Date: 10/19/2026\nTime: 2:30:00 PM\nHospital: CareBridge Medical Center\n"));
        assert!(text.contains("Assessment Summary:\nAnxiety: Moderate\nDepression: Mild\n"));
        assert!(text.contains("Appointment ID: 55\n"));
    }

    #[test]
    fn test_render_without_assessment_or_id() {
        let assignment = assignment();
        let confirmation = AppointmentConfirmation {
            appointment_id: None,
            appointment_date: None,
            hospital_name: None,
        };
        let text = render(&Ticket {
            patient_name: "Ana",
            patient_email: "ana@example.com",
            assignment: &assignment,
            confirmation: &confirmation,
            assessment: None,
        });
        assert!(text.contains("Assessment Summary:\nN/A\n"));
        assert!(text.contains("Appointment ID: N/A\n"));
    }

    #[test]
    fn test_format_appointment_time() {
        assert_eq!(
            format_appointment_time(Some("2026-10-19T09:05:00")),
            "10/19/2026, 9:05:00 AM"
        );
        assert_eq!(format_appointment_time(Some("soon")), "To be scheduled");
        assert_eq!(format_appointment_time(None), "To be scheduled");
    }

    #[test]
    fn test_directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryTicketSink::new(dir.path().join("tickets"));
        let path = sink.write(&file_name(1_760_000_000_000), "ticket").unwrap();
        assert_eq!(path.file_name().unwrap(), "appointment-ticket-1760000000000.txt");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "ticket");
    }

    #[test]
    fn test_directory_sink_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryTicketSink::new(dir.path());
        assert!(sink.write("../escape.txt", "x").is_err());
    }
}
