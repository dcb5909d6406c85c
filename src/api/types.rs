use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::session::Role;
use crate::triage::AnswerMap;

// ============================================================================
// Triage flow
// ============================================================================

/// One selectable answer to a triage question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AnswerOption {
    pub label: String,
    pub value: i64,
}

/// A question in the server-supplied triage flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Question {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub bot_text: String,
    pub options: Vec<AnswerOption>,
    /// A positive answer shows a reassurance message. The flow still continues.
    #[serde(default)]
    pub safety: bool,
}

/// `GET /triage/flow`. Fetched once per conversation, read-only afterwards.
/// The server's `final_prompt` block is ignored; the follow-up choices are
/// fixed in the conversation itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageFlow {
    pub steps: Vec<Question>,
}

impl TriageFlow {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.steps.get(index)
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 == self.steps.len()
    }

    /// Reject flows whose answers could not be keyed unambiguously.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for question in &self.steps {
            if question.id.trim().is_empty() {
                return Err("question with empty id".into());
            }
            if !seen.insert(question.id.as_str()) {
                return Err(format!("duplicate question id {:?}", question.id));
            }
            if question.options.is_empty() {
                return Err(format!("question {:?} has no options", question.id));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Assessment
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentRequest<'a> {
    pub patient_name: &'a str,
    pub patient_email: &'a str,
    pub answers: &'a AnswerMap,
}

/// `POST /triage/assess` response. Identity key is `assessment_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub assessment_id: i64,
    #[serde(default)]
    pub patient_id: Option<i64>,
    #[serde(default)]
    pub summary_text: Option<String>,
    #[serde(default)]
    pub ai_insights: Option<String>,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub severity_level: Option<String>,
    #[serde(default)]
    pub overall_severity: Option<String>,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub summary: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub interpretations: Option<BTreeMap<String, serde_json::Value>>,
}

impl AssessmentResult {
    pub fn severity(&self) -> Option<&str> {
        self.severity_level
            .as_deref()
            .or(self.overall_severity.as_deref())
    }

    /// Per-category summary; older API builds only send `interpretations`.
    pub fn summary_entries(&self) -> Option<&BTreeMap<String, serde_json::Value>> {
        self.summary.as_ref().or(self.interpretations.as_ref())
    }
}

// ============================================================================
// Doctor assignment & appointments
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AssignDoctorRequest {
    pub assessment_id: i64,
}

pub const DEFAULT_DOCTOR_NAME: &str = "Dr. Smith";
pub const DEFAULT_SPECIALIZATION: &str = "General Practice";
pub const DEFAULT_HOSPITAL: &str = "CareBridge Medical Center";

/// `POST /triage/assign-doctor` response. Ids may be missing; they are only
/// required once the appointment is booked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorAssignment {
    #[serde(default)]
    pub doctor_id: Option<i64>,
    #[serde(default)]
    pub patient_id: Option<i64>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub doctor_specialization: Option<String>,
    #[serde(default)]
    pub hospital_name: Option<String>,
    #[serde(default)]
    pub appointment_time: Option<String>,
    #[serde(default)]
    pub assessment_id: Option<i64>,
}

impl DoctorAssignment {
    pub fn doctor_name(&self) -> &str {
        non_blank(self.doctor_name.as_deref()).unwrap_or(DEFAULT_DOCTOR_NAME)
    }

    pub fn specialization(&self) -> &str {
        non_blank(self.doctor_specialization.as_deref()).unwrap_or(DEFAULT_SPECIALIZATION)
    }

    pub fn hospital_name(&self) -> &str {
        non_blank(self.hospital_name.as_deref()).unwrap_or(DEFAULT_HOSPITAL)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentRequest {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub appointment_date: String,
    pub hospital_name: String,
}

impl AppointmentRequest {
    /// Missing ids become 0 and fail id validation before the request is sent.
    pub fn for_assignment(assignment: &DoctorAssignment) -> Self {
        Self {
            patient_id: assignment.patient_id.unwrap_or_default(),
            doctor_id: assignment.doctor_id.unwrap_or_default(),
            appointment_date: assignment.appointment_time.clone().unwrap_or_default(),
            hospital_name: assignment.hospital_name().to_string(),
        }
    }
}

/// `POST /triage/confirm-appointment` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentConfirmation {
    #[serde(default)]
    pub appointment_id: Option<i64>,
    #[serde(default)]
    pub appointment_date: Option<String>,
    #[serde(default)]
    pub hospital_name: Option<String>,
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Serialize)]
pub(crate) struct LoginBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// `POST /auth/login` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user_type: Role,
    pub user_id: i64,
    #[serde(default)]
    pub user_name: Option<String>,
}

/// `GET /auth/me` response.
#[derive(Debug, Clone, Deserialize)]
pub struct MeResponse {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub user_type: Role,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: Option<String>,
}

// ============================================================================
// Doctor portal
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DoctorPatient {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub last_interaction: Option<String>,
    #[serde(default)]
    pub last_mood: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriageItem {
    pub id: i64,
    pub patient_id: i64,
    pub patient_name: String,
    #[serde(default)]
    pub patient_email: Option<String>,
    pub status: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub severity_level: Option<String>,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub assessment_id: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub patient_id: i64,
    pub alert_type: String,
    pub severity: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub is_acknowledged: bool,
    #[serde(default)]
    pub is_resolved: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub note_type: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedNote {
    pub note_id: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatientReport {
    pub patient_id: i64,
    pub patient_name: String,
    pub email: String,
    #[serde(default)]
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub message: Option<String>,
}

// ============================================================================
// Patient portal
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub speaker: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub entry_type: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ThoughtAnalysis {
    #[serde(default)]
    pub positive: u32,
    #[serde(default)]
    pub negative: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatientSummary {
    #[serde(default)]
    pub total_entries: u32,
    #[serde(default)]
    pub average_mood: f64,
    #[serde(default)]
    pub positive_thoughts: u32,
    #[serde(default)]
    pub concerns_flagged: u32,
    #[serde(default)]
    pub thought_analysis: ThoughtAnalysis,
}

// ============================================================================
// Admin portal
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AdminStats {
    #[serde(default)]
    pub total_doctors: u32,
    #[serde(default)]
    pub total_patients: u32,
    #[serde(default)]
    pub total_interactions: u32,
    #[serde(default)]
    pub active_alerts: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    #[serde(default)]
    pub patient_id: Option<i64>,
    pub speaker: String,
    #[serde(rename = "type", default)]
    pub entry_type: Option<String>,
    pub timestamp: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdminDashboard {
    #[serde(default)]
    pub stats: AdminStats,
    #[serde(default)]
    pub recent_activity: Vec<ActivityEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdminUser {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: Role,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub doctor_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

// ============================================================================
// List envelopes (internal)
// ============================================================================

#[derive(Deserialize)]
pub(crate) struct PatientsEnvelope {
    pub patients: Vec<DoctorPatient>,
}

#[derive(Deserialize)]
pub(crate) struct TriageEnvelope {
    pub triage_items: Vec<TriageItem>,
}

#[derive(Deserialize)]
pub(crate) struct AlertsEnvelope {
    pub alerts: Vec<Alert>,
}

#[derive(Deserialize)]
pub(crate) struct NotesEnvelope {
    pub notes: Vec<Note>,
}

#[derive(Deserialize)]
pub(crate) struct ReportsEnvelope {
    pub reports: Vec<PatientReport>,
}

#[derive(Deserialize)]
pub(crate) struct HistoryEnvelope {
    pub history: Vec<HistoryEntry>,
}

#[derive(Deserialize)]
pub(crate) struct UsersEnvelope {
    pub users: Vec<AdminUser>,
}
