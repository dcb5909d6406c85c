//! Remote triage service seam.
//!
//! The conversation controller only talks to this trait, so tests can script
//! the backend while production goes through [`ApiClient`].

use async_trait::async_trait;

use crate::api::types::{
    AppointmentConfirmation, AppointmentRequest, AssessmentRequest, AssessmentResult,
    DoctorAssignment, TriageFlow,
};
use crate::api::ApiClient;
use crate::error::AppError;

// ── Trait ──────────────────────────────────────────────────────────

#[async_trait]
pub trait TriageService: Send + Sync {
    /// Ordered question flow for a new conversation.
    async fn fetch_flow(&self) -> Result<TriageFlow, AppError>;

    /// Score the collected answers.
    async fn assess(&self, request: &AssessmentRequest<'_>) -> Result<AssessmentResult, AppError>;

    async fn assign_doctor(&self, assessment_id: i64) -> Result<DoctorAssignment, AppError>;

    async fn confirm_appointment(
        &self,
        request: &AppointmentRequest,
    ) -> Result<AppointmentConfirmation, AppError>;
}

// ── HTTP implementation ────────────────────────────────────────────

#[async_trait]
impl TriageService for ApiClient {
    async fn fetch_flow(&self) -> Result<TriageFlow, AppError> {
        self.triage_flow().await
    }

    async fn assess(&self, request: &AssessmentRequest<'_>) -> Result<AssessmentResult, AppError> {
        ApiClient::assess(self, request.patient_name, request.patient_email, request.answers).await
    }

    async fn assign_doctor(&self, assessment_id: i64) -> Result<DoctorAssignment, AppError> {
        ApiClient::assign_doctor(self, assessment_id).await
    }

    async fn confirm_appointment(
        &self,
        request: &AppointmentRequest,
    ) -> Result<AppointmentConfirmation, AppError> {
        ApiClient::confirm_appointment(self, request).await
    }
}
