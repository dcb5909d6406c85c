use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::session::TokenStore;
use crate::triage::AnswerMap;

use super::types::*;

/// Every endpoint lives under this prefix.
pub const API_PREFIX: &str = "/api/v1";

// ============================================================================
// Helpers
// ============================================================================

/// A request that never produced a response.
fn transport_err(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Transport(format!("request timed out: {e}"))
    } else {
        AppError::Transport(e.to_string())
    }
}

fn decode_err(e: impl std::fmt::Display) -> AppError {
    AppError::InvalidResponse(e.to_string())
}

// ============================================================================
// ApiClient
// ============================================================================

/// HTTP client for the CareBridge REST API.
///
/// Attaches the bearer token when one is held. A 401 on a request that carried
/// a token clears it here and in the backing [`TokenStore`].
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
    store: Option<Arc<dyn TokenStore>>,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: format!("{}{}", config.api_base_url, API_PREFIX),
            token: RwLock::new(None),
            store: None,
        })
    }

    /// Persist token changes through `store`, seeding the client from it.
    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Result<Self, AppError> {
        let saved = store.load()?;
        self.set_token_in_memory(saved);
        self.store = Some(store);
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // --------------------------------------------------------------------
    // Token handling
    // --------------------------------------------------------------------

    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    pub fn has_token(&self) -> bool {
        self.token().is_some()
    }

    fn set_token_in_memory(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }

    /// Replace the held token and persist it.
    pub fn set_token(&self, token: &str) -> Result<(), AppError> {
        self.set_token_in_memory(Some(token.to_string()));
        if let Some(store) = &self.store {
            store.save(token)?;
        }
        Ok(())
    }

    /// Forget the held token, in memory and in the store.
    pub fn clear_token(&self) -> Result<(), AppError> {
        self.set_token_in_memory(None);
        if let Some(store) = &self.store {
            store.clear()?;
        }
        Ok(())
    }

    // --------------------------------------------------------------------
    // Private HTTP helpers
    // --------------------------------------------------------------------

    /// Build a request, attaching the bearer token if one is held.
    fn request(&self, method: Method, path: &str) -> (reqwest::RequestBuilder, bool) {
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        match self.token() {
            Some(token) => (req.bearer_auth(token), true),
            None => (req, false),
        }
    }

    /// Send, map the status, hand back the successful response.
    async fn send(
        &self,
        (req, authed): (reqwest::RequestBuilder, bool),
    ) -> Result<reqwest::Response, AppError> {
        let resp = req.send().await.map_err(transport_err)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        if status == StatusCode::UNAUTHORIZED && authed {
            tracing::warn!("API rejected the session token, clearing it");
            if let Err(e) = self.clear_token() {
                tracing::error!(error = %e, "Failed to clear rejected token");
            }
        }

        let body = resp.text().await.unwrap_or_default();
        Err(AppError::Http {
            status: status.as_u16(),
            body: error_detail(&body),
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: (reqwest::RequestBuilder, bool),
    ) -> Result<T, AppError> {
        let resp = self.send(req).await?;
        let bytes = resp.bytes().await.map_err(transport_err)?;
        serde_json::from_slice(&bytes).map_err(decode_err)
    }

    async fn send_ok(&self, req: (reqwest::RequestBuilder, bool)) -> Result<(), AppError> {
        self.send(req).await?;
        Ok(())
    }

    fn with_json<B: serde::Serialize + ?Sized>(
        (req, authed): (reqwest::RequestBuilder, bool),
        body: &B,
    ) -> (reqwest::RequestBuilder, bool) {
        (req.json(body), authed)
    }

    fn with_query<Q: serde::Serialize + ?Sized>(
        (req, authed): (reqwest::RequestBuilder, bool),
        query: &Q,
    ) -> (reqwest::RequestBuilder, bool) {
        (req.query(query), authed)
    }

    // --------------------------------------------------------------------
    // Health & auth
    // --------------------------------------------------------------------

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthResponse, AppError> {
        self.send_json(self.request(Method::GET, "/health")).await
    }

    /// `POST /auth/login`. Does not store the token; see [`crate::session::Session`].
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, AppError> {
        let body = LoginBody { email, password };
        let resp: TokenResponse = self
            .send_json(Self::with_json(self.request(Method::POST, "/auth/login"), &body))
            .await?;
        if resp.access_token.trim().is_empty() {
            return Err(AppError::InvalidResponse("login returned an empty token".into()));
        }
        Ok(resp)
    }

    /// `GET /auth/me`
    pub async fn me(&self) -> Result<MeResponse, AppError> {
        self.send_json(self.request(Method::GET, "/auth/me")).await
    }

    // --------------------------------------------------------------------
    // Triage
    // --------------------------------------------------------------------

    /// `GET /triage/flow`
    pub async fn triage_flow(&self) -> Result<TriageFlow, AppError> {
        let flow: TriageFlow = self.send_json(self.request(Method::GET, "/triage/flow")).await?;
        flow.validate().map_err(AppError::InvalidResponse)?;
        Ok(flow)
    }

    /// `POST /triage/assess`
    pub async fn assess(
        &self,
        patient_name: &str,
        patient_email: &str,
        answers: &AnswerMap,
    ) -> Result<AssessmentResult, AppError> {
        let body = AssessmentRequest {
            patient_name,
            patient_email,
            answers,
        };
        self.send_json(Self::with_json(self.request(Method::POST, "/triage/assess"), &body))
            .await
    }

    /// `POST /triage/assign-doctor`
    pub async fn assign_doctor(&self, assessment_id: i64) -> Result<DoctorAssignment, AppError> {
        let body = AssignDoctorRequest { assessment_id };
        self.send_json(Self::with_json(
            self.request(Method::POST, "/triage/assign-doctor"),
            &body,
        ))
        .await
    }

    /// `POST /triage/confirm-appointment`
    pub async fn confirm_appointment(
        &self,
        request: &AppointmentRequest,
    ) -> Result<AppointmentConfirmation, AppError> {
        self.send_json(Self::with_json(
            self.request(Method::POST, "/triage/confirm-appointment"),
            request,
        ))
        .await
    }

    // --------------------------------------------------------------------
    // Doctor portal
    // --------------------------------------------------------------------

    /// `GET /doctor/patients`
    pub async fn doctor_patients(&self) -> Result<Vec<DoctorPatient>, AppError> {
        let env: PatientsEnvelope = self.send_json(self.request(Method::GET, "/doctor/patients")).await?;
        Ok(env.patients)
    }

    /// `GET /doctor/triage`
    pub async fn doctor_triage(&self) -> Result<Vec<TriageItem>, AppError> {
        let env: TriageEnvelope = self.send_json(self.request(Method::GET, "/doctor/triage")).await?;
        Ok(env.triage_items)
    }

    /// `GET /doctor/alerts`
    pub async fn doctor_alerts(&self) -> Result<Vec<Alert>, AppError> {
        let env: AlertsEnvelope = self.send_json(self.request(Method::GET, "/doctor/alerts")).await?;
        Ok(env.alerts)
    }

    /// `POST /doctor/alert/{id}/acknowledge`
    pub async fn acknowledge_alert(&self, alert_id: i64) -> Result<(), AppError> {
        self.send_ok(self.request(Method::POST, &format!("/doctor/alert/{alert_id}/acknowledge")))
            .await
    }

    /// `POST /doctor/alert/{id}/resolve`
    pub async fn resolve_alert(&self, alert_id: i64) -> Result<(), AppError> {
        self.send_ok(self.request(Method::POST, &format!("/doctor/alert/{alert_id}/resolve")))
            .await
    }

    /// `GET /doctor/patient/{id}/notes`
    pub async fn patient_notes(&self, patient_id: i64) -> Result<Vec<Note>, AppError> {
        let env: NotesEnvelope = self
            .send_json(self.request(Method::GET, &format!("/doctor/patient/{patient_id}/notes")))
            .await?;
        Ok(env.notes)
    }

    /// `POST /doctor/patient/{id}/note`. The API takes the fields as query parameters.
    pub async fn create_note(
        &self,
        patient_id: i64,
        title: &str,
        content: &str,
        note_type: &str,
    ) -> Result<i64, AppError> {
        let query = [("title", title), ("content", content), ("note_type", note_type)];
        let created: CreatedNote = self
            .send_json(Self::with_query(
                self.request(Method::POST, &format!("/doctor/patient/{patient_id}/note")),
                &query,
            ))
            .await?;
        Ok(created.note_id)
    }

    /// `GET /doctor/reports`
    pub async fn doctor_reports(&self) -> Result<Vec<PatientReport>, AppError> {
        let env: ReportsEnvelope = self.send_json(self.request(Method::GET, "/doctor/reports")).await?;
        Ok(env.reports)
    }

    // --------------------------------------------------------------------
    // Patient portal
    // --------------------------------------------------------------------

    /// `POST /patient/journal`
    pub async fn create_journal_entry(&self, mood: u8, thoughts: &str) -> Result<(), AppError> {
        let mood = mood.to_string();
        let query = [("mood", mood.as_str()), ("thoughts", thoughts)];
        self.send_ok(Self::with_query(self.request(Method::POST, "/patient/journal"), &query))
            .await
    }

    /// `GET /patient/history`
    pub async fn patient_history(&self) -> Result<Vec<HistoryEntry>, AppError> {
        let env: HistoryEnvelope = self.send_json(self.request(Method::GET, "/patient/history")).await?;
        Ok(env.history)
    }

    /// `GET /patient/summary`
    pub async fn patient_summary(&self) -> Result<PatientSummary, AppError> {
        self.send_json(self.request(Method::GET, "/patient/summary")).await
    }

    // --------------------------------------------------------------------
    // Admin portal
    // --------------------------------------------------------------------

    /// `GET /admin/dashboard`
    pub async fn admin_dashboard(&self) -> Result<AdminDashboard, AppError> {
        self.send_json(self.request(Method::GET, "/admin/dashboard")).await
    }

    /// `GET /admin/users`
    pub async fn admin_users(&self) -> Result<Vec<AdminUser>, AppError> {
        let env: UsersEnvelope = self.send_json(self.request(Method::GET, "/admin/users")).await?;
        Ok(env.users)
    }
}

/// Pull FastAPI's `detail` out of an error body; fall back to the raw text.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryTokenStore;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn serve(router: Router) -> AppConfig {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        AppConfig {
            api_base_url: format!("http://{addr}"),
            http_timeout_secs: 5,
            ..AppConfig::default()
        }
    }

    fn bearer(headers: &HeaderMap) -> Option<String> {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)
    }

    #[tokio::test]
    async fn test_flow_and_assess_round_trip() {
        let router = Router::new()
            .route(
                "/api/v1/triage/flow",
                get(|| async {
                    Json(json!({"steps": [
                        {"id": "mood", "bot_text": "How is your mood?", "options": [{"label": "Fine", "value": 0}]}
                    ]}))
                }),
            )
            .route(
                "/api/v1/triage/assess",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["patient_name"], "Ana");
                    assert_eq!(body["answers"]["mood"], 0);
                    Json(json!({"assessment_id": 7, "summary_text": "ok", "ai_insights": "rest"}))
                }),
            );
        let client = ApiClient::new(&serve(router).await).unwrap();

        let flow = client.triage_flow().await.unwrap();
        assert_eq!(flow.steps[0].id, "mood");

        let mut answers = AnswerMap::default();
        answers.record("mood", 0);
        let result = client.assess("Ana", "ana@example.com", &answers).await.unwrap();
        assert_eq!(result.assessment_id, 7);
    }

    #[tokio::test]
    async fn test_non_success_maps_to_http_error_with_detail() {
        let router = Router::new().route(
            "/api/v1/triage/assess",
            post(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, Json(json!({"detail": "scoring failed"}))) }),
        );
        let client = ApiClient::new(&serve(router).await).unwrap();
        let err = client
            .assess("Ana", "ana@example.com", &AnswerMap::default())
            .await
            .unwrap_err();
        match err {
            AppError::Http { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "scoring failed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_assessment_id_is_invalid_response() {
        let router = Router::new().route(
            "/api/v1/triage/assess",
            post(|| async { Json(json!({"summary_text": "no id"})) }),
        );
        let client = ApiClient::new(&serve(router).await).unwrap();
        let err = client
            .assess("Ana", "ana@example.com", &AnswerMap::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let config = AppConfig {
            api_base_url: format!("http://{addr}"),
            http_timeout_secs: 2,
            ..AppConfig::default()
        };
        let client = ApiClient::new(&config).unwrap();
        assert!(matches!(client.triage_flow().await, Err(AppError::Transport(_))));
    }

    #[tokio::test]
    async fn test_bearer_token_attached_and_cleared_on_401() {
        let router = Router::new()
            .route(
                "/api/v1/doctor/alerts",
                get(|headers: HeaderMap| async move {
                    assert_eq!(bearer(&headers).as_deref(), Some("tok-1"));
                    Json(json!({"alerts": [{
                        "id": 1, "patient_id": 4, "alert_type": "crisis", "severity": "high",
                        "title": "Crisis", "message": "Check in", "created_at": "2026-10-01T09:00:00"
                    }]}))
                }),
            )
            .route(
                "/api/v1/doctor/patients",
                get(|| async { (AxumStatus::UNAUTHORIZED, Json(json!({"detail": "expired"}))) }),
            );
        let store = Arc::new(MemoryTokenStore::default());
        store.save("tok-1").unwrap();
        let client = ApiClient::new(&serve(router).await)
            .unwrap()
            .with_token_store(store.clone())
            .unwrap();

        let alerts = client.doctor_alerts().await.unwrap();
        assert_eq!(alerts[0].title, "Crisis");

        let err = client.doctor_patients().await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(!client.has_token());
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_note_fields_sent_as_query() {
        let router = Router::new().route(
            "/api/v1/doctor/patient/{id}/note",
            post(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q["title"], "Intake");
                assert_eq!(q["note_type"], "session");
                Json(json!({"message": "created", "note_id": 31}))
            }),
        );
        let client = ApiClient::new(&serve(router).await).unwrap();
        let id = client.create_note(5, "Intake", "Slept badly", "session").await.unwrap();
        assert_eq!(id, 31);
    }

    #[test]
    fn test_error_detail_falls_back_to_raw_body() {
        assert_eq!(error_detail("{\"detail\": \"nope\"}"), "nope");
        assert_eq!(error_detail(" Bad Gateway "), "Bad Gateway");
    }
}
