use serde::{Deserialize, Serialize};

/// A clinician note kept locally until it is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub patient_id: i64,
    pub title: String,
    pub content: String,
    /// "session", "assessment", "follow_up", ...
    pub note_type: String,
    pub updated_at: String,
}

/// Fields a draft update may change. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct UpdateNoteDraftInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub note_type: Option<String>,
}
