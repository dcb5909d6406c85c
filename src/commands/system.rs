use std::path::Path;

use serde::Serialize;
use ts_rs::TS;

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct HealthCheckItem {
    pub id: String,
    pub label: String,
    pub status: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct SystemHealthReport {
    pub checks: Vec<HealthCheckItem>,
    pub all_ok: bool,
}

impl HealthCheckItem {
    fn new(id: &str, label: &str, status: &str, detail: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            status: status.into(),
            detail: Some(detail.into()),
        }
    }
}

/// Check the API, the local store and the ticket directory, then print a report.
pub async fn health(state: &mut AppState) -> Result<(), AppError> {
    let mut checks = Vec::new();

    // Check 1: API reachable
    checks.push(match state.api.health().await {
        Ok(resp) => HealthCheckItem::new(
            "api",
            "CareBridge API",
            "ok",
            format!("{} ({})", state.api.base_url(), resp.status.as_deref().unwrap_or("up")),
        ),
        Err(e) => HealthCheckItem::new("api", "CareBridge API", "error", e.to_string()),
    });

    // Check 2: local database
    checks.push(match state.db.get() {
        Ok(conn) => match conn.query_row("SELECT COUNT(*) FROM note_drafts", [], |r| r.get::<_, i64>(0)) {
            Ok(drafts) => HealthCheckItem::new(
                "database",
                "Local store",
                "ok",
                format!("{} ({drafts} draft(s))", state.config.data_dir.display()),
            ),
            Err(e) => HealthCheckItem::new("database", "Local store", "error", e.to_string()),
        },
        Err(e) => HealthCheckItem::new("database", "Local store", "error", e.to_string()),
    });

    // Check 3: tickets can be written
    checks.push(check_writable_dir("tickets", "Ticket directory", &state.config.ticket_dir));

    // Check 4: saved session (informational)
    checks.push(match state.session.restore().await {
        Ok(Some(user)) => {
            HealthCheckItem::new("session", "Session", "ok", format!("signed in as {}", user.email))
        }
        Ok(None) => HealthCheckItem::new("session", "Session", "warn", "not signed in"),
        Err(e) => HealthCheckItem::new("session", "Session", "error", e.to_string()),
    });

    let all_ok = checks.iter().all(|c| c.status != "error");
    let report = SystemHealthReport { checks, all_ok };
    print!("{}", render_report(&report));

    if report.all_ok {
        Ok(())
    } else {
        Err(AppError::Internal("health check failed".into()))
    }
}

fn check_writable_dir(id: &str, label: &str, dir: &Path) -> HealthCheckItem {
    let marker = dir.join(format!(".carebridge-write-check-{}", uuid::Uuid::new_v4()));
    let result = std::fs::create_dir_all(dir)
        .and_then(|_| std::fs::write(&marker, b"ok"))
        .and_then(|_| std::fs::remove_file(&marker));
    match result {
        Ok(()) => HealthCheckItem::new(id, label, "ok", dir.display().to_string()),
        Err(e) => HealthCheckItem::new(id, label, "error", format!("{}: {e}", dir.display())),
    }
}

fn render_report(report: &SystemHealthReport) -> String {
    let mut out = String::new();
    for check in &report.checks {
        let mark = match check.status.as_str() {
            "ok" => "✓",
            "warn" => "!",
            _ => "✗",
        };
        out.push_str(&format!(
            "{mark} {:<18} {}\n",
            check.label,
            check.detail.as_deref().unwrap_or_default()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writable_dir_check() {
        let dir = tempfile::tempdir().unwrap();
        let item = check_writable_dir("tickets", "Ticket directory", &dir.path().join("t"));
        assert_eq!(item.status, "ok");
        assert_eq!(std::fs::read_dir(dir.path().join("t")).unwrap().count(), 0);
    }

    #[test]
    fn test_report_marks_status() {
        let report = SystemHealthReport {
            checks: vec![
                HealthCheckItem::new("api", "CareBridge API", "error", "refused"),
                HealthCheckItem::new("session", "Session", "warn", "not signed in"),
            ],
            all_ok: false,
        };
        let text = render_report(&report);
        assert!(text.starts_with("✗ CareBridge API"));
        assert!(text.contains("! Session"));
    }
}
