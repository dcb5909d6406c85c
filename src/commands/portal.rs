use std::fmt::Write;

use crate::api::types::{
    AdminDashboard, AdminUser, Alert, DoctorPatient, HistoryEntry, Note, PatientReport,
    PatientSummary, TriageItem,
};
use crate::cli::AlertAction;
use crate::db::repos::drafts as draft_repo;
use crate::error::AppError;
use crate::session::{Route, RouteDecision};
use crate::validation;
use crate::AppState;

// ── Navigation ─────────────────────────────────────────────────────

/// Restore the session, run the route guard and print the page.
pub async fn open(state: &mut AppState, path: &str) -> Result<(), AppError> {
    state.session.restore().await?;
    let route = Route::parse(path);

    let target = match state.session.guard(&route) {
        RouteDecision::Allow => route,
        RouteDecision::Redirect(Route::Login) => {
            println!("{route} requires signing in: carebridge login --email <EMAIL>");
            return Err(AppError::Auth("not signed in".into()));
        }
        RouteDecision::Redirect(other) => {
            tracing::info!(from = %route, to = %other, "Route not permitted for role");
            println!("{route} is not available to your account. Showing {other} instead.\n");
            other
        }
        RouteDecision::Loading => {
            println!("Loading...");
            return Ok(());
        }
    };

    let page = render_route(state, target).await?;
    print!("{page}");
    Ok(())
}

/// Require the signed-in user to be allowed on `route` before acting.
async fn require_access(state: &mut AppState, route: Route) -> Result<(), AppError> {
    state.session.restore().await?;
    match state.session.guard(&route) {
        RouteDecision::Allow => Ok(()),
        RouteDecision::Redirect(Route::Login) | RouteDecision::Loading => {
            Err(AppError::Auth("not signed in".into()))
        }
        RouteDecision::Redirect(_) => Err(AppError::Forbidden(format!(
            "{route} is not available to your account"
        ))),
    }
}

async fn render_route(state: &AppState, route: Route) -> Result<String, AppError> {
    let api = &state.api;
    let page = match route {
        Route::Home => render_home(state.session.user().map(|u| u.role.home())),
        Route::Login => match state.session.user() {
            Some(user) => format!(
                "Already signed in as {}.\n",
                super::auth::describe_user(user)
            ),
            None => "Sign in with: carebridge login --email <EMAIL>\n".to_string(),
        },
        Route::Admin => {
            let dashboard = api.admin_dashboard().await?;
            let users = api.admin_users().await?;
            format!("{}\n{}", render_admin_dashboard(&dashboard), render_users(&users))
        }
        Route::DoctorDashboard => {
            let patients = api.doctor_patients().await?;
            let alerts = api.doctor_alerts().await?;
            let queue = api.doctor_triage().await?;
            render_doctor_dashboard(&patients, &alerts, &queue)
        }
        Route::DoctorPatients => render_patients(&api.doctor_patients().await?),
        Route::DoctorPatient(id) => {
            let notes = api.patient_notes(id).await?;
            let draft = draft_repo::get(&state.db, id)?;
            let mut out = render_notes(id, &notes);
            if let Some(draft) = draft {
                let _ = writeln!(
                    out,
                    "\nUnsent draft ({}, edited {}):\n  {}\n  {}",
                    draft.note_type, draft.updated_at, draft.title, draft.content
                );
            }
            out
        }
        Route::DoctorAlerts => render_alerts(&api.doctor_alerts().await?),
        Route::DoctorReports => render_reports(&api.doctor_reports().await?),
        Route::DoctorSettings => {
            let c = &state.config;
            format!(
                "Settings\n  API:          {}\n  Data dir:     {}\n  Ticket dir:   {}\n  HTTP timeout: {}s\n  Pacing:       {:?}\n",
                c.api_base_url,
                c.data_dir.display(),
                c.ticket_dir.display(),
                c.http_timeout_secs,
                c.pacing,
            )
        }
        Route::PatientHome => render_patient_summary(&api.patient_summary().await?),
        Route::PatientJournal => render_history(&api.patient_history().await?),
    };
    Ok(page)
}

// ── Actions ────────────────────────────────────────────────────────

pub async fn alert(state: &mut AppState, action: AlertAction) -> Result<(), AppError> {
    require_access(state, Route::DoctorAlerts).await?;
    match action {
        AlertAction::Ack { id } => {
            validation::require_valid_id("alert_id", id)?;
            state.api.acknowledge_alert(id).await?;
            println!("Alert {id} acknowledged.");
        }
        AlertAction::Resolve { id } => {
            validation::require_valid_id("alert_id", id)?;
            state.api.resolve_alert(id).await?;
            println!("Alert {id} resolved.");
        }
    }
    Ok(())
}

pub async fn journal(state: &mut AppState, mood: u8, thoughts: &str) -> Result<(), AppError> {
    validation::require_non_empty("thoughts", thoughts)?;
    require_access(state, Route::PatientJournal).await?;
    state.api.create_journal_entry(mood, thoughts.trim()).await?;
    println!("Journal entry saved.");
    Ok(())
}

// ── Rendering ──────────────────────────────────────────────────────

fn render_home(home: Option<Route>) -> String {
    let mut out = String::from(
        "CareBridge\nCompassionate mental-health support, when you need it.\n\n  Start a check-in: carebridge chat\n",
    );
    match home {
        Some(route) => {
            let _ = writeln!(out, "  Your portal:      carebridge open {route}");
        }
        None => out.push_str("  Staff & patients: carebridge login --email <EMAIL>\n"),
    }
    out
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

pub(crate) fn render_patients(patients: &[DoctorPatient]) -> String {
    if patients.is_empty() {
        return "No patients assigned yet.\n".to_string();
    }
    let mut out = format!("Patients ({})\n", patients.len());
    for p in patients {
        let _ = writeln!(
            out,
            "  #{:<5} {} {:<20} {:<28} last seen {} mood {}",
            p.id,
            p.first_name,
            p.last_name,
            p.email,
            or_dash(p.last_interaction.as_deref()),
            or_dash(p.last_mood.as_deref()),
        );
    }
    out
}

pub(crate) fn render_alerts(alerts: &[Alert]) -> String {
    if alerts.is_empty() {
        return "No alerts.\n".to_string();
    }
    let mut out = format!("Alerts ({})\n", alerts.len());
    for a in alerts {
        let status = if a.is_resolved {
            "resolved"
        } else if a.is_acknowledged {
            "acknowledged"
        } else {
            "open"
        };
        let _ = writeln!(
            out,
            "  #{:<5} [{}] {} (patient #{}, {}, {})\n         {}",
            a.id, a.severity, a.title, a.patient_id, status, a.created_at, a.message
        );
    }
    out
}

fn render_queue(queue: &[TriageItem]) -> String {
    let mut out = String::new();
    for item in queue {
        let risk = item
            .risk_score
            .map(|r| format!("{r:.1}"))
            .unwrap_or_else(|| "-".into());
        let _ = writeln!(
            out,
            "  #{:<5} {:<24} {:<10} severity {:<9} risk {:<5} {}",
            item.id,
            item.patient_name,
            item.status,
            or_dash(item.severity_level.as_deref()),
            risk,
            item.created_at,
        );
    }
    out
}

pub(crate) fn render_doctor_dashboard(
    patients: &[DoctorPatient],
    alerts: &[Alert],
    queue: &[TriageItem],
) -> String {
    let open_alerts = alerts.iter().filter(|a| !a.is_resolved).count();
    let mut out = format!(
        "Doctor Dashboard\n  Patients:      {}\n  Active alerts: {}\n  Triage queue:  {}\n",
        patients.len(),
        open_alerts,
        queue.len()
    );
    if !queue.is_empty() {
        out.push_str("\nTriage queue\n");
        out.push_str(&render_queue(queue));
    }
    out
}

fn render_notes(patient_id: i64, notes: &[Note]) -> String {
    let mut out = format!("Patient #{patient_id}: notes ({})\n", notes.len());
    for n in notes {
        let _ = writeln!(out, "  {} [{}] {}\n    {}", n.created_at, n.note_type, n.title, n.content);
    }
    out
}

fn render_reports(reports: &[PatientReport]) -> String {
    if reports.is_empty() {
        return "No reports yet.\n".to_string();
    }
    let mut out = String::from("Reports\n");
    for r in reports {
        let _ = writeln!(
            out,
            "  #{:<5} {} <{}>: {} note(s)",
            r.patient_id,
            r.patient_name,
            r.email,
            r.notes.len()
        );
    }
    out
}

pub(crate) fn render_patient_summary(summary: &PatientSummary) -> String {
    format!(
        "Patient Portal\n\nProgress Summary\n  Total entries:     {}\n  Average mood:      {:.1}\n  Positive thoughts: {}\n  Concerns flagged:  {}\n",
        summary.total_entries,
        summary.average_mood,
        summary.positive_thoughts,
        summary.concerns_flagged,
    )
}

fn render_history(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return "Your journal is empty. Add an entry with: carebridge journal --mood <1-10> --thoughts <TEXT>\n"
            .to_string();
    }
    let mut out = String::from("Journal & history\n");
    for h in history {
        let mood = h.mood.as_deref().map(|m| format!(" (mood {m})")).unwrap_or_default();
        let _ = writeln!(out, "  {} {}{}: {}", h.timestamp, h.speaker, mood, h.content);
    }
    out
}

pub(crate) fn render_admin_dashboard(dashboard: &AdminDashboard) -> String {
    let s = &dashboard.stats;
    let mut out = format!(
        "Admin Dashboard\n  Doctors:       {}\n  Patients:      {}\n  Interactions:  {}\n  Active alerts: {}\n",
        s.total_doctors, s.total_patients, s.total_interactions, s.active_alerts
    );
    if !dashboard.recent_activity.is_empty() {
        out.push_str("\nRecent activity\n");
        for a in &dashboard.recent_activity {
            let _ = writeln!(out, "  {} {}: {}", a.timestamp, a.speaker, a.content);
        }
    }
    out
}

fn render_users(users: &[AdminUser]) -> String {
    let mut out = format!("Users ({})\n", users.len());
    for u in users {
        let active = if u.is_active { "" } else { " (inactive)" };
        let specialization = u
            .specialization
            .as_deref()
            .map(|s| format!(", {s}"))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  #{:<5} {:<8} {} {} <{}>{}{}",
            u.id, u.user_type, u.first_name, u.last_name, u.email, specialization, active
        );
    }
    out
}
