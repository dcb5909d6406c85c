use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// The three portal roles, as the API spells them in `user_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Patient,
}

impl Role {
    /// Landing page after login.
    pub fn home(self) -> Route {
        match self {
            Role::Admin => Route::Admin,
            Role::Doctor => Route::DoctorDashboard,
            Role::Patient => Route::PatientHome,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Patient => "patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Every page of the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Admin,
    DoctorDashboard,
    DoctorPatients,
    DoctorPatient(i64),
    DoctorAlerts,
    DoctorReports,
    DoctorSettings,
    PatientHome,
    PatientJournal,
}

impl Route {
    /// Resolve a path. Unknown paths fall back to [`Route::Home`].
    pub fn parse(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.trim().trim_end_matches('/');
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Route::Home,
            ["login"] => Route::Login,
            ["admin"] => Route::Admin,
            ["doctor", "dashboard"] => Route::DoctorDashboard,
            ["doctor", "patients"] => Route::DoctorPatients,
            ["doctor", "patient", id] => match id.parse::<i64>() {
                Ok(id) if id > 0 => Route::DoctorPatient(id),
                _ => Route::Home,
            },
            ["doctor", "alerts"] => Route::DoctorAlerts,
            ["doctor", "reports"] => Route::DoctorReports,
            ["doctor", "settings"] => Route::DoctorSettings,
            ["patient"] => Route::PatientHome,
            ["patient", "journal"] => Route::PatientJournal,
            _ => Route::Home,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".into(),
            Route::Login => "/login".into(),
            Route::Admin => "/admin".into(),
            Route::DoctorDashboard => "/doctor/dashboard".into(),
            Route::DoctorPatients => "/doctor/patients".into(),
            Route::DoctorPatient(id) => format!("/doctor/patient/{id}"),
            Route::DoctorAlerts => "/doctor/alerts".into(),
            Route::DoctorReports => "/doctor/reports".into(),
            Route::DoctorSettings => "/doctor/settings".into(),
            Route::PatientHome => "/patient".into(),
            Route::PatientJournal => "/patient/journal".into(),
        }
    }

    /// `None` for public pages.
    pub fn required_role(&self) -> Option<Role> {
        match self {
            Route::Home | Route::Login => None,
            Route::Admin => Some(Role::Admin),
            Route::DoctorDashboard
            | Route::DoctorPatients
            | Route::DoctorPatient(_)
            | Route::DoctorAlerts
            | Route::DoctorReports
            | Route::DoctorSettings => Some(Role::Doctor),
            Route::PatientHome | Route::PatientJournal => Some(Role::Patient),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// The session is still being restored; render nothing yet.
    Loading,
    Allow,
    Redirect(Route),
}

/// Decide whether a user with `role` may view `route`.
pub fn guard(route: &Route, loading: bool, role: Option<Role>) -> RouteDecision {
    let Some(required) = route.required_role() else {
        return RouteDecision::Allow;
    };
    if loading {
        return RouteDecision::Loading;
    }
    match role {
        None => RouteDecision::Redirect(Route::Login),
        Some(role) if role != required => RouteDecision::Redirect(Route::Home),
        Some(_) => RouteDecision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_known_paths() {
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(Route::parse("/doctor/patient/17"), Route::DoctorPatient(17));
        assert_eq!(Route::parse("/patient/journal/"), Route::PatientJournal);
        assert_eq!(Route::parse("/admin?tab=users"), Route::Admin);
    }

    #[test]
    fn test_parse_unknown_falls_back_home() {
        assert_eq!(Route::parse("/nowhere"), Route::Home);
        assert_eq!(Route::parse("/doctor/patient/abc"), Route::Home);
        assert_eq!(Route::parse("/doctor/patient/-3"), Route::Home);
    }

    #[test]
    fn test_guard_decisions() {
        assert_eq!(guard(&Route::Login, true, None), RouteDecision::Allow);
        assert_eq!(guard(&Route::Admin, true, None), RouteDecision::Loading);
        assert_eq!(
            guard(&Route::DoctorAlerts, false, None),
            RouteDecision::Redirect(Route::Login)
        );
        assert_eq!(
            guard(&Route::DoctorAlerts, false, Some(Role::Patient)),
            RouteDecision::Redirect(Route::Home)
        );
        assert_eq!(
            guard(&Route::DoctorAlerts, false, Some(Role::Doctor)),
            RouteDecision::Allow
        );
    }

    #[test]
    fn test_role_home_is_allowed_for_role() {
        for role in [Role::Admin, Role::Doctor, Role::Patient] {
            assert_eq!(guard(&role.home(), false, Some(role)), RouteDecision::Allow);
        }
    }

    fn any_role() -> impl Strategy<Value = Option<Role>> {
        prop_oneof![
            Just(None),
            Just(Some(Role::Admin)),
            Just(Some(Role::Doctor)),
            Just(Some(Role::Patient)),
        ]
    }

    fn any_path() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("/".to_string()),
            Just("/login".to_string()),
            Just("/admin".to_string()),
            Just("/doctor/dashboard".to_string()),
            Just("/doctor/patients".to_string()),
            Just("/doctor/alerts".to_string()),
            Just("/doctor/reports".to_string()),
            Just("/doctor/settings".to_string()),
            Just("/patient".to_string()),
            Just("/patient/journal".to_string()),
            (1i64..10_000).prop_map(|id| format!("/doctor/patient/{id}")),
            "/[a-z/]{0,24}",
        ]
    }

    proptest! {
        #[test]
        fn prop_no_route_outside_role_subtree(path in any_path(), role in any_role(), loading in any::<bool>()) {
            let route = Route::parse(&path);
            if guard(&route, loading, role) == RouteDecision::Allow {
                if let Some(required) = route.required_role() {
                    prop_assert_eq!(role, Some(required));
                    prop_assert!(!loading);
                }
            }
        }

        #[test]
        fn prop_parse_path_round_trips(path in any_path()) {
            let route = Route::parse(&path);
            prop_assert_eq!(Route::parse(&route.path()), route);
        }
    }
}
