use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::api::types::MeResponse;
use crate::api::ApiClient;
use crate::error::AppError;
use crate::validation;

use super::routes::{guard, Role, Route, RouteDecision};

/// The signed-in portal user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    #[ts(type = "number")]
    pub id: i64,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
}

impl From<MeResponse> for AuthUser {
    fn from(me: MeResponse) -> Self {
        let name = [me.first_name.as_deref(), me.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            id: me.id,
            email: me.email,
            display_name: (!name.is_empty()).then_some(name),
            role: me.user_type,
        }
    }
}

/// Authentication state shared by every portal view.
///
/// Starts out `loading` until [`Session::restore`] has checked the saved token.
pub struct Session {
    api: Arc<ApiClient>,
    user: Option<AuthUser>,
    loading: bool,
}

impl Session {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            user: None,
            loading: true,
        }
    }

    /// Validate a saved token against `/auth/me`. Any failure discards it.
    pub async fn restore(&mut self) -> Result<Option<&AuthUser>, AppError> {
        self.loading = true;
        self.user = None;

        if self.api.has_token() {
            match self.api.me().await {
                Ok(me) if me.is_active => {
                    self.user = Some(AuthUser::from(me));
                }
                Ok(me) => {
                    tracing::warn!(user_id = me.id, "Saved session belongs to an inactive user");
                    self.api.clear_token()?;
                }
                Err(e) => {
                    tracing::info!(error = %e, "Saved session token rejected, signing out");
                    self.api.clear_token()?;
                }
            }
        }

        self.loading = false;
        Ok(self.user.as_ref())
    }

    /// Exchange credentials for a token, remember it, and return the user's role.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<Role, AppError> {
        let email = email.trim();
        validation::require_email("email", email)?;
        validation::require_non_empty("password", password)?;

        let resp = match self.api.login(email, password).await {
            Ok(resp) => resp,
            Err(AppError::Http { status, body }) if (400..500).contains(&status) => {
                let reason = if body.is_empty() { "Login failed".to_string() } else { body };
                return Err(AppError::Auth(reason));
            }
            Err(e) => return Err(e),
        };

        self.api.set_token(&resp.access_token)?;
        self.user = Some(AuthUser {
            id: resp.user_id,
            email: email.to_string(),
            display_name: resp.user_name.filter(|n| !n.trim().is_empty()),
            role: resp.user_type,
        });
        self.loading = false;

        tracing::info!(user_id = resp.user_id, role = %resp.user_type, "Signed in");
        Ok(resp.user_type)
    }

    pub fn logout(&mut self) -> Result<(), AppError> {
        self.api.clear_token()?;
        self.user = None;
        self.loading = false;
        Ok(())
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn guard(&self, route: &Route) -> RouteDecision {
        guard(route, self.loading, self.role())
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::session::{MemoryTokenStore, TokenStore};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn client_for(router: Router, store: Arc<MemoryTokenStore>) -> Arc<ApiClient> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let config = AppConfig {
            api_base_url: format!("http://{addr}"),
            ..AppConfig::default()
        };
        Arc::new(
            ApiClient::new(&config)
                .unwrap()
                .with_token_store(store)
                .unwrap(),
        )
    }

    fn auth_router() -> Router {
        Router::new()
            .route(
                "/api/v1/auth/login",
                post(|Json(body): Json<Value>| async move {
                    if body["password"] == "secret" {
                        (
                            StatusCode::OK,
                            Json(json!({
                                "access_token": "tok-9", "token_type": "bearer",
                                "user_type": "doctor", "user_id": 3, "user_name": "Dr. Lee"
                            })),
                        )
                    } else {
                        (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Incorrect email or password"})))
                    }
                }),
            )
            .route(
                "/api/v1/auth/me",
                get(|headers: HeaderMap| async move {
                    let ok = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        == Some("Bearer tok-9");
                    if ok {
                        (
                            StatusCode::OK,
                            Json(json!({
                                "id": 3, "email": "lee@carebridge.test", "first_name": "Ana",
                                "last_name": "Lee", "user_type": "doctor", "is_active": true
                            })),
                        )
                    } else {
                        (StatusCode::UNAUTHORIZED, Json(json!({"detail": "bad token"})))
                    }
                }),
            )
    }

    #[tokio::test]
    async fn test_login_stores_token_and_role() {
        let store = Arc::new(MemoryTokenStore::default());
        let mut session = Session::new(client_for(auth_router(), store.clone()).await);
        assert!(session.is_loading());

        let role = session.login("lee@carebridge.test", "secret").await.unwrap();
        assert_eq!(role, Role::Doctor);
        assert_eq!(store.load().unwrap().as_deref(), Some("tok-9"));
        assert_eq!(session.guard(&Route::DoctorAlerts), RouteDecision::Allow);
        assert_eq!(session.guard(&Route::Admin), RouteDecision::Redirect(Route::Home));
    }

    #[tokio::test]
    async fn test_login_rejected_is_auth_error() {
        let store = Arc::new(MemoryTokenStore::default());
        let mut session = Session::new(client_for(auth_router(), store.clone()).await);
        let err = session.login("lee@carebridge.test", "wrong").await.unwrap_err();
        match err {
            AppError::Auth(msg) => assert_eq!(msg, "Incorrect email or password"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(session.user().is_none());
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_with_valid_token() {
        let store = Arc::new(MemoryTokenStore::default());
        store.save("tok-9").unwrap();
        let mut session = Session::new(client_for(auth_router(), store).await);

        let user = session.restore().await.unwrap().cloned().unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Ana Lee"));
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_restore_with_stale_token_signs_out() {
        let store = Arc::new(MemoryTokenStore::default());
        store.save("stale").unwrap();
        let mut session = Session::new(client_for(auth_router(), store.clone()).await);

        assert!(session.restore().await.unwrap().is_none());
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(
            session.guard(&Route::PatientHome),
            RouteDecision::Redirect(Route::Login)
        );
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let store = Arc::new(MemoryTokenStore::default());
        let mut session = Session::new(client_for(auth_router(), store.clone()).await);
        session.login("lee@carebridge.test", "secret").await.unwrap();
        session.logout().unwrap();
        assert!(session.user().is_none());
        assert_eq!(store.load().unwrap(), None);
    }
}
