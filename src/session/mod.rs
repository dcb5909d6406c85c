//! Sign-in state, token persistence and the role-gated route table.

pub mod auth;
pub mod routes;
pub mod store;

pub use auth::{AuthUser, Session};
pub use routes::{guard, Role, Route, RouteDecision};
pub use store::{MemoryTokenStore, SqliteTokenStore, TokenStore};
