//! Canonical settings key constants for the `app_settings` table.
//!
//! Use these instead of raw string literals to prevent typo-based key mismatches.

/// Bearer token returned by `/auth/login`.
pub const ACCESS_TOKEN: &str = "auth.access_token";
