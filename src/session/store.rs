use std::sync::Mutex;

use crate::db::repos::settings as settings_repo;
use crate::db::{settings_keys, DbPool};
use crate::error::AppError;

/// Persistent home of the bearer token between runs.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, AppError>;
    fn save(&self, token: &str) -> Result<(), AppError>;
    fn clear(&self) -> Result<(), AppError>;
}

/// Keeps the token in the `app_settings` table.
pub struct SqliteTokenStore {
    pool: DbPool,
}

impl SqliteTokenStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl TokenStore for SqliteTokenStore {
    fn load(&self) -> Result<Option<String>, AppError> {
        let token = settings_repo::get(&self.pool, settings_keys::ACCESS_TOKEN)?;
        Ok(token.filter(|t| !t.trim().is_empty()))
    }

    fn save(&self, token: &str) -> Result<(), AppError> {
        settings_repo::set(&self.pool, settings_keys::ACCESS_TOKEN, token)
    }

    fn clear(&self) -> Result<(), AppError> {
        settings_repo::delete(&self.pool, settings_keys::ACCESS_TOKEN)?;
        Ok(())
    }
}

/// Process-local store for tests and one-shot commands.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, AppError> {
        let guard = self
            .token
            .lock()
            .map_err(|_| AppError::Internal("token store lock poisoned".into()))?;
        Ok(guard.clone())
    }

    fn save(&self, token: &str) -> Result<(), AppError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|_| AppError::Internal("token store lock poisoned".into()))?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), AppError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|_| AppError::Internal("token store lock poisoned".into()))?;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;

    #[test]
    fn test_sqlite_store_survives_new_instance() {
        let pool = init_test_db().unwrap();
        SqliteTokenStore::new(pool.clone()).save("abc").unwrap();

        let reopened = SqliteTokenStore::new(pool);
        assert_eq!(reopened.load().unwrap().as_deref(), Some("abc"));
        reopened.clear().unwrap();
        assert_eq!(reopened.load().unwrap(), None);
    }

    #[test]
    fn test_sqlite_store_treats_blank_token_as_absent() {
        let pool = init_test_db().unwrap();
        let store = SqliteTokenStore::new(pool);
        store.save("  ").unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
