//! User Store
//!
//! Persistent user records backed by SQLite. Email addresses are unique;
//! the generated id doubles as the user's storage namespace root.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Stored user record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Public projection of a user, safe to return from the API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
        }
    }
}

/// SQLite-backed user store
pub struct UserStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

impl UserStore {
    /// Create or open the user database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a throwaway in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new user. Fails with `InvalidInput` if the email is taken.
    pub async fn create(&self, name: &str, email: &str, password_hash: &str) -> Result<User> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: normalize_email(email),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };

        let conn = self.conn.lock().await;
        let result = conn.execute(
            "INSERT INTO users (id, name, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id,
                user.name,
                user.email,
                user.password_hash,
                user.created_at.to_rfc3339()
            ],
        );

        match result {
            Ok(_) => Ok(user),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::InvalidInput("Email already in use".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().await;
        let user = conn
            .query_row(
                "SELECT id, name, email, password_hash, created_at FROM users WHERE email = ?1",
                params![normalize_email(email)],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Number of registered users
    pub async fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_at: String = row.get(4)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at,
    })
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::UserStore(format!("SQLite error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_and_find() {
        let store = UserStore::in_memory().unwrap();
        let user = store.create("Ada", "Ada@Example.com", "$argon2id$x").await.unwrap();

        assert_eq!(user.email, "ada@example.com");
        assert!(Uuid::parse_str(&user.id).is_ok());

        let found = store.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(found, user);
        assert!(store.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = UserStore::in_memory().unwrap();
        store.create("Ada", "ada@example.com", "h1").await.unwrap();

        let result = store.create("Imposter", " ADA@example.com ", "h2").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("users.db");

        let id = {
            let store = UserStore::open(&path).unwrap();
            store.create("Grace", "grace@example.com", "h").await.unwrap().id
        };

        let store = UserStore::open(&path).unwrap();
        let user = store.find_by_email("grace@example.com").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
