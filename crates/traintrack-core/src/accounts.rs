//! Account lifecycle: registration, sign-in and administration.
//!
//! [`AccountBackend`] is the seam for identity backends. [`LocalAccounts`]
//! keeps credentials in SQLite with argon2 password hashes; a managed identity
//! provider would implement the same trait.

use crate::error::{Result, TrainTrackError};
use crate::types::{Identity, Role};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    /// All three fields must be non-blank.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("username", &self.username),
            ("email", &self.email),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(TrainTrackError::MissingField(name.to_string()));
            }
        }
        Ok(())
    }
}

pub trait AccountBackend: Send + Sync {
    /// Create an account with an explicit role.
    fn add_user(&self, registration: &Registration, role: Role) -> Result<UserRecord>;

    /// Check a username/password pair and return the caller's identity.
    fn authenticate(&self, username: &str, password: &str) -> Result<Identity>;

    /// All accounts: admins first, then premium, then regular; by username within a role.
    fn list(&self) -> Result<Vec<UserRecord>>;

    fn delete(&self, username: &str) -> Result<()>;

    fn change_role(&self, username: &str, role: Role) -> Result<()>;

    /// Self-service sign-up. New accounts start as `regular`.
    fn register(&self, registration: &Registration) -> Result<UserRecord> {
        self.add_user(registration, Role::Regular)
    }
}

/// Sort users the way the administration page lists them.
pub fn sort_for_listing(users: &mut [UserRecord]) {
    users.sort_by(|a, b| {
        a.role
            .listing_rank()
            .cmp(&b.role.listing_rank())
            .then_with(|| a.username.cmp(&b.username))
    });
}

// ---------------------------------------------------------------------------
// LocalAccounts
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL,
    created_at    INTEGER NOT NULL
);
";

pub struct LocalAccounts {
    conn: Mutex<Connection>,
}

impl LocalAccounts {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means another thread panicked mid-query;
        // the connection itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn find(conn: &Connection, username: &str) -> Result<Option<(UserRecord, String)>> {
        let row = conn
            .query_row(
                "SELECT id, username, email, role, created_at, password_hash
                 FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(id, username, email, role, created_at, hash)| {
            Ok((to_record(id, username, email, &role, created_at)?, hash))
        })
        .transpose()
    }
}

fn to_record(
    id: i64,
    username: String,
    email: String,
    role: &str,
    created_at: i64,
) -> Result<UserRecord> {
    Ok(UserRecord {
        id: id.to_string(),
        username,
        email,
        role: role.parse()?,
        created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_default(),
    })
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| TrainTrackError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}

impl AccountBackend for LocalAccounts {
    fn add_user(&self, registration: &Registration, role: Role) -> Result<UserRecord> {
        registration.validate()?;
        let username = registration.username.trim();
        let email = registration.email.trim();
        let hash = hash_password(&registration.password)?;
        let now = Utc::now();

        let conn = self.conn();
        if Self::find(&conn, username)?.is_some() {
            return Err(TrainTrackError::UserExists(username.to_string()));
        }
        conn.execute(
            "INSERT INTO users (username, email, password_hash, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![username, email, hash, role.as_str(), now.timestamp_millis()],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(username, role = %role, "account created");
        to_record(id, username.to_string(), email.to_string(), role.as_str(), now.timestamp_millis())
    }

    fn authenticate(&self, username: &str, password: &str) -> Result<Identity> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(TrainTrackError::InvalidCredentials);
        }
        let found = Self::find(&self.conn(), username.trim())?;
        match found {
            Some((record, hash)) if verify_password(password, &hash) => Ok(record.identity()),
            _ => Err(TrainTrackError::InvalidCredentials),
        }
    }

    fn list(&self) -> Result<Vec<UserRecord>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, username, email, role, created_at FROM users")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;
        let mut users = Vec::new();
        for row in rows {
            let (id, username, email, role, created_at) = row?;
            users.push(to_record(id, username, email, &role, created_at)?);
        }
        sort_for_listing(&mut users);
        Ok(users)
    }

    fn delete(&self, username: &str) -> Result<()> {
        let affected = self
            .conn()
            .execute("DELETE FROM users WHERE username = ?1", params![username])?;
        if affected == 0 {
            return Err(TrainTrackError::UserNotFound(username.to_string()));
        }
        tracing::info!(username, "account deleted");
        Ok(())
    }

    fn change_role(&self, username: &str, role: Role) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET role = ?1 WHERE username = ?2",
            params![role.as_str(), username],
        )?;
        if affected == 0 {
            return Err(TrainTrackError::UserNotFound(username.to_string()));
        }
        tracing::info!(username, role = %role, "account role changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(username: &str) -> Registration {
        Registration {
            username: username.into(),
            email: format!("{username}@example.com"),
            password: "hunter2".into(),
        }
    }

    #[test]
    fn equal_passwords_get_distinct_salts() {
        let a = hash_password("hunter2").unwrap();
        let b = hash_password("hunter2").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("hunter2", &a));
        assert!(verify_password("hunter2", &b));
        assert!(!verify_password("hunter3", &a));
    }

    #[test]
    fn register_creates_regular_account() {
        let accounts = LocalAccounts::open_in_memory().unwrap();
        let user = accounts.register(&reg("ada")).unwrap();
        assert_eq!(user.username, "ada");
        assert_eq!(user.role, Role::Regular);
    }

    #[test]
    fn register_requires_all_fields() {
        let accounts = LocalAccounts::open_in_memory().unwrap();
        let mut r = reg("ada");
        r.email = " ".into();
        assert!(matches!(
            accounts.register(&r),
            Err(TrainTrackError::MissingField(f)) if f == "email"
        ));
        assert!(accounts.list().unwrap().is_empty());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let accounts = LocalAccounts::open_in_memory().unwrap();
        accounts.register(&reg("ada")).unwrap();
        assert!(matches!(
            accounts.register(&reg("ada")),
            Err(TrainTrackError::UserExists(_))
        ));
    }

    #[test]
    fn authenticate_checks_password() {
        let accounts = LocalAccounts::open_in_memory().unwrap();
        accounts.add_user(&reg("ada"), Role::Premium).unwrap();

        let identity = accounts.authenticate("ada", "hunter2").unwrap();
        assert_eq!(identity.role, Role::Premium);
        assert_eq!(identity.email, "ada@example.com");

        assert!(matches!(
            accounts.authenticate("ada", "wrong"),
            Err(TrainTrackError::InvalidCredentials)
        ));
        assert!(matches!(
            accounts.authenticate("nobody", "hunter2"),
            Err(TrainTrackError::InvalidCredentials)
        ));
    }

    #[test]
    fn list_orders_by_role_then_username() {
        let accounts = LocalAccounts::open_in_memory().unwrap();
        accounts.add_user(&reg("zed"), Role::Regular).unwrap();
        accounts.add_user(&reg("bob"), Role::Premium).unwrap();
        accounts.add_user(&reg("amy"), Role::Regular).unwrap();
        accounts.add_user(&reg("root"), Role::Admin).unwrap();

        let names: Vec<String> = accounts
            .list()
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["root", "bob", "amy", "zed"]);
    }

    #[test]
    fn change_role_and_delete() {
        let accounts = LocalAccounts::open_in_memory().unwrap();
        accounts.register(&reg("ada")).unwrap();

        accounts.change_role("ada", Role::Admin).unwrap();
        assert_eq!(accounts.list().unwrap()[0].role, Role::Admin);

        accounts.delete("ada").unwrap();
        assert!(accounts.list().unwrap().is_empty());
        assert!(matches!(
            accounts.delete("ada"),
            Err(TrainTrackError::UserNotFound(_))
        ));
        assert!(matches!(
            accounts.change_role("ada", Role::Regular),
            Err(TrainTrackError::UserNotFound(_))
        ));
    }

    #[test]
    fn accounts_persist_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("db/traintrack.db");
        {
            let accounts = LocalAccounts::open(&path).unwrap();
            accounts.register(&reg("ada")).unwrap();
        }
        let reopened = LocalAccounts::open(&path).unwrap();
        assert!(reopened.authenticate("ada", "hunter2").is_ok());
    }
}
