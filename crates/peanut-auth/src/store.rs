//! User and session repositories.

use peanut_core::{Error, Result, Timestamp};
use peanut_storage::surrealdb::types::SurrealValue;
use peanut_storage::{content, tables, Database, StorageError};
use serde::{Deserialize, Serialize};

use crate::tokens::SessionClaims;
use crate::user::User;

/// Repository for the `users` table.
#[derive(Debug, Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    /// Create a store over the shared database handle.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new user, enforcing email uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] when the email is taken.
    pub async fn create(&self, user: &User) -> Result<()> {
        if self.find_by_email(&user.email).await?.is_some() {
            return Err(Error::Conflict(format!(
                "email already registered: {}",
                user.email
            )));
        }
        self.db
            .client()
            .query("CREATE type::thing($tb, $id) CONTENT $data")
            .bind(("tb", tables::USERS))
            .bind(("id", user.id.clone()))
            .bind(("data", content(user)?))
            .await
            .map_err(StorageError::from)?
            .check()
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Replace a user's row with a new snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the user no longer exists.
    pub async fn update(&self, user: &User) -> Result<()> {
        let mut response = self
            .db
            .client()
            .query("UPDATE type::thing($tb, $id) CONTENT $data RETURN AFTER")
            .bind(("tb", tables::USERS))
            .bind(("id", user.id.clone()))
            .bind(("data", content(user)?))
            .await
            .map_err(StorageError::from)?;
        let updated: Option<serde_json::Value> =
            response.take(0).map_err(StorageError::from)?;
        if updated.is_none() {
            return Err(Error::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }

    /// Look a user up by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the select fails.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let mut response = self
            .db
            .client()
            .query("SELECT *, record::id(id) AS id FROM type::thing($tb, $id)")
            .bind(("tb", tables::USERS))
            .bind(("id", id.to_string()))
            .await
            .map_err(StorageError::from)?;
        Ok(response.take(0).map_err(StorageError::from)?)
    }

    /// Look a user up by (already lowercased) email.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the select fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut response = self
            .db
            .client()
            .query("SELECT *, record::id(id) AS id FROM type::table($tb) WHERE email = $email")
            .bind(("tb", tables::USERS))
            .bind(("email", email.to_lowercase()))
            .await
            .map_err(StorageError::from)?;
        Ok(response.take(0).map_err(StorageError::from)?)
    }

    /// Number of user rows.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the count fails.
    pub async fn count(&self) -> Result<usize> {
        #[derive(Deserialize)]
        struct CountRow {
            total: i64,
        }
        let mut response = self
            .db
            .client()
            .query("SELECT count() AS total FROM type::table($tb) GROUP ALL")
            .bind(("tb", tables::USERS))
            .await
            .map_err(StorageError::from)?;
        let row: Option<CountRow> = response.take(0).map_err(StorageError::from)?;
        Ok(row.map_or(0, |r| usize::try_from(r.total).unwrap_or(0)))
    }
}

/// One active login session (revocation backing for the JWT).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    /// Session id (the JWT's `sid` claim).
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Issue time.
    pub created_at: Timestamp,
    /// Expiry mirroring the JWT's `exp`.
    pub expires_at: Timestamp,
}

/// Repository for the `sessions` table.
#[derive(Debug, Clone)]
pub struct SessionStore {
    db: Database,
}

impl SessionStore {
    /// Create a store over the shared database handle.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist the session backing a freshly minted token.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the insert fails.
    pub async fn insert(&self, claims: &SessionClaims) -> Result<()> {
        let row = SessionRow {
            id: claims.sid.clone(),
            user_id: claims.sub.clone(),
            created_at: Timestamp::from_unix_millis(claims.iat.saturating_mul(1000)),
            expires_at: Timestamp::from_unix_millis(claims.exp.saturating_mul(1000)),
        };
        self.db
            .client()
            .query("CREATE type::thing($tb, $id) CONTENT $data")
            .bind(("tb", tables::SESSIONS))
            .bind(("id", row.id.clone()))
            .bind(("data", content(&row)?))
            .await
            .map_err(StorageError::from)?
            .check()
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Drop a session (logout).
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    pub async fn delete(&self, sid: &str) -> Result<()> {
        self.db
            .client()
            .query("DELETE type::thing($tb, $id)")
            .bind(("tb", tables::SESSIONS))
            .bind(("id", sid.to_string()))
            .await
            .map_err(StorageError::from)?
            .check()
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Whether a session exists and has not expired.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the select fails.
    pub async fn is_active(&self, sid: &str) -> Result<bool> {
        let mut response = self
            .db
            .client()
            .query("SELECT *, record::id(id) AS id FROM type::thing($tb, $id)")
            .bind(("tb", tables::SESSIONS))
            .bind(("id", sid.to_string()))
            .await
            .map_err(StorageError::from)?;
        let row: Option<SessionRow> = response.take(0).map_err(StorageError::from)?;
        Ok(row.is_some_and(|r| r.expires_at > Timestamp::now()))
    }
}
