//! The user entity and its state transitions.

use peanut_core::{Error, Result, Role, Timestamp};
use peanut_crypto::random_id;
use peanut_storage::surrealdb::types::SurrealValue;
use serde::{Deserialize, Serialize};

/// Minimum length for new and changed passwords.
pub const MIN_PASSWORD_LEN: usize = 12;

/// A privileged gateway user.
///
/// Values are immutable snapshots; transitions return new values and
/// the caller persists them.
#[derive(Debug, Clone, Serialize, Deserialize, SurrealValue)]
#[surreal(crate = "peanut_storage::surrealdb::types")]
pub struct User {
    /// Opaque 128-bit id.
    pub id: String,
    /// Unique, lowercased email.
    pub email: String,
    /// Display name shown in the UI.
    pub display_name: String,
    /// `salt_hex:derived_hex` password hash.
    pub password_hash: String,
    /// Role gating privileged endpoints.
    #[surreal(wrap)]
    pub role: Role,
    /// Base32 TOTP secret, once enrolled.
    pub totp_secret: Option<String>,
    /// Whether TOTP is required at login.
    pub totp_enabled: bool,
    /// Unused one-shot backup codes (uppercase hex).
    pub backup_codes: Vec<String>,
    /// Creation time.
    #[surreal(wrap)]
    pub created_at: Timestamp,
    /// Last modification time.
    #[surreal(wrap)]
    pub updated_at: Timestamp,
    /// Last successful login, if any.
    #[surreal(wrap)]
    pub last_login_at: Option<Timestamp>,
}

impl User {
    /// Create a new user with an already-derived password hash.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the email is malformed.
    pub fn new(
        email: &str,
        display_name: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
    ) -> Result<Self> {
        let email = normalize_email(email)?;
        let now = Timestamp::now();
        Ok(Self {
            id: random_id(),
            email,
            display_name: display_name.into(),
            password_hash: password_hash.into(),
            role,
            totp_secret: None,
            totp_enabled: false,
            backup_codes: Vec::new(),
            created_at: now,
            updated_at: now,
            last_login_at: None,
        })
    }

    /// Snapshot with the login time recorded.
    #[must_use]
    pub fn record_login(mut self, at: Timestamp) -> Self {
        self.last_login_at = Some(at);
        self.updated_at = at;
        self
    }

    /// Snapshot with TOTP enabled.
    ///
    /// The invariant `totp_enabled ⇒ totp_secret ≠ null` holds by
    /// construction: both fields change together.
    #[must_use]
    pub fn enable_totp(mut self, secret: impl Into<String>, backup_codes: Vec<String>) -> Self {
        self.totp_secret = Some(secret.into());
        self.totp_enabled = true;
        self.backup_codes = backup_codes;
        self.updated_at = Timestamp::now();
        self
    }

    /// Snapshot with the given backup code consumed.
    ///
    /// Returns `None` when the code is not among the unused codes, so
    /// a replayed code fails exactly like a wrong one.
    #[must_use]
    pub fn use_backup_code(mut self, code: &str) -> Option<Self> {
        let position = self.backup_codes.iter().position(|c| c == code)?;
        self.backup_codes.remove(position);
        self.updated_at = Timestamp::now();
        Some(self)
    }

    /// Snapshot with a new password hash.
    #[must_use]
    pub fn with_password_hash(mut self, password_hash: impl Into<String>) -> Self {
        self.password_hash = password_hash.into();
        self.updated_at = Timestamp::now();
        self
    }

    /// The boundary-safe view of this user.
    #[must_use]
    pub fn safe(&self) -> SafeUser {
        SafeUser {
            id: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            totp_enabled: self.totp_enabled,
            created_at: self.created_at,
            last_login_at: self.last_login_at,
        }
    }
}

/// User profile without credentials, as returned by the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeUser {
    /// Opaque 128-bit id.
    pub id: String,
    /// Unique, lowercased email.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Role.
    pub role: Role,
    /// Whether TOTP is required at login.
    pub totp_enabled: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last successful login, if any.
    pub last_login_at: Option<Timestamp>,
}

/// Lowercase and shape-check an email address.
fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(Error::Validation("email must contain '@'".to_string()));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || email.contains(' ') {
        return Err(Error::Validation(format!("malformed email: {email}")));
    }
    Ok(email)
}
