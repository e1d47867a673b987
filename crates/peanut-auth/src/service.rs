//! The authentication service: login state machine, TOTP enrolment,
//! password changes, seeding.

use peanut_audit::{Actor, AuditAction, AuditLog, Subject};
use peanut_core::{Error, Result, Role, Timestamp};
use peanut_crypto::{hash_password, random_hex, verify_password};
use peanut_storage::Database;
use serde::Serialize;
use tracing::{info, warn};

use crate::store::{SessionStore, UserStore};
use crate::tokens::{SessionClaims, TokenSigner};
use crate::totp;
use crate::user::{SafeUser, User, MIN_PASSWORD_LEN};

const SEED_ADMIN_EMAIL: &str = "admin@peanut.local";
const TOTP_ISSUER: &str = "Peanut";

/// Boundary metadata about the calling client.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    /// Client IP as seen by the boundary.
    pub ip: Option<String>,
    /// Client `User-Agent` header.
    pub user_agent: Option<String>,
}

impl ClientInfo {
    fn actor_for(&self, user: &User) -> Actor {
        Actor::user(&user.id, &user.email)
            .with_client(self.ip.clone(), self.user_agent.clone())
    }

    fn actor_attempt(&self, email: &str) -> Actor {
        Actor {
            user_id: None,
            email: Some(email.to_lowercase()),
            ip: self.ip.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Result of a password login.
#[derive(Debug)]
pub enum LoginOutcome {
    /// Password accepted; TOTP verification still required.
    RequireTotp {
        /// The 10-minute intermediate token.
        temp_token: String,
    },
    /// Fully authenticated.
    Authenticated {
        /// The signed session token (cookie value).
        token: String,
        /// The session's claims.
        claims: SessionClaims,
        /// The authenticated user's safe profile.
        user: SafeUser,
    },
}

/// Everything the TOTP enrolment endpoint returns.
#[derive(Debug, Serialize)]
pub struct TotpSetup {
    /// The base32 secret (shown once).
    pub secret: String,
    /// The `otpauth://` provisioning URI.
    pub otpauth_url: String,
    /// The URI rendered as an SVG QR data URL.
    pub qr_code_data_url: String,
    /// Ten one-shot backup codes (shown once).
    pub backup_codes: Vec<String>,
}

/// The authentication core.
#[derive(Debug, Clone)]
pub struct AuthService {
    users: UserStore,
    sessions: SessionStore,
    signer: TokenSigner,
    audit: AuditLog,
}

impl AuthService {
    /// Wire the service over the shared database and audit log.
    #[must_use]
    pub fn new(db: Database, signer: TokenSigner, audit: AuditLog) -> Self {
        Self {
            users: UserStore::new(db.clone()),
            sessions: SessionStore::new(db),
            signer,
            audit,
        }
    }

    /// The token signer (shared with the boundary's extractor).
    #[must_use]
    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Whether the session behind a verified token is still active.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lookup fails.
    pub async fn session_active(&self, sid: &str) -> Result<bool> {
        self.sessions.is_active(sid).await
    }

    /// Seed the initial admin account on an empty user table.
    ///
    /// # Errors
    ///
    /// Returns storage or crypto errors; an already-populated table is
    /// not an error.
    pub async fn seed_admin(&self, default_password: Option<&str>) -> Result<()> {
        if self.users.count().await? > 0 {
            return Ok(());
        }

        let generated;
        let password = match default_password {
            Some(pw) => pw,
            None => {
                generated = random_hex(16);
                warn!(
                    email = SEED_ADMIN_EMAIL,
                    password = %generated,
                    "DEFAULT_ADMIN_PASSWORD not set; generated a seed password - change it immediately"
                );
                generated.as_str()
            },
        };

        let hash = hash_password(password).map_err(Error::internal)?;
        let admin = User::new(SEED_ADMIN_EMAIL, "Administrator", hash, Role::Admin)?;
        self.users.create(&admin).await?;
        self.audit
            .append(
                AuditAction::UserCreated,
                Actor::system(),
                Subject::user(&admin.id),
                serde_json::json!({ "email": admin.email, "seeded": true }),
            )
            .await?;
        info!(email = SEED_ADMIN_EMAIL, "seeded initial admin account");
        Ok(())
    }

    /// Step one of the login state machine: password verification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] with a uniform message for
    /// unknown emails and wrong passwords alike.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<LoginOutcome> {
        let user = self.users.find_by_email(email).await?;

        let Some(user) = user.filter(|u| verify_password(password, &u.password_hash)) else {
            self.audit
                .append(
                    AuditAction::AuthLoginFailed,
                    client.actor_attempt(email),
                    Subject::none(),
                    serde_json::json!({ "reason": "invalid_credentials" }),
                )
                .await?;
            return Err(Error::Unauthorized("invalid email or password".to_string()));
        };

        if user.totp_enabled {
            let temp_token = self.signer.mint_intermediate(&user.id)?;
            return Ok(LoginOutcome::RequireTotp { temp_token });
        }

        self.finalize_login(user, "password", false, client).await
    }

    /// Step two of the login state machine: TOTP or backup code.
    ///
    /// The failure message never distinguishes an expired intermediate
    /// token from a wrong code or a replayed backup code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] on any verification failure.
    pub async fn verify_totp(
        &self,
        temp_token: &str,
        code: &str,
        client: &ClientInfo,
    ) -> Result<LoginOutcome> {
        let denied = || Error::Unauthorized("invalid token or code".to_string());

        let user_id = self
            .signer
            .verify_intermediate(temp_token)
            .map_err(|_| denied())?;
        let user = self
            .users
            .find_by_id(&user_id)
            .await?
            .ok_or_else(denied)?;
        if !user.totp_enabled {
            return Err(denied());
        }

        let code = code.trim();
        if code.len() == 6 {
            let secret = user.totp_secret.clone().ok_or_else(denied)?;
            if !totp::verify(&secret, code) {
                self.record_totp_failure(&user, client).await?;
                return Err(denied());
            }
            self.finalize_login(user, "totp", false, client).await
        } else {
            let Some(consumed) = user.clone().use_backup_code(&code.to_uppercase()) else {
                self.record_totp_failure(&user, client).await?;
                return Err(denied());
            };
            self.users.update(&consumed).await?;
            self.finalize_login(consumed, "totp", true, client).await
        }
    }

    /// Enrol the authenticated user in TOTP.
    ///
    /// Generates and persists a fresh secret and backup codes; from
    /// this call on, logins require a second factor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown user.
    pub async fn setup_totp(&self, user_id: &str, client: &ClientInfo) -> Result<TotpSetup> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {user_id}")))?;

        let secret = totp::generate_secret();
        let backup_codes = totp::generate_backup_codes();
        let otpauth_url = totp::otpauth_url(TOTP_ISSUER, &user.email, &secret);
        let qr_code_data_url = totp::qr_data_url(&otpauth_url)
            .ok_or_else(|| Error::Internal("QR rendering failed".to_string()))?;

        let enrolled = user.enable_totp(&secret, backup_codes.clone());
        self.users.update(&enrolled).await?;
        self.audit
            .append(
                AuditAction::AuthTotpEnabled,
                client.actor_for(&enrolled),
                Subject::user(&enrolled.id),
                serde_json::json!({}),
            )
            .await?;

        Ok(TotpSetup {
            secret,
            otpauth_url,
            qr_code_data_url,
            backup_codes,
        })
    }

    /// Change the authenticated user's password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] for a wrong current password
    /// and [`Error::Validation`] for a too-short new one.
    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
        client: &ClientInfo,
    ) -> Result<()> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {user_id}")))?;

        if !verify_password(current_password, &user.password_hash) {
            return Err(Error::Unauthorized("current password is wrong".to_string()));
        }
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(Error::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let hash = hash_password(new_password).map_err(Error::internal)?;
        let updated = user.with_password_hash(hash);
        self.users.update(&updated).await?;
        self.audit
            .append(
                AuditAction::AuthPasswordChanged,
                client.actor_for(&updated),
                Subject::user(&updated.id),
                serde_json::json!({}),
            )
            .await?;
        Ok(())
    }

    /// End a session.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete or the audit append
    /// fails.
    pub async fn logout(&self, claims: &SessionClaims, client: &ClientInfo) -> Result<()> {
        self.sessions.delete(&claims.sid).await?;
        self.audit
            .append(
                AuditAction::AuthLogout,
                Actor::user(&claims.sub, &claims.email)
                    .with_client(client.ip.clone(), client.user_agent.clone()),
                Subject::none(),
                serde_json::json!({}),
            )
            .await?;
        Ok(())
    }

    /// The authenticated user's profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the account was deleted after
    /// the session was issued.
    pub async fn profile(&self, user_id: &str) -> Result<SafeUser> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(|u| u.safe())
            .ok_or_else(|| Error::NotFound(format!("user {user_id}")))
    }

    async fn finalize_login(
        &self,
        user: User,
        method: &str,
        used_backup: bool,
        client: &ClientInfo,
    ) -> Result<LoginOutcome> {
        let totp_verified = method == "totp";
        let (token, claims) =
            self.signer
                .mint_session(&user.id, &user.email, user.role, totp_verified)?;

        let logged_in = user.record_login(Timestamp::now());
        self.users.update(&logged_in).await?;
        self.sessions.insert(&claims).await?;

        self.audit
            .append(
                AuditAction::AuthLogin,
                client.actor_for(&logged_in),
                Subject::none(),
                serde_json::json!({ "method": method, "used_backup": used_backup }),
            )
            .await?;

        Ok(LoginOutcome::Authenticated {
            token,
            claims,
            user: logged_in.safe(),
        })
    }

    async fn record_totp_failure(&self, user: &User, client: &ClientInfo) -> Result<()> {
        self.audit
            .append(
                AuditAction::AuthLoginFailed,
                client.actor_for(user),
                Subject::none(),
                serde_json::json!({ "reason": "totp_failed" }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peanut_audit::AuditFilter;

    async fn service() -> (AuthService, AuditLog) {
        let db = Database::connect_memory().await.unwrap();
        let audit = AuditLog::new(db.clone());
        let signer = TokenSigner::new("test-session-secret-of-enough-length");
        (AuthService::new(db, signer, audit.clone()), audit)
    }

    fn client() -> ClientInfo {
        ClientInfo {
            ip: Some("203.0.113.7".to_string()),
            user_agent: Some("test-suite".to_string()),
        }
    }

    const SEED_PW: &str = "a-seed-password-with-length";

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let (auth, _) = service().await;
        auth.seed_admin(Some(SEED_PW)).await.unwrap();
        auth.seed_admin(Some("another-password-ignored")).await.unwrap();

        let outcome = auth
            .login("admin@peanut.local", SEED_PW, &client())
            .await
            .unwrap();
        assert!(matches!(outcome, LoginOutcome::Authenticated { .. }));
    }

    #[tokio::test]
    async fn test_login_wrong_password_is_uniform_and_audited() {
        let (auth, audit) = service().await;
        auth.seed_admin(Some(SEED_PW)).await.unwrap();

        let wrong = auth
            .login("admin@peanut.local", "wrong-password!", &client())
            .await
            .unwrap_err();
        let unknown = auth
            .login("ghost@peanut.local", "whatever-here!", &client())
            .await
            .unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());

        let page = audit
            .query(
                AuditFilter {
                    action: Some(AuditAction::AuthLoginFailed),
                    ..AuditFilter::default()
                },
                1,
                50,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_totp_enrolment_gates_login() {
        let (auth, _) = service().await;
        auth.seed_admin(Some(SEED_PW)).await.unwrap();

        let LoginOutcome::Authenticated { user, .. } = auth
            .login("admin@peanut.local", SEED_PW, &client())
            .await
            .unwrap()
        else {
            panic!("expected authenticated login");
        };

        let setup = auth.setup_totp(&user.id, &client()).await.unwrap();
        assert_eq!(setup.backup_codes.len(), 10);
        assert!(setup.qr_code_data_url.starts_with("data:image/svg+xml;base64,"));

        // Password alone no longer authenticates.
        let outcome = auth
            .login("admin@peanut.local", SEED_PW, &client())
            .await
            .unwrap();
        let LoginOutcome::RequireTotp { temp_token } = outcome else {
            panic!("expected TOTP challenge");
        };

        // A current code completes the login.
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let code = crate::totp::code_at(&setup.secret, now).unwrap();
        let outcome = auth.verify_totp(&temp_token, &code, &client()).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Authenticated { .. }));
    }

    #[tokio::test]
    async fn test_backup_code_is_single_use() {
        let (auth, _) = service().await;
        auth.seed_admin(Some(SEED_PW)).await.unwrap();

        let LoginOutcome::Authenticated { user, .. } = auth
            .login("admin@peanut.local", SEED_PW, &client())
            .await
            .unwrap()
        else {
            panic!("expected authenticated login");
        };
        let setup = auth.setup_totp(&user.id, &client()).await.unwrap();

        let LoginOutcome::RequireTotp { temp_token } = auth
            .login("admin@peanut.local", SEED_PW, &client())
            .await
            .unwrap()
        else {
            panic!("expected TOTP challenge");
        };

        let outcome = auth
            .verify_totp(&temp_token, &setup.backup_codes[0], &client())
            .await
            .unwrap();
        assert!(matches!(outcome, LoginOutcome::Authenticated { .. }));

        // Replaying the same code with a fresh challenge fails.
        let LoginOutcome::RequireTotp { temp_token } = auth
            .login("admin@peanut.local", SEED_PW, &client())
            .await
            .unwrap()
        else {
            panic!("expected TOTP challenge");
        };
        let err = auth
            .verify_totp(&temp_token, &setup.backup_codes[0], &client())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_session_token_rejected_at_totp_verify() {
        let (auth, _) = service().await;
        auth.seed_admin(Some(SEED_PW)).await.unwrap();

        let LoginOutcome::Authenticated { token, .. } = auth
            .login("admin@peanut.local", SEED_PW, &client())
            .await
            .unwrap()
        else {
            panic!("expected authenticated login");
        };

        let err = auth.verify_totp(&token, "123456", &client()).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_change_password_rules() {
        let (auth, _) = service().await;
        auth.seed_admin(Some(SEED_PW)).await.unwrap();
        let LoginOutcome::Authenticated { user, .. } = auth
            .login("admin@peanut.local", SEED_PW, &client())
            .await
            .unwrap()
        else {
            panic!("expected authenticated login");
        };

        let err = auth
            .change_password(&user.id, "not-the-password", "long-enough-password", &client())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        let err = auth
            .change_password(&user.id, SEED_PW, "short", &client())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        auth.change_password(&user.id, SEED_PW, "a-brand-new-password", &client())
            .await
            .unwrap();
        assert!(auth
            .login("admin@peanut.local", "a-brand-new-password", &client())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_logout_revokes_session() {
        let (auth, _) = service().await;
        auth.seed_admin(Some(SEED_PW)).await.unwrap();
        let LoginOutcome::Authenticated { claims, .. } = auth
            .login("admin@peanut.local", SEED_PW, &client())
            .await
            .unwrap()
        else {
            panic!("expected authenticated login");
        };

        assert!(auth.session_active(&claims.sid).await.unwrap());
        auth.logout(&claims, &client()).await.unwrap();
        assert!(!auth.session_active(&claims.sid).await.unwrap());
    }
}
