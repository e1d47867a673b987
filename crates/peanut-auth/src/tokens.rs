//! Intermediate and session token minting.
//!
//! Both tokens are HS256 JWTs signed with `SESSION_SECRET`. The
//! intermediate token is not a session: it carries a `purpose` claim
//! and is accepted only by the TOTP verification endpoint.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use peanut_core::{Error, Result, Role, Timestamp};
use peanut_crypto::random_hex;
use serde::{Deserialize, Serialize};

const INTERMEDIATE_TTL_SECS: i64 = 10 * 60;
const SESSION_TTL_SECS: i64 = 8 * 60 * 60;
const TOTP_PURPOSE: &str = "totp";

/// Claims of the short-lived TOTP-pending token.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct IntermediateClaims {
    /// The user awaiting TOTP verification.
    pub(crate) sub: String,
    /// Random nonce; makes every mint unique.
    pub(crate) nonce: String,
    /// Always `"totp"`; gates where the token is accepted.
    pub(crate) purpose: String,
    /// Issued-at (unix seconds).
    pub(crate) iat: i64,
    /// Expiry (unix seconds).
    pub(crate) exp: i64,
}

/// Claims of the 8-hour session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id.
    pub sub: String,
    /// User email.
    pub email: String,
    /// User role at issue time.
    pub role: Role,
    /// Whether this session passed TOTP.
    pub totp_verified: bool,
    /// Session id backing revocation.
    pub sid: String,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

/// Signs and verifies the gateway's bearer tokens.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Create a signer from the session secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Mint a 10-minute intermediate token for a user mid-login.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if signing fails.
    pub fn mint_intermediate(&self, user_id: &str) -> Result<String> {
        let now = Timestamp::now().unix_millis() / 1000;
        let claims = IntermediateClaims {
            sub: user_id.to_string(),
            nonce: random_hex(16),
            purpose: TOTP_PURPOSE.to_string(),
            iat: now,
            exp: now + INTERMEDIATE_TTL_SECS,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(Error::internal)
    }

    /// Verify an intermediate token, returning the pending user id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] for expired, malformed, or
    /// wrong-purpose tokens. The message never distinguishes which.
    pub fn verify_intermediate(&self, token: &str) -> Result<String> {
        let data = decode::<IntermediateClaims>(token, &self.decoding, &Validation::default())
            .map_err(|_| Error::Unauthorized("invalid or expired token".to_string()))?;
        if data.claims.purpose != TOTP_PURPOSE {
            return Err(Error::Unauthorized("invalid or expired token".to_string()));
        }
        Ok(data.claims.sub)
    }

    /// Mint an 8-hour session token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if signing fails.
    pub fn mint_session(
        &self,
        user_id: &str,
        email: &str,
        role: Role,
        totp_verified: bool,
    ) -> Result<(String, SessionClaims)> {
        let now = Timestamp::now().unix_millis() / 1000;
        let claims = SessionClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            totp_verified,
            sid: peanut_crypto::random_id(),
            iat: now,
            exp: now + SESSION_TTL_SECS,
        };
        let token = encode(&Header::default(), &claims, &self.encoding).map_err(Error::internal)?;
        Ok((token, claims))
    }

    /// Verify a session token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] for expired or malformed
    /// tokens, and for intermediate tokens presented as sessions.
    pub fn verify_session(&self, token: &str) -> Result<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding, &Validation::default())
            .map_err(|_| Error::Unauthorized("invalid or expired session".to_string()))?;
        Ok(data.claims)
    }
}
