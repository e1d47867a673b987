//! RFC 6238 time-based one-time passwords.
//!
//! SHA-1 HMAC, 6 digits, 30-second step, verification window of ±1
//! step. Secrets are 20 random bytes carried as unpadded RFC 4648
//! base32.

use hmac::{Hmac, Mac};
use sha1::Sha1;

use peanut_crypto::{random_bytes, random_hex_upper};

const STEP_SECS: u64 = 30;
const DIGITS: u32 = 6;
const WINDOW: i64 = 1;
const SECRET_LEN: usize = 20;
const BACKUP_CODE_COUNT: usize = 10;

/// Generate a fresh base32 TOTP secret.
pub(crate) fn generate_secret() -> String {
    let bytes = random_bytes::<SECRET_LEN>();
    base32::encode(base32::Alphabet::RFC4648 { padding: false }, &bytes)
}

/// Mint the standard set of one-shot backup codes (8 uppercase hex).
pub(crate) fn generate_backup_codes() -> Vec<String> {
    (0..BACKUP_CODE_COUNT).map(|_| random_hex_upper(4)).collect()
}

/// The `otpauth://` provisioning URI for authenticator apps.
pub(crate) fn otpauth_url(issuer: &str, email: &str, secret: &str) -> String {
    format!(
        "otpauth://totp/{issuer}:{email}?secret={secret}&issuer={issuer}\
         &algorithm=SHA1&digits={DIGITS}&period={STEP_SECS}"
    )
}

/// Render a provisioning URI as an SVG QR data URL.
pub(crate) fn qr_data_url(otpauth: &str) -> Option<String> {
    use base64::Engine;

    let code = qrcode::QrCode::new(otpauth.as_bytes()).ok()?;
    let svg = code.render::<qrcode::render::svg::Color<'_>>().build();
    let encoded = base64::engine::general_purpose::STANDARD.encode(svg);
    Some(format!("data:image/svg+xml;base64,{encoded}"))
}

/// Verify a 6-digit code against the secret within ±1 step of now.
pub(crate) fn verify(secret_b32: &str, code: &str) -> bool {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    verify_at(secret_b32, code, now)
}

/// Verification against an explicit clock (for tests).
pub(crate) fn verify_at(secret_b32: &str, code: &str, unix_secs: u64) -> bool {
    if code.len() != DIGITS as usize || !code.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let Some(key) = base32::decode(base32::Alphabet::RFC4648 { padding: false }, secret_b32)
    else {
        return false;
    };

    let counter = i64::try_from(unix_secs / STEP_SECS).unwrap_or(0);
    (-WINDOW..=WINDOW).any(|offset| {
        let Ok(step) = u64::try_from(counter.saturating_add(offset)) else {
            return false;
        };
        hotp(&key, step).is_some_and(|expected| expected == code)
    })
}

/// The code for an explicit clock (test helper; the gateway itself
/// only verifies).
#[cfg(test)]
pub(crate) fn code_at(secret_b32: &str, unix_secs: u64) -> Option<String> {
    let key = base32::decode(base32::Alphabet::RFC4648 { padding: false }, secret_b32)?;
    hotp(&key, unix_secs / STEP_SECS)
}

/// RFC 4226 HOTP with dynamic truncation.
fn hotp(key: &[u8], counter: u64) -> Option<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key).ok()?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = usize::from(digest[19] & 0x0f);
    let binary = (u32::from(digest[offset]) & 0x7f) << 24
        | u32::from(digest[offset + 1]) << 16
        | u32::from(digest[offset + 2]) << 8
        | u32::from(digest[offset + 3]);

    let code = binary % 10u32.pow(DIGITS);
    Some(format!("{code:06}"))
}
