//! Typed configuration and its validation.

use std::path::PathBuf;

use crate::error::{ConfigError, ConfigResult};

/// Deployment environment; gates the `Secure` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development (cookies without `Secure`).
    #[default]
    Development,
    /// Production (cookies carry `Secure`).
    Production,
}

impl Environment {
    /// Whether session cookies must carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Validated gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// HMAC secret for session and intermediate tokens (≥ 32 bytes).
    pub session_secret: String,
    /// Hex-encoded vault master key material (64 hex chars).
    pub vault_key_hex: String,
    /// TCP port the HTTP boundary listens on.
    pub listen_port: u16,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Directory holding the embedded store.
    pub data_dir: PathBuf,
    /// Base log level (`error`..`trace`).
    pub log_level: String,
    /// Seed password for the initial admin account, if provided.
    pub default_admin_password: Option<String>,
    /// Deployment environment.
    pub environment: Environment,
}

impl GatewayConfig {
    /// Load and validate configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid variable.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_resolver(|var| std::env::var(var).ok())
    }

    /// Load from a custom variable resolver (for tests).
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid variable.
    pub fn from_resolver<F>(resolve: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let session_secret = resolve("SESSION_SECRET").ok_or(ConfigError::Missing("SESSION_SECRET"))?;
        if session_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "SESSION_SECRET",
                reason: format!("need at least 32 bytes, got {}", session_secret.len()),
            });
        }

        let vault_key_hex = resolve("VAULT_KEY_HEX").ok_or(ConfigError::Missing("VAULT_KEY_HEX"))?;
        if vault_key_hex.len() != 64 || !vault_key_hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::Invalid {
                var: "VAULT_KEY_HEX",
                reason: "expected exactly 64 hex characters".to_string(),
            });
        }

        let listen_port = match resolve("LISTEN_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: "LISTEN_PORT",
                reason: e.to_string(),
            })?,
            None => 8787,
        };

        let cors_origins = resolve("CORS_ORIGIN")
            .unwrap_or_else(|| "http://localhost:5173".to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        if cors_origins.is_empty() {
            return Err(ConfigError::Invalid {
                var: "CORS_ORIGIN",
                reason: "no origins after parsing".to_string(),
            });
        }

        let data_dir = PathBuf::from(resolve("DATA_DIR").unwrap_or_else(|| "./data".to_string()));

        let log_level = resolve("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let default_admin_password =
            resolve("DEFAULT_ADMIN_PASSWORD").filter(|pw| !pw.is_empty());

        let environment = match resolve("GATEWAY_ENV").as_deref() {
            None | Some("development") => Environment::Development,
            Some("production") => Environment::Production,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "GATEWAY_ENV",
                    reason: format!("expected development or production, got {other}"),
                });
            },
        };

        Ok(Self {
            session_secret,
            vault_key_hex,
            listen_port,
            cors_origins,
            data_dir,
            log_level,
            default_admin_password,
            environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env(var: &str) -> Option<String> {
        match var {
            "SESSION_SECRET" => Some("0123456789abcdef0123456789abcdef".to_string()),
            "VAULT_KEY_HEX" => Some("a0".repeat(32)),
            _ => None,
        }
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_resolver(base_env).unwrap();
        assert_eq!(config.listen_port, 8787);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.log_level, "info");
        assert!(config.default_admin_password.is_none());
        assert_eq!(config.environment, Environment::Development);
        assert!(!config.environment.secure_cookies());
    }

    #[test]
    fn test_missing_secret() {
        let result = GatewayConfig::from_resolver(|var| match var {
            "VAULT_KEY_HEX" => Some("a0".repeat(32)),
            _ => None,
        });
        assert!(matches!(result, Err(ConfigError::Missing("SESSION_SECRET"))));
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = GatewayConfig::from_resolver(|var| match var {
            "SESSION_SECRET" => Some("too-short".to_string()),
            other => base_env(other),
        });
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                var: "SESSION_SECRET",
                ..
            })
        ));
    }

    #[test]
    fn test_vault_key_must_be_64_hex() {
        let result = GatewayConfig::from_resolver(|var| match var {
            "VAULT_KEY_HEX" => Some("zz".repeat(32)),
            other => base_env(other),
        });
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                var: "VAULT_KEY_HEX",
                ..
            })
        ));
    }

    #[test]
    fn test_cors_csv() {
        let config = GatewayConfig::from_resolver(|var| match var {
            "CORS_ORIGIN" => Some("https://a.example, https://b.example".to_string()),
            other => base_env(other),
        })
        .unwrap();
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_production_env() {
        let config = GatewayConfig::from_resolver(|var| match var {
            "GATEWAY_ENV" => Some("production".to_string()),
            other => base_env(other),
        })
        .unwrap();
        assert!(config.environment.secure_cookies());

        let result = GatewayConfig::from_resolver(|var| match var {
            "GATEWAY_ENV" => Some("staging".to_string()),
            other => base_env(other),
        });
        assert!(result.is_err());
    }
}
