//! Configuration module for environment variable parsing.
//!
//! Everything is read once at startup. Secrets are kept out of `Debug`.

use std::env;
use std::fmt;

use anyhow::{bail, Context, Result};
use tracing::warn;

use crate::crypto::{AesKey, KeyRing};
use crate::endpoint::{EndpointSettings, InvalidRequestMode};

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Signing token shared with the platform
    pub token: Option<String>,

    /// App id bound into encrypted frames
    pub app_id: Option<String>,

    /// Original account id, the expected recipient of every message
    pub original_id: Option<String>,

    /// Current 43-character EncodingAESKey; enables secure mode
    pub encoding_aes_key: Option<String>,

    /// EncodingAESKey retired by the last rotation
    pub previous_encoding_aes_key: Option<String>,

    /// Route the platform calls
    pub callback_path: String,

    /// Answer for requests that fail verification
    pub invalid_request_mode: InvalidRequestMode,

    /// Request body cap in bytes
    pub max_body_bytes: usize,

    /// Scratch buffers kept for reuse
    pub scratch_pool_size: usize,

    /// Bearer token for the key rotation route; the route is off when unset
    pub admin_token: Option<String>,

    // =========================================================================
    // Default auto-replies
    // =========================================================================

    /// Text reply on subscribe
    pub welcome_text: Option<String>,

    /// Echo text messages back to the sender
    pub echo_text: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),

            token: non_empty("WX_TOKEN"),

            app_id: non_empty("WX_APP_ID"),

            original_id: non_empty("WX_ORIGINAL_ID"),

            encoding_aes_key: non_empty("WX_ENCODING_AES_KEY"),

            previous_encoding_aes_key: non_empty("WX_PREVIOUS_ENCODING_AES_KEY"),

            callback_path: non_empty("WX_CALLBACK_PATH")
                .map(|path| {
                    if path.starts_with('/') {
                        path
                    } else {
                        format!("/{}", path)
                    }
                })
                .unwrap_or_else(|| "/wx/callback".to_string()),

            invalid_request_mode: non_empty("WX_INVALID_REQUEST_MODE")
                .and_then(|raw| match raw.parse() {
                    Ok(mode) => Some(mode),
                    Err(e) => {
                        warn!(env_var = "WX_INVALID_REQUEST_MODE", error = %e, "Invalid value, using default");
                        None
                    }
                })
                .unwrap_or_default(),

            max_body_bytes: env::var("WX_MAX_BODY_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(64 * 1024),

            scratch_pool_size: env::var("WX_SCRATCH_POOL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(64),

            admin_token: non_empty("ADMIN_TOKEN"),

            welcome_text: non_empty("WX_WELCOME_TEXT"),

            echo_text: parse_bool("WX_ECHO_TEXT", false),
        }
    }

    /// Identity the endpoint authenticates against. Token and original id
    /// are required; the app id only when secure mode is enabled.
    pub fn endpoint_settings(&self) -> Result<EndpointSettings> {
        let token = self.token.clone().context("WX_TOKEN is required")?;
        let original_id = self
            .original_id
            .clone()
            .context("WX_ORIGINAL_ID is required")?;
        let app_id = match (&self.app_id, &self.encoding_aes_key) {
            (Some(app_id), _) => app_id.clone(),
            (None, Some(_)) => bail!("WX_APP_ID is required when WX_ENCODING_AES_KEY is set"),
            (None, None) => String::new(),
        };

        Ok(EndpointSettings {
            token,
            app_id,
            original_id,
        })
    }

    /// Key ring from the configured EncodingAESKeys, `None` in plain-only mode.
    pub fn keyring(&self) -> Result<Option<KeyRing>> {
        let current = match &self.encoding_aes_key {
            Some(encoded) => AesKey::from_encoding_aes_key(encoded)
                .context("WX_ENCODING_AES_KEY is not a valid EncodingAESKey")?,
            None => {
                if self.previous_encoding_aes_key.is_some() {
                    warn!("WX_PREVIOUS_ENCODING_AES_KEY ignored without WX_ENCODING_AES_KEY");
                }
                return Ok(None);
            }
        };

        let previous = self
            .previous_encoding_aes_key
            .as_deref()
            .map(AesKey::from_encoding_aes_key)
            .transpose()
            .context("WX_PREVIOUS_ENCODING_AES_KEY is not a valid EncodingAESKey")?;

        Ok(Some(KeyRing::with_previous(current, previous)))
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("token_configured", &self.token.is_some())
            .field("app_id", &self.app_id)
            .field("original_id", &self.original_id)
            .field("secure_mode", &self.encoding_aes_key.is_some())
            .field("previous_key_configured", &self.previous_encoding_aes_key.is_some())
            .field("callback_path", &self.callback_path)
            .field("invalid_request_mode", &self.invalid_request_mode)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("scratch_pool_size", &self.scratch_pool_size)
            .field("admin_configured", &self.admin_token.is_some())
            .field("welcome_text", &self.welcome_text)
            .field("echo_text", &self.echo_text)
            .finish()
    }
}

/// Read a variable, treating blank values as unset.
fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(env_var = name, value = %raw, "Invalid boolean, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "jWmYm7qr5nMoAUwZRjGtBxmz3KA1tkAj3ykkR6q2B2C";

    fn config() -> Config {
        Config {
            port: 8080,
            token: Some("abc".to_string()),
            app_id: Some("wxabcdef0123456789".to_string()),
            original_id: Some("gh_0123456789ab".to_string()),
            encoding_aes_key: None,
            previous_encoding_aes_key: None,
            callback_path: "/wx/callback".to_string(),
            invalid_request_mode: InvalidRequestMode::Silent,
            max_body_bytes: 65536,
            scratch_pool_size: 64,
            admin_token: None,
            welcome_text: None,
            echo_text: false,
        }
    }

    #[test]
    fn test_non_empty() {
        env::set_var("TEST_WX_NON_EMPTY", "  value ");
        assert_eq!(non_empty("TEST_WX_NON_EMPTY"), Some("value".to_string()));
        env::set_var("TEST_WX_NON_EMPTY", "   ");
        assert_eq!(non_empty("TEST_WX_NON_EMPTY"), None);
        env::remove_var("TEST_WX_NON_EMPTY");
    }

    #[test]
    fn test_parse_bool() {
        env::set_var("TEST_WX_BOOL", "Yes");
        assert!(parse_bool("TEST_WX_BOOL", false));
        env::set_var("TEST_WX_BOOL", "maybe");
        assert!(!parse_bool("TEST_WX_BOOL", false));
        env::remove_var("TEST_WX_BOOL");
        assert!(parse_bool("TEST_WX_BOOL", true));
    }

    #[test]
    fn test_endpoint_settings_requires_token() {
        let mut config = config();
        config.token = None;
        assert!(config.endpoint_settings().is_err());
    }

    #[test]
    fn test_endpoint_settings_requires_app_id_in_secure_mode() {
        let mut config = config();
        config.app_id = None;
        assert_eq!(config.endpoint_settings().unwrap().app_id, "");

        config.encoding_aes_key = Some(KEY.to_string());
        assert!(config.endpoint_settings().is_err());
    }

    #[test]
    fn test_keyring_from_config() {
        let mut config = config();
        assert!(config.keyring().unwrap().is_none());

        config.encoding_aes_key = Some(KEY.to_string());
        let keyring = config.keyring().unwrap().unwrap();
        assert!(keyring.previous().is_none());

        config.previous_encoding_aes_key = Some("not a key".to_string());
        assert!(config.keyring().is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut config = config();
        config.encoding_aes_key = Some(KEY.to_string());
        config.admin_token = Some("hunter2".to_string());

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains(KEY));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("\"abc\""));
    }
}
