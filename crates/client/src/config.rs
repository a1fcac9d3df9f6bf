//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `TAJA_API_BASE_URL` - Backend base URL (default: `http://127.0.0.1:4000`)
//! - `TAJA_DATA_DIR` - Directory for the local and session stores (default: `.taja-haat`)
//! - `IDENTITY_API_KEY` - Identity provider web API key (required for register/login)
//! - `IDENTITY_BASE_URL` - Identity Toolkit base URL
//! - `IMGBB_API_KEY` - Image host API key; without it uploads fall back to avatars
//! - `IMGBB_UPLOAD_URL` - Image host upload endpoint
//! - `SMS_API_KEY` / `SMS_SENDER_ID` - Messaging gateway credentials; both or neither
//! - `SMS_API_URL` - Messaging gateway endpoint
//! - `FORECAST_API_KEY` - LLM API key; without it forecasts use canned data
//! - `FORECAST_MODEL` - LLM model name
//! - `FORECAST_API_URL` - LLM Messages API endpoint

use std::collections::HashMap;
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:4000";
const DEFAULT_DATA_DIR: &str = ".taja-haat";
const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_IMGBB_UPLOAD_URL: &str = "https://api.imgbb.com/1/upload";
const DEFAULT_SMS_API_URL: &str = "http://bulksmsbd.net/api/smsapi";
const DEFAULT_FORECAST_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_FORECAST_MODEL: &str = "claude-3-5-haiku-latest";

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "api-key-here",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL
    pub api_base_url: Url,
    /// Where `local.json` and `session.json` live
    pub data_dir: PathBuf,
    pub identity: Option<IdentityConfig>,
    pub imgbb: Option<ImgbbConfig>,
    pub sms: Option<SmsConfig>,
    pub forecast: Option<ForecastConfig>,
}

/// Identity provider settings.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub api_key: SecretString,
    pub base_url: Url,
}

/// Image host settings.
#[derive(Debug, Clone)]
pub struct ImgbbConfig {
    pub api_key: SecretString,
    pub upload_url: Url,
}

/// Messaging gateway settings.
#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub api_key: SecretString,
    pub sender_id: String,
    pub api_url: Url,
}

/// Forecast LLM settings.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub api_key: SecretString,
    pub model: String,
    pub api_url: Url,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a URL does not parse, if only half of the
    /// messaging credentials are set, or if an API key looks like a
    /// placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let api_base_url = env.url_or_default("TAJA_API_BASE_URL", DEFAULT_API_BASE_URL)?;
        let data_dir = PathBuf::from(env.or_default("TAJA_DATA_DIR", DEFAULT_DATA_DIR));

        let identity = env
            .validated_secret("IDENTITY_API_KEY")?
            .map(|api_key| -> Result<_, ConfigError> {
                Ok(IdentityConfig {
                    api_key,
                    base_url: env.url_or_default("IDENTITY_BASE_URL", DEFAULT_IDENTITY_BASE_URL)?,
                })
            })
            .transpose()?;

        let imgbb = env
            .validated_secret("IMGBB_API_KEY")?
            .map(|api_key| -> Result<_, ConfigError> {
                Ok(ImgbbConfig {
                    api_key,
                    upload_url: env.url_or_default("IMGBB_UPLOAD_URL", DEFAULT_IMGBB_UPLOAD_URL)?,
                })
            })
            .transpose()?;

        let sms = match (env.validated_secret("SMS_API_KEY")?, env.optional("SMS_SENDER_ID")) {
            (Some(api_key), Some(sender_id)) => Some(SmsConfig {
                api_key,
                sender_id,
                api_url: env.url_or_default("SMS_API_URL", DEFAULT_SMS_API_URL)?,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingEnvVar("SMS_SENDER_ID".to_string())),
            (None, Some(_)) => return Err(ConfigError::MissingEnvVar("SMS_API_KEY".to_string())),
        };

        let forecast = env
            .validated_secret("FORECAST_API_KEY")?
            .map(|api_key| -> Result<_, ConfigError> {
                Ok(ForecastConfig {
                    api_key,
                    model: env.or_default("FORECAST_MODEL", DEFAULT_FORECAST_MODEL),
                    api_url: env.url_or_default("FORECAST_API_URL", DEFAULT_FORECAST_API_URL)?,
                })
            })
            .transpose()?;

        Ok(Self {
            api_base_url,
            data_dir,
            identity,
            imgbb,
            sms,
            forecast,
        })
    }

    /// The identity settings, or an error naming the missing key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` when `IDENTITY_API_KEY` is unset.
    pub fn require_identity(&self) -> Result<&IdentityConfig, ConfigError> {
        self.identity
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("IDENTITY_API_KEY".to_string()))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get an optional variable; blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn url_or_default(&self, key: &str, default: &str) -> Result<Url, ConfigError> {
        Url::parse(&self.or_default(key, default))
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    fn validated_secret(&self, key: &str) -> Result<Option<SecretString>, ConfigError> {
        self.optional(key)
            .map(|value| {
                validate_secret_strength(&value, key)?;
                Ok(SecretString::from(value))
            })
            .transpose()
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // Key lengths are tiny
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject placeholder values and obviously non-random keys.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}
