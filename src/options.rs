use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::{ActitoError, Result};

/// Default Actito services endpoint.
pub const DEFAULT_SERVICES_URL: &str = "https://push.notifica.re";

/// Configures HTTP timeout and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActitoOptions {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Delay before the first retry in milliseconds.
    pub retry_initial_delay_ms: u64,
    /// Multiplier applied to the delay for every further retry.
    pub retry_backoff_factor: u32,
}

impl Default for ActitoOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 5,
            retry_initial_delay_ms: 500,
            retry_backoff_factor: 2,
        }
    }
}

impl ActitoOptions {
    /// Delay to wait before retry number `attempt` (0-based).
    pub fn retry_delay(&self, attempt: usize) -> Duration {
        let exp = attempt.min(16) as u32;
        let multiplier = u64::from(self.retry_backoff_factor).saturating_pow(exp);
        Duration::from_millis(self.retry_initial_delay_ms.saturating_mul(multiplier))
    }
}

/// Application credentials and endpoint used by every request.
#[derive(Clone)]
pub struct ActitoConfig {
    pub application_key: String,
    pub application_secret: String,
    pub services_url: String,
    pub options: ActitoOptions,
}

impl fmt::Debug for ActitoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActitoConfig")
            .field("application_key", &self.application_key)
            .field("application_secret", &"<redacted>")
            .field("services_url", &self.services_url)
            .field("options", &self.options)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct ServicesFile {
    application_key: Option<String>,
    application_secret: Option<String>,
    #[serde(default)]
    services_url: Option<String>,
}

impl ActitoConfig {
    /// Creates a config for the default services endpoint.
    pub fn new(application_key: impl Into<String>, application_secret: impl Into<String>) -> Self {
        Self {
            application_key: application_key.into(),
            application_secret: application_secret.into(),
            services_url: DEFAULT_SERVICES_URL.to_owned(),
            options: ActitoOptions::default(),
        }
    }

    /// Overrides the services endpoint, e.g. for a test environment.
    pub fn with_services_url(mut self, url: impl Into<String>) -> Self {
        self.services_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Applies timeout and retry options.
    pub fn with_options(mut self, options: ActitoOptions) -> Self {
        self.options = options;
        self
    }

    /// Creates a config from environment variables.
    ///
    /// Reads:
    /// - `ACTITO_APPLICATION_KEY`
    /// - `ACTITO_APPLICATION_SECRET`
    /// - `ACTITO_SERVICES_URL` (optional)
    ///
    /// Returns an error if a required variable is missing or empty.
    pub fn from_env() -> Result<Self> {
        let key = required_env("ACTITO_APPLICATION_KEY")?;
        let secret = required_env("ACTITO_APPLICATION_SECRET")?;
        let config = Self::new(key, secret);
        match std::env::var("ACTITO_SERVICES_URL") {
            Ok(url) if !url.trim().is_empty() => Ok(config.with_services_url(url.trim())),
            _ => Ok(config),
        }
    }

    /// Parses an `ActitoServices.json` document.
    ///
    /// ```
    /// use actito_sdk::ActitoConfig;
    ///
    /// let config = ActitoConfig::from_json_str(
    ///     r#"{ "APPLICATION_KEY": "key", "APPLICATION_SECRET": "secret" }"#,
    /// ).unwrap();
    /// assert_eq!(config.application_key, "key");
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let parsed: ServicesFile = serde_json::from_str(json)
            .map_err(|err| ActitoError::Config(format!("invalid services file: {err}")))?;
        let key = non_empty(parsed.application_key, "APPLICATION_KEY")?;
        let secret = non_empty(parsed.application_secret, "APPLICATION_SECRET")?;
        let config = Self::new(key, secret);
        Ok(match parsed.services_url {
            Some(url) if !url.trim().is_empty() => config.with_services_url(url.trim()),
            _ => config,
        })
    }
}

fn required_env(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .map_err(|_| ActitoError::Config(format!("missing {name} environment variable")))?;
    if value.trim().is_empty() {
        return Err(ActitoError::Config(format!("{name} is set but empty")));
    }
    Ok(value.trim().to_owned())
}

fn non_empty(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
        _ => Err(ActitoError::Config(format!("missing {field} in services file"))),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ActitoConfig, ActitoOptions, DEFAULT_SERVICES_URL};
    use crate::ActitoError;

    #[test]
    fn retry_delay_doubles_from_initial() {
        let options = ActitoOptions::default();
        assert_eq!(options.retry_delay(0), Duration::from_millis(500));
        assert_eq!(options.retry_delay(1), Duration::from_millis(1_000));
        assert_eq!(options.retry_delay(4), Duration::from_millis(8_000));
    }

    #[test]
    fn services_file_requires_credentials() {
        let err = ActitoConfig::from_json_str(r#"{ "APPLICATION_KEY": "key" }"#)
            .expect_err("secret is required");
        assert!(matches!(err, ActitoError::Config(_)));
    }

    #[test]
    fn services_file_defaults_url_and_trims_trailing_slash() {
        let config =
            ActitoConfig::from_json_str(r#"{ "APPLICATION_KEY": "k", "APPLICATION_SECRET": "s" }"#)
                .expect("must parse");
        assert_eq!(config.services_url, DEFAULT_SERVICES_URL);

        let config = config.with_services_url("http://localhost:8080/");
        assert_eq!(config.services_url, "http://localhost:8080");
    }

    #[test]
    fn debug_redacts_secret() {
        let config = ActitoConfig::new("key", "very-secret");
        let debug = format!("{config:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("very-secret"));
    }
}
