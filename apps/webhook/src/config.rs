use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::webhook::extract::Envelope;

/// What `POST /` does with an inbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookMode {
    /// Extract the candidate and upsert it into Vincere.
    Forward,
    /// Log the raw payload and acknowledge it. No validation, no downstream calls.
    Safe,
}

impl WebhookMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WebhookMode::Forward => "forward",
            WebhookMode::Safe => "safe",
        }
    }
}

impl FromStr for WebhookMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" => Ok(WebhookMode::Forward),
            "safe" => Ok(WebhookMode::Safe),
            other => Err(anyhow!("unknown webhook mode '{other}' (expected forward|safe)")),
        }
    }
}

/// Credentials and addressing for the Vincere tenant.
#[derive(Debug, Clone)]
pub struct VincereConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    /// Bare tenant host (`acme.vincere.io`) or a full base URL with scheme.
    pub domain: String,
    pub api_key: Option<String>,
    pub tenant_id: Option<String>,
}

impl VincereConfig {
    /// Base URL for candidate calls, without a trailing slash.
    pub fn base_url(&self) -> String {
        let domain = self.domain.trim().trim_end_matches('/');
        if domain.contains("://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        }
    }

    /// Value of the `tenantId` header; falls back to the domain.
    pub fn tenant_header(&self) -> &str {
        self.tenant_id.as_deref().unwrap_or(&self.domain)
    }
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub vincere: VincereConfig,
    pub session_secret: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub mode: WebhookMode,
    pub envelope: Envelope,
    pub decode_attachments: bool,
    /// Answer 200 on auth/downstream failures so RChilli stops retrying.
    pub ack_upstream_failures: bool,
    pub http_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let mode: WebhookMode = parse_env("WEBHOOK_MODE", WebhookMode::Forward)?;

        // Safe mode never talks to Vincere, so credentials are optional there.
        let vincere_var = |key: &str| -> Result<String> {
            match mode {
                WebhookMode::Forward => require_env(key),
                WebhookMode::Safe => Ok(optional_env(key).unwrap_or_default()),
            }
        };

        Ok(Config {
            vincere: VincereConfig {
                client_id: vincere_var("VINCERE_CLIENT_ID")?,
                client_secret: vincere_var("VINCERE_CLIENT_SECRET")?,
                auth_url: vincere_var("VINCERE_AUTH_URL")?,
                domain: vincere_var("VINCERE_DOMAIN")?,
                api_key: optional_env("VINCERE_API_KEY"),
                tenant_id: optional_env("VINCERE_TENANT_ID"),
            },
            session_secret: optional_env("SESSION_SECRET"),
            port: parse_env("PORT", 10000)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            mode,
            envelope: parse_env("RCHILLI_ENVELOPE", Envelope::Auto)?,
            decode_attachments: parse_bool_env("DECODE_ATTACHMENTS", true)?,
            ack_upstream_failures: parse_bool_env("ACK_UPSTREAM_FAILURES", false)?,
            http_timeout: Duration::from_secs(parse_env("HTTP_TIMEOUT_SECS", 30)?),
            max_body_bytes: parse_env("MAX_BODY_BYTES", 25 * 1024 * 1024)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow!("{key} has an invalid value '{raw}': {e}")),
        None => Ok(default),
    }
}

fn parse_bool_env(key: &str, default: bool) -> Result<bool> {
    match optional_env(key) {
        Some(raw) => parse_bool(&raw).with_context(|| format!("{key} must be a boolean")),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("'{other}' is not a boolean")),
    }
}

#[cfg(test)]
impl Config {
    /// Forward-mode config pointing both the token endpoint and the candidate
    /// API at `base_url` (typically a wiremock server).
    pub fn for_tests(base_url: &str) -> Self {
        Config {
            vincere: VincereConfig {
                client_id: "client-id".to_string(),
                client_secret: "client-secret".to_string(),
                auth_url: format!("{base_url}/oauth2/token"),
                domain: base_url.to_string(),
                api_key: None,
                tenant_id: Some("acme".to_string()),
            },
            session_secret: None,
            port: 0,
            rust_log: "debug".to_string(),
            mode: WebhookMode::Forward,
            envelope: Envelope::Auto,
            decode_attachments: true,
            ack_upstream_failures: false,
            http_timeout: Duration::from_secs(5),
            max_body_bytes: 25 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vincere(domain: &str, tenant_id: Option<&str>) -> VincereConfig {
        VincereConfig {
            client_id: String::new(),
            client_secret: String::new(),
            auth_url: String::new(),
            domain: domain.to_string(),
            api_key: None,
            tenant_id: tenant_id.map(String::from),
        }
    }

    #[test]
    fn test_base_url_adds_https_to_bare_domain() {
        assert_eq!(
            vincere("acme.vincere.io", None).base_url(),
            "https://acme.vincere.io"
        );
    }

    #[test]
    fn test_base_url_keeps_explicit_scheme() {
        assert_eq!(
            vincere("http://127.0.0.1:4000/", None).base_url(),
            "http://127.0.0.1:4000"
        );
    }

    #[test]
    fn test_tenant_header_falls_back_to_domain() {
        assert_eq!(vincere("acme.vincere.io", None).tenant_header(), "acme.vincere.io");
        assert_eq!(vincere("acme.vincere.io", Some("t-1")).tenant_header(), "t-1");
    }

    #[test]
    fn test_parse_bool_variants() {
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool(" on ").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_webhook_mode_parse() {
        assert_eq!("Safe".parse::<WebhookMode>().unwrap(), WebhookMode::Safe);
        assert_eq!("forward".parse::<WebhookMode>().unwrap(), WebhookMode::Forward);
        assert!("replay".parse::<WebhookMode>().is_err());
    }
}
