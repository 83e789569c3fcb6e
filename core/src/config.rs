//! Client configuration

use std::time::Duration;

use crate::auth::AuthStrategy;
use crate::error::{ApiError, Result};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// SSC client build number reported on upload and download URLs.
pub const DEFAULT_CLIENT_VERSION: &str = "17.10.0158";

/// Client configuration
///
/// Handed to [`SscClient`](crate::SscClient) by value; the client never
/// changes it afterwards.
#[derive(Clone, Debug)]
pub struct Config {
    /// Server base URL, e.g. `https://ssc.example.com:8443`
    pub host: String,
    /// Credentials attached to every request
    pub auth: AuthStrategy,
    /// Verify the server's TLS certificate
    pub verify_ssl: bool,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Client build number sent to the upload/download endpoints
    pub client_version: String,
    /// Largest response body read for non-streamed calls; `None` is unlimited
    pub max_body_size: Option<u64>,
}

impl Config {
    /// Create an unauthenticated config for `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            auth: AuthStrategy::None,
            verify_ssl: true,
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("ssc-core/{}", env!("CARGO_PKG_VERSION")),
            client_version: DEFAULT_CLIENT_VERSION.to_string(),
            max_body_size: None,
        }
    }

    /// Authenticate with HTTP basic credentials. Replaces any token.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = AuthStrategy::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Authenticate with an SSC token. Replaces any basic credentials.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthStrategy::Token(token.into());
        self
    }

    pub fn with_verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_client_version(mut self, client_version: impl Into<String>) -> Self {
        self.client_version = client_version.into();
        self
    }

    pub fn with_max_body_size(mut self, bytes: u64) -> Self {
        self.max_body_size = Some(bytes);
        self
    }

    /// Build a config from `SSC_*` environment variables.
    ///
    /// - `SSC_URL` (required)
    /// - `SSC_USERNAME` + `SSC_PASSWORD`, or `SSC_TOKEN`
    /// - `SSC_VERIFY_SSL` (`true`/`false`/`1`/`0`)
    /// - `SSC_TIMEOUT_SECS`
    /// - `SSC_USER_AGENT`, `SSC_CLIENT_VERSION`
    /// - `SSC_MAX_BODY_SIZE` (bytes)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("SSC_URL")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::Config("SSC_URL is not set".to_string()))?;
        let mut config = Config::new(host);

        // A username wins over a token when both are present.
        if let Some(username) = lookup("SSC_USERNAME") {
            let password = lookup("SSC_PASSWORD").unwrap_or_default();
            config = config.with_basic_auth(username, password);
        } else if let Some(token) = lookup("SSC_TOKEN") {
            config = config.with_token(token);
        }

        if let Some(raw) = lookup("SSC_VERIFY_SSL") {
            config.verify_ssl = parse_bool(&raw)
                .ok_or_else(|| ApiError::Config(format!("SSC_VERIFY_SSL: not a boolean: {raw:?}")))?;
        }
        if let Some(raw) = lookup("SSC_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ApiError::Config(format!("SSC_TIMEOUT_SECS: not a number: {raw:?}")))?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(user_agent) = lookup("SSC_USER_AGENT") {
            config.user_agent = user_agent;
        }
        if let Some(client_version) = lookup("SSC_CLIENT_VERSION") {
            config.client_version = client_version;
        }
        if let Some(raw) = lookup("SSC_MAX_BODY_SIZE") {
            let bytes = raw
                .trim()
                .parse()
                .map_err(|_| ApiError::Config(format!("SSC_MAX_BODY_SIZE: not a number: {raw:?}")))?;
            config.max_body_size = Some(bytes);
        }

        Ok(config)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
