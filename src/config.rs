//! Platform configuration: app credentials and endpoint base URLs.
//!
//! Constructed once, shared read-only as `Arc<FaceplateConfig>`. The URL
//! fields exist so tests can point at a mock server; production code leaves
//! them at the defaults.

use std::env;

const GRAPH_URL: &str = "https://graph.facebook.com";
const API_URL: &str = "https://api.facebook.com";

/// Facebook app credentials plus endpoint base URLs.
#[derive(Debug, Clone)]
pub struct FaceplateConfig {
    pub app_id: String,
    pub secret: String,
    /// Graph API base, normally `https://graph.facebook.com`.
    pub graph_url: String,
    /// Legacy REST API base (FQL), normally `https://api.facebook.com`.
    pub api_url: String,
}

impl FaceplateConfig {
    pub fn new(app_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            secret: secret.into(),
            graph_url: GRAPH_URL.into(),
            api_url: API_URL.into(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Required: `FACEBOOK_APP_ID`, `FACEBOOK_SECRET`. The base URLs can be
    /// overridden with `FACEBOOK_GRAPH_URL` and `FACEBOOK_API_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            app_id: required_env("FACEBOOK_APP_ID")?,
            secret: required_env("FACEBOOK_SECRET")?,
            graph_url: env::var("FACEBOOK_GRAPH_URL").unwrap_or_else(|_| GRAPH_URL.into()),
            api_url: env::var("FACEBOOK_API_URL").unwrap_or_else(|_| API_URL.into()),
        })
    }

    /// OAuth token endpoint, used for both the authorization-code exchange
    /// and the client-credentials app-token exchange.
    pub fn token_url(&self) -> String {
        format!("{}/oauth/access_token", self.graph_url)
    }

    /// Graph API URL for a path like `/me`.
    pub fn graph(&self, path: &str) -> String {
        format!("{}{}", self.graph_url, path)
    }

    /// Legacy REST endpoint for an FQL method (`fql.query` / `fql.multiquery`).
    pub fn fql_url(&self, method: &str) -> String {
        format!("{}/method/{}", self.api_url, method)
    }

    /// Name of the cookie the platform sets for this app.
    pub fn cookie_name(&self) -> String {
        format!("fbsr_{}", self.app_id)
    }
}

/// Configuration for testing — all fields settable directly.
impl FaceplateConfig {
    pub fn test_default() -> Self {
        Self::new("123456789", "test-app-secret")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),
}

fn required_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnv(key.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_creates_valid_config() {
        let cfg = FaceplateConfig::test_default();
        assert_eq!(cfg.app_id, "123456789");
        assert_eq!(cfg.graph_url, "https://graph.facebook.com");
        assert_eq!(cfg.api_url, "https://api.facebook.com");
    }

    #[test]
    fn test_derived_urls() {
        let cfg = FaceplateConfig::test_default();
        assert_eq!(
            cfg.token_url(),
            "https://graph.facebook.com/oauth/access_token"
        );
        assert_eq!(cfg.graph("/me"), "https://graph.facebook.com/me");
        assert_eq!(
            cfg.fql_url("fql.multiquery"),
            "https://api.facebook.com/method/fql.multiquery"
        );
        assert_eq!(cfg.cookie_name(), "fbsr_123456789");
    }

    #[test]
    fn test_from_env_missing_required() {
        // SAFETY: no other thread in this test binary reads this variable.
        unsafe { env::remove_var("FACEBOOK_APP_ID") };
        let result = FaceplateConfig::from_env();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("FACEBOOK_APP_ID"));
    }
}
