// Shared transport configuration for building reqwest::Client instances.
//
// The JSON client is the only HTTP consumer; credentials are attached per
// request (basic auth), so the client itself only carries timeout and
// user-agent settings.

use std::time::Duration;

/// Default HTTP request timeout used by the controller.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(3);

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HTTP_TIMEOUT,
            user_agent: concat!("hs3-rs/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl TransportConfig {
    /// Config with a custom request timeout and the default user agent.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .build()
            .map_err(crate::error::Error::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_three_seconds() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert!(config.user_agent.starts_with("hs3-rs/"));
    }

    #[test]
    fn builds_client_with_custom_timeout() {
        let config = TransportConfig::with_timeout(Duration::from_millis(250));
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert!(config.build_client().is_ok());
    }
}
