// ── Runtime connection configuration ──
//
// Describes *how* to reach one HS3 controller. Carries credentials and
// timing knobs but never touches disk; hs3-config (or the caller) builds
// a `ControllerConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;

use hs3_api::{
    DEFAULT_ASCII_PORT, DEFAULT_HTTP_PORT, DEFAULT_HTTP_TIMEOUT, ListenerConfig, ListenerTimings,
    TransportConfig,
};

/// Username the controller ships with.
pub const DEFAULT_USERNAME: &str = "default";
/// Password the controller ships with.
pub const DEFAULT_PASSWORD: &str = "default";

/// Configuration for connecting to a single controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Hostname or IP address of the controller.
    pub host: String,
    /// Port of the `/JSON` web endpoint (default 80).
    pub http_port: u16,
    /// Port of the ASCII event socket (default 11000).
    pub ascii_port: u16,
    pub username: String,
    pub password: SecretString,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Connect, login, keep-alive, and backoff timings for the listener.
    pub listener: ListenerTimings,
}

impl ControllerConfig {
    /// Config for `host` with every other field at its default.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.username = username.into();
        self.password = password;
        self
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig::with_timeout(self.timeout)
    }

    pub(crate) fn listener_config(&self) -> ListenerConfig {
        ListenerConfig::new(
            self.host.clone(),
            self.ascii_port,
            self.username.clone(),
            self.password.clone(),
        )
        .with_timings(self.listener.clone())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            http_port: DEFAULT_HTTP_PORT,
            ascii_port: DEFAULT_ASCII_PORT,
            username: DEFAULT_USERNAME.into(),
            password: SecretString::from(DEFAULT_PASSWORD.to_string()),
            timeout: DEFAULT_HTTP_TIMEOUT,
            listener: ListenerTimings::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn defaults_match_factory_controller() {
        let config = ControllerConfig::new("192.168.1.20");
        assert_eq!(config.host, "192.168.1.20");
        assert_eq!(config.http_port, 80);
        assert_eq!(config.ascii_port, 11000);
        assert_eq!(config.username, "default");
        assert_eq!(config.password.expose_secret(), "default");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn listener_config_carries_credentials_and_timings() {
        let mut config = ControllerConfig::new("hs3.local")
            .with_credentials("admin", SecretString::from("hunter2".to_string()));
        config.listener.reconnect_delay = Duration::from_millis(250);

        let listener = config.listener_config();
        assert_eq!(listener.host, "hs3.local");
        assert_eq!(listener.port, 11000);
        assert_eq!(listener.username, "admin");
        assert_eq!(listener.password.expose_secret(), "hunter2");
        assert_eq!(listener.timings.reconnect_delay, Duration::from_millis(250));
    }
}
