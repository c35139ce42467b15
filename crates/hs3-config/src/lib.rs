//! Configuration profiles for hs3 consumers.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `hs3_core::ControllerConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use hs3_core::{ControllerConfig, DEFAULT_PASSWORD, DEFAULT_USERNAME, ListenerTimings};

const KEYRING_SERVICE: &str = "hs3";
const ENV_PREFIX: &str = "HS3_";
const PASSWORD_ENV: &str = "HS3_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found")]
    ProfileNotFound { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named controller profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name, p))
            .ok_or_else(|| ConfigError::ProfileNotFound {
                profile: name.into(),
            })
    }
}

/// Values applied to every profile unless it overrides them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Listener keep-alive period in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,

    /// Listener reconnect backoff in seconds.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            ping_interval: default_ping_interval(),
            reconnect_delay: default_reconnect_delay(),
        }
    }
}

fn default_timeout() -> u64 {
    3
}
fn default_ping_interval() -> u64 {
    120
}
fn default_reconnect_delay() -> u64 {
    10
}

/// A named controller profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Controller hostname or IP address.
    pub host: String,

    /// Override the JSON API port.
    pub http_port: Option<u16>,

    /// Override the ASCII socket port.
    pub ascii_port: Option<u16>,

    pub username: Option<String>,

    /// Password in plaintext; prefer keyring or env var.
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Override the HTTP timeout (seconds).
    pub timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "hs3", "hs3").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("hs3");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` layered over defaults, then `HS3_` env overrides.
///
/// A missing file is not an error. Nested keys use a double underscore
/// (`HS3_DEFAULTS__TIMEOUT=5`) so field names keep their underscores.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the password for a profile.
///
/// Order: the profile's `password_env` variable, `HS3_PASSWORD`, the
/// system keyring (`hs3` / `<profile>/password`), the plaintext value,
/// and finally the controller's factory default. A profile that names a
/// `password_env` never falls back to the factory default.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_password_from(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        |account| {
            keyring::Entry::new(KEYRING_SERVICE, account)
                .and_then(|entry| entry.get_password())
                .ok()
        },
    )
}

fn resolve_password_from(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(val) = profile.password_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(val));
    }

    // 2. Global env var
    if let Some(val) = env(PASSWORD_ENV) {
        return Ok(SecretString::from(val));
    }

    // 3. System keyring
    if let Some(secret) = keyring(&format!("{profile_name}/password")) {
        return Ok(SecretString::from(secret));
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    if profile.password_env.is_some() {
        return Err(ConfigError::NoCredentials {
            profile: profile_name.into(),
        });
    }
    Ok(SecretString::from(DEFAULT_PASSWORD.to_string()))
}

/// Build a `ControllerConfig` from a profile and the global defaults.
pub fn profile_to_controller_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ControllerConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: format!("profile '{profile_name}' has no host"),
        });
    }

    let timeout = profile.timeout.unwrap_or(defaults.timeout);
    for (field, secs) in [
        ("timeout", timeout),
        ("ping_interval", defaults.ping_interval),
        ("reconnect_delay", defaults.reconnect_delay),
    ] {
        if secs == 0 {
            return Err(ConfigError::Validation {
                field: field.into(),
                reason: "must be at least 1 second".into(),
            });
        }
    }

    let password = resolve_password(profile, profile_name)?;
    let username = profile
        .username
        .clone()
        .unwrap_or_else(|| DEFAULT_USERNAME.into());

    let mut config = ControllerConfig::new(profile.host.trim()).with_credentials(username, password);
    if let Some(port) = profile.http_port {
        config.http_port = port;
    }
    if let Some(port) = profile.ascii_port {
        config.ascii_port = port;
    }
    config.timeout = Duration::from_secs(timeout);
    config.listener = ListenerTimings {
        ping_interval: Duration::from_secs(defaults.ping_interval),
        reconnect_delay: Duration::from_secs(defaults.reconnect_delay),
        ..ListenerTimings::default()
    };
    Ok(config)
}
