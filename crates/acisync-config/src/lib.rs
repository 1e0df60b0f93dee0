//! Configuration for the `acisync` binary.
//!
//! Layered loading (defaults, then a TOML/YAML/JSON file, then `ACI_*`,
//! `NETBOX_*` and `SYNC_*` environment variables), credential resolution
//! (environment, then system keyring, then plaintext), and translation to
//! the transport and engine settings the other crates consume.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use acisync_api::{TlsMode, TransportConfig};
use acisync_core::{PreloadFailure, SyncSettings};

/// Keyring service name for stored secrets.
pub const KEYRING_SERVICE: &str = "acisync";
pub const ACI_PASSWORD_ENV: &str = "ACI_PASSWORD";
pub const NETBOX_TOKEN_ENV: &str = "NETBOX_TOKEN";

const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {field} configured (set {env}, store it in the keyring, or add it to the config file)")]
    NoCredentials {
        field: &'static str,
        env: &'static str,
    },

    #[error("config file {} does not exist", path.display())]
    Missing { path: PathBuf },

    #[error("config file {} already exists", path.display())]
    AlreadyExists { path: PathBuf },

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

// ── Config structs ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub apic: ApicConfig,

    #[serde(default)]
    pub netbox: NetBoxConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

/// `[apic]`: the source fabric controller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApicConfig {
    /// Host name or URL. Bare hosts are reached over HTTPS.
    pub host: Option<String>,

    #[serde(default = "default_username")]
    pub username: String,

    /// Plaintext password. Prefer `ACI_PASSWORD` or the keyring.
    pub password: Option<String>,

    /// APICs usually carry self-signed certificates.
    #[serde(default)]
    pub verify_ssl: bool,

    /// PEM bundle trusted in addition to the system store when
    /// `verify_ssl` is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for ApicConfig {
    fn default() -> Self {
        Self {
            host: None,
            username: default_username(),
            password: None,
            verify_ssl: false,
            ca_cert: None,
            timeout: default_timeout(),
        }
    }
}

/// `[netbox]`: the destination inventory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetBoxConfig {
    pub url: Option<String>,

    /// Plaintext API token. Prefer `NETBOX_TOKEN` or the keyring.
    pub token: Option<String>,

    #[serde(default = "default_true")]
    pub verify_ssl: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for NetBoxConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            verify_ssl: true,
            ca_cert: None,
            timeout: default_timeout(),
        }
    }
}

/// `[sync]`: engine policy switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_true")]
    pub verify_updates: bool,

    #[serde(default = "default_true")]
    pub continue_on_error: bool,

    #[serde(default)]
    pub abort_run_on_fatal: bool,

    #[serde(default)]
    pub on_preload_failure: PreloadFailure,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            verify_updates: true,
            continue_on_error: true,
            abort_run_on_fatal: false,
            on_preload_failure: PreloadFailure::AbortKind,
        }
    }
}

fn default_username() -> String {
    "admin".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

/// Commented starting point written by `acisync config init`.
pub const DEFAULT_TOML: &str = r#"# acisync configuration
#
# Every key can be overridden from the environment: ACI_<KEY> for [apic],
# NETBOX_<KEY> for [netbox] and SYNC_<KEY> for [sync]. Secrets resolve from
# ACI_PASSWORD / NETBOX_TOKEN first, then the system keyring (service
# "acisync", accounts "apic/<username>" and "netbox/token"), then this file.

[apic]
# host = "apic.example.net"
username = "admin"
# password = ""
verify_ssl = false
# ca_cert = "/etc/ssl/certs/apic-ca.pem"
timeout = 30

[netbox]
# url = "https://netbox.example.net"
# token = ""
verify_ssl = true
# ca_cert = "/etc/ssl/certs/netbox-ca.pem"
timeout = 30

[sync]
dry_run = false
verify_updates = true
continue_on_error = true
# Stop the whole run on a kind-level fatal error.
abort_run_on_fatal = false
# What to do when the bulk read of a NetBox scope fails:
# "abort-kind" or "assume-empty".
on_preload_failure = "abort-kind"
"#;

// ── Config file path ────────────────────────────────────────────────

/// Platform config file path (`~/.config/acisync/config.toml` on Linux).
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "acisync", "acisync").map_or_else(
        || PathBuf::from(".acisync").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// The provider stack: defaults, file (format by extension), environment.
pub fn figment(path: &Path) -> Figment {
    let base = Figment::new().merge(Serialized::defaults(Config::default()));
    let base = match path.extension().and_then(OsStr::to_str) {
        Some("yaml" | "yml") => base.merge(Yaml::file(path)),
        Some("json") => base.merge(Json::file(path)),
        _ => base.merge(Toml::file(path)),
    };
    base.merge(section_env("ACI_", "apic", &["password"]))
        .merge(section_env("NETBOX_", "netbox", &["token"]))
        .merge(section_env("SYNC_", "sync", &[]))
}

/// `ACI_VERIFY_SSL` → `apic.verify_ssl`. Secrets go through the
/// credential chain instead.
fn section_env(prefix: &str, section: &'static str, secrets: &[&str]) -> Env {
    Env::prefixed(prefix)
        .ignore(secrets)
        .map(move |key| format!("{section}.{key}").into())
}

/// Load the effective configuration. An explicit `path` must exist; the
/// platform default may be absent.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) if !p.exists() => {
            return Err(ConfigError::Missing {
                path: p.to_path_buf(),
            });
        }
        Some(p) => p.to_path_buf(),
        None => config_path(),
    };
    debug!(path = %path.display(), "loading configuration");
    let config: Config = figment(&path).extract()?;
    Ok(config)
}

/// Write [`DEFAULT_TOML`] to `path`, creating parent directories.
pub fn write_default(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_TOML)?;
    Ok(())
}

// ── Validation & translation ────────────────────────────────────────

impl Config {
    /// Check that both endpoints are configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.apic.host.as_deref().map(str::trim) {
            Some(host) if !host.is_empty() => {}
            _ => {
                return Err(ConfigError::Validation {
                    field: "apic.host".into(),
                    reason: "not set (use --aci-host or ACI_HOST)".into(),
                });
            }
        }
        let raw = self.netbox.url.as_deref().unwrap_or_default();
        let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
            field: "netbox.url".into(),
            reason: if raw.is_empty() {
                "not set (use --netbox-url or NETBOX_URL)".into()
            } else {
                format!("invalid URL: {raw}")
            },
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation {
                field: "netbox.url".into(),
                reason: format!("expected http or https, got '{}'", url.scheme()),
            });
        }
        for (field, ca) in [
            ("apic.ca_cert", &self.apic.ca_cert),
            ("netbox.ca_cert", &self.netbox.ca_cert),
        ] {
            if let Some(path) = ca.as_deref().filter(|p| !p.is_file()) {
                return Err(ConfigError::Validation {
                    field: field.into(),
                    reason: format!("no such file: {}", path.display()),
                });
            }
        }
        Ok(())
    }

    /// A copy safe to print: secrets replaced by a placeholder.
    pub fn redacted(&self) -> Config {
        let mut out = self.clone();
        if out.apic.password.is_some() {
            out.apic.password = Some(REDACTED.into());
        }
        if out.netbox.token.is_some() {
            out.netbox.token = Some(REDACTED.into());
        }
        out
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl ApicConfig {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig::new(
            TlsMode::from_settings(self.verify_ssl, self.ca_cert.as_deref()),
            Duration::from_secs(self.timeout),
        )
    }
}

impl NetBoxConfig {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig::new(
            TlsMode::from_settings(self.verify_ssl, self.ca_cert.as_deref()),
            Duration::from_secs(self.timeout),
        )
    }
}

impl SyncConfig {
    /// Engine settings for one pass.
    pub fn settings(&self, tenant: Option<String>) -> SyncSettings {
        SyncSettings {
            dry_run: self.dry_run,
            verify: self.verify_updates,
            continue_on_error: self.continue_on_error,
            abort_run_on_fatal: self.abort_run_on_fatal,
            on_preload_failure: self.on_preload_failure,
            tenant,
        }
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// APIC password: `ACI_PASSWORD`, keyring `apic/<username>`, config file.
pub fn resolve_apic_password(apic: &ApicConfig) -> Result<SecretString, ConfigError> {
    resolve_secret(
        std::env::var(ACI_PASSWORD_ENV).ok(),
        &format!("apic/{}", apic.username),
        apic.password.as_deref(),
    )
    .ok_or(ConfigError::NoCredentials {
        field: "apic.password",
        env: ACI_PASSWORD_ENV,
    })
}

/// NetBox token: `NETBOX_TOKEN`, keyring `netbox/token`, config file.
pub fn resolve_netbox_token(netbox: &NetBoxConfig) -> Result<SecretString, ConfigError> {
    resolve_secret(
        std::env::var(NETBOX_TOKEN_ENV).ok(),
        "netbox/token",
        netbox.token.as_deref(),
    )
    .ok_or(ConfigError::NoCredentials {
        field: "netbox.token",
        env: NETBOX_TOKEN_ENV,
    })
}

fn resolve_secret(
    env_value: Option<String>,
    account: &str,
    plaintext: Option<&str>,
) -> Option<SecretString> {
    // 1. Environment
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        return Some(SecretString::from(value));
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, account) {
        match entry.get_password() {
            Ok(secret) => return Some(SecretString::from(secret)),
            Err(e) => debug!(account, "no keyring secret: {e}"),
        }
    }

    // 3. Plaintext in config
    plaintext
        .filter(|v| !v.is_empty())
        .map(|v| SecretString::from(v.to_owned()))
}
