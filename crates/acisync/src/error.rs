//! CLI error types with miette diagnostics.
//!
//! Maps config, client and engine errors into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use acisync_config::ConfigError;

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    /// The run finished but some entities failed or kinds aborted.
    pub const INCOMPLETE: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach {system} at {url}")]
    #[diagnostic(
        code(acisync::connection_failed),
        help(
            "Check that {system} is reachable from this host.\n\
             Private CA? Point ca_cert at its PEM bundle.\n\
             Self-signed certificate? Set verify_ssl = false in the config."
        )
    )]
    ConnectionFailed {
        system: &'static str,
        url: String,
        #[source]
        source: acisync_api::Error,
    },

    // ── Authentication ───────────────────────────────────────────────

    #[error("{system} rejected the credentials")]
    #[diagnostic(code(acisync::auth_failed), help("{hint}"))]
    AuthFailed {
        system: &'static str,
        hint: &'static str,
        #[source]
        source: acisync_api::Error,
    },

    // ── Configuration ────────────────────────────────────────────────

    #[error("{source}")]
    #[diagnostic(
        code(acisync::config),
        help("Create a config file with: acisync config init\nExpected at: {path}")
    )]
    Config {
        #[source]
        source: ConfigError,
        path: String,
    },

    #[error("Invalid kind selection: {reason}")]
    #[diagnostic(
        code(acisync::selection),
        help("Run: acisync kinds to see the accepted names")
    )]
    Selection { reason: String },

    // ── Sync outcome ─────────────────────────────────────────────────

    #[error("Sync finished with {failed} failed entities and {aborted} aborted kinds")]
    #[diagnostic(
        code(acisync::incomplete),
        help("See the issues in the report; rerun with -v for per-entity logs.")
    )]
    Incomplete { failed: u64, aborted: usize },

    #[error("{system} request failed: {source}")]
    #[diagnostic(code(acisync::api_error))]
    Api {
        system: &'static str,
        source: acisync_api::Error,
    },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    #[diagnostic(code(acisync::json))]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML: {0}")]
    #[diagnostic(code(acisync::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. }
            | Self::Config {
                source: ConfigError::NoCredentials { .. },
                ..
            } => exit_code::AUTH,
            Self::Config {
                source:
                    ConfigError::Validation { .. }
                    | ConfigError::Missing { .. }
                    | ConfigError::AlreadyExists { .. },
                ..
            }
            | Self::Selection { .. } => exit_code::USAGE,
            _ => exit_code::INCOMPLETE,
        }
    }

    /// Classify a client error against `system` at `url`.
    pub fn from_api(system: &'static str, url: &str, err: acisync_api::Error) -> Self {
        use acisync_api::Error as E;
        match err {
            E::Authentication { .. } | E::NotLoggedIn | E::NetBox { status: 401 | 403, .. } => {
                Self::AuthFailed {
                    system,
                    hint: auth_hint(system),
                    source: err,
                }
            }
            E::Transport(_) | E::Timeout { .. } | E::Tls(_) | E::InvalidUrl(_) => {
                Self::ConnectionFailed {
                    system,
                    url: url.to_owned(),
                    source: err,
                }
            }
            other => Self::Api {
                system,
                source: other,
            },
        }
    }
}

fn auth_hint(system: &str) -> &'static str {
    if system == "NetBox" {
        "Check the API token: NETBOX_TOKEN, keyring account netbox/token, or [netbox] token."
    } else {
        "Check the user name and password: ACI_PASSWORD, keyring account apic/<username>, or [apic] password."
    }
}

impl From<ConfigError> for CliError {
    fn from(source: ConfigError) -> Self {
        Self::Config {
            source,
            path: acisync_config::config_path().display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let auth = CliError::from_api(
            "APIC",
            "https://apic",
            acisync_api::Error::Authentication {
                message: "bad password".into(),
            },
        );
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let timeout = CliError::from_api(
            "NetBox",
            "https://netbox",
            acisync_api::Error::Timeout { timeout_secs: 30 },
        );
        assert_eq!(timeout.exit_code(), exit_code::CONNECTION);

        let missing = CliError::from(ConfigError::NoCredentials {
            field: "netbox.token",
            env: "NETBOX_TOKEN",
        });
        assert_eq!(missing.exit_code(), exit_code::AUTH);

        let usage = CliError::Selection {
            reason: "unknown entity kind 'foo'".into(),
        };
        assert_eq!(usage.exit_code(), exit_code::USAGE);

        let incomplete = CliError::Incomplete {
            failed: 2,
            aborted: 0,
        };
        assert_eq!(incomplete.exit_code(), exit_code::INCOMPLETE);
    }

    #[test]
    fn netbox_forbidden_is_an_auth_failure() {
        let err = CliError::from_api(
            "NetBox",
            "https://netbox",
            acisync_api::Error::NetBox {
                status: 403,
                message: "Invalid token".into(),
                fields: Default::default(),
            },
        );
        assert!(matches!(err, CliError::AuthFailed { system: "NetBox", .. }));
    }
}
