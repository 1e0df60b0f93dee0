// ── Core error types ──
//
// The reconciliation error taxonomy. Consumers never see HTTP status codes
// directly: `From<acisync_api::Error>` sorts transport and API failures into
// the categories the engine makes decisions on (per-entity vs kind-fatal).

use std::collections::BTreeMap;

use thiserror::Error;

/// Unified error type for the engine.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Kind-fatal ───────────────────────────────────────────────────
    /// Source or destination unreachable (transport, timeout, 5xx).
    #[error("Connectivity error: {message}")]
    Connectivity { message: String },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Two destination objects share a natural key within one scope.
    #[error("Duplicate natural key '{key}' in {scope} (ids {first} and {second})")]
    DuplicateNaturalKey {
        scope: String,
        key: String,
        first: u64,
        second: u64,
    },

    /// The source system rejected or failed a query.
    #[error("Source query failed: {message}")]
    Source { message: String },

    // ── Per-entity ───────────────────────────────────────────────────
    /// An expected parent record is absent.
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    /// The destination rejected a create/update payload.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, Vec<String>>,
    },

    /// Post-write read does not match the expected state.
    #[error("Verification mismatch on {fields:?}")]
    VerificationMismatch { fields: Vec<String> },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity_type: &str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_owned(),
            identifier: identifier.into(),
        }
    }

    /// Whether this error aborts the whole entity kind rather than a
    /// single entity.
    pub fn is_kind_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connectivity { .. }
                | Self::Authentication { .. }
                | Self::DuplicateNaturalKey { .. }
                | Self::Source { .. }
        )
    }

    /// Short class name used in run reports.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Connectivity { .. } => "connectivity",
            Self::Authentication { .. } => "authentication",
            Self::DuplicateNaturalKey { .. } => "duplicate-key",
            Self::Source { .. } => "source",
            Self::NotFound { .. } => "not-found",
            Self::Validation { .. } => "validation",
            Self::VerificationMismatch { .. } => "verification",
            Self::Internal(_) => "internal",
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<acisync_api::Error> for CoreError {
    fn from(err: acisync_api::Error) -> Self {
        match err {
            acisync_api::Error::Authentication { message } => CoreError::Authentication { message },
            acisync_api::Error::NotLoggedIn => CoreError::Authentication {
                message: "no active APIC session".into(),
            },
            acisync_api::Error::Transport(ref e) => {
                if e.status().map(|s| s.as_u16()) == Some(404) {
                    CoreError::NotFound {
                        entity_type: "resource".into(),
                        identifier: e.url().map(|u| u.path().to_owned()).unwrap_or_default(),
                    }
                } else {
                    CoreError::Connectivity {
                        message: e.to_string(),
                    }
                }
            }
            acisync_api::Error::InvalidUrl(e) => CoreError::Connectivity {
                message: format!("Invalid URL: {e}"),
            },
            acisync_api::Error::Timeout { timeout_secs } => CoreError::Connectivity {
                message: format!("request timed out after {timeout_secs}s"),
            },
            acisync_api::Error::Tls(msg) => CoreError::Connectivity {
                message: format!("TLS error: {msg}"),
            },
            acisync_api::Error::Apic { code, message } => CoreError::Source {
                message: format!("APIC error {code}: {message}"),
            },
            acisync_api::Error::NetBox {
                status,
                message,
                fields,
            } => match status {
                400 | 409 | 422 => CoreError::Validation { message, fields },
                404 => CoreError::NotFound {
                    entity_type: "NetBox object".into(),
                    identifier: message,
                },
                401 | 403 => CoreError::Authentication { message },
                429 | 500..=599 => CoreError::Connectivity {
                    message: format!("NetBox HTTP {status}: {message}"),
                },
                _ => CoreError::Internal(format!("NetBox HTTP {status}: {message}")),
            },
            acisync_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn netbox(status: u16) -> acisync_api::Error {
        acisync_api::Error::NetBox {
            status,
            message: "boom".into(),
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn netbox_statuses_are_classified() {
        assert!(matches!(CoreError::from(netbox(400)), CoreError::Validation { .. }));
        assert!(matches!(CoreError::from(netbox(404)), CoreError::NotFound { .. }));
        assert!(matches!(CoreError::from(netbox(503)), CoreError::Connectivity { .. }));
        assert!(matches!(CoreError::from(netbox(403)), CoreError::Authentication { .. }));
    }

    #[test]
    fn fatality_follows_taxonomy() {
        assert!(CoreError::from(netbox(502)).is_kind_fatal());
        assert!(!CoreError::from(netbox(400)).is_kind_fatal());
        assert!(!CoreError::not_found("tenant", "t1").is_kind_fatal());
        let apic = acisync_api::Error::Apic {
            code: "122".into(),
            message: "unknown class".into(),
        };
        assert!(CoreError::from(apic).is_kind_fatal());
    }
}
