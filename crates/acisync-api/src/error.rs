use std::collections::BTreeMap;

use thiserror::Error;

/// Top-level error type for the `acisync-api` crate.
///
/// Covers every failure mode of both API surfaces: authentication,
/// transport, APIC responses and NetBox responses. `acisync-core`
/// classifies these into its reconciliation error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed or the session/token was rejected.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// A request was issued before `login()` succeeded.
    #[error("Not logged in to the APIC -- call login() first")]
    NotLoggedIn,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── APIC ────────────────────────────────────────────────────────
    /// Error object returned inside the APIC `imdata` envelope.
    #[error("APIC error {code}: {message}")]
    Apic { code: String, message: String },

    // ── NetBox ──────────────────────────────────────────────────────
    /// Non-success response from NetBox.
    ///
    /// `fields` carries per-field validation messages when NetBox
    /// rejects a payload with HTTP 400.
    #[error("NetBox API error (HTTP {status}): {message}")]
    NetBox {
        status: u16,
        message: String,
        fields: BTreeMap<String, Vec<String>>,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::NetBox { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::NetBox { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the destination rejected the request payload.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::NetBox { status: 400, .. })
    }

    /// HTTP status code, if the error came from an HTTP response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::NetBox { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Leading characters of a response body kept in error messages.
const PREVIEW_CHARS: usize = 200;

/// First `PREVIEW_CHARS` characters of `body`, cut on a char boundary.
pub(crate) fn body_preview(body: &str) -> &str {
    body.char_indices()
        .nth(PREVIEW_CHARS)
        .map_or(body, |(end, _)| &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_never_splits_a_character() {
        let body = format!("{}é tail", "x".repeat(199));
        let preview = body_preview(&body);
        assert_eq!(preview.chars().count(), 200);
        assert!(preview.ends_with('é'));
        assert_eq!(body_preview("short"), "short");
    }
}
