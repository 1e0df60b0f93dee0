// ── Sync settings ──
//
// Policy switches for one pass: dry-run, verification, and how per-entity
// and kind-level failures propagate.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What a module does when the bulk read of a destination scope fails.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PreloadFailure {
    /// Abort the kind (kind-level fatal error).
    #[default]
    AbortKind,
    /// Continue as if the scope were empty, forcing create attempts.
    AssumeEmpty,
}

/// Policy switches for one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Compute everything, write nothing.
    pub dry_run: bool,
    /// Re-read written objects and compare mapped fields.
    pub verify: bool,
    /// Keep going after per-entity failures. When false the first failure
    /// aborts its kind and the run.
    pub continue_on_error: bool,
    /// Stop the run on any kind-level fatal error, even when
    /// `continue_on_error` is set.
    pub abort_run_on_fatal: bool,
    pub on_preload_failure: PreloadFailure,
    /// Narrow tenant-scoped source queries to one tenant.
    pub tenant: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            dry_run: false,
            verify: true,
            continue_on_error: true,
            abort_run_on_fatal: false,
            on_preload_failure: PreloadFailure::AbortKind,
            tenant: None,
        }
    }
}

impl SyncSettings {
    /// Whether a kind-level fatal error ends the whole run.
    pub fn fatal_stops_run(&self) -> bool {
        self.abort_run_on_fatal || !self.continue_on_error
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_continue_and_verify() {
        let s = SyncSettings::default();
        assert!(s.continue_on_error);
        assert!(s.verify);
        assert!(!s.fatal_stops_run());
    }

    #[test]
    fn either_switch_stops_run_on_fatal() {
        let strict = SyncSettings {
            continue_on_error: false,
            ..SyncSettings::default()
        };
        assert!(strict.fatal_stops_run());
        let abort = SyncSettings {
            abort_run_on_fatal: true,
            ..SyncSettings::default()
        };
        assert!(abort.fatal_stops_run());
    }

    #[test]
    fn preload_policy_parses_kebab_case() {
        assert_eq!(
            "assume-empty".parse::<PreloadFailure>().unwrap(),
            PreloadFailure::AssumeEmpty
        );
        assert_eq!(PreloadFailure::AbortKind.to_string(), "abort-kind");
    }
}
