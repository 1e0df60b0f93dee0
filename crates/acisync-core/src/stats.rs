// ── Run statistics and report ──
//
// Per-kind counters accumulated by the running module, and the run-wide
// report the orchestrator returns. The report is the external contract:
// every selected kind appears, even when it never ran.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::CoreError;
use crate::kind::EntityKind;

/// Counters for one kind within one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindStats {
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub failed: u64,
    pub verified: u64,
}

impl KindStats {
    pub fn processed(&self) -> u64 {
        self.created + self.updated + self.unchanged + self.failed
    }

    pub fn add(&mut self, other: &KindStats) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
        self.verified += other.verified;
    }
}

/// One recorded problem, kept for the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub entity: String,
    pub class: &'static str,
    pub message: String,
}

impl Issue {
    pub fn new(entity: &str, err: &CoreError) -> Self {
        Self {
            entity: entity.to_owned(),
            class: err.class(),
            message: err.to_string(),
        }
    }
}

/// How a kind ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "kebab-case")]
pub enum KindStatus {
    Completed,
    Aborted(String),
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindReport {
    pub kind: EntityKind,
    pub status: KindStatus,
    pub stats: KindStats,
    /// Verification mismatches (separate from `failed`).
    pub mismatched: u64,
    pub issues: Vec<Issue>,
}

impl KindReport {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            status: KindStatus::Completed,
            stats: KindStats::default(),
            mismatched: 0,
            issues: Vec::new(),
        }
    }

    pub fn skipped(kind: EntityKind) -> Self {
        Self {
            status: KindStatus::Skipped,
            ..Self::new(kind)
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.status, KindStatus::Aborted(_))
    }
}

/// Result of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    #[serde(serialize_with = "as_secs")]
    pub elapsed: Duration,
    pub dry_run: bool,
    /// The run stopped before every selected kind ran.
    pub aborted: bool,
    pub kinds: Vec<KindReport>,
}

impl RunReport {
    pub fn totals(&self) -> KindStats {
        let mut totals = KindStats::default();
        for k in &self.kinds {
            totals.add(&k.stats);
        }
        totals
    }

    pub fn mismatched(&self) -> u64 {
        self.kinds.iter().map(|k| k.mismatched).sum()
    }

    pub fn kind(&self, kind: EntityKind) -> Option<&KindReport> {
        self.kinds.iter().find(|k| k.kind == kind)
    }

    /// False when any kind failed entities or was aborted.
    pub fn success(&self) -> bool {
        !self.aborted
            && self
                .kinds
                .iter()
                .all(|k| k.stats.failed == 0 && !k.is_aborted())
    }
}

fn as_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
