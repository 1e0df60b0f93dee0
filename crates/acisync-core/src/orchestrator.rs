// ── Orchestrator ──
//
// Runs the selected kinds strictly in dependency order, one at a time.
// Unselected prerequisites run resolve-only so later kinds can reference
// objects that already exist. The pass always ends in a `RunReport`; errors
// never escape this boundary.

use std::collections::BTreeSet;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::context::SyncContext;
use crate::destination::Destination;
use crate::engine::{KindRun, Mode};
use crate::kind::{EntityKind, Selection};
use crate::modules::run_kind;
use crate::settings::SyncSettings;
use crate::source::SourceClient;
use crate::stats::{Issue, KindReport, KindStatus, RunReport};

/// One source, one destination, one policy: everything a pass needs.
pub struct Orchestrator<S, D> {
    source: S,
    dest: D,
    settings: SyncSettings,
    selection: Selection,
}

impl<S: SourceClient, D: Destination> Orchestrator<S, D> {
    pub fn new(source: S, dest: D, settings: SyncSettings, selection: Selection) -> Self {
        Self {
            source,
            dest,
            settings,
            selection,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn dest(&self) -> &D {
        &self.dest
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Execute one pass.
    pub async fn run(&self) -> RunReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        let prerequisites: BTreeSet<EntityKind> =
            self.selection.prerequisites().into_iter().collect();
        info!(
            dry_run = self.settings.dry_run,
            kinds = ?self.selection.selected(),
            "starting sync pass"
        );

        let mut ctx = SyncContext::default();
        let mut kinds = Vec::new();
        let mut aborted = false;

        for kind in EntityKind::ordered() {
            let selected = self.selection.includes(kind);
            if aborted {
                if selected {
                    kinds.push(KindReport::skipped(kind));
                }
                continue;
            }

            if selected {
                let report = self.sync_kind(kind, &mut ctx, Mode::Sync).await;
                if let KindStatus::Aborted(reason) = &report.status {
                    if self.settings.fatal_stops_run() {
                        error!(%kind, "stopping run: {reason}");
                        aborted = true;
                    }
                }
                kinds.push(report);
            } else if prerequisites.contains(&kind) {
                let report = self.sync_kind(kind, &mut ctx, Mode::ResolveOnly).await;
                if let KindStatus::Aborted(reason) = &report.status {
                    warn!(%kind, "prerequisite could not be resolved: {reason}");
                }
            }
        }

        let report = RunReport {
            started_at,
            elapsed: clock.elapsed(),
            dry_run: self.settings.dry_run,
            aborted,
            kinds,
        };
        let totals = report.totals();
        info!(
            created = totals.created,
            updated = totals.updated,
            unchanged = totals.unchanged,
            failed = totals.failed,
            verified = totals.verified,
            elapsed_ms = report.elapsed.as_millis(),
            "sync pass finished"
        );
        report
    }

    async fn sync_kind(&self, kind: EntityKind, ctx: &mut SyncContext, mode: Mode) -> KindReport {
        let mut run = KindRun::new(kind, &self.dest, &self.settings, ctx, mode);

        let records = match self.source.fetch(kind, self.settings.tenant.as_deref()).await {
            Ok(records) => records,
            Err(err) => {
                error!(%kind, "source query failed: {err}");
                run.report.issues.push(Issue::new(&kind.to_string(), &err));
                run.report.status = KindStatus::Aborted(err.to_string());
                return run.report;
            }
        };

        if let Err(err) = run_kind(&self.source, &mut run, &records).await {
            if mode == Mode::Sync {
                error!(%kind, "kind aborted: {err}");
            }
            run.report.status = KindStatus::Aborted(err.to_string());
        }

        let stats = run.report.stats;
        match mode {
            Mode::Sync => info!(
                %kind,
                created = stats.created,
                updated = stats.updated,
                unchanged = stats.unchanged,
                failed = stats.failed,
                verified = stats.verified,
                mismatched = run.report.mismatched,
                preloads = run.cache.reads(),
                "kind finished"
            ),
            Mode::ResolveOnly => debug!(%kind, records = records.len(), "prerequisite resolved"),
        }
        run.report
    }
}
