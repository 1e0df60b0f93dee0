// ── Sync modules ──
//
// One handler per entity kind. The set is closed: `run_kind` matches on
// `EntityKind` and drives the handler through pre_sync, the per-entity
// loop and post_sync.

mod app;
mod contract;
mod fabric;
mod software;
mod tenant;

use serde_json::Value;
use tracing::{debug, warn};

use crate::destination::Destination;
use crate::engine::{KindRun, Mode, Target};
use crate::error::CoreError;
use crate::kind::EntityKind;
use crate::record::{DestRecord, SourceRecord};
use crate::source::SourceClient;

/// Per-kind reconciliation hooks.
pub(crate) trait KindSync {
    /// Runs once before the per-entity loop. An error is kind-fatal.
    async fn pre_sync<S: SourceClient, D: Destination>(
        &mut self,
        _source: &S,
        _run: &mut KindRun<'_, D>,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    async fn sync_one<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
    ) -> Result<(), CoreError>;

    /// Runs once after every entity was processed. Only in sync mode.
    async fn post_sync<D: Destination>(&mut self, _run: &mut KindRun<'_, D>) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Identity of a source record in logs and the report.
pub(crate) fn entity_label(record: &SourceRecord) -> String {
    match (record.str_attr("tenant"), record.str_attr("ap")) {
        (Some(t), Some(ap)) => format!("{t}/{ap}/{}", record.name),
        (Some(t), None) => format!("{t}/{}", record.name),
        _ => record.name.clone(),
    }
}

/// Get-or-create a supporting object. Resolve-only runs just look it up.
async fn support<D: Destination>(
    run: &mut KindRun<'_, D>,
    target: Target,
) -> Result<Option<DestRecord>, CoreError> {
    if run.mode() == Mode::ResolveOnly {
        return run.find(target.endpoint, &target.scope, &target.key).await;
    }
    run.ensure(target).await.map(Some)
}

/// Numeric identifiers go out as numbers when they parse as one.
fn int_value(raw: &str) -> Value {
    raw.parse::<i64>().map_or_else(|_| Value::from(raw), Value::from)
}

/// NetBox slug: lowercase, separators to `-`, at most 50 chars.
fn slugify(name: &str) -> String {
    name.to_lowercase()
        .replace([' ', '/'], "-")
        .chars()
        .take(50)
        .collect()
}

/// Run the handler for `kind` over `records`.
///
/// Per-entity errors are counted and the loop continues, unless the error
/// is kind-fatal or the run does not continue on error. On abort, the
/// entities that never ran are counted as failed.
pub(crate) async fn run_kind<S: SourceClient, D: Destination>(
    source: &S,
    run: &mut KindRun<'_, D>,
    records: &[SourceRecord],
) -> Result<(), CoreError> {
    match run.kind() {
        EntityKind::Fabric => drive(&mut fabric::FabricSync, source, run, records).await,
        EntityKind::Pods => drive(&mut fabric::PodSync, source, run, records).await,
        EntityKind::Nodes => drive(&mut fabric::NodeSync::default(), source, run, records).await,
        EntityKind::Tenants => drive(&mut tenant::TenantSync, source, run, records).await,
        EntityKind::Vrfs => drive(&mut tenant::VrfSync, source, run, records).await,
        EntityKind::BridgeDomains => drive(&mut tenant::BridgeDomainSync, source, run, records).await,
        EntityKind::Subnets => drive(&mut tenant::SubnetSync, source, run, records).await,
        EntityKind::AppProfiles => drive(&mut app::AppProfileSync, source, run, records).await,
        EntityKind::Epgs => drive(&mut app::EpgSync, source, run, records).await,
        EntityKind::Esgs => drive(&mut app::EsgSync, source, run, records).await,
        EntityKind::ContractFilters => drive(&mut contract::FilterSync, source, run, records).await,
        EntityKind::Contracts => drive(&mut contract::ContractSync, source, run, records).await,
        EntityKind::ContractRelations => {
            drive(&mut contract::RelationSync, source, run, records).await
        }
        EntityKind::Software => {
            drive(&mut software::SoftwareSync::default(), source, run, records).await
        }
    }
}

async fn drive<K: KindSync, S: SourceClient, D: Destination>(
    module: &mut K,
    source: &S,
    run: &mut KindRun<'_, D>,
    records: &[SourceRecord],
) -> Result<(), CoreError> {
    let resolve_only = run.mode() == Mode::ResolveOnly;
    if records.is_empty() {
        debug!(kind = %run.kind(), "no source records");
        return Ok(());
    }

    if let Err(err) = module.pre_sync(source, run).await {
        if !resolve_only {
            run.report.stats.failed += records.len() as u64;
        }
        return Err(err);
    }

    for (i, record) in records.iter().enumerate() {
        let Err(err) = module.sync_one(run, record).await else {
            continue;
        };
        let entity = entity_label(record);

        if resolve_only {
            if err.is_kind_fatal() {
                return Err(err);
            }
            debug!(kind = %run.kind(), entity, "not resolved: {err}");
            continue;
        }

        run.record_failure(&entity, &err);
        if err.is_kind_fatal() || !run.settings.continue_on_error {
            let remaining = records.len() - i - 1;
            if remaining > 0 {
                warn!(kind = %run.kind(), remaining, "kind aborted, remaining entities not processed");
            }
            run.report.stats.failed += remaining as u64;
            return Err(err);
        }
    }

    if resolve_only {
        return Ok(());
    }
    module.post_sync(run).await
}
