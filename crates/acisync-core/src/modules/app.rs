// Application profiles, EPGs and ESGs.

use acisync_api::Endpoint;
use tracing::warn;

use super::{KindSync, entity_label};
use crate::cache::Scope;
use crate::context::SyncContext;
use crate::destination::Destination;
use crate::diff::build_params;
use crate::engine::{KindRun, Target};
use crate::error::CoreError;
use crate::mapping;
use crate::record::{DestId, SourceRecord};

pub(super) struct AppProfileSync;

impl KindSync for AppProfileSync {
    async fn sync_one<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
    ) -> Result<(), CoreError> {
        let tenant_name = record.require("tenant")?;
        let tenant = run.ctx.tenant(tenant_name)?;
        let target = Target::new(Endpoint::AppProfiles, Scope::Tenant(tenant), &record.name)
            .label(entity_label(record))
            .fields(build_params(mapping::DESCRIBED, record))
            .on_create("name", record.name.as_str())
            .on_create("aci_tenant", tenant.to_value());
        let (_, rec) = run.reconcile(target).await?;
        run.ctx
            .app_profiles
            .insert((tenant_name.to_owned(), record.name.clone()), rec.id);
        Ok(())
    }
}

/// Tenant and application profile names of an EPG or ESG record, and the
/// profile's destination id.
fn owner<'r>(
    ctx: &SyncContext,
    record: &'r SourceRecord,
) -> Result<(&'r str, &'r str, DestId), CoreError> {
    let tenant = record.require("tenant")?;
    let ap = record.require("ap")?;
    Ok((tenant, ap, ctx.app_profile(tenant, ap)?))
}

pub(super) struct EpgSync;

impl KindSync for EpgSync {
    async fn sync_one<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
    ) -> Result<(), CoreError> {
        let label = entity_label(record);
        let (tenant, ap, ap_id) = owner(run.ctx, record)?;
        let bd_name = record
            .str_attr("bd")
            .ok_or_else(|| CoreError::not_found("bridge domain", format!("(none) for EPG {label}")))?;
        // Unresolved in the EPG's own tenant, ACI falls back to `common`.
        let bd = match run.ctx.bridge_domain(tenant, bd_name) {
            Ok(id) => id,
            Err(err) => run.ctx.bridge_domain("common", bd_name).map_err(|_| err)?,
        };

        let target = Target::new(Endpoint::EndpointGroups, Scope::AppProfile(ap_id), &record.name)
            .label(label)
            .fields(build_params(mapping::EPG, record))
            .set("aci_bridge_domain", bd.to_value())
            .on_create("name", record.name.as_str())
            .on_create("aci_app_profile", ap_id.to_value());
        let (_, rec) = run.reconcile(target).await?;
        run.ctx.epgs.insert(
            (tenant.to_owned(), ap.to_owned(), record.name.clone()),
            rec.id,
        );
        Ok(())
    }
}

pub(super) struct EsgSync;

impl KindSync for EsgSync {
    async fn sync_one<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
    ) -> Result<(), CoreError> {
        let label = entity_label(record);
        let (tenant, ap, ap_id) = owner(run.ctx, record)?;

        let mut target = Target::new(
            Endpoint::EndpointSecurityGroups,
            Scope::AppProfile(ap_id),
            &record.name,
        )
        .fields(build_params(mapping::ESG, record))
        .on_create("name", record.name.as_str())
        .on_create("aci_app_profile", ap_id.to_value());

        match record.str_attr("vrf") {
            Some(vrf_name) => {
                let vrf = run
                    .ctx
                    .vrf(record.str_attr("vrf_tenant").unwrap_or(tenant), vrf_name)?;
                target = target.set("aci_vrf", vrf.to_value());
            }
            None => warn!(esg = %label, "ESG has no VRF association"),
        }

        let (_, rec) = run.reconcile(target.label(label)).await?;
        run.ctx.esgs.insert(
            (tenant.to_owned(), ap.to_owned(), record.name.clone()),
            rec.id,
        );
        Ok(())
    }
}
