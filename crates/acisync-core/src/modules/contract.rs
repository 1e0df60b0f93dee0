// Contract filters (with entries), contracts (with subjects) and the
// provider/consumer relations that bind contracts to EPGs, ESGs and VRFs.

use acisync_api::Endpoint;

use super::{KindSync, entity_label, support};
use crate::cache::{Scope, relation_key};
use crate::destination::Destination;
use crate::diff::build_params;
use crate::engine::{KindRun, Mode, Target};
use crate::error::CoreError;
use crate::mapping;
use crate::record::{DestId, SourceRecord};

/// Content types of the objects a contract relation can point at.
const EPG_TYPE: &str = "netbox_aci_plugin.aciendpointgroup";
const ESG_TYPE: &str = "netbox_aci_plugin.aciendpointsecuritygroup";
const VRF_TYPE: &str = "netbox_aci_plugin.acivrf";

/// Sync the children of a filter or contract under `scope`.
async fn sync_children<D: Destination>(
    run: &mut KindRun<'_, D>,
    endpoint: Endpoint,
    scope: Scope,
    parent_field: &str,
    parent: DestId,
    table: &[mapping::FieldMapping],
    children: &[SourceRecord],
) -> Result<(), CoreError> {
    if run.mode() == Mode::ResolveOnly {
        return Ok(());
    }
    for child in children {
        let target = Target::new(endpoint, scope.clone(), &child.name)
            .fields(build_params(table, child))
            .on_create("name", child.name.as_str())
            .on_create(parent_field, parent.to_value());
        support(run, target).await?;
    }
    Ok(())
}

pub(super) struct FilterSync;

impl KindSync for FilterSync {
    async fn sync_one<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
    ) -> Result<(), CoreError> {
        let tenant_name = record.require("tenant")?;
        let tenant = run.ctx.tenant(tenant_name)?;
        let target = Target::new(Endpoint::ContractFilters, Scope::Tenant(tenant), &record.name)
            .label(entity_label(record))
            .fields(build_params(mapping::DESCRIBED, record))
            .on_create("name", record.name.as_str())
            .on_create("aci_tenant", tenant.to_value());
        let (_, rec) = run.reconcile(target).await?;
        run.ctx
            .filters
            .insert((tenant_name.to_owned(), record.name.clone()), rec.id);

        sync_children(
            run,
            Endpoint::ContractFilterEntries,
            Scope::Filter(rec.id),
            "aci_contract_filter",
            rec.id,
            mapping::FILTER_ENTRY,
            &record.children,
        )
        .await
    }
}

pub(super) struct ContractSync;

impl KindSync for ContractSync {
    async fn sync_one<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
    ) -> Result<(), CoreError> {
        let tenant_name = record.require("tenant")?;
        let tenant = run.ctx.tenant(tenant_name)?;
        let target = Target::new(Endpoint::Contracts, Scope::Tenant(tenant), &record.name)
            .label(entity_label(record))
            .fields(build_params(mapping::CONTRACT, record))
            .on_create("name", record.name.as_str())
            .on_create("aci_tenant", tenant.to_value());
        let (_, rec) = run.reconcile(target).await?;
        run.ctx
            .contracts
            .insert((tenant_name.to_owned(), record.name.clone()), rec.id);

        sync_children(
            run,
            Endpoint::ContractSubjects,
            Scope::Contract(rec.id),
            "aci_contract",
            rec.id,
            mapping::CONTRACT_SUBJECT,
            &record.children,
        )
        .await
    }
}

/// Relations carry no mutable fields: they are created when absent and
/// otherwise reported unchanged.
pub(super) struct RelationSync;

impl KindSync for RelationSync {
    async fn sync_one<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
    ) -> Result<(), CoreError> {
        let tenant = record.require("tenant")?;
        let contract_name = record.require("contract")?;
        let object = record.require("object")?;
        let role = match record.require("role")? {
            "provider" => "prov",
            "consumer" => "cons",
            other => other,
        };

        let contract = run.ctx.contract(tenant, contract_name)?;
        let (object_type, object_id) = match record.str_attr("object_type") {
            Some("epg") => (EPG_TYPE, run.ctx.epg(tenant, record.require("ap")?, object)?),
            Some("esg") => (ESG_TYPE, run.ctx.esg(tenant, record.require("ap")?, object)?),
            Some("vrf") => (VRF_TYPE, run.ctx.vrf(tenant, object)?),
            other => {
                return Err(CoreError::Internal(format!(
                    "unsupported relation object type {other:?}"
                )));
            }
        };

        let key = relation_key(
            object_type,
            &object_id.to_string(),
            &contract.to_string(),
            role,
        );
        let mut target = Target::new(Endpoint::ContractRelations, Scope::Global, key)
            .label(format!("{tenant}/{object} {role} {contract_name}"))
            .on_create("aci_contract", contract.to_value())
            .on_create("aci_object_type", object_type)
            .on_create("aci_object_id", object_id.to_value())
            .on_create("role", role);
        if let Ok(tenant_id) = run.ctx.tenant(tenant) {
            target = target.on_create("aci_tenant", tenant_id.to_value());
        }
        if let Some(fabric) = &run.ctx.fabric {
            target = target.on_create("aci_fabric", fabric.id.to_value());
        }
        run.reconcile(target).await?;
        Ok(())
    }
}
