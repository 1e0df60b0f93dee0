// Tenant policy: tenants, VRFs, bridge domains and bridge-domain subnets.

use acisync_api::Endpoint;

use super::{KindSync, entity_label, support};
use crate::cache::Scope;
use crate::destination::Destination;
use crate::diff::build_params;
use crate::engine::{KindRun, Target};
use crate::error::CoreError;
use crate::mapping;
use crate::record::SourceRecord;

pub(super) struct TenantSync;

impl KindSync for TenantSync {
    async fn sync_one<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
    ) -> Result<(), CoreError> {
        let fabric = run.ctx.fabric()?.id;
        let target = Target::new(Endpoint::Tenants, Scope::Fabric(fabric), &record.name)
            .fields(build_params(mapping::DESCRIBED, record))
            .on_create("name", record.name.as_str())
            .on_create("aci_fabric", fabric.to_value());
        let (_, rec) = run.reconcile(target).await?;
        run.ctx.tenants.insert(record.name.clone(), rec.id);
        Ok(())
    }
}

pub(super) struct VrfSync;

impl KindSync for VrfSync {
    async fn sync_one<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
    ) -> Result<(), CoreError> {
        let tenant_name = record.require("tenant")?;
        let tenant = run.ctx.tenant(tenant_name)?;
        let target = Target::new(Endpoint::Vrfs, Scope::Tenant(tenant), &record.name)
            .label(entity_label(record))
            .fields(build_params(mapping::VRF, record))
            .on_create("name", record.name.as_str())
            .on_create("aci_tenant", tenant.to_value());
        let (_, rec) = run.reconcile(target).await?;
        run.ctx
            .vrfs
            .insert((tenant_name.to_owned(), record.name.clone()), rec.id);
        Ok(())
    }
}

pub(super) struct BridgeDomainSync;

impl KindSync for BridgeDomainSync {
    async fn sync_one<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
    ) -> Result<(), CoreError> {
        let label = entity_label(record);
        let tenant_name = record.require("tenant")?;
        let tenant = run.ctx.tenant(tenant_name)?;
        let vrf_name = record
            .str_attr("vrf")
            .ok_or_else(|| CoreError::not_found("VRF", format!("(none) for bridge domain {label}")))?;
        let vrf = run
            .ctx
            .vrf(record.str_attr("vrf_tenant").unwrap_or(tenant_name), vrf_name)?;

        let target = Target::new(Endpoint::BridgeDomains, Scope::Tenant(tenant), &record.name)
            .label(label)
            .fields(build_params(mapping::BRIDGE_DOMAIN, record))
            .set("aci_vrf", vrf.to_value())
            .on_create("name", record.name.as_str())
            .on_create("aci_tenant", tenant.to_value());
        let (_, rec) = run.reconcile(target).await?;
        run.ctx
            .bridge_domains
            .insert((tenant_name.to_owned(), record.name.clone()), rec.id);
        Ok(())
    }
}

/// Subnets are keyed by their gateway address, which is resolved in IPAM
/// before the lookup.
pub(super) struct SubnetSync;

impl KindSync for SubnetSync {
    async fn sync_one<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
    ) -> Result<(), CoreError> {
        let tenant_name = record.require("tenant")?;
        let bd_name = record.require("bd")?;
        let ip = record.require("ip")?;
        let bd = run.ctx.bridge_domain(tenant_name, bd_name)?;

        let scope = Scope::GlobalIpam("address", ip.to_owned());
        let gateway = Target::new(Endpoint::IpAddresses, scope, ip)
            .on_create("address", ip)
            .on_create("description", format!("BD Subnet Gateway - {bd_name}"));
        let gateway = support(run, gateway)
            .await?
            .ok_or_else(|| CoreError::not_found("IP address", ip))?;

        let name = format!("{bd_name}-{}", ip.replace('/', "_"));
        let target = Target::new(
            Endpoint::BridgeDomainSubnets,
            Scope::BridgeDomain(bd),
            gateway.id.to_string(),
        )
        .label(format!("{tenant_name}/{bd_name}/{ip}"))
        .fields(build_params(mapping::SUBNET, record))
        .on_create("name", name)
        .on_create("gateway_ip_address", gateway.id.to_value())
        .on_create("aci_bridge_domain", bd.to_value());
        run.reconcile(target).await?;
        Ok(())
    }
}
