// Fabric inventory: the fabric itself, its pods and its nodes, plus the
// DCIM objects (manufacturer, site, device types, roles, devices) that
// back each node.

use std::collections::HashMap;

use acisync_api::Endpoint;
use serde_json::Value;
use tracing::debug;

use super::{KindSync, int_value, slugify, support};
use crate::cache::Scope;
use crate::context::{FabricRef, NodeRef};
use crate::destination::Destination;
use crate::diff::build_params;
use crate::engine::{KindRun, Target};
use crate::error::CoreError;
use crate::mapping;
use crate::record::{DestId, SourceRecord};
use crate::source::SourceClient;

const MANUFACTURER: &str = "Cisco";

/// Model prefixes stripped before matching, longest first.
const MODEL_PREFIXES: &[&str] = &[
    "N9K-C",
    "N9K-",
    "N5K-C",
    "N5K-",
    "N3K-C",
    "N3K-",
    "N77-C",
    "N77-",
    "N7K-C",
    "N7K-",
    "APIC-SERVER-",
    "APIC-",
    "Nexus ",
    "ACI-",
];

/// Fabric names may not carry spaces or path separators.
pub(super) fn sanitize_fabric_name(raw: &str) -> String {
    let name = raw.trim();
    if name.is_empty() {
        return "ACI_Fabric".to_owned();
    }
    name.replace([' ', '/', '\\'], "_")
}

/// Canonical form of a hardware model for matching ACI-reported names
/// (`N9K-C93180YC-FX`) against existing device types (`Nexus 93180YC-FX`).
pub(super) fn normalize_model(model: &str) -> String {
    let model = model.trim();
    let stripped = MODEL_PREFIXES
        .iter()
        .find_map(|prefix| {
            model
                .get(..prefix.len())
                .filter(|head| head.eq_ignore_ascii_case(prefix))
                .map(|_| &model[prefix.len()..])
        })
        .unwrap_or(model);
    stripped
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '-' | ' ' | '_'))
        .collect()
}

/// APIC node role to the plugin's node role.
fn node_role(raw: Option<&str>) -> &'static str {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("controller") => "apic",
        Some("spine") => "spine",
        _ => "leaf",
    }
}

fn title(word: &str) -> String {
    let mut chars = word.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

// ── Fabric ───────────────────────────────────────────────────────────

pub(super) struct FabricSync;

impl KindSync for FabricSync {
    async fn sync_one<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
    ) -> Result<(), CoreError> {
        let name = sanitize_fabric_name(&record.name);
        let target = Target::new(Endpoint::Fabrics, Scope::Global, &name)
            .fields(build_params(mapping::FABRIC, record))
            .on_create("name", name.as_str());
        let (_, rec) = run.reconcile(target).await?;
        run.ctx.fabric = Some(FabricRef { id: rec.id, name });
        Ok(())
    }
}

// ── Pods ─────────────────────────────────────────────────────────────

pub(super) struct PodSync;

impl KindSync for PodSync {
    async fn sync_one<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
    ) -> Result<(), CoreError> {
        let pod_id = record.require("pod_id")?;
        let fabric = run.ctx.fabric()?.id;
        let name = format!("pod-{pod_id}");

        let mut target = Target::new(Endpoint::Pods, Scope::Fabric(fabric), pod_id)
            .label(&name)
            .on_create("aci_fabric", fabric.to_value())
            .on_create("pod_id", int_value(pod_id))
            .on_create("name", name.as_str());

        if let Some(pool) = record.str_attr("tep_pool") {
            if let Some(mask) = pool.split_once('/').and_then(|(_, m)| m.parse::<u8>().ok()) {
                run.ctx.tep_mask = mask;
            }
            let scope = Scope::GlobalIpam("prefix", pool.to_owned());
            let prefix = Target::new(Endpoint::Prefixes, scope, pool)
                .on_create("prefix", pool)
                .on_create("description", format!("TEP Pool - {name}"));
            if let Some(prefix) = support(run, prefix).await? {
                target = target.set("tep_pool", prefix.id.to_value());
            }
        }

        let (_, rec) = run.reconcile(target).await?;
        run.ctx.pods.insert(pod_id.to_owned(), rec.id);
        Ok(())
    }
}

// ── Nodes ────────────────────────────────────────────────────────────

#[derive(Default)]
pub(super) struct NodeSync {
    manufacturer: Option<DestId>,
    /// Normalized model → device type.
    device_types: HashMap<String, DestId>,
}

impl NodeSync {
    async fn device_type<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        model: &str,
    ) -> Result<Option<DestId>, CoreError> {
        let norm = normalize_model(model);
        if let Some(id) = self.device_types.get(&norm) {
            return Ok(Some(*id));
        }
        let Some(manufacturer) = self.manufacturer else {
            return Ok(None);
        };

        debug!(model, "no matching device type, creating one");
        let target = Target::new(Endpoint::DeviceTypes, Scope::Manufacturer(manufacturer), model)
            .on_create("manufacturer", manufacturer.to_value())
            .on_create("model", model)
            .on_create("slug", slugify(model));
        let id = support(run, target).await?.map(|rec| rec.id);
        if let Some(id) = id.filter(|_| !norm.is_empty()) {
            self.device_types.insert(norm, id);
        }
        Ok(id)
    }

    /// DCIM device backing a node; `(device, device type)`.
    async fn device<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
        name: &str,
        model: &str,
        role: &str,
    ) -> Result<(Option<DestId>, Option<DestId>), CoreError> {
        let Some(site) = run.ctx.site else {
            return Ok((None, None));
        };
        let device_type = self.device_type(run, model).await?;

        let role_name = format!("ACI {}", title(role));
        let role = Target::new(Endpoint::DeviceRoles, Scope::Global, &role_name)
            .on_create("name", role_name.as_str())
            .on_create("slug", slugify(&role_name))
            .on_create("color", "9e9e9e");
        let role = support(run, role).await?.map(|rec| rec.id);

        let mut target = Target::new(Endpoint::Devices, Scope::Site(site), name)
            .on_create("name", name)
            .on_create("site", site.to_value());
        if let Some(dt) = device_type {
            target = target.on_create("device_type", dt.to_value());
        }
        if let Some(role) = role {
            target = target.on_create("role", role.to_value());
        }
        if let Some(serial) = record.str_attr("serial") {
            target = target.set("serial", serial);
        }
        let device = support(run, target).await?.map(|rec| rec.id);
        Ok((device, device_type))
    }

    async fn tep_address<D: Destination>(
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
        name: &str,
    ) -> Result<Option<DestId>, CoreError> {
        let Some(address) = record.str_attr("address").filter(|a| *a != "0.0.0.0") else {
            return Ok(None);
        };
        let ip = address.split_once('/').map_or(address, |(ip, _)| ip);
        let cidr = format!("{ip}/{}", run.ctx.tep_mask);
        let scope = Scope::GlobalIpam("address", cidr.clone());
        let target = Target::new(Endpoint::IpAddresses, scope, &cidr)
            .on_create("address", cidr.as_str())
            .on_create("description", format!("TEP IP - {name}"));
        Ok(support(run, target).await?.map(|rec| rec.id))
    }
}

impl KindSync for NodeSync {
    async fn pre_sync<S: SourceClient, D: Destination>(
        &mut self,
        _source: &S,
        run: &mut KindRun<'_, D>,
    ) -> Result<(), CoreError> {
        let fabric = run.ctx.fabric()?.name.clone();

        let manufacturer = Target::new(Endpoint::Manufacturers, Scope::Global, MANUFACTURER)
            .on_create("name", MANUFACTURER)
            .on_create("slug", slugify(MANUFACTURER));
        self.manufacturer = support(run, manufacturer).await?.map(|rec| rec.id);

        let site = Target::new(Endpoint::Sites, Scope::Global, &fabric)
            .on_create("name", fabric.as_str())
            .on_create("slug", slugify(&fabric));
        run.ctx.site = support(run, site).await?.map(|rec| rec.id);

        let Some(manufacturer) = self.manufacturer else {
            return Ok(());
        };
        let scope = Scope::Manufacturer(manufacturer);
        run.ensure_scope(Endpoint::DeviceTypes, &scope).await?;
        if let Some(index) = run.cache.index(Endpoint::DeviceTypes, &scope) {
            for dt in index.values() {
                let Some(model) = dt.field("model").and_then(Value::as_str) else {
                    continue;
                };
                let norm = normalize_model(model);
                if !norm.is_empty() {
                    self.device_types.insert(norm, dt.id);
                }
            }
        }
        debug!(count = self.device_types.len(), "indexed {MANUFACTURER} device types");
        Ok(())
    }

    async fn sync_one<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
    ) -> Result<(), CoreError> {
        let node_id = record.require("node_id")?;
        let name = if record.name.is_empty() {
            format!("node-{node_id}")
        } else {
            record.name.clone()
        };
        let fabric = run.ctx.fabric()?.id;
        let pod = run.ctx.pod(record.str_attr("pod_id").unwrap_or("1"))?;
        let role = node_role(record.str_attr("role"));
        let model = record
            .str_attr("model")
            .map_or_else(|| format!("ACI-{}", role.to_uppercase()), str::to_owned);

        let (device, device_type) = self.device(run, record, &name, &model, role).await?;

        let mut target = Target::new(Endpoint::Nodes, Scope::Fabric(fabric), node_id)
            .label(&name)
            .set("name", name.as_str())
            .set("role", role)
            .on_create("node_id", int_value(node_id))
            .on_create("aci_fabric", fabric.to_value())
            .on_create("aci_pod", pod.to_value())
            .on_create("node_type", "virtual");
        if let Some(device) = device {
            target = target
                .on_create("node_object_type", "dcim.device")
                .on_create("node_object_id", device.to_value());
        }
        if let Some(ip) = Self::tep_address(run, record, &name).await? {
            target = target.set("tep_ip_address", ip.to_value());
        }

        let (_, rec) = run.reconcile(target).await?;
        run.ctx.nodes.insert(
            node_id.to_owned(),
            NodeRef {
                id: rec.id,
                name,
                model,
                serial: record.str_attr("serial").unwrap_or_default().to_owned(),
                device,
                device_type,
            },
        );
        Ok(())
    }
}
