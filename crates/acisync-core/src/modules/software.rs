// Software versions: one software image per running firmware version, then
// firmware details on each node's DCIM device and a golden image per
// device type.

use std::collections::{BTreeMap, HashMap};

use acisync_api::Endpoint;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::KindSync;
use crate::cache::Scope;
use crate::destination::Destination;
use crate::diff::build_params;
use crate::engine::{KindRun, Target};
use crate::error::CoreError;
use crate::mapping;
use crate::record::{DestId, SourceRecord};
use crate::source::SourceClient;

const MAX_VERSION_LEN: usize = 32;
const LISTED_NODES: usize = 10;

/// `ACI firmware running on 12 node(s): a, b, ... (+2 more)`
fn node_summary(nodes: &[SourceRecord]) -> String {
    let names: Vec<&str> = nodes
        .iter()
        .take(LISTED_NODES)
        .map(|n| n.name.as_str())
        .collect();
    let more = match nodes.len().checked_sub(LISTED_NODES) {
        Some(extra) if extra > 0 => format!(" (+{extra} more)"),
        _ => String::new(),
    };
    format!(
        "ACI firmware running on {} node(s): {}{more}",
        nodes.len(),
        names.join(", ")
    )
}

#[derive(Default)]
pub(super) struct SoftwareSync {
    /// Firmware metadata by version.
    firmware: HashMap<String, SourceRecord>,
    /// Synced images with the nodes running them.
    images: Vec<(DestId, SourceRecord)>,
}

impl SoftwareSync {
    fn firmware_context(&self, version: &str, node: &SourceRecord) -> Value {
        let mut fw = Map::new();
        fw.insert("version".into(), version.into());
        fw.insert("model".into(), node.str_attr("model").unwrap_or_default().into());
        fw.insert("serial".into(), node.str_attr("serial").unwrap_or_default().into());
        if let Some(meta) = self.firmware.get(version) {
            if let Some(filename) = meta.str_attr("filename") {
                fw.insert("filename".into(), filename.into());
            }
            if let Some(checksum) = meta.str_attr("md5sum") {
                fw.insert("checksum".into(), checksum.into());
            }
        }
        Value::Object(fw)
    }

    /// Write `local_context_data.firmware` on every node's device, keeping
    /// any other keys already there.
    async fn tag_devices<D: Destination>(&self, run: &mut KindRun<'_, D>) -> Result<(), CoreError> {
        let Some(site) = run.ctx.site else {
            debug!("no DCIM site resolved, skipping device firmware context");
            return Ok(());
        };
        let scope = Scope::Site(site);
        let mut tagged = 0usize;

        for (_, image) in &self.images {
            let version = image.name.as_str();
            for node in &image.children {
                let Some(node_ref) = node.str_attr("node_id").and_then(|id| run.ctx.nodes.get(id)) else {
                    continue;
                };
                let name = node_ref.name.clone();
                let Some(device) = run.find(Endpoint::Devices, &scope, &name).await? else {
                    debug!(node = %name, "no DCIM device for node");
                    continue;
                };

                let mut context = device
                    .field("local_context_data")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                context.insert("firmware".into(), self.firmware_context(version, node));

                let target = Target::new(Endpoint::Devices, scope.clone(), &name)
                    .set("local_context_data", Value::Object(context));
                match run.ensure(target).await {
                    Ok(_) => tagged += 1,
                    Err(e) => warn!(node = %name, "could not set firmware context: {e}"),
                }
            }
        }
        debug!(devices = tagged, "firmware context checked");
        Ok(())
    }

    /// One golden image per device type: the version most of its nodes run.
    async fn assign_golden_images<D: Destination>(&self, run: &mut KindRun<'_, D>) {
        let mut tally: HashMap<DestId, BTreeMap<&str, (usize, DestId)>> = HashMap::new();
        for (image_id, image) in &self.images {
            for node in &image.children {
                let Some(dt) = node
                    .str_attr("node_id")
                    .and_then(|id| run.ctx.nodes.get(id))
                    .and_then(|n| n.device_type)
                else {
                    continue;
                };
                tally
                    .entry(dt)
                    .or_default()
                    .entry(image.name.as_str())
                    .or_insert((0, *image_id))
                    .0 += 1;
            }
        }

        let mut assigned = 0usize;
        for (device_type, versions) in tally {
            let Some((version, (_, image))) = versions
                .into_iter()
                .max_by_key(|(version, (nodes, _))| (*nodes, *version))
            else {
                continue;
            };
            let target = Target::new(Endpoint::GoldenImages, Scope::Global, device_type.to_string())
                .label(format!("golden image {version} for device type {device_type}"))
                .set("software_image", image.to_value())
                .on_create("device_type", device_type.to_value());
            match run.ensure(target).await {
                Ok(_) => assigned += 1,
                Err(e) => warn!(%device_type, version, "could not assign golden image: {e}"),
            }
        }
        if assigned > 0 {
            info!(device_types = assigned, "golden images assigned");
        }
    }
}

impl KindSync for SoftwareSync {
    async fn pre_sync<S: SourceClient, D: Destination>(
        &mut self,
        source: &S,
        _run: &mut KindRun<'_, D>,
    ) -> Result<(), CoreError> {
        match source.firmware().await {
            Ok(images) => {
                debug!(count = images.len(), "loaded firmware metadata");
                self.firmware = images.into_iter().map(|fw| (fw.name.clone(), fw)).collect();
            }
            Err(e) => warn!("firmware metadata unavailable, images will lack filename and checksum: {e}"),
        }
        Ok(())
    }

    async fn sync_one<D: Destination>(
        &mut self,
        run: &mut KindRun<'_, D>,
        record: &SourceRecord,
    ) -> Result<(), CoreError> {
        let full = record.require("version")?;
        let version: String = full.chars().take(MAX_VERSION_LEN).collect();

        let meta = self.firmware.get(full);
        let attrs = SourceRecord::new(&version)
            .with("comments", Some(node_summary(&record.children)))
            .with("filename", meta.and_then(|m| m.str_attr("filename")))
            .with("md5sum", meta.and_then(|m| m.str_attr("md5sum")));

        let target = Target::new(Endpoint::SoftwareImages, Scope::Global, &version)
            .fields(build_params(mapping::SOFTWARE, &attrs))
            .on_create("version", version.as_str());
        let (_, rec) = run.reconcile(target).await?;
        self.images.push((rec.id, record.clone()));
        Ok(())
    }

    async fn post_sync<D: Destination>(&mut self, run: &mut KindRun<'_, D>) -> Result<(), CoreError> {
        self.tag_devices(run).await?;
        self.assign_golden_images(run).await;
        Ok(())
    }
}
