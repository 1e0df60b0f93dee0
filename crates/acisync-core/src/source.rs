// ── Source seam ──
//
// `SourceClient` yields normalized `SourceRecord`s per entity kind. The APIC
// implementation below maps managed-object classes and attributes onto the
// attribute names the mapping tables use.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;

use acisync_api::apic::{ApicClient, ClassQuery, ManagedObject, rn_value};
use tracing::debug;

use crate::error::CoreError;
use crate::kind::EntityKind;
use crate::record::SourceRecord;

/// Versions that never become software images.
const IGNORED_VERSIONS: &[&str] = &["unknown", "n/a"];

/// Read-only access to the source fabric.
pub trait SourceClient: Send + Sync {
    /// All records of `kind`, optionally narrowed to one tenant.
    fn fetch(
        &self,
        kind: EntityKind,
        tenant: Option<&str>,
    ) -> impl Future<Output = Result<Vec<SourceRecord>, CoreError>> + Send;

    /// Firmware image metadata (`version`, `filename`, `md5sum`).
    fn firmware(&self) -> impl Future<Output = Result<Vec<SourceRecord>, CoreError>> + Send;
}

impl SourceClient for ApicClient {
    async fn fetch(
        &self,
        kind: EntityKind,
        tenant: Option<&str>,
    ) -> Result<Vec<SourceRecord>, CoreError> {
        let tenant = tenant.filter(|_| kind.is_tenant_scoped());
        let records = match kind {
            EntityKind::Fabric => fabric(self).await?,
            EntityKind::Pods => pods(self).await?,
            EntityKind::Nodes => query(self, "fabricNode", false, None)
                .await?
                .iter()
                .map(node)
                .collect(),
            EntityKind::Software => software(&query(self, "fabricNode", false, None).await?),
            EntityKind::Tenants => {
                let mut out: Vec<SourceRecord> = query(self, "fvTenant", false, None)
                    .await?
                    .iter()
                    .map(|mo| {
                        let mut rec = described(mo);
                        rec.attrs.remove("tenant");
                        rec
                    })
                    .collect();
                if let Some(t) = tenant {
                    out.retain(|r| r.name == t);
                }
                out
            }
            EntityKind::Vrfs => query(self, "fvCtx", true, tenant)
                .await?
                .iter()
                .map(vrf)
                .collect(),
            EntityKind::BridgeDomains => query(self, "fvBD", true, tenant)
                .await?
                .iter()
                .map(bridge_domain)
                .collect(),
            EntityKind::Subnets => query(self, "fvSubnet", false, tenant)
                .await?
                .iter()
                .filter_map(subnet)
                .collect(),
            EntityKind::AppProfiles => query(self, "fvAp", false, tenant)
                .await?
                .iter()
                .map(described)
                .collect(),
            EntityKind::Epgs => query(self, "fvAEPg", true, tenant)
                .await?
                .iter()
                .filter_map(epg)
                .collect(),
            EntityKind::Esgs => query(self, "fvESg", true, tenant)
                .await?
                .iter()
                .map(esg)
                .collect(),
            EntityKind::ContractFilters => query(self, "vzFilter", true, tenant)
                .await?
                .iter()
                .map(contract_filter)
                .collect(),
            EntityKind::Contracts => query(self, "vzBrCP", true, tenant)
                .await?
                .iter()
                .map(contract)
                .collect(),
            EntityKind::ContractRelations => {
                let mut out = Vec::new();
                for (class, role) in [
                    ("fvRsProv", "provider"),
                    ("fvRsCons", "consumer"),
                    ("vzRsAnyToProv", "provider"),
                    ("vzRsAnyToCons", "consumer"),
                ] {
                    let objects = query(self, class, false, tenant).await?;
                    out.extend(objects.iter().filter_map(|mo| relation(mo, role)));
                }
                out
            }
        };
        debug!(%kind, count = records.len(), "fetched source records");
        Ok(records)
    }

    async fn firmware(&self) -> Result<Vec<SourceRecord>, CoreError> {
        let images = query(self, "firmwareFirmware", false, None).await?;
        Ok(images
            .iter()
            .filter_map(|mo| {
                let version = mo.attr("fullVersion").or_else(|| mo.attr("version"))?;
                let version = version.strip_prefix("apic-").unwrap_or(version);
                Some(
                    SourceRecord::new(version)
                        .with("version", Some(version))
                        .with("filename", mo.attr("name").or_else(|| mo.attr("isoname")))
                        .with("md5sum", mo.attr("checksum")),
                )
            })
            .collect())
    }
}

async fn query(
    client: &ApicClient,
    class: &str,
    children: bool,
    tenant: Option<&str>,
) -> Result<Vec<ManagedObject>, CoreError> {
    let q = ClassQuery {
        children,
        dn_contains: None,
    }
    .in_tenant(tenant);
    Ok(client.query_class(class, &q).await?)
}

// ── Attribute helpers ────────────────────────────────────────────────

/// Copy `apic_name` from `mo` into `record` as `key`.
fn copy(record: SourceRecord, mo: &ManagedObject, pairs: &[(&str, &str)]) -> SourceRecord {
    pairs.iter().fold(record, |rec, (key, apic_name)| {
        rec.with(key, mo.attributes.get(*apic_name).cloned())
    })
}

/// Name, alias and description, plus the owning tenant from the DN.
fn described(mo: &ManagedObject) -> SourceRecord {
    let rec = SourceRecord::new(mo.attr("name").unwrap_or_default())
        .with("tenant", rn_value(mo.dn(), "tn-"))
        .with("dn", Some(mo.dn()));
    copy(rec, mo, &[("name_alias", "nameAlias"), ("description", "descr")])
}

/// `(tenant, name)` of a relation target DN such as `uni/tn-a/ctx-b`.
fn target(dn: &str, prefix: &str) -> (Option<String>, Option<String>) {
    (
        rn_value(dn, "tn-").map(str::to_owned),
        rn_value(dn, prefix).map(str::to_owned),
    )
}

// ── Fabric inventory ─────────────────────────────────────────────────

async fn fabric(client: &ApicClient) -> Result<Vec<SourceRecord>, CoreError> {
    let set_pol = query(client, "infraSetPol", false, None).await?;
    let prov_acc = query(client, "infraProvAcc", false, None).await?;
    let setup = query(client, "fabricSetupP", false, None).await?;
    let ext_conn = query(client, "fvFabricExtConnP", false, None).await?;

    let first = |objs: &[ManagedObject], attr: &str| -> Option<String> {
        objs.iter().find_map(|mo| mo.attr(attr).map(str::to_owned))
    };

    let infra_vlan = match first(&prov_acc, "vid") {
        Some(v) => Some(v),
        None => first(&query(client, "infraCont", false, None).await?, "infraVlan"),
    }
    .map(|v| v.trim_start_matches("vlan-").to_owned());

    let name = first(&setup, "name").unwrap_or_else(|| "ACI Fabric".to_owned());
    Ok(vec![
        SourceRecord::new(name)
            .with("fabric_id", first(&set_pol, "fabricId"))
            .with("infra_vlan_vid", infra_vlan)
            .with("gipo_pool", first(&ext_conn, "gipoPool")),
    ])
}

async fn pods(client: &ApicClient) -> Result<Vec<SourceRecord>, CoreError> {
    let pods = query(client, "fabricPod", false, None).await?;
    let setup = query(client, "fabricSetupP", false, None).await?;
    let setup_pools: HashMap<&str, &str> = setup
        .iter()
        .filter_map(|mo| Some((mo.attr("podId")?, mo.attr("tepPool")?)))
        .collect();

    Ok(pods
        .iter()
        .filter_map(|mo| {
            let id = mo.attr("id")?;
            let pool = mo
                .attr("tepPool")
                .or_else(|| setup_pools.get(id).copied());
            Some(
                SourceRecord::new(format!("pod-{id}"))
                    .with("pod_id", Some(id))
                    .with("tep_pool", pool),
            )
        })
        .collect())
}

fn node(mo: &ManagedObject) -> SourceRecord {
    let rec = SourceRecord::new(mo.attr("name").unwrap_or_default())
        .with("pod_id", Some(rn_value(mo.dn(), "pod-").unwrap_or("1")));
    copy(
        rec,
        mo,
        &[
            ("node_id", "id"),
            ("serial", "serial"),
            ("model", "model"),
            ("role", "role"),
            ("fabric_state", "fabricSt"),
            ("address", "address"),
            ("version", "version"),
        ],
    )
}

/// Group nodes by running version; one record per version, nodes as
/// children.
fn software(nodes: &[ManagedObject]) -> Vec<SourceRecord> {
    let mut by_version: BTreeMap<&str, Vec<SourceRecord>> = BTreeMap::new();
    for mo in nodes {
        let Some(version) = mo.attr("version") else {
            continue;
        };
        if IGNORED_VERSIONS.contains(&version.to_ascii_lowercase().as_str()) {
            continue;
        }
        by_version.entry(version).or_default().push(node(mo));
    }
    by_version
        .into_iter()
        .map(|(version, nodes)| {
            nodes.into_iter().fold(
                SourceRecord::new(version).with("version", Some(version)),
                SourceRecord::with_child,
            )
        })
        .collect()
}

// ── Tenant policy ────────────────────────────────────────────────────

fn vrf(mo: &ManagedObject) -> SourceRecord {
    let mut rec = copy(
        described(mo),
        mo,
        &[
            ("bd_enforced_enabled", "bdEnforcedEnable"),
            ("ip_data_plane_learning", "ipDataPlaneLearning"),
            ("pc_enf_dir", "pcEnfDir"),
            ("pc_enf_pref", "pcEnfPref"),
        ],
    );
    if mo.child("pimCtxP").is_some() {
        rec = rec.with("pim_v4_enabled", Some("yes"));
    }
    if mo.child("pimIPV6CtxP").is_some() {
        rec = rec.with("pim_v6_enabled", Some("yes"));
    }
    rec.with(
        "preferred_group",
        mo.child("vzAny").and_then(|any| any.attr("prefGrMemb")),
    )
}

fn bridge_domain(mo: &ManagedObject) -> SourceRecord {
    let rec = copy(
        described(mo),
        mo,
        &[
            ("arp_flood", "arpFlood"),
            ("ip_learning", "ipLearning"),
            ("limit_ip_learn", "limitIpLearnToSubnets"),
            ("mac", "mac"),
            ("multi_dest_pkt_act", "multiDstPktAct"),
            ("unicast_route", "unicastRoute"),
            ("unk_mac_ucast_act", "unkMacUcastAct"),
            ("unk_mcast_act", "unkMcastAct"),
            ("v6_unk_mcast_act", "v6unkMcastAct"),
            ("vmac", "vmac"),
            ("pim_v4_enabled", "mcastAllow"),
            ("host_route_adv", "hostBasedRouting"),
            ("ep_move_detect", "epMoveDetectMode"),
        ],
    );
    let Some(rs_ctx) = mo.child("fvRsCtx") else {
        return rec;
    };
    let (vrf_tenant, vrf) = match rs_ctx.attr("tDn") {
        Some(tdn) => target(tdn, "ctx-"),
        None => (None, rs_ctx.attr("tnFvCtxName").map(str::to_owned)),
    };
    rec.with("vrf", vrf).with("vrf_tenant", vrf_tenant)
}

/// Only bridge-domain subnets; EPG-level subnets are not synchronized.
fn subnet(mo: &ManagedObject) -> Option<SourceRecord> {
    let dn = mo.dn();
    let bd = rn_value(dn, "BD-")?;
    let ip = mo.attr("ip")?;
    let rec = SourceRecord::new(ip)
        .with("ip", Some(ip))
        .with("tenant", rn_value(dn, "tn-"))
        .with("bd", Some(bd));
    Some(copy(
        rec,
        mo,
        &[
            ("name_alias", "nameAlias"),
            ("description", "descr"),
            ("preferred", "preferred"),
            ("virtual", "virtual"),
            ("scope", "scope"),
            ("ctrl", "ctrl"),
        ],
    ))
}

/// uSeg (attribute-based) EPGs are skipped.
fn epg(mo: &ManagedObject) -> Option<SourceRecord> {
    if mo.attr("isAttrBasedEPg") == Some("yes") {
        debug!(dn = mo.dn(), "skipping attribute-based EPG");
        return None;
    }
    let rec = copy(
        described(mo),
        mo,
        &[
            ("pref_gr_memb", "prefGrMemb"),
            ("prio", "prio"),
            ("flood_on_encap", "floodOnEncap"),
            ("shutdown", "shutdown"),
            ("pc_enf_pref", "pcEnfPref"),
        ],
    );
    Some(
        rec.with("ap", rn_value(mo.dn(), "ap-"))
            .with("bd", mo.child("fvRsBd").and_then(|rs| rs.attr("tnFvBDName"))),
    )
}

fn esg(mo: &ManagedObject) -> SourceRecord {
    let rec = copy(
        described(mo),
        mo,
        &[
            ("pref_gr_memb", "prefGrMemb"),
            ("prio", "prio"),
            ("shutdown", "shutdown"),
        ],
    )
    .with("ap", rn_value(mo.dn(), "ap-"));
    let (vrf_tenant, vrf) = mo
        .child("fvRsScope")
        .and_then(|rs| rs.attr("tDn"))
        .map_or((None, None), |tdn| target(tdn, "ctx-"));
    rec.with("vrf", vrf).with("vrf_tenant", vrf_tenant)
}

fn contract_filter(mo: &ManagedObject) -> SourceRecord {
    mo.children_of("vzEntry")
        .map(|entry| {
            copy(
                SourceRecord::new(entry.attr("name").unwrap_or_default()),
                entry,
                &[
                    ("name_alias", "nameAlias"),
                    ("description", "descr"),
                    ("ether_type", "etherT"),
                    ("ip_protocol", "prot"),
                    ("d_from_port", "dFromPort"),
                    ("d_to_port", "dToPort"),
                    ("s_from_port", "sFromPort"),
                    ("s_to_port", "sToPort"),
                ],
            )
        })
        .fold(described(mo), SourceRecord::with_child)
}

fn contract(mo: &ManagedObject) -> SourceRecord {
    let rec = copy(
        described(mo),
        mo,
        &[("scope", "scope"), ("prio", "prio"), ("target_dscp", "targetDscp")],
    );
    mo.children_of("vzSubj")
        .map(|subj| {
            copy(
                SourceRecord::new(subj.attr("name").unwrap_or_default()),
                subj,
                &[("description", "descr")],
            )
        })
        .fold(rec, SourceRecord::with_child)
}

/// A provider/consumer link from an EPG, an ESG or a VRF's vzAny.
/// Links from other objects (external EPGs, ...) are not synchronized.
fn relation(mo: &ManagedObject, role: &str) -> Option<SourceRecord> {
    let dn = mo.dn();
    let contract = mo.attr("tnVzBrCPName")?;
    let tenant = rn_value(dn, "tn-")?;
    let ap = rn_value(dn, "ap-");

    let (object_type, object) = if let Some(epg) = rn_value(dn, "epg-") {
        ("epg", epg)
    } else if let Some(esg) = rn_value(dn, "esg-") {
        ("esg", esg)
    } else if dn.contains("/any/") {
        ("vrf", rn_value(dn, "ctx-")?)
    } else {
        return None;
    };

    Some(
        SourceRecord::new(dn)
            .with("role", Some(role))
            .with("object_type", Some(object_type))
            .with("object", Some(object))
            .with("tenant", Some(tenant))
            .with("ap", ap)
            .with("contract", Some(contract)),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn mo(raw: serde_json::Value) -> ManagedObject {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn bridge_domain_reads_vrf_from_relation() {
        let bd = mo(json!({"fvBD": {
            "attributes": {"dn": "uni/tn-prod/BD-web", "name": "web", "arpFlood": "yes", "descr": ""},
            "children": [{"fvRsCtx": {"attributes": {"tDn": "uni/tn-common/ctx-shared", "tnFvCtxName": "shared"}}}]
        }}));
        let rec = bridge_domain(&bd);
        assert_eq!(rec.name, "web");
        assert_eq!(rec.str_attr("tenant"), Some("prod"));
        assert_eq!(rec.str_attr("vrf"), Some("shared"));
        assert_eq!(rec.str_attr("vrf_tenant"), Some("common"));
        assert_eq!(rec.str_attr("arp_flood"), Some("yes"));
        assert_eq!(rec.attr("description"), Some(&json!("")));
    }

    #[test]
    fn epg_subnets_and_useg_epgs_are_skipped() {
        let epg_subnet = mo(json!({"fvSubnet": {"attributes": {
            "dn": "uni/tn-a/ap-b/epg-c/subnet-[10.1.0.1/24]", "ip": "10.1.0.1/24"
        }}}));
        assert!(subnet(&epg_subnet).is_none());

        let useg = mo(json!({"fvAEPg": {"attributes": {
            "dn": "uni/tn-a/ap-b/epg-u", "name": "u", "isAttrBasedEPg": "yes"
        }}}));
        assert!(epg(&useg).is_none());
    }

    #[test]
    fn relations_identify_their_object() {
        let prov = mo(json!({"fvRsProv": {"attributes": {
            "dn": "uni/tn-a/ap-shop/epg-web/rsprov-http", "tnVzBrCPName": "http"
        }}}));
        let rec = relation(&prov, "provider").unwrap();
        assert_eq!(rec.str_attr("object_type"), Some("epg"));
        assert_eq!(rec.str_attr("object"), Some("web"));
        assert_eq!(rec.str_attr("ap"), Some("shop"));

        let any = mo(json!({"vzRsAnyToCons": {"attributes": {
            "dn": "uni/tn-a/ctx-main/any/rsanyToCons-dns", "tnVzBrCPName": "dns"
        }}}));
        let rec = relation(&any, "consumer").unwrap();
        assert_eq!(rec.str_attr("object_type"), Some("vrf"));
        assert_eq!(rec.str_attr("object"), Some("main"));

        let ext = mo(json!({"fvRsProv": {"attributes": {
            "dn": "uni/tn-a/out-l3/instP-ext/rsprov-http", "tnVzBrCPName": "http"
        }}}));
        assert!(relation(&ext, "provider").is_none());
    }

    #[test]
    fn software_groups_nodes_by_version() {
        let nodes: Vec<ManagedObject> = [
            ("leaf1", "n9000-16.0(2h)"),
            ("leaf2", "n9000-16.0(2h)"),
            ("apic1", "6.0(2h)"),
            ("ghost", "unknown"),
        ]
        .iter()
        .map(|(name, version)| {
            mo(json!({"fabricNode": {"attributes": {
                "dn": format!("topology/pod-1/node-{name}"), "name": name, "version": version
            }}}))
        })
        .collect();
        let records = software(&nodes);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "n9000-16.0(2h)");
        assert_eq!(records[1].children.len(), 2);
    }
}
