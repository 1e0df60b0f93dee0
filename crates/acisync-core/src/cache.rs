// ── Entity cache ──
//
// Per-endpoint, per-scope index of destination objects keyed by natural
// key. Each (endpoint, scope) pair is bulk-read at most once; lookups are
// pure memory reads and writes are folded back in as they happen.

use std::collections::HashMap;
use std::fmt;

use acisync_api::Endpoint;
use tracing::debug;

use crate::destination::Destination;
use crate::error::CoreError;
use crate::record::{DestId, DestRecord, scalar_key};

/// Partition a cache index is built under, with the list filter that
/// selects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Fabric(DestId),
    Tenant(DestId),
    AppProfile(DestId),
    BridgeDomain(DestId),
    Filter(DestId),
    Contract(DestId),
    Site(DestId),
    Manufacturer(DestId),
    /// IPAM objects in the global table (no VRF) whose `field` equals
    /// `value`. Same-address objects in other VRFs are outside the scope.
    GlobalIpam(&'static str, String),
}

impl Scope {
    /// Query parameters selecting this scope, or `None` when the parent is
    /// a planned (not yet created) object and the scope is known empty.
    pub fn params(&self) -> Option<Vec<(&'static str, String)>> {
        let by_parent = |name: &'static str, id: DestId| id.existing().map(|id| vec![(name, id.to_string())]);
        match self {
            Self::Global => Some(Vec::new()),
            Self::Fabric(id) => by_parent("aci_fabric_id", *id),
            Self::Tenant(id) => by_parent("aci_tenant_id", *id),
            Self::AppProfile(id) => by_parent("aci_app_profile_id", *id),
            Self::BridgeDomain(id) => by_parent("aci_bridge_domain_id", *id),
            Self::Filter(id) => by_parent("aci_contract_filter_id", *id),
            Self::Contract(id) => by_parent("aci_contract_id", *id),
            Self::Site(id) => by_parent("site_id", *id),
            Self::Manufacturer(id) => by_parent("manufacturer_id", *id),
            Self::GlobalIpam(field, value) => Some(vec![
                (*field, value.clone()),
                ("vrf_id", "null".to_owned()),
            ]),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Fabric(id) => write!(f, "fabric {id}"),
            Self::Tenant(id) => write!(f, "tenant {id}"),
            Self::AppProfile(id) => write!(f, "app profile {id}"),
            Self::BridgeDomain(id) => write!(f, "bridge domain {id}"),
            Self::Filter(id) => write!(f, "filter {id}"),
            Self::Contract(id) => write!(f, "contract {id}"),
            Self::Site(id) => write!(f, "site {id}"),
            Self::Manufacturer(id) => write!(f, "manufacturer {id}"),
            Self::GlobalIpam(field, value) => write!(f, "{field}={value}, global table"),
        }
    }
}

// ── Natural keys ─────────────────────────────────────────────────────

/// Natural key of a destination object of `endpoint`.
pub fn natural_key(endpoint: Endpoint, record: &DestRecord) -> Option<String> {
    let field = |name: &str| record.field(name).and_then(scalar_key);
    match endpoint {
        Endpoint::Pods => field("pod_id"),
        Endpoint::Nodes => field("node_id"),
        Endpoint::BridgeDomainSubnets => field("gateway_ip_address"),
        Endpoint::IpAddresses => field("address"),
        Endpoint::Prefixes => field("prefix"),
        Endpoint::SoftwareImages => field("version"),
        Endpoint::GoldenImages => field("device_type"),
        Endpoint::DeviceTypes => field("model"),
        Endpoint::ContractRelations => Some(relation_key(
            &field("aci_object_type")?,
            &field("aci_object_id")?,
            &field("aci_contract")?,
            &field("role")?,
        )),
        _ => field("name"),
    }
}

/// Composite key of a contract relation.
pub fn relation_key(object_type: &str, object_id: &str, contract: &str, role: &str) -> String {
    format!("{object_type}:{object_id}:{contract}:{role}")
}

// ── Index ────────────────────────────────────────────────────────────

/// Natural key → destination object, for one endpoint and scope.
#[derive(Debug, Clone, Default)]
pub struct CacheIndex {
    entries: HashMap<String, DestRecord>,
}

impl CacheIndex {
    /// Index `records`, rejecting duplicate natural keys.
    pub fn build(
        endpoint: Endpoint,
        scope: &Scope,
        records: Vec<DestRecord>,
    ) -> Result<Self, CoreError> {
        let mut entries: HashMap<String, DestRecord> = HashMap::with_capacity(records.len());
        for record in records {
            let Some(key) = natural_key(endpoint, &record) else {
                debug!(%endpoint, id = %record.id, "object has no natural key, not indexed");
                continue;
            };
            if let Some(existing) = entries.get(&key) {
                return Err(CoreError::DuplicateNaturalKey {
                    scope: format!("{endpoint} ({scope})"),
                    key,
                    first: existing.id.existing().unwrap_or_default(),
                    second: record.id.existing().unwrap_or_default(),
                });
            }
            entries.insert(key, record);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&DestRecord> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &DestRecord> {
        self.entries.values()
    }
}

// ── Cache ────────────────────────────────────────────────────────────

/// Indexes owned by one running sync module.
#[derive(Debug, Default)]
pub struct EntityCache {
    indexes: HashMap<(Endpoint, Scope), CacheIndex>,
    reads: usize,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self, endpoint: Endpoint, scope: &Scope) -> bool {
        self.indexes.contains_key(&(endpoint, scope.clone()))
    }

    /// Bulk-read one scope into the cache. A no-op when it is already
    /// loaded or its parent is only planned.
    pub async fn preload<D: Destination>(
        &mut self,
        dest: &D,
        endpoint: Endpoint,
        scope: &Scope,
    ) -> Result<usize, CoreError> {
        let slot = (endpoint, scope.clone());
        if let Some(index) = self.indexes.get(&slot) {
            return Ok(index.len());
        }

        let Some(params) = scope.params() else {
            debug!(%endpoint, %scope, "parent is planned, scope starts empty");
            self.indexes.insert(slot, CacheIndex::default());
            return Ok(0);
        };

        self.reads += 1;
        let records = dest.list(endpoint, &params).await?;
        let index = CacheIndex::build(endpoint, scope, records)?;
        let count = index.len();
        debug!(%endpoint, %scope, count, "preloaded");
        self.indexes.insert(slot, index);
        Ok(count)
    }

    /// Treat a scope as empty without reading it.
    pub fn mark_empty(&mut self, endpoint: Endpoint, scope: &Scope) {
        self.indexes
            .entry((endpoint, scope.clone()))
            .or_default();
    }

    /// In-memory lookup; never performs I/O.
    pub fn lookup(&self, endpoint: Endpoint, scope: &Scope, key: &str) -> Option<&DestRecord> {
        self.indexes.get(&(endpoint, scope.clone()))?.get(key)
    }

    pub fn index(&self, endpoint: Endpoint, scope: &Scope) -> Option<&CacheIndex> {
        self.indexes.get(&(endpoint, scope.clone()))
    }

    /// Insert or replace an entry after a write.
    pub fn record(&mut self, endpoint: Endpoint, scope: &Scope, key: String, record: DestRecord) {
        self.indexes
            .entry((endpoint, scope.clone()))
            .or_default()
            .entries
            .insert(key, record);
    }

    /// Number of bulk reads issued so far.
    pub fn reads(&self) -> usize {
        self.reads
    }
}
