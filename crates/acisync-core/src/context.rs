// Per-pass resolution state.
//
// Destination identifiers of already-synced parents, keyed by the source's
// natural names. Later kinds resolve their scopes through these maps.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::record::DestId;

/// Default TEP pool mask when the pod's pool carries none.
pub const DEFAULT_TEP_MASK: u8 = 16;

#[derive(Debug, Clone)]
pub struct FabricRef {
    pub id: DestId,
    pub name: String,
}

/// What the software kind needs to know about each node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub id: DestId,
    pub name: String,
    pub model: String,
    pub serial: String,
    pub device: Option<DestId>,
    pub device_type: Option<DestId>,
}

#[derive(Debug, Clone)]
pub struct SyncContext {
    pub fabric: Option<FabricRef>,
    pub tep_mask: u8,
    pub site: Option<DestId>,
    pub pods: HashMap<String, DestId>,
    pub nodes: HashMap<String, NodeRef>,
    pub tenants: HashMap<String, DestId>,
    pub vrfs: HashMap<(String, String), DestId>,
    pub bridge_domains: HashMap<(String, String), DestId>,
    pub app_profiles: HashMap<(String, String), DestId>,
    pub epgs: HashMap<(String, String, String), DestId>,
    pub esgs: HashMap<(String, String, String), DestId>,
    pub filters: HashMap<(String, String), DestId>,
    pub contracts: HashMap<(String, String), DestId>,
    next_planned: u32,
}

impl Default for SyncContext {
    fn default() -> Self {
        Self {
            fabric: None,
            tep_mask: DEFAULT_TEP_MASK,
            site: None,
            pods: HashMap::new(),
            nodes: HashMap::new(),
            tenants: HashMap::new(),
            vrfs: HashMap::new(),
            bridge_domains: HashMap::new(),
            app_profiles: HashMap::new(),
            epgs: HashMap::new(),
            esgs: HashMap::new(),
            filters: HashMap::new(),
            contracts: HashMap::new(),
            next_planned: 0,
        }
    }
}

fn pair(a: &str, b: &str) -> (String, String) {
    (a.to_owned(), b.to_owned())
}

impl SyncContext {
    /// Identifier for an object a dry run would have created.
    pub fn plan_id(&mut self) -> DestId {
        self.next_planned += 1;
        DestId::Planned(self.next_planned)
    }

    pub fn fabric(&self) -> Result<&FabricRef, CoreError> {
        self.fabric
            .as_ref()
            .ok_or_else(|| CoreError::not_found("fabric", "<fabric not synced>"))
    }

    pub fn pod(&self, pod_id: &str) -> Result<DestId, CoreError> {
        self.pods
            .get(pod_id)
            .copied()
            .ok_or_else(|| CoreError::not_found("pod", pod_id))
    }

    pub fn tenant(&self, name: &str) -> Result<DestId, CoreError> {
        self.tenants
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::not_found("tenant", name))
    }

    pub fn vrf(&self, tenant: &str, name: &str) -> Result<DestId, CoreError> {
        self.vrfs
            .get(&pair(tenant, name))
            .copied()
            .ok_or_else(|| CoreError::not_found("VRF", format!("{tenant}/{name}")))
    }

    pub fn bridge_domain(&self, tenant: &str, name: &str) -> Result<DestId, CoreError> {
        self.bridge_domains
            .get(&pair(tenant, name))
            .copied()
            .ok_or_else(|| CoreError::not_found("bridge domain", format!("{tenant}/{name}")))
    }

    pub fn app_profile(&self, tenant: &str, name: &str) -> Result<DestId, CoreError> {
        self.app_profiles
            .get(&pair(tenant, name))
            .copied()
            .ok_or_else(|| CoreError::not_found("application profile", format!("{tenant}/{name}")))
    }

    pub fn epg(&self, tenant: &str, ap: &str, name: &str) -> Result<DestId, CoreError> {
        self.epgs
            .get(&(tenant.to_owned(), ap.to_owned(), name.to_owned()))
            .copied()
            .ok_or_else(|| CoreError::not_found("EPG", format!("{tenant}/{ap}/{name}")))
    }

    pub fn esg(&self, tenant: &str, ap: &str, name: &str) -> Result<DestId, CoreError> {
        self.esgs
            .get(&(tenant.to_owned(), ap.to_owned(), name.to_owned()))
            .copied()
            .ok_or_else(|| CoreError::not_found("ESG", format!("{tenant}/{ap}/{name}")))
    }

    pub fn filter(&self, tenant: &str, name: &str) -> Result<DestId, CoreError> {
        self.filters
            .get(&pair(tenant, name))
            .copied()
            .ok_or_else(|| CoreError::not_found("contract filter", format!("{tenant}/{name}")))
    }

    /// Contract by name, falling back to the `common` tenant the way ACI
    /// resolves contract references.
    pub fn contract(&self, tenant: &str, name: &str) -> Result<DestId, CoreError> {
        self.contracts
            .get(&pair(tenant, name))
            .or_else(|| self.contracts.get(&pair("common", name)))
            .copied()
            .ok_or_else(|| CoreError::not_found("contract", format!("{tenant}/{name}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn planned_ids_are_unique() {
        let mut ctx = SyncContext::default();
        assert_eq!(ctx.plan_id(), DestId::Planned(1));
        assert_eq!(ctx.plan_id(), DestId::Planned(2));
    }

    #[test]
    fn contract_falls_back_to_common() {
        let mut ctx = SyncContext::default();
        ctx.contracts.insert(pair("common", "web"), DestId::Existing(3));
        assert_eq!(ctx.contract("prod", "web").unwrap(), DestId::Existing(3));
        assert!(matches!(
            ctx.contract("prod", "db"),
            Err(CoreError::NotFound { .. })
        ));
    }
}
