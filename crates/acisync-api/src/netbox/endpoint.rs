use std::fmt;

/// A NetBox list endpoint the sync touches.
///
/// `path()` is relative to the NetBox base URL and always ends with `/`,
/// so `{path}{id}/` addresses a single object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    // ── ACI plugin ──
    Fabrics,
    Pods,
    Nodes,
    Tenants,
    Vrfs,
    BridgeDomains,
    BridgeDomainSubnets,
    AppProfiles,
    EndpointGroups,
    EndpointSecurityGroups,
    ContractFilters,
    ContractFilterEntries,
    Contracts,
    ContractSubjects,
    ContractRelations,

    // ── DCIM ──
    Devices,
    DeviceTypes,
    Manufacturers,
    Sites,
    DeviceRoles,

    // ── IPAM ──
    IpAddresses,
    Prefixes,

    // ── Software tracker plugin ──
    SoftwareImages,
    GoldenImages,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Fabrics => "api/plugins/aci/fabrics/",
            Self::Pods => "api/plugins/aci/pods/",
            Self::Nodes => "api/plugins/aci/nodes/",
            Self::Tenants => "api/plugins/aci/tenants/",
            Self::Vrfs => "api/plugins/aci/vrfs/",
            Self::BridgeDomains => "api/plugins/aci/bridge-domains/",
            Self::BridgeDomainSubnets => "api/plugins/aci/bridge-domain-subnets/",
            Self::AppProfiles => "api/plugins/aci/app-profiles/",
            Self::EndpointGroups => "api/plugins/aci/endpoint-groups/",
            Self::EndpointSecurityGroups => "api/plugins/aci/endpoint-security-groups/",
            Self::ContractFilters => "api/plugins/aci/contract-filters/",
            Self::ContractFilterEntries => "api/plugins/aci/contract-filter-entries/",
            Self::Contracts => "api/plugins/aci/contracts/",
            Self::ContractSubjects => "api/plugins/aci/contract-subjects/",
            Self::ContractRelations => "api/plugins/aci/contract-relations/",
            Self::Devices => "api/dcim/devices/",
            Self::DeviceTypes => "api/dcim/device-types/",
            Self::Manufacturers => "api/dcim/manufacturers/",
            Self::Sites => "api/dcim/sites/",
            Self::DeviceRoles => "api/dcim/device-roles/",
            Self::IpAddresses => "api/ipam/ip-addresses/",
            Self::Prefixes => "api/ipam/prefixes/",
            Self::SoftwareImages => "api/plugins/netbox_software_tracker/software-image/",
            Self::GoldenImages => "api/plugins/netbox_software_tracker/golden-image/",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path().trim_start_matches("api/").trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_end_with_slash() {
        for ep in [Endpoint::Fabrics, Endpoint::Prefixes, Endpoint::GoldenImages] {
            assert!(ep.path().ends_with('/'), "{ep:?}");
            assert!(ep.path().starts_with("api/"), "{ep:?}");
        }
    }

    #[test]
    fn display_is_short_path() {
        assert_eq!(Endpoint::Vrfs.to_string(), "plugins/aci/vrfs");
        assert_eq!(Endpoint::Devices.to_string(), "dcim/devices");
    }
}
