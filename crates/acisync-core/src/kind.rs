// Entity kinds, their fixed execution order and dependency graph, and the
// only/skip selection the CLI builds from the kind vocabulary.

use std::collections::BTreeSet;

use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::error::CoreError;

/// One category of synchronized object.
///
/// Variant order is execution order: every kind appears after all of the
/// kinds it `requires()`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Fabric,
    Pods,
    Nodes,
    Tenants,
    Vrfs,
    #[strum(serialize = "bds")]
    #[serde(rename = "bds")]
    BridgeDomains,
    Subnets,
    #[strum(serialize = "aps")]
    #[serde(rename = "aps")]
    AppProfiles,
    Epgs,
    Esgs,
    ContractFilters,
    Contracts,
    #[strum(serialize = "contract-relationships")]
    #[serde(rename = "contract-relationships")]
    ContractRelations,
    Software,
}

impl EntityKind {
    /// All kinds in dependency order.
    pub fn ordered() -> impl Iterator<Item = EntityKind> {
        Self::iter()
    }

    /// Kinds whose destination identifiers this kind references.
    pub fn requires(self) -> &'static [EntityKind] {
        use EntityKind as K;
        match self {
            K::Fabric => &[],
            K::Pods | K::Tenants => &[K::Fabric],
            K::Nodes => &[K::Fabric, K::Pods],
            K::Vrfs | K::AppProfiles | K::ContractFilters => &[K::Tenants],
            K::BridgeDomains => &[K::Tenants, K::Vrfs],
            K::Subnets => &[K::BridgeDomains],
            K::Epgs => &[K::AppProfiles, K::BridgeDomains],
            K::Esgs => &[K::AppProfiles, K::Vrfs],
            K::Contracts => &[K::Tenants, K::ContractFilters],
            K::ContractRelations => &[K::Contracts, K::Epgs, K::Esgs, K::Vrfs],
            K::Software => &[K::Nodes],
        }
    }

    /// Transitive closure of `requires()`.
    pub fn all_requirements(self) -> BTreeSet<EntityKind> {
        let mut out = BTreeSet::new();
        let mut stack: Vec<EntityKind> = self.requires().to_vec();
        while let Some(k) = stack.pop() {
            if out.insert(k) {
                stack.extend_from_slice(k.requires());
            }
        }
        out
    }

    /// Whether the source query for this kind can be narrowed to one tenant.
    pub fn is_tenant_scoped(self) -> bool {
        !matches!(
            self,
            Self::Fabric | Self::Pods | Self::Nodes | Self::Software
        )
    }

    /// Expand one word of the CLI vocabulary into kinds.
    ///
    /// `contracts` names the whole contract family; the individual
    /// contract kinds are accepted by their own names too.
    pub fn from_vocabulary(word: &str) -> Result<Vec<EntityKind>, CoreError> {
        let word = word.trim().to_ascii_lowercase();
        match word.as_str() {
            "contracts" => Ok(vec![
                Self::ContractFilters,
                Self::Contracts,
                Self::ContractRelations,
            ]),
            "bridge-domains" => Ok(vec![Self::BridgeDomains]),
            "app-profiles" => Ok(vec![Self::AppProfiles]),
            other => other.parse::<EntityKind>().map(|k| vec![k]).map_err(|_| {
                CoreError::Internal(format!(
                    "unknown entity kind '{other}' (expected one of: {})",
                    Self::vocabulary().join(", ")
                ))
            }),
        }
    }

    /// The user-facing vocabulary, in execution order.
    pub fn vocabulary() -> Vec<&'static str> {
        vec![
            "fabric", "pods", "nodes", "tenants", "vrfs", "bds", "subnets", "aps", "epgs", "esgs",
            "contracts", "software",
        ]
    }
}

// ── Selection ────────────────────────────────────────────────────────

/// Which kinds a pass synchronizes. Include and exclude lists are mutually
/// exclusive by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    All,
    Only(BTreeSet<EntityKind>),
    Skip(BTreeSet<EntityKind>),
}

impl Selection {
    /// Build from CLI words. Passing both lists is an error.
    pub fn from_words(only: &[String], skip: &[String]) -> Result<Self, CoreError> {
        if !only.is_empty() && !skip.is_empty() {
            return Err(CoreError::Internal(
                "--only and --skip cannot be combined".into(),
            ));
        }
        let expand = |words: &[String]| -> Result<BTreeSet<EntityKind>, CoreError> {
            let mut set = BTreeSet::new();
            for w in words {
                set.extend(EntityKind::from_vocabulary(w)?);
            }
            Ok(set)
        };
        if !only.is_empty() {
            Ok(Self::Only(expand(only)?))
        } else if !skip.is_empty() {
            Ok(Self::Skip(expand(skip)?))
        } else {
            Ok(Self::All)
        }
    }

    pub fn includes(&self, kind: EntityKind) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(&kind),
            Self::Skip(set) => !set.contains(&kind),
        }
    }

    /// Selected kinds in execution order.
    pub fn selected(&self) -> Vec<EntityKind> {
        EntityKind::ordered().filter(|k| self.includes(*k)).collect()
    }

    /// Unselected kinds that selected kinds depend on, in execution order.
    pub fn prerequisites(&self) -> Vec<EntityKind> {
        let mut needed = BTreeSet::new();
        for kind in self.selected() {
            needed.extend(kind.all_requirements());
        }
        EntityKind::ordered()
            .filter(|k| needed.contains(k) && !self.includes(*k))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn order_respects_dependencies() {
        let order: Vec<EntityKind> = EntityKind::ordered().collect();
        for (pos, kind) in order.iter().enumerate() {
            for req in kind.requires() {
                let req_pos = order.iter().position(|k| k == req).unwrap();
                assert!(req_pos < pos, "{kind} runs before its prerequisite {req}");
            }
        }
    }

    #[test]
    fn vocabulary_round_trips() {
        assert_eq!(EntityKind::BridgeDomains.to_string(), "bds");
        assert_eq!("aps".parse::<EntityKind>().unwrap(), EntityKind::AppProfiles);
        assert_eq!(
            EntityKind::from_vocabulary("contracts").unwrap(),
            vec![
                EntityKind::ContractFilters,
                EntityKind::Contracts,
                EntityKind::ContractRelations
            ]
        );
        assert!(EntityKind::from_vocabulary("widgets").is_err());
    }

    #[test]
    fn only_and_skip_are_exclusive() {
        let err = Selection::from_words(&["vrfs".into()], &["bds".into()]);
        assert!(err.is_err());
    }

    #[test]
    fn only_vrfs_resolves_fabric_and_tenants() {
        let sel = Selection::from_words(&["vrfs".into()], &[]).unwrap();
        assert_eq!(sel.selected(), vec![EntityKind::Vrfs]);
        assert_eq!(
            sel.prerequisites(),
            vec![EntityKind::Fabric, EntityKind::Tenants]
        );
    }

    #[test]
    fn skip_removes_kinds() {
        let sel = Selection::from_words(&[], &["software".into(), "contracts".into()]).unwrap();
        let selected = sel.selected();
        assert!(!selected.contains(&EntityKind::Software));
        assert!(!selected.contains(&EntityKind::ContractRelations));
        assert!(selected.contains(&EntityKind::Tenants));
        assert!(sel.prerequisites().is_empty());
    }
}
