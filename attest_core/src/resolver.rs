//! Endpoint to principal resolution.
//!
//! Several principals may be registered on one address with overlapping
//! port ranges, e.g. a VM owning `1000-2000` and a container inside it
//! owning `1500-1600`. A lookup must answer with the innermost one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::endpoint::{Endpoint, PortRange};
use crate::error::{BrokerError, Result};
use crate::registry::{Principal, Registry};

/// Rule deciding when a later matching principal displaces the current one.
///
/// Candidates are always scanned in registration order and only principals
/// whose range contains the queried port are considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionPolicy {
    /// A candidate wins if its range lies inside the current best's range.
    ///
    /// Equal ranges go to the later registration. A candidate that only
    /// partially overlaps the current best never displaces it.
    #[default]
    Nested,

    /// A candidate wins if its range *starts* inside the current best's
    /// range, wherever it ends. Kept for compatibility with deployments
    /// that relied on the looser rule.
    StartWithin,
}

impl ResolutionPolicy {
    fn displaces(self, best: &PortRange, candidate: &PortRange) -> bool {
        match self {
            Self::Nested => best.contains_range(candidate),
            Self::StartWithin => best.starts_within(candidate),
        }
    }
}

impl fmt::Display for ResolutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nested => write!(f, "nested"),
            Self::StartWithin => write!(f, "start-within"),
        }
    }
}

impl FromStr for ResolutionPolicy {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "nested" => Ok(Self::Nested),
            "start-within" | "start_within" | "legacy" => Ok(Self::StartWithin),
            _ => Err(BrokerError::Config(format!(
                "invalid resolution policy: {}",
                s
            ))),
        }
    }
}

/// Resolves caller endpoints to registered principals.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeResolver {
    policy: ResolutionPolicy,
}

impl RangeResolver {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    /// Find the most specific principal whose range contains the endpoint.
    pub fn resolve(&self, registry: &Registry, endpoint: &Endpoint) -> Result<Principal> {
        let candidates = registry.principals_where(|p| p.endpoint.matches(endpoint));

        let found = candidates.into_iter().fold(None, |best: Option<Principal>, candidate| {
            match best {
                Some(current)
                    if !self
                        .policy
                        .displaces(&current.endpoint.ports, &candidate.endpoint.ports) =>
                {
                    Some(current)
                }
                _ => Some(candidate),
            }
        });

        match found {
            Some(principal) => {
                debug!(
                    %endpoint,
                    principal = %principal.id,
                    range = %principal.endpoint,
                    "resolved principal"
                );
                Ok(principal)
            }
            None => {
                debug!(%endpoint, "no principal covers endpoint");
                Err(BrokerError::not_found(format!(
                    "no principal registered for {}",
                    endpoint
                )))
            }
        }
    }

    /// Parse `<ipv4>:<port>` and resolve it.
    pub fn resolve_str(&self, registry: &Registry, endpoint: &str) -> Result<Principal> {
        let endpoint: Endpoint = endpoint.parse()?;
        self.resolve(registry, &endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NewPrincipal;

    fn register(registry: &Registry, id: &str, range: &str) {
        registry
            .insert_principal(NewPrincipal {
                id: id.into(),
                image_id: "img".into(),
                endpoint: range.parse().unwrap(),
                config: String::new(),
            })
            .unwrap();
    }

    fn resolve_id(resolver: &RangeResolver, registry: &Registry, endpoint: &str) -> String {
        resolver
            .resolve_str(registry, endpoint)
            .unwrap()
            .id
            .into_inner()
    }

    #[test]
    fn test_deepest_match_wins() {
        let registry = Registry::new();
        register(&registry, "A", "10.0.0.1:1000-2000");
        register(&registry, "B", "10.0.0.1:1500-1600");

        let resolver = RangeResolver::default();
        assert_eq!(resolve_id(&resolver, &registry, "10.0.0.1:1550"), "B");
        assert_eq!(resolve_id(&resolver, &registry, "10.0.0.1:1200"), "A");
        assert_eq!(resolve_id(&resolver, &registry, "10.0.0.1:1600"), "B");
        assert_eq!(resolve_id(&resolver, &registry, "10.0.0.1:1601"), "A");
    }

    #[test]
    fn test_deepest_match_independent_of_registration_order() {
        let registry = Registry::new();
        register(&registry, "inner", "10.0.0.1:1500-1600");
        register(&registry, "outer", "10.0.0.1:1000-2000");

        let resolver = RangeResolver::default();
        assert_eq!(resolve_id(&resolver, &registry, "10.0.0.1:1550"), "inner");
    }

    #[test]
    fn test_three_levels_of_nesting() {
        let registry = Registry::new();
        register(&registry, "vm", "10.0.0.1:0-65535");
        register(&registry, "pod", "10.0.0.1:1000-2000");
        register(&registry, "container", "10.0.0.1:1100-1199");

        let resolver = RangeResolver::default();
        assert_eq!(resolve_id(&resolver, &registry, "10.0.0.1:1150"), "container");
        assert_eq!(resolve_id(&resolver, &registry, "10.0.0.1:1900"), "pod");
        assert_eq!(resolve_id(&resolver, &registry, "10.0.0.1:80"), "vm");
    }

    #[test]
    fn test_address_must_match() {
        let registry = Registry::new();
        register(&registry, "A", "10.0.0.1:1000-2000");

        let err = RangeResolver::default()
            .resolve_str(&registry, "10.0.0.2:1500")
            .unwrap_err();
        assert!(matches!(err, BrokerError::NotFound(_)));
    }

    #[test]
    fn test_no_matching_range() {
        let registry = Registry::new();
        register(&registry, "A", "10.0.0.1:1000-2000");

        let err = RangeResolver::default()
            .resolve_str(&registry, "10.0.0.1:2001")
            .unwrap_err();
        assert!(matches!(err, BrokerError::NotFound(_)));
    }

    #[test]
    fn test_malformed_endpoint() {
        let registry = Registry::new();
        let resolver = RangeResolver::default();
        for input in ["10.0.0.1", "10.0.0.1:x", "nope:80"] {
            assert!(matches!(
                resolver.resolve_str(&registry, input),
                Err(BrokerError::MalformedInput(_))
            ));
        }
    }

    #[test]
    fn test_equal_ranges_go_to_later_registration() {
        let registry = Registry::new();
        register(&registry, "first", "10.0.0.1:1000-2000");
        register(&registry, "second", "10.0.0.1:1000-2000");

        let resolver = RangeResolver::default();
        assert_eq!(resolve_id(&resolver, &registry, "10.0.0.1:1500"), "second");
    }

    #[test]
    fn test_partial_overlap_keeps_earlier_registration() {
        let registry = Registry::new();
        register(&registry, "first", "10.0.0.1:1000-2000");
        register(&registry, "straddling", "10.0.0.1:1500-2500");

        let resolver = RangeResolver::new(ResolutionPolicy::Nested);
        assert_eq!(resolve_id(&resolver, &registry, "10.0.0.1:1800"), "first");
        assert_eq!(resolve_id(&resolver, &registry, "10.0.0.1:2200"), "straddling");
    }

    #[test]
    fn test_start_within_lets_wider_range_win() {
        let registry = Registry::new();
        register(&registry, "first", "10.0.0.1:1000-2000");
        register(&registry, "straddling", "10.0.0.1:1500-2500");

        let resolver = RangeResolver::new(ResolutionPolicy::StartWithin);
        assert_eq!(resolve_id(&resolver, &registry, "10.0.0.1:1800"), "straddling");
    }

    #[test]
    fn test_removed_principal_no_longer_resolves() {
        let registry = Registry::new();
        register(&registry, "A", "10.0.0.1:1000-2000");
        register(&registry, "B", "10.0.0.1:1500-1600");
        registry.remove_principal(&"B".into());

        let resolver = RangeResolver::default();
        assert_eq!(resolve_id(&resolver, &registry, "10.0.0.1:1550"), "A");
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("nested".parse::<ResolutionPolicy>().unwrap(), ResolutionPolicy::Nested);
        assert_eq!(
            "Start-Within".parse::<ResolutionPolicy>().unwrap(),
            ResolutionPolicy::StartWithin
        );
        assert!("deepest".parse::<ResolutionPolicy>().is_err());
    }
}
