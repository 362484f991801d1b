//! The per-request set of claims a consumer has granted.

use serde::Serialize;

use super::claim::AcceptedClaim;
use super::group_resource::GroupResource;

/// Accepted claims for one group-resource, derived fresh for each request.
///
/// Built by [`crate::loader::effective_grant`]; the constructor drops
/// anything not accepted or not on `group_resource`, so holders can rely on
/// every claim inside being live for that group-resource.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct EffectiveGrant {
    group_resource: GroupResource,
    claims: Vec<AcceptedClaim>,
}

impl EffectiveGrant {
    pub fn new(
        group_resource: GroupResource,
        claims: impl IntoIterator<Item = AcceptedClaim>,
    ) -> Self {
        let claims = claims
            .into_iter()
            .filter(|c| c.is_accepted() && c.group_resource() == &group_resource)
            .collect();
        Self {
            group_resource,
            claims,
        }
    }

    /// A grant that authorizes nothing.
    pub fn empty(group_resource: GroupResource) -> Self {
        Self {
            group_resource,
            claims: Vec::new(),
        }
    }

    pub fn group_resource(&self) -> &GroupResource {
        &self.group_resource
    }

    pub fn claims(&self) -> &[AcceptedClaim] {
        &self.claims
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
