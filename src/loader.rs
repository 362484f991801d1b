use itertools::Itertools;
use tracing::debug;

use crate::types::{
    AcceptablePermissionClaim, AcceptedClaim, Binding, ClaimSelector, EffectiveGrant, Export,
    GroupResource, Pattern, PermissionClaim, PermissionClaimSpec,
};

/// Normalize a raw claim into the typed form the matcher uses.
///
/// This is where the wildcard spelling is resolved: `""` and `"*"` in a raw
/// selector both become [`Pattern::Any`].
///
/// Example:
/// ```rust
/// use claimview_core::loader::load_claim;
/// use claimview_core::{GroupResource, PermissionClaimSpec};
///
/// let raw = PermissionClaimSpec::narrow(GroupResource::core("configmaps"), "", "consumer-ns-1");
/// let claim = load_claim(&raw);
/// assert!(claim.selectors[0].name.is_any());
/// ```
pub fn load_claim(spec: &PermissionClaimSpec) -> PermissionClaim {
    let selectors = spec
        .resource_selector
        .iter()
        .map(|s| ClaimSelector::new(Pattern::from_raw(&s.name), Pattern::from_raw(&s.namespace)))
        .unique()
        .collect();
    PermissionClaim {
        group_resource: spec.group_resource.clone(),
        all: spec.all,
        selectors,
    }
}

/// Normalize the consumer's claims, keeping their acceptance state.
pub fn load_accepted(claims: &[AcceptablePermissionClaim]) -> Vec<AcceptedClaim> {
    claims
        .iter()
        .map(|c| AcceptedClaim::new(load_claim(&c.claim), c.state))
        .collect()
}

/// The claims an export offers for one group-resource.
pub fn offered_claims(export: &Export, group_resource: &GroupResource) -> Vec<PermissionClaim> {
    export
        .permission_claims
        .iter()
        .filter(|c| &c.group_resource == group_resource)
        .map(load_claim)
        .collect()
}

/// Every group-resource an export makes claims on, in declaration order.
pub fn claimed_resources(export: &Export) -> Vec<GroupResource> {
    export
        .permission_claims
        .iter()
        .map(|c| c.group_resource.clone())
        .unique()
        .collect()
}

/// Narrow what a consumer accepted by what the provider offered.
///
/// `all` on either side defers to the other side. Otherwise the selector
/// lists intersect pairwise. Returns `None` when nothing survives.
pub fn narrow(offered: &PermissionClaim, accepted: &PermissionClaim) -> Option<PermissionClaim> {
    if offered.group_resource != accepted.group_resource {
        return None;
    }

    let narrowed = match (offered.all, accepted.all) {
        (true, _) => accepted.clone(),
        (false, true) => offered.clone(),
        (false, false) => PermissionClaim::with_selectors(
            offered.group_resource.clone(),
            offered
                .selectors
                .iter()
                .cartesian_product(accepted.selectors.iter())
                .filter_map(|(o, a)| o.intersect(a))
                .unique()
                .collect(),
        ),
    };

    if narrowed.is_empty() {
        None
    } else {
        Some(narrowed)
    }
}

/// Compute the grant a binding gives for one group-resource of an export.
///
/// A consumer claim contributes only if it is accepted and the export
/// actually offers a claim on the same group-resource; what it contributes
/// is its intersection with each offered claim. Pure: no state is kept
/// between calls, so callers re-derive it on every request.
pub fn effective_grant(
    export: &Export,
    binding: &Binding,
    group_resource: &GroupResource,
) -> EffectiveGrant {
    let offered = offered_claims(export, group_resource);
    if offered.is_empty() {
        debug!(
            event = "Grant",
            phase = "Offered",
            export = %export.name,
            group_resource = group_resource.to_string(),
            "export makes no claim on this resource"
        );
        return EffectiveGrant::empty(group_resource.clone());
    }

    let accepted = load_accepted(&binding.permission_claims);
    let narrowed = accepted
        .iter()
        .filter(|c| c.is_accepted() && c.group_resource() == group_resource)
        .flat_map(|c| {
            offered
                .iter()
                .filter_map(move |o| narrow(o, &c.claim))
                .map(AcceptedClaim::accepted)
        })
        .unique()
        .collect::<Vec<_>>();

    debug!(
        event = "Grant",
        phase = "Resolved",
        export = %export.name,
        binding = %binding.name,
        consumer = %binding.consumer,
        group_resource = group_resource.to_string(),
        claims = narrowed.len()
    );

    EffectiveGrant::new(group_resource.clone(), narrowed)
}
