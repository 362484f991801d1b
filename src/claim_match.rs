//! The claim-match predicate.
//!
//! Given an object's identity and a set of accepted claims, decide whether
//! any claim covers the object. Claims and selectors are OR-combined; inside
//! one selector the name and namespace checks are AND-combined. There is no
//! "most specific wins": any single satisfied selector is enough.

use serde::Serialize;

use crate::types::{AcceptedClaim, Candidate, EffectiveGrant};

/// Why a candidate matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClaimMatch {
    /// The claim at `claim` has `all` set.
    All { claim: usize },
    /// Selector `selector` of the claim at `claim` accepted the candidate.
    Selector { claim: usize, selector: usize },
}

/// First claim/selector pair that covers `candidate`, or `None`.
///
/// Claims that are not accepted, or that are for another group-resource,
/// are skipped. Group and resource compare as exact strings, so the empty
/// core group only equals the empty group.
pub fn match_reason(candidate: &Candidate<'_>, grants: &[AcceptedClaim]) -> Option<ClaimMatch> {
    for (claim_idx, grant) in grants.iter().enumerate() {
        if !grant.is_accepted() || grant.group_resource() != candidate.group_resource {
            continue;
        }

        if grant.claim.all {
            return Some(ClaimMatch::All { claim: claim_idx });
        }

        if let Some(selector_idx) = grant
            .claim
            .selectors
            .iter()
            .position(|s| s.accepts(candidate.name, candidate.namespace))
        {
            return Some(ClaimMatch::Selector {
                claim: claim_idx,
                selector: selector_idx,
            });
        }
    }
    None
}

/// Does any accepted claim in `grants` cover `candidate`?
///
/// Having no claim for the group-resource is the ordinary "not shared"
/// outcome and yields `false`.
pub fn matches(candidate: &Candidate<'_>, grants: &[AcceptedClaim]) -> bool {
    match_reason(candidate, grants).is_some()
}

impl EffectiveGrant {
    /// Convenience over [`matches`] for a resolved grant.
    pub fn covers(&self, candidate: &Candidate<'_>) -> bool {
        matches(candidate, self.claims())
    }

    pub fn reason(&self, candidate: &Candidate<'_>) -> Option<ClaimMatch> {
        match_reason(candidate, self.claims())
    }
}
