//! Permission claims and their acceptance state.

use std::fmt::{Display, Formatter, Result as FmtResult};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};
use utoipa::ToSchema;

use super::group_resource::GroupResource;
use super::selector::ClaimSelector;

/// A normalized claim on one group-resource.
///
/// When `all` is set the selector list is ignored and every object of the
/// group-resource is covered. Otherwise an object is covered when at least
/// one selector accepts it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub struct PermissionClaim {
    pub group_resource: GroupResource,
    #[serde(default)]
    pub all: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selectors: Vec<ClaimSelector>,
}

impl PermissionClaim {
    /// A claim covering every object of `group_resource`.
    pub fn all(group_resource: GroupResource) -> Self {
        Self {
            group_resource,
            all: true,
            selectors: Vec::new(),
        }
    }

    pub fn with_selectors(group_resource: GroupResource, selectors: Vec<ClaimSelector>) -> Self {
        Self {
            group_resource,
            all: false,
            selectors,
        }
    }

    /// True when this claim covers everything, either through `all` or
    /// through a fully wildcarded selector.
    pub fn is_universal(&self) -> bool {
        self.all || self.selectors.iter().any(ClaimSelector::is_universal)
    }

    /// True when the claim can never match anything.
    pub fn is_empty(&self) -> bool {
        !self.all && self.selectors.is_empty()
    }
}

impl Display for PermissionClaim {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.all {
            write!(f, "{}[all]", self.group_resource)
        } else {
            write!(
                f,
                "{}[{}]",
                self.group_resource,
                self.selectors.iter().join(",")
            )
        }
    }
}

/// The consumer's answer to a claim.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    StrumDisplay,
    EnumString,
    AsRefStr,
)]
pub enum ClaimState {
    Accepted,
    Rejected,
    /// Anything the consumer has not answered, or an unrecognized value.
    #[default]
    #[serde(other)]
    Unknown,
}

/// A claim together with the consumer's acceptance state. Only
/// [`ClaimState::Accepted`] claims take part in enforcement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub struct AcceptedClaim {
    pub claim: PermissionClaim,
    #[schema(value_type = String)]
    pub state: ClaimState,
}

impl AcceptedClaim {
    pub fn new(claim: PermissionClaim, state: ClaimState) -> Self {
        Self { claim, state }
    }

    pub fn accepted(claim: PermissionClaim) -> Self {
        Self::new(claim, ClaimState::Accepted)
    }

    pub fn is_accepted(&self) -> bool {
        self.state == ClaimState::Accepted
    }

    pub fn group_resource(&self) -> &GroupResource {
        &self.claim.group_resource
    }
}
