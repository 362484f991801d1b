//! Export and Binding snapshots as they arrive from the object cache.
//!
//! These mirror the external API objects field for field. Nothing in this
//! crate mutates them; [`crate::loader`] turns them into typed claims.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::claim::ClaimState;
use super::group_resource::GroupResource;
use super::selector::ResourceSelector;

/// A claim as declared on an Export or echoed on a Binding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct PermissionClaimSpec {
    pub group_resource: GroupResource,
    #[serde(default)]
    pub all: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_selector: Vec<ResourceSelector>,
}

impl PermissionClaimSpec {
    /// A claim scoped by one raw name/namespace pair.
    pub fn narrow(
        group_resource: GroupResource,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            group_resource,
            all: false,
            resource_selector: vec![ResourceSelector::new(name, namespace)],
        }
    }

    pub fn all(group_resource: GroupResource) -> Self {
        Self {
            group_resource,
            all: true,
            resource_selector: Vec::new(),
        }
    }
}

/// The consumer side of a claim: the claim plus the consumer's answer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct AcceptablePermissionClaim {
    #[serde(flatten)]
    pub claim: PermissionClaimSpec,
    #[serde(default)]
    #[schema(value_type = String)]
    pub state: ClaimState,
}

impl AcceptablePermissionClaim {
    pub fn accepted(claim: PermissionClaimSpec) -> Self {
        Self {
            claim,
            state: ClaimState::Accepted,
        }
    }

    pub fn rejected(claim: PermissionClaimSpec) -> Self {
        Self {
            claim,
            state: ClaimState::Rejected,
        }
    }
}

/// A provider's bundle of resource types plus the claims it makes on
/// consumer resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Export {
    pub name: String,
    /// Identity hash of the export. Validity is checked upstream.
    #[serde(default)]
    pub identity_hash: String,
    /// Resource types the export itself serves.
    #[serde(default)]
    pub resources: Vec<GroupResource>,
    #[serde(default)]
    pub permission_claims: Vec<PermissionClaimSpec>,
}

impl Export {
    pub fn new(name: impl Into<String>, identity_hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity_hash: identity_hash.into(),
            ..Default::default()
        }
    }

    pub fn with_resource(mut self, group_resource: GroupResource) -> Self {
        self.resources.push(group_resource);
        self
    }

    pub fn with_claim(mut self, claim: PermissionClaimSpec) -> Self {
        self.permission_claims.push(claim);
        self
    }
}

/// Points a Binding at an Export by workspace path and name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub struct ExportReference {
    pub path: String,
    pub name: String,
}

/// A consumer workspace's attachment to an Export.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub name: String,
    /// The consumer workspace this binding lives in.
    pub consumer: String,
    pub export: ExportReference,
    #[serde(default)]
    pub permission_claims: Vec<AcceptablePermissionClaim>,
}

impl Binding {
    pub fn new(
        name: impl Into<String>,
        consumer: impl Into<String>,
        export: ExportReference,
    ) -> Self {
        Self {
            name: name.into(),
            consumer: consumer.into(),
            export,
            permission_claims: Vec::new(),
        }
    }

    pub fn with_claim(mut self, claim: AcceptablePermissionClaim) -> Self {
        self.permission_claims.push(claim);
        self
    }
}
