//! Data model types for claims, views, and the objects they serve.
//!
//! Canonical string forms:
//! - GroupResource: `configmaps` (core group) or `sheriffs.wild.wild.west`
//! - ClaimSelector: `namespace/name`, with `*` for a wildcard field
//! - PermissionClaim: `configmaps[consumer-ns-1/*]` or `configmaps[all]`
//! - ObjectKey: `namespace/name` or `name` for cluster-scoped objects
//!
//! Wildcards: raw selectors may spell a wildcard as `""` or `"*"`; both
//! normalize to [`Pattern::Any`].

mod api;
mod claim;
mod grant;
mod group_resource;
mod object;
mod request;
mod selector;

pub use api::{AcceptablePermissionClaim, Binding, Export, ExportReference, PermissionClaimSpec};
pub use claim::{AcceptedClaim, ClaimState, PermissionClaim};
pub use grant::EffectiveGrant;
pub use group_resource::GroupResource;
pub use object::{
    Candidate, LabelSelector, ListOptions, ObjectKey, ResourceObject, WatchEvent, WatchEventType,
};
pub use request::{RequestContext, Verb};
pub use selector::{ClaimSelector, Pattern, ResourceSelector, WILDCARD};
