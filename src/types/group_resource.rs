//! Group-resource identifiers.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ClaimError;

/// An API group plus a plural resource name, e.g. `configmaps` (core group)
/// or `sheriffs.wild.wild.west`.
///
/// The empty group is the core API group. It is compared literally and is
/// never treated as a wildcard.
#[derive(
    Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct GroupResource {
    #[serde(default)]
    pub group: String,
    pub resource: String,
}

impl GroupResource {
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }

    /// A resource in the core (empty) API group.
    pub fn core(resource: impl Into<String>) -> Self {
        Self::new("", resource)
    }

    pub fn is_core(&self) -> bool {
        self.group.is_empty()
    }
}

impl Display for GroupResource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.group.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}

impl FromStr for GroupResource {
    type Err = ClaimError;

    /// Accepts `resource` (core group) or `resource.group.with.dots`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource, group) = match s.split_once('.') {
            Some((resource, group)) => (resource, group),
            None => (s, ""),
        };
        if resource.is_empty() {
            return Err(ClaimError::InvalidFormat(format!(
                "Failed to parse group-resource: missing resource in '{s}' (expected format: resource or resource.group)"
            )));
        }
        Ok(GroupResource::new(group, resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        core = { "configmaps", "", "configmaps" },
        grouped = { "sheriffs.wild.wild.west", "wild.wild.west", "sheriffs" },
        single_segment_group = { "deployments.apps", "apps", "deployments" },
    )]
    fn test_parse_group_resource(input: &str, group: &str, resource: &str) {
        let gr = GroupResource::from_str(input).unwrap();
        assert_eq!(gr.group, group);
        assert_eq!(gr.resource, resource);
        assert_eq!(gr.to_string(), input);
    }

    #[test]
    fn test_parse_missing_resource() {
        assert!(GroupResource::from_str(".apps").is_err());
        assert!(GroupResource::from_str("").is_err());
    }

    #[test]
    fn test_core_group_is_not_a_wildcard() {
        assert_ne!(GroupResource::core("configmaps"), GroupResource::new("apps", "configmaps"));
        assert!(GroupResource::core("secrets").is_core());
    }

    #[test]
    fn test_deserialize_without_group() {
        let gr: GroupResource = serde_json::from_str(r#"{"resource":"configmaps"}"#).unwrap();
        assert_eq!(gr, GroupResource::core("configmaps"));
    }
}
