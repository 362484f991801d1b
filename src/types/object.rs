//! Objects served through a view, and the identities used to match them.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display as StrumDisplay};
use utoipa::ToSchema;

use super::group_resource::GroupResource;

/// A namespaced or cluster-scoped object name.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// What the claim matcher looks at: identity only, never content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Candidate<'a> {
    pub group_resource: &'a GroupResource,
    pub namespace: Option<&'a str>,
    pub name: &'a str,
}

impl<'a> Candidate<'a> {
    pub fn new(group_resource: &'a GroupResource, namespace: Option<&'a str>, name: &'a str) -> Self {
        Self {
            group_resource,
            namespace,
            name,
        }
    }

    pub fn from_key(group_resource: &'a GroupResource, key: &'a ObjectKey) -> Self {
        Self::new(group_resource, key.namespace.as_deref(), &key.name)
    }
}

impl Display for Candidate<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.namespace {
            Some(ns) => write!(f, "{}:{ns}/{}", self.group_resource, self.name),
            None => write!(f, "{}:{}", self.group_resource, self.name),
        }
    }
}

/// A stored object. Only the metadata is interpreted here; `data` is
/// opaque to the view layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceObject {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Set by the backing store on every write.
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    #[schema(value_type = Object)]
    pub data: Value,
}

impl ResourceObject {
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.as_deref(), self.name.clone())
    }

    pub fn candidate<'a>(&'a self, group_resource: &'a GroupResource) -> Candidate<'a> {
        Candidate::new(group_resource, self.namespace.as_deref(), &self.name)
    }
}

/// Equality-based label selector; every pair must be present on the object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(transparent)]
pub struct LabelSelector(BTreeMap<String, String>);

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0.iter().all(|(k, v)| labels.get(k) == Some(v))
    }
}

/// Scope for list, watch and delete-collection calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    /// `None` lists across all namespaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "LabelSelector::is_empty")]
    pub label_selector: LabelSelector,
}

impl ListOptions {
    pub fn all_namespaces() -> Self {
        Self::default()
    }

    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn with_labels(mut self, selector: LabelSelector) -> Self {
        self.label_selector = selector;
        self
    }

    /// Whether `object` falls in this list scope.
    pub fn covers(&self, object: &ResourceObject) -> bool {
        let namespace_ok = match &self.namespace {
            Some(ns) => object.namespace.as_deref() == Some(ns.as_str()),
            None => true,
        };
        namespace_ok && self.label_selector.matches(&object.labels)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay, AsRefStr)]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
}

/// One change notification on a watch stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub event_type: WatchEventType,
    pub object: ResourceObject,
}

impl WatchEvent {
    pub fn added(object: ResourceObject) -> Self {
        Self {
            event_type: WatchEventType::Added,
            object,
        }
    }

    pub fn modified(object: ResourceObject) -> Self {
        Self {
            event_type: WatchEventType::Modified,
            object,
        }
    }

    pub fn deleted(object: ResourceObject) -> Self {
        Self {
            event_type: WatchEventType::Deleted,
            object,
        }
    }
}
