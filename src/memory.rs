//! In-process implementations of the external seams.
//!
//! [`InMemoryAccessor`] is a small object store with watch fan-out, and
//! [`InMemoryGrants`] holds one Export plus the Bindings of its consumers.
//! Both are what the tests and demos run against, and are usable by
//! embedders that keep their objects in memory.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::error::ClaimError;
use crate::traits::{GrantSource, ResourceAccessor, WatchStream};
use crate::types::{
    Binding, Export, GroupResource, ListOptions, ObjectKey, ResourceObject, WatchEvent,
};

const WATCH_BUFFER: usize = 256;

type Store = BTreeMap<(GroupResource, ObjectKey), ResourceObject>;

/// A thread-safe object store keyed by group-resource and object key.
#[derive(Clone)]
pub struct InMemoryAccessor {
    objects: Arc<RwLock<Store>>,
    revision: Arc<AtomicU64>,
    events: broadcast::Sender<(GroupResource, WatchEvent)>,
}

impl Default for InMemoryAccessor {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAccessor {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_BUFFER);
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            revision: Arc::new(AtomicU64::new(0)),
            events,
        }
    }

    /// Number of stored objects of one group-resource.
    pub fn count(&self, group_resource: &GroupResource) -> Result<usize, ClaimError> {
        let guard = self.objects.read()?;
        Ok(guard.keys().filter(|(gr, _)| gr == group_resource).count())
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, group_resource: &GroupResource, event: WatchEvent) {
        // No receivers is fine: nobody is watching.
        let _ = self.events.send((group_resource.clone(), event));
    }
}

#[async_trait]
impl ResourceAccessor for InMemoryAccessor {
    async fn get(
        &self,
        group_resource: &GroupResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, ClaimError> {
        let key = (group_resource.clone(), ObjectKey::new(namespace, name));
        let guard = self.objects.read()?;
        guard
            .get(&key)
            .cloned()
            .ok_or_else(|| ClaimError::not_found(group_resource, name))
    }

    async fn list(
        &self,
        group_resource: &GroupResource,
        options: &ListOptions,
    ) -> Result<Vec<ResourceObject>, ClaimError> {
        let guard = self.objects.read()?;
        Ok(guard
            .iter()
            .filter(|((gr, _), obj)| gr == group_resource && options.covers(obj))
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn watch(
        &self,
        group_resource: &GroupResource,
        options: &ListOptions,
    ) -> Result<WatchStream, ClaimError> {
        let wanted = group_resource.clone();
        let options = options.clone();
        let stream = BroadcastStream::new(self.events.subscribe()).filter_map(move |item| {
            let out = match item {
                Ok((gr, event)) if gr == wanted && options.covers(&event.object) => Some(Ok(event)),
                Ok(_) => None,
                Err(lagged) => {
                    warn!(event = "Watch", phase = "Lagged", error = %lagged);
                    Some(Err(ClaimError::Backend(format!("watch fell behind: {lagged}"))))
                }
            };
            futures::future::ready(out)
        });
        Ok(stream.boxed())
    }

    async fn create(
        &self,
        group_resource: &GroupResource,
        mut object: ResourceObject,
    ) -> Result<ResourceObject, ClaimError> {
        let key = (group_resource.clone(), object.key());
        {
            let mut guard = self.objects.write()?;
            if guard.contains_key(&key) {
                return Err(ClaimError::already_exists(group_resource, &object.name));
            }
            object.resource_version = self.next_revision();
            guard.insert(key, object.clone());
        }
        debug!(event = "Store", phase = "Create", object = %object.key(), resource_version = object.resource_version);
        self.publish(group_resource, WatchEvent::added(object.clone()));
        Ok(object)
    }

    async fn update(
        &self,
        group_resource: &GroupResource,
        mut object: ResourceObject,
    ) -> Result<ResourceObject, ClaimError> {
        let key = (group_resource.clone(), object.key());
        {
            let mut guard = self.objects.write()?;
            let Some(current) = guard.get(&key) else {
                return Err(ClaimError::not_found(group_resource, &object.name));
            };
            if object.resource_version != 0 && object.resource_version != current.resource_version {
                return Err(ClaimError::Conflict {
                    resource: group_resource.to_string(),
                    name: object.name.clone(),
                    reason: format!(
                        "resource version {} is stale, current is {}",
                        object.resource_version, current.resource_version
                    ),
                });
            }
            object.resource_version = self.next_revision();
            guard.insert(key, object.clone());
        }
        self.publish(group_resource, WatchEvent::modified(object.clone()));
        Ok(object)
    }

    async fn delete(
        &self,
        group_resource: &GroupResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, ClaimError> {
        let key = (group_resource.clone(), ObjectKey::new(namespace, name));
        let removed = self
            .objects
            .write()?
            .remove(&key)
            .ok_or_else(|| ClaimError::not_found(group_resource, name))?;
        self.publish(group_resource, WatchEvent::deleted(removed.clone()));
        Ok(removed)
    }
}

/// One Export and the Bindings that consume it, replaceable at any time.
#[derive(Clone, Default)]
pub struct InMemoryGrants {
    export: Arc<RwLock<Export>>,
    bindings: Arc<RwLock<HashMap<String, Binding>>>,
}

impl InMemoryGrants {
    pub fn new(export: Export) -> Self {
        Self {
            export: Arc::new(RwLock::new(export)),
            bindings: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn set_export(&self, export: Export) -> Result<(), ClaimError> {
        *self.export.write()? = export;
        Ok(())
    }

    /// Insert or replace the binding for `binding.consumer`.
    pub fn set_binding(&self, binding: Binding) -> Result<(), ClaimError> {
        self.bindings
            .write()?
            .insert(binding.consumer.clone(), binding);
        Ok(())
    }

    pub fn remove_binding(&self, consumer: &str) -> Result<Option<Binding>, ClaimError> {
        Ok(self.bindings.write()?.remove(consumer))
    }

    pub fn bindings(&self) -> Result<Vec<Binding>, ClaimError> {
        let mut all: Vec<Binding> = self.bindings.read()?.values().cloned().collect();
        all.sort_by(|a, b| a.consumer.cmp(&b.consumer));
        Ok(all)
    }
}

#[async_trait]
impl GrantSource for InMemoryGrants {
    async fn export(&self) -> Result<Export, ClaimError> {
        Ok(self.export.read()?.clone())
    }

    async fn binding(&self, consumer: &str) -> Result<Option<Binding>, ClaimError> {
        Ok(self.bindings.read()?.get(consumer).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configmaps() -> GroupResource {
        GroupResource::core("configmaps")
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let store = InMemoryAccessor::new();
        let created = store
            .create(&configmaps(), ResourceObject::namespaced("consumer-ns-1", "confmap1"))
            .await
            .unwrap();
        assert_eq!(created.resource_version, 1);

        let fetched = store
            .get(&configmaps(), Some("consumer-ns-1"), "confmap1")
            .await
            .unwrap();
        assert_eq!(fetched, created);

        let again = store
            .create(&configmaps(), ResourceObject::namespaced("consumer-ns-1", "confmap1"))
            .await;
        assert!(again.unwrap_err().is_already_exists());

        store.delete(&configmaps(), Some("consumer-ns-1"), "confmap1").await.unwrap();
        let gone = store.get(&configmaps(), Some("consumer-ns-1"), "confmap1").await;
        assert!(gone.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_conflict_on_stale_version() {
        let store = InMemoryAccessor::new();
        let created = store
            .create(&configmaps(), ResourceObject::namespaced("ns", "cm"))
            .await
            .unwrap();
        store.update(&configmaps(), created.clone()).await.unwrap();

        let stale = store.update(&configmaps(), created).await;
        assert!(matches!(stale, Err(ClaimError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_default_delete_collection() {
        let store = InMemoryAccessor::new();
        for name in ["a", "b"] {
            store
                .create(&configmaps(), ResourceObject::namespaced("ns-1", name))
                .await
                .unwrap();
        }
        store
            .create(&configmaps(), ResourceObject::namespaced("ns-2", "c"))
            .await
            .unwrap();

        let deleted = store
            .delete_collection(&configmaps(), &ListOptions::in_namespace("ns-1"))
            .await
            .unwrap();
        assert_eq!(deleted.len(), 2);
        assert_eq!(store.count(&configmaps()).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_watch_filters_by_resource() {
        let store = InMemoryAccessor::new();
        let mut watch = store
            .watch(&configmaps(), &ListOptions::all_namespaces())
            .await
            .unwrap();

        store
            .create(&GroupResource::core("secrets"), ResourceObject::namespaced("ns", "s"))
            .await
            .unwrap();
        store
            .create(&configmaps(), ResourceObject::namespaced("ns", "cm"))
            .await
            .unwrap();

        let event = watch.next().await.unwrap().unwrap();
        assert_eq!(event.object.name, "cm");
    }

    #[tokio::test]
    async fn test_grants_roundtrip() {
        let grants = InMemoryGrants::new(Export::new("wild.wild.west", "abc123"));
        assert!(grants.binding("root:org:consumer").await.unwrap().is_none());

        let binding = Binding {
            name: "b".into(),
            consumer: "root:org:consumer".into(),
            ..Default::default()
        };
        grants.set_binding(binding.clone()).unwrap();
        assert_eq!(grants.binding("root:org:consumer").await.unwrap(), Some(binding));
        assert_eq!(grants.export().await.unwrap().name, "wild.wild.west");
    }
}
