use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::ClaimError;
use crate::types::{
    Binding, Export, GroupResource, ListOptions, RequestContext, ResourceObject, WatchEvent,
};

/// Stream of watch events from a backing store or a view.
pub type WatchStream = BoxStream<'static, Result<WatchEvent, ClaimError>>;

/// The storage interface a view sits in front of.
///
/// Keyed by group-resource, namespace and name. Implementations decide
/// their own timeouts; callers add none.
#[async_trait]
pub trait ResourceAccessor: Send + Sync {
    async fn get(
        &self,
        group_resource: &GroupResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, ClaimError>;

    async fn list(
        &self,
        group_resource: &GroupResource,
        options: &ListOptions,
    ) -> Result<Vec<ResourceObject>, ClaimError>;

    /// Open a change stream for objects within `options`. The stream starts
    /// with the changes after the call; it does not replay existing objects.
    async fn watch(
        &self,
        group_resource: &GroupResource,
        options: &ListOptions,
    ) -> Result<WatchStream, ClaimError>;

    async fn create(
        &self,
        group_resource: &GroupResource,
        object: ResourceObject,
    ) -> Result<ResourceObject, ClaimError>;

    async fn update(
        &self,
        group_resource: &GroupResource,
        object: ResourceObject,
    ) -> Result<ResourceObject, ClaimError>;

    async fn delete(
        &self,
        group_resource: &GroupResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, ClaimError>;

    /// Delete every object within `options`, returning what was deleted.
    async fn delete_collection(
        &self,
        group_resource: &GroupResource,
        options: &ListOptions,
    ) -> Result<Vec<ResourceObject>, ClaimError> {
        let mut deleted = Vec::new();
        for object in self.list(group_resource, options).await? {
            match self
                .delete(group_resource, object.namespace.as_deref(), &object.name)
                .await
            {
                Ok(obj) => deleted.push(obj),
                Err(ClaimError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(deleted)
    }
}

/// Supplies the current Export and Binding snapshots.
///
/// Called on every request. Implementations are typically informer-backed
/// caches and may return an older revision than a previous call did.
#[async_trait]
pub trait GrantSource: Send + Sync {
    async fn export(&self) -> Result<Export, ClaimError>;

    /// The binding through which `consumer` consumes the export, if any.
    async fn binding(&self, consumer: &str) -> Result<Option<Binding>, ClaimError>;
}

/// One group-resource as seen by one consumer.
///
/// Both claim-enforcing and passthrough views implement this, so a router
/// can hand either back. The context's cancellation token bounds any watch
/// opened through the view.
#[async_trait]
pub trait ResourceView: Send + Sync {
    fn group_resource(&self) -> &GroupResource;

    async fn get(
        &self,
        ctx: &RequestContext,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, ClaimError>;

    async fn list(
        &self,
        ctx: &RequestContext,
        options: &ListOptions,
    ) -> Result<Vec<ResourceObject>, ClaimError>;

    async fn watch(
        &self,
        ctx: &RequestContext,
        options: &ListOptions,
    ) -> Result<WatchStream, ClaimError>;

    async fn create(
        &self,
        ctx: &RequestContext,
        object: ResourceObject,
    ) -> Result<ResourceObject, ClaimError>;

    async fn update(
        &self,
        ctx: &RequestContext,
        object: ResourceObject,
    ) -> Result<ResourceObject, ClaimError>;

    async fn delete(
        &self,
        ctx: &RequestContext,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, ClaimError>;

    async fn delete_collection(
        &self,
        ctx: &RequestContext,
        options: &ListOptions,
    ) -> Result<Vec<ResourceObject>, ClaimError>;
}
