//! Mounting views per consumer, and composing named virtual workspaces.
//!
//! A [`ViewRouter`] is built once from an Export and the Bindings that
//! consume it. For every bound consumer it mounts a [`ClaimEnforcer`] on
//! each group-resource the export claims, and a [`PassthroughView`] on each
//! resource the export serves itself. Bindings added later need a new
//! router; grant changes on existing bindings do not, since enforcers
//! resolve grants per request.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::admission::{AdmissionChain, AdmissionPlugin};
use crate::enforcer::ClaimEnforcer;
use crate::error::ClaimError;
use crate::loader::claimed_resources;
use crate::options::{VirtualOptions, is_dns1123_label};
use crate::traits::{GrantSource, ResourceAccessor, ResourceView, WatchStream};
use crate::types::{Binding, Export, GroupResource, ListOptions, RequestContext, ResourceObject};

/// Unfiltered access to a resource the export serves itself.
#[derive(Clone)]
pub struct PassthroughView {
    group_resource: GroupResource,
    accessor: Arc<dyn ResourceAccessor>,
}

impl PassthroughView {
    pub fn new(group_resource: GroupResource, accessor: Arc<dyn ResourceAccessor>) -> Self {
        Self {
            group_resource,
            accessor,
        }
    }
}

#[async_trait]
impl ResourceView for PassthroughView {
    fn group_resource(&self) -> &GroupResource {
        &self.group_resource
    }

    async fn get(
        &self,
        _ctx: &RequestContext,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, ClaimError> {
        self.accessor.get(&self.group_resource, namespace, name).await
    }

    async fn list(
        &self,
        _ctx: &RequestContext,
        options: &ListOptions,
    ) -> Result<Vec<ResourceObject>, ClaimError> {
        self.accessor.list(&self.group_resource, options).await
    }

    async fn watch(
        &self,
        ctx: &RequestContext,
        options: &ListOptions,
    ) -> Result<WatchStream, ClaimError> {
        let upstream = self.accessor.watch(&self.group_resource, options).await?;
        Ok(upstream
            .take_until(ctx.cancellation().clone().cancelled_owned())
            .boxed())
    }

    async fn create(
        &self,
        _ctx: &RequestContext,
        object: ResourceObject,
    ) -> Result<ResourceObject, ClaimError> {
        self.accessor.create(&self.group_resource, object).await
    }

    async fn update(
        &self,
        _ctx: &RequestContext,
        object: ResourceObject,
    ) -> Result<ResourceObject, ClaimError> {
        self.accessor.update(&self.group_resource, object).await
    }

    async fn delete(
        &self,
        _ctx: &RequestContext,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, ClaimError> {
        self.accessor.delete(&self.group_resource, namespace, name).await
    }

    async fn delete_collection(
        &self,
        _ctx: &RequestContext,
        options: &ListOptions,
    ) -> Result<Vec<ResourceObject>, ClaimError> {
        self.accessor
            .delete_collection(&self.group_resource, options)
            .await
    }
}

type ViewKey = (String, GroupResource);

/// Per-consumer views over one export.
#[derive(Clone, Default)]
pub struct ViewRouter {
    views: HashMap<ViewKey, Arc<dyn ResourceView>>,
}

impl ViewRouter {
    /// Mount views for every binding that references `export`.
    ///
    /// Fails on the first problem `options` has. With `enabled` off the
    /// router is built with nothing mounted.
    pub fn new(
        export: &Export,
        bindings: &[Binding],
        accessor: Arc<dyn ResourceAccessor>,
        grants: Arc<dyn GrantSource>,
        options: &VirtualOptions,
        plugins: &[Arc<dyn AdmissionPlugin>],
    ) -> Result<Self, ClaimError> {
        if let Some(first) = options.validate(plugins).into_iter().next() {
            return Err(first);
        }
        if !options.enabled {
            info!(event = "Router", phase = "Disabled", export = %export.name);
            return Ok(Self::default());
        }

        let admission = Arc::new(AdmissionChain::from_options(&options.admission, plugins)?);
        let claimed = claimed_resources(export);
        let mut views: HashMap<ViewKey, Arc<dyn ResourceView>> = HashMap::new();

        for binding in bindings.iter().filter(|b| b.export.name == export.name) {
            for gr in &export.resources {
                if claimed.contains(gr) {
                    warn!(
                        event = "Router",
                        phase = "Mount",
                        group_resource = %gr,
                        "resource is both served and claimed; mounting the claimed view"
                    );
                    continue;
                }
                views.insert(
                    (binding.consumer.clone(), gr.clone()),
                    Arc::new(PassthroughView::new(gr.clone(), Arc::clone(&accessor))),
                );
            }
            for gr in &claimed {
                let enforcer = ClaimEnforcer::new(
                    gr.clone(),
                    binding.consumer.clone(),
                    Arc::clone(&accessor),
                    Arc::clone(&grants),
                )
                .with_read_denial(options.read_denial)
                .with_admission(Arc::clone(&admission));
                views.insert((binding.consumer.clone(), gr.clone()), Arc::new(enforcer));
            }
        }

        info!(
            event = "Router",
            phase = "Built",
            export = %export.name,
            bindings = bindings.len(),
            views = views.len()
        );
        Ok(Self { views })
    }

    /// The view serving `group_resource` for the request's consumer.
    pub fn route(
        &self,
        ctx: &RequestContext,
        group_resource: &GroupResource,
    ) -> Result<Arc<dyn ResourceView>, ClaimError> {
        let key = (ctx.consumer().to_string(), group_resource.clone());
        match self.views.get(&key) {
            Some(view) => Ok(Arc::clone(view)),
            None => {
                debug!(
                    event = "Router",
                    phase = "Route",
                    consumer = ctx.consumer(),
                    group_resource = %group_resource,
                    "no view mounted"
                );
                Err(ClaimError::not_found(
                    "view",
                    format!("{group_resource} for {}", ctx.consumer()),
                ))
            }
        }
    }

    /// Every mounted (consumer, group-resource) pair, sorted.
    pub fn mounted(&self) -> Vec<ViewKey> {
        let mut keys: Vec<ViewKey> = self.views.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

/// A router published under a virtual workspace name.
#[derive(Clone)]
pub struct NamedVirtualWorkspace {
    pub name: String,
    pub router: Arc<ViewRouter>,
}

impl NamedVirtualWorkspace {
    pub fn new(name: impl Into<String>, router: ViewRouter) -> Self {
        Self {
            name: name.into(),
            router: Arc::new(router),
        }
    }
}

/// The merged set of named virtual workspaces a server exposes.
#[derive(Clone, Default)]
pub struct VirtualWorkspaces {
    by_name: BTreeMap<String, Arc<ViewRouter>>,
}

impl VirtualWorkspaces {
    pub fn get(&self, name: &str) -> Option<Arc<ViewRouter>> {
        self.by_name.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.by_name.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Compose several sets of named workspaces into one.
///
/// Fails on the first name that is not a DNS-1123 label or that appears
/// twice, across sets or within one.
pub fn merge(
    sets: impl IntoIterator<Item = Vec<NamedVirtualWorkspace>>,
) -> Result<VirtualWorkspaces, ClaimError> {
    let mut by_name = BTreeMap::new();
    for workspace in sets.into_iter().flatten() {
        if !is_dns1123_label(&workspace.name) {
            return Err(ClaimError::Config(format!(
                "virtual workspace name {:?} is not a DNS-1123 label",
                workspace.name
            )));
        }
        if by_name.contains_key(&workspace.name) {
            warn!(event = "Router", phase = "Merge", workspace = %workspace.name, "duplicate name");
            return Err(ClaimError::DuplicateWorkspace(workspace.name));
        }
        by_name.insert(workspace.name, workspace.router);
    }
    Ok(VirtualWorkspaces { by_name })
}
