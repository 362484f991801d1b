//! The request-path gate for one consumer's view of one claimed resource.
//!
//! A [`ClaimEnforcer`] sits in front of a [`ResourceAccessor`] and applies
//! the consumer's accepted permission claims to every verb. The grant is
//! resolved from the [`GrantSource`] on every call, so a binding or export
//! change applies to the next request with nothing to invalidate.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};
use tracing::{debug, info, warn};

use crate::admission::{AdmissionChain, AdmissionRequest};
use crate::error::ClaimError;
use crate::loader;
use crate::timers::DecisionTimer;
use crate::traits::{GrantSource, ResourceAccessor, ResourceView, WatchStream};
use crate::types::{
    EffectiveGrant, GroupResource, ListOptions, RequestContext, ResourceObject, Verb,
};
use crate::watch::{claim_watch, seeded_table};

const NOT_CLAIMED: &str = "not covered by an accepted permission claim";

/// How a read of an existing but unclaimed object is answered.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ReadDenial {
    /// Answer as if the object did not exist.
    #[default]
    NotFound,
    /// Answer with an explicit denial.
    Forbidden,
}

/// The grant for one request, plus the identity of the export it came from.
#[derive(Debug, Clone)]
pub(crate) struct Resolved {
    pub identity_hash: String,
    pub grant: EffectiveGrant,
}

/// Re-derives a consumer's grant for one group-resource on demand.
#[derive(Clone)]
pub(crate) struct GrantResolver {
    source: Arc<dyn GrantSource>,
    consumer: String,
    group_resource: GroupResource,
}

impl GrantResolver {
    pub(crate) fn new(
        source: Arc<dyn GrantSource>,
        consumer: impl Into<String>,
        group_resource: GroupResource,
    ) -> Self {
        Self {
            source,
            consumer: consumer.into(),
            group_resource,
        }
    }

    pub(crate) fn group_resource(&self) -> &GroupResource {
        &self.group_resource
    }

    pub(crate) fn consumer(&self) -> &str {
        &self.consumer
    }

    /// Fetch fresh Export and Binding snapshots and intersect them.
    ///
    /// No binding, or a binding that references another export, resolves to
    /// an empty grant rather than an error.
    pub(crate) async fn resolve(&self) -> Result<Resolved, ClaimError> {
        let export = self.source.export().await?;
        let grant = match self.source.binding(&self.consumer).await? {
            Some(binding) if binding.export.name == export.name => {
                loader::effective_grant(&export, &binding, &self.group_resource)
            }
            Some(binding) => {
                debug!(
                    event = "Grant",
                    phase = "Binding",
                    consumer = %self.consumer,
                    binding = %binding.name,
                    bound_export = %binding.export.name,
                    export = %export.name,
                    "binding references another export"
                );
                EffectiveGrant::empty(self.group_resource.clone())
            }
            None => EffectiveGrant::empty(self.group_resource.clone()),
        };
        Ok(Resolved {
            identity_hash: export.identity_hash,
            grant,
        })
    }
}

/// One consumer's claim-filtered view of one group-resource.
///
/// Stateless across requests apart from its configuration; clones share the
/// accessor, grant source and admission chain.
#[derive(Clone)]
pub struct ClaimEnforcer {
    resolver: GrantResolver,
    accessor: Arc<dyn ResourceAccessor>,
    read_denial: ReadDenial,
    admission: Arc<AdmissionChain>,
}

impl ClaimEnforcer {
    pub fn new(
        group_resource: GroupResource,
        consumer: impl Into<String>,
        accessor: Arc<dyn ResourceAccessor>,
        grants: Arc<dyn GrantSource>,
    ) -> Self {
        let resolver = GrantResolver::new(grants, consumer, group_resource);
        info!(
            event = "Enforcer",
            phase = "Mount",
            consumer = resolver.consumer(),
            group_resource = %resolver.group_resource()
        );
        Self {
            resolver,
            accessor,
            read_denial: ReadDenial::default(),
            admission: Arc::new(AdmissionChain::empty()),
        }
    }

    pub fn with_read_denial(mut self, read_denial: ReadDenial) -> Self {
        self.read_denial = read_denial;
        self
    }

    pub fn with_admission(mut self, admission: Arc<AdmissionChain>) -> Self {
        self.admission = admission;
        self
    }

    pub fn consumer(&self) -> &str {
        self.resolver.consumer()
    }

    pub fn read_denial(&self) -> ReadDenial {
        self.read_denial
    }

    /// The consumer's current grant for this view's group-resource.
    pub async fn effective_grant(&self) -> Result<EffectiveGrant, ClaimError> {
        Ok(self.resolver.resolve().await?.grant)
    }

    fn gr(&self) -> &GroupResource {
        self.resolver.group_resource()
    }

    fn timer(&self, verb: Verb) -> DecisionTimer {
        DecisionTimer::start(verb, self.gr(), self.consumer())
    }

    /// Requests are only served for the consumer the view was mounted for.
    fn check_consumer(&self, verb: Verb, ctx: &RequestContext) -> Result<(), ClaimError> {
        if ctx.consumer() == self.consumer() {
            return Ok(());
        }
        warn!(
            event = "Enforcer",
            phase = "Consumer",
            verb = %verb,
            mounted = self.consumer(),
            requested = ctx.consumer()
        );
        Err(ClaimError::forbidden(
            verb,
            self.gr(),
            "",
            format!("view is mounted for consumer {}", self.consumer()),
        ))
    }

    fn denied(&self, verb: Verb, object: &ResourceObject) -> ClaimError {
        warn!(
            event = "Decision",
            phase = "Denied",
            verb = %verb,
            consumer = self.consumer(),
            group_resource = %self.gr(),
            object = %object.key()
        );
        ClaimError::forbidden(verb, self.gr(), &object.name, NOT_CLAIMED)
    }

    fn read_denied(&self, object: &ResourceObject) -> ClaimError {
        match self.read_denial {
            ReadDenial::NotFound => {
                debug!(
                    event = "Decision",
                    phase = "Hidden",
                    consumer = self.consumer(),
                    group_resource = %self.gr(),
                    object = %object.key()
                );
                ClaimError::not_found(self.gr(), &object.name)
            }
            ReadDenial::Forbidden => self.denied(Verb::Get, object),
        }
    }

    fn admit(
        &self,
        verb: Verb,
        identity_hash: &str,
        object: Option<&mut ResourceObject>,
    ) -> Result<(), ClaimError> {
        let mut request = AdmissionRequest {
            verb,
            group_resource: self.gr(),
            consumer: self.consumer(),
            identity_hash,
            object,
        };
        self.admission.admit(&mut request)
    }

    /// Gate shared by create and update: the object's declared identity must
    /// be claimed before anything reaches the backend.
    async fn admit_write(
        &self,
        verb: Verb,
        object: &mut ResourceObject,
        timer: &mut DecisionTimer,
    ) -> Result<(), ClaimError> {
        let resolved = self.resolver.resolve().await?;
        if !resolved.grant.covers(&object.candidate(self.gr())) {
            timer.deny();
            return Err(self.denied(verb, object));
        }
        if let Err(e) = self.admit(verb, &resolved.identity_hash, Some(object)) {
            timer.deny();
            return Err(e);
        }
        timer.allow();
        Ok(())
    }
}

#[async_trait]
impl ResourceView for ClaimEnforcer {
    fn group_resource(&self) -> &GroupResource {
        self.gr()
    }

    async fn get(
        &self,
        ctx: &RequestContext,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, ClaimError> {
        self.check_consumer(Verb::Get, ctx)?;
        let mut timer = self.timer(Verb::Get);
        let object = self.accessor.get(self.gr(), namespace, name).await?;
        let resolved = self.resolver.resolve().await?;

        if resolved.grant.covers(&object.candidate(self.gr())) {
            timer.allow();
            Ok(object)
        } else {
            timer.deny();
            Err(self.read_denied(&object))
        }
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        options: &ListOptions,
    ) -> Result<Vec<ResourceObject>, ClaimError> {
        self.check_consumer(Verb::List, ctx)?;
        let mut timer = self.timer(Verb::List);
        let objects = self.accessor.list(self.gr(), options).await?;
        let resolved = self.resolver.resolve().await?;

        let total = objects.len();
        let visible: Vec<ResourceObject> = objects
            .into_iter()
            .filter(|o| resolved.grant.covers(&o.candidate(self.gr())))
            .collect();

        debug!(
            event = "Decision",
            phase = "List",
            consumer = self.consumer(),
            group_resource = %self.gr(),
            total,
            visible = visible.len()
        );
        timer.allow();
        Ok(visible)
    }

    async fn watch(
        &self,
        ctx: &RequestContext,
        options: &ListOptions,
    ) -> Result<WatchStream, ClaimError> {
        self.check_consumer(Verb::Watch, ctx)?;
        let mut timer = self.timer(Verb::Watch);

        // Open upstream first so nothing between the snapshot and the stream
        // is lost.
        let upstream = self.accessor.watch(self.gr(), options).await?;
        let existing = self.accessor.list(self.gr(), options).await?;
        let resolved = self.resolver.resolve().await?;
        let table = seeded_table(self.gr(), &existing, |object, gr| {
            resolved.grant.covers(&object.candidate(gr))
        });

        debug!(
            event = "Watch",
            phase = "Open",
            consumer = self.consumer(),
            group_resource = %self.gr(),
            seeded = table.len()
        );
        timer.allow();
        Ok(claim_watch(
            upstream,
            self.resolver.clone(),
            ctx.cancellation().clone(),
            table,
        ))
    }

    async fn create(
        &self,
        ctx: &RequestContext,
        mut object: ResourceObject,
    ) -> Result<ResourceObject, ClaimError> {
        self.check_consumer(Verb::Create, ctx)?;
        let mut timer = self.timer(Verb::Create);
        self.admit_write(Verb::Create, &mut object, &mut timer).await?;
        self.accessor.create(self.gr(), object).await
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        mut object: ResourceObject,
    ) -> Result<ResourceObject, ClaimError> {
        self.check_consumer(Verb::Update, ctx)?;
        let mut timer = self.timer(Verb::Update);
        self.admit_write(Verb::Update, &mut object, &mut timer).await?;
        self.accessor.update(self.gr(), object).await
    }

    async fn delete(
        &self,
        ctx: &RequestContext,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, ClaimError> {
        self.check_consumer(Verb::Delete, ctx)?;
        let mut timer = self.timer(Verb::Delete);

        // Absence wins over claims.
        let existing = self.accessor.get(self.gr(), namespace, name).await?;
        let resolved = self.resolver.resolve().await?;
        if !resolved.grant.covers(&existing.candidate(self.gr())) {
            timer.deny();
            return Err(self.denied(Verb::Delete, &existing));
        }
        if let Err(e) = self.admit(Verb::Delete, &resolved.identity_hash, None) {
            timer.deny();
            return Err(e);
        }
        timer.allow();
        self.accessor.delete(self.gr(), namespace, name).await
    }

    async fn delete_collection(
        &self,
        ctx: &RequestContext,
        options: &ListOptions,
    ) -> Result<Vec<ResourceObject>, ClaimError> {
        self.check_consumer(Verb::DeleteCollection, ctx)?;
        let mut timer = self.timer(Verb::DeleteCollection);
        let objects = self.accessor.list(self.gr(), options).await?;
        let resolved = self.resolver.resolve().await?;
        if let Err(e) = self.admit(Verb::DeleteCollection, &resolved.identity_hash, None) {
            timer.deny();
            return Err(e);
        }
        timer.allow();

        let mut deleted = Vec::new();
        let mut skipped = 0usize;
        for object in objects {
            if !resolved.grant.covers(&object.candidate(self.gr())) {
                skipped += 1;
                continue;
            }
            if ctx.is_cancelled() {
                debug!(
                    event = "Decision",
                    phase = "DeleteCollection",
                    consumer = self.consumer(),
                    deleted = deleted.len(),
                    "request cancelled, stopping"
                );
                break;
            }
            match self
                .accessor
                .delete(self.gr(), object.namespace.as_deref(), &object.name)
                .await
            {
                Ok(gone) => deleted.push(gone),
                // Removed by someone else since the list.
                Err(ClaimError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        debug!(
            event = "Decision",
            phase = "DeleteCollection",
            consumer = self.consumer(),
            group_resource = %self.gr(),
            deleted = deleted.len(),
            skipped
        );
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests;
