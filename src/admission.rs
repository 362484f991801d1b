//! Ordered admission plugins run on writes through a claimed view.
//!
//! There is no process-wide plugin registry. The set of available plugins
//! and their order are both passed in explicitly when a chain is built,
//! and [`AdmissionOptions::validate`] checks the order against the set.

use std::collections::HashSet;
use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ClaimError;
use crate::types::{GroupResource, ResourceObject, Verb};

/// Label-key prefix reserved for claim bookkeeping.
pub const CLAIM_LABEL_PREFIX: &str = "claims.claimview.io/";

/// The label key an export with `identity_hash` stamps on claimed objects.
pub fn claim_label_key(identity_hash: &str) -> String {
    format!("{CLAIM_LABEL_PREFIX}{identity_hash}")
}

/// One write passing through a claimed view.
#[derive(Debug)]
pub struct AdmissionRequest<'a> {
    pub verb: Verb,
    pub group_resource: &'a GroupResource,
    pub consumer: &'a str,
    /// Identity hash of the export whose claim authorized the write.
    pub identity_hash: &'a str,
    /// The object being written. `None` for deletes.
    pub object: Option<&'a mut ResourceObject>,
}

/// A named admission step. Plugins may rewrite `request.object`, or reject
/// the request with [`ClaimError::Admission`].
pub trait AdmissionPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn admit(&self, request: &mut AdmissionRequest<'_>) -> Result<(), ClaimError>;
}

/// Stamps the export's claim label on objects written through its view.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClaimLabeler;

impl ClaimLabeler {
    pub const NAME: &'static str = "apis.claimview.io/PermissionClaims";
}

impl AdmissionPlugin for ClaimLabeler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn admit(&self, request: &mut AdmissionRequest<'_>) -> Result<(), ClaimError> {
        if !matches!(request.verb, Verb::Create | Verb::Update) || request.identity_hash.is_empty() {
            return Ok(());
        }
        if let Some(object) = request.object.as_mut() {
            object.labels.insert(
                claim_label_key(request.identity_hash),
                request.group_resource.to_string(),
            );
        }
        Ok(())
    }
}

/// Rejects creates that carry another export's claim label.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReservedLabels;

impl ReservedLabels {
    pub const NAME: &'static str = "apis.claimview.io/ReservedLabels";
}

impl AdmissionPlugin for ReservedLabels {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn admit(&self, request: &mut AdmissionRequest<'_>) -> Result<(), ClaimError> {
        if request.verb != Verb::Create {
            return Ok(());
        }
        let Some(object) = request.object.as_ref() else {
            return Ok(());
        };
        let own = claim_label_key(request.identity_hash);
        if let Some(foreign) = object
            .labels
            .keys()
            .find(|k| k.starts_with(CLAIM_LABEL_PREFIX) && **k != own)
        {
            return Err(ClaimError::Admission {
                plugin: Self::NAME.to_string(),
                reason: format!("label {foreign} is reserved for another export"),
            });
        }
        Ok(())
    }
}

/// Every plugin this crate ships, in their recommended order.
pub fn builtin_plugins() -> Vec<Arc<dyn AdmissionPlugin>> {
    vec![Arc::new(ClaimLabeler), Arc::new(ReservedLabels)]
}

/// Which plugins run, and in what order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionOptions {
    /// Plugin names in the order they run.
    pub plugin_order: Vec<String>,
    /// Plugins that are skipped. Each must also appear in `plugin_order`.
    #[serde(default)]
    pub disable_plugins: Vec<String>,
}

impl Default for AdmissionOptions {
    fn default() -> Self {
        Self {
            plugin_order: builtin_plugins()
                .iter()
                .map(|p| p.name().to_string())
                .collect(),
            disable_plugins: Vec::new(),
        }
    }
}

impl AdmissionOptions {
    /// Check the options against the plugins that are actually available.
    /// Returns every problem, not just the first.
    pub fn validate(&self, available: &[Arc<dyn AdmissionPlugin>]) -> Vec<ClaimError> {
        let mut errs = Vec::new();
        let known: HashSet<&str> = available.iter().map(|p| p.name()).collect();

        for dup in self.plugin_order.iter().duplicates() {
            errs.push(ClaimError::Config(format!(
                "admission plugin {dup} is listed more than once"
            )));
        }
        for name in &self.plugin_order {
            if !known.contains(name.as_str()) {
                errs.push(ClaimError::Config(format!(
                    "unknown admission plugin {name}"
                )));
            }
        }
        for name in &self.disable_plugins {
            if !self.plugin_order.contains(name) {
                errs.push(ClaimError::Config(format!(
                    "disabled admission plugin {name} is not in the plugin order"
                )));
            }
        }
        errs
    }
}

/// A built, ordered list of enabled plugins.
#[derive(Clone, Default)]
pub struct AdmissionChain {
    plugins: Vec<Arc<dyn AdmissionPlugin>>,
}

impl AdmissionChain {
    /// An empty chain that admits everything unchanged.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from options, choosing plugins out of `available`.
    pub fn from_options(
        options: &AdmissionOptions,
        available: &[Arc<dyn AdmissionPlugin>],
    ) -> Result<Self, ClaimError> {
        if let Some(first) = options.validate(available).into_iter().next() {
            return Err(first);
        }

        let plugins: Vec<Arc<dyn AdmissionPlugin>> = options
            .plugin_order
            .iter()
            .filter(|name| !options.disable_plugins.contains(name))
            .filter_map(|name| available.iter().find(|p| p.name() == name).cloned())
            .collect();

        info!(
            event = "Admission",
            phase = "Build",
            plugins = plugins.iter().map(|p| p.name()).join(",")
        );
        Ok(Self { plugins })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Run every plugin in order; the first rejection wins.
    pub fn admit(&self, request: &mut AdmissionRequest<'_>) -> Result<(), ClaimError> {
        for plugin in &self.plugins {
            plugin.admit(request)?;
            debug!(
                event = "Admission",
                phase = "Admitted",
                plugin = plugin.name(),
                verb = %request.verb
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for AdmissionChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
