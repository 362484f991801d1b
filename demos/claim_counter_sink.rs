//! Example counting allowed and denied decisions per verb through a metrics sink.
//!
//! A consumer accepts a claim on configmaps in `consumer-ns-1` only, then
//! tries to write and read in two namespaces through its view.
//!
//! Run with: cargo run --example claim_counter_sink --features observability

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use claimview_core::metrics::{DecisionStats, MetricsSink};
use claimview_core::{
    AcceptablePermissionClaim, Binding, Export, ExportReference, GroupResource, InMemoryAccessor,
    InMemoryGrants, ListOptions, PermissionClaimSpec, RequestContext, ResourceObject, ResourceView,
    ViewRouter, VirtualOptions, admission::builtin_plugins,
};

/// Counts decisions keyed by `verb/allowed`.
#[derive(Default)]
struct ClaimCounterSink {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl ClaimCounterSink {
    fn print_stats(&self) {
        let Ok(counts) = self.counts.lock() else {
            return;
        };
        println!("\n=== Claim decisions ===");
        for (key, count) in counts.iter() {
            println!("  {key}: {count}");
        }
    }
}

impl MetricsSink for ClaimCounterSink {
    fn on_decision(&self, stats: &DecisionStats) {
        let outcome = if stats.allowed { "allowed" } else { "denied" };
        if let Ok(mut counts) = self.counts.lock() {
            *counts.entry(format!("{}/{outcome}", stats.verb)).or_insert(0) += 1;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let sink = Arc::new(ClaimCounterSink::default());
    claimview_core::metrics::set_sink(sink.clone());

    let configmaps = GroupResource::core("configmaps");
    let export = Export::new("wild.wild.west", "abc123")
        .with_resource(GroupResource::new("wild.wild.west", "sheriffs"))
        .with_claim(PermissionClaimSpec::all(configmaps.clone()));
    let binding = Binding::new(
        "wild-west",
        "root:org:consumer",
        ExportReference {
            path: "root:org:provider".into(),
            name: export.name.clone(),
        },
    )
    .with_claim(AcceptablePermissionClaim::accepted(PermissionClaimSpec::narrow(
        configmaps.clone(),
        "*",
        "consumer-ns-1",
    )));

    let store = InMemoryAccessor::new();
    let grants = InMemoryGrants::new(export.clone());
    grants.set_binding(binding.clone())?;

    let router = ViewRouter::new(
        &export,
        &[binding],
        Arc::new(store.clone()),
        Arc::new(grants),
        &VirtualOptions::default(),
        &builtin_plugins(),
    )?;

    let ctx = RequestContext::new("root:org:consumer");
    let view = router.route(&ctx, &configmaps)?;

    for namespace in ["consumer-ns-1", "consumer-ns-2"] {
        for name in ["confmap1", "confmap2"] {
            match view
                .create(&ctx, ResourceObject::namespaced(namespace, name))
                .await
            {
                Ok(obj) => println!("created {}/{} labels={:?}", namespace, obj.name, obj.labels),
                Err(e) => println!("refused {namespace}/{name}: {e} ({})", e.status_code()),
            }
        }
    }

    let visible = view.list(&ctx, &ListOptions::all_namespaces()).await?;
    println!("visible through the view: {}", visible.len());

    sink.print_stats();
    Ok(())
}
