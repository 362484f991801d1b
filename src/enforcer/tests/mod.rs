use super::*;
use crate::memory::{InMemoryAccessor, InMemoryGrants};
use crate::types::{
    AcceptablePermissionClaim, Binding, Export, ExportReference, PermissionClaimSpec,
};
use yare::parameterized;


const EXPORT: &str = "wild.wild.west";
const IDENTITY: &str = "abc123";
const CONSUMER: &str = "root:org:consumer";

fn configmaps() -> GroupResource {
    GroupResource::core("configmaps")
}

fn export() -> Export {
    Export::new(EXPORT, IDENTITY)
        .with_resource(GroupResource::new(EXPORT, "sheriffs"))
        .with_claim(PermissionClaimSpec::all(configmaps()))
}

fn binding_accepting(name: &str, namespace: &str) -> Binding {
    Binding::new(
        "wild-west",
        CONSUMER,
        ExportReference {
            path: "root:org:provider".into(),
            name: EXPORT.into(),
        },
    )
    .with_claim(AcceptablePermissionClaim::accepted(PermissionClaimSpec::narrow(
        configmaps(),
        name,
        namespace,
    )))
}

struct Fixture {
    store: InMemoryAccessor,
    grants: InMemoryGrants,
    view: ClaimEnforcer,
    ctx: RequestContext,
}

/// A store, a grant source holding `binding`, and the consumer's view of
/// configmaps over both.
fn fixture(binding: Option<Binding>) -> Fixture {
    let store = InMemoryAccessor::new();
    let grants = InMemoryGrants::new(export());
    if let Some(binding) = binding {
        grants.set_binding(binding).unwrap();
    }
    let view = ClaimEnforcer::new(
        configmaps(),
        CONSUMER,
        Arc::new(store.clone()),
        Arc::new(grants.clone()),
    );
    Fixture {
        store,
        grants,
        view,
        ctx: RequestContext::new(CONSUMER),
    }
}

/// Write directly to the backing store, bypassing the view.
async fn seed(store: &InMemoryAccessor, namespace: &str, name: &str) -> ResourceObject {
    store
        .create(&configmaps(), ResourceObject::namespaced(namespace, name))
        .await
        .unwrap()
}

#[parameterized(
    wildcard_name_in_ns = { "*", "consumer-ns-1", "consumer-ns-1", "confmap1", true },
    wildcard_name_other_ns = { "*", "consumer-ns-1", "consumer-ns-2", "confmap1", false },
    name_any_ns = { "confmap1", "*", "consumer-ns-2", "confmap1", true },
    other_name_any_ns = { "confmap1", "", "consumer-ns-2", "unique", false },
    exact = { "unique", "consumer-ns-1", "consumer-ns-1", "unique", true },
)]
#[test_macro(tokio::test)]
async fn test_create_gate(
    claim_name: &str,
    claim_ns: &str,
    namespace: &str,
    name: &str,
    allowed: bool,
) {
    let f = fixture(Some(binding_accepting(claim_name, claim_ns)));
    let result = f
        .view
        .create(&f.ctx, ResourceObject::namespaced(namespace, name))
        .await;
    assert_eq!(result.is_ok(), allowed, "{result:?}");
    if !allowed {
        assert!(result.unwrap_err().is_forbidden());
        assert_eq!(f.store.count(&configmaps()).unwrap(), 0);
    }
}

#[tokio::test]
async fn test_no_binding_denies_everything() {
    let f = fixture(None);
    seed(&f.store, "consumer-ns-1", "confmap1").await;

    let created = f
        .view
        .create(&f.ctx, ResourceObject::namespaced("consumer-ns-1", "other"))
        .await;
    assert!(created.unwrap_err().is_forbidden());

    let listed = f
        .view
        .list(&f.ctx, &ListOptions::all_namespaces())
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_binding_for_other_export_grants_nothing() {
    let mut binding = binding_accepting("*", "*");
    binding.export.name = "other.export".into();
    let f = fixture(Some(binding));

    assert!(f.view.effective_grant().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_claim_grants_nothing() {
    let binding = Binding::new(
        "wild-west",
        CONSUMER,
        ExportReference {
            path: "root:org:provider".into(),
            name: EXPORT.into(),
        },
    )
    .with_claim(AcceptablePermissionClaim::rejected(PermissionClaimSpec::all(
        configmaps(),
    )));
    let f = fixture(Some(binding));

    let result = f
        .view
        .create(&f.ctx, ResourceObject::namespaced("consumer-ns-1", "confmap1"))
        .await;
    assert!(result.unwrap_err().is_forbidden());
}

#[tokio::test]
async fn test_grant_changes_apply_to_next_request() {
    let f = fixture(Some(binding_accepting("*", "consumer-ns-1")));
    seed(&f.store, "consumer-ns-2", "confmap1").await;
    assert!(f.view.list(&f.ctx, &ListOptions::all_namespaces()).await.unwrap().is_empty());

    f.grants
        .set_binding(binding_accepting("*", "consumer-ns-2"))
        .unwrap();
    let listed = f.view.list(&f.ctx, &ListOptions::all_namespaces()).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_export_narrows_consumer_claim() {
    let f = fixture(Some(binding_accepting("*", "*")));
    f.grants
        .set_export(
            Export::new(EXPORT, IDENTITY).with_claim(PermissionClaimSpec::narrow(
                configmaps(),
                "*",
                "consumer-ns-1",
            )),
        )
        .unwrap();

    let outside = f
        .view
        .create(&f.ctx, ResourceObject::namespaced("consumer-ns-2", "confmap1"))
        .await;
    assert!(outside.unwrap_err().is_forbidden());

    let inside = f
        .view
        .create(&f.ctx, ResourceObject::namespaced("consumer-ns-1", "confmap1"))
        .await;
    assert!(inside.is_ok());
}

#[tokio::test]
async fn test_update_gate() {
    let f = fixture(Some(binding_accepting("*", "consumer-ns-1")));
    let inside = seed(&f.store, "consumer-ns-1", "confmap1").await;
    let outside = seed(&f.store, "consumer-ns-2", "confmap1").await;

    let updated = f
        .view
        .update(&f.ctx, inside.with_label("tier", "gold"))
        .await
        .unwrap();
    assert_eq!(updated.labels.get("tier").map(String::as_str), Some("gold"));

    let denied = f.view.update(&f.ctx, outside.with_label("tier", "gold")).await;
    assert!(denied.unwrap_err().is_forbidden());
    let untouched = f
        .store
        .get(&configmaps(), Some("consumer-ns-2"), "confmap1")
        .await
        .unwrap();
    assert!(untouched.labels.is_empty());
}

#[tokio::test]
async fn test_backend_errors_pass_through() {
    let f = fixture(Some(binding_accepting("*", "*")));
    seed(&f.store, "consumer-ns-1", "confmap1").await;

    let exists = f
        .view
        .create(&f.ctx, ResourceObject::namespaced("consumer-ns-1", "confmap1"))
        .await;
    assert!(exists.unwrap_err().is_already_exists());

    let missing = f
        .view
        .update(&f.ctx, ResourceObject::namespaced("consumer-ns-1", "missing"))
        .await;
    assert!(missing.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_other_consumer_context_is_refused() {
    let f = fixture(Some(binding_accepting("*", "*")));
    seed(&f.store, "consumer-ns-1", "confmap1").await;

    let ctx = RequestContext::new("root:org:someone-else");
    let result = f.view.get(&ctx, Some("consumer-ns-1"), "confmap1").await;
    assert!(result.unwrap_err().is_forbidden());
}

#[tokio::test]
async fn test_admission_chain_labels_created_objects() {
    use crate::admission::{AdmissionOptions, builtin_plugins, claim_label_key};

    let f = fixture(Some(binding_accepting("*", "*")));
    let chain = AdmissionChain::from_options(&AdmissionOptions::default(), &builtin_plugins()).unwrap();
    let view = f.view.clone().with_admission(Arc::new(chain));

    let created = view
        .create(&f.ctx, ResourceObject::namespaced("consumer-ns-1", "confmap1"))
        .await
        .unwrap();
    assert_eq!(
        created.labels.get(&claim_label_key(IDENTITY)).map(String::as_str),
        Some("configmaps")
    );

    let foreign = ResourceObject::namespaced("consumer-ns-1", "confmap2")
        .with_label(claim_label_key("someone-else"), "configmaps");
    let rejected = view.create(&f.ctx, foreign).await.unwrap_err();
    assert!(matches!(rejected, ClaimError::Admission { .. }));
    assert_eq!(f.store.count(&configmaps()).unwrap(), 1);
}
