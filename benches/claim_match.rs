use claimview_core::loader::effective_grant;
use claimview_core::{
    AcceptablePermissionClaim, AcceptedClaim, Binding, Candidate, ClaimSelector, Export,
    ExportReference, GroupResource, Pattern, PermissionClaim, PermissionClaimSpec, matches,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn configmaps() -> GroupResource {
    GroupResource::core("configmaps")
}

/// `claims` claims of `selectors` exact selectors each; none match the
/// benchmark candidate, so every selector is visited.
fn miss_grants(claims: usize, selectors: usize) -> Vec<AcceptedClaim> {
    (0..claims)
        .map(|c| {
            let sels = (0..selectors)
                .map(|s| {
                    ClaimSelector::new(
                        Pattern::exact(format!("cm-{c}-{s}")),
                        Pattern::exact(format!("ns-{s}")),
                    )
                })
                .collect();
            AcceptedClaim::accepted(PermissionClaim::with_selectors(configmaps(), sels))
        })
        .collect()
}

fn benchmark_matches(c: &mut Criterion) {
    let mut group = c.benchmark_group("claim_match");
    let gr = configmaps();
    let candidate = Candidate::new(&gr, Some("consumer-ns-1"), "confmap1");

    for (claims, selectors) in [(1, 1), (4, 8), (16, 32)] {
        let grants = miss_grants(claims, selectors);
        group.bench_with_input(
            BenchmarkId::new("miss", format!("{claims}x{selectors}")),
            &grants,
            |b, g| b.iter(|| black_box(matches(black_box(&candidate), g))),
        );
    }

    let all = vec![AcceptedClaim::accepted(PermissionClaim::all(configmaps()))];
    group.bench_function("all", |b| {
        b.iter(|| black_box(matches(black_box(&candidate), &all)))
    });

    group.finish();
}

fn benchmark_effective_grant(c: &mut Criterion) {
    let export = Export::new("wild.wild.west", "abc123")
        .with_claim(PermissionClaimSpec::all(configmaps()))
        .with_claim(PermissionClaimSpec::narrow(configmaps(), "", "consumer-ns-1"));
    let mut binding = Binding::new(
        "wild-west",
        "root:org:consumer",
        ExportReference {
            path: "root:org:provider".into(),
            name: "wild.wild.west".into(),
        },
    );
    for i in 0..16 {
        binding = binding.with_claim(AcceptablePermissionClaim::accepted(
            PermissionClaimSpec::narrow(configmaps(), format!("cm-{i}"), "*"),
        ));
    }

    let gr = configmaps();
    c.bench_function("effective_grant", |b| {
        b.iter(|| black_box(effective_grant(black_box(&export), &binding, &gr)))
    });
}

criterion_group!(benches, benchmark_matches, benchmark_effective_grant);
criterion_main!(benches);
