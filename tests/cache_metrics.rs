mod common;

use std::collections::HashSet;
use std::time::Duration;

use deskroute::application::access::Actor;
use deskroute::application::filters::SpecializationFilter;
use deskroute::application::repos::RepoError;
use metrics_util::debugging::DebuggingRecorder;

use common::harness;

#[tokio::test(start_paused = true)]
async fn engine_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let harness = harness();
    let engine = &harness.engine;
    let filter = SpecializationFilter::default();

    // Miss, then hit.
    let _ = engine
        .fetch_specializations(&filter, false)
        .await
        .expect("cold fetch");
    let _ = engine
        .fetch_specializations(&filter, false)
        .await
        .expect("warm fetch");

    // Two forced refreshes in flight share one backing call.
    harness.backend.set_latency(Duration::from_millis(50));
    let (first, second) = tokio::join!(
        engine.fetch_specializations(&filter, true),
        engine.fetch_specializations(&filter, true),
    );
    first.expect("first forced fetch");
    second.expect("second forced fetch");
    harness.backend.set_latency(Duration::ZERO);

    // Stale read followed by a fallback on a failed refresh.
    let _ = engine.catalog().faqs(None, false).await.expect("faqs");
    tokio::time::advance(Duration::from_secs(301)).await;
    harness
        .backend
        .fail_reads(Some(RepoError::Unavailable("down".into())));
    let fallback = engine
        .fetch_specializations(&filter, false)
        .await
        .expect("stale fallback");
    assert!(fallback.is_stale());
    harness.backend.fail_reads(None);

    // Selective invalidation and a bulk run.
    engine
        .availability()
        .set_one(&Actor::admin(1), 1, false)
        .await
        .expect("availability");
    let outcome = engine
        .bulk_assign(&Actor::admin(1), &[101, 102], 10)
        .await
        .expect("bulk");
    assert!(outcome.is_complete());

    // The FAQ entry outlives three TTLs and is swept.
    tokio::time::advance(Duration::from_secs(3 * 30 * 60 + 1)).await;
    assert!(engine.sweep() >= 1);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "deskroute_cache_hit_total",
        "deskroute_cache_miss_total",
        "deskroute_cache_stale_total",
        "deskroute_cache_invalidated_total",
        "deskroute_cache_swept_total",
        "deskroute_cache_fallback_total",
        "deskroute_fetch_coalesced_total",
        "deskroute_bulk_apply_ms",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
