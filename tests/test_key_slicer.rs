//! End-to-end tests for key-space slicing through the coordinator

mod common;

use common::{key_config, ScriptedProbe};
use index_slicer::{
    KeySpaceSlicer, RecordingObserver, Slice, SlicerConfig, SlicerCoordinator, SlicerError,
    SlicerEvent,
};
use std::sync::Arc;

fn coordinator(probe: Arc<ScriptedProbe>, config: SlicerConfig) -> SlicerCoordinator {
    SlicerCoordinator::new(probe, Arc::new(RecordingObserver::new()), config).unwrap()
}

async fn drain(cursor: &mut KeySpaceSlicer) -> Vec<Slice> {
    let mut slices = Vec::new();
    for _ in 0..10_000 {
        match cursor.next_slice().await.unwrap() {
            Some(slice) => slices.push(slice),
            None => return slices,
        }
    }
    panic!("cursor did not exhaust within 10000 slices");
}

#[tokio::test]
async fn test_produces_one_slice_per_bounded_prefix() {
    common::init_tracing();
    let probe = Arc::new(ScriptedProbe::new(vec![], vec![Ok(100), Ok(100)]));
    let config = key_config(200, Some(vec!['a', 'b']));
    let mut cursors = coordinator(probe, config).key_slicers(&[]).unwrap();
    let cursor = &mut cursors[0];

    assert_eq!(
        cursor.next_slice().await.unwrap(),
        Some(Slice::keyed(100, "events-#a*".to_string()))
    );
    assert_eq!(
        cursor.next_slice().await.unwrap(),
        Some(Slice::keyed(100, "events-#b*".to_string()))
    );
    assert_eq!(cursor.next_slice().await.unwrap(), None);
    assert_eq!(cursor.next_slice().await.unwrap(), None);
}

#[tokio::test]
async fn test_starting_key_depth_expands_without_probing() {
    // depth 3 means the first counted prefixes are three symbols long;
    // nothing shallower is ever probed
    let probe = Arc::new(ScriptedProbe::repeating(vec![], vec![Ok(100)]));
    let config = SlicerConfig {
        starting_key_depth: 3,
        ..key_config(200, Some(vec!['a', 'b', 'c', 'd']))
    };
    let mut cursors = coordinator(probe.clone(), config).key_slicers(&[]).unwrap();
    let cursor = &mut cursors[0];

    for expected in ["events-#a00*", "events-#a01*", "events-#a02*"] {
        assert_eq!(
            cursor.next_slice().await.unwrap(),
            Some(Slice::keyed(100, expected.to_string()))
        );
    }
    for query in probe.queries() {
        let key = query.key.unwrap();
        // strip "events-#" and "*": three path symbols remain
        assert_eq!(key.len(), "events-#".len() + 3 + 1, "probed too shallow: {key}");
    }
}

#[tokio::test]
async fn test_oversized_prefix_descends_into_children() {
    let probe = Arc::new(ScriptedProbe::repeating(
        vec![],
        vec![Ok(100), Ok(500), Ok(200), Ok(200), Ok(100), Ok(0)],
    ));
    let observer = Arc::new(RecordingObserver::new());
    let config = key_config(200, Some(vec!['a', 'b']));
    let coord = SlicerCoordinator::new(probe, observer.clone(), config).unwrap();
    let mut cursors = coord.key_slicers(&[]).unwrap();

    let slices = drain(&mut cursors[0]).await;
    let keys: Vec<&str> = slices.iter().map(|s| s.key.as_deref().unwrap()).collect();

    // b* holds 500 documents and splits; its empty children are skipped
    assert_eq!(
        keys,
        vec!["events-#a*", "events-#b0*", "events-#b1*", "events-#b2*"]
    );
    assert!(observer.saw(|e| matches!(e, SlicerEvent::Recursion)));
}

#[tokio::test]
async fn test_descent_returns_to_the_next_top_level_symbol() {
    // a* splits into all sixteen children; once they are drained the walk
    // pops back up and still visits b*
    let probe = Arc::new(ScriptedProbe::repeating(
        vec![],
        vec![Ok(500), Ok(100)],
    ));
    let config = key_config(200, Some(vec!['a', 'b']));
    let mut cursors = coordinator(probe, config).key_slicers(&[]).unwrap();

    let slices = drain(&mut cursors[0]).await;
    let keys: Vec<&str> = slices.iter().map(|s| s.key.as_deref().unwrap()).collect();

    let mut expected: Vec<String> = "0123456789abcdef"
        .chars()
        .map(|c| format!("events-#a{c}*"))
        .collect();
    expected.push("events-#b*".to_string());
    assert_eq!(keys, expected);
}

#[tokio::test]
async fn test_resume_continues_at_the_next_sibling() {
    // checkpointed at a6: remaining a-children first, then the later
    // top-level symbols
    let probe = Arc::new(ScriptedProbe::repeating(vec![], vec![Ok(100)]));
    let config = key_config(200, None);
    let checkpoint = Some(Slice::keyed(100, "events-#a6*".to_string()));
    let mut cursors = coordinator(probe, config)
        .key_slicers(&[checkpoint])
        .unwrap();

    let slices = drain(&mut cursors[0]).await;
    let keys: Vec<&str> = slices.iter().map(|s| s.key.as_deref().unwrap()).collect();

    assert_eq!(
        &keys[..5],
        &[
            "events-#a7*",
            "events-#a8*",
            "events-#a9*",
            "events-#aa*",
            "events-#ab*"
        ]
    );
    // a7..af then b..f
    assert_eq!(keys.len(), 14);
    assert_eq!(keys.last().unwrap(), &"events-#f*");
}

#[tokio::test]
async fn test_parallel_cursors_split_the_alphabet() {
    let probe = Arc::new(ScriptedProbe::new(vec![], vec![Ok(100), Ok(100)]));
    let config = SlicerConfig {
        slicers: 2,
        ..key_config(200, Some(vec!['a', 'b']))
    };
    let mut cursors = coordinator(probe, config).key_slicers(&[]).unwrap();
    assert_eq!(cursors.len(), 2);

    assert_eq!(drain(&mut cursors[0]).await, vec![Slice::keyed(100, "events-#a*".to_string())]);
    assert_eq!(drain(&mut cursors[1]).await, vec![Slice::keyed(100, "events-#b*".to_string())]);
}

#[tokio::test]
async fn test_transient_probe_failure_is_retried() {
    let probe = Arc::new(ScriptedProbe::new(
        vec![],
        vec![
            Err(SlicerError::PartialShardFailure("shard 2 timed out".to_string())),
            Ok(100),
            Ok(100),
        ],
    ));
    let config = key_config(200, Some(vec!['a', 'b']));
    let mut cursors = coordinator(probe, config).key_slicers(&[]).unwrap();

    let slices = drain(&mut cursors[0]).await;
    assert_eq!(slices.len(), 2);
    assert_eq!(slices[0].key.as_deref(), Some("events-#a*"));
}

#[tokio::test]
async fn test_exhausted_retry_budget_is_fatal() {
    let probe = Arc::new(ScriptedProbe::repeating(
        vec![],
        vec![Err(SlicerError::ProbeFailure("connection reset".to_string()))],
    ));
    let config = SlicerConfig {
        max_retries: 1,
        ..key_config(200, Some(vec!['a', 'b']))
    };
    let mut cursors = coordinator(probe, config).key_slicers(&[]).unwrap();

    let err = cursors[0].next_slice().await.unwrap_err();
    match err {
        SlicerError::RetriesExhausted { identity, attempts } => {
            assert_eq!(identity, "events-#a*");
            assert_eq!(attempts, 2);
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_key_mode_requires_a_key_field() {
    let probe = Arc::new(ScriptedProbe::new(vec![], vec![]));
    let config = SlicerConfig {
        key_field: None,
        ..key_config(200, None)
    };
    let err = coordinator(probe, config).key_slicers(&[]).unwrap_err();
    assert!(matches!(err, SlicerError::ConfigError(_)));
}

#[tokio::test]
async fn test_parallelism_is_capped_by_the_alphabet() {
    let probe = Arc::new(ScriptedProbe::new(vec![], vec![]));

    let config = SlicerConfig {
        slicers: 3,
        ..key_config(200, Some(vec!['a', 'b']))
    };
    let err = coordinator(probe.clone(), config).key_slicers(&[]).unwrap_err();
    assert!(err.to_string().contains("length of key_range"));

    let config = SlicerConfig {
        slicers: 17,
        ..key_config(200, None)
    };
    let err = coordinator(probe, config).key_slicers(&[]).unwrap_err();
    assert!(err.to_string().contains("more than 16"));
}
