use std::{collections::HashMap, sync::Arc, time::Duration};

use m3u8_rs::MediaPlaylist;
use sashiko::{DecisionBroker, InitialDecisionResult, InitialEvent};

mod common;
use common::{descriptor, list_event, pre_roll, uri_event, wait_for_held, RecordingHandler};

const START: &str = "2024-05-01T12:00:06Z";

fn context() -> Arc<MediaPlaylist> {
    Arc::new(MediaPlaylist::default())
}

#[tokio::test]
async fn overlapping_concurrent_resolves_share_one_decision() -> anyhow::Result<()> {
    let handler = Arc::new(RecordingHandler::holding());
    let broker = Arc::new(DecisionBroker::new(handler.clone()));

    let first = tokio::spawn({
        let broker = broker.clone();
        let playlist = context();
        async move { broker.resolve(vec![descriptor("x", START)], playlist).await }
    });
    let second = tokio::spawn({
        let broker = broker.clone();
        let playlist = context();
        async move { broker.resolve(vec![descriptor("x", START)], playlist).await }
    });

    wait_for_held(&handler, 1).await;
    // Give the other resolve time to (wrongly) issue a duplicate request.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(handler.times_requested("x"), 1);
    assert_eq!(handler.calls(), 1);

    let request = handler.held_initial.lock().unwrap().pop().unwrap();
    let mut events = HashMap::new();
    events.insert(
        "x".to_string(),
        uri_event("ad-x", &["https://ads.example.com/x.m3u8"]),
    );
    request.finish(InitialDecisionResult {
        events,
        ..Default::default()
    });

    let first = first.await?;
    let second = second.await?;
    // Both callers observe the same resolved event.
    assert_eq!(first.id_to_event["x"].id(), "ad-x");
    assert_eq!(second.id_to_event["x"].id(), "ad-x");
    assert_eq!(handler.times_requested("x"), 1);
    Ok(())
}

#[tokio::test]
async fn each_id_is_decided_at_most_once() {
    let handler = Arc::new(RecordingHandler::resolving(&[
        ("a", uri_event("ad-a", &["https://ads.example.com/a.m3u8"])),
        ("c", uri_event("ad-c", &["https://ads.example.com/c.m3u8"])),
    ]));
    let broker = DecisionBroker::new(handler.clone());

    let first = broker
        .resolve(
            vec![descriptor("a", START), descriptor("b", START)],
            context(),
        )
        .await;
    assert_eq!(first.id_to_event["a"].id(), "ad-a");
    assert!(first.empty_ids.contains("b"));

    // A later fetch sees "a" and "b" again plus a new id: only the new id
    // is requested.
    let second = broker
        .resolve(
            vec![
                descriptor("a", START),
                descriptor("b", START),
                descriptor("c", START),
            ],
            context(),
        )
        .await;
    assert_eq!(second.id_to_event["c"].id(), "ad-c");
    assert_eq!(second.id_to_event.len(), 2);

    assert_eq!(handler.calls(), 2);
    assert_eq!(handler.times_requested("a"), 1);
    assert_eq!(handler.times_requested("b"), 1);
    assert_eq!(handler.times_requested("c"), 1);
}

#[tokio::test]
async fn initial_decision_runs_exactly_once() {
    let handler = Arc::new(RecordingHandler::resolving_initial(
        &[],
        vec![pre_roll("pre-1", "https://ads.example.com/pre.m3u8")],
        vec![InitialEvent::new(
            uri_event("vod-1", &["https://ads.example.com/vod.m3u8"]),
            10.0,
        )],
    ));
    let broker = DecisionBroker::new(handler.clone());

    let first = broker.resolve(Vec::new(), context()).await;
    assert_eq!(first.pre_rolls.len(), 1);
    assert_eq!(first.pre_rolls[0].id(), "pre-1");
    assert_eq!(first.initial_events.len(), 1);

    let second = broker.resolve(Vec::new(), context()).await;
    assert_eq!(second.pre_rolls.len(), 1);
    assert_eq!(second.initial_events.len(), 1);

    assert_eq!(
        handler
            .initial_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
    assert_eq!(handler.calls(), 1);
}

#[tokio::test]
async fn declined_ids_are_never_retried() {
    let handler = Arc::new(RecordingHandler::declining());
    let broker = DecisionBroker::new(handler.clone());

    let first = broker
        .resolve(
            vec![descriptor("a", START), descriptor("b", START)],
            context(),
        )
        .await;
    assert!(first.id_to_event.is_empty());
    assert!(first.empty_ids.contains("a"));
    assert!(first.empty_ids.contains("b"));

    let second = broker.resolve(vec![descriptor("a", START)], context()).await;
    assert!(second.empty_ids.contains("a"));
    assert_eq!(handler.calls(), 1);
}

#[tokio::test]
async fn cancelled_request_degrades_to_no_event() -> anyhow::Result<()> {
    let handler = Arc::new(RecordingHandler::holding());
    let broker = Arc::new(DecisionBroker::new(handler.clone()));

    let resolve = tokio::spawn({
        let broker = broker.clone();
        let playlist = context();
        async move { broker.resolve(vec![descriptor("x", START)], playlist).await }
    });

    wait_for_held(&handler, 1).await;
    let request = handler.held_initial.lock().unwrap().pop().unwrap();
    request.cancel();

    let resolved = resolve.await?;
    assert!(resolved.id_to_event.is_empty());
    assert!(resolved.empty_ids.contains("x"));
    Ok(())
}

#[tokio::test]
async fn events_are_found_by_event_id() {
    let handler = Arc::new(RecordingHandler::resolving_initial(
        &[(
            "a",
            list_event("ad-a", &[("https://ads.example.com/a.m3u8", 15.0)]),
        )],
        vec![pre_roll("pre-1", "https://ads.example.com/pre.m3u8")],
        vec![InitialEvent::new(
            uri_event("vod-1", &["https://ads.example.com/vod.m3u8"]),
            10.0,
        )],
    ));
    let broker = DecisionBroker::new(handler);

    broker.resolve(vec![descriptor("a", START)], context()).await;

    // Via the reverse index.
    assert_eq!(broker.event_for_event_id("ad-a").unwrap().id(), "ad-a");
    // Via the pre-roll and initial collection fallbacks.
    assert_eq!(broker.event_for_event_id("pre-1").unwrap().id(), "pre-1");
    assert_eq!(broker.event_for_event_id("vod-1").unwrap().id(), "vod-1");
    assert!(broker.event_for_event_id("missing").is_none());
}
