//! Stale re-assertions and their corrective resync.

use std::time::Duration;

use toggle_engine::{ResyncKind, Transition};
use toggle_types::HostValue;

use crate::common::{BOUNCE, FlakyStore, RecordingHost, attach_all, engine, names, switch};

#[tokio::test(start_paused = true)]
async fn reasserting_on_bounces_without_write_or_propagation() {
    let store = FlakyStore::new();
    let host = RecordingHost::new();
    let engine = engine(&store);
    let sw = attach_all(
        &engine,
        &host,
        vec![switch("A"), switch("B").with_depends_on(names(&["A"]))],
    )
    .await;

    assert_eq!(sw[0].request_state(true).await.unwrap(), Transition::Applied);
    // B followed A on; force it back off so a second propagation would be visible.
    assert_eq!(sw[1].request_state(false).await.unwrap(), Transition::Applied);
    store.clear_writes();
    host.clear();

    assert_eq!(sw[0].request_state(true).await.unwrap(), Transition::Bounced);
    assert!(store.writes().is_empty());
    assert!(!sw[1].current_state());
    assert_eq!(engine.scheduler().pending(sw[0].name()), Some(ResyncKind::Bounce));
    assert!(host.signals().is_empty());

    tokio::time::sleep(BOUNCE + Duration::from_millis(10)).await;
    assert_eq!(host.resyncs("A"), vec![HostValue::On(false)]);
    assert!(host.updates("A").is_empty());
    // The bounce only touches the host; the switch stays on until the host echoes.
    assert!(sw[0].current_state());
    assert_eq!(store.peek("A"), Some(true));
}

#[tokio::test(start_paused = true)]
async fn echoed_resync_turns_switch_off_and_propagates() {
    let store = FlakyStore::new();
    let host = RecordingHost::new();
    let engine = engine(&store);
    let sw = attach_all(
        &engine,
        &host,
        vec![switch("A"), switch("B").with_depends_off(names(&["A"]))],
    )
    .await;
    store.clear_writes();

    sw[0].request_state(true).await.unwrap();
    sw[1].request_state(true).await.unwrap();
    sw[0].request_state(true).await.unwrap();
    tokio::time::sleep(BOUNCE * 2).await;

    let echo = host.resyncs("A");
    assert_eq!(echo, vec![HostValue::On(false)]);
    sw[0].request_state(echo[0].is_on()).await.unwrap();

    assert!(!sw[0].current_state());
    assert!(!sw[1].current_state());
    assert_eq!(store.peek("B"), Some(false));
}

#[tokio::test(start_paused = true)]
async fn real_transition_cancels_pending_bounce() {
    let store = FlakyStore::new();
    let host = RecordingHost::new();
    let engine = engine(&store);
    let sw = attach_all(&engine, &host, vec![switch("A")]).await;

    sw[0].request_state(true).await.unwrap();
    sw[0].request_state(true).await.unwrap();
    assert_eq!(engine.scheduler().pending(sw[0].name()), Some(ResyncKind::Bounce));

    sw[0].request_state(false).await.unwrap();
    assert_eq!(engine.scheduler().pending(sw[0].name()), None);

    tokio::time::sleep(BOUNCE * 4).await;
    assert!(host.resyncs("A").is_empty());
    assert_eq!(host.updates("A"), vec![HostValue::On(true), HostValue::On(false)]);
}

#[tokio::test(start_paused = true)]
async fn repeated_bounces_collapse_into_one_resync() {
    let store = FlakyStore::new();
    let host = RecordingHost::new();
    let engine = engine(&store);
    let sw = attach_all(&engine, &host, vec![switch("A")]).await;

    sw[0].request_state(true).await.unwrap();
    for _ in 0..3 {
        assert_eq!(sw[0].request_state(true).await.unwrap(), Transition::Bounced);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    tokio::time::sleep(BOUNCE * 2).await;
    assert_eq!(host.resyncs("A").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn off_while_off_is_a_real_transition() {
    let store = FlakyStore::new();
    let host = RecordingHost::new();
    let engine = engine(&store);
    let sw = attach_all(&engine, &host, vec![switch("A")]).await;

    assert_eq!(sw[0].request_state(false).await.unwrap(), Transition::Applied);
    assert_eq!(store.writes(), vec![("A".to_string(), false)]);
    assert_eq!(host.updates("A"), vec![HostValue::On(false)]);
}
