//! End-to-end tests for the Keepsake runtime.
//!
//! These wire the real aggregator, turn pipeline, tools, and in-memory stores
//! together behind a scripted model, and drive them on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use keepsake_agent::test_helpers::{ScriptedProvider, make_text_response, make_tool_call, make_tool_call_response};
use keepsake_agent::{AgentLoop, CannedReplies, TurnPipeline};
use keepsake_batcher::{BatchAggregator, BatchSettings};
use keepsake_channels::Outbox;
use keepsake_core::batch::{Fragment, MediaKind, MediaRef, SenderId};
use keepsake_core::event::{DomainEvent, EventBus};
use keepsake_core::message::Role;
use keepsake_core::store::{NewEvent, Store};
use keepsake_store::{InMemoryMediaStore, InMemoryStore};
use keepsake_tools::{ToolSettings, default_registry};
use serde_json::json;

// ── Harness ──────────────────────────────────────────────────────────────

struct Harness {
    store: Arc<InMemoryStore>,
    outbox: Arc<Outbox>,
    events: Arc<EventBus>,
    provider: Arc<ScriptedProvider>,
    aggregator: BatchAggregator,
}

fn harness(provider: ScriptedProvider, max_iterations: u32, outbox: Outbox) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let outbox = Arc::new(outbox);
    let events = Arc::new(EventBus::default());
    let provider = Arc::new(provider);

    let tools = Arc::new(default_registry(&ToolSettings::default()));
    let agent = AgentLoop::new(provider.clone(), tools, events.clone()).with_max_iterations(max_iterations);
    let pipeline = TurnPipeline::new(
        agent,
        store.clone(),
        Arc::new(InMemoryMediaStore::new()),
        outbox.clone(),
        events.clone(),
    );
    let settings = BatchSettings {
        window: Duration::from_millis(12_500),
        max_fragments: 20,
        separator: "\n".into(),
    };
    let aggregator = BatchAggregator::new(Arc::new(pipeline), settings, events.clone());

    Harness {
        store,
        outbox,
        events,
        provider,
        aggregator,
    }
}

async fn advance(secs: f64) {
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}

fn photo(message_id: &str, reference: &str) -> Fragment {
    Fragment::media(message_id, MediaRef::new(MediaKind::Image, reference), None)
}

/// Content of every tool-result message the model saw on its last call.
fn last_tool_results(provider: &ScriptedProvider) -> Vec<String> {
    provider
        .requests()
        .last()
        .map(|r| {
            r.messages
                .iter()
                .filter(|m| m.role == Role::Tool)
                .map(|m| m.content.clone())
                .collect()
        })
        .unwrap_or_default()
}

// ── Batching ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn album_burst_is_saved_in_order_with_one_reply() {
    let provider = ScriptedProvider::responses(vec![
        make_tool_call_response(vec![make_tool_call("add_batch_memories", json!({"event_id": 1}))], ""),
        make_text_response("Saved all 3 photos to Porto!"),
    ]);
    let h = harness(provider, 5, Outbox::new());
    let ana = h.store.upsert_user(&SenderId::new("100"), Some("Ana")).await.unwrap();
    let trip = h
        .store
        .create_event(ana.id, NewEvent { name: "Porto".into(), ..NewEvent::default() })
        .await
        .unwrap();
    assert_eq!(trip.id, 1);

    let sender = SenderId::new("100");
    h.aggregator.ingest(sender.clone(), photo("m1", "file-a")).unwrap();
    advance(2.0).await;
    h.aggregator.ingest(sender.clone(), photo("m2", "file-b")).unwrap();
    advance(2.0).await;
    h.aggregator.ingest(sender.clone(), photo("m3", "file-c")).unwrap();

    // Last fragment at t=4s, so nothing before t=16.5s.
    advance(12.0).await;
    assert!(h.outbox.is_empty(), "flushed before the window closed");

    advance(1.0).await;
    assert_eq!(h.outbox.sent_to(&sender), vec!["Saved all 3 photos to Porto!"]);

    let memories = h.store.list_memories(trip.id).await.unwrap();
    let sources: Vec<&str> = memories.iter().filter_map(|m| m.source_message_id.as_deref()).collect();
    assert_eq!(sources, vec!["m1", "m2", "m3"]);
    assert!(memories.iter().all(|m| m.media.as_ref().is_some_and(|s| s.kind == MediaKind::Image)));

    // One model turn saw the whole burst as a single user message.
    let first = &h.provider.requests()[0];
    let batch_message = first.messages.last().unwrap();
    assert!(batch_message.content.contains("[media #1: image]"));
    assert!(batch_message.content.contains("[media #3: image]"));
}

#[tokio::test(start_paused = true)]
async fn long_gap_yields_two_turns() {
    let provider = ScriptedProvider::responses(vec![
        make_text_response("Got your first note."),
        make_text_response("Got your second note."),
    ]);
    let h = harness(provider, 5, Outbox::new());
    let sender = SenderId::new("100");

    h.aggregator.ingest(sender.clone(), Fragment::text("m1", "we arrived")).unwrap();
    advance(12.0).await;
    assert_eq!(h.outbox.len(), 0);
    advance(1.0).await;
    assert_eq!(h.outbox.len(), 1);

    advance(7.0).await; // t=20s
    h.aggregator.ingest(sender.clone(), Fragment::text("m2", "dinner was great")).unwrap();
    advance(12.0).await; // t=32s
    assert_eq!(h.outbox.len(), 1);
    advance(1.0).await;

    assert_eq!(
        h.outbox.sent_to(&sender),
        vec!["Got your first note.", "Got your second note."]
    );
    assert_eq!(h.provider.call_count(), 2);
}

// ── Reasoning loop ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn unknown_tool_is_reported_back_and_the_turn_finishes() {
    let provider = ScriptedProvider::responses(vec![
        make_tool_call_response(vec![make_tool_call("teleport", json!({"to": "Lisbon"}))], ""),
        make_text_response("I can't do that, but I can save memories."),
    ]);
    let h = harness(provider, 5, Outbox::new());
    let sender = SenderId::new("100");

    h.aggregator.ingest(sender.clone(), Fragment::text("m1", "teleport me")).unwrap();
    advance(13.0).await;

    assert_eq!(h.outbox.sent_to(&sender), vec!["I can't do that, but I can save memories."]);
    let results = last_tool_results(&h.provider);
    assert_eq!(results.len(), 1);
    assert!(results[0].contains("unknown_tool"));
}

#[tokio::test(start_paused = true)]
async fn non_member_cannot_add_memories() {
    let provider = ScriptedProvider::responses(vec![
        make_tool_call_response(
            vec![make_tool_call("add_memory", json!({"event_id": 1, "text": "sneaky"}))],
            "",
        ),
        make_text_response("You're not part of that event."),
    ]);
    let h = harness(provider, 5, Outbox::new());
    let ana = h.store.upsert_user(&SenderId::new("100"), Some("Ana")).await.unwrap();
    let party = h
        .store
        .create_event(ana.id, NewEvent { name: "Birthday".into(), ..NewEvent::default() })
        .await
        .unwrap();

    let bob = SenderId::new("200");
    h.aggregator.ingest(bob.clone(), Fragment::text("m1", "add this to the birthday")).unwrap();
    advance(13.0).await;

    assert_eq!(h.outbox.sent_to(&bob), vec!["You're not part of that event."]);
    assert!(last_tool_results(&h.provider)[0].contains("capability_denied"));

    // Storage is untouched.
    assert!(h.store.list_memories(party.id).await.unwrap().is_empty());
    assert_eq!(h.store.members(party.id).await.unwrap(), vec![ana.id]);
}

#[tokio::test(start_paused = true)]
async fn runaway_tool_use_hits_the_cap_with_one_fallback_reply() {
    let provider = ScriptedProvider::always_tool("list_events", json!({}), 6);
    let h = harness(provider, 5, Outbox::new());
    let mut rx = h.events.subscribe();
    let sender = SenderId::new("100");

    h.aggregator.ingest(sender.clone(), Fragment::text("m1", "what events do I have?")).unwrap();
    advance(13.0).await;

    assert_eq!(h.outbox.sent_to(&sender), vec![CannedReplies::default().fallback]);
    assert_eq!(h.provider.call_count(), 5);

    let mut completed = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let DomainEvent::TurnCompleted { state, iterations, .. } = &*event {
            completed.push((state.clone(), *iterations));
        }
    }
    assert_eq!(completed, vec![("aborted".to_string(), 5)]);
}

// ── Delivery & lifecycle ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failed_delivery_drops_the_batch_but_not_the_sender() {
    let provider = ScriptedProvider::responses(vec![make_text_response("lost"), make_text_response("found")]);
    let h = harness(provider, 5, Outbox::failing());
    let mut rx = h.events.subscribe();
    let sender = SenderId::new("100");

    h.aggregator.ingest(sender.clone(), Fragment::text("m1", "first")).unwrap();
    advance(13.0).await;
    h.outbox.set_failing(false);
    h.aggregator.ingest(sender.clone(), Fragment::text("m2", "second")).unwrap();
    advance(13.0).await;

    assert_eq!(h.outbox.sent_to(&sender), vec!["lost", "found"]);
    let mut dropped = 0;
    let mut delivery_failed = 0;
    while let Ok(event) = rx.try_recv() {
        match &*event {
            DomainEvent::BatchDropped { .. } => dropped += 1,
            DomainEvent::DeliveryFailed { .. } => delivery_failed += 1,
            _ => {}
        }
    }
    assert_eq!((dropped, delivery_failed), (1, 1));
}

#[tokio::test(start_paused = true)]
async fn shutdown_answers_pending_input_before_exit() {
    let provider = ScriptedProvider::responses(vec![make_text_response("Bye for now!")]);
    let h = harness(provider, 5, Outbox::new());
    let sender = SenderId::new("100");

    h.aggregator.ingest(sender.clone(), Fragment::text("m1", "gotta go")).unwrap();
    advance(1.0).await;
    h.aggregator.shutdown().await;

    assert_eq!(h.outbox.sent_to(&sender), vec!["Bye for now!"]);
    assert!(h.aggregator.ingest(sender, Fragment::text("m2", "wait")).is_err());
}
