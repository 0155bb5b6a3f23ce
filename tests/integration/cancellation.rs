//! Cancellation and id reuse
//!
//! Once `cancel` returns, the cancelled request must not produce another
//! delta, a `stream_end` or an error. An id is free again as soon as its
//! request has ended.

use std::sync::Arc;
use std::time::Duration;

use brief::orchestrator::STOPPED_NOTICE;
use brief::transport::scripted::{ScriptedResponse, ScriptedTransport, Step};
use brief::{Conversation, Outcome, SubmitRequest, UiEvent};
use pretty_assertions::assert_eq;

use crate::common::{self, chunks};

async fn wait_for_requests(transport: &ScriptedTransport, count: usize) {
    for _ in 0..1000 {
        if transport.requests().len() >= count {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("transport never received {} requests", count);
}

#[tokio::test]
async fn test_cancel_mid_stream_stops_deltas() {
    let transport = Arc::new(ScriptedTransport::streaming(vec![
        Step::data(&chunks::openai("one ")),
        Step::data(&chunks::openai("two ")),
        Step::Hang,
        Step::data(&chunks::openai("never")),
    ]));
    let orchestrator = common::scripted_orchestrator(transport);
    let (dest, mut rx) = common::sink();

    let task = orchestrator.submit(SubmitRequest::new("req-1", "text", dest));

    let mut seen = Vec::new();
    while seen.len() < 2 {
        match rx.recv().await {
            Some(UiEvent::Delta { text, .. }) => seen.push(text),
            Some(_) => {}
            None => panic!("sink closed early"),
        }
    }
    assert_eq!(seen, vec!["one ", "two "]);

    assert!(orchestrator.cancel("req-1"));
    let outcome = task.await.unwrap();
    assert!(outcome.is_cancelled());

    let after = common::drain(&mut rx);
    assert_eq!(
        after,
        vec![
            UiEvent::LoadingEnded { id: "req-1".into() },
            UiEvent::Notice { id: "req-1".into(), text: STOPPED_NOTICE.into() },
        ]
    );
    assert!(orchestrator.registry().is_empty());

    // Second cancel of the same id is a no-op
    assert!(!orchestrator.cancel("req-1"));
    assert!(common::drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_cancel_while_request_pending() {
    let transport = Arc::new(ScriptedTransport::with_response(ScriptedResponse::Hang));
    let orchestrator = common::scripted_orchestrator(transport.clone());
    let (dest, mut rx) = common::sink();

    let task = orchestrator.submit(SubmitRequest::new("req-1", "text", dest));
    wait_for_requests(&transport, 1).await;

    assert!(orchestrator.cancel("req-1"));
    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("cancelled request should finish promptly")
        .unwrap();
    assert!(matches!(outcome, Outcome::Cancelled));

    let events = common::drain(&mut rx);
    assert!(common::errors(&events).is_empty());
    assert!(common::stream_ends(&events).is_empty());
    assert_eq!(
        events.last(),
        Some(&UiEvent::Notice { id: "req-1".into(), text: STOPPED_NOTICE.into() })
    );
}

#[tokio::test]
async fn test_cancel_immediately_after_submit() {
    let transport = Arc::new(ScriptedTransport::streaming(common::openai_steps(&["late"])));
    let orchestrator = common::scripted_orchestrator(transport);
    let (dest, mut rx) = common::sink();

    let task = orchestrator.submit(SubmitRequest::new("req-1", "text", dest));
    assert!(orchestrator.cancel("req-1"));

    assert!(task.await.unwrap().is_cancelled());
    let events = common::drain(&mut rx);
    assert!(common::deltas(&events).is_empty());
    assert!(common::stream_ends(&events).is_empty());
}

#[tokio::test]
async fn test_cancel_unknown_id_is_noop() {
    let transport = Arc::new(ScriptedTransport::streaming(common::openai_steps(&["hi"])));
    let orchestrator = common::scripted_orchestrator(transport);
    let (dest, mut rx) = common::sink();

    assert!(!orchestrator.cancel("nobody"));

    // An unrelated request is unaffected
    let outcome = orchestrator.run(SubmitRequest::new("req-1", "text", dest)).await;
    assert_eq!(outcome.response(), Some("hi"));
    assert!(common::errors(&common::drain(&mut rx)).is_empty());
}

#[tokio::test]
async fn test_cancel_only_affects_its_own_id() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push(ScriptedResponse::Hang);
    transport.push(ScriptedResponse::Stream(vec![
        Step::Delay(Duration::from_millis(20)),
        Step::data(&chunks::openai("kept")),
        Step::data("[DONE]"),
    ]));
    let orchestrator = common::scripted_orchestrator(transport.clone());

    let (dest_a, _rx_a) = common::sink();
    let task_a = orchestrator.submit(SubmitRequest::new("a", "text", dest_a));
    wait_for_requests(&transport, 1).await;

    let (dest_b, mut rx_b) = common::sink();
    let task_b = orchestrator.submit(SubmitRequest::new("b", "text", dest_b));
    wait_for_requests(&transport, 2).await;

    assert!(orchestrator.cancel("a"));
    assert!(task_a.await.unwrap().is_cancelled());

    assert_eq!(task_b.await.unwrap().response(), Some("kept"));
    assert_eq!(common::deltas(&common::drain(&mut rx_b)), vec!["kept"]);
}

#[tokio::test]
async fn test_new_request_supersedes_live_one_with_same_id() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push(ScriptedResponse::Hang);
    transport.push(ScriptedResponse::Stream(common::openai_steps(&["fresh"])));
    let orchestrator = common::scripted_orchestrator(transport.clone());

    let (old_dest, mut old_rx) = common::sink();
    let old_task = orchestrator.submit(SubmitRequest::new("req-1", "first", old_dest));
    wait_for_requests(&transport, 1).await;

    let (new_dest, mut new_rx) = common::sink();
    let new_outcome = orchestrator
        .run(SubmitRequest::new("req-1", "second", new_dest))
        .await;

    assert_eq!(new_outcome.response(), Some("fresh"));
    assert!(old_task.await.unwrap().is_cancelled());

    assert_eq!(
        common::drain(&mut old_rx),
        vec![UiEvent::LoadingStarted { id: "req-1".into() }]
    );
    let new_events = common::drain(&mut new_rx);
    assert_eq!(common::deltas(&new_events), vec!["fresh"]);
    assert_eq!(common::stream_ends(&new_events).len(), 1);
}

#[tokio::test]
async fn test_id_reused_for_follow_up_after_completion() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push(ScriptedResponse::Stream(common::openai_steps(&["A summary."])));
    transport.push(ScriptedResponse::Stream(common::openai_steps(&["An answer."])));
    let orchestrator = common::scripted_orchestrator(transport.clone());
    let (dest, mut rx) = common::sink();
    let mut conversation = Conversation::new();

    orchestrator
        .run(SubmitRequest::new("tab-7", "Long article text", dest.clone()))
        .await;
    for event in common::drain(&mut rx) {
        if let UiEvent::StreamEnd { full_response, original_context, .. } = event {
            conversation.record_response(&full_response, original_context.as_deref());
        }
    }

    let follow_up = conversation.follow_up("What about the ending?");
    let outcome = orchestrator
        .run(SubmitRequest::new("tab-7", follow_up, dest))
        .await;
    assert_eq!(outcome.response(), Some("An answer."));

    let events = common::drain(&mut rx);
    assert_eq!(
        common::stream_ends(&events),
        vec![&UiEvent::StreamEnd {
            id: "tab-7".into(),
            full_response: "An answer.".into(),
            original_context: None,
        }]
    );

    // The follow-up carries the whole history
    let requests = transport.requests();
    let messages = requests[1].body["messages"].as_array().unwrap();
    let roles: Vec<&str> = messages.iter().map(|m| m["role"].as_str().unwrap()).collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    assert_eq!(messages[3]["content"], "What about the ending?");
}

#[tokio::test]
async fn test_id_reused_after_cancel() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push(ScriptedResponse::Hang);
    transport.push(ScriptedResponse::Stream(common::openai_steps(&["again"])));
    let orchestrator = common::scripted_orchestrator(transport.clone());
    let (dest, mut rx) = common::sink();

    let task = orchestrator.submit(SubmitRequest::new("req-1", "text", dest.clone()));
    wait_for_requests(&transport, 1).await;
    assert!(orchestrator.cancel("req-1"));
    assert!(task.await.unwrap().is_cancelled());
    common::drain(&mut rx);

    let outcome = orchestrator.run(SubmitRequest::new("req-1", "text", dest)).await;
    assert_eq!(outcome.response(), Some("again"));
    assert_eq!(common::deltas(&common::drain(&mut rx)), vec!["again"]);
}
