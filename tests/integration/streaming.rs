//! Streaming behaviour over a scripted transport
//!
//! Tests for how response bodies become deltas:
//! - Delta order and the terminal event for a plain stream
//! - Lines split across chunk boundaries
//! - Malformed lines amid valid ones
//! - Stall handling with and without partial content
//! - Independent concurrent sessions

use std::sync::Arc;
use std::time::Duration;

use brief::native::translate::adapter_for;
use brief::orchestrator::STALL_NOTICE;
use brief::transport::scripted::{ScriptedResponse, ScriptedTransport, Step};
use brief::{Outcome, ProviderKind, RelayError, SubmitRequest, UiEvent};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{self, chunks};

#[tokio::test]
async fn test_openai_hello_world_events() {
    let transport = Arc::new(ScriptedTransport::streaming(common::openai_steps(&[
        "Hello", " world",
    ])));
    let orchestrator = common::scripted_orchestrator(transport);
    let (dest, mut rx) = common::sink();

    let outcome = orchestrator
        .run(SubmitRequest::new("req-1", "An article about greetings", dest))
        .await;

    assert_eq!(outcome.response(), Some("Hello world"));
    assert_eq!(
        common::drain(&mut rx),
        vec![
            UiEvent::LoadingStarted { id: "req-1".into() },
            UiEvent::Delta { id: "req-1".into(), text: "Hello".into() },
            UiEvent::Delta { id: "req-1".into(), text: " world".into() },
            UiEvent::StreamEnd {
                id: "req-1".into(),
                full_response: "Hello world".into(),
                original_context: Some("An article about greetings".into()),
            },
            UiEvent::LoadingEnded { id: "req-1".into() },
        ]
    );
}

#[tokio::test]
async fn test_line_split_across_reads_parsed_once() {
    let transport = Arc::new(ScriptedTransport::streaming(vec![
        Step::chunk("data: {\"cho"),
        Step::chunk("ices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n"),
        Step::data("[DONE]"),
    ]));
    let orchestrator = common::scripted_orchestrator(transport);
    let (dest, mut rx) = common::sink();

    orchestrator.run(SubmitRequest::new("req-1", "text", dest)).await;

    assert_eq!(common::deltas(&common::drain(&mut rx)), vec!["Hi"]);
}

#[tokio::test]
async fn test_many_lines_in_one_read() {
    let body = common::openai_stream(&["a", "b", "c"]);
    let transport = Arc::new(ScriptedTransport::streaming(vec![Step::chunk(body)]));
    let orchestrator = common::scripted_orchestrator(transport);
    let (dest, mut rx) = common::sink();

    let outcome = orchestrator.run(SubmitRequest::new("req-1", "text", dest)).await;

    assert_eq!(outcome.response(), Some("abc"));
    assert_eq!(common::deltas(&common::drain(&mut rx)), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_multibyte_text_split_across_reads() {
    let line = format!("data: {}\n", chunks::openai("naïve café"));
    let bytes = line.into_bytes();
    let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;

    let transport = Arc::new(ScriptedTransport::streaming(vec![
        Step::chunk(bytes[..split].to_vec()),
        Step::chunk(bytes[split..].to_vec()),
    ]));
    let orchestrator = common::scripted_orchestrator(transport);
    let (dest, _rx) = common::sink();

    let outcome = orchestrator.run(SubmitRequest::new("req-1", "text", dest)).await;
    assert_eq!(outcome.response(), Some("naïve café"));
}

#[tokio::test]
async fn test_malformed_line_does_not_abort_stream() {
    let transport = Arc::new(ScriptedTransport::streaming(vec![
        Step::data(&chunks::openai("before ")),
        Step::data("{\"choices\": [ this is not json"),
        Step::chunk(": keep-alive comment\n"),
        Step::data(&chunks::openai("after")),
        Step::data("[DONE]"),
    ]));
    let orchestrator = common::scripted_orchestrator(transport);
    let (dest, mut rx) = common::sink();

    let outcome = orchestrator.run(SubmitRequest::new("req-1", "text", dest)).await;

    assert_eq!(outcome.response(), Some("before after"));
    let events = common::drain(&mut rx);
    assert_eq!(common::deltas(&events), vec!["before ", "after"]);
    assert!(common::errors(&events).is_empty());
}

#[tokio::test]
async fn test_final_chunk_with_text_and_stop_is_kept() {
    let transport = Arc::new(ScriptedTransport::streaming(vec![
        Step::data(&chunks::openai("Almost")),
        Step::data(
            &json!({"choices": [{"delta": {"content": " done."}, "finish_reason": "stop"}]})
                .to_string(),
        ),
        Step::data(&chunks::openai_stop()),
    ]));
    let orchestrator = common::scripted_orchestrator(transport);
    let (dest, _rx) = common::sink();

    let outcome = orchestrator.run(SubmitRequest::new("req-1", "text", dest)).await;
    assert_eq!(outcome.response(), Some("Almost done."));
}

#[tokio::test(start_paused = true)]
async fn test_stall_after_deltas_is_soft_completion() {
    let transport = Arc::new(ScriptedTransport::streaming(vec![
        Step::data(&chunks::openai("First. ")),
        Step::Delay(Duration::from_secs(10)),
        Step::data(&chunks::openai("Second.")),
        Step::Hang,
    ]));
    let orchestrator = common::scripted_orchestrator(transport);
    let (dest, mut rx) = common::sink();

    let outcome = orchestrator.run(SubmitRequest::new("req-1", "text", dest)).await;

    assert!(matches!(outcome, Outcome::SoftCompleted { ref partial } if partial == "First. Second."));
    let events = common::drain(&mut rx);
    assert_eq!(common::deltas(&events), vec!["First. ", "Second."]);
    assert!(events.contains(&UiEvent::Notice {
        id: "req-1".into(),
        text: STALL_NOTICE.into(),
    }));
    assert_eq!(
        common::stream_ends(&events),
        vec![&UiEvent::StreamEnd {
            id: "req-1".into(),
            full_response: "First. Second.".into(),
            original_context: Some("text".into()),
        }]
    );
    assert!(common::errors(&events).is_empty());
    assert!(orchestrator.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stall_without_content_is_hard_error() {
    let transport = Arc::new(ScriptedTransport::streaming(vec![
        Step::chunk(": connected\n"),
        Step::Hang,
    ]));
    let orchestrator = common::scripted_orchestrator(transport);
    let (dest, mut rx) = common::sink();

    let outcome = orchestrator.run(SubmitRequest::new("req-1", "text", dest)).await;

    assert!(matches!(outcome, Outcome::Failed(RelayError::Stalled)));
    let events = common::drain(&mut rx);
    assert!(common::stream_ends(&events).is_empty());
    assert_eq!(
        common::errors(&events),
        vec!["Stream interrupted: the API stopped responding before sending any content. Please try again."]
    );
    assert_eq!(
        events.last(),
        Some(&UiEvent::InputUnlocked {
            id: "req-1".into(),
            placeholder: brief::Placeholder::FollowUp,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_but_steady_stream_is_not_a_stall() {
    let mut steps = Vec::new();
    for word in ["one ", "two ", "three"] {
        steps.push(Step::Delay(Duration::from_secs(20)));
        steps.push(Step::data(&chunks::openai(word)));
    }
    let transport = Arc::new(ScriptedTransport::streaming(steps));
    let orchestrator = common::scripted_orchestrator(transport);
    let (dest, _rx) = common::sink();

    let outcome = orchestrator.run(SubmitRequest::new("req-1", "text", dest)).await;
    assert_eq!(outcome.response(), Some("one two three"));
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let transport = Arc::new(ScriptedTransport::new());
    for _ in 0..8 {
        transport.push(ScriptedResponse::Stream(common::openai_steps(&["x", "y"])));
    }
    let orchestrator = common::scripted_orchestrator(transport.clone());

    let mut runs = Vec::new();
    for i in 0..8 {
        let (dest, rx) = common::sink();
        let task = orchestrator.submit(SubmitRequest::new(format!("req-{}", i), "text", dest));
        runs.push((format!("req-{}", i), task, rx));
    }

    for (id, task, mut rx) in runs {
        let outcome = task.await.unwrap();
        assert_eq!(outcome.response(), Some("xy"));
        let events = common::drain(&mut rx);
        assert!(events.iter().all(|e| e.id() == id));
        assert_eq!(common::deltas(&events), vec!["x", "y"]);
    }
    assert_eq!(transport.requests().len(), 8);
    assert!(orchestrator.registry().is_empty());
}

#[test]
fn test_parse_stream_chunk_is_deterministic() {
    let samples = [
        (ProviderKind::OpenAi, json!({"choices": [{"delta": {"content": "hi"}}]})),
        (ProviderKind::Azure, json!({"choices": [{"delta": {"content": "hi"}}]})),
        (ProviderKind::Anthropic, json!({"type": "content_block_delta", "delta": {"text": "hi"}})),
        (ProviderKind::Gemini, json!({"candidates": [{"content": {"parts": [{"text": "hi"}]}}]})),
    ];

    for (kind, chunk) in samples {
        let adapter = adapter_for(kind);
        let first = adapter.parse_stream_chunk(&chunk);
        let second = adapter.parse_stream_chunk(&chunk);
        assert_eq!(first, Some("hi".to_string()), "{}", kind);
        assert_eq!(first, second, "{}", kind);

        assert_eq!(adapter.parse_stream_chunk(&json!({"unexpected": true})), None, "{}", kind);
    }
}
