//! End-to-end turns through the public API with a scripted model.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use aria_agent::{
    Agent, NoopSink, RecordingSink, SinkEvent, ToolOutput, ToolRegistry, fallback_answer,
};
use aria_llm::{MockBackend, MockTurn, ParamSpec, ParamType, Role, ToolCallRequest, ToolSpec};

fn weather_spec() -> ToolSpec {
    ToolSpec::new("get_weather", "Get the current weather for a city.")
        .with_param(ParamSpec::required("city", ParamType::String, "The city name"))
}

fn paris_registry(calls: Arc<AtomicUsize>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register(weather_spec(), move |args, _ctx| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let city = args["city"].as_str().unwrap_or_default().to_string();
                Ok(ToolOutput::text(format!("Weather for {}: 18°C, Sunny", city)))
            }
        })
        .unwrap();
    registry
}

#[tokio::test]
async fn test_paris_weather_turn() {
    let calls = Arc::new(AtomicUsize::new(0));
    let backend = Arc::new(MockBackend::new(vec![
        MockTurn::ToolCalls(vec![ToolCallRequest::new(
            "call_1",
            "get_weather",
            json!({"city": "Paris"}),
        )]),
        MockTurn::Text("It's sunny and 18°C in Paris.".to_string()),
    ]));

    let agent = Agent::builder()
        .with_shared_backend(backend.clone())
        .with_tools(paris_registry(Arc::clone(&calls)))
        .with_system_prompt("You are Aria.")
        .build()
        .unwrap();

    let mut state = agent.new_conversation();
    let sink = RecordingSink::new();
    let outcome = agent
        .turn(&mut state, "What's the weather in Paris?", &sink)
        .await
        .unwrap();

    assert_eq!(outcome.text(), "It's sunny and 18°C in Paris.");
    assert_eq!(outcome.iterations, 2);
    assert!(!outcome.truncated);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // system, user, assistant(tool_calls), tool, assistant
    let roles: Vec<Role> = state.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    assert_eq!(state.messages()[3].tool_call_id.as_deref(), Some("call_1"));

    // The second model call saw the tool result.
    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1]
        .messages
        .iter()
        .any(|m| m.role == Role::Tool && m.content.contains("18°C")));

    let events = sink.events();
    assert!(matches!(&events[0], SinkEvent::ToolStart { name, .. } if name == "get_weather"));
    assert!(matches!(&events[1], SinkEvent::ToolEnd { result, .. } if result.success));
    assert!(matches!(events.last(), Some(SinkEvent::TurnComplete { .. })));
    assert_eq!(sink.text(), "It's sunny and 18°C in Paris.");
}

#[tokio::test]
async fn test_plain_answer_needs_no_tools() {
    let calls = Arc::new(AtomicUsize::new(0));
    let agent = Agent::builder()
        .with_backend(MockBackend::with_text("Hello! How can I help?"))
        .with_tools(paris_registry(Arc::clone(&calls)))
        .build()
        .unwrap();

    let mut state = agent.new_conversation();
    let outcome = agent.turn(&mut state, "Hi", &NoopSink).await.unwrap();

    assert_eq!(outcome.text(), "Hello! How can I help?");
    assert!(outcome.records.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.turn_count(), 1);
}

#[tokio::test]
async fn test_runaway_tool_calls_hit_the_cap() {
    let calls = Arc::new(AtomicUsize::new(0));
    let backend = Arc::new(MockBackend::always_tool_calls(vec![ToolCallRequest::new(
        "call",
        "get_weather",
        json!({"city": "Paris"}),
    )]));

    let agent = Agent::builder()
        .with_shared_backend(backend.clone())
        .with_tools(paris_registry(Arc::clone(&calls)))
        .with_system_prompt("sys")
        .with_max_iterations(2)
        .build()
        .unwrap();

    let mut state = agent.new_conversation();
    let outcome = agent.turn(&mut state, "Loop forever", &NoopSink).await.unwrap();

    assert!(outcome.truncated);
    assert_eq!(outcome.text(), fallback_answer(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(backend.request_count(), 3);
}

#[tokio::test]
async fn test_default_prompt_lists_tools() {
    let agent = Agent::builder()
        .with_backend(MockBackend::with_text("ok"))
        .with_tools(paris_registry(Arc::new(AtomicUsize::new(0))))
        .build()
        .unwrap();

    let state = agent.new_conversation();
    let prompt = state.system_prompt();
    assert!(prompt.starts_with("You are Aria"));
    assert!(prompt.contains("- get_weather: Get the current weather for a city."));
}
