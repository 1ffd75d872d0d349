//! End-to-end tests for the chat completion agent, non-streaming.

use agents::{AgentError, AgentRegistry, Invocation};
use insta::assert_json_snapshot;
use integration_tests::MockUpstream;
use serde_json::json;

fn registry() -> AgentRegistry {
    AgentRegistry::with_defaults(config::ChatProviderConfig::default()).expect("registry builds")
}

fn call(upstream: &MockUpstream) -> Invocation {
    Invocation::new()
        .with_param("apiKey", json!("test-key"))
        .with_param("baseURL", json!(upstream.base_url()))
}

#[tokio::test]
async fn normalizes_a_text_reply() {
    let upstream = MockUpstream::builder().with_text("hello").spawn().await;

    let result = registry()
        .invoke("chatCompletionAgent", call(&upstream).with_input("prompt", json!("Hello!")))
        .await
        .unwrap();

    assert_json_snapshot!(result, { ".id" => "[id]" }, @r#"
    {
      "choices": [
        {
          "finish_reason": "stop",
          "index": 0,
          "message": {
            "content": "hello",
            "role": "assistant"
          }
        }
      ],
      "created": 1677651200,
      "id": "[id]",
      "message": {
        "content": "hello",
        "role": "assistant"
      },
      "messages": [
        {
          "content": "Hello!",
          "role": "user"
        },
        {
          "content": "hello",
          "role": "assistant"
        }
      ],
      "model": "deepseek-chat",
      "object": "chat.completion",
      "text": "hello",
      "tool_calls": [],
      "usage": {
        "completion_tokens": 15,
        "prompt_tokens": 10,
        "total_tokens": 25
      }
    }
    "#);
}

#[tokio::test]
async fn system_prompt_seeds_the_message_sequence() {
    let upstream = MockUpstream::builder().with_text("ok").spawn().await;

    registry()
        .invoke(
            "chatCompletionAgent",
            call(&upstream)
                .with_input("system", json!("be terse"))
                .with_input("prompt", json!("Hello!")),
        )
        .await
        .unwrap();

    let requests = upstream.received_requests();
    assert_eq!(requests.len(), 1);

    assert_json_snapshot!(requests[0].body, @r#"
    {
      "max_tokens": 1024,
      "messages": [
        {
          "content": "be terse",
          "role": "system"
        },
        {
          "content": "Hello!",
          "role": "user"
        }
      ],
      "model": "deepseek-chat",
      "temperature": 0.7
    }
    "#);
}

#[tokio::test]
async fn prior_messages_override_system_seeding() {
    let upstream = MockUpstream::builder().with_text("ok").spawn().await;

    let prior = json!([
        { "role": "system", "content": "existing system turn" },
        { "role": "user", "content": "earlier question" },
        { "role": "assistant", "content": "earlier answer" },
    ]);

    let result = registry()
        .invoke(
            "chatCompletionAgent",
            call(&upstream)
                .with_input("messages", prior)
                .with_input("system", json!("ignored when prior messages exist"))
                .with_input("prompt", json!("follow-up")),
        )
        .await
        .unwrap();

    let body = &upstream.received_requests()[0].body;
    let sent = body["messages"].as_array().unwrap();

    assert_eq!(sent.len(), 4);
    assert_eq!(sent[0]["content"], json!("existing system turn"));
    assert_eq!(sent[3], json!({ "role": "user", "content": "follow-up" }));

    // The returned sequence additionally carries the new assistant turn.
    let messages = result["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[4], json!({ "content": "ok", "role": "assistant" }));
}

#[tokio::test]
async fn generation_parameters_and_tools_pass_through() {
    let upstream = MockUpstream::builder().with_text("ok").spawn().await;

    let tools = json!([{
        "type": "function",
        "function": {
            "name": "get_weather",
            "parameters": { "type": "object", "properties": { "city": { "type": "string" } } }
        }
    }]);

    registry()
        .invoke(
            "chatCompletionAgent",
            call(&upstream)
                .with_param("model", json!("deepseek-reasoner"))
                .with_param("temperature", json!(0.2))
                .with_param("max_tokens", json!(256))
                .with_param("tools", tools.clone())
                .with_param("tool_choice", json!("auto"))
                .with_param("response_format", json!({ "type": "json_object" }))
                .with_input("prompt", json!("hi")),
        )
        .await
        .unwrap();

    let body = &upstream.received_requests()[0].body;

    assert_eq!(body["model"], json!("deepseek-reasoner"));
    assert_eq!(body["temperature"], json!(0.2));
    assert_eq!(body["max_tokens"], json!(256));
    assert_eq!(body["tools"], tools);
    assert_eq!(body["tool_choice"], json!("auto"));
    assert_eq!(body["response_format"], json!({ "type": "json_object" }));
}

#[tokio::test]
async fn tool_call_arguments_are_parsed() {
    let upstream = MockUpstream::builder()
        .with_tool_call("call_1", "get_weather", r#"{"city":"Tokyo"}"#)
        .spawn()
        .await;

    let result = registry()
        .invoke("chatCompletionAgent", call(&upstream).with_input("prompt", json!("weather?")))
        .await
        .unwrap();

    assert_eq!(
        result["tool"],
        json!({ "arguments": { "city": "Tokyo" }, "id": "call_1", "name": "get_weather" })
    );
    assert_eq!(result["tool_calls"].as_array().unwrap().len(), 1);
    assert_eq!(result["text"], json!(null));

    // The appended assistant message keeps the raw tool calls.
    let last = result["messages"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["role"], json!("assistant"));
    assert_eq!(last["tool_calls"][0]["function"]["arguments"], json!(r#"{"city":"Tokyo"}"#));
}

#[tokio::test]
async fn malformed_tool_arguments_lose_only_the_arguments() {
    let upstream = MockUpstream::builder()
        .with_tool_call("call_2", "get_weather", r#"{"city": "#)
        .spawn()
        .await;

    let result = registry()
        .invoke("chatCompletionAgent", call(&upstream).with_input("prompt", json!("weather?")))
        .await
        .unwrap();

    assert_eq!(result["tool"], json!({ "id": "call_2", "name": "get_weather" }));
    assert!(result["tool"].get("arguments").is_none());
}

#[tokio::test]
async fn upstream_errors_propagate_without_retry() {
    let upstream = MockUpstream::builder().with_error(429, "slow down").spawn().await;

    let err = registry()
        .invoke("chatCompletionAgent", call(&upstream).with_input("prompt", json!("hi")))
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::RateLimitExceeded { .. }));
    assert_eq!(err.to_string(), "Rate limit exceeded: slow down");
    assert_eq!(upstream.received_requests().len(), 1);
}

#[tokio::test]
async fn authentication_failures_map_to_their_variant() {
    let upstream = MockUpstream::builder().with_error(401, "bad key").spawn().await;

    let err = registry()
        .invoke("chatCompletionAgent", call(&upstream).with_input("prompt", json!("hi")))
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn call_parameters_override_the_environment_credential() {
    let upstream = MockUpstream::builder().with_text("ok").spawn().await;
    let registry = registry();

    let invocation = call(&upstream).with_input("prompt", json!("hi"));

    temp_env::async_with_vars([("DEEPSEEK_API_KEY", Some("env-key"))], async {
        registry.invoke("chatCompletionAgent", invocation).await.unwrap();
    })
    .await;

    assert_eq!(
        upstream.received_requests()[0].authorization.as_deref(),
        Some("Bearer test-key")
    );
}

#[tokio::test]
async fn environment_credential_is_the_fallback() {
    let upstream = MockUpstream::builder().with_text("ok").spawn().await;
    let registry = registry();

    let invocation = Invocation::new()
        .with_param("baseURL", json!(upstream.base_url()))
        .with_input("prompt", json!("hi"));

    temp_env::async_with_vars([("DEEPSEEK_API_KEY", Some("env-key"))], async {
        registry.invoke("chatCompletionAgent", invocation).await.unwrap();
    })
    .await;

    assert_eq!(
        upstream.received_requests()[0].authorization.as_deref(),
        Some("Bearer env-key")
    );
}

#[tokio::test]
async fn missing_credential_everywhere_is_an_error() {
    let upstream = MockUpstream::builder().with_text("ok").spawn().await;
    let registry = registry();

    let invocation = Invocation::new()
        .with_param("baseURL", json!(upstream.base_url()))
        .with_input("prompt", json!("hi"));

    let err = temp_env::async_with_vars([("DEEPSEEK_API_KEY", None::<&str>)], async {
        registry.invoke("chatCompletionAgent", invocation).await.unwrap_err()
    })
    .await;

    assert!(matches!(err, AgentError::MissingApiKey));
    assert!(upstream.received_requests().is_empty());
}
