mod common;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use common::{captured, spawn_mock, Captured};
use parla_types::{Role, Turn};
use parla_voice::{LanguageAdapter, OpenAiChatClient, OpenAiConfig, VoiceError};
use serde_json::{json, Value};

type Requests = Captured<(Option<String>, Value)>;

async fn completions(
    State(requests): State<Requests>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    requests.lock().unwrap().push((auth, body));
    Json(json!({
        "id": "chatcmpl-1",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": "Con gusto te ayudo." } }
        ]
    }))
}

fn client(base_url: String) -> OpenAiChatClient {
    OpenAiChatClient::new(
        reqwest::Client::new(),
        OpenAiConfig {
            base_url,
            api_key: "sk-test".to_string(),
            ..OpenAiConfig::default()
        },
    )
}

#[tokio::test]
async fn test_reply_sends_persona_prompt_and_sampling_settings() {
    let requests = captured();
    let base = spawn_mock(
        Router::new()
            .route("/chat/completions", post(completions))
            .with_state(requests.clone()),
    )
    .await;

    let reply = client(base)
        .reply("Eres Natalia.", &[Turn::caller("Hola, soy Ana")])
        .await
        .expect("reply should succeed");
    assert_eq!(reply, "Con gusto te ayudo.");

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (auth, body) = &requests[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "gpt-4");
    assert_eq!(body["max_tokens"], 150);
    assert_eq!(body["n"], 1);
    assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);

    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0], json!({ "role": "system", "content": "Eres Natalia." }));
    assert_eq!(messages[1], json!({ "role": "user", "content": "Hola, soy Ana" }));
}

#[tokio::test]
async fn test_agent_turns_map_to_assistant_role() {
    let requests = captured();
    let base = spawn_mock(
        Router::new()
            .route("/chat/completions", post(completions))
            .with_state(requests.clone()),
    )
    .await;

    client(base)
        .reply(
            "prompt",
            &[
                Turn::caller("hola"),
                Turn {
                    role: Role::Agent,
                    text: "buenas".to_string(),
                },
                Turn::caller("¿precios?"),
            ],
        )
        .await
        .unwrap();

    let requests = requests.lock().unwrap();
    let roles: Vec<&str> = requests[0].1["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
}

#[tokio::test]
async fn test_vendor_error_status_is_reported() {
    let base = spawn_mock(Router::new().route(
        "/chat/completions",
        post(|| async {
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": { "message": "rate limited" } })),
            )
                .into_response()
        }),
    ))
    .await;

    let result = client(base).reply("prompt", &[Turn::caller("hola")]).await;
    match result {
        Err(VoiceError::Upstream { status, body, .. }) => {
            assert_eq!(status, 429);
            assert!(body.contains("rate limited"));
        }
        other => panic!("expected Upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_content_is_malformed() {
    let base = spawn_mock(Router::new().route(
        "/chat/completions",
        post(|| async { Json(json!({ "choices": [] })) }),
    ))
    .await;

    let result = client(base).reply("prompt", &[Turn::caller("hola")]).await;
    assert!(
        matches!(result, Err(VoiceError::MalformedResponse { .. })),
        "got {:?}",
        result
    );
}

#[tokio::test]
async fn test_unreachable_vendor_is_transport_error() {
    // Bind then drop to get a port with nothing listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = client(format!("http://{}", addr))
        .reply("prompt", &[Turn::caller("hola")])
        .await;
    assert!(matches!(result, Err(VoiceError::Http(_))), "got {:?}", result);
}
