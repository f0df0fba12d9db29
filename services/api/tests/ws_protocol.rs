//! End-to-end check of the call WebSocket against stub services.

use anyhow::Result;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt, stream};
use interview_api::{config::InterviewSettings, router::create_router, state::AppState};
use interview_core::{
    compatibility::{CompatibilityChecker, CompatibilityPolicy, CompatibilityReport},
    history::Turn,
    llm_client::{LLMClient, LLMStream, LLMStreamEvent},
    metadata::InterviewMetadata,
    prompt::TemplatePrompts,
};
use serde_json::{Value, json};
use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct EchoLLM;

#[async_trait]
impl LLMClient for EchoLLM {
    async fn stream_reply(&self, history: &[Turn]) -> Result<LLMStream> {
        let last = history.last().map(|t| t.text.clone()).unwrap_or_default();
        let chunks = vec![
            Ok(LLMStreamEvent::TextChunk("You said: ".to_string())),
            Ok(LLMStreamEvent::TextChunk(last)),
        ];
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn complete(&self, _history: &[Turn]) -> Result<String> {
        Ok(String::new())
    }
}

struct AlwaysCompatible;

#[async_trait]
impl CompatibilityChecker for AlwaysCompatible {
    async fn quick_check(&self, _metadata: &InterviewMetadata) -> Result<CompatibilityReport> {
        Ok(CompatibilityReport::inconclusive("stub"))
    }

    async fn full_check(
        &self,
        _metadata: &InterviewMetadata,
        _transcript: &[Turn],
    ) -> Result<CompatibilityReport> {
        Ok(CompatibilityReport::inconclusive("stub"))
    }
}

async fn spawn_server() -> SocketAddr {
    let prompts = TemplatePrompts::new(HashMap::from([
        (
            "system_prompt".to_string(),
            "You interview {candidate_name} for {role}.".to_string(),
        ),
        (
            "greeting".to_string(),
            "Hello {candidate_name}, shall we start?".to_string(),
        ),
    ]))
    .unwrap();
    let state = Arc::new(AppState {
        llm_client: Arc::new(EchoLLM),
        compatibility: Arc::new(AlwaysCompatible),
        compatibility_policy: CompatibilityPolicy::default(),
        prompts: Arc::new(prompts),
        settings: Arc::new(InterviewSettings::default()),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    addr
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("frame within timeout")
            .expect("socket open")
            .expect("valid frame");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send_json(client: &mut Client, value: Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_call_handshake_greeting_and_reply() {
    let addr = spawn_server().await;
    let (mut client, _) = connect_async(format!("ws://{addr}/llm-websocket/call_e2e"))
        .await
        .unwrap();

    let config = next_json(&mut client).await;
    assert_eq!(config["response_type"], "config");
    assert_eq!(config["config"]["call_details"], true);

    send_json(
        &mut client,
        json!({
            "interaction_type": "call_details",
            "call": {
                "call_id": "call_e2e",
                "retell_llm_dynamic_variables": { "candidate_name": "Grace", "role": "SRE" }
            }
        }),
    )
    .await;
    let greeting = next_json(&mut client).await;
    assert_eq!(greeting["response_type"], "response");
    assert_eq!(greeting["response_id"], 0);
    assert_eq!(greeting["content"], "Hello Grace, shall we start?");
    assert_eq!(greeting["content_complete"], true);
    assert_eq!(greeting["end_call"], false);

    send_json(
        &mut client,
        json!({ "interaction_type": "ping_pong", "timestamp": 123 }),
    )
    .await;
    let pong = next_json(&mut client).await;
    assert_eq!(pong, json!({ "response_type": "ping_pong", "timestamp": 123 }));

    send_json(
        &mut client,
        json!({
            "interaction_type": "response_required",
            "response_id": 1,
            "transcript": [
                { "role": "agent", "content": "Hello Grace, shall we start?" },
                { "role": "user", "content": "Yes please" }
            ]
        }),
    )
    .await;
    let mut spoken = String::new();
    loop {
        let frame = next_json(&mut client).await;
        assert_eq!(frame["response_id"], 1);
        spoken.push_str(frame["content"].as_str().unwrap());
        if frame["content_complete"] == true {
            break;
        }
    }
    assert_eq!(spoken, "You said: Yes please");

    client.close(None).await.unwrap();
}

#[tokio::test]
async fn test_malformed_frames_keep_connection_open() {
    let addr = spawn_server().await;
    let (mut client, _) = connect_async(format!("ws://{addr}/llm-websocket/call_bad"))
        .await
        .unwrap();
    next_json(&mut client).await;

    client
        .send(Message::Text("this is not json".into()))
        .await
        .unwrap();
    send_json(&mut client, json!({ "interaction_type": "mystery" })).await;
    send_json(
        &mut client,
        json!({ "interaction_type": "ping_pong", "timestamp": 7 }),
    )
    .await;

    let pong = next_json(&mut client).await;
    assert_eq!(pong["response_type"], "ping_pong");
    assert_eq!(pong["timestamp"], 7);
}

#[tokio::test]
async fn test_health_route() {
    let addr = spawn_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("ok"));
}
