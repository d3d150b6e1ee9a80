#![cfg(feature = "server")]

use agent_twin::client_wrapper::{ClientWrapper, Message, Role, SamplingOptions};
use agent_twin::server::{router, AppState};
use agent_twin::TwinConfig;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower::ServiceExt;

struct MockClient {
    response: String,
}

#[async_trait]
impl ClientWrapper for MockClient {
    async fn send_message(
        &self,
        _messages: &[Message],
        _options: Option<SamplingOptions>,
    ) -> Result<Message, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Message {
            role: Role::Assistant,
            content: Arc::from(self.response.as_str()),
        })
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

type Captured = Arc<Mutex<Vec<Value>>>;

async fn spawn_peer(answer: &'static str) -> (String, Captured) {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route(
            "/query",
            post(
                move |State(captured): State<Captured>, Json(body): Json<Value>| async move {
                    captured.lock().unwrap().push(body);
                    Json(json!({"answer": answer}))
                },
            ),
        )
        .with_state(captured.clone());
    (spawn(app).await, captured)
}

fn closed_port_url(path: &str) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}{}", port, path)
}

fn state_with(llm_reply: &str, catalog_url: String) -> AppState {
    let config = TwinConfig {
        agent_username: "mimo".to_string(),
        agent_name: "Mimo".to_string(),
        agent_uuid: Some("0000-test".to_string()),
        registry_url: closed_port_url("/api/agents"),
        agentfacts_db_url: catalog_url,
        audit_log_path: None,
        ..TwinConfig::default()
    };
    AppState::new(
        config,
        Arc::new(MockClient {
            response: llm_reply.to_string(),
        }),
    )
}

fn state() -> AppState {
    state_with("Raw shrimp.", closed_port_url("/api/agentfacts"))
}

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bare(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn a2a_message(text: &str, conversation_id: &str) -> Value {
    json!({
        "content": {"text": text, "type": "text"},
        "role": "user",
        "conversation_id": conversation_id,
    })
}

#[tokio::test]
async fn test_a2a_mention_is_forwarded_end_to_end() {
    let (peer, captured) = spawn_peer("hi").await;
    let state = state();
    state
        .directory
        .register("alice", &format!("{}/a2a", peer))
        .unwrap();

    let (status, body) = send(&state, post_json("/a2a", a2a_message("@alice hello", "c1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"]["text"], "[Forwarded to @alice]\n\nhi");
    assert_eq!(body["content"]["type"], "text");
    assert_eq!(body["role"], "assistant");
    assert_eq!(body["conversation_id"], "c1");
    assert_eq!(body["agent_id"], "mimo");

    let bodies = captured.lock().unwrap();
    assert_eq!(
        bodies.as_slice(),
        &[json!({"question": "hello", "user_id": "agent-mimo"})]
    );
}

#[tokio::test]
async fn test_a2a_without_mention_is_rejected() {
    let state = state();
    for text in ["just a question", ""] {
        let (status, body) = send(&state, post_json("/a2a", a2a_message(text, "c2"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "text {:?}", text);
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.contains("@agent-id"));
        assert!(detail.contains("/query"));
    }
}

#[tokio::test]
async fn test_a2a_unknown_agent_is_not_found() {
    let state = state();
    state.directory.register("bob", "http://bob.example/a2a").unwrap();

    let (status, body) = send(&state, post_json("/a2a", a2a_message("@carol hi", "c3"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("'carol' not found"));
    assert!(detail.contains("bob"));
}

#[tokio::test]
async fn test_a2a_unreachable_peer_is_bad_gateway() {
    let state = state();
    state
        .directory
        .register("gone", &closed_port_url("/a2a"))
        .unwrap();

    let (status, _) = send(&state, post_json("/a2a", a2a_message("@gone hi", "c4"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_register_list_and_unregister() {
    let state = state();

    let (status, body) = send(
        &state,
        bare("POST", "/agents/register?agent_id=bob&agent_url=http://bob.example/a2a"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agent_id"], "bob");
    assert_eq!(body["total_known_agents"], 1);

    let (_, body) = send(&state, bare("GET", "/agents")).await;
    assert_eq!(body["my_agent_id"], "mimo");
    assert_eq!(body["known_agents"]["bob"], "http://bob.example/a2a");

    let (status, _) = send(&state, bare("DELETE", "/agents/bob")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&state, bare("DELETE", "/agents/bob")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("bob"));
}

#[tokio::test]
async fn test_register_rejects_blank_id() {
    let state = state();
    let (status, body) = send(
        &state,
        bare("POST", "/agents/register?agent_id=&agent_url=http://x.example"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "agent_id must not be empty");
}

#[tokio::test]
async fn test_refresh_with_unreachable_registry_is_bad_gateway() {
    let state = state();
    state.directory.register("bob", "http://bob.example/a2a").unwrap();

    let (status, body) = send(&state, bare("POST", "/agents/refresh")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["detail"].as_str().unwrap().starts_with("Registry unreachable"));
    assert_eq!(state.directory.len(), 1);
}

#[tokio::test]
async fn test_health_and_root() {
    let state = state();
    state.directory.register("bob", "http://bob.example/a2a").unwrap();

    let (status, body) = send(&state, bare("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "healthy", "a2a_enabled": true, "known_agents": 1})
    );

    let (_, body) = send(&state, bare("GET", "/")).await;
    assert_eq!(body["agent_id"], "mimo");
    assert_eq!(body["known_agents"], json!(["bob"]));
}

#[tokio::test]
async fn test_agentfacts_are_stable() {
    let state = state();
    let (status, first) = send(&state, bare("GET", "/agentfacts")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["id"], "nanda:0000-test");
    let (_, second) = send(&state, bare("GET", "/agentfacts")).await;
    assert_eq!(first["id"], second["id"]);
}

#[tokio::test]
async fn test_query_answers_locally() {
    let state = state();
    let (status, body) = send(
        &state,
        post_json("/query", json!({"question": "favourite food?"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Raw shrimp.");
    assert!(body["processing_time"].as_f64().unwrap() >= 0.0);
    assert!(body["timestamp"].is_string());
}

async fn spawn_catalog(entries: Value) -> String {
    let app = Router::new().route(
        "/api/agentfacts",
        get(move || {
            let entries = entries.clone();
            async move { Json(entries) }
        }),
    );
    format!("{}/api/agentfacts", spawn(app).await)
}

#[tokio::test]
async fn test_search_selects_and_queries_agent() {
    let (peer, captured) = spawn_peer("sent").await;
    let catalog_url = spawn_catalog(json!({
        "agents": [
            {
                "id": "weather-1",
                "label": "Weather Bot",
                "description": "Forecasts",
                "endpoints": {"static": ["http://weather.invalid/a2a"]}
            },
            {
                "id": "mail-1",
                "label": "Mailer",
                "description": "Sends email",
                "skills": [{"id": "email"}],
                "endpoints": {
                    "static": [],
                    "adaptive_resolver": {"url": format!("{}/a2a", peer), "policies": ["load"]}
                }
            }
        ]
    }))
    .await;
    let state = state_with(
        r#"{"selected_agent_id": "mail-1", "reasoning": "email"}"#,
        catalog_url,
    );

    let (status, body) = send(
        &state,
        post_json("/search", json!({"query": "email my boss", "user_id": "u1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selected_agent"]["id"], "mail-1");
    assert_eq!(body["selected_agent"]["label"], "Mailer");
    assert_eq!(body["selected_agent"]["endpoint"], format!("{}/query", peer));
    assert_eq!(body["agent_response"], "sent");

    let bodies = captured.lock().unwrap();
    assert_eq!(bodies[0], json!({"question": "email my boss", "user_id": "u1"}));
}

#[tokio::test]
async fn test_search_with_empty_catalog_is_unavailable() {
    let catalog_url = spawn_catalog(json!([])).await;
    let state = state_with(r#"{"selected_agent_id": null}"#, catalog_url);

    let (status, body) = send(&state, post_json("/search", json!({"query": "anything"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["detail"], "No agents available in the database");
}

#[tokio::test]
async fn test_search_without_suitable_agent_is_not_found() {
    let catalog_url = spawn_catalog(json!([
        {"id": "weather-1", "label": "Weather Bot", "description": "Forecasts"}
    ]))
    .await;
    let state = state_with(r#"{"selected_agent_id": null, "reasoning": "none"}"#, catalog_url);

    let (status, _) = send(&state, post_json("/search", json!({"query": "weather"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_search_selected_agent_without_endpoint() {
    let catalog_url = spawn_catalog(json!([
        {"id": "weather-1", "label": "Weather Bot", "description": "Forecasts"}
    ]))
    .await;
    let state = state_with(r#"{"selected_agent_id": "weather-1"}"#, catalog_url);

    let (status, body) = send(&state, post_json("/search", json!({"query": "rain"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("Weather Bot"));
}

#[tokio::test]
async fn test_successful_route_is_audited() {
    let (peer, _) = spawn_peer("hello back").await;
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("logs").join("a2a_messages.log");
    let config = TwinConfig {
        agent_username: "mimo".to_string(),
        registry_url: closed_port_url("/api/agents"),
        audit_log_path: Some(log_path.clone()),
        ..TwinConfig::default()
    };
    let state = AppState::new(
        config,
        Arc::new(MockClient {
            response: String::new(),
        }),
    );
    state
        .directory
        .register("alice", &format!("{}/a2a", peer))
        .unwrap();

    let (status, _) = send(&state, post_json("/a2a", a2a_message("@alice hi there", "c7"))).await;
    assert_eq!(status, StatusCode::OK);

    let log = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("| INFO | INCOMING | conversation_id=c7"));
    assert!(lines[1].contains("| ROUTING |"));
    assert!(lines[1].contains("target=alice"));
    assert!(lines[1].contains("message=hi there"));
    assert!(lines[2].contains("| SUCCESS |"));
    assert!(lines[2].contains("response_length=10"));
}

#[tokio::test]
async fn test_a2a_missing_conversation_id_has_detail() {
    let state = state();
    let (status, body) = send(
        &state,
        post_json("/a2a", json!({"content": {"text": "@alice hi"}, "role": "user"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("conversation_id"));
}

#[tokio::test]
async fn test_non_json_body_has_detail() {
    let state = state();
    let request = Request::builder()
        .method("POST")
        .uri("/query")
        .header("content-type", "application/json")
        .body(Body::from("not json"))
        .unwrap();

    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_register_without_url_has_detail() {
    let state = state();
    let (status, body) = send(&state, bare("POST", "/agents/register?agent_id=x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("agent_url"));
    assert!(state.directory.is_empty());
}

#[tokio::test]
async fn test_configured_personality_and_backstory_reach_the_agent() {
    let config = TwinConfig {
        agent_username: "mimo".to_string(),
        agent_personality: Some("playful".to_string()),
        agent_backstory: Some("I am a calico cat.".to_string()),
        registry_url: closed_port_url("/api/agents"),
        audit_log_path: None,
        ..TwinConfig::default()
    };
    let state = AppState::new(
        config,
        Arc::new(MockClient {
            response: String::new(),
        }),
    );
    assert_eq!(state.agent.personality.as_deref(), Some("playful"));
    assert_eq!(state.agent.backstory.as_deref(), Some("I am a calico cat."));
}
