#![cfg(feature = "server")]

use agent_twin::directory::Directory;
use agent_twin::forwarder::{ForwardError, Forwarder};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

type Captured = Arc<Mutex<Vec<Value>>>;

/// Peer whose `/query` records every body and answers `{"answer": answer}`.
async fn spawn_peer(answer: &'static str) -> (String, Captured) {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route(
            "/query",
            post(
                move |State(captured): State<Captured>, Json(body): Json<Value>| async move {
                    captured.lock().unwrap().push(body);
                    Json(json!({"answer": answer, "timestamp": "2026-01-01T00:00:00Z"}))
                },
            ),
        )
        .with_state(captured.clone());
    (spawn(app).await, captured)
}

fn forwarder_with(id: &str, url: &str) -> Forwarder {
    let directory = Arc::new(Directory::new("me", "http://127.0.0.1:1/agents"));
    directory.register(id, url).unwrap();
    Forwarder::new(directory, "agent-me")
}

#[tokio::test]
async fn test_forward_posts_question_to_query_endpoint() {
    let (base, captured) = spawn_peer("hi").await;
    let forwarder = forwarder_with("alice", &format!("{}/a2a", base));

    let answer = forwarder.forward("alice", "hello", "c1").await.unwrap();
    assert_eq!(answer, "hi");

    let bodies = captured.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0], json!({"question": "hello", "user_id": "agent-me"}));
}

#[tokio::test]
async fn test_forward_to_bare_base_url() {
    let (base, captured) = spawn_peer("ok").await;
    let forwarder = forwarder_with("bob", &base);

    assert_eq!(forwarder.forward("bob", "ping", "c2").await.unwrap(), "ok");
    assert_eq!(captured.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_target_makes_no_request() {
    let (base, captured) = spawn_peer("hi").await;
    let forwarder = forwarder_with("alice", &format!("{}/a2a", base));

    let err = forwarder.forward("carol", "hello", "c1").await.unwrap_err();
    assert!(matches!(err, ForwardError::UnknownAgent { ref known, .. } if known == &["alice"]));
    assert!(captured.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_slow_peer_times_out() {
    let app = Router::new().route(
        "/query",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"answer": "too late"}))
        }),
    );
    let base = spawn(app).await;
    let forwarder = forwarder_with("slow", &format!("{}/a2a", base))
        .with_timeout(Duration::from_millis(200));

    let err = forwarder.forward("slow", "hello", "c1").await.unwrap_err();
    assert_eq!(
        err,
        ForwardError::Timeout {
            agent_id: "slow".to_string()
        }
    );
}

#[tokio::test]
async fn test_error_status_is_a_transport_failure() {
    let app = Router::new().route(
        "/query",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let base = spawn(app).await;
    let forwarder = forwarder_with("broken", &format!("{}/a2a", base));

    let err = forwarder.forward("broken", "hello", "c1").await.unwrap_err();
    match err {
        ForwardError::Transport { agent_id, message } => {
            assert_eq!(agent_id, "broken");
            assert!(message.contains("500"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_is_a_transport_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let forwarder = forwarder_with("gone", &format!("http://127.0.0.1:{}/a2a", port));

    let err = forwarder.forward("gone", "hello", "c1").await.unwrap_err();
    assert!(matches!(err, ForwardError::Transport { .. }));
    assert!(err.to_string().starts_with("Error communicating with agent 'gone'"));
}

#[tokio::test]
async fn test_non_json_answer_is_returned_verbatim() {
    let app = Router::new().route("/query", post(|| async { "plain answer" }));
    let base = spawn(app).await;
    let forwarder = forwarder_with("plain", &format!("{}/query", base));

    assert_eq!(
        forwarder.forward("plain", "hello", "c1").await.unwrap(),
        "plain answer"
    );
}

#[tokio::test]
async fn test_query_url_uses_given_user_id() {
    let (base, captured) = spawn_peer("found").await;
    let forwarder = forwarder_with("unused", "http://unused.example/a2a");

    let answer = forwarder
        .query_url(&format!("{}/query", base), "weather?", "user-7")
        .await
        .unwrap();
    assert_eq!(answer, "found");
    assert_eq!(captured.lock().unwrap()[0]["user_id"], "user-7");
}
