// Shared helpers for integration tests.
// A mock backend served by axum on an ephemeral port.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use serde_json::{Value, json};

use nativiweb::ApiClient;
use nativiweb::auth::{NoSession, SessionProvider};
use nativiweb::cache::TtlCache;
use nativiweb::config::ClientConfig;

/// Serve `router` on 127.0.0.1 and return its origin.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn config(base_url: &str) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_string(),
        ..ClientConfig::default()
    }
}

pub fn client(base_url: &str) -> ApiClient {
    client_with_session(base_url, Arc::new(NoSession))
}

pub fn client_with_session(base_url: &str, session: Arc<dyn SessionProvider>) -> ApiClient {
    ApiClient::new(&config(base_url), TtlCache::new(), session).unwrap()
}

pub fn project_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "web_url": "https://example.com",
        "platform": ["android"],
        "created_at": "2024-05-01T12:00:00Z"
    })
}

pub fn build_json(id: &str, status: &str, progress: u8) -> Value {
    json!({
        "id": id,
        "project_id": "p1",
        "platform": "android",
        "status": status,
        "progress": progress,
        "build_type": "debug",
        "created_at": "2024-05-01T12:00:00Z",
        "error_message": if status == "failed" { json!("gradle exited with 1") } else { Value::Null }
    })
}
