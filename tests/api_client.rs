// API client integration tests against a mock backend.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::get;
use serde_json::json;

use nativiweb::api::{NewProject, Platform, ProjectUpdate};
use nativiweb::auth::{Session, SessionProvider, SharedSession, StaticSession};
use nativiweb::cache::TtlCache;
use nativiweb::error::{ApiError, Result};
use nativiweb::retry::{RetryPolicy, with_retry};
use nativiweb::ApiClient;

use common::{build_json, client, client_with_session, config, project_json, serve};

#[tokio::test]
async fn test_cached_list_refetched_after_create() {
    let hits = Arc::new(AtomicU32::new(0));
    let list_hits = hits.clone();

    let router = Router::new().route(
        "/api/projects",
        get(move || {
            let hits = list_hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(json!([project_json("p1", "Shop")]))
            }
        })
        .post(|Json(body): Json<serde_json::Value>| async move {
            (
                StatusCode::CREATED,
                Json(project_json("p2", body["name"].as_str().unwrap_or(""))),
            )
        }),
    );
    let client = client(&serve(router).await);

    let first = client.projects().list().await.unwrap();
    let second = client.projects().list().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let created = client
        .projects()
        .create(&NewProject {
            name: "Blog".to_string(),
            web_url: "https://blog.example.com".to_string(),
            description: None,
            platform: vec![Platform::Android, Platform::Ios],
            features: Vec::new(),
        })
        .await
        .unwrap();
    assert_eq!(created.name, "Blog");

    client.projects().list().await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_read_in_flight_during_create_is_not_cached() {
    let hits = Arc::new(AtomicU32::new(0));
    let list_hits = hits.clone();

    let router = Router::new().route(
        "/api/projects",
        get(move || {
            let hits = list_hits.clone();
            async move {
                if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                    // The first read is slow and sees the list before the create
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Json(json!([project_json("p1", "Shop")]))
                } else {
                    Json(json!([project_json("p1", "Shop"), project_json("p2", "Blog")]))
                }
            }
        })
        .post(|| async { (StatusCode::CREATED, Json(project_json("p2", "Blog"))) }),
    );
    let client = client(&serve(router).await);

    let slow_read = tokio::spawn({
        let client = client.clone();
        async move { client.projects().list().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    client
        .projects()
        .create(&NewProject {
            name: "Blog".to_string(),
            web_url: "https://blog.example.com".to_string(),
            description: None,
            platform: vec![Platform::Android],
            features: Vec::new(),
        })
        .await
        .unwrap();

    let stale = slow_read.await.unwrap().unwrap();
    assert_eq!(stale.len(), 1);

    let fresh = client.projects().list().await.unwrap();
    assert_eq!(fresh.len(), 2);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_update_and_delete_drop_cached_detail() {
    let hits = Arc::new(AtomicU32::new(0));
    let detail_hits = hits.clone();

    let router = Router::new().route(
        "/api/projects/{id}",
        get(move || {
            let hits = detail_hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(project_json("p1", "Shop"))
            }
        })
        .put(|Json(body): Json<serde_json::Value>| async move {
            Json(project_json("p1", body["name"].as_str().unwrap_or("")))
        })
        .delete(|| async { StatusCode::NO_CONTENT }),
    );
    let client = client(&serve(router).await);

    client.projects().get("p1").await.unwrap();
    client.projects().get("p1").await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let updated = client
        .projects()
        .update(
            "p1",
            &ProjectUpdate {
                name: Some("Renamed".to_string()),
                ..ProjectUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Renamed");

    client.projects().get("p1").await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    client.projects().delete("p1").await.unwrap();
    client.projects().get("p1").await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_project_delete_flushes_project_builds() {
    let hits = Arc::new(AtomicU32::new(0));
    let build_hits = hits.clone();

    let router = Router::new()
        .route(
            "/api/builds",
            get(move || {
                let hits = build_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!([build_json("b1", "completed", 100)]))
                }
            }),
        )
        .route(
            "/api/projects/{id}",
            axum::routing::delete(|| async { StatusCode::NO_CONTENT }),
        );
    let client = client(&serve(router).await);

    client.builds().list_for_project("p1").await.unwrap();
    client.builds().list_for_project("p1").await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(client.cache().contains("builds:project:p1"));

    client.projects().delete("p1").await.unwrap();

    assert!(!client.cache().contains("builds:project:p1"));
    client.builds().list_for_project("p1").await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_connection_refused_is_tagged() {
    // Reserve a port, then free it so nothing is listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = client(&base_url);
    let err = client.projects().list().await.unwrap_err();

    assert!(err.is_connection_error(), "got {:?}", err);
    assert!(err.user_message().contains(&base_url));
    assert!(err.user_message().contains("Start the backend server"));
}

#[tokio::test]
async fn test_validation_message_surfaces() {
    let router = Router::new().route(
        "/api/projects",
        get(|| async {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"detail": [{"msg": "name is required", "loc": ["body", "name"]}]})),
            )
        }),
    );
    let client = client(&serve(router).await);

    let err = client.projects().list().await.unwrap_err();

    assert!(!err.is_connection_error());
    assert_eq!(err.status(), Some(422));
    assert_eq!(err.to_string(), "name is required");
}

#[tokio::test]
async fn test_unauthorized_leaves_session_alone() {
    let router = Router::new().route(
        "/api/stats",
        get(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"detail": "Token expired"})),
            )
        }),
    );
    let session = SharedSession::default();
    session.set_session(Session::new("stale-token"));
    let mut changes = session.subscribe();
    changes.mark_unchanged();

    let client = client_with_session(&serve(router).await, Arc::new(session.clone()));
    let err = client.stats().get().await.unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized { ref message } if message == "Token expired"));
    assert_eq!(
        session.current().map(|s| s.access_token),
        Some("stale-token".to_string())
    );
    assert!(!changes.has_changed().unwrap());
}

struct BrokenSession;

#[async_trait]
impl SessionProvider for BrokenSession {
    async fn get_session(&self) -> Result<Option<Session>> {
        Err(ApiError::Other("keychain locked".to_string()))
    }
}

#[tokio::test]
async fn test_bearer_token_is_fail_open() {
    let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();

    let router = Router::new().route(
        "/api/features",
        get(move |headers: HeaderMap| {
            let seen = recorder.clone();
            async move {
                let auth = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                seen.lock().unwrap().push(auth);
                Json(json!([]))
            }
        }),
    );
    let base_url = serve(router).await;

    let providers: Vec<Arc<dyn SessionProvider>> = vec![
        Arc::new(StaticSession::new(Session::new("tok-123"))),
        Arc::new(BrokenSession),
        Arc::new(nativiweb::auth::NoSession),
    ];
    for provider in providers {
        let client = client_with_session(&base_url, provider);
        client.features().list().await.unwrap();
    }

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![Some("Bearer tok-123".to_string()), None, None]
    );
}

#[tokio::test]
async fn test_download_error_body_is_decoded() {
    let router = Router::new().route(
        "/api/builds/{id}/download",
        get(|| async {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"detail":"quota exceeded"}"#,
            )
        }),
    );
    let client = client(&serve(router).await);

    let err = client.builds().download("b1").await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(err.user_message(), "quota exceeded");
}

#[tokio::test]
async fn test_download_reports_progress() {
    let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    let body = payload.clone();

    let router = Router::new().route(
        "/api/builds/{id}/download",
        get(move || {
            let body = body.clone();
            async move {
                (
                    [(
                        header::CONTENT_DISPOSITION,
                        r#"attachment; filename="Shop-android.zip""#,
                    )],
                    body,
                )
            }
        }),
    );
    let client = client(&serve(router).await);

    let mut reports = Vec::new();
    let file = client
        .builds()
        .download_with_progress("b1", |progress| reports.push(progress))
        .await
        .unwrap();

    assert_eq!(file.filename, "Shop-android.zip");
    assert_eq!(file.bytes, payload);
    let last = reports.last().unwrap();
    assert_eq!(last.percent, 100);
    assert_eq!(last.bytes_received, payload.len() as u64);
    assert!(reports.windows(2).all(|w| w[0].bytes_received <= w[1].bytes_received));
}

#[tokio::test]
async fn test_download_uses_default_filename() {
    let router = Router::new().route(
        "/api/builds/{id}/download",
        get(|| async { vec![1u8, 2, 3] }),
    );
    let client = client(&serve(router).await);

    let file = client.builds().download("b7").await.unwrap();

    assert_eq!(file.filename, "build-b7.zip");
    assert_eq!(file.len(), 3);
}

#[tokio::test]
async fn test_dashboard_tolerates_failed_panel() {
    let router = Router::new()
        .route(
            "/api/admin/users",
            get(|| async { Json(json!([{"id": "u1", "email": "a@example.com"}])) }),
        )
        .route(
            "/api/admin/builds",
            get(|| async { Json(json!([build_json("b1", "completed", 100)])) }),
        )
        .route(
            "/api/admin/logs",
            get(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"detail": "log store offline"})),
                )
            }),
        )
        .route(
            "/api/admin/analytics",
            get(|| async { Json(json!({"daily_builds": 4})) }),
        );
    let client = client(&serve(router).await);

    let dashboard = client
        .admin()
        .dashboard(&RetryPolicy::none())
        .await
        .unwrap();

    assert_eq!(dashboard.users.len(), 1);
    assert_eq!(dashboard.builds.len(), 1);
    assert!(dashboard.logs.is_empty());
    assert_eq!(dashboard.analytics["daily_builds"], 4);
}

#[tokio::test]
async fn test_dashboard_fails_without_users() {
    let router = Router::new()
        .route(
            "/api/admin/users",
            get(|| async { (StatusCode::FORBIDDEN, Json(json!({"detail": "Admins only"}))) }),
        )
        .route("/api/admin/builds", get(|| async { Json(json!([])) }))
        .route("/api/admin/logs", get(|| async { Json(json!([])) }))
        .route("/api/admin/analytics", get(|| async { Json(json!({})) }));
    let client = client(&serve(router).await);

    let err = client
        .admin()
        .dashboard(&RetryPolicy::none())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Forbidden { .. }));
}

#[tokio::test]
async fn test_timeout_is_classified_and_retried() {
    let hits = Arc::new(AtomicU32::new(0));
    let slow_hits = hits.clone();

    let router = Router::new().route(
        "/api/stats",
        get(move || {
            let hits = slow_hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(500)).await;
                Json(json!({}))
            }
        }),
    );
    let mut config = config(&serve(router).await);
    config.request_timeout_ms = 50;
    let client = ApiClient::new(
        &config,
        TtlCache::new(),
        Arc::new(nativiweb::auth::NoSession),
    )
    .unwrap();

    let policy = RetryPolicy::new(2, Duration::from_millis(10));
    let err = with_retry(&policy, || async { client.stats().get().await })
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "got {:?}", err);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_list_for_project_sends_query() {
    let router = Router::new().route(
        "/api/builds",
        get(
            |axum::extract::Query(params): axum::extract::Query<
                std::collections::HashMap<String, String>,
            >| async move {
                let project = params.get("project_id").cloned().unwrap_or_default();
                Json(json!([build_json(&format!("{}-b1", project), "pending", 0)]))
            },
        ),
    );
    let client = client(&serve(router).await);

    let builds = client.builds().list_for_project("p9").await.unwrap();

    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].id, "p9-b1");
}
