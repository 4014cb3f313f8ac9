use std::{collections::HashMap, sync::Arc};

use super::*;
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use shared::error::ErrorCode;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct ServerState {
    activities: Arc<Mutex<HashMap<String, Activity>>>,
    auth_headers: Arc<Mutex<Vec<String>>>,
}

impl ServerState {
    async fn record_auth(&self, headers: &HeaderMap) {
        if let Some(value) = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
        {
            self.auth_headers.lock().await.push(value.to_string());
        }
    }
}

async fn list_activities(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Json<Vec<Activity>> {
    state.record_auth(&headers).await;
    let mut activities: Vec<Activity> =
        state.activities.lock().await.values().cloned().collect();
    activities.sort_by(|a, b| a.id.cmp(&b.id));
    Json(activities)
}

async fn create_activity(
    State(state): State<ServerState>,
    Json(activity): Json<Activity>,
) -> StatusCode {
    state
        .activities
        .lock()
        .await
        .insert(activity.id.0.clone(), activity);
    StatusCode::OK
}

async fn update_activity(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(activity): Json<Activity>,
) -> impl IntoResponse {
    let mut guard = state.activities.lock().await;
    match guard.get_mut(&id) {
        Some(existing) => {
            *existing = activity.clone();
            (StatusCode::OK, Json(activity)).into_response()
        }
        None => (StatusCode::NOT_FOUND, "activity not found").into_response(),
    }
}

async fn delete_activity(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> StatusCode {
    match state.activities.lock().await.remove(&id) {
        Some(_) => StatusCode::OK,
        None => StatusCode::NOT_FOUND,
    }
}

async fn spawn_activity_server(seed: Vec<Activity>) -> Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    {
        let mut guard = state.activities.lock().await;
        for activity in seed {
            guard.insert(activity.id.0.clone(), activity);
        }
    }
    let app = Router::new()
        .route("/api/activities", get(list_activities).post(create_activity))
        .route(
            "/api/activities/:id",
            put(update_activity).delete(delete_activity),
        )
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api"), state))
}

fn sample_activity(id: &str) -> Activity {
    Activity {
        id: ActivityId::from(id),
        title: "Standup".into(),
        description: "daily sync".into(),
        category: "meeting".into(),
        date: "2024-01-01T10:00:00.000Z".into(),
        city: "Leeds".into(),
        venue: "Office".into(),
    }
}

#[tokio::test]
async fn list_decodes_wire_activities() {
    let (base_url, _state) =
        spawn_activity_server(vec![sample_activity("a"), sample_activity("b")])
            .await
            .expect("spawn server");
    let agent = HttpActivityAgent::new(&base_url).expect("agent");

    let activities = agent.list().await.expect("list");

    assert_eq!(activities.len(), 2);
    assert_eq!(activities[0].id, ActivityId::from("a"));
    assert_eq!(activities[0].date, "2024-01-01T10:00:00.000Z");
}

#[tokio::test]
async fn create_accepts_empty_acknowledgement() {
    let (base_url, state) = spawn_activity_server(Vec::new())
        .await
        .expect("spawn server");
    let agent = HttpActivityAgent::new(&base_url).expect("agent");

    let echoed = agent
        .create(&sample_activity("new"))
        .await
        .expect("create");

    assert!(echoed.is_none());
    assert!(state.activities.lock().await.contains_key("new"));
}

#[tokio::test]
async fn update_returns_echoed_activity() {
    let (base_url, state) = spawn_activity_server(vec![sample_activity("a")])
        .await
        .expect("spawn server");
    let agent = HttpActivityAgent::new(&base_url).expect("agent");
    let changed = Activity {
        title: "Retro".into(),
        ..sample_activity("a")
    };

    let echoed = agent.update(&changed).await.expect("update");

    assert_eq!(echoed, Some(changed.clone()));
    assert_eq!(
        state.activities.lock().await.get("a").map(|a| a.title.clone()),
        Some("Retro".to_string())
    );
}

#[tokio::test]
async fn rejected_update_carries_status_and_body() {
    let (base_url, _state) = spawn_activity_server(Vec::new())
        .await
        .expect("spawn server");
    let agent = HttpActivityAgent::new(&base_url).expect("agent");

    let err = agent
        .update(&sample_activity("ghost"))
        .await
        .expect_err("missing activity");

    match err {
        AgentError::Rejected(api) => {
            assert_eq!(api.code, ErrorCode::NotFound);
            assert_eq!(api.status, 404);
            assert_eq!(api.message, "activity not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn delete_removes_remote_entry() {
    let (base_url, state) = spawn_activity_server(vec![sample_activity("a")])
        .await
        .expect("spawn server");
    let agent = HttpActivityAgent::new(&base_url).expect("agent");

    agent
        .delete(&ActivityId::from("a"))
        .await
        .expect("delete");
    assert!(state.activities.lock().await.is_empty());

    let err = agent
        .delete(&ActivityId::from("a"))
        .await
        .expect_err("second delete");
    assert!(matches!(err, AgentError::Rejected(api) if api.message == "Not Found"));
}

#[tokio::test]
async fn settings_token_is_sent_as_bearer() {
    let (base_url, state) = spawn_activity_server(Vec::new())
        .await
        .expect("spawn server");
    let settings = ClientSettings {
        api_base_url: base_url,
        api_token: Some("secret-token".into()),
        request_timeout_secs: Some(5),
    };
    let agent = HttpActivityAgent::from_settings(&settings).expect("agent");

    agent.list().await.expect("list");

    assert_eq!(
        state.auth_headers.lock().await.clone(),
        vec!["Bearer secret-token".to_string()]
    );
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let agent = HttpActivityAgent::new(&format!("http://{addr}/api")).expect("agent");
    let err = agent.list().await.expect_err("nothing listening");

    assert!(matches!(err, AgentError::Transport { .. }), "{err}");
}

#[test]
fn item_urls_escape_ids_under_base_path() {
    let agent = HttpActivityAgent::new("http://localhost:5000/api").expect("agent");
    assert_eq!(agent.base_url().as_str(), "http://localhost:5000/api/");

    let url = agent
        .item_url(&ActivityId::from("a b/c"))
        .expect("item url");
    assert_eq!(url.as_str(), "http://localhost:5000/api/activities/a%20b%2Fc");
}

#[test]
fn invalid_base_url_is_rejected() {
    assert!(matches!(
        HttpActivityAgent::new("not a url"),
        Err(AgentError::InvalidUrl(_))
    ));
}
