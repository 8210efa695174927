use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use nyboard_api::{AppState, AppStateInner, entries::RankPolicy, session::TokenKeys};
use nyboard_db::{BoardStore, Database, MemoryStore, StoreError};
use nyboard_gateway::dispatcher::Dispatcher;
use nyboard_types::api::EntryOrder;
use nyboard_types::events::GatewayEvent;
use nyboard_types::models::{Entry, Message};

fn state_with(store: Arc<dyn BoardStore>, policy: RankPolicy, timeout: Duration) -> AppState {
    Arc::new(AppStateInner {
        store,
        tokens: TokenKeys::new("integration-secret"),
        dispatcher: Dispatcher::new(),
        rank_policy: policy,
        request_timeout: timeout,
    })
}

fn app() -> (AppState, Router) {
    let state = state_with(Arc::new(MemoryStore::new()), RankPolicy::Atomic, Duration::from_secs(5));
    (state.clone(), nyboard_api::router(state))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn submit(app: &Router, name: &str, token: Option<&str>) -> (StatusCode, Value) {
    send(app, Method::POST, "/entries", token, Some(json!({ "name": name }))).await
}

#[tokio::test]
async fn ranks_follow_submission_order() {
    let (_, app) = app();

    let (status, alice) = submit(&app, "Alice", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(alice["entry"]["rank"], 1);
    assert!(alice["token"].as_str().is_some_and(|t| !t.is_empty()));

    let (status, bob) = submit(&app, "Bob", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(bob["entry"]["rank"], 2);
}

#[tokio::test]
async fn token_holder_cannot_submit_again() {
    let (_, app) = app();
    let (_, alice) = submit(&app, "Alice", None).await;
    let token = alice["token"].as_str().unwrap();

    let (status, body) = submit(&app, "Alice Again", Some(token)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_submitted");

    let (_, top) = send(&app, Method::GET, "/entries", None, None).await;
    assert_eq!(top.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_name_is_a_conflict() {
    let (_, app) = app();
    submit(&app, "Alice", None).await;

    let (status, body) = submit(&app, "Alice", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_name");
}

#[tokio::test]
async fn server_revalidates_names() {
    let (_, app) = app();

    let long = "x".repeat(31);
    for (name, reason) in [("", "empty"), ("<script>", "contains"), (long.as_str(), "31")] {
        let (status, body) = submit(&app, name, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{name:?}");
        assert_eq!(body["error"], "invalid_name");
        assert!(body["message"].as_str().unwrap().contains(reason), "{body}");
    }

    let (_, top) = send(&app, Method::GET, "/entries", None, None).await;
    assert_eq!(top, json!([]));
}

#[tokio::test]
async fn top_ten_window() {
    let (_, app) = app();
    for i in 0..12 {
        submit(&app, &format!("player {i}"), None).await;
    }

    let (status, top) = send(&app, Method::GET, "/entries?limit=10", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let ranks: Vec<u64> = top
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["rank"].as_u64().unwrap())
        .collect();
    assert_eq!(ranks, (1..=10).collect::<Vec<u64>>());

    // Default window is also ten, and two reads agree.
    let (_, first) = send(&app, Method::GET, "/entries", None, None).await;
    let (_, second) = send(&app, Method::GET, "/entries", None, None).await;
    assert_eq!(first, top);
    assert_eq!(first, second);

    let (_, by_created) = send(&app, Method::GET, "/entries?order=created&limit=3", None, None).await;
    assert_eq!(by_created[0]["name"], "player 0");
    assert_eq!(by_created.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn lookup_single_entry() {
    let (_, app) = app();
    submit(&app, "Alice", None).await;

    let (status, entry) = send(&app, Method::GET, "/entries/Alice", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["rank"], 1);

    let (status, body) = send(&app, Method::GET, "/entries/Nobody", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn session_reflects_token() {
    let (_, app) = app();

    let (_, anon) = send(&app, Method::GET, "/session", None, None).await;
    assert_eq!(anon, json!({ "name": null, "rank": null, "can_post": false }));

    let (_, alice) = submit(&app, "Alice", None).await;
    let token = alice["token"].as_str().unwrap();
    let (_, session) = send(&app, Method::GET, "/session", Some(token), None).await;
    assert_eq!(session, json!({ "name": "Alice", "rank": 1, "can_post": true }));

    let (_, forged) = send(&app, Method::GET, "/session", Some("forged.token.value"), None).await;
    assert_eq!(forged["can_post"], false);
}

#[tokio::test]
async fn message_board_gate_and_order() {
    let (_, app) = app();

    let (status, body) = send(&app, Method::POST, "/messages", None, Some(json!({ "message": "hi" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "not_eligible");

    let (_, alice) = submit(&app, "Alice", None).await;
    let token = alice["token"].as_str().unwrap();

    let (status, first) = send(&app, Method::POST, "/messages", Some(token), Some(json!({ "message": "first" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["name"], "Alice");
    send(&app, Method::POST, "/messages", Some(token), Some(json!({ "message": "second" }))).await;

    let (status, recent) = send(&app, Method::GET, "/messages", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let texts: Vec<&str> = recent
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(texts, ["second", "first"]);
}

#[tokio::test]
async fn message_validation_and_attribution() {
    let (_, app) = app();
    let (_, alice) = submit(&app, "Alice", None).await;
    let token = alice["token"].as_str().unwrap();

    let (status, body) = send(&app, Method::POST, "/messages", Some(token), Some(json!({ "message": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "empty_message");

    let long = "y".repeat(51);
    let (status, body) = send(&app, Method::POST, "/messages", Some(token), Some(json!({ "message": long }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "too_long");

    // The author comes from the token; a spoofed name field is refused outright.
    let (status, _) = send(
        &app,
        Method::POST,
        "/messages",
        Some(token),
        Some(json!({ "message": "hello", "name": "Mallory" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, recent) = send(&app, Method::GET, "/messages", None, None).await;
    assert_eq!(recent, json!([]));
}

#[tokio::test]
async fn recent_messages_window() {
    let (_, app) = app();
    let (_, alice) = submit(&app, "Alice", None).await;
    let token = alice["token"].as_str().unwrap();

    for i in 0..25 {
        send(&app, Method::POST, "/messages", Some(token), Some(json!({ "message": format!("m{i}") }))).await;
    }

    let (_, recent) = send(&app, Method::GET, "/messages", None, None).await;
    let recent = recent.as_array().unwrap();
    assert_eq!(recent.len(), 20);
    assert_eq!(recent[0]["message"], "m24");

    let (_, few) = send(&app, Method::GET, "/messages?limit=3", None, None).await;
    assert_eq!(few.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn writes_are_broadcast_on_the_gateway() {
    let (state, app) = app();
    let mut rx = state.dispatcher.subscribe();

    let (_, alice) = submit(&app, "Alice", None).await;
    match rx.recv().await.unwrap() {
        GatewayEvent::EntryCreate { entry } => assert_eq!(entry.name, "Alice"),
        other => panic!("unexpected event {other:?}"),
    }

    let token = alice["token"].as_str().unwrap();
    send(&app, Method::POST, "/messages", Some(token), Some(json!({ "message": "yo" }))).await;
    match rx.recv().await.unwrap() {
        GatewayEvent::MessageCreate { message } => assert_eq!(message.message, "yo"),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn health() {
    let (_, app) = app();
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn sqlite_backed_board_under_both_policies() {
    for policy in [RankPolicy::Atomic, RankPolicy::Parity] {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("board.db")).unwrap();
        let app = nyboard_api::router(state_with(Arc::new(db), policy, Duration::from_secs(5)));

        let (_, alice) = submit(&app, "Alice", None).await;
        let (_, bob) = submit(&app, "Bob", None).await;
        let (status, _) = submit(&app, "Bob", None).await;

        assert_eq!(alice["entry"]["rank"], 1, "{policy:?}");
        assert_eq!(bob["entry"]["rank"], 2, "{policy:?}");
        assert_eq!(status, StatusCode::CONFLICT, "{policy:?}");
    }
}

/// Store that stalls on reads, to exercise the request timeout.
struct Stalled(MemoryStore);

impl BoardStore for Stalled {
    fn count_entries(&self) -> Result<u64, StoreError> {
        self.0.count_entries()
    }
    fn list_entries(&self, order: EntryOrder, limit: u32) -> Result<Vec<Entry>, StoreError> {
        thread::sleep(Duration::from_millis(300));
        self.0.list_entries(order, limit)
    }
    fn find_entry(&self, name: &str) -> Result<Option<Entry>, StoreError> {
        self.0.find_entry(name)
    }
    fn write_entry(&self, name: &str, rank: u64) -> Result<Entry, StoreError> {
        self.0.write_entry(name, rank)
    }
    fn write_entry_next_rank(&self, name: &str) -> Result<Entry, StoreError> {
        self.0.write_entry_next_rank(name)
    }
    fn atomic_increment_and_get(&self, counter_id: &str) -> Result<u64, StoreError> {
        self.0.atomic_increment_and_get(counter_id)
    }
    fn append_message(&self, name: &str, message: &str) -> Result<Message, StoreError> {
        self.0.append_message(name, message)
    }
    fn list_messages(&self, limit: u32) -> Result<Vec<Message>, StoreError> {
        self.0.list_messages(limit)
    }
}

#[tokio::test]
async fn slow_store_surfaces_timeout() {
    let state = state_with(
        Arc::new(Stalled(MemoryStore::new())),
        RankPolicy::Atomic,
        Duration::from_millis(50),
    );
    let app = nyboard_api::router(state);

    let (status, body) = send(&app, Method::GET, "/entries", None, None).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "timeout");

    // Writes are unaffected.
    let (status, _) = submit(&app, "Alice", None).await;
    assert_eq!(status, StatusCode::CREATED);
}

/// Store whose first rank write takes longer than the request timeout.
struct SlowFirstWrite {
    inner: MemoryStore,
    slowed: AtomicBool,
}

impl BoardStore for SlowFirstWrite {
    fn count_entries(&self) -> Result<u64, StoreError> {
        self.inner.count_entries()
    }
    fn list_entries(&self, order: EntryOrder, limit: u32) -> Result<Vec<Entry>, StoreError> {
        self.inner.list_entries(order, limit)
    }
    fn find_entry(&self, name: &str) -> Result<Option<Entry>, StoreError> {
        self.inner.find_entry(name)
    }
    fn write_entry(&self, name: &str, rank: u64) -> Result<Entry, StoreError> {
        self.inner.write_entry(name, rank)
    }
    fn write_entry_next_rank(&self, name: &str) -> Result<Entry, StoreError> {
        if !self.slowed.swap(true, Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(200));
        }
        self.inner.write_entry_next_rank(name)
    }
    fn atomic_increment_and_get(&self, counter_id: &str) -> Result<u64, StoreError> {
        self.inner.atomic_increment_and_get(counter_id)
    }
    fn append_message(&self, name: &str, message: &str) -> Result<Message, StoreError> {
        self.inner.append_message(name, message)
    }
    fn list_messages(&self, limit: u32) -> Result<Vec<Message>, StoreError> {
        self.inner.list_messages(limit)
    }
}

#[tokio::test]
async fn slow_write_completes_instead_of_timing_out() {
    let state = state_with(
        Arc::new(SlowFirstWrite {
            inner: MemoryStore::new(),
            slowed: AtomicBool::new(false),
        }),
        RankPolicy::Atomic,
        Duration::from_millis(50),
    );
    let mut events = state.dispatcher.subscribe();
    let app = nyboard_api::router(state);

    let (status, alice) = submit(&app, "Alice", None).await;
    assert_eq!(status, StatusCode::CREATED, "{alice}");
    assert_eq!(alice["entry"]["rank"], 1);
    assert!(alice["token"].as_str().is_some_and(|t| !t.is_empty()));

    match events.recv().await.unwrap() {
        GatewayEvent::EntryCreate { entry } => assert_eq!(entry.name, "Alice"),
        other => panic!("unexpected event {other:?}"),
    }

    // The token from the slow submit unlocks the message board.
    let token = alice["token"].as_str().unwrap();
    let (status, _) = send(&app, Method::POST, "/messages", Some(token), Some(json!({ "message": "made it" }))).await;
    assert_eq!(status, StatusCode::CREATED);
}
