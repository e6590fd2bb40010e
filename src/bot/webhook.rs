//! HTTP surface: pairing page, status API and the gateway webhook.
//!
//! The gateway posts every event for a session to `/webhook/:session`.
//! Payloads are decoded into client events and queued for the dispatcher.

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::dispatcher::AppState;
use super::session::PairError;
use crate::client::gateway::WEBHOOK_SECRET_HEADER;
use crate::client::{parse_webhook, Event};
use crate::utils::format_uptime;

/// Gateway payloads carry base64 media.
const MAX_BODY: usize = 64 * 1024 * 1024;

const INDEX_HTML: &str = include_str!("../../web/index.html");

#[derive(Clone)]
struct ApiState {
    app: AppState,
    events: mpsc::Sender<Event>,
}

#[derive(Debug, Deserialize)]
struct PairRequest {
    number: String,
}

/// Constant-time string comparison for the webhook secret.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn error_body(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message.into() })))
}

fn pair_error_status(err: &PairError) -> StatusCode {
    match err {
        PairError::InvalidNumber(_) => StatusCode::BAD_REQUEST,
        PairError::AlreadyPaired(_) => StatusCode::CONFLICT,
        PairError::Gateway(_) => StatusCode::BAD_GATEWAY,
        PairError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn status(State(state): State<ApiState>) -> Json<Value> {
    let app = &state.app;
    let stored = match app.sessions.stored_count().await {
        Ok(count) => json!(count),
        Err(e) => {
            warn!("Could not count stored devices: {}", e);
            Value::Null
        }
    };

    Json(json!({
        "bot": app.config.bot_name,
        "owner": app.config.owner_name,
        "prefix": app.bot_settings.prefix(),
        "uptime": format_uptime(app.started.elapsed()),
        "uptime_secs": app.started.elapsed().as_secs(),
        "backend": app.sessions.backend_name(),
        "stored": stored,
        "sessions": app.sessions.list(),
    }))
}

async fn pair(
    State(state): State<ApiState>,
    Json(req): Json<PairRequest>,
) -> (StatusCode, Json<Value>) {
    match state.app.sessions.pair(&req.number).await {
        Ok(code) => (StatusCode::OK, Json(json!({ "code": code }))),
        Err(e) => {
            warn!("Pair request for {} failed: {}", req.number, e);
            error_body(pair_error_status(&e), e.to_string())
        }
    }
}

async fn webhook(
    State(state): State<ApiState>,
    Path(session): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if let Some(secret) = &state.app.config.webhook_secret {
        let provided = headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !constant_time_eq(provided, secret) {
            warn!("Rejected webhook for {} with a bad secret", session);
            return error_body(StatusCode::UNAUTHORIZED, "invalid webhook secret");
        }
    }

    let events = parse_webhook(&session, &payload);
    debug!("Webhook for {}: {} event(s)", session, events.len());

    let accepted = events.len();
    for event in events {
        if state.events.send(event).await.is_err() {
            error!("Dispatcher is gone; dropping webhook for {}", session);
            return error_body(StatusCode::SERVICE_UNAVAILABLE, "shutting down");
        }
    }

    (StatusCode::OK, Json(json!({ "accepted": accepted })))
}

/// Build the router.
pub fn router(app: AppState, events: mpsc::Sender<Event>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status))
        .route("/api/pair", post(pair))
        .route("/webhook/:session", post(webhook))
        .layer(DefaultBodyLimit::max(MAX_BODY))
        .with_state(ApiState { app, events })
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    router: Router,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let address = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("📡 Listening on: {}", address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::bot::testing::{test_state, test_state_with};
    use crate::config::Config;

    fn app(state: AppState) -> (Router, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(16);
        (router(state, tx), rx)
    }

    async fn body_json(resp: axum::http::Response<Body>) -> Value {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn connection_update(state: &str) -> Value {
        json!({ "event": "connection.update", "data": { "state": state } })
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "secreT"));
        assert!(!constant_time_eq("secret", "secret2"));
    }

    #[tokio::test]
    async fn test_index_served() {
        let (app, _rx) = app(test_state());
        let resp = app.oneshot(Request::get("/").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_pair_returns_code_then_status_lists_session() {
        let state = test_state();
        let (app, _rx) = app(state.clone());

        let resp = app
            .clone()
            .oneshot(post_json("/api/pair", json!({ "number": "923001234567" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["code"], "ABCD-1234");

        let resp = app
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["backend"], "memory");
        assert_eq!(json["sessions"].as_array().unwrap().len(), 1);
        assert_eq!(json["sessions"][0]["connected"], false);
    }

    #[tokio::test]
    async fn test_pair_rejects_bad_number() {
        let (app, _rx) = app(test_state());
        let resp = app
            .oneshot(post_json("/api/pair", json!({ "number": "not a number" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(resp).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_webhook_queues_events() {
        let (app, mut rx) = app(test_state());
        let resp = app
            .oneshot(post_json("/webhook/s1", connection_update("close")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["accepted"], 1);
        assert!(matches!(rx.recv().await, Some(Event::Disconnected { session }) if session == "s1"));
    }

    #[tokio::test]
    async fn test_webhook_checks_secret() {
        let config = Config {
            webhook_secret: Some("hunter2".into()),
            ..Config::default()
        };
        let (app, mut rx) = app(test_state_with(config));

        let resp = app
            .clone()
            .oneshot(post_json("/webhook/s1", connection_update("close")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(rx.try_recv().is_err());

        let mut req = post_json("/webhook/s1", connection_update("close"));
        req.headers_mut()
            .insert(WEBHOOK_SECRET_HEADER, "hunter2".parse().unwrap());
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_webhook_ignores_unknown_events() {
        let (app, mut rx) = app(test_state());
        let resp = app
            .oneshot(post_json("/webhook/s1", json!({ "event": "presence.update", "data": {} })))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["accepted"], 0);
        assert!(rx.try_recv().is_err());
    }
}
