//! The HTTP front door: routing, auth enforcement, SSE session
//! establishment, and server lifecycle.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::{FutureExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use trove_core::{ResourceProvider, SessionId};
use trove_rpc::codes;
use trove_rpc::{RpcRequest, RpcResponse};

use crate::auth::{self, AuthConfig};
use crate::config::ServerConfig;
use crate::dispatch::dispatch;
use crate::frames::SessionFrame;
use crate::registry::{start_heartbeat_task, start_sweep_task, SessionRegistry};

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live session table.
    pub registry: Arc<SessionRegistry>,
    /// The resource provider backing tool invocations.
    pub provider: Arc<dyn ResourceProvider>,
    /// Configured credential set.
    pub auth: Arc<AuthConfig>,
}

/// Build the axum router with all routes and layers.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/", post(rpc_handler))
        .route("/sse", get(sse_handler))
        .route("/messages", post(messages_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_handler))
        .merge(protected)
        .layer(middleware::from_fn(contain_panics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `GET /health` response body.
#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(rename = "activeSessionCount")]
    active_session_count: usize,
}

/// GET /health — liveness, unauthenticated.
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        active_session_count: state.registry.count(),
    })
}

/// GET /sse — open a stream session.
///
/// The first frame is `connected` and carries the session id; everything
/// after that flows through the registry-owned sink. Client death is
/// detected by the heartbeat broadcast and idle sweep, not by socket
/// state.
async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (session_id, rx) = state.registry.open();
    info!(session_id = %session_id, "stream session opened");

    let first = SessionFrame::connected(&session_id);
    let stream = futures::stream::once(async move { first })
        .chain(ReceiverStream::new(rx))
        .map(|frame| Ok::<_, Infallible>(frame.into_event()));
    Sse::new(stream)
}

/// POST / — one-shot JSON-RPC exchange; the response envelope is the
/// HTTP body.
async fn rpc_handler(State(state): State<AppState>, body: String) -> Response {
    let request: RpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "unparseable request body");
            return (StatusCode::BAD_REQUEST, Json(RpcResponse::parse_error())).into_response();
        }
    };
    let response = dispatch(&state.provider, request).await;
    respond(response)
}

/// Request envelope on the message path, optionally tagged with the
/// session the response should be delivered to.
#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
    #[serde(flatten)]
    request: RpcRequest,
}

/// POST /messages — inject a request into a stream session.
///
/// The HTTP exchange acknowledges acceptance only; the dispatched
/// response arrives later as a `tool-response` frame. A request without
/// a session id degrades to the synchronous exchange of `POST /`.
async fn messages_handler(State(state): State<AppState>, body: String) -> Response {
    let envelope: StreamEnvelope = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "unparseable request body");
            return (StatusCode::BAD_REQUEST, Json(RpcResponse::parse_error())).into_response();
        }
    };

    let Some(raw_id) = envelope.session_id else {
        let response = dispatch(&state.provider, envelope.request).await;
        return respond(response);
    };

    let session_id = SessionId::from_raw(raw_id);
    // A lookup miss fails closed; a fresh session is never invented here
    // because that would mask a client protocol bug.
    if state.registry.lookup(&session_id).is_none() {
        let response = RpcResponse::session_not_found(envelope.request.response_id());
        return (StatusCode::BAD_REQUEST, Json(response)).into_response();
    }
    let _ = state.registry.touch(&session_id);

    let provider = Arc::clone(&state.provider);
    let registry = Arc::clone(&state.registry);
    let request = envelope.request;
    let _ = tokio::spawn(async move {
        let response = dispatch(&provider, request).await;
        if !registry.deliver_response(&session_id, response) {
            warn!(session_id = %session_id, "dispatched response not delivered");
        }
    });

    (StatusCode::OK, Json(json!({ "status": "sent" }))).into_response()
}

/// Attach the HTTP status appropriate for a dispatch outcome.
fn respond(response: RpcResponse) -> Response {
    (status_for(&response), Json(response)).into_response()
}

/// HTTP status for a response envelope. Provider failures surfaced as
/// internal/rate-limit errors stay in-band at 200.
fn status_for(response: &RpcResponse) -> StatusCode {
    match response.error_code() {
        None => StatusCode::OK,
        Some(codes::METHOD_NOT_FOUND) => StatusCode::NOT_FOUND,
        Some(
            codes::PARSE_ERROR
            | codes::INVALID_REQUEST
            | codes::INVALID_PARAMS
            | codes::RESOURCE_NOT_FOUND,
        ) => StatusCode::BAD_REQUEST,
        Some(_) => StatusCode::OK,
    }
}

/// Middleware enforcing the bearer credential on protected routes.
///
/// Auth rejections are the one failure mode without a JSON envelope:
/// a bare 401 with the stable reason string.
async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    match auth::authenticate(header, &state.auth) {
        Ok(()) => next.run(request).await,
        Err(denied) => {
            warn!(reason = denied.reason(), "request rejected");
            (StatusCode::UNAUTHORIZED, denied.reason().to_owned()).into_response()
        }
    }
}

/// Top-of-router panic containment: an unexpected panic anywhere below
/// becomes a structured 500, never an unhandled fault.
async fn contain_panics(request: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            error!(detail = %detail, "handler panicked");
            let response =
                RpcResponse::internal_error(serde_json::Value::Null, "Internal server error");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

/// Handle returned by [`start`]; keeps the background tasks alive and
/// owns shutdown.
pub struct ServerHandle {
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    cancel: CancellationToken,
    server: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
    sweep: JoinHandle<()>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Number of live stream sessions.
    pub fn session_count(&self) -> usize {
        self.registry.count()
    }

    /// Signal every server task to stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Signal shutdown and wait for the listener and background tasks.
    pub async fn shutdown_and_wait(self) {
        self.cancel.cancel();
        let _ = self.server.await;
        let _ = self.heartbeat.await;
        let _ = self.sweep.await;
    }
}

/// Bind the listener, start the background tasks, and serve.
pub async fn start(
    config: ServerConfig,
    provider: Arc<dyn ResourceProvider>,
) -> std::io::Result<ServerHandle> {
    let registry = Arc::new(SessionRegistry::new(config.sink_queue_depth));
    let cancel = CancellationToken::new();

    let heartbeat_interval = Duration::from_secs(config.heartbeat_interval_secs);
    let idle_threshold = Duration::from_secs(config.idle_timeout_secs);
    let heartbeat = start_heartbeat_task(Arc::clone(&registry), heartbeat_interval, cancel.clone());
    let sweep = start_sweep_task(
        Arc::clone(&registry),
        heartbeat_interval,
        idle_threshold,
        cancel.clone(),
    );

    let state = AppState {
        registry: Arc::clone(&registry),
        provider,
        auth: Arc::new(config.auth.clone()),
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;
    info!(%addr, "trove server listening");

    let serve_cancel = cancel.clone();
    let server = tokio::spawn(async move {
        let shutdown = async move { serve_cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!(error = %e, "server task failed");
        }
    });

    Ok(ServerHandle {
        addr,
        registry,
        cancel,
        server,
        heartbeat,
        sweep,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde_json::Value;
    use tower::ServiceExt;
    use trove_core::Resource;
    use trove_provider::CatalogProvider;

    fn sample_provider() -> Arc<dyn ResourceProvider> {
        Arc::new(CatalogProvider::new(vec![
            Resource {
                name: "ripgrep".into(),
                url: "https://example.com/rg".into(),
                description: "regex search".into(),
                category: "Search".into(),
            },
            Resource {
                name: "tokio".into(),
                url: "https://tokio.rs".into(),
                description: "async runtime".into(),
                category: "Async".into(),
            },
        ]))
    }

    fn make_state(auth: AuthConfig) -> AppState {
        AppState {
            registry: Arc::new(SessionRegistry::new(8)),
            provider: sample_provider(),
            auth: Arc::new(auth),
        }
    }

    fn open_router() -> Router {
        build_router(make_state(AuthConfig::open()))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_request(uri: &str, body: &str, bearer: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_owned())).unwrap()
    }

    #[tokio::test]
    async fn health_is_public_and_reports_zero_sessions() {
        let app = build_router(make_state(AuthConfig::from_values(Some("secret".into()), None)));
        let req = axum::http::Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let v = body_json(resp).await;
        assert_eq!(v["status"], "healthy");
        assert_eq!(v["activeSessionCount"], 0);
    }

    #[tokio::test]
    async fn health_counts_open_sessions() {
        let state = make_state(AuthConfig::open());
        let (_id, _rx) = state.registry.open();
        let app = build_router(state);
        let req = axum::http::Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let v = body_json(app.oneshot(req).await.unwrap()).await;
        assert_eq!(v["activeSessionCount"], 1);
    }

    #[tokio::test]
    async fn catalog_list_over_the_default_path() {
        let app = open_router();
        let body = r#"{"protocolVersion":"2.0","id":1,"method":"catalog/list"}"#;
        let resp = app.oneshot(post_request("/", body, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let v = body_json(resp).await;
        assert_eq!(v["id"], 1);
        assert_eq!(v["result"]["tools"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unparseable_body_is_400_parse_error() {
        let app = open_router();
        let resp = app.oneshot(post_request("/", "not json", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let v = body_json(resp).await;
        assert_eq!(v["error"]["code"], codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn unknown_method_is_404_with_envelope() {
        let app = open_router();
        let body = r#"{"id":2,"method":"no/such"}"#;
        let resp = app.oneshot(post_request("/", body, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let v = body_json(resp).await;
        assert_eq!(v["error"]["code"], codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_tool_is_never_a_500() {
        let app = open_router();
        let body = r#"{"id":3,"method":"tool/invoke","params":{"name":"nonexistent_tool"}}"#;
        let resp = app.oneshot(post_request("/", body, None)).await.unwrap();
        assert_ne!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v = body_json(resp).await;
        assert_eq!(v["error"]["code"], codes::METHOD_NOT_FOUND);
        assert!(v["error"]["message"].as_str().unwrap().contains("nonexistent_tool"));
    }

    #[tokio::test]
    async fn unknown_category_surfaces_resource_not_found() {
        let app = open_router();
        let body = r#"{"id":4,"method":"tool/invoke","params":{"name":"filter_resources","arguments":{"category":"Gardening"}}}"#;
        let resp = app.oneshot(post_request("/", body, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let v = body_json(resp).await;
        assert_eq!(v["error"]["code"], codes::RESOURCE_NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_credential_is_bare_401() {
        let app = build_router(make_state(AuthConfig::from_values(Some("secret".into()), None)));
        let body = r#"{"id":1,"method":"catalog/list"}"#;
        let resp = app.oneshot(post_request("/", body, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"missing credential");
    }

    #[tokio::test]
    async fn invalid_credential_is_401() {
        let app = build_router(make_state(AuthConfig::from_values(Some("secret".into()), None)));
        let body = r#"{"id":1,"method":"catalog/list"}"#;
        let resp = app
            .oneshot(post_request("/", body, Some("wrong")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_credential_passes() {
        let app = build_router(make_state(AuthConfig::from_values(Some("secret".into()), None)));
        let body = r#"{"id":1,"method":"catalog/list"}"#;
        let resp = app
            .oneshot(post_request("/", body, Some("secret")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn sse_route_opens_an_event_stream() {
        let state = make_state(AuthConfig::open());
        let registry = Arc::clone(&state.registry);
        let app = build_router(state);
        let req = axum::http::Request::builder()
            .uri("/sse")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/event-stream"));
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn messages_with_unknown_session_is_400_connection_not_found() {
        let app = open_router();
        let body = r#"{"sessionId":"sess_missing","id":5,"method":"catalog/list"}"#;
        let resp = app
            .oneshot(post_request("/messages", body, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let v = body_json(resp).await;
        assert_eq!(v["error"]["code"], codes::RESOURCE_NOT_FOUND);
        assert_eq!(v["error"]["message"], "Connection not found");
        assert_eq!(v["id"], 5);
    }

    #[tokio::test]
    async fn messages_without_session_dispatches_inline() {
        let app = open_router();
        let body = r#"{"id":6,"method":"catalog/list"}"#;
        let resp = app
            .oneshot(post_request("/messages", body, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let v = body_json(resp).await;
        assert_eq!(v["result"]["tools"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn messages_with_live_session_acks_and_delivers_later() {
        let state = make_state(AuthConfig::open());
        let (session_id, mut rx) = state.registry.open();
        let app = build_router(state);

        let body = format!(
            r#"{{"sessionId":"{session_id}","id":"req-9","method":"tool/invoke","params":{{"name":"search_resources","arguments":{{"query":"ripgrep"}}}}}}"#
        );
        let resp = app
            .oneshot(post_request("/messages", &body, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let v = body_json(resp).await;
        assert_eq!(v["status"], "sent");

        // The response envelope arrives later, through the sink.
        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame.event_name(), "tool-response");
        let payload: Value = serde_json::from_str(&frame.payload_json().unwrap()).unwrap();
        assert_eq!(payload["id"], "req-9");
        assert!(payload["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("ripgrep"));
    }

    #[tokio::test]
    async fn options_preflight_is_public() {
        let app = build_router(make_state(AuthConfig::from_values(Some("secret".into()), None)));
        let req = axum::http::Request::builder()
            .method("OPTIONS")
            .uri("/")
            .header("origin", "https://example.com")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = open_router();
        let req = axum::http::Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_method_on_default_path_is_405() {
        let app = open_router();
        let req = axum::http::Request::builder()
            .method("GET")
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn panics_become_structured_500s() {
        let app = Router::new()
            .route(
                "/boom",
                get(|| async {
                    panic!("kaboom");
                    #[allow(unreachable_code)]
                    ()
                }),
            )
            .layer(middleware::from_fn(contain_panics));
        let req = axum::http::Request::builder()
            .uri("/boom")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v = body_json(resp).await;
        assert_eq!(v["error"]["code"], codes::INTERNAL_ERROR);
    }

    #[test]
    fn status_mapping_for_dispatch_outcomes() {
        use serde_json::json;
        let ok = RpcResponse::success(json!(1), json!({}));
        assert_eq!(status_for(&ok), StatusCode::OK);
        assert_eq!(status_for(&RpcResponse::parse_error()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&RpcResponse::method_not_found(json!(1), "x")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&RpcResponse::invalid_params(json!(1), "x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&RpcResponse::session_not_found(json!(1))),
            StatusCode::BAD_REQUEST
        );
        // Provider failures stay in-band
        assert_eq!(
            status_for(&RpcResponse::internal_error(json!(1), "x")),
            StatusCode::OK
        );
        assert_eq!(
            status_for(&RpcResponse::error(json!(1), codes::RATE_LIMITED, "x")),
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn start_binds_and_shuts_down() {
        let config = ServerConfig::default(); // port 0 = auto-assign
        let handle = start(config, sample_provider()).await.unwrap();
        assert!(handle.port() > 0);
        assert_eq!(handle.session_count(), 0);
        handle.shutdown_and_wait().await;
    }
}
