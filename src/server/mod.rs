//! Local host for the worker: an offline-caching proxy in front of the origin.
//!
//! Every request that is not one of the control routes below is turned into
//! a [`Request`] and routed through the worker, so pages served by this host
//! get the same cache-first and network-first behaviour a browser worker
//! would give them.
//!
//! Control routes:
//! - `GET /__pwa/health`
//! - `POST /__pwa/push` with a push payload as the body
//! - `POST /__pwa/sync` to replay pending submissions now
//! - `GET /static/manifest.json`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use bytes::Bytes;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::clients::ClientRegistry;
use crate::error::{Error, Result};
use crate::http::{Request, RequestMode, Response};
use crate::manifest::WebAppManifest;
use crate::push::Notification;
use crate::sync::SyncReport;
use crate::worker::ServiceWorker;

#[derive(Clone)]
struct AppState {
    worker: Arc<ServiceWorker>,
    clients: Arc<ClientRegistry>,
    manifest: Arc<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    worker: String,
}

#[derive(Serialize)]
struct PushResponse {
    notification: Option<Notification>,
}

#[derive(Serialize)]
struct SyncResponse {
    report: Option<SyncReport>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: &Error) -> axum::response::Response {
    (
        status,
        axum::Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

async fn pwa_health(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "ok".to_string(),
        version: state.worker.config().version.clone(),
        worker: state.worker.state().to_string(),
    })
}

async fn pwa_push(State(state): State<AppState>, body: Bytes) -> axum::response::Response {
    let data = (!body.is_empty()).then_some(&body[..]);
    match state.worker.push(data).await {
        Ok(notification) => axum::Json(PushResponse { notification }).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e),
    }
}

async fn pwa_sync(State(state): State<AppState>) -> axum::response::Response {
    let tag = state.worker.config().sync_tag.clone();
    match state.worker.sync(&tag).await {
        Ok(report) => axum::Json(SyncResponse { report }).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

async fn web_manifest(State(state): State<AppState>) -> impl IntoResponse {
    (
        [("content-type", "application/manifest+json")],
        state.manifest.as_str().to_owned(),
    )
}

async fn proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let request = match to_request(&state, method, &uri, &headers, body) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };
    if request.is_navigation() {
        state.clients.visit(request.url.as_str());
    }

    let routed = match state.worker.fetch(&request).await {
        Ok(Some(response)) => Ok(response),
        Ok(None) => state.worker.network().fetch(&request).await,
        Err(e) => Err(e),
    };
    match routed {
        Ok(response) => into_http(response),
        Err(e) => {
            log::warn!("{} {} failed: {e}", request.method, request.url);
            error_response(StatusCode::BAD_GATEWAY, &e)
        }
    }
}

fn to_request(
    state: &AppState,
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Request> {
    let url = state.worker.config().url_for(uri.path(), uri.query())?;
    let mode = request_mode(&method, headers);

    let mut request = Request::for_url(method, url).with_mode(mode).with_body(body);
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }
    Ok(request)
}

/// Navigations are GETs the browser marks as such, or GETs asking for HTML.
fn request_mode(method: &Method, headers: &HeaderMap) -> RequestMode {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if *method != Method::GET {
        return RequestMode::SameOrigin;
    }
    match header("sec-fetch-mode") {
        Some("navigate") => RequestMode::Navigate,
        Some("no-cors") => RequestMode::NoCors,
        Some("cors") => RequestMode::Cors,
        Some(_) => RequestMode::SameOrigin,
        None if header("accept").is_some_and(|a| a.contains("text/html")) => RequestMode::Navigate,
        None => RequestMode::SameOrigin,
    }
}

fn into_http(response: Response) -> axum::response::Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut headers = HeaderMap::new();
    for (name, value) in &response.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    (status, headers, Body::from(response.body)).into_response()
}

/// Builds the host application.
///
/// # Errors
///
/// Returns an error if the manifest cannot be serialized.
pub fn app(
    worker: Arc<ServiceWorker>,
    clients: Arc<ClientRegistry>,
    manifest: &WebAppManifest,
) -> Result<Router> {
    let state = AppState {
        worker,
        clients,
        manifest: Arc::new(manifest.to_json()?),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/__pwa/health", get(pwa_health))
        .route("/__pwa/push", post(pwa_push))
        .route("/__pwa/sync", post(pwa_sync))
        .route("/static/manifest.json", get(web_manifest))
        .fallback(proxy)
        .layer(cors)
        .with_state(state))
}

/// Serves `app` on `host:port` until `cancel` fires.
///
/// # Errors
///
/// Returns an error if the address is invalid or cannot be bound.
pub async fn run_server(
    app: Router,
    host: &str,
    port: u16,
    cancel: CancellationToken,
) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| Error::Config(format!("invalid listen address {host}:{port}: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Serving on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}
