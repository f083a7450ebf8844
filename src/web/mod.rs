//! HTTP surface: router assembly, shared state, embedded UI assets and the
//! server entry point.
//!
//! Every request passes the access gate before routing. A path-rewriting
//! layer below the gate strips reverse-proxy prefixes so the API routes
//! match by suffix.

use crate::access::AccessGate;
use crate::config::Settings;
use crate::errors::ApiError;
use crate::hass::HassClient;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::uri::{PathAndQuery, Uri};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use rust_embed::RustEmbed;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

pub mod actions;
pub mod gate;
pub mod handlers;

/// Browser-facing UI assets compiled into the binary.
#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Assets;

/// Shared application state: one snapshot of settings, the mutable access
/// gate, and the hub client (absent in standalone mode).
pub struct AppState {
    pub settings: Settings,
    pub gate: AccessGate,
    pub hass: Option<HassClient>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let gate = AccessGate::new(&settings);
        let hass = settings.api_url.as_ref().map(|url| {
            HassClient::new(url, settings.api_password.clone(), settings.ignore_ssl)
        });
        Self {
            settings,
            gate,
            hass,
        }
    }
}

/// Builds the full application router with the gate and path-rewriting
/// layers applied.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/file", get(handlers::api_file))
        .route("/api/download", get(handlers::api_download))
        .route("/api/listdir", get(handlers::api_listdir))
        .route("/api/abspath", get(handlers::api_abspath))
        .route("/api/parent", get(handlers::api_parent))
        .route("/api/netstat", get(handlers::api_netstat))
        .route("/api/restart", get(handlers::api_restart))
        .route("/api/check_config", get(handlers::api_check_config))
        .route("/api/reload_automations", get(handlers::api_reload_automations))
        .route("/api/reload_scripts", get(handlers::api_reload_scripts))
        .route("/api/reload_groups", get(handlers::api_reload_groups))
        .route("/api/reload_core", get(handlers::api_reload_core))
        .route("/api/save", post(actions::api_save))
        // The upload handler enforces its own size cap so oversized bodies
        // are drained and answered with the sized error envelope.
        .route(
            "/api/upload",
            post(actions::api_upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/delete", post(actions::api_delete))
        .route("/api/newfile", post(actions::api_newfile))
        .route("/api/newfolder", post(actions::api_newfolder))
        .route("/api/exec_command", post(actions::api_exec_command))
        .route("/api/allowed_networks", post(actions::api_allowed_networks))
        .route("/api/banned_ips", post(actions::api_banned_ips))
        .route("/api/gitadd", post(actions::api_gitadd))
        .route("/api/gitdiff", post(actions::api_gitdiff))
        .route("/api/commit", post(actions::api_commit))
        .route("/api/checkout", post(actions::api_checkout))
        .route("/api/newbranch", post(actions::api_newbranch))
        .route("/api/init", post(actions::api_init))
        .route("/api/push", post(actions::api_push))
        .route("/api/stash", post(actions::api_stash))
        .fallback(static_handler)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(axum::middleware::map_request(rewrite_proxied_path))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            gate::access_gate,
        ))
        .with_state(state)
}

/// Starts the server, with TLS when a certificate and key are configured.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr: SocketAddr = state.settings.listening_socket().parse()?;
    let app = create_router(state.clone());
    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    log::info!("Listening on {}", state.settings.listening_address());
    match (
        state.settings.ssl_certificate.clone(),
        state.settings.ssl_key.clone(),
    ) {
        (Some(cert), Some(key)) => {
            let tls = RustlsConfig::from_pem_file(cert, key).await?;
            axum_server::bind_rustls(addr, tls).serve(service).await?;
        }
        _ => {
            axum_server::bind(addr).serve(service).await?;
        }
    }
    Ok(())
}

/// Rewrites request paths mangled by a reverse-proxy prefix: API calls are
/// matched by the last `/api/` occurrence, and any other directory-style
/// path collapses to the index. Runs below the gate so bypass tokens see
/// the original path.
async fn rewrite_proxied_path(mut request: Request) -> Request {
    let path = request.uri().path();
    let rewritten = if let Some(idx) = path.rfind("/api/") {
        if idx > 0 {
            Some(path[idx..].to_string())
        } else {
            None
        }
    } else if path.len() > 1 && path.ends_with('/') {
        Some("/".to_string())
    } else {
        None
    };
    let Some(new_path) = rewritten else {
        return request;
    };
    let path_and_query = match request.uri().query() {
        Some(query) => format!("{}?{}", new_path, query),
        None => new_path,
    };
    if let Ok(path_and_query) = path_and_query.parse::<PathAndQuery>() {
        let mut parts = request.uri().clone().into_parts();
        parts.path_and_query = Some(path_and_query);
        if let Ok(uri) = Uri::from_parts(parts) {
            *request.uri_mut() = uri;
        }
    }
    request
}

/// Serves embedded static assets, falling back to 404.
async fn static_handler(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    match Assets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref().to_string())], content.data).into_response()
        }
        None => (StatusCode::NOT_FOUND, "File not found").into_response(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Denied => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Io { .. } | ApiError::Git(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({ "error": true, "message": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

/// The success envelope shared by the mutating endpoints.
pub(crate) fn ok_envelope(message: impl Into<String>) -> Response {
    axum::Json(json!({ "error": false, "message": message.into() })).into_response()
}
