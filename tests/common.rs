//! Shared helpers for the integration tests: router construction around a
//! settings snapshot and request builders carrying a fake peer address.

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::Router;
use confdeck::config::Settings;
use confdeck::web::{create_router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;

/// Settings for a standalone instance, so no test ever talks to a hub.
pub fn standalone_settings() -> Settings {
    Settings {
        api_url: None,
        ..Settings::default()
    }
}

pub fn app(settings: Settings) -> Router {
    create_router(Arc::new(AppState::new(settings)))
}

/// A GET request as seen from `ip`.
pub fn get(uri: &str, ip: &str) -> Request<Body> {
    let mut request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    insert_peer(&mut request, ip);
    request
}

/// A form-encoded POST as seen from `ip`.
pub fn post_form(uri: &str, body: &str, ip: &str) -> Request<Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    insert_peer(&mut request, ip);
    request
}

fn insert_peer(request: &mut Request<Body>, ip: &str) {
    let addr: SocketAddr = format!("{}:54321", ip).parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
}
