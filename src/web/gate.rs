//! Request admission middleware.
//!
//! Checks run in a fixed order: Host-header verification, bypass token,
//! network allow/ban lists, Basic Auth. The first failing check answers the
//! request; only a fully admitted request reaches the router.

use super::AppState;
use crate::access::AuthDecision;
use crate::constants::BASIC_REALM;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use std::net::SocketAddr;
use std::sync::Arc;

/// Policy-block status answered to banned or rate-limited clients.
fn policy_not_fulfilled() -> Response {
    (
        StatusCode::from_u16(420).unwrap_or(StatusCode::FORBIDDEN),
        "Policy not fulfilled",
    )
        .into_response()
}

pub async fn access_gate(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let client_ip = addr.ip();

    let hostname = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if !state.gate.verify_hostname(hostname) {
        log::warn!("Hostname verification failed, rejecting request");
        return (StatusCode::FORBIDDEN, "Access denied.").into_response();
    }

    // The bypass token rides the path of a plain GET, ahead of the network
    // check so a banned operator can re-admit themselves.
    if request.method() == Method::GET {
        if let Some(target) = state.gate.check_bypass(request.uri().path(), client_ip) {
            log::info!("Whitelisting IP {} via bypass token", client_ip);
            if let Some(hass) = state.hass.clone() {
                let service = state.settings.notify_service.clone();
                let message = format!(
                    "Your SESAME token was used to whitelist the IP address {}",
                    client_ip
                );
                tokio::spawn(async move { hass.notify(&service, &message).await });
            }
            return Redirect::to(&target).into_response();
        }
    }

    if !state.gate.check_network(client_ip) {
        return policy_not_fulfilled();
    }

    if state.gate.auth_required() {
        let authorization = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        match state.gate.authenticate(authorization, client_ip) {
            AuthDecision::Granted => {}
            AuthDecision::Challenge => {
                return (
                    StatusCode::UNAUTHORIZED,
                    [(
                        header::WWW_AUTHENTICATE,
                        format!("Basic realm=\"{}\"", BASIC_REALM),
                    )],
                    "Unauthorized",
                )
                    .into_response();
            }
            AuthDecision::Blocked => return policy_not_fulfilled(),
        }
    }

    next.run(request).await
}
