//! Read-only endpoints: the editor page, file retrieval, directory listing
//! and the hub API proxies.

use super::{AppState, Assets};
use crate::errors::ApiError;
use crate::fsops::{self, ListOptions};
use crate::hass::HassClient;
use crate::vcs;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Containment check shared by every path-taking endpoint. Only active when
/// base-path enforcement is configured.
pub(crate) fn guard(state: &AppState, path: &Path) -> Result<(), ApiError> {
    let base = if state.settings.enforce_basepath {
        state.settings.basepath.as_deref()
    } else {
        None
    };
    if fsops::is_safe_path(base, path, true) {
        Ok(())
    } else {
        log::warn!("Access attempt outside the base path: {}", path.display());
        Err(ApiError::Denied)
    }
}

fn hub<'a>(state: &'a AppState) -> Result<&'a HassClient, ApiError> {
    state
        .hass
        .as_ref()
        .ok_or_else(|| ApiError::Upstream("API not configured".to_string()))
}

fn upstream(err: reqwest::Error) -> ApiError {
    ApiError::Upstream(err.to_string())
}

#[derive(Deserialize)]
pub struct FileQuery {
    pub filename: String,
}

#[derive(Deserialize)]
pub struct PathQuery {
    pub path: String,
}

/// Serves the editor page, seeded with the hub's service, event and state
/// catalogs and the API endpoints the browser should talk to.
pub async fn index(State(state): State<Arc<AppState>>) -> Response {
    let Some(asset) = Assets::get("index.html") else {
        return ApiError::NotFound.into_response();
    };
    let page = String::from_utf8_lossy(&asset.data).to_string();

    let boot = match &state.hass {
        Some(hass) => hass.bootstrap().await,
        None => Default::default(),
    };
    let api_url = state.settings.api_url.clone().unwrap_or_default();
    let ws_url = state.settings.ws_api_url.clone().unwrap_or_default();
    let page = page
        .replace("###SERVICES###", &boot.services)
        .replace("###EVENTS###", &boot.events)
        .replace("###STATES###", &boot.states)
        .replace("###APIURL###", &api_url)
        .replace("###WSURL###", &ws_url)
        .replace(
            "###STANDALONE###",
            if state.hass.is_some() { "false" } else { "true" },
        );
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], page).into_response()
}

/// Returns a file's contents: raw bytes with the guessed type for images,
/// text for everything the editor opens.
pub async fn api_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<Response, ApiError> {
    let path = PathBuf::from(&query.filename);
    guard(&state, &path)?;
    let data = fsops::load_file(&path)?;
    let mime = if fsops::is_image(&path) {
        mime_guess::from_path(&path)
            .first_or_octet_stream()
            .to_string()
    } else {
        "text/plain; charset=utf-8".to_string()
    };
    Ok(([(header::CONTENT_TYPE, mime)], data).into_response())
}

/// Like `api_file`, but answered as an attachment download.
pub async fn api_download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<Response, ApiError> {
    let path = PathBuf::from(&query.filename);
    guard(&state, &path)?;
    let data = fsops::load_file(&path)?;
    let basename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());
    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", basename),
            ),
        ],
        data,
    )
        .into_response())
}

/// Lists one directory, tagged with VCS status when git support is enabled
/// and a repository contains the path.
pub async fn api_listdir(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Response, ApiError> {
    let path = PathBuf::from(&query.path);
    guard(&state, &path)?;
    let options = ListOptions {
        ignore_pattern: state.settings.ignore_pattern.clone(),
        dirs_first: state.settings.dirs_first,
        hide_hidden: state.settings.hide_hidden,
    };
    let repo = if state.settings.git {
        vcs::discover(&path).ok()
    } else {
        None
    };
    let listing = fsops::list_directory(&path, repo.as_ref(), &options);
    Ok(Json(listing).into_response())
}

/// Resolves a path to absolute form, for the browser's location bar.
pub async fn api_abspath(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Response, ApiError> {
    let path = PathBuf::from(&query.path);
    guard(&state, &path)?;
    let resolved = path.canonicalize().map_err(|_| ApiError::NotFound)?;
    Ok(resolved.to_string_lossy().to_string().into_response())
}

/// Resolves a path's parent directory.
pub async fn api_parent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Response, ApiError> {
    let path = PathBuf::from(&query.path);
    guard(&state, &path)?;
    let resolved = path.canonicalize().unwrap_or(path);
    let parent = resolved
        .parent()
        .unwrap_or(&resolved)
        .to_string_lossy()
        .to_string();
    Ok(parent.into_response())
}

/// Current allow-list and ban-list.
pub async fn api_netstat(State(state): State<Arc<AppState>>) -> Response {
    let (allowed_networks, banned_ips) = state.gate.snapshot();
    Json(json!({
        "allowed_networks": allowed_networks,
        "banned_ips": banned_ips,
    }))
    .into_response()
}

/// Proxies a hub restart request.
pub async fn api_restart(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let body = hub(&state)?
        .call_service("homeassistant", "restart")
        .await
        .map_err(upstream)?;
    Ok(json_passthrough(body))
}

/// Runs the hub's configuration check and relays the verdict.
pub async fn api_check_config(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let body = hub(&state)?
        .post("config/core/check_config")
        .await
        .map_err(upstream)?;
    Ok(json_passthrough(body))
}

pub async fn api_reload_automations(
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    reload(&state, "automation", "reload").await
}

pub async fn api_reload_scripts(
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    reload(&state, "script", "reload").await
}

pub async fn api_reload_groups(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    reload(&state, "group", "reload").await
}

pub async fn api_reload_core(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    reload(&state, "homeassistant", "reload_core_config").await
}

async fn reload(state: &AppState, domain: &str, service: &str) -> Result<Response, ApiError> {
    let body = hub(state)?
        .call_service(domain, service)
        .await
        .map_err(upstream)?;
    Ok(json_passthrough(body))
}

/// Relays an upstream body verbatim with a JSON content type. The hub
/// answers JSON; re-parsing it here would only lose detail.
fn json_passthrough(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}
