//! Mutating endpoints: file writes, uploads, access-list edits, command
//! execution and the VCS operations. Every handler answers the shared JSON
//! envelope.

use super::handlers::guard;
use super::{ok_envelope, AppState};
use crate::constants::{DEFAULT_EXEC_TIMEOUT_SECS, MAX_UPLOAD_BYTES};
use crate::errors::ApiError;
use crate::exec;
use crate::fsops;
use crate::vcs;
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Deserialize)]
pub struct SaveForm {
    pub filename: String,
    pub text: String,
}

#[derive(Deserialize)]
pub struct PathForm {
    pub path: String,
}

#[derive(Deserialize)]
pub struct NewEntryForm {
    pub path: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct ExecForm {
    pub command: String,
    pub timeout: Option<u64>,
}

#[derive(Deserialize)]
pub struct NetworkForm {
    pub network: String,
    pub method: String,
}

#[derive(Deserialize)]
pub struct BanForm {
    pub ip: String,
    pub method: String,
}

#[derive(Deserialize)]
pub struct CommitForm {
    pub path: String,
    pub message: String,
}

#[derive(Deserialize)]
pub struct BranchForm {
    pub path: String,
    pub branch: String,
}

fn git_enabled(state: &AppState) -> Result<(), ApiError> {
    if state.settings.git {
        Ok(())
    } else {
        Err(ApiError::InvalidInput(
            "Git support is not enabled".to_string(),
        ))
    }
}

/// Sends an operator notification through the hub, best effort.
fn notify(state: &AppState, message: String) {
    if let Some(hass) = state.hass.clone() {
        let service = state.settings.notify_service.clone();
        tokio::spawn(async move { hass.notify(&service, &message).await });
    }
}

/// Whole-file overwrite from the editor.
pub async fn api_save(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SaveForm>,
) -> Result<Response, ApiError> {
    let path = PathBuf::from(&form.filename);
    guard(&state, &path)?;
    fsops::save_file(&path, &form.text)?;
    log::info!("Saved file {}", path.display());
    Ok(ok_envelope("File saved successfully"))
}

/// Multipart upload into a target directory. The file field is streamed and
/// counted; an oversized payload is drained to the end and answered with
/// its full size, and nothing touches the disk.
pub async fn api_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut target_dir: Option<String> = None;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::InvalidInput(err.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("path") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| ApiError::InvalidInput(err.to_string()))?;
                target_dir = Some(value);
            }
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::InvalidInput("Missing filename".to_string()))?;
                let mut data = Vec::new();
                let mut total: u64 = 0;
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|err| ApiError::InvalidInput(err.to_string()))?
                {
                    total += chunk.len() as u64;
                    if total <= MAX_UPLOAD_BYTES {
                        data.extend_from_slice(&chunk);
                    } else {
                        // Keep draining so the total can be reported.
                        data.clear();
                    }
                }
                if total > MAX_UPLOAD_BYTES {
                    return Err(ApiError::InvalidInput(format!("File too big: {}", total)));
                }
                upload = Some((filename, data));
            }
            _ => {}
        }
    }

    let (filename, data) =
        upload.ok_or_else(|| ApiError::InvalidInput("No file supplied".to_string()))?;

    // Only the basename of the uploaded file is honored.
    let basename = PathBuf::from(&filename)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| ApiError::InvalidInput("Missing filename".to_string()))?;
    let dir = target_dir.unwrap_or_else(|| ".".to_string());
    let path = PathBuf::from(&dir).join(&basename);
    guard(&state, &path)?;

    std::fs::write(&path, &data).map_err(|err| crate::errors::io_error_with_path(err, &path))?;
    log::info!("Uploaded file {}", path.display());
    Ok(ok_envelope("Upload successful"))
}

/// Deletes a file, or a directory when it is empty.
pub async fn api_delete(
    State(state): State<Arc<AppState>>,
    Form(form): Form<PathForm>,
) -> Result<Response, ApiError> {
    let path = PathBuf::from(&form.path);
    guard(&state, &path)?;
    fsops::delete_path(&path)?;
    log::info!("Deleted {}", path.display());
    Ok(ok_envelope(format!("Deleted: {}", form.path)))
}

pub async fn api_newfile(
    State(state): State<Arc<AppState>>,
    Form(form): Form<NewEntryForm>,
) -> Result<Response, ApiError> {
    let path = PathBuf::from(&form.path).join(&form.name);
    guard(&state, &path)?;
    let created = fsops::create_file(&form.path, &form.name)?;
    Ok(ok_envelope(format!("Created file: {}", created)))
}

pub async fn api_newfolder(
    State(state): State<Arc<AppState>>,
    Form(form): Form<NewEntryForm>,
) -> Result<Response, ApiError> {
    let path = PathBuf::from(&form.path).join(&form.name);
    guard(&state, &path)?;
    let created = fsops::create_folder(&form.path, &form.name)?;
    Ok(ok_envelope(format!("Created folder: {}", created)))
}

/// Runs one shell-quoted command and relays its captured output.
pub async fn api_exec_command(
    State(_state): State<Arc<AppState>>,
    Form(form): Form<ExecForm>,
) -> Result<Response, ApiError> {
    let timeout = Duration::from_secs(form.timeout.unwrap_or(DEFAULT_EXEC_TIMEOUT_SECS));
    let outcome = exec::run_command(&form.command, timeout).await?;
    log::info!(
        "Executed command, exit code {}: {}",
        outcome.returncode,
        form.command
    );
    Ok(Json(json!({
        "error": false,
        "message": "Command executed",
        "returncode": outcome.returncode,
        "stdout": outcome.stdout,
        "stderr": outcome.stderr,
    }))
    .into_response())
}

/// Adds or removes an entry on the network allow-list.
pub async fn api_allowed_networks(
    State(state): State<Arc<AppState>>,
    Form(form): Form<NetworkForm>,
) -> Result<Response, ApiError> {
    match form.method.as_str() {
        "add" => {
            state
                .gate
                .add_network(&form.network)
                .map_err(|err| ApiError::InvalidInput(err.to_string()))?;
            notify(&state, format!("Network added to allow-list: {}", form.network));
            Ok(ok_envelope(format!("Added network: {}", form.network)))
        }
        "remove" => {
            state.gate.remove_network(&form.network);
            notify(
                &state,
                format!("Network removed from allow-list: {}", form.network),
            );
            Ok(ok_envelope(format!("Removed network: {}", form.network)))
        }
        other => Err(ApiError::InvalidInput(format!(
            "Unknown method: {}",
            other
        ))),
    }
}

/// Bans or unbans a client address.
pub async fn api_banned_ips(
    State(state): State<Arc<AppState>>,
    Form(form): Form<BanForm>,
) -> Result<Response, ApiError> {
    match form.method.as_str() {
        "ban" => {
            state
                .gate
                .ban(&form.ip)
                .map_err(|err| ApiError::InvalidInput(err.to_string()))?;
            notify(&state, format!("IP address banned: {}", form.ip));
            Ok(ok_envelope(format!("Banned: {}", form.ip)))
        }
        "unban" => {
            state.gate.unban(&form.ip);
            notify(&state, format!("IP address unbanned: {}", form.ip));
            Ok(ok_envelope(format!("Unbanned: {}", form.ip)))
        }
        other => Err(ApiError::InvalidInput(format!(
            "Unknown method: {}",
            other
        ))),
    }
}

/// Stages one file in its containing repository.
pub async fn api_gitadd(
    State(state): State<Arc<AppState>>,
    Form(form): Form<PathForm>,
) -> Result<Response, ApiError> {
    git_enabled(&state)?;
    let path = PathBuf::from(&form.path);
    guard(&state, &path)?;
    let repo = vcs::discover(&path)?;
    let rel = vcs::add_path(&repo, &path)?;
    Ok(ok_envelope(format!("Staged: {}", rel)))
}

/// Patch text for one file, index vs. working tree.
pub async fn api_gitdiff(
    State(state): State<Arc<AppState>>,
    Form(form): Form<PathForm>,
) -> Result<Response, ApiError> {
    git_enabled(&state)?;
    let path = PathBuf::from(&form.path);
    guard(&state, &path)?;
    let repo = vcs::discover(&path)?;
    let patch = vcs::diff_path(&repo, &path)?;
    Ok(Json(json!({ "error": false, "message": patch })).into_response())
}

pub async fn api_commit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CommitForm>,
) -> Result<Response, ApiError> {
    git_enabled(&state)?;
    let path = PathBuf::from(&form.path);
    guard(&state, &path)?;
    let repo = vcs::discover(&path)?;
    vcs::commit(&repo, &form.message)?;
    log::info!("Committed changes in {}", form.path);
    Ok(ok_envelope("Changes committed"))
}

pub async fn api_checkout(
    State(state): State<Arc<AppState>>,
    Form(form): Form<BranchForm>,
) -> Result<Response, ApiError> {
    git_enabled(&state)?;
    let path = PathBuf::from(&form.path);
    guard(&state, &path)?;
    let repo = vcs::discover(&path)?;
    vcs::checkout_branch(&repo, &form.branch)?;
    Ok(ok_envelope(format!("Checked out branch: {}", form.branch)))
}

pub async fn api_newbranch(
    State(state): State<Arc<AppState>>,
    Form(form): Form<BranchForm>,
) -> Result<Response, ApiError> {
    git_enabled(&state)?;
    let path = PathBuf::from(&form.path);
    guard(&state, &path)?;
    let repo = vcs::discover(&path)?;
    vcs::create_branch(&repo, &form.branch)?;
    Ok(ok_envelope(format!("Created branch: {}", form.branch)))
}

pub async fn api_init(
    State(state): State<Arc<AppState>>,
    Form(form): Form<PathForm>,
) -> Result<Response, ApiError> {
    git_enabled(&state)?;
    let path = PathBuf::from(&form.path);
    guard(&state, &path)?;
    vcs::init(&path)?;
    Ok(ok_envelope(format!("Initialized repository: {}", form.path)))
}

pub async fn api_push(
    State(state): State<Arc<AppState>>,
    Form(form): Form<PathForm>,
) -> Result<Response, ApiError> {
    git_enabled(&state)?;
    let path = PathBuf::from(&form.path);
    guard(&state, &path)?;
    let repo = vcs::discover(&path)?;
    let url = vcs::push_origin(&repo)?;
    Ok(ok_envelope(format!("Pushed to: {}", url)))
}

pub async fn api_stash(
    State(state): State<Arc<AppState>>,
    Form(form): Form<PathForm>,
) -> Result<Response, ApiError> {
    git_enabled(&state)?;
    let path = PathBuf::from(&form.path);
    guard(&state, &path)?;
    let mut repo = vcs::discover(&path)?;
    let oid = vcs::stash(&mut repo)?;
    Ok(ok_envelope(format!("Stashed changes: {}", oid)))
}
