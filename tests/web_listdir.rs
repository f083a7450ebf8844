mod common;

use axum::http::StatusCode;
use common::{app, get, standalone_settings};
use confdeck::config::Settings;
use git2::Repository;
use http_body_util::BodyExt;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use tower::util::ServiceExt; // for oneshot

const PEER: &str = "127.0.0.1";

async fn listing(app: axum::Router, path: &Path) -> serde_json::Value {
    let response = app
        .oneshot(get(
            &format!("/api/listdir?path={}", path.display()),
            PEER,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn entry<'a>(json: &'a serde_json::Value, name: &str) -> &'a serde_json::Value {
    json["content"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["name"] == name)
        .unwrap_or_else(|| panic!("entry {} missing", name))
}

#[tokio::test]
async fn test_listing_carries_metadata_and_parent() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("configuration.yaml"), "hello").unwrap();
    fs::create_dir(dir.path().join("packages")).unwrap();

    let json = listing(app(standalone_settings()), dir.path()).await;
    assert!(json["error"].is_null());
    let file = entry(&json, "configuration.yaml");
    assert_eq!(file["type"], "file");
    assert_eq!(file["size"], 5);
    assert_eq!(file["gitstatus"], false);
    assert_eq!(entry(&json, "packages")["type"], "dir");
    assert_eq!(
        json["parent"],
        dir.path()
            .canonicalize()
            .unwrap()
            .parent()
            .unwrap()
            .to_string_lossy()
            .to_string()
    );
}

#[tokio::test]
async fn test_dirs_first_and_hidden_filtering() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.yaml"), "").unwrap();
    fs::write(dir.path().join(".secret"), "").unwrap();
    fs::create_dir(dir.path().join("zeta")).unwrap();

    let json = listing(
        app(Settings {
            dirs_first: true,
            hide_hidden: true,
            ..standalone_settings()
        }),
        dir.path(),
    )
    .await;
    let names: Vec<&str> = json["content"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["zeta", "a.yaml"]);
}

#[tokio::test]
async fn test_ignore_patterns_filter_entries() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("keep.yaml"), "").unwrap();
    fs::write(dir.path().join("home-assistant.db"), "").unwrap();

    let json = listing(
        app(Settings {
            ignore_pattern: vec!["*.db".to_string()],
            ..standalone_settings()
        }),
        dir.path(),
    )
    .await;
    let names: Vec<&str> = json["content"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["keep.yaml"]);
}

#[tokio::test]
async fn test_git_status_tagging() {
    let dir = tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let mut config = repo.config().unwrap();
    config.set_str("user.name", "tester").unwrap();
    config.set_str("user.email", "tester@example.org").unwrap();

    // One committed file, one staged, one untracked.
    fs::write(dir.path().join("committed.yaml"), "a").unwrap();
    {
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("committed.yaml")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = repo.signature().unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
    }
    fs::write(dir.path().join("staged.yaml"), "b").unwrap();
    {
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("staged.yaml")).unwrap();
        index.write().unwrap();
    }
    fs::write(dir.path().join("untracked.yaml"), "c").unwrap();

    let json = listing(
        app(Settings {
            git: true,
            ..standalone_settings()
        }),
        dir.path(),
    )
    .await;

    assert_eq!(entry(&json, "committed.yaml")["gitstatus"], true);
    assert_eq!(entry(&json, "committed.yaml")["gittracked"], "tracked");
    assert_eq!(entry(&json, "staged.yaml")["gitstatus"], "staged");
    assert_eq!(entry(&json, "staged.yaml")["changetype"], "A");
    assert_eq!(entry(&json, "untracked.yaml")["gittracked"], "untracked");
    assert!(json["activebranch"].is_string());
    // The staged-but-uncommitted file makes the tree dirty.
    assert_eq!(json["dirty"], true);
}

#[tokio::test]
async fn test_listing_without_git_support_is_untagged() {
    let dir = tempdir().unwrap();
    Repository::init(dir.path()).unwrap();
    fs::write(dir.path().join("a.yaml"), "").unwrap();

    let json = listing(app(standalone_settings()), dir.path()).await;
    assert_eq!(entry(&json, "a.yaml")["gitstatus"], false);
    assert!(json["branches"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_index_page_renders_standalone() {
    let app = app(standalone_settings());
    let response = app.oneshot(get("/", PEER)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let page = String::from_utf8_lossy(&body);
    assert!(page.contains("<title>confdeck</title>"));
    assert!(page.contains("standalone: true"));
    // All placeholders were substituted.
    assert!(!page.contains("###"));
}

#[tokio::test]
async fn test_abspath_and_parent_endpoints() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    let app = app(standalone_settings());

    let response = app
        .clone()
        .oneshot(get(&format!("/api/abspath?path={}", sub.display()), PEER))
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        String::from_utf8_lossy(&body),
        sub.canonicalize().unwrap().to_string_lossy()
    );

    let response = app
        .oneshot(get(&format!("/api/parent?path={}", sub.display()), PEER))
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        String::from_utf8_lossy(&body),
        dir.path().canonicalize().unwrap().to_string_lossy()
    );
}

#[tokio::test]
async fn test_proxied_prefix_reaches_api_routes() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.yaml"), "").unwrap();
    let app = app(standalone_settings());

    let response = app
        .oneshot(get(
            &format!("/hassio/ingress/xyz/api/listdir?path={}", dir.path().display()),
            PEER,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
