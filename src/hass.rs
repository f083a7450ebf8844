//! Client for the automation hub's HTTP API.
//!
//! One `reqwest::Client` lives for the process lifetime. Authentication is
//! derived from the shape of the configured secret: a three-segment token is
//! sent as a bearer token, anything else as the legacy password header. The
//! UI bootstrap fetches are individually tolerant; an unreachable hub must
//! never take the editor down with it.

use serde_json::{json, Value};
use std::time::Duration;

const LEGACY_PASSWORD_HEADER: &str = "x-ha-access";

/// HTTP client for the hub API, carrying the base URL and credential.
#[derive(Debug, Clone)]
pub struct HassClient {
    base: String,
    password: Option<String>,
    http: reqwest::Client,
}

/// The three datasets the editor page is seeded with at render time. Each
/// one falls back to an empty JSON array when the hub cannot supply it.
#[derive(Debug)]
pub struct Bootstrap {
    pub services: String,
    pub events: String,
    pub states: String,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self {
            services: "[]".to_string(),
            events: "[]".to_string(),
            states: "[]".to_string(),
        }
    }
}

/// True for a JSON Web Token, which selects bearer authentication over the
/// legacy password header.
pub fn is_jwt(secret: &str) -> bool {
    secret.split('.').count() == 3
}

impl HassClient {
    pub fn new(api_url: &str, password: Option<String>, ignore_ssl: bool) -> Self {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(30));
        if ignore_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let base = if api_url.ends_with('/') {
            api_url.to_string()
        } else {
            format!("{}/", api_url)
        };
        Self {
            base,
            password,
            http: builder.build().unwrap_or_default(),
        }
    }

    fn request(&self, method: reqwest::Method, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base, endpoint);
        let mut req = self.http.request(method, url);
        if let Some(password) = &self.password {
            req = if is_jwt(password) {
                req.bearer_auth(password)
            } else {
                req.header(LEGACY_PASSWORD_HEADER, password)
            };
        }
        req
    }

    /// GET an endpoint and return the response body as text.
    async fn fetch(&self, endpoint: &str) -> Result<String, reqwest::Error> {
        self.request(reqwest::Method::GET, endpoint)
            .send()
            .await?
            .text()
            .await
    }

    /// Fetches the service/event/state catalogs for the editor page. Every
    /// failure degrades to `[]` with a warning.
    pub async fn bootstrap(&self) -> Bootstrap {
        let mut data = Bootstrap::default();
        match self.fetch("services").await {
            Ok(body) => data.services = body,
            Err(err) => log::warn!("Unable to fetch services: {}", err),
        }
        match self.fetch("events").await {
            Ok(body) => data.events = body,
            Err(err) => log::warn!("Unable to fetch events: {}", err),
        }
        match self.fetch("states").await {
            Ok(body) => data.states = body,
            Err(err) => log::warn!("Unable to fetch states: {}", err),
        }
        data
    }

    /// Calls a hub service with an empty payload and returns the raw
    /// response body.
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
    ) -> Result<String, reqwest::Error> {
        self.request(
            reqwest::Method::POST,
            &format!("services/{}/{}", domain, service),
        )
        .json(&json!({}))
        .send()
        .await?
        .text()
        .await
    }

    /// POSTs to an API endpoint and returns the response body, used by the
    /// configuration check proxy.
    pub async fn post(&self, endpoint: &str) -> Result<String, reqwest::Error> {
        self.request(reqwest::Method::POST, endpoint)
            .json(&json!({}))
            .send()
            .await?
            .text()
            .await
    }

    /// Sends a message through the configured notification service. The
    /// service name uses dotted form in configuration and slashes on the
    /// wire. Failures are logged and swallowed; notifications are best
    /// effort.
    pub async fn notify(&self, service: &str, message: &str) {
        let endpoint = format!("services/{}", service.replace('.', "/"));
        let payload: Value = json!({
            "title": "confdeck",
            "message": message,
            "notification_id": "confdeck",
        });
        let result = self
            .request(reqwest::Method::POST, &endpoint)
            .json(&payload)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => log::warn!("Notification rejected: {}", response.status()),
            Err(err) => log::warn!("Unable to send notification: {}", err),
        }
    }
}
