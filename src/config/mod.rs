//! Defines the `Settings` struct and its layered resolution.
//!
//! Settings are merged from four sources, later sources winning:
//! compiled defaults, a JSON settings file, environment variables carrying a
//! configurable prefix, and CLI flags. The result is one immutable snapshot
//! handed to the rest of the application.

use ipnetwork::IpNetwork;
use std::net::IpAddr;

pub use loader::load_settings;
mod loader;
pub mod parsing;

/// One immutable configuration snapshot for the whole process.
#[derive(Debug, Clone)]
pub struct Settings {
    /// IP address the server binds to.
    pub listen_ip: String,
    /// Port the server binds to. 0 allocates a dynamic port.
    pub port: u16,
    /// Root directory the editor confines itself to, if configured.
    pub basepath: Option<String>,
    /// Whether the path-containment guard is active.
    pub enforce_basepath: bool,
    /// TLS certificate path. TLS is enabled when both cert and key are set.
    pub ssl_certificate: Option<String>,
    /// TLS private key path.
    pub ssl_key: Option<String>,
    /// Base URL of the home-automation REST API, `None` in standalone mode.
    pub api_url: Option<String>,
    /// Websocket API URL override handed to the UI.
    pub ws_api_url: Option<String>,
    /// API key / password for the home-automation API.
    pub api_password: Option<String>,
    /// Username for Basic Auth. Auth is active when both are set.
    pub username: Option<String>,
    /// Password for Basic Auth, possibly `{sha256}`-hashed.
    pub password: Option<String>,
    /// Networks access is allowed from. Empty means open access.
    pub allowed_networks: Vec<IpNetwork>,
    /// Domains whose resolved addresses are also allowed.
    pub allowed_domains: Vec<String>,
    /// Statically banned client addresses.
    pub banned_ips: Vec<IpAddr>,
    /// Consecutive failed logins before an IP is hard-blocked. 0 disables.
    pub ban_limit: u32,
    /// Whether git integration is enabled.
    pub git: bool,
    /// Glob patterns for filenames hidden from directory listings.
    pub ignore_pattern: Vec<String>,
    /// Sort directories before files in listings.
    pub dirs_first: bool,
    /// Drop dotfile entries from listings.
    pub hide_hidden: bool,
    /// Static bypass token.
    pub sesame: Option<String>,
    /// Shared secret (base32) for time-based bypass tokens.
    pub sesame_totp_secret: Option<String>,
    /// Substring the Host header must contain, if configured.
    pub verify_hostname: Option<String>,
    /// Prefix for environment-variable overrides.
    pub env_prefix: String,
    /// Notification service called for operator-facing messages.
    pub notify_service: String,
    /// Skip TLS verification on outbound API calls.
    pub ignore_ssl: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_ip: crate::constants::DEFAULT_LISTEN.to_string(),
            port: crate::constants::DEFAULT_PORT,
            basepath: None,
            enforce_basepath: false,
            ssl_certificate: None,
            ssl_key: None,
            api_url: Some(crate::constants::DEFAULT_API_URL.to_string()),
            ws_api_url: None,
            api_password: None,
            username: None,
            password: None,
            allowed_networks: Vec::new(),
            allowed_domains: Vec::new(),
            banned_ips: Vec::new(),
            ban_limit: 0,
            git: false,
            ignore_pattern: Vec::new(),
            dirs_first: false,
            hide_hidden: false,
            sesame: None,
            sesame_totp_secret: None,
            verify_hostname: None,
            env_prefix: crate::constants::DEFAULT_ENV_PREFIX.to_string(),
            notify_service: crate::constants::DEFAULT_NOTIFY_SERVICE.to_string(),
            ignore_ssl: false,
        }
    }
}

impl Settings {
    /// True when Basic Auth must be enforced.
    pub fn auth_required(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// The socket address the server binds to.
    pub fn listening_socket(&self) -> String {
        format!("{}:{}", self.listen_ip, self.port)
    }

    /// The scheme/host/port the server announces to the operator.
    pub fn listening_address(&self) -> String {
        format!(
            "{}://{}:{}",
            if self.ssl_certificate.is_some() {
                "https"
            } else {
                "http"
            },
            self.listen_ip,
            self.port
        )
    }
}
