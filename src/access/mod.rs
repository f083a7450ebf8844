//! The access gate: admits or rejects each inbound request before any
//! business logic runs.
//!
//! Checks are applied in a fixed order per request: host-header
//! verification, bypass token (which may short-circuit to a redirect),
//! network allow/deny lists, and finally Basic Auth when credentials are
//! configured. The mutable pieces (allowed networks, banned IPs, fail
//! counters) are mutex-guarded and shared across connection handlers;
//! nothing is persisted across restarts.

use crate::config::Settings;
use ipnetwork::IpNetwork;
use std::collections::HashMap;
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::Mutex;

pub use auth::AuthDecision;
pub use token::build_totp;
mod auth;
mod token;

/// Shared, mutex-guarded access-control state.
pub struct AccessGate {
    allowed: Mutex<Vec<IpNetwork>>,
    banned: Mutex<Vec<IpAddr>>,
    failures: Mutex<HashMap<IpAddr, u32>>,
    credentials: Option<(String, String)>,
    ban_limit: u32,
    verify_hostname: Option<String>,
    allowed_domains: Vec<String>,
    sesame: Option<String>,
    totp: Option<totp_rs::TOTP>,
}

impl AccessGate {
    pub fn new(settings: &Settings) -> Self {
        let credentials = match (&settings.username, &settings.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };
        let totp = settings
            .sesame_totp_secret
            .as_deref()
            .and_then(token::build_totp);
        Self {
            allowed: Mutex::new(settings.allowed_networks.clone()),
            banned: Mutex::new(settings.banned_ips.clone()),
            failures: Mutex::new(HashMap::new()),
            credentials,
            ban_limit: settings.ban_limit,
            verify_hostname: settings.verify_hostname.clone(),
            allowed_domains: settings.allowed_domains.clone(),
            sesame: settings.sesame.clone(),
            totp,
        }
    }

    /// True when Basic Auth must be enforced for every request.
    pub fn auth_required(&self) -> bool {
        self.credentials.is_some()
    }

    /// True when a bypass token (static or time-based) is configured.
    pub fn bypass_configured(&self) -> bool {
        self.sesame.is_some() || self.totp.is_some()
    }

    /// Verifies the Host header against the configured hostname, if any.
    /// Substring containment, matching reverse-proxy setups that rewrite
    /// ports.
    pub fn verify_hostname(&self, request_hostname: &str) -> bool {
        match &self.verify_hostname {
            Some(expected) => request_hostname.contains(expected.as_str()),
            None => true,
        }
    }

    /// Decides whether a client address may reach the request router.
    ///
    /// Banned addresses are denied outright. An empty allow-list means open
    /// access. An address matching no configured network (and no allowed
    /// domain) is added to the ban list as a side effect, so the second
    /// attempt denies via the ban-list branch.
    pub fn check_network(&self, client_ip: IpAddr) -> bool {
        if self.banned.lock().unwrap().contains(&client_ip) {
            log::warn!("Client IP banned.");
            return false;
        }
        {
            let allowed = self.allowed.lock().unwrap();
            if allowed.is_empty() {
                return true;
            }
            if allowed.iter().any(|net| net.contains(client_ip)) {
                return true;
            }
        }
        log::warn!("Client IP not within allowed networks.");
        if !self.allowed_domains.is_empty() {
            if self
                .allowed_domains
                .iter()
                .any(|domain| resolve_domain(domain).contains(&client_ip))
            {
                return true;
            }
            log::warn!("Client IP not within allowed domains.");
        }
        self.banned.lock().unwrap().push(client_ip);
        false
    }

    /// Adds a client to the allow-list (idempotent) and lifts any ban, the
    /// side effect of a successful bypass token.
    pub fn whitelist(&self, client_ip: IpAddr) {
        let network = IpNetwork::from(client_ip);
        let mut allowed = self.allowed.lock().unwrap();
        if !allowed.contains(&network) {
            allowed.push(network);
        }
        self.banned.lock().unwrap().retain(|ip| *ip != client_ip);
    }

    /// Current allow-list and ban-list as display strings, for `/api/netstat`.
    pub fn snapshot(&self) -> (Vec<String>, Vec<String>) {
        let allowed = self
            .allowed
            .lock()
            .unwrap()
            .iter()
            .map(|net| net.to_string())
            .collect();
        let banned = self
            .banned
            .lock()
            .unwrap()
            .iter()
            .map(|ip| ip.to_string())
            .collect();
        (allowed, banned)
    }

    /// Appends a network to the allow-list. Invalid specifications are
    /// rejected.
    pub fn add_network(&self, spec: &str) -> Result<(), ipnetwork::IpNetworkError> {
        let network: IpNetwork = spec.parse()?;
        self.allowed.lock().unwrap().push(network);
        Ok(())
    }

    /// Removes a network from the allow-list. Removing the last entry
    /// re-opens access explicitly rather than silently flipping to the
    /// empty-list-means-open rule.
    pub fn remove_network(&self, spec: &str) {
        let mut allowed = self.allowed.lock().unwrap();
        allowed.retain(|net| net.to_string() != spec);
        if allowed.is_empty() {
            allowed.push("0.0.0.0/0".parse().unwrap());
        }
    }

    /// Adds an address to the ban list.
    pub fn ban(&self, spec: &str) -> Result<(), std::net::AddrParseError> {
        let ip: IpAddr = spec.parse()?;
        self.banned.lock().unwrap().push(ip);
        Ok(())
    }

    /// Removes an address from the ban list.
    pub fn unban(&self, spec: &str) {
        self.banned
            .lock()
            .unwrap()
            .retain(|ip| ip.to_string() != spec);
    }
}

/// Resolves a domain to its current addresses. Lookup failures degrade to an
/// empty result with a warning.
fn resolve_domain(domain: &str) -> Vec<IpAddr> {
    match format!("{}:443", domain).to_socket_addrs() {
        Ok(addrs) => addrs.map(|a| a.ip()).collect(),
        Err(err) => {
            log::warn!("Unable to lookup domain data: {}", err);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate_with(settings: Settings) -> AccessGate {
        AccessGate::new(&settings)
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_open_access_with_empty_allow_list() {
        let gate = gate_with(Settings::default());
        assert!(gate.check_network(ip("203.0.113.7")));
    }

    #[test]
    fn test_banned_ip_denied_regardless_of_allow_list() {
        let settings = Settings {
            banned_ips: vec![ip("203.0.113.7")],
            allowed_networks: vec!["203.0.113.0/24".parse().unwrap()],
            ..Settings::default()
        };
        let gate = gate_with(settings);
        assert!(!gate.check_network(ip("203.0.113.7")));
    }

    #[test]
    fn test_unmatched_ip_gets_banned_once() {
        let settings = Settings {
            allowed_networks: vec!["10.0.0.0/8".parse().unwrap()],
            ..Settings::default()
        };
        let gate = gate_with(settings);
        assert!(!gate.check_network(ip("203.0.113.7")));
        let (_, banned) = gate.snapshot();
        assert_eq!(banned, vec!["203.0.113.7".to_string()]);
        // Second call denies via the ban-list branch without growing the list.
        assert!(!gate.check_network(ip("203.0.113.7")));
        let (_, banned) = gate.snapshot();
        assert_eq!(banned.len(), 1);
    }

    #[test]
    fn test_allowed_network_member_admitted() {
        let settings = Settings {
            allowed_networks: vec!["192.168.0.0/16".parse().unwrap()],
            ..Settings::default()
        };
        let gate = gate_with(settings);
        assert!(gate.check_network(ip("192.168.1.30")));
    }

    #[test]
    fn test_whitelist_is_idempotent_and_lifts_ban() {
        let settings = Settings {
            allowed_networks: vec!["10.0.0.0/8".parse().unwrap()],
            banned_ips: vec![ip("203.0.113.7")],
            ..Settings::default()
        };
        let gate = gate_with(settings);
        gate.whitelist(ip("203.0.113.7"));
        gate.whitelist(ip("203.0.113.7"));
        let (allowed, banned) = gate.snapshot();
        assert_eq!(allowed.len(), 2);
        assert!(banned.is_empty());
        assert!(gate.check_network(ip("203.0.113.7")));
    }

    #[test]
    fn test_hostname_verification_substring() {
        let settings = Settings {
            verify_hostname: Some("example.org".to_string()),
            ..Settings::default()
        };
        let gate = gate_with(settings);
        assert!(gate.verify_hostname("example.org:3218"));
        assert!(!gate.verify_hostname("evil.test"));
        // Unconfigured means everything passes.
        let open = gate_with(Settings::default());
        assert!(open.verify_hostname("anything"));
    }

    #[test]
    fn test_remove_last_network_reopens_access() {
        let settings = Settings {
            allowed_networks: vec!["10.0.0.0/8".parse().unwrap()],
            ..Settings::default()
        };
        let gate = gate_with(settings);
        gate.remove_network("10.0.0.0/8");
        let (allowed, _) = gate.snapshot();
        assert_eq!(allowed, vec!["0.0.0.0/0".to_string()]);
    }

    #[test]
    fn test_ban_and_unban_roundtrip() {
        let gate = gate_with(Settings::default());
        gate.ban("203.0.113.9").unwrap();
        assert!(!gate.check_network(ip("203.0.113.9")));
        gate.unban("203.0.113.9");
        assert!(gate.check_network(ip("203.0.113.9")));
        assert!(gate.ban("not-an-ip").is_err());
    }
}
