//! Basic-Auth verification with fail-to-ban escalation.
//!
//! The fail counter lives for the process lifetime: it is created on first
//! failure, removed on success, and never persisted. Once an address has
//! accumulated failures up to the configured limit, even a correct login is
//! answered with a hard block until restart.

use super::AccessGate;
use crate::constants::SHA256_PREFIX;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::net::IpAddr;

/// Outcome of evaluating the Authorization header for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Credentials matched; proceed to routing.
    Granted,
    /// Re-emit the 401 challenge.
    Challenge,
    /// The fail-to-ban limit is reached; answer with the policy block.
    Blocked,
}

impl AccessGate {
    /// Evaluates the Basic-Auth header for a client. Only meaningful when
    /// credentials are configured; callers skip this otherwise.
    pub fn authenticate(&self, header: Option<&str>, client_ip: IpAddr) -> AuthDecision {
        let Some((username, password)) = &self.credentials else {
            return AuthDecision::Granted;
        };

        // A missing header is the initial challenge, not a failed attempt,
        // even for a client that already exhausted the limit.
        let Some(header) = header else {
            log::info!("Requesting authorization");
            return AuthDecision::Challenge;
        };

        // A client that already exhausted the limit stays blocked for any
        // presented credentials, correct or not, until the process restarts.
        if self.ban_limit > 0 {
            let failures = self.failures.lock().unwrap();
            if let Some(count) = failures.get(&client_ip) {
                if *count >= self.ban_limit {
                    log::warn!("Blocking access from {}", client_ip);
                    return AuthDecision::Blocked;
                }
            }
        }

        if let Some((presented_user, presented_pass)) = decode_basic(header) {
            let presented_pass = if password.starts_with(SHA256_PREFIX) {
                format!(
                    "{}{}",
                    SHA256_PREFIX,
                    hex::encode(Sha256::digest(presented_pass.as_bytes()))
                )
            } else {
                presented_pass
            };
            if presented_user == *username && constant_time_eq(&presented_pass, password) {
                self.failures.lock().unwrap().remove(&client_ip);
                return AuthDecision::Granted;
            }
        }

        if self.ban_limit > 0 {
            let mut failures = self.failures.lock().unwrap();
            let count = failures.get(&client_ip).copied().unwrap_or(1);
            if count >= self.ban_limit {
                log::warn!("Blocking access from {}", client_ip);
                return AuthDecision::Blocked;
            }
            failures.insert(client_ip, count + 1);
        }
        AuthDecision::Challenge
    }
}

/// Decodes a `Basic <base64>` header into username and password. The
/// password may itself contain colons; only the first colon separates the
/// two parts.
fn decode_basic(header: &str) -> Option<(String, String)> {
    let mut parts = header.split_whitespace();
    if parts.next()? != "Basic" {
        return None;
    }
    let payload = parts.next()?;
    let plain = String::from_utf8(BASE64.decode(payload).ok()?).ok()?;
    let (user, pass) = plain.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut v: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        v |= x ^ y;
    }
    v == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", BASE64.encode(format!("{}:{}", user, pass)))
    }

    fn gate(password: &str, ban_limit: u32) -> AccessGate {
        AccessGate::new(&Settings {
            username: Some("admin".to_string()),
            password: Some(password.to_string()),
            ban_limit,
            ..Settings::default()
        })
    }

    fn ip() -> IpAddr {
        "203.0.113.5".parse().unwrap()
    }

    #[test]
    fn test_correct_credentials_granted() {
        let gate = gate("secret", 0);
        assert_eq!(
            gate.authenticate(Some(&basic("admin", "secret")), ip()),
            AuthDecision::Granted
        );
    }

    #[test]
    fn test_missing_header_challenges() {
        let gate = gate("secret", 3);
        assert_eq!(gate.authenticate(None, ip()), AuthDecision::Challenge);
        // No failure recorded for the initial challenge.
        assert_eq!(
            gate.authenticate(Some(&basic("admin", "secret")), ip()),
            AuthDecision::Granted
        );
    }

    #[test]
    fn test_password_with_colons() {
        let gate = gate("se:cr:et", 0);
        assert_eq!(
            gate.authenticate(Some(&basic("admin", "se:cr:et")), ip()),
            AuthDecision::Granted
        );
    }

    #[test]
    fn test_sha256_password_scheme() {
        // sha256("secret")
        let hashed = format!("{}{}", SHA256_PREFIX, hex::encode(Sha256::digest(b"secret")));
        let gate = gate(&hashed, 0);
        assert_eq!(
            gate.authenticate(Some(&basic("admin", "secret")), ip()),
            AuthDecision::Granted
        );
        assert_eq!(
            gate.authenticate(Some(&basic("admin", "wrong")), ip()),
            AuthDecision::Challenge
        );
    }

    #[test]
    fn test_fail_counter_escalates_to_block() {
        let gate = gate("secret", 3);
        let wrong = basic("admin", "wrong");
        // First failure: counter starts at 1, stored as 2.
        assert_eq!(gate.authenticate(Some(&wrong), ip()), AuthDecision::Challenge);
        assert_eq!(gate.authenticate(Some(&wrong), ip()), AuthDecision::Challenge);
        // Counter now reads 3 == limit: hard block instead of a challenge.
        assert_eq!(gate.authenticate(Some(&wrong), ip()), AuthDecision::Blocked);
        // Even correct credentials are blocked once the limit is reached.
        assert_eq!(
            gate.authenticate(Some(&basic("admin", "secret")), ip()),
            AuthDecision::Blocked
        );
    }

    #[test]
    fn test_blocked_client_without_header_still_gets_challenge() {
        let gate = gate("secret", 2);
        let wrong = basic("admin", "wrong");
        assert_eq!(gate.authenticate(Some(&wrong), ip()), AuthDecision::Challenge);
        assert_eq!(gate.authenticate(Some(&wrong), ip()), AuthDecision::Blocked);
        // The bare 401 challenge is still answered to header-less requests.
        assert_eq!(gate.authenticate(None, ip()), AuthDecision::Challenge);
        // But any presented credentials stay blocked.
        assert_eq!(
            gate.authenticate(Some(&basic("admin", "secret")), ip()),
            AuthDecision::Blocked
        );
    }

    #[test]
    fn test_success_clears_fail_counter() {
        let gate = gate("secret", 3);
        let wrong = basic("admin", "wrong");
        assert_eq!(gate.authenticate(Some(&wrong), ip()), AuthDecision::Challenge);
        assert_eq!(
            gate.authenticate(Some(&basic("admin", "secret")), ip()),
            AuthDecision::Granted
        );
        // Counter was reset: the escalation starts over.
        assert_eq!(gate.authenticate(Some(&wrong), ip()), AuthDecision::Challenge);
        assert_eq!(gate.authenticate(Some(&wrong), ip()), AuthDecision::Challenge);
        assert_eq!(gate.authenticate(Some(&wrong), ip()), AuthDecision::Blocked);
    }

    #[test]
    fn test_malformed_header_counts_as_failure() {
        let gate = gate("secret", 2);
        assert_eq!(
            gate.authenticate(Some("Bearer xyz"), ip()),
            AuthDecision::Challenge
        );
        assert_eq!(
            gate.authenticate(Some("Basic not-base64!!"), ip()),
            AuthDecision::Blocked
        );
    }

    #[test]
    fn test_no_ban_limit_never_blocks() {
        let gate = gate("secret", 0);
        let wrong = basic("admin", "wrong");
        for _ in 0..10 {
            assert_eq!(gate.authenticate(Some(&wrong), ip()), AuthDecision::Challenge);
        }
    }
}
