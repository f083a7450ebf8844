//! Bypass tokens: a static secret or a time-based one-time code carried as
//! the last path segment of a request. A match whitelists the caller and
//! redirects to the same path with the token stripped.

use super::AccessGate;
use std::net::IpAddr;
use totp_rs::{Algorithm, Secret, TOTP};

/// Builds the TOTP verifier from a base32 shared secret. Standard
/// authenticator parameters: SHA-1, six digits, 30-second step, one step of
/// clock skew. A bad secret degrades with a warning, matching the
/// load-time behavior of the other list settings.
pub fn build_totp(secret: &str) -> Option<TOTP> {
    let bytes = match Secret::Encoded(secret.to_string()).to_bytes() {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("Unable to create TOTP verifier: {:?}", err);
            return None;
        }
    };
    match TOTP::new(Algorithm::SHA1, 6, 1, 30, bytes, None, String::new()) {
        Ok(totp) => Some(totp),
        Err(err) => {
            log::warn!("Unable to create TOTP verifier: {:?}", err);
            None
        }
    }
}

impl AccessGate {
    /// Compares the final path segment against the configured bypass tokens.
    ///
    /// On a match the caller's IP is whitelisted (idempotently), any ban is
    /// lifted, and the redirect target — the path with the token segment
    /// stripped — is returned. Evaluated before the network check and
    /// short-circuits it.
    pub fn check_bypass(&self, path: &str, client_ip: IpAddr) -> Option<String> {
        if !self.bypass_configured() {
            return None;
        }
        let chunk = path.rsplit('/').next().unwrap_or("");
        if chunk.is_empty() {
            return None;
        }
        let hit = self.sesame.as_deref() == Some(chunk)
            || self
                .totp
                .as_ref()
                .map(|totp| totp.check_current(chunk).unwrap_or(false))
                .unwrap_or(false);
        if !hit {
            return None;
        }
        self.whitelist(client_ip);
        let stripped = path.rfind(chunk).map(|idx| path[..idx].to_string());
        Some(stripped.unwrap_or_else(|| "/".to_string()))
    }
}
