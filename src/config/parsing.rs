//! Helpers for settings parsing: environment-value coercion, list
//! validation and the password-strength heuristics.

use ipnetwork::IpNetwork;
use serde_json::Value;
use std::net::IpAddr;

/// Settings keys whose environment values are comma-separated lists.
const LIST_KEYS: [&str; 3] = ["ALLOWED_NETWORKS", "BANNED_IPS", "IGNORE_PATTERN"];

/// Coerces a raw environment-variable string into a JSON value matching what
/// the settings file would contain: booleans, nulls, integers and the known
/// comma-separated list keys. Everything else stays a string.
pub fn coerce_env_value(key: &str, raw: &str) -> Value {
    match raw {
        "true" | "True" => return Value::Bool(true),
        "false" | "False" => return Value::Bool(false),
        "none" | "None" | "null" => return Value::Null,
        _ => {}
    }
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(n) = raw.parse::<u64>() {
            return Value::Number(n.into());
        }
    }
    if LIST_KEYS.contains(&key) {
        return Value::Array(
            raw.split(',')
                .map(|s| Value::String(s.to_string()))
                .collect(),
        );
    }
    Value::String(raw.to_string())
}

/// Parses a list of network specifications, dropping invalid entries with a
/// warning. Bare IP addresses parse as host networks.
pub fn parse_networks(specs: &[String]) -> Vec<IpNetwork> {
    let mut networks = Vec::new();
    for spec in specs {
        match spec.parse::<IpNetwork>() {
            Ok(net) => networks.push(net),
            Err(_) => log::warn!("Invalid network in ALLOWED_NETWORKS: {}", spec),
        }
    }
    networks
}

/// Parses a list of banned IP addresses, dropping invalid entries.
pub fn parse_banned_ips(specs: &[String]) -> Vec<IpAddr> {
    let mut ips = Vec::new();
    for spec in specs {
        match spec.parse::<IpAddr>() {
            Ok(ip) => ips.push(ip),
            Err(_) => log::warn!("Invalid IP address in BANNED_IPS: {}", spec),
        }
    }
    ips
}

/// Rudimentary password-strength check. Returns a bitmask of problems:
/// 1 = too short, 2 = no digits, 4 = no letters, 8 = low unique-character
/// score. 0 means no obvious weakness.
pub fn password_problems(password: &str, name: &str) -> u32 {
    let mut problems = 0;
    if password.len() < 8 {
        log::warn!("Password {} is too short", name);
        problems += 1;
    }
    if !password.is_empty() && password.chars().all(|c| c.is_alphabetic()) {
        log::warn!("Password {} does not contain digits", name);
        problems += 2;
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        log::warn!("Password {} does not contain alphabetic characters", name);
        problems += 4;
    }
    if !password.is_empty() {
        let unique = password
            .chars()
            .collect::<std::collections::HashSet<_>>()
            .len() as f64;
        let len = password.len() as f64;
        let quota = unique / len;
        let exp = len.powf(unique);
        let score = exp / quota / 8.0;
        if score < 65536.0 {
            log::warn!(
                "Password {} does not contain enough unique characters ({})",
                name,
                unique as usize
            );
            problems += 8;
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_coercion_booleans_and_null() {
        assert_eq!(coerce_env_value("GIT", "true"), Value::Bool(true));
        assert_eq!(coerce_env_value("GIT", "False"), Value::Bool(false));
        assert_eq!(coerce_env_value("SESAME", "null"), Value::Null);
        assert_eq!(coerce_env_value("SESAME", "None"), Value::Null);
    }

    #[test]
    fn test_env_coercion_numbers() {
        assert_eq!(coerce_env_value("PORT", "3218"), Value::Number(3218.into()));
        // Mixed strings stay strings.
        assert_eq!(
            coerce_env_value("PORT", "3218x"),
            Value::String("3218x".to_string())
        );
    }

    #[test]
    fn test_env_coercion_list_keys() {
        let v = coerce_env_value("ALLOWED_NETWORKS", "127.0.0.1,192.168.0.0/16");
        let arr = v.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0], Value::String("127.0.0.1".to_string()));
        // Non-list keys keep the comma.
        let v = coerce_env_value("VERIFY_HOSTNAME", "a,b");
        assert_eq!(v, Value::String("a,b".to_string()));
    }

    #[test]
    fn test_invalid_networks_are_dropped() {
        let nets = parse_networks(&[
            "127.0.0.1".to_string(),
            "not-a-network".to_string(),
            "10.0.0.0/8".to_string(),
        ]);
        assert_eq!(nets.len(), 2);
        assert!(nets[0].contains("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_invalid_banned_ips_are_dropped() {
        let ips = parse_banned_ips(&["8.8.8.8".to_string(), "garbage".to_string()]);
        assert_eq!(ips.len(), 1);
    }

    #[test]
    fn test_password_problems_flags() {
        assert_eq!(password_problems("abc", "TEST") & 1, 1); // short
        assert_eq!(password_problems("abcdefgh", "TEST") & 2, 2); // no digits
        assert_eq!(password_problems("12345678", "TEST") & 4, 4); // no letters
        assert_eq!(password_problems("aAbBcC1!deFg2#hi", "TEST"), 0);
    }
}
