//! Merges the four settings sources into one snapshot.
//!
//! Order of precedence (lowest to highest): compiled defaults, JSON settings
//! file, prefixed environment variables, CLI flags. A broken settings file or
//! an invalid list entry degrades with a warning instead of aborting startup.

use super::parsing::{coerce_env_value, parse_banned_ips, parse_networks};
use super::Settings;
use crate::cli::Cli;
use crate::constants::SHA256_PREFIX;
use anyhow::Result;
use serde_json::{Map, Value};
use std::fs;

/// Resolves the full settings snapshot for this process.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut raw = read_settings_file(cli.settings.as_deref());

    // The prefix itself may be overridden by the settings file.
    let env_prefix = raw
        .get("ENV_PREFIX")
        .and_then(Value::as_str)
        .unwrap_or(crate::constants::DEFAULT_ENV_PREFIX)
        .to_string();
    apply_environment(&mut raw, &env_prefix);
    log::debug!("Settings after looking at environment: {:?}", raw);

    let mut settings = Settings {
        env_prefix,
        ..Settings::default()
    };

    if let Some(listen) = &cli.listen {
        settings.listen_ip = listen.clone();
    } else if let Some(v) = raw.get("LISTENIP").and_then(Value::as_str) {
        settings.listen_ip = v.to_string();
    }
    if let Some(port) = cli.port {
        settings.port = port;
    } else {
        // LISTENPORT is the legacy name and wins over PORT when present.
        if let Some(v) = raw.get("PORT").and_then(Value::as_u64) {
            settings.port = v as u16;
        }
        if let Some(v) = raw.get("LISTENPORT").and_then(Value::as_u64) {
            settings.port = v as u16;
        }
    }
    if let Some(basepath) = &cli.basepath {
        settings.basepath = Some(basepath.clone());
    } else {
        settings.basepath = get_string(&raw, "BASEPATH");
    }
    if cli.enforce {
        settings.enforce_basepath = true;
    } else {
        settings.enforce_basepath = get_bool(&raw, "ENFORCE_BASEPATH", false);
    }
    settings.ssl_certificate = get_string(&raw, "SSL_CERTIFICATE");
    settings.ssl_key = get_string(&raw, "SSL_KEY");
    if cli.standalone {
        settings.api_url = None;
    } else if let Some(v) = raw.get("HASS_API") {
        settings.api_url = v.as_str().map(str::to_string);
    }
    settings.ws_api_url = get_string(&raw, "HASS_WS_API");
    settings.api_password = get_string(&raw, "HASS_API_PASSWORD");

    let mut network_specs = get_string_list(&raw, "ALLOWED_NETWORKS");
    if let Some(cli_networks) = &cli.allowed_networks {
        network_specs = cli_networks.split(',').map(str::to_string).collect();
    }
    settings.allowed_networks = parse_networks(&network_specs);
    settings.allowed_domains = get_string_list(&raw, "ALLOWED_DOMAINS");
    settings.banned_ips = parse_banned_ips(&get_string_list(&raw, "BANNED_IPS"));
    settings.ban_limit = raw.get("BANLIMIT").and_then(Value::as_u64).unwrap_or(0) as u32;

    settings.git = cli.git || get_bool(&raw, "GIT", false);
    settings.ignore_pattern = get_string_list(&raw, "IGNORE_PATTERN");
    settings.dirs_first = cli.dirsfirst || get_bool(&raw, "DIRSFIRST", false);
    settings.hide_hidden = cli.hidehidden || get_bool(&raw, "HIDEHIDDEN", false);
    if let Some(sesame) = &cli.sesame {
        settings.sesame = Some(sesame.clone());
    } else {
        settings.sesame = get_string(&raw, "SESAME");
    }
    settings.sesame_totp_secret = get_string(&raw, "SESAME_TOTP_SECRET");
    settings.verify_hostname = get_string(&raw, "VERIFY_HOSTNAME");
    if let Some(v) = get_string(&raw, "NOTIFY_SERVICE") {
        settings.notify_service = v;
    }
    settings.ignore_ssl = get_bool(&raw, "IGNORE_SSL", false);

    resolve_credentials(cli, &raw, &mut settings);
    Ok(settings)
}

/// Username/password resolution: CLI pair wins, then the explicit settings
/// keys, then the legacy combined `user:pass` credential. Only the first
/// colon separates user from password. Hashed passwords are lowercased so
/// the hex comparison is case-insensitive.
fn resolve_credentials(cli: &Cli, raw: &Map<String, Value>, settings: &mut Settings) {
    if let (Some(user), Some(pass)) = (&cli.username, &cli.password) {
        settings.username = Some(user.clone());
        settings.password = Some(pass.clone());
    } else {
        settings.username = get_string(raw, "USERNAME");
        settings.password = get_string(raw, "PASSWORD").filter(|p| !p.is_empty());
    }
    if settings.username.is_none() || settings.password.is_none() {
        if let Some(combined) = get_string(raw, "CREDENTIALS") {
            let (user, pass) = combined.split_once(':').unwrap_or((combined.as_str(), ""));
            settings.username = Some(user.to_string());
            settings.password = Some(pass.to_string());
        }
    }
    if let Some(password) = &settings.password {
        if password.starts_with(SHA256_PREFIX) {
            settings.password = Some(password.to_lowercase());
        }
    }
}

fn read_settings_file(path: Option<&str>) -> Map<String, Value> {
    let Some(path) = path else {
        return Map::new();
    };
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => {
                log::debug!("Settings from file: {:?}", map);
                map
            }
            Ok(_) => {
                log::warn!("Settings file is not a JSON object: {}", path);
                Map::new()
            }
            Err(err) => {
                log::warn!("Not loading settings from file: {}", err);
                Map::new()
            }
        },
        Err(err) => {
            log::warn!("File not found: {} ({})", path, err);
            Map::new()
        }
    }
}

fn apply_environment(raw: &mut Map<String, Value>, prefix: &str) {
    for (key, value) in std::env::vars() {
        if let Some(stripped) = key.strip_prefix(prefix) {
            raw.insert(stripped.to_string(), coerce_env_value(stripped, &value));
        }
    }
}

fn get_string(raw: &Map<String, Value>, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

fn get_bool(raw: &Map<String, Value>, key: &str, default: bool) -> bool {
    raw.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn get_string_list(raw: &Map<String, Value>, key: &str) -> Vec<String> {
    let list: Vec<String> = raw
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    // An empty element means the whole value was malformed.
    if list.iter().any(String::is_empty) {
        log::warn!("Invalid value for {}. Using empty list.", key);
        return Vec::new();
    }
    list
}
