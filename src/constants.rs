// src/constants.rs
//! Compile-time defaults shared across the application.

/// Default address the server listens on.
pub const DEFAULT_LISTEN: &str = "0.0.0.0";

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3218;

/// Default prefix for environment-variable overrides.
pub const DEFAULT_ENV_PREFIX: &str = "CD_";

/// Default base URL of the home-automation API.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8123/api/";

/// Default notification service called for operator-facing messages.
pub const DEFAULT_NOTIFY_SERVICE: &str = "persistent_notification.create";

/// Realm announced in the Basic-Auth challenge.
pub const BASIC_REALM: &str = "confdeck";

/// Uploads larger than this are drained and rejected without writing.
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Default timeout for `/api/exec_command` subprocesses, in seconds.
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 15;

/// Marker prefix for hashed passwords in the settings file.
pub const SHA256_PREFIX: &str = "{sha256}";
