// src/main.rs

use anyhow::Result;
use clap::Parser;
use confdeck::cli::Cli;
use confdeck::config::{self, parsing};
use confdeck::web::{self, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging. Default to 'info' if RUST_LOG is not set.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                if cfg!(debug_assertions) {
                    "confdeck=debug".parse()?
                } else {
                    "confdeck=info".parse()?
                },
            ),
        )
        .init();

    log::info!("Starting confdeck v{}...", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let settings = config::load_settings(&cli)?;
    log::debug!("Resolved settings: {:?}", settings);

    let mut weak_secrets = Vec::new();
    if let Some(password) = &settings.password {
        if !password.starts_with(confdeck::constants::SHA256_PREFIX)
            && parsing::password_problems(password, "PASSWORD") != 0
        {
            weak_secrets.push("PASSWORD");
        }
    }
    if let Some(password) = &settings.api_password {
        if parsing::password_problems(password, "HASS_API_PASSWORD") != 0 {
            weak_secrets.push("HASS_API_PASSWORD");
        }
    }
    if let Some(sesame) = &settings.sesame {
        if parsing::password_problems(sesame, "SESAME") != 0 {
            weak_secrets.push("SESAME");
        }
    }

    // The browser works with relative paths rooted here.
    if let Some(basepath) = &settings.basepath {
        log::debug!("Changing basepath to: {}", basepath);
        std::env::set_current_dir(basepath)?;
    }

    let state = Arc::new(AppState::new(settings));

    if !weak_secrets.is_empty() {
        log::warn!("Your secrets seem insecure, consider changing them");
        if let Some(hass) = state.hass.clone() {
            let service = state.settings.notify_service.clone();
            let message = format!(
                "confdeck is running with weak secrets: {}",
                weak_secrets.join(", ")
            );
            tokio::spawn(async move { hass.notify(&service, &message).await });
        }
    }

    web::serve(state).await
}
