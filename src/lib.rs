//! confdeck: a single-process web editor and file browser for
//! home-automation configuration files.
//!
//! The crate is organized around one immutable [`config::Settings`] snapshot
//! resolved at startup, a shared [`access::AccessGate`] that admits or
//! rejects every request, filesystem operations under [`fsops`], the VCS
//! collaborator in [`vcs`], the hub API client in [`hass`], and the HTTP
//! surface in [`web`].

pub mod access;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod exec;
pub mod fsops;
pub mod hass;
pub mod vcs;
pub mod web;

pub use errors::ApiError;
pub use web::{create_router, serve, AppState};
