// src/cli.rs

use clap::Parser;

/// A single-process web editor and file browser for home-automation
/// configuration files.
///
/// confdeck serves a browser-based text editor rooted at a configurable base
/// directory, proxies a handful of REST calls to the home-automation API
/// (restart, config check, reloads) and can optionally expose git operations
/// on the edited files. It is built for one local operator; the access gate
/// (network allow-list, fail-to-ban, bypass tokens, Basic Auth) guards every
/// request.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a JSON file with persistent settings.
    pub settings: Option<String>,

    /// The IP address the service is listening on.
    #[arg(short = 'l', long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// The port the service is listening on. 0 allocates a dynamic port.
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Comma-separated list of networks / IP addresses from which access is
    /// allowed, e.g. 127.0.0.1,192.168.0.0/16. By default access is allowed
    /// from anywhere.
    #[arg(short = 'a', long, value_name = "NETWORKS")]
    pub allowed_networks: Option<String>,

    /// Username required for access.
    #[arg(short = 'U', long)]
    pub username: Option<String>,

    /// Password required for access.
    #[arg(short = 'P', long)]
    pub password: Option<String>,

    /// Bypass token that whitelists the calling IP when used as the last
    /// segment of a request path.
    #[arg(short = 'S', long, value_name = "TOKEN")]
    pub sesame: Option<String>,

    /// Path to initially serve files from.
    #[arg(short = 'b', long, value_name = "PATH")]
    pub basepath: Option<String>,

    /// Lock file access into the base path.
    #[arg(short = 'e', long, action = clap::ArgAction::SetTrue)]
    pub enforce: bool,

    /// Don't fetch data from the home-automation API.
    #[arg(short = 's', long, action = clap::ArgAction::SetTrue)]
    pub standalone: bool,

    /// Display directories first in listings.
    #[arg(short = 'd', long, action = clap::ArgAction::SetTrue)]
    pub dirsfirst: bool,

    /// Don't display hidden files.
    #[arg(short = 'H', long, action = clap::ArgAction::SetTrue)]
    pub hidehidden: bool,

    /// Enable git support.
    #[arg(short = 'g', long, action = clap::ArgAction::SetTrue)]
    pub git: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_all_off() {
        let cli = Cli::parse_from(["confdeck"]);
        assert!(cli.settings.is_none());
        assert!(cli.listen.is_none());
        assert!(cli.port.is_none());
        assert!(!cli.enforce);
        assert!(!cli.git);
    }

    #[test]
    fn test_settings_file_is_positional() {
        let cli = Cli::parse_from(["confdeck", "/etc/confdeck.json", "-e", "-g"]);
        assert_eq!(cli.settings.as_deref(), Some("/etc/confdeck.json"));
        assert!(cli.enforce);
        assert!(cli.git);
    }
}
