// CLI module for agrocache
// Author: kelexine (https://github.com/kelexine)

use clap::Parser;
use std::path::PathBuf;

/// agrocache - fail-open Redis cache and performance monitor for the marketplace backend
#[derive(Parser, Debug)]
#[command(name = "agrocache", version, about, long_about = None)]
pub struct Args {
    /// Path to a TOML config file (default: ~/.agrocache/config.toml)
    #[arg(short, long, env = "AGROCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    pub host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Redis connection URL (overrides config and REDIS_URL)
    #[arg(long)]
    pub redis_url: Option<String>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Args {
    /// Apply command-line overrides on top of loaded configuration
    pub fn apply(&self, config: &mut crate::config::AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = &self.redis_url {
            config.cache.url = Some(url.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from(["agrocache", "--port", "9000", "--redis-url", "redis://r:6379"]);
        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.cache.url.as_deref(), Some("redis://r:6379"));
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
