//! Command line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{load_config, validate_config, ConfigError, ProxyConfig};

#[derive(Debug, Parser)]
#[command(name = "audit-proxy")]
#[command(about = "Forward HTTP proxy that records every plain-HTTP exchange", long_about = None)]
pub struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Override `persistence.path`.
    #[arg(long)]
    pub audit_log: Option<String>,
}

impl Cli {
    /// Load the configuration file (if any) and apply flag overrides.
    pub fn resolve_config(&self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(path) = &self.audit_log {
            config.persistence.path = path.clone();
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}
