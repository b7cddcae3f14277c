//! Configuration Manager

use super::{Config, ConfigFile, ServerConfig};
use crate::Result;
use anyhow::{Context, bail};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load server settings from a TOML file, falling back to defaults if it is absent
    pub fn load_from_file(path: &Path) -> Result<ServerConfig> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            Self::load_from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            tracing::warn!("Configuration file not found at {}, using defaults", path.display());
            Ok(ServerConfig::default())
        }
    }

    /// Parse server settings from TOML text
    pub fn load_from_str(content: &str) -> Result<ServerConfig> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.server)
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_server_config()
            .with_context(|| "Server configuration validation failed")?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.server.log_level.as_str()) {
            bail!("log_level must be one of: {}", valid_log_levels.join(", "));
        }

        Ok(())
    }

    /// Validate server configuration
    fn validate_server_config(&self) -> Result<()> {
        if self.listen_port == 0 {
            bail!("listen port must be between 1 and 65535");
        }

        if let Some(max_sessions) = self.server.max_sessions {
            if max_sessions == 0 {
                bail!("max_sessions must be greater than 0");
            }
        }

        if self.server.copy_buffer_size < 512 {
            bail!("copy_buffer_size must be at least 512 bytes");
        }

        if self.server.copy_buffer_size > 1048576 {
            bail!("copy_buffer_size cannot exceed 1MB");
        }

        if self.server.handshake_buffer_size < 16 {
            bail!("handshake_buffer_size must be at least 16 bytes");
        }

        if self.server.handshake_buffer_size > 65536 {
            bail!("handshake_buffer_size cannot exceed 64KB");
        }

        if let Some(timeout) = self.server.connect_timeout {
            if timeout.is_zero() {
                bail!("connect_timeout must be greater than 0");
            }
        }

        Ok(())
    }

    /// Merge with CLI arguments
    pub fn merge_with_cli_args(
        &mut self,
        bind: Option<&str>,
        max_sessions: Option<usize>,
        connect_timeout: Option<&str>,
        log_level: Option<&str>,
    ) -> Result<()> {
        if let Some(bind_str) = bind {
            let addr = bind_str
                .parse::<IpAddr>()
                .with_context(|| format!("Invalid bind address: {}", bind_str))?;
            self.server.bind_addr = addr;
            tracing::info!("CLI override: bind address set to {}", addr);
        }

        if let Some(max) = max_sessions {
            self.server.max_sessions = Some(max);
            tracing::info!("CLI override: max sessions set to {}", max);
        }

        if let Some(timeout_str) = connect_timeout {
            let timeout: Duration = humantime::parse_duration(timeout_str)
                .with_context(|| format!("Invalid connect timeout: {}", timeout_str))?;
            self.server.connect_timeout = Some(timeout);
            tracing::info!("CLI override: connect timeout set to {:?}", timeout);
        }

        if let Some(level) = log_level {
            self.server.log_level = level.to_string();
        }

        Ok(())
    }
}
