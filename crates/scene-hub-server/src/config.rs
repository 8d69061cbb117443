// crates/scene-hub-server/src/config.rs
// ============================================================================
// Module: Server Configuration
// Description: Environment-derived bind address and workspace root.
// Purpose: Validate startup inputs before any state is built.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Configuration comes from three environment variables: `PORT` (default
//! 34872), `HOST` (default `0.0.0.0`), and `WORKSPACE_PATH` (default the
//! current directory). Validation happens once at startup; a bad value is a
//! startup failure with a non-zero exit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default listen port.
pub const DEFAULT_PORT: u16 = 34_872;

/// Default listen host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Startup configuration failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `PORT` was not a valid non-zero port number.
    #[error("invalid PORT value: {0:?}")]
    InvalidPort(String),
    /// `HOST` was empty.
    #[error("HOST must not be empty")]
    EmptyHost,
    /// `WORKSPACE_PATH` was empty.
    #[error("WORKSPACE_PATH must not be empty")]
    EmptyWorkspace,
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Validated server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen host.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Workspace root for artifacts and debug bundles.
    pub workspace: PathBuf,
}

impl ServerConfig {
    /// Reads and validates configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the offending variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .ok_or(ConfigError::InvalidPort(raw))?,
            Err(_) => DEFAULT_PORT,
        };
        let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        if host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        let workspace = match env::var("WORKSPACE_PATH") {
            Ok(raw) if raw.trim().is_empty() => return Err(ConfigError::EmptyWorkspace),
            Ok(raw) => PathBuf::from(raw),
            Err(_) => PathBuf::from("."),
        };
        Ok(Self {
            host,
            port,
            workspace,
        })
    }

    /// Returns the socket bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
