//! Environment-driven configuration.

use std::path::PathBuf;

use crate::error::{CmdsageError, Result};

/// Default generation model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Runtime configuration, resolved from the environment.
#[derive(Debug, Clone, Default)]
pub struct CmdsageConfig {
    /// Backend credential (`GOOGLE_API_KEY` or `GEMINI_API_KEY`).
    pub api_key: Option<String>,
    /// Relational store for the SQL tools (`CONNECTION_STRING`), optional.
    pub connection_string: Option<String>,
    /// Model identifier (`CMDSAGE_MODEL`).
    pub model: String,
    /// Override for the backend base URL (`GEMINI_BASE_URL`), used in tests.
    pub base_url: Option<String>,
    /// Override for the session directory (`CMDSAGE_SESSION_DIR`).
    pub session_dir: Option<PathBuf>,
}

impl CmdsageConfig {
    /// Load from environment variables, reading `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            api_key: std::env::var("GOOGLE_API_KEY")
                .or_else(|_| std::env::var("GEMINI_API_KEY"))
                .ok(),
            connection_string: std::env::var("CONNECTION_STRING").ok(),
            model: std::env::var("CMDSAGE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: std::env::var("GEMINI_BASE_URL").ok(),
            session_dir: std::env::var_os("CMDSAGE_SESSION_DIR").map(PathBuf::from),
        }
    }

    /// The backend credential, or a configuration error naming the variable.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            CmdsageError::Configuration(
                "missing backend credential: set GOOGLE_API_KEY (or GEMINI_API_KEY)".into(),
            )
        })
    }

    /// Where session logs live: the explicit override, or the platform data
    /// directory.
    pub fn session_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.session_dir {
            return Ok(dir.clone());
        }
        let dirs = directories::ProjectDirs::from("", "", "cmdsage").ok_or_else(|| {
            CmdsageError::Configuration("cannot determine a session data directory".into())
        })?;
        Ok(dirs.data_dir().join("sessions"))
    }
}
