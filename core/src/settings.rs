//! Runtime settings: which backend to talk to and how long to wait for it.
//!
//! Values come from the environment (`TRACKER_MODE`, `TRACKER_BASE_URL`,
//! `TRACKER_TIMEOUT_MS`). `from_lookup` takes the lookup as a closure so
//! tests never touch the process environment.

use std::str::FromStr;
use std::time::Duration;

use crate::client::{ClientConfig, DEFAULT_TIMEOUT};

pub const DEV_URL: &str = "http://localhost:4000";

pub const MODE_VAR: &str = "TRACKER_MODE";
pub const BASE_URL_VAR: &str = "TRACKER_BASE_URL";
pub const TIMEOUT_VAR: &str = "TRACKER_TIMEOUT_MS";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("unknown mode {0:?}, expected \"development\" or \"production\"")]
    UnknownMode(String),
    #[error("TRACKER_BASE_URL must be set in production mode")]
    MissingBaseUrl,
    #[error("invalid TRACKER_TIMEOUT_MS value {0:?}")]
    InvalidTimeout(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl FromStr for Mode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            _ => Err(SettingsError::UnknownMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub mode: Mode,
    /// Scheme and host of the backend, without the `/api` prefix.
    pub base_url: String,
    pub timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let mode = match lookup(MODE_VAR) {
            Some(raw) => raw.parse()?,
            None => Mode::default(),
        };

        let base_url = match (mode, lookup(BASE_URL_VAR).filter(|u| !u.is_empty())) {
            (_, Some(url)) => url,
            (Mode::Development, None) => DEV_URL.to_string(),
            (Mode::Production, None) => return Err(SettingsError::MissingBaseUrl),
        };

        let timeout = match lookup(TIMEOUT_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .ok_or(SettingsError::InvalidTimeout(raw))?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self { mode, base_url, timeout })
    }

    /// `{base_url}/api/`, the prefix every resource path is joined onto.
    pub fn api_url(&self) -> String {
        format!("{}/api/", self.base_url.trim_end_matches('/'))
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_url()).with_timeout(self.timeout)
    }
}
