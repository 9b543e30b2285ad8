use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "clicker.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8000;
pub const DEFAULT_RPC_PATH: &str = "/clicker";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Full endpoint; takes precedence over host, port and path.
    pub server_url: Option<String>,
    pub server_host: Option<String>,
    pub server_port: u16,
    pub rpc_path: String,
    pub request_timeout_secs: u64,
    pub task_deadline_secs: Option<u64>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: None,
            server_host: None,
            server_port: DEFAULT_SERVER_PORT,
            rpc_path: DEFAULT_RPC_PATH.into(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            task_deadline_secs: None,
        }
    }
}

impl ClientSettings {
    /// The endpoint calls are sent to, or `None` when no usable address is configured.
    pub fn server_url(&self) -> Option<Url> {
        if let Some(raw) = non_blank(self.server_url.as_deref()) {
            return parse_http_url(raw);
        }
        let host = non_blank(self.server_host.as_deref())?;
        let path = self.rpc_path.trim();
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        parse_http_url(&format!("http://{host}:{}{path}", self.server_port))
    }

    pub fn is_configured(&self) -> bool {
        self.server_url().is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn task_deadline(&self) -> Option<Duration> {
        self.task_deadline_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = Some(server_url.into());
        self
    }

    /// Applies `CLICKER_*` overrides read through `lookup`. Unparsable numbers are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("CLICKER_SERVER_URL") {
            self.server_url = Some(v);
        }
        if let Some(v) = lookup("CLICKER_SERVER_HOST") {
            self.server_host = Some(v);
        }
        if let Some(v) = lookup("CLICKER_SERVER_PORT") {
            if let Some(port) = parse_number("CLICKER_SERVER_PORT", &v) {
                self.server_port = port;
            }
        }
        if let Some(v) = lookup("CLICKER_RPC_PATH") {
            self.rpc_path = v;
        }
        if let Some(v) = lookup("CLICKER_TIMEOUT_SECS") {
            if let Some(secs) = parse_number("CLICKER_TIMEOUT_SECS", &v) {
                self.request_timeout_secs = secs;
            }
        }
        if let Some(v) = lookup("CLICKER_TASK_DEADLINE_SECS") {
            if let Some(secs) = parse_number("CLICKER_TASK_DEADLINE_SECS", &v) {
                self.task_deadline_secs = Some(secs);
            }
        }
    }
}

/// Reads settings from `path` (or `clicker.toml` in the working directory) and applies
/// environment overrides. A missing default file yields the defaults; a missing file
/// that was asked for explicitly is an error.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ClientSettings> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
    };

    let mut settings = match fs::read_to_string(&path) {
        Ok(raw) => toml::from_str::<ClientSettings>(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !explicit => {
            debug!(path = %path.display(), "no settings file, using defaults");
            ClientSettings::default()
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    };

    settings.apply_overrides(|key| std::env::var(key).ok());
    Ok(settings)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_http_url(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            Some(url)
        }
        Ok(url) => {
            warn!(url = %url, "server address must be an http(s) url with a host");
            None
        }
        Err(err) => {
            warn!(address = raw, error = %err, "invalid server address");
            None
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = raw, "ignoring unparsable setting override");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
