use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Environment variable naming a YAML config file.
pub const CONFIG_ENV: &str = "LODGE_CONFIG";
/// Environment variable overriding `server.listen_addr`.
pub const LISTEN_ENV: &str = "LISTEN";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub content: ContentConfig,
    pub session: SessionConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Largest header block accepted before the connection is refused
    pub max_header_bytes: usize,
    /// Largest complete message (head and body) accepted
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            max_header_bytes: 64 * 1024,
            max_request_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Directory holding `www/`, `static/` and `cert/`
    pub base_dir: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    Durable,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    pub timeout_secs: u64,
    pub sweep_interval_secs: u64,
    /// SQLite file, only used by the durable backend
    pub db_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::Memory,
            timeout_secs: 120,
            sweep_interval_secs: 60,
            db_path: PathBuf::from("db/sessions.db"),
        }
    }
}

/// Which cookie the login gate trusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// `auth=true` marker cookie
    Flag,
    /// `sessionId` cookie checked against the session store
    Session,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub username: String,
    pub password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Flag,
            username: "admin".to_string(),
            password: "password".to_string(),
        }
    }
}

impl Config {
    /// Loads the file named by `LODGE_CONFIG` (defaults if unset), then
    /// applies the `LISTEN` override.
    pub fn load() -> anyhow::Result<Self> {
        let file = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let listen = std::env::var(LISTEN_ENV).ok();
        Self::resolve(file.as_deref(), listen)
    }

    pub fn resolve(file: Option<&Path>, listen: Option<String>) -> anyhow::Result<Self> {
        let mut cfg = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(addr) = listen {
            cfg.server.listen_addr = addr;
        }
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}
