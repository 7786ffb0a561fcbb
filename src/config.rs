use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::transport::Discipline;

/// Top-level configuration, read from YAML.
///
/// Every field has a default, so an empty document is a valid config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub connection: ConnectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub discipline: Discipline,
    /// Worker threads of the reactor runtime.
    pub io_threads: usize,
    /// Threads running application handlers.
    pub dispatch_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            discipline: Discipline::default(),
            io_threads: 2,
            dispatch_threads: 4,
        }
    }
}

/// Per-connection settings, shared by every connection of a server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Keep connections open between exchanges.
    pub persistent: bool,
    /// Read further requests before earlier ones are answered.
    pub pipelining: bool,
    /// Size of each Way's I/O buffer.
    pub buffer_size: usize,
    pub max_line_bytes: usize,
    pub max_headers: usize,
    pub max_body_bytes: u64,
    /// Value of the `Server` header, none when absent.
    pub agent: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            persistent: true,
            pipelining: false,
            buffer_size: 8192,
            max_line_bytes: 8192,
            max_headers: 100,
            max_body_bytes: 10 * 1024 * 1024,
            agent: Some("conduit/0.1".to_string()),
        }
    }
}

impl Config {
    /// Loads the file named by `CONDUIT_CONFIG`, or the defaults when it is
    /// unset. `LISTEN` overrides the listen address either way.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("CONDUIT_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var("LISTEN") {
            config.server.listen_addr = listen_addr;
        }

        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&yaml).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(yaml)?;
        if config.connection.buffer_size == 0 {
            anyhow::bail!("connection.buffer_size must be greater than zero");
        }
        Ok(config)
    }
}
