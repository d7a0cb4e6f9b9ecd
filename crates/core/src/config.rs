//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default maximum chunk payload: 80 MiB.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 80 * 1024 * 1024;

/// Default maximum bandwidth-probe sample: 5 MiB.
pub const DEFAULT_MAX_PROBE_SIZE: usize = 5 * 1024 * 1024;

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted chunk payload in bytes.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    /// Maximum accepted probe sample in bytes.
    #[serde(default = "default_max_probe_size")]
    pub max_probe_size: usize,
}

impl ServerConfig {
    /// Socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Request body limit: max chunk size plus slack for multipart framing.
    pub fn body_limit(&self) -> usize {
        self.max_chunk_size + 1024 * 1024
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_chunk_size() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}

fn default_max_probe_size() -> usize {
    DEFAULT_MAX_PROBE_SIZE
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_chunk_size: default_max_chunk_size(),
            max_probe_size: default_max_probe_size(),
        }
    }
}

/// On-disk layout configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for scratch chunks, finalized files and the state
    /// document.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl StorageConfig {
    /// Scratch directory root: `<data_dir>/uploads/<uploadId>/<i>.part`.
    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Finalized artifacts: `<data_dir>/files/<uploadId>-<safeFileName>`.
    pub fn final_dir(&self) -> PathBuf {
        self.data_dir.join("files")
    }

    /// The persisted state document.
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Build a config rooted at a temp directory.
    ///
    /// **For testing only.**
    pub fn for_testing(root: &Path) -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                ..Default::default()
            },
            storage: StorageConfig {
                data_dir: root.join("data"),
            },
        }
    }
}
