//! Configuration file handling.
//!
//! One TOML file describes where artifacts come from, where the native
//! libraries live, how much memory the witness VM gets, and logging.
//! Every section is optional.
//!
//! ```toml
//! [artifacts]
//! base_path = "resources"
//! # base_url = "https://cdn.example.org/zk"   # fetch over HTTP instead
//! timeout_secs = 60
//!
//! [native]
//! library_dir = "bin/native"
//!
//! [vm]
//! witness_memory_pages = 2000
//!
//! [logging]
//! level = "info"
//! ```

use crate::context::ProverContext;
use crate::error::{ZkError, ZkResult};
use crate::fetch::{ArtifactFetcher, LocalFileFetcher, RemoteFileFetcher};
use crate::operator::native::{NativeRuntime, DEFAULT_LIBRARY_DIR};
use crate::operator::vm::witness::DEFAULT_WITNESS_MEMORY_PAGES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkConfig {
    #[serde(default)]
    pub artifacts: ArtifactConfig,

    #[serde(default)]
    pub native: NativeConfig,

    #[serde(default)]
    pub vm: VmConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where proving artifacts are fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Local artifact root.
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,

    /// Remote artifact root. Takes precedence over `base_path` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// HTTP timeout per artifact.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeConfig {
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmConfig {
    /// Fixed linear memory for the witness calculator, in 64 KiB pages.
    #[serde(default = "default_memory_pages")]
    pub witness_memory_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive (trace, debug, info, warn, error, or per-target).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_base_path() -> PathBuf {
    PathBuf::from(crate::fetch::DEFAULT_BASE_PATH)
}

fn default_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_library_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LIBRARY_DIR)
}

fn default_memory_pages() -> u32 {
    DEFAULT_WITNESS_MEMORY_PAGES
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            base_url: None,
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            library_dir: default_library_dir(),
        }
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            witness_memory_pages: DEFAULT_WITNESS_MEMORY_PAGES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl ZkConfig {
    pub fn from_toml_str(contents: &str) -> ZkResult<Self> {
        let config: ZkConfig = toml::from_str(contents)
            .map_err(|e| ZkError::Configuration(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> ZkResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ZkError::Configuration(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
            .map_err(|e| ZkError::Configuration(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> ZkResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ZkError::Configuration(format!("failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ZkError::Configuration(format!("failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, contents).map_err(|e| {
            ZkError::Configuration(format!(
                "failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    pub fn validate(&self) -> ZkResult<()> {
        if self.vm.witness_memory_pages == 0 || self.vm.witness_memory_pages > 65536 {
            return Err(ZkError::Configuration(format!(
                "witness_memory_pages must be between 1 and 65536, got {}",
                self.vm.witness_memory_pages
            )));
        }
        if self.artifacts.timeout_secs == 0 {
            return Err(ZkError::Configuration("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// The artifact fetcher this configuration describes.
    pub fn fetcher(&self) -> ZkResult<Arc<dyn ArtifactFetcher>> {
        let fetcher: Arc<dyn ArtifactFetcher> = match &self.artifacts.base_url {
            Some(url) => Arc::new(RemoteFileFetcher::new(
                url.clone(),
                Duration::from_secs(self.artifacts.timeout_secs),
            )?),
            None => Arc::new(LocalFileFetcher::new(self.artifacts.base_path.clone())),
        };
        Ok(fetcher)
    }

    pub fn native_runtime(&self) -> Arc<NativeRuntime> {
        NativeRuntime::new(self.native.library_dir.clone())
    }

    /// Build the process-wide proving context. Call once at startup.
    pub fn context(&self) -> ZkResult<ProverContext> {
        self.validate()?;
        Ok(ProverContext::new(self.fetcher()?, self.native_runtime())
            .with_witness_memory_pages(self.vm.witness_memory_pages))
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// configured level.
pub fn init_tracing(config: &LoggingConfig) -> ZkResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| {
            ZkError::Configuration(format!("invalid log level '{}': {}", config.level, e))
        })?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match &config.file {
        Some(path) => {
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    ZkError::Configuration(format!(
                        "failed to open log file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|e| ZkError::Configuration(format!("tracing already initialised: {}", e)))
}
