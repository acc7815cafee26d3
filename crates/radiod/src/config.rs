//! Configuration loading and parsing.
//!
//! Reads the optional TOML config, applies CLI overrides and resolves defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use radio_engine::EngineConfig;
use serde::Deserialize;

use crate::cli::Args;

const DEFAULT_BIND: &str = "0.0.0.0:7000";
const DEFAULT_CACHE_DIR: &str = "./.cache";
const DEFAULT_OUTPUT_FORMAT: &str = "mp3";
const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Server configuration loaded from TOML. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address (host:port, or `:port` for every interface).
    #[serde(alias = "listen")]
    pub bind: Option<String>,
    /// Directory holding encoded tracks, one sub-directory per station.
    pub cache_dir: Option<PathBuf>,
    /// Extension of the encoded tracks (`mp3`, `aac`, `ogg`).
    pub output_format: Option<String>,
    /// Output bitrate used for pacing, e.g. `96k`.
    pub output_bitrate: Option<String>,
    /// Read-ahead window per station in seconds.
    pub buffer_seconds: Option<u64>,
    /// Optional HTML template for the index page (`{{STATIONS}}` placeholder).
    pub index_template: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<ServerConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }

    /// Load an explicit config file, else `./config.toml` when present, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.exists() {
            return Self::load(fallback);
        }
        tracing::debug!("no config file; using defaults");
        Ok(Self::default())
    }

    /// Replace file values with any flags given on the command line.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(bind) = args.bind {
            self.bind = Some(bind.to_string());
        }
        if let Some(dir) = args.cache_dir.as_ref() {
            self.cache_dir = Some(dir.clone());
        }
        if let Some(format) = args.output_format.as_ref() {
            self.output_format = Some(format.clone());
        }
        if let Some(bitrate) = args.output_bitrate.as_ref() {
            self.output_bitrate = Some(bitrate.clone());
        }
        if let Some(secs) = args.buffer_seconds {
            self.buffer_seconds = Some(secs);
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let bind = self.bind.as_deref().map(str::trim).unwrap_or(DEFAULT_BIND);
        let bind = match bind.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => bind.to_string(),
        };
        bind.parse().with_context(|| format!("parse bind {bind}"))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
    }

    /// Output format, lower-cased and without a leading dot.
    pub fn output_format(&self) -> String {
        self.output_format
            .as_deref()
            .map(|f| f.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_OUTPUT_FORMAT.to_string())
    }

    pub fn engine_config(&self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            output_bitrate: self
                .output_bitrate
                .clone()
                .unwrap_or(defaults.output_bitrate),
            buffer_seconds: self.buffer_seconds.unwrap_or(defaults.buffer_seconds),
        }
    }

    /// MIME type announced on stream responses.
    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.output_format())
    }
}

pub fn content_type_for(format: &str) -> &'static str {
    match format {
        "mp3" => "audio/mpeg",
        "aac" => "audio/aac",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}
