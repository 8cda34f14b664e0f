//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.webmaster.toml` files.

use crate::analysis::JoinPolicy;
use crate::cli::{AnalyzeArgs, CacheArgs, OutputFormat};
use crate::models::{Category, Device};
use crate::probe::UserAgents;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".webmaster.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Reachability probe settings.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Offline asset cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,
}

/// Reachability probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Upper bound on the wait for the target site, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_desktop_agent")]
    pub desktop_user_agent: String,

    #[serde(default = "default_mobile_agent")]
    pub mobile_user_agent: String,

    #[serde(default = "default_tablet_agent")]
    pub tablet_user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            desktop_user_agent: default_desktop_agent(),
            mobile_user_agent: default_mobile_agent(),
            tablet_user_agent: default_tablet_agent(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_seconds.saturating_mul(1000)
    }

    pub fn user_agents(&self) -> UserAgents {
        UserAgents {
            desktop: self.desktop_user_agent.clone(),
            mobile: self.mobile_user_agent.clone(),
            tablet: self.tablet_user_agent.clone(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_desktop_agent() -> String {
    format!(
        "Mozilla/5.0 (X11; Linux x86_64) webmaster/{}",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_mobile_agent() -> String {
    format!(
        "Mozilla/5.0 (Linux; Android 14; Pixel 8) Mobile webmaster/{}",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_tablet_agent() -> String {
    format!(
        "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) webmaster/{}",
        env!("CARGO_PKG_VERSION")
    )
}

/// Analysis settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Categories to run. Absent means every category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,

    /// Default device profile.
    #[serde(default)]
    pub device: Device,

    /// What to do when an analyzer or the probe fails.
    #[serde(default)]
    pub join_policy: JoinPolicy,

    /// Use pinned placeholder timings instead of random ones, so repeated
    /// runs against the same site give the same scores.
    #[serde(default)]
    pub fixed_timings: bool,
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory for exports written without an explicit `--output`.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Offline asset cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory holding one sub-directory per cache bucket.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// Origin the static assets are served from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Cache version tag; changing it retires older buckets on activation.
    #[serde(default = "default_cache_version")]
    pub version: String,

    /// Asset paths preloaded on install.
    #[serde(default = "default_preload")]
    pub preload: Vec<String>,

    /// Install and activate the cache worker in the background on `analyze`.
    #[serde(default)]
    pub register_on_analyze: bool,

    /// Upper bound on each asset request, in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            origin: None,
            version: default_cache_version(),
            preload: default_preload(),
            register_on_analyze: false,
            fetch_timeout_seconds: default_fetch_timeout(),
        }
    }
}

impl CacheConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds.max(1))
    }
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".webmaster-cache")
}

fn default_cache_version() -> String {
    "webmaster-pro-v1.0".to_string()
}

fn default_preload() -> Vec<String> {
    vec!["/", "/index.html", "/manifest.json", "/favicon.ico"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with `analyze` arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &AnalyzeArgs) {
        if let Some(timeout) = args.timeout {
            self.probe.timeout_seconds = timeout;
        }

        if !args.check.is_empty() {
            self.analysis.categories = Some(args.check.clone());
        }

        if let Some(device) = args.device {
            self.analysis.device = device;
        }

        if let Some(join) = args.join {
            self.analysis.join_policy = join;
        }

        if let Some(format) = args.format {
            self.general.format = format;
        }
    }

    /// Merge this configuration with `cache` arguments.
    pub fn merge_with_cache_args(&mut self, args: &CacheArgs) {
        if let Some(ref dir) = args.dir {
            self.cache.dir = dir.clone();
        }
        if let Some(ref origin) = args.origin {
            self.cache.origin = Some(origin.clone());
        }
        if let Some(ref version) = args.cache_version {
            self.cache.version = version.clone();
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
