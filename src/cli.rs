//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::JoinPolicy;
use crate::models::{Category, Device};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// WebMaster - website analysis from the command line
///
/// Probe a site and score it for performance, SEO, security,
/// accessibility, mobile readiness and best practices. Terminal,
/// Markdown, HTML, JSON and CSV reports.
///
/// Examples:
///   webmaster analyze example.com
///   webmaster analyze https://example.com --check seo,security --format json
///   webmaster analyze example.com --device mobile --join best-effort
///   webmaster cache --origin https://example.com install
///   webmaster init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .webmaster.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Analyze a website and write a scored report
    Analyze(AnalyzeArgs),

    /// Drive the offline asset cache worker
    Cache(CacheArgs),

    /// Generate a default .webmaster.toml configuration file
    InitConfig,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Website to analyze; https:// is assumed when no scheme is given
    #[arg(value_name = "URL")]
    pub url: String,

    /// Categories to run (comma-separated). Default: all
    ///
    /// Example: --check performance,seo,best-practices
    #[arg(long, value_name = "CATEGORIES", value_delimiter = ',')]
    pub check: Vec<Category>,

    /// Categories to leave out (comma-separated)
    #[arg(long, value_name = "CATEGORIES", value_delimiter = ',')]
    pub skip: Vec<Category>,

    /// Device profile to analyze for
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<Device>,

    /// Report format
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Output file for the report
    ///
    /// Defaults to webmaster-analysis-<millis>.<ext> for file formats.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Behavior when the probe or an analyzer fails
    #[arg(long, value_name = "POLICY")]
    pub join: Option<JoinPolicy>,

    /// Probe timeout in seconds (default: 10)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,

    /// Cache root directory
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Origin the static assets are served from
    #[arg(long, value_name = "URL", env = "WEBMASTER_ASSET_ORIGIN")]
    pub origin: Option<String>,

    /// Cache version tag
    #[arg(long = "cache-version", value_name = "TAG")]
    pub cache_version: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheAction {
    /// Preload the static assets into a fresh bucket
    Install,
    /// Retire buckets from other versions
    Activate,
    /// Fetch an asset through the cache
    Fetch {
        /// Asset path or absolute URL
        path: String,
        /// Request method
        #[arg(long, default_value = "GET")]
        method: String,
        /// Treat the request as a page navigation
        #[arg(long)]
        navigate: bool,
        /// Write the body here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Print the worker's cache version
    Version,
    /// Add URLs to the current bucket
    Precache {
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,
    },
    /// Post a raw JSON message, e.g. '{"type":"SKIP_WAITING"}'
    Message {
        #[arg(value_name = "JSON")]
        json: String,
    },
    /// List buckets with entry counts and sizes
    Status,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Summary printed to the terminal (default)
    #[default]
    Terminal,
    /// Markdown document
    Markdown,
    /// Standalone HTML page, printable to PDF
    Html,
    /// Full report as JSON
    Json,
    /// One row per check
    Csv,
}

impl OutputFormat {
    /// File extension for file-based formats.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            OutputFormat::Terminal => None,
            OutputFormat::Markdown => Some("md"),
            OutputFormat::Html => Some("html"),
            OutputFormat::Json => Some("json"),
            OutputFormat::Csv => Some("csv"),
        }
    }

    /// Guess a file format from an output path's extension.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some(OutputFormat::Markdown),
            "html" | "htm" => Some(OutputFormat::Html),
            "json" => Some(OutputFormat::Json),
            "csv" => Some(OutputFormat::Csv),
            _ => None,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Analyze(analyze) => {
                if let Some(timeout) = analyze.timeout {
                    if timeout == 0 {
                        return Err("Timeout must be at least 1 second".to_string());
                    }
                }
                if analyze.output.is_some() && analyze.format == Some(OutputFormat::Terminal) {
                    return Err("--output needs a file format (markdown, html, json, csv)".to_string());
                }
            }
            Command::Cache(cache) => {
                if let Some(ref origin) = cache.origin {
                    if !origin.starts_with("http://") && !origin.starts_with("https://") {
                        return Err("Asset origin must start with 'http://' or 'https://'".to_string());
                    }
                }
                if let Some(ref version) = cache.cache_version {
                    if version.is_empty() || version.contains(['/', '\\']) {
                        return Err("Cache version must be non-empty and contain no path separators".to_string());
                    }
                }
            }
            Command::InitConfig => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_analyze_defaults() {
        let args = parse(&["webmaster", "analyze", "example.com"]);
        let Command::Analyze(analyze) = args.command else {
            panic!("expected analyze");
        };
        assert_eq!(analyze.url, "example.com");
        assert!(analyze.check.is_empty());
        assert!(analyze.device.is_none());
        assert!(analyze.format.is_none());
    }

    #[test]
    fn test_parse_category_list() {
        let args = parse(&[
            "webmaster",
            "analyze",
            "example.com",
            "--check",
            "seo,best-practices,bestpractices",
            "--join",
            "best-effort",
            "--device",
            "tablet",
        ]);
        let Command::Analyze(analyze) = args.command else {
            panic!("expected analyze");
        };
        assert_eq!(
            analyze.check,
            vec![Category::Seo, Category::BestPractices, Category::BestPractices]
        );
        assert_eq!(analyze.join, Some(JoinPolicy::BestEffort));
        assert_eq!(analyze.device, Some(Device::Tablet));
    }

    #[test]
    fn test_parse_cache_fetch() {
        let args = parse(&[
            "webmaster",
            "cache",
            "--origin",
            "https://static.example.com",
            "fetch",
            "/index.html",
            "--navigate",
        ]);
        let Command::Cache(cache) = args.command else {
            panic!("expected cache");
        };
        match cache.action {
            CacheAction::Fetch {
                path,
                method,
                navigate,
                ..
            } => {
                assert_eq!(path, "/index.html");
                assert_eq!(method, "GET");
                assert!(navigate);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_parse_cache_message() {
        let args = parse(&["webmaster", "cache", "message", r#"{"type":"GET_VERSION"}"#]);
        let Command::Cache(cache) = args.command else {
            panic!("expected cache");
        };
        match cache.action {
            CacheAction::Message { json } => assert_eq!(json, r#"{"type":"GET_VERSION"}"#),
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_validation_conflicting_options() {
        let args = parse(&["webmaster", "-v", "-q", "analyze", "example.com"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let args = parse(&["webmaster", "analyze", "example.com", "--timeout", "0"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_bad_origin() {
        let args = parse(&["webmaster", "cache", "--origin", "ftp://x", "status"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = parse(&["webmaster", "init-config"]);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_format_extensions() {
        assert_eq!(OutputFormat::Terminal.extension(), None);
        assert_eq!(OutputFormat::Csv.extension(), Some("csv"));
    }

    #[test]
    fn test_format_from_path() {
        use std::path::Path;
        assert_eq!(OutputFormat::from_path(Path::new("out/report.HTML")), Some(OutputFormat::Html));
        assert_eq!(OutputFormat::from_path(Path::new("report.md")), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::from_path(Path::new("report")), None);
        assert_eq!(OutputFormat::from_path(Path::new("report.txt")), None);
    }
}
