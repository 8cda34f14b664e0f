//! webmaster - website analysis from the command line
//!
//! Probes a website, scores it across performance, SEO, security,
//! accessibility, mobile and best-practice categories, and renders the
//! result to the terminal or exports it as Markdown, HTML, JSON or CSV.
//! Also drives the offline cache for the tool's static assets.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Validation or runtime error (bad URL, unreachable site, timeout, etc.)

mod analysis;
mod cache;
mod cli;
mod config;
mod input;
mod models;
mod probe;
mod report;

use analysis::{FixedPolicy, JitterPolicy, Orchestrator, ScoringPolicy};
use anyhow::{Context, Result};
use cache::{
    cache_name, CacheRequest, CacheStorage, CacheWorker, HttpNetwork, WorkerHandle,
    WorkerMessage, WorkerReply, WorkerSettings,
};
use chrono::Utc;
use cli::{AnalyzeArgs, Args, CacheAction, CacheArgs, Command, OutputFormat};
use config::{CacheConfig, Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use input::AnalysisRequest;
use models::AnalysisReport;
use probe::HttpProbe;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use url::Url;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    init_logging(&args)?;

    info!("webmaster v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let outcome = match &args.command {
        Command::Analyze(analyze) => run_analyze(&args, analyze).await,
        Command::Cache(cache) => run_cache(&args, cache).await,
        Command::InitConfig => handle_init_config(),
    };

    if let Err(e) = outcome {
        error!("Command failed: {:#}", e);
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle init-config: generate a default .webmaster.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize categories, device, timeouts and the asset cache.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) -> Result<()> {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Run the analyze workflow.
async fn run_analyze(args: &Args, analyze: &AnalyzeArgs) -> Result<()> {
    let start_time = Instant::now();

    let mut config = load_config(args)?;
    config.merge_with_args(analyze);

    let request = AnalysisRequest::build(
        &analyze.url,
        config.analysis.categories.as_deref(),
        &analyze.skip,
        config.analysis.device,
    )?;

    // An explicit output path picks the format when none was chosen.
    let format = match (config.general.format, &analyze.output) {
        (OutputFormat::Terminal, Some(path)) => {
            OutputFormat::from_path(path).unwrap_or(OutputFormat::Json)
        }
        (format, _) => format,
    };

    let registration = if config.cache.register_on_analyze {
        spawn_cache_registration(config.cache.clone())
    } else {
        None
    };

    if !args.quiet {
        println!("🔍 Analyzing {} ({})", request.url, request.device);
        println!(
            "   Categories: {}",
            request
                .categories
                .iter()
                .map(|c| c.title())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("   Timeout: {}s\n", config.probe.timeout_seconds);
    }

    let probe = HttpProbe::new(&config.probe).context("Failed to build HTTP client")?;
    let policy: Arc<dyn ScoringPolicy> = if config.analysis.fixed_timings {
        Arc::new(FixedPolicy::default())
    } else {
        Arc::new(JitterPolicy)
    };
    let pb = spinner(args.quiet);
    let progress = pb.clone();
    let orchestrator = Orchestrator::new(Arc::new(probe), policy, config.analysis.join_policy)
        .with_progress(move |step| progress.set_message(step.to_string()));

    let outcome = orchestrator.run(&request).await;
    pb.finish_and_clear();
    let emitted = outcome
        .map_err(anyhow::Error::from)
        .and_then(|report| emit_report(args, analyze, &config, format, &report));

    if let Some(task) = registration {
        let grace = config.cache.fetch_timeout() + Duration::from_secs(1);
        settle_background(task, grace).await;
    }
    emitted?;

    debug!("Analysis took {:.1}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

/// Print the terminal summary or write the file export.
fn emit_report(
    args: &Args,
    analyze: &AnalyzeArgs,
    config: &Config,
    format: OutputFormat,
    report: &AnalysisReport,
) -> Result<()> {
    match format {
        OutputFormat::Terminal => {
            println!("{}", report::generate_terminal_summary(report));
        }
        format => {
            let content = report::render(report, format)?;
            let path = match &analyze.output {
                Some(path) => path.clone(),
                None => {
                    let name = report::default_file_name(format, Utc::now().timestamp_millis())
                        .context("Format has no file extension")?;
                    config.report.output_dir.join(name)
                }
            };

            std::fs::write(&path, &content)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;

            if !args.quiet {
                println!("📊 Analysis Summary:");
                println!("   Overall score: {}/100", report.overall_score);
                println!(
                    "   Checks passed: {}/{}",
                    report.passed_checks, report.total_checks
                );
                if !report.skipped_categories.is_empty() {
                    println!("   Skipped categories: {}", report.skipped_categories.len());
                }
                println!(
                    "\n✅ Analysis complete! Report saved to: {}",
                    path.display()
                );
            }
        }
    }
    Ok(())
}

/// Start a worker for the configured cache.
async fn spawn_worker(cache: &CacheConfig) -> Result<(WorkerHandle, JoinHandle<()>)> {
    let origin = cache
        .origin
        .as_deref()
        .context("No asset origin configured; pass --origin or set [cache] origin")?;
    let origin = Url::parse(origin).with_context(|| format!("Invalid asset origin: {}", origin))?;

    let network = HttpNetwork::new(origin.clone(), cache.fetch_timeout())
        .context("Failed to build HTTP client")?;
    let worker = CacheWorker::load(
        CacheStorage::new(&cache.dir),
        Arc::new(network),
        WorkerSettings {
            origin,
            version: cache.version.clone(),
            preload: cache.preload.clone(),
        },
    )
    .await?;

    Ok(WorkerHandle::spawn(worker))
}

/// Install and activate the cache in the background. Failures never reach
/// the analysis.
fn spawn_cache_registration(cache: CacheConfig) -> Option<JoinHandle<()>> {
    if cache.origin.is_none() {
        debug!("Cache registration skipped: no asset origin configured");
        return None;
    }
    Some(tokio::spawn(async move {
        let registered = async {
            let (handle, task) = spawn_worker(&cache).await?;
            let deleted = handle.register().await?;
            drop(handle);
            task.await.context("Cache worker task failed")?;
            Ok::<_, anyhow::Error>(deleted)
        };
        match registered.await {
            Ok(deleted) => debug!("Cache registered, retired {} old buckets", deleted.len()),
            Err(e) => debug!("Cache registration failed: {:#}", e),
        }
    }))
}

/// Give a background task up to `grace` to finish. Returns whether it did;
/// an unfinished task is left to be cancelled with the runtime.
async fn settle_background(task: JoinHandle<()>, grace: Duration) -> bool {
    match tokio::time::timeout(grace, task).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!("Background task ended abnormally: {}", e);
            true
        }
        Err(_) => {
            debug!("Background task still running after {:?}", grace);
            false
        }
    }
}

/// Run a cache subcommand.
async fn run_cache(args: &Args, cache_args: &CacheArgs) -> Result<()> {
    let mut config = load_config(args)?;
    config.merge_with_cache_args(cache_args);
    let cache = &config.cache;

    if let CacheAction::Status = cache_args.action {
        return print_cache_status(cache).await;
    }

    let (handle, task) = spawn_worker(cache).await?;

    match &cache_args.action {
        CacheAction::Install => {
            handle.install().await?;
            println!(
                "✅ Installed cache {} (worker {})",
                cache_name(&cache.version),
                handle.state().await?
            );
        }
        CacheAction::Activate => {
            let deleted = handle.activate().await?;
            println!("✅ Cache {} active", cache_name(&cache.version));
            for name in deleted {
                println!("   🗑️  Deleted old cache {}", name);
            }
        }
        CacheAction::Fetch {
            path,
            method,
            navigate,
            output,
        } => {
            let origin = cache.origin.as_deref().unwrap_or_default();
            let url = Url::parse(origin)
                .and_then(|origin| origin.join(path))
                .with_context(|| format!("Invalid asset path: {}", path))?;
            let response = handle
                .fetch(CacheRequest {
                    method: method.to_uppercase(),
                    url,
                    navigate: *navigate,
                })
                .await?;

            info!("{} {} ({} bytes)", response.status, response.url, response.body.len());
            match output {
                Some(path) => std::fs::write(path, &response.body)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => std::io::stdout()
                    .write_all(&response.body)
                    .context("Failed to write response body")?,
            }
        }
        CacheAction::Version => match handle.post_message(WorkerMessage::GetVersion).await? {
            Some(WorkerReply::Version { version }) => println!("{}", version),
            None => warn!("Worker sent no version"),
        },
        CacheAction::Precache { urls } => {
            handle
                .post_message(WorkerMessage::CacheUrls { urls: urls.clone() })
                .await?;
            println!("✅ Cached {} URLs in {}", urls.len(), cache_name(&cache.version));
        }
        CacheAction::Message { json } => match handle.post_json(json).await? {
            Some(reply) => println!("{}", reply),
            None => debug!("Message handled, no reply"),
        },
        CacheAction::Status => {}
    }

    drop(handle);
    task.await.context("Cache worker task failed")?;
    Ok(())
}

async fn print_cache_status(cache: &CacheConfig) -> Result<()> {
    let storage = CacheStorage::new(&cache.dir);
    let current = cache_name(&cache.version);

    println!("📦 Cache root: {}", storage.root().display());
    match storage.load_registration().await? {
        Some(reg) => println!("   Worker: {} ({})", reg.version, reg.state),
        None => println!("   Worker: not registered"),
    }

    if !storage.has(&current).await {
        println!("   Current bucket {} is not installed", current);
    }

    let names = storage.keys().await?;
    if names.is_empty() {
        println!("   No cache buckets.");
        return Ok(());
    }

    for name in names {
        let stats = storage.stats(&name)?;
        let marker = if name == current { " (current)" } else { "" };
        println!(
            "   {}{}: {} entries, {} bytes",
            name, marker, stats.entries, stats.bytes
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_settle_waits_for_finished_registration() {
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = done.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        assert!(settle_background(task, Duration::from_secs(5)).await);
        assert!(done.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_settle_gives_up_after_grace() {
        let task = tokio::spawn(tokio::time::sleep(Duration::from_secs(30)));

        let started = Instant::now();
        assert!(!settle_background(task, Duration::from_millis(100)).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_registration_needs_origin() {
        assert!(spawn_cache_registration(CacheConfig::default()).is_none());
    }
}
