use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{self, EnvFilter};

use followratio::config::Config;
use followratio::error::FollowRatioError;
use followratio::output::CsvSink;
use followratio::runner::ScrapeRunner;
use followratio::session::BrowserSession;
use followratio::{config, input};

#[derive(Parser)]
#[command(name = "followratio")]
#[command(about = "Scrapes public follower/following counts and flags negative-ratio profiles")]
#[command(version)]
struct Cli {
    /// Path to configuration file (can also be set via FOLLOWRATIO_CONFIG env var)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input spreadsheet or CSV with a `username` column
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Worksheet name for spreadsheet inputs
    #[arg(long)]
    sheet: Option<String>,

    /// CSV receiving every processed row
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// CSV receiving only negative-ratio rows
    #[arg(long)]
    out_negative: Option<PathBuf>,

    /// Run the browser headless
    #[arg(long)]
    headless: bool,

    /// Seconds to wait after each page load before reading the source
    #[arg(long)]
    sleep: Option<f64>,

    /// Skip the first N usernames of the deduplicated roster
    #[arg(long)]
    start: Option<usize>,

    /// Process at most N usernames
    #[arg(long)]
    max: Option<usize>,

    /// Restart the browser after N successfully processed profiles
    #[arg(long)]
    restart_every: Option<u32>,

    /// Seconds to sleep when a rate-limit page is detected
    #[arg(long)]
    cooldown: Option<u64>,

    /// WebDriver endpoint to connect to
    #[arg(long)]
    webdriver_url: Option<String>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Enable verbose logging (equivalent to --log-level debug)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Get config path from CLI arg or FOLLOWRATIO_CONFIG environment variable
    fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| std::env::var("FOLLOWRATIO_CONFIG").ok().map(PathBuf::from))
    }

    /// Layer CLI flag overrides on top of the loaded configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref input) = self.input {
            config.input.path = input.to_string_lossy().to_string();
        }
        if let Some(ref sheet) = self.sheet {
            config.input.sheet = Some(sheet.clone());
        }
        if let Some(start) = self.start {
            config.input.start = Some(start);
        }
        if let Some(max) = self.max {
            config.input.max = Some(max);
        }

        if let Some(ref out) = self.out {
            let output = config
                .output
                .get_or_insert_with(config::OutputConfig::default);
            output.all = Some(out.to_string_lossy().to_string());
        }
        if let Some(ref out_negative) = self.out_negative {
            let output = config
                .output
                .get_or_insert_with(config::OutputConfig::default);
            output.negative = Some(out_negative.to_string_lossy().to_string());
        }

        if self.headless {
            let browser = config
                .browser
                .get_or_insert_with(config::BrowserConfig::default);
            browser.headless = Some(true);
        }
        if let Some(ref url) = self.webdriver_url {
            let browser = config
                .browser
                .get_or_insert_with(config::BrowserConfig::default);
            browser.webdriver_url = Some(url.clone());
        }

        if let Some(sleep) = self.sleep {
            let pacing = config.pacing.get_or_insert_with(config::PacingConfig::default);
            pacing.sleep_secs = Some(sleep);
        }
        if let Some(cooldown) = self.cooldown {
            let pacing = config.pacing.get_or_insert_with(config::PacingConfig::default);
            pacing.cooldown_secs = Some(cooldown);
        }
        if let Some(restart_every) = self.restart_every {
            let pacing = config.pacing.get_or_insert_with(config::PacingConfig::default);
            pacing.restart_every = Some(restart_every);
        }
    }
}

/// Initialize structured logging with proper error handling
fn init_logging(config: &Config, cli: &Cli) -> Result<(), FollowRatioError> {
    // Determine log level from CLI args, config, or environment
    let log_level = if cli.verbose {
        "debug"
    } else if let Some(ref level) = cli.log_level {
        level.as_str()
    } else {
        config.logging().level.as_deref().unwrap_or("info")
    };

    // Validate log level
    let _level = match log_level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => {
            return Err(FollowRatioError::Config(
                config::ConfigError::InvalidValue(format!(
                    "Invalid log level: {log_level}. Valid levels are: error, warn, info, debug, trace"
                )),
            ));
        }
    };

    // Create environment filter with fallback
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| {
            FollowRatioError::Config(config::ConfigError::InvalidValue(format!(
                "Failed to create log filter: {e}"
            )))
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .init();

    debug!("Logging initialized with level: {}", log_level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), FollowRatioError> {
    let cli = Cli::parse();

    // Load configuration first
    let mut config = match Config::load(cli.config_path()) {
        Ok(config) => config,
        Err(e) => {
            // Initialize basic logging for configuration errors
            tracing_subscriber::fmt().init();
            error!("Configuration error: {}", e);
            error!("Please check your configuration file and environment variables");
            return Err(FollowRatioError::Config(e));
        }
    };

    cli.apply_overrides(&mut config);

    // Initialize structured logging
    if let Err(e) = init_logging(&config, &cli) {
        eprintln!("Failed to initialize logging: {e}");
        return Err(e);
    }

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return Err(FollowRatioError::Config(e));
    }

    info!("Starting followratio v{}", env!("CARGO_PKG_VERSION"));
    info!("Input: {} (sheet: {})", config.input().path(), config.input().sheet());
    info!(
        "Output: {} (negative subset: {})",
        config.output().all_path(),
        config.output().negative_path()
    );
    info!(
        "Endpoint: {} via {} (headless: {})",
        config.browser().endpoint(),
        config.browser().webdriver_url(),
        config.browser().headless()
    );
    info!(
        "Pacing: sleep {}s, cooldown {}s, restart every {} profiles",
        config.pacing().sleep_secs(),
        config.pacing().cooldown_secs(),
        config.pacing().restart_every()
    );

    match run_application(config).await {
        Ok(()) => {
            info!("Application shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Application error: {}", e);
            Err(e)
        }
    }
}

/// Main application orchestration: load the roster, open the outputs and the
/// browser session, run the sequential loop, and always close the session.
async fn run_application(config: Config) -> Result<(), FollowRatioError> {
    let all = input::load_usernames(config.input())?;
    let start = config.input().start();
    let roster = input::select_window(all, start, config.input().max());
    if roster.is_empty() {
        warn!("Roster is empty after normalization and windowing, nothing to do");
        return Ok(());
    }
    info!(
        "Processing {} usernames (starting at offset {})",
        roster.len(),
        start
    );

    let sink = CsvSink::open(config.output())?;
    let session = BrowserSession::connect(config.browser()).await?;
    let mut runner = ScrapeRunner::new(session, sink, config);

    // The browser session must be closed no matter where the loop was
    // interrupted, so the select result is handled after cleanup.
    let run_result = tokio::select! {
        result = runner.run(&roster, start) => Some(result),
        _ = setup_shutdown_signal() => {
            info!("Shutdown signal received, stopping");
            None
        }
    };

    runner.close().await;

    match run_result {
        Some(result) => result,
        None => Ok(()),
    }
}

/// Set up graceful shutdown signal handling
async fn setup_shutdown_signal() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to register SIGTERM handler");
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("Failed to register SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C, initiating graceful shutdown");
    }
}
