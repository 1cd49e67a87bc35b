use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_SHEET: &str = "Following to Check";
const DEFAULT_OUT_PATH: &str = "counts.csv";
const DEFAULT_NEGATIVE_OUT_PATH: &str = "negative_ratio.csv";
const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
const DEFAULT_ENDPOINT: &str = "m.instagram.com";
const DEFAULT_SLEEP_SECS: f64 = 3.5;
const DEFAULT_COOLDOWN_SECS: u64 = 90;
const DEFAULT_RESTART_EVERY: u32 = 120;
const DEFAULT_PAGE_LOAD_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    pub output: Option<OutputConfig>,
    pub browser: Option<BrowserConfig>,
    pub pacing: Option<PacingConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    /// Spreadsheet or CSV with a `username` column.
    #[serde(default)]
    pub path: String,
    /// Worksheet name for spreadsheet inputs.
    pub sheet: Option<String>,
    /// Skip the first N usernames of the deduplicated roster.
    pub start: Option<usize>,
    /// Process at most N usernames.
    pub max: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// CSV receiving every processed row.
    pub all: Option<String>,
    /// CSV receiving only negative-ratio rows.
    pub negative: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub webdriver_url: Option<String>,
    /// Host serving the mobile site variant.
    pub endpoint: Option<String>,
    pub headless: Option<bool>,
    pub page_load_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Seconds to wait after each page load before reading the source.
    pub sleep_secs: Option<f64>,
    /// Seconds to sleep when a rate-limit page is detected.
    pub cooldown_secs: Option<u64>,
    /// Restart the browser after N successfully processed profiles.
    pub restart_every: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            all: Some(DEFAULT_OUT_PATH.to_string()),
            negative: Some(DEFAULT_NEGATIVE_OUT_PATH.to_string()),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: Some(DEFAULT_WEBDRIVER_URL.to_string()),
            endpoint: Some(DEFAULT_ENDPOINT.to_string()),
            headless: Some(false),
            page_load_timeout_secs: Some(DEFAULT_PAGE_LOAD_TIMEOUT_SECS),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            sleep_secs: Some(DEFAULT_SLEEP_SECS),
            cooldown_secs: Some(DEFAULT_COOLDOWN_SECS),
            restart_every: Some(DEFAULT_RESTART_EVERY),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Some("info".to_string()),
        }
    }
}

impl InputConfig {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn sheet(&self) -> &str {
        self.sheet.as_deref().unwrap_or(DEFAULT_SHEET)
    }

    pub fn start(&self) -> usize {
        self.start.unwrap_or(0)
    }

    pub fn max(&self) -> Option<usize> {
        self.max
    }
}

impl OutputConfig {
    pub fn all_path(&self) -> &str {
        self.all.as_deref().unwrap_or(DEFAULT_OUT_PATH)
    }

    pub fn negative_path(&self) -> &str {
        self.negative.as_deref().unwrap_or(DEFAULT_NEGATIVE_OUT_PATH)
    }
}

impl BrowserConfig {
    pub fn webdriver_url(&self) -> &str {
        self.webdriver_url.as_deref().unwrap_or(DEFAULT_WEBDRIVER_URL)
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn headless(&self) -> bool {
        self.headless.unwrap_or(false)
    }

    pub fn page_load_timeout_secs(&self) -> u64 {
        self.page_load_timeout_secs
            .unwrap_or(DEFAULT_PAGE_LOAD_TIMEOUT_SECS)
    }
}

impl PacingConfig {
    pub fn sleep_secs(&self) -> f64 {
        self.sleep_secs.unwrap_or(DEFAULT_SLEEP_SECS)
    }

    pub fn cooldown_secs(&self) -> u64 {
        self.cooldown_secs.unwrap_or(DEFAULT_COOLDOWN_SECS)
    }

    pub fn restart_every(&self) -> u32 {
        self.restart_every.unwrap_or(DEFAULT_RESTART_EVERY)
    }
}

impl Config {
    /// Load configuration from TOML file with XDG directory support and
    /// environment variable overrides.
    ///
    /// Validation is deferred so callers can layer CLI flag overrides on top
    /// before calling [`Config::validate`].
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config_file = if let Some(path) = config_path {
            path
        } else {
            Self::find_config_file()?
        };

        let mut config = if config_file.exists() {
            tracing::debug!("Loading config from: {}", config_file.display());
            let content = std::fs::read_to_string(&config_file)?;
            toml::from_str::<Config>(&content)?
        } else {
            tracing::debug!("No config file found, using environment variables only");
            Config {
                input: InputConfig::default(),
                output: None,
                browser: None,
                pacing: None,
                logging: None,
            }
        };

        // Apply environment variable overrides
        config.apply_env_overrides()?;

        // Apply defaults for optional sections
        if config.output.is_none() {
            config.output = Some(OutputConfig::default());
        }
        if config.browser.is_none() {
            config.browser = Some(BrowserConfig::default());
        }
        if config.pacing.is_none() {
            config.pacing = Some(PacingConfig::default());
        }
        if config.logging.is_none() {
            config.logging = Some(LoggingConfig::default());
        }

        Ok(config)
    }

    /// Find configuration file using XDG directory support
    fn find_config_file() -> Result<PathBuf, ConfigError> {
        // First check current directory
        let current_dir_config = PathBuf::from("followratio.toml");
        if current_dir_config.exists() {
            return Ok(current_dir_config);
        }

        // Then check XDG_CONFIG_HOME/followratio/followratio.toml or
        // ~/.config/followratio/followratio.toml
        let xdg_config = if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg_config_home)
                .join("followratio")
                .join("followratio.toml")
        } else if let Ok(home_dir) = env::var("HOME") {
            PathBuf::from(home_dir)
                .join(".config")
                .join("followratio")
                .join("followratio.toml")
        } else {
            PathBuf::new() // Invalid path that won't exist
        };

        if xdg_config.exists() {
            return Ok(xdg_config);
        }

        // Default to current directory (file may not exist yet)
        Ok(current_dir_config)
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Input configuration
        if let Ok(path) = env::var("FOLLOWRATIO_INPUT") {
            self.input.path = path;
        }
        if let Ok(sheet) = env::var("FOLLOWRATIO_SHEET") {
            self.input.sheet = Some(sheet);
        }
        if let Ok(start) = env::var("FOLLOWRATIO_START") {
            self.input.start = Some(start.parse().map_err(|_| {
                ConfigError::InvalidValue("FOLLOWRATIO_START must be a valid number".to_string())
            })?);
        }
        if let Ok(max) = env::var("FOLLOWRATIO_MAX") {
            self.input.max = Some(max.parse().map_err(|_| {
                ConfigError::InvalidValue("FOLLOWRATIO_MAX must be a valid number".to_string())
            })?);
        }

        // Output configuration
        if let Ok(path) = env::var("FOLLOWRATIO_OUT") {
            let output = self.output.get_or_insert_with(OutputConfig::default);
            output.all = Some(path);
        }
        if let Ok(path) = env::var("FOLLOWRATIO_OUT_NEGATIVE") {
            let output = self.output.get_or_insert_with(OutputConfig::default);
            output.negative = Some(path);
        }

        // Browser configuration
        if let Ok(url) = env::var("FOLLOWRATIO_WEBDRIVER_URL") {
            let browser = self.browser.get_or_insert_with(BrowserConfig::default);
            browser.webdriver_url = Some(url);
        }
        if let Ok(endpoint) = env::var("FOLLOWRATIO_ENDPOINT") {
            let browser = self.browser.get_or_insert_with(BrowserConfig::default);
            browser.endpoint = Some(endpoint);
        }
        if let Ok(headless) = env::var("FOLLOWRATIO_HEADLESS") {
            let browser = self.browser.get_or_insert_with(BrowserConfig::default);
            browser.headless = Some(headless.parse().map_err(|_| {
                ConfigError::InvalidValue("FOLLOWRATIO_HEADLESS must be true or false".to_string())
            })?);
        }

        // Pacing configuration
        if let Ok(sleep_secs) = env::var("FOLLOWRATIO_SLEEP_SECS") {
            let pacing = self.pacing.get_or_insert_with(PacingConfig::default);
            pacing.sleep_secs = Some(sleep_secs.parse().map_err(|_| {
                ConfigError::InvalidValue(
                    "FOLLOWRATIO_SLEEP_SECS must be a valid number".to_string(),
                )
            })?);
        }
        if let Ok(cooldown_secs) = env::var("FOLLOWRATIO_COOLDOWN_SECS") {
            let pacing = self.pacing.get_or_insert_with(PacingConfig::default);
            pacing.cooldown_secs = Some(cooldown_secs.parse().map_err(|_| {
                ConfigError::InvalidValue(
                    "FOLLOWRATIO_COOLDOWN_SECS must be a valid number".to_string(),
                )
            })?);
        }
        if let Ok(restart_every) = env::var("FOLLOWRATIO_RESTART_EVERY") {
            let pacing = self.pacing.get_or_insert_with(PacingConfig::default);
            pacing.restart_every = Some(restart_every.parse().map_err(|_| {
                ConfigError::InvalidValue(
                    "FOLLOWRATIO_RESTART_EVERY must be a valid number".to_string(),
                )
            })?);
        }

        // Logging configuration
        if let Ok(level) = env::var("FOLLOWRATIO_LOG_LEVEL") {
            let logging = self.logging.get_or_insert_with(LoggingConfig::default);
            logging.level = Some(level);
        }

        Ok(())
    }

    /// Validate that all required configuration is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.path.is_empty() {
            return Err(ConfigError::MissingRequired(
                "input.path, FOLLOWRATIO_INPUT or --input".to_string(),
            ));
        }

        if let Some(ref pacing) = self.pacing {
            if !pacing.sleep_secs().is_finite() || pacing.sleep_secs() < 0.0 {
                return Err(ConfigError::InvalidValue(
                    "pacing.sleep_secs must be a non-negative number".to_string(),
                ));
            }
            if pacing.cooldown_secs() == 0 {
                return Err(ConfigError::InvalidValue(
                    "pacing.cooldown_secs must be greater than zero".to_string(),
                ));
            }
            if pacing.restart_every() == 0 {
                return Err(ConfigError::InvalidValue(
                    "pacing.restart_every must be greater than zero".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Get the input configuration
    pub fn input(&self) -> &InputConfig {
        &self.input
    }

    /// Get the output configuration with defaults
    pub fn output(&self) -> &OutputConfig {
        self.output.as_ref().unwrap()
    }

    /// Get the browser configuration with defaults
    pub fn browser(&self) -> &BrowserConfig {
        self.browser.as_ref().unwrap()
    }

    /// Get the pacing configuration with defaults
    pub fn pacing(&self) -> &PacingConfig {
        self.pacing.as_ref().unwrap()
    }

    /// Get the logging configuration with defaults
    pub fn logging(&self) -> &LoggingConfig {
        self.logging.as_ref().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_defaults() {
        let output = OutputConfig::default();
        assert_eq!(output.all_path(), "counts.csv");
        assert_eq!(output.negative_path(), "negative_ratio.csv");

        let browser = BrowserConfig::default();
        assert_eq!(browser.webdriver_url(), "http://localhost:9515");
        assert_eq!(browser.endpoint(), "m.instagram.com");
        assert!(!browser.headless());
        assert_eq!(browser.page_load_timeout_secs(), 60);

        let pacing = PacingConfig::default();
        assert_eq!(pacing.sleep_secs(), 3.5);
        assert_eq!(pacing.cooldown_secs(), 90);
        assert_eq!(pacing.restart_every(), 120);

        let input = InputConfig::default();
        assert_eq!(input.sheet(), "Following to Check");
        assert_eq!(input.start(), 0);
        assert_eq!(input.max(), None);
    }

    #[test]
    fn test_config_validation_missing_input() {
        let config = Config {
            input: InputConfig::default(),
            output: Some(OutputConfig::default()),
            browser: Some(BrowserConfig::default()),
            pacing: Some(PacingConfig::default()),
            logging: Some(LoggingConfig::default()),
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("input.path"));
    }

    #[test]
    fn test_config_validation_rejects_zero_pacing() {
        let config = Config {
            input: InputConfig {
                path: "roster.xlsx".to_string(),
                sheet: None,
                start: None,
                max: None,
            },
            output: Some(OutputConfig::default()),
            browser: Some(BrowserConfig::default()),
            pacing: Some(PacingConfig {
                sleep_secs: Some(3.5),
                cooldown_secs: Some(0),
                restart_every: Some(120),
            }),
            logging: Some(LoggingConfig::default()),
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cooldown_secs"));
    }

    #[test]
    fn test_config_validation_rejects_negative_sleep() {
        let config = Config {
            input: InputConfig {
                path: "roster.xlsx".to_string(),
                sheet: None,
                start: None,
                max: None,
            },
            output: Some(OutputConfig::default()),
            browser: Some(BrowserConfig::default()),
            pacing: Some(PacingConfig {
                sleep_secs: Some(-1.0),
                cooldown_secs: Some(90),
                restart_every: Some(120),
            }),
            logging: Some(LoggingConfig::default()),
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_var_overrides() {
        env::set_var("FOLLOWRATIO_INPUT", "roster.xlsx");
        env::set_var("FOLLOWRATIO_SHEET", "Sheet1");
        env::set_var("FOLLOWRATIO_HEADLESS", "true");
        env::set_var("FOLLOWRATIO_SLEEP_SECS", "1.25");
        env::set_var("FOLLOWRATIO_RESTART_EVERY", "50");

        let mut config = Config {
            input: InputConfig::default(),
            output: None,
            browser: None,
            pacing: None,
            logging: None,
        };

        config.apply_env_overrides().unwrap();

        assert_eq!(config.input.path, "roster.xlsx");
        assert_eq!(config.input.sheet, Some("Sheet1".to_string()));
        assert_eq!(config.browser.as_ref().unwrap().headless, Some(true));
        assert_eq!(config.pacing.as_ref().unwrap().sleep_secs, Some(1.25));
        assert_eq!(config.pacing.as_ref().unwrap().restart_every, Some(50));

        env::remove_var("FOLLOWRATIO_INPUT");
        env::remove_var("FOLLOWRATIO_SHEET");
        env::remove_var("FOLLOWRATIO_HEADLESS");
        env::remove_var("FOLLOWRATIO_SLEEP_SECS");
        env::remove_var("FOLLOWRATIO_RESTART_EVERY");
    }

    #[test]
    fn test_env_var_rejects_invalid_numbers() {
        env::set_var("FOLLOWRATIO_COOLDOWN_SECS", "not-a-number");

        let mut config = Config {
            input: InputConfig::default(),
            output: None,
            browser: None,
            pacing: None,
            logging: None,
        };

        let result = config.apply_env_overrides();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("FOLLOWRATIO_COOLDOWN_SECS"));

        env::remove_var("FOLLOWRATIO_COOLDOWN_SECS");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_content = r#"
[input]
path = "following_to_check.xlsx"
sheet = "Following to Check"
start = 0
max = 200

[output]
all = "out/counts.csv"
negative = "out/negative_ratio.csv"

[browser]
webdriver_url = "http://localhost:9515"
endpoint = "m.instagram.com"
headless = true

[pacing]
sleep_secs = 4.0
cooldown_secs = 120
restart_every = 100

[logging]
level = "info"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();

        assert_eq!(config.input.path, "following_to_check.xlsx");
        assert_eq!(config.input.max, Some(200));
        assert_eq!(config.output().all_path(), "out/counts.csv");
        assert_eq!(
            config.output().negative_path(),
            "out/negative_ratio.csv"
        );
        assert!(config.browser().headless());
        assert_eq!(config.pacing().sleep_secs(), 4.0);
        assert_eq!(config.pacing().cooldown_secs(), 120);
        assert_eq!(config.pacing().restart_every(), 100);
        assert_eq!(
            config.logging.as_ref().unwrap().level,
            Some("info".to_string())
        );
    }

    #[test]
    fn test_toml_without_input_section_is_accepted() {
        let config: Config = toml::from_str("[logging]\nlevel = \"debug\"\n").unwrap();
        assert!(config.input.path.is_empty());
    }
}
