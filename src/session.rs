use crate::config::BrowserConfig;
use crate::error::SessionError;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Mobile Safari user agent. The mobile site variant is lighter and less
/// aggressively gated than the desktop one.
pub const MOBILE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) \
    AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";

/// Pause between tearing a session down and bringing the next one up.
const RESTART_PAUSE: Duration = Duration::from_secs(2);

/// An owned WebDriver session emulating a mobile browser.
///
/// The session is an explicit resource: callers connect it, pass it around,
/// and must close it when done. Restarting replaces the whole session rather
/// than mutating it in place.
pub struct BrowserSession {
    client: Client,
}

impl BrowserSession {
    /// Connect to the WebDriver endpoint and start a browser with mobile
    /// emulation capabilities.
    pub async fn connect(config: &BrowserConfig) -> Result<Self, SessionError> {
        let mut args = vec![
            "--disable-gpu".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--no-sandbox".to_string(),
            "--window-size=430,900".to_string(),
            "--lang=en-US".to_string(),
            format!("--user-agent={MOBILE_UA}"),
        ];
        if config.headless() {
            args.insert(0, "--headless=new".to_string());
        }

        let mut capabilities = serde_json::map::Map::new();
        capabilities.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

        debug!("Connecting to WebDriver at {}", config.webdriver_url());
        let client = ClientBuilder::native()
            .capabilities(capabilities)
            .connect(config.webdriver_url())
            .await?;

        let timeouts = TimeoutConfiguration::new(
            None,
            Some(Duration::from_secs(config.page_load_timeout_secs())),
            None,
        );
        client.update_timeouts(timeouts).await?;

        info!("Browser session established");
        Ok(Self { client })
    }

    /// Navigate to `url`, give the page `settle` to finish rendering, and
    /// return its source.
    pub async fn fetch(&mut self, url: &str, settle: Duration) -> Result<String, SessionError> {
        self.client.goto(url).await?;
        sleep(settle).await;
        Ok(self.client.source().await?)
    }

    /// Tear this session down and bring up a fresh one with the same
    /// configuration.
    pub async fn restart(self, config: &BrowserConfig) -> Result<Self, SessionError> {
        info!("Restarting browser session");
        self.close().await?;
        sleep(RESTART_PAUSE).await;
        Self::connect(config).await
    }

    /// Close the browser and end the WebDriver session.
    pub async fn close(self) -> Result<(), SessionError> {
        self.client.close().await?;
        Ok(())
    }
}
