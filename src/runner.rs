use crate::config::Config;
use crate::error::{truncate_message, FollowRatioError, SessionError, ERROR_FIELD_MAX};
use crate::extract::{self, ExtractionResult};
use crate::output::{CsvSink, ProfileRow};
use crate::session::BrowserSession;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Build the mobile profile URL for a username.
pub fn profile_url(endpoint: &str, username: &str) -> String {
    format!("https://{endpoint}/{username}/")
}

/// Drives the sequential fetch, extract, write loop over the roster.
pub struct ScrapeRunner {
    session: Option<BrowserSession>,
    sink: CsvSink,
    config: Config,
    processed_since_restart: u32,
}

impl ScrapeRunner {
    pub fn new(session: BrowserSession, sink: CsvSink, config: Config) -> Self {
        Self {
            session: Some(session),
            sink,
            config,
            processed_since_restart: 0,
        }
    }

    /// Process every username in `roster`. Output indices are 1-based from
    /// `start`, matching the row's position in the full deduplicated roster.
    ///
    /// A failure on one username is captured into that row's `error` field
    /// and the loop continues; no row is ever skipped. Only output and
    /// session-restart failures abort the run.
    pub async fn run(&mut self, roster: &[String], start: usize) -> Result<(), FollowRatioError> {
        for (offset, username) in roster.iter().enumerate() {
            let index = start + offset + 1;
            let url = profile_url(self.config.browser().endpoint(), username);

            self.maybe_restart().await?;

            match self.process_profile(&url).await {
                Ok((followers, following)) => {
                    let row = ProfileRow {
                        index,
                        username: username.clone(),
                        profile_link: url,
                        followers,
                        following,
                        ratio: ProfileRow::ratio_of(followers, following),
                        error: None,
                    };
                    self.sink.append(&row)?;
                    self.processed_since_restart += 1;
                    info!(
                        "[{}] {}: followers={:?}, following={:?}",
                        index, username, followers, following
                    );
                }
                Err(e) => {
                    let row = ProfileRow {
                        index,
                        username: username.clone(),
                        profile_link: url,
                        followers: None,
                        following: None,
                        ratio: None,
                        error: Some(truncate_message(&e.to_string(), ERROR_FIELD_MAX)),
                    };
                    self.sink.append(&row)?;
                    warn!("[{}] {}: {}", index, username, e);
                    sleep(self.settle()).await;
                }
            }
        }
        Ok(())
    }

    /// Close the browser session. Safe to call after an interrupted run.
    pub async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!("Failed to close browser session: {}", e);
            }
        }
    }

    /// Fetch and extract one profile, with a single cooldown-and-retry cycle
    /// when a rate-limit page is detected.
    async fn process_profile(
        &mut self,
        url: &str,
    ) -> Result<(Option<u64>, Option<u64>), SessionError> {
        let html = self.fetch(url).await?;
        match extract::extract(&html) {
            ExtractionResult::Counts {
                followers,
                following,
            } => Ok((followers, following)),
            ExtractionResult::RateLimited => {
                let cooldown = self.config.pacing().cooldown_secs();
                warn!("Rate limit detected, cooling down {}s before one retry", cooldown);
                sleep(Duration::from_secs(cooldown)).await;

                let html = self.fetch(url).await?;
                match extract::extract(&html) {
                    ExtractionResult::Counts {
                        followers,
                        following,
                    } => Ok((followers, following)),
                    ExtractionResult::RateLimited => {
                        warn!("Still rate limited after cooldown, recording empty counts");
                        Ok((None, None))
                    }
                }
            }
        }
    }

    async fn fetch(&mut self, url: &str) -> Result<String, SessionError> {
        let settle = self.settle();
        let session = self
            .session
            .as_mut()
            .expect("session is live while the runner is running");
        session.fetch(url, settle).await
    }

    /// Replace the browser session after enough successful profiles.
    async fn maybe_restart(&mut self) -> Result<(), FollowRatioError> {
        if self.processed_since_restart < self.config.pacing().restart_every() {
            return Ok(());
        }
        info!(
            "Restarting browser after {} processed profiles",
            self.processed_since_restart
        );
        if let Some(session) = self.session.take() {
            let fresh = session
                .restart(self.config.browser())
                .await
                .map_err(FollowRatioError::Session)?;
            self.session = Some(fresh);
        }
        self.processed_since_restart = 0;
        Ok(())
    }

    fn settle(&self) -> Duration {
        Duration::from_secs_f64(self.config.pacing().sleep_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_url() {
        assert_eq!(
            profile_url("m.instagram.com", "alice"),
            "https://m.instagram.com/alice/"
        );
        assert_eq!(
            profile_url("example.test", "bob_99"),
            "https://example.test/bob_99/"
        );
    }
}
