use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::browser::{BrowserKind, BrowserSession};
use crate::config::{profile_url, Settings};
use crate::errors::{ExtractError, Result};
use crate::orchestrator::Pacing;
use crate::parse::{clean_text, extract_phones, parse_meta_description};
use crate::selectors;
use crate::types::FollowerRecord;

/// The operations the orchestrator drives. One concrete implementation
/// exists; the trait is the seam that lets tests substitute a scripted
/// extractor for a live browser.
#[async_trait]
pub trait Extractor {
    /// Acquires whatever resources extraction needs (browser, login).
    async fn setup(&mut self) -> Result<()>;

    /// Releases resources unconditionally.
    async fn cleanup(&mut self);

    /// Harvests up to `max` unique follower handles from an account's
    /// followers surface. A missing followers link is a genuine empty
    /// result; a scrape that matched no strategy is an error.
    async fn extract_followers(
        &mut self,
        account: &str,
        max: Option<usize>,
    ) -> Result<Vec<String>>;

    /// Fetches detail records for one batch of handles (at most the batch
    /// size). Per-profile failures degrade to template records; only
    /// session-level failures surface as errors.
    async fn fetch_profile_batch(
        &mut self,
        handles: &[String],
        pacing: &Pacing,
    ) -> Result<Vec<FollowerRecord>>;
}

/// Batch size: how many browser tabs are held open at once.
pub const BATCH_SIZE: usize = 5;

/// Drives a visible browser session against Instagram's public surfaces.
pub struct InstagramExtractor<'a> {
    settings: &'a Settings,
    session: Option<BrowserSession>,
    logged_in: bool,
}

impl<'a> InstagramExtractor<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            session: None,
            logged_in: false,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    fn session_mut(&mut self) -> Result<&mut BrowserSession> {
        self.session
            .as_mut()
            .ok_or_else(|| ExtractError::LaunchFailed("Session not set up".to_string()))
    }

    /// Navigates the focused tab to a profile and fills a record from the
    /// page. Any failure leaves the record at its template defaults.
    async fn profile_details(&mut self, username: &str) -> FollowerRecord {
        let mut record = FollowerRecord::template(username, "");
        if let Err(e) = self.fill_profile_details(username, &mut record).await {
            debug!("Profile fetch for {} degraded to template: {}", username, e);
        }
        record
    }

    async fn fill_profile_details(
        &mut self,
        username: &str,
        record: &mut FollowerRecord,
    ) -> Result<()> {
        let session = self.session_mut()?;

        // Tabs preloaded by the batch fetcher are already at the profile.
        let target = profile_url(username);
        if session.current_url() != target {
            session.navigate(&target).await?;
        }
        session.wait_for_page_load().await?;

        let html = session.page_source().await?;

        if let Some(description) = selectors::meta_description(&html) {
            let counters = parse_meta_description(&description);
            record.follower_count = counters.followers;
            record.following_count = counters.following;
            record.posts_count = counters.posts;
        }

        if let Some(bio) = selectors::profile_bio(&html) {
            record.bio = clean_text(&bio);
            record.phone_numbers = extract_phones(&record.bio);
        }
        if let Some(url) = selectors::profile_external_url(&html) {
            record.external_url = url;
        }

        Ok(())
    }
}

#[async_trait]
impl Extractor for InstagramExtractor<'_> {
    async fn setup(&mut self) -> Result<()> {
        let kind = BrowserKind::detect();
        let mut session = BrowserSession::launch(kind, &self.settings.browser).await?;

        if let Some(credentials) = &self.settings.credentials {
            match session.login(credentials).await {
                Ok(true) => {
                    info!("Logged in as {}", credentials.username);
                    self.logged_in = true;
                    session.dismiss_popups().await;
                }
                Ok(false) => warn!("Login not confirmed, continuing unauthenticated"),
                Err(e) => warn!("Login failed ({}), continuing unauthenticated", e),
            }
        }

        self.session = Some(session);
        Ok(())
    }

    async fn cleanup(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
        self.logged_in = false;
    }

    async fn extract_followers(
        &mut self,
        account: &str,
        max: Option<usize>,
    ) -> Result<Vec<String>> {
        let session = self.session_mut()?;

        session.navigate(&profile_url(account)).await?;
        session.wait_for_page_load().await?;

        let html = session.page_source().await?;
        if !selectors::has_followers_link(&html) {
            warn!("No followers link on @{} profile", account);
            return Ok(Vec::new());
        }

        session.click(selectors::FOLLOWERS_LINK).await?;
        tokio::time::sleep(Duration::from_secs(3)).await;

        let modal_html = session.page_source().await?;
        let handles = selectors::followers_from_modal(&modal_html, max);
        if handles.is_empty() {
            return Err(ExtractError::ScrapeFailed {
                account: account.to_string(),
                reason: "no modal strategy matched any follower handle".to_string(),
            });
        }

        info!("Harvested {} handles from @{}", handles.len(), account);
        Ok(handles)
    }

    async fn fetch_profile_batch(
        &mut self,
        handles: &[String],
        pacing: &Pacing,
    ) -> Result<Vec<FollowerRecord>> {
        let session = self.session_mut()?;

        // Load the first profile in the primary tab, the rest in new tabs,
        // so page loads overlap while the single control thread catches up.
        for (idx, handle) in handles.iter().enumerate() {
            let url = profile_url(handle);
            if idx == 0 {
                session.activate_tab(0).await?;
                session.navigate(&url).await?;
            } else {
                session.open_tab(&url).await?;
            }
        }
        tokio::time::sleep(pacing.batch_settle).await;
        debug!("Batch of {} profiles across {} tabs", handles.len(), session.tab_count());

        let mut records = Vec::with_capacity(handles.len());
        for (idx, handle) in handles.iter().enumerate() {
            self.session_mut()?.activate_tab(idx).await?;
            records.push(self.profile_details(handle).await);
            tokio::time::sleep(pacing.profile_pause()).await;
        }

        self.session_mut()?.close_extra_tabs().await?;
        Ok(records)
    }
}
