use std::io::{self, BufRead, Write};
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};

use crate::config::RateLimits;
use crate::errors::Result;
use crate::extractor::{Extractor, BATCH_SIZE};
use crate::types::{ExtractionResult, FollowerRecord};

/// Injectable delay parameters. Tests use [`Pacing::none`] to run without
/// real sleeps; the CLI builds one from settings plus the `--delay` flag.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Uniform range slept between profiles inside a batch, in seconds.
    pub profile_pause_range: (f64, f64),
    /// Settling time after opening a batch of tabs.
    pub batch_settle: Duration,
    /// Pause between accounts.
    pub account_delay: Duration,
}

impl Pacing {
    pub fn from_rate_limits(limits: &RateLimits, delay_override: Option<u64>) -> Self {
        let account_delay = delay_override.unwrap_or(limits.delay_between_profiles);
        Self {
            profile_pause_range: (1.0, 2.5),
            batch_settle: Duration::from_secs(2),
            account_delay: Duration::from_secs(account_delay),
        }
    }

    /// Zero delays, for tests and dry runs.
    pub fn none() -> Self {
        Self {
            profile_pause_range: (0.0, 0.0),
            batch_settle: Duration::ZERO,
            account_delay: Duration::ZERO,
        }
    }

    /// Samples the randomized inter-profile pause.
    pub fn profile_pause(&self) -> Duration {
        let (min, max) = self.profile_pause_range;
        if max <= min {
            return Duration::from_secs_f64(min.max(0.0));
        }
        Duration::from_secs_f64(rand::rng().random_range(min..max))
    }
}

/// Decides whether to keep going after an account-level failure. Modeled as
/// a callback so automated runs and tests can drop the interactive prompt.
pub trait ContinuePolicy {
    fn should_continue(&mut self, account: &str) -> bool;
}

/// Asks the operator on stdin; anything but `y` aborts.
pub struct PromptOperator;

impl ContinuePolicy for PromptOperator {
    fn should_continue(&mut self, account: &str) -> bool {
        print!("Error en @{}. ¿Continuar con la siguiente cuenta? (y/N): ", account);
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        answer.trim().eq_ignore_ascii_case("y")
    }
}

pub struct AlwaysContinue;

impl ContinuePolicy for AlwaysContinue {
    fn should_continue(&mut self, _account: &str) -> bool {
        true
    }
}

pub struct AlwaysAbort;

impl ContinuePolicy for AlwaysAbort {
    fn should_continue(&mut self, _account: &str) -> bool {
        false
    }
}

/// Runs the full extraction over the given accounts. Never fails: scrape
/// problems degrade to empty entries, and account-level failures go through
/// the continue policy. Accounts skipped by an abort are absent from the
/// result.
pub async fn extract_multiple_accounts<E: Extractor>(
    extractor: &mut E,
    accounts: &[String],
    max_followers: Option<usize>,
    pacing: &Pacing,
    policy: &mut dyn ContinuePolicy,
) -> ExtractionResult {
    let mut results: ExtractionResult = Vec::new();

    for (i, account) in accounts.iter().enumerate() {
        match process_account(extractor, account, max_followers, pacing).await {
            Ok(records) => {
                info!("@{}: {} records", account, records.len());
                results.push((account.clone(), records));
            }
            Err(e) => {
                warn!("@{}: account-level failure: {}", account, e);
                results.push((account.clone(), Vec::new()));
                if i < accounts.len() - 1 && !policy.should_continue(account) {
                    warn!("Operator aborted, skipping remaining accounts");
                    break;
                }
            }
        }

        if i < accounts.len() - 1 {
            tokio::time::sleep(pacing.account_delay).await;
        }
    }

    results
}

async fn process_account<E: Extractor>(
    extractor: &mut E,
    account: &str,
    max_followers: Option<usize>,
    pacing: &Pacing,
) -> Result<Vec<FollowerRecord>> {
    let mut followers = match extractor.extract_followers(account, max_followers).await {
        Ok(handles) => handles,
        Err(e) => {
            // Harvest failure collapses to "no followers found" so the run
            // keeps moving; the log line is the only place the difference
            // between the two survives.
            warn!("Follower harvest failed for @{}: {}", account, e);
            Vec::new()
        }
    };

    if followers.is_empty() {
        return Ok(Vec::new());
    }

    // A shuffled visit order avoids replaying Instagram's own listing order.
    followers.shuffle(&mut rand::rng());

    let mut records = Vec::with_capacity(followers.len());
    for batch in followers.chunks(BATCH_SIZE) {
        let mut batch_records = extractor.fetch_profile_batch(batch, pacing).await?;
        for record in &mut batch_records {
            record.source_account = format!("@{account}");
        }
        records.extend(batch_records);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExtractError;
    use crate::parse::parse_meta_description;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Scripted extractor: fixed follower lists and per-profile preview
    /// descriptions, no browser involved.
    struct ScriptedExtractor {
        followers: HashMap<String, Vec<String>>,
        descriptions: HashMap<String, String>,
        fail_batches_for: Vec<String>,
        current_account: Option<String>,
    }

    impl ScriptedExtractor {
        fn new() -> Self {
            Self {
                followers: HashMap::new(),
                descriptions: HashMap::new(),
                fail_batches_for: Vec::new(),
                current_account: None,
            }
        }
    }

    #[async_trait]
    impl Extractor for ScriptedExtractor {
        async fn setup(&mut self) -> crate::errors::Result<()> {
            Ok(())
        }

        async fn cleanup(&mut self) {}

        async fn extract_followers(
            &mut self,
            account: &str,
            max: Option<usize>,
        ) -> crate::errors::Result<Vec<String>> {
            self.current_account = Some(account.to_string());
            let mut handles = self.followers.get(account).cloned().unwrap_or_default();
            if let Some(max) = max {
                handles.truncate(max);
            }
            Ok(handles)
        }

        async fn fetch_profile_batch(
            &mut self,
            handles: &[String],
            _pacing: &Pacing,
        ) -> crate::errors::Result<Vec<FollowerRecord>> {
            if let Some(account) = &self.current_account {
                if self.fail_batches_for.contains(account) {
                    return Err(ExtractError::NavigationFailed("tab lost".to_string()));
                }
            }
            Ok(handles
                .iter()
                .map(|handle| {
                    let mut record = FollowerRecord::template(handle, "");
                    if let Some(description) = self.descriptions.get(handle) {
                        let counters = parse_meta_description(description);
                        record.follower_count = counters.followers;
                        record.following_count = counters.following;
                        record.posts_count = counters.posts;
                    }
                    record
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn end_to_end_two_followers() {
        let mut extractor = ScriptedExtractor::new();
        extractor.followers.insert(
            "demo".to_string(),
            vec!["alice".to_string(), "bob".to_string()],
        );
        let description = "150 seguidores, 80 siguiendo, 12 publicaciones - perfil";
        extractor
            .descriptions
            .insert("alice".to_string(), description.to_string());
        extractor
            .descriptions
            .insert("bob".to_string(), description.to_string());

        let accounts = vec!["demo".to_string()];
        let results = extract_multiple_accounts(
            &mut extractor,
            &accounts,
            None,
            &Pacing::none(),
            &mut AlwaysContinue,
        )
        .await;

        assert_eq!(results.len(), 1);
        let (account, records) = &results[0];
        assert_eq!(account, "demo");
        assert_eq!(records.len(), 2);
        for record in records {
            assert_eq!(record.follower_count, 150);
            assert_eq!(record.following_count, 80);
            assert_eq!(record.posts_count, 12);
            assert_eq!(record.source_account, "@demo");
        }
        assert_ne!(records[0].username, records[1].username);
    }

    #[tokio::test]
    async fn empty_harvest_records_empty_list() {
        let mut extractor = ScriptedExtractor::new();
        let accounts = vec!["ghost".to_string()];
        let results = extract_multiple_accounts(
            &mut extractor,
            &accounts,
            None,
            &Pacing::none(),
            &mut AlwaysContinue,
        )
        .await;

        assert_eq!(results, vec![("ghost".to_string(), Vec::new())]);
    }

    #[tokio::test]
    async fn abort_policy_skips_remaining_accounts() {
        let mut extractor = ScriptedExtractor::new();
        extractor
            .followers
            .insert("first".to_string(), vec!["someone".to_string()]);
        extractor
            .followers
            .insert("second".to_string(), vec!["other".to_string()]);
        extractor.fail_batches_for.push("first".to_string());

        let accounts = vec!["first".to_string(), "second".to_string()];
        let results = extract_multiple_accounts(
            &mut extractor,
            &accounts,
            None,
            &Pacing::none(),
            &mut AlwaysAbort,
        )
        .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "first");
        assert!(results[0].1.is_empty());
    }

    #[tokio::test]
    async fn continue_policy_processes_remaining_accounts() {
        let mut extractor = ScriptedExtractor::new();
        extractor
            .followers
            .insert("first".to_string(), vec!["someone".to_string()]);
        extractor
            .followers
            .insert("second".to_string(), vec!["other".to_string()]);
        extractor.fail_batches_for.push("first".to_string());

        let accounts = vec!["first".to_string(), "second".to_string()];
        let results = extract_multiple_accounts(
            &mut extractor,
            &accounts,
            None,
            &Pacing::none(),
            &mut AlwaysContinue,
        )
        .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_empty());
        assert_eq!(results[1].1.len(), 1);
    }

    #[tokio::test]
    async fn max_followers_caps_harvest() {
        let mut extractor = ScriptedExtractor::new();
        extractor.followers.insert(
            "demo".to_string(),
            vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()],
        );

        let accounts = vec!["demo".to_string()];
        let results = extract_multiple_accounts(
            &mut extractor,
            &accounts,
            Some(3),
            &Pacing::none(),
            &mut AlwaysContinue,
        )
        .await;

        assert_eq!(results[0].1.len(), 3);
    }

    #[test]
    fn pacing_none_is_zero() {
        let pacing = Pacing::none();
        assert_eq!(pacing.profile_pause(), Duration::ZERO);
        assert_eq!(pacing.account_delay, Duration::ZERO);
    }

    #[test]
    fn pacing_pause_within_range() {
        let pacing = Pacing {
            profile_pause_range: (1.0, 2.5),
            batch_settle: Duration::ZERO,
            account_delay: Duration::ZERO,
        };
        for _ in 0..20 {
            let pause = pacing.profile_pause();
            assert!(pause >= Duration::from_secs_f64(1.0));
            assert!(pause < Duration::from_secs_f64(2.5));
        }
    }
}
