use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::Viewport;

/// Static description of one target account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetAccount {
    pub username: String,
    pub name: String,
    pub sector: String,
    pub min_followers: u32,
}

/// Rate-limit and pacing knobs, all overridable from the environment.
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub requests_per_minute: u32,
    pub delay_between_requests: u64,
    pub delay_between_profiles: u64,
    pub max_retries: u32,
    pub backoff_factor: u32,
    pub timeout_secs: u64,
    pub delay_variation: u64,
    pub account_break_minutes: u64,
    pub conservative_mode: bool,
    pub skip_on_error: bool,
    pub enable_random_waits: bool,
}

#[derive(Debug, Clone)]
pub struct BrowserPrefs {
    pub viewport: Viewport,
    pub disable_images: bool,
    pub user_agent: Option<String>,
    pub page_load_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub sheet_prefix: String,
    pub include_metadata: bool,
    pub date_format: String,
    pub datetime_format: String,
}

/// Immutable run configuration, built once at startup and passed by
/// reference into each component. Nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    pub target_accounts: BTreeMap<String, TargetAccount>,
    pub rate_limits: RateLimits,
    pub browser: BrowserPrefs,
    pub credentials: Option<Credentials>,
    pub proxies: Vec<String>,
    pub debug_mode: bool,
    pub auto_backup: bool,
    pub output: OutputSettings,
}

fn env_parsed<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(raw) => matches!(raw.to_lowercase().as_str(), "true" | "1" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Settings {
    /// Loads `.env` when present, then resolves all settings from the
    /// environment with defaults.
    pub fn from_env() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => info!("Environment loaded from {}", path.display()),
            Err(_) => debug!("No .env file found, using defaults"),
        }

        let credentials = match (env::var("INSTAGRAM_USERNAME"), env::var("INSTAGRAM_PASSWORD")) {
            (Ok(username), Ok(password)) if !username.is_empty() && !password.is_empty() => {
                info!("Instagram credentials configured for {}", username);
                Some(Credentials { username, password })
            }
            _ => {
                info!("No Instagram credentials configured, public data only");
                None
            }
        };

        let proxies: Vec<String> = env::var("PROXY_LIST")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if !proxies.is_empty() {
            info!("Configured {} proxies", proxies.len());
        }

        Self {
            target_accounts: default_target_accounts(),
            rate_limits: RateLimits {
                requests_per_minute: env_parsed("MAX_REQUESTS_PER_MINUTE", 20),
                delay_between_requests: env_parsed("CUSTOM_DELAY_BETWEEN_REQUESTS", 3),
                delay_between_profiles: env_parsed("CUSTOM_DELAY_BETWEEN_PROFILES", 5),
                max_retries: env_parsed("MAX_RETRIES", 3),
                backoff_factor: env_parsed("BACKOFF_MULTIPLIER", 2),
                timeout_secs: env_parsed("REQUEST_TIMEOUT", 30),
                delay_variation: env_parsed("DELAY_VARIATION", 2),
                account_break_minutes: env_parsed("ACCOUNT_BREAK_MINUTES", 5),
                conservative_mode: env_bool("CONSERVATIVE_MODE", false),
                skip_on_error: env_bool("SKIP_ON_ERROR", false),
                enable_random_waits: env_bool("ENABLE_RANDOM_WAITS", false),
            },
            browser: BrowserPrefs {
                viewport: Viewport {
                    width: env_parsed("SELENIUM_WINDOW_WIDTH", 1920),
                    height: env_parsed("SELENIUM_WINDOW_HEIGHT", 1080),
                },
                disable_images: env_bool("DISABLE_IMAGES", false),
                user_agent: env::var("SELENIUM_USER_AGENT").ok(),
                page_load_timeout_secs: 30,
            },
            credentials,
            proxies,
            debug_mode: env_bool("DEBUG_MODE", false),
            auto_backup: env_bool("AUTO_BACKUP", true),
            output: OutputSettings {
                sheet_prefix: "Seguidores_".to_string(),
                include_metadata: env_bool("INCLUDE_METADATA", true),
                date_format: env_string("DATE_FORMAT", "%Y-%m-%d"),
                datetime_format: env_string("DATETIME_FORMAT", "%Y-%m-%d %H:%M:%S"),
            },
        }
    }
}

fn default_target_accounts() -> BTreeMap<String, TargetAccount> {
    let mut accounts = BTreeMap::new();
    accounts.insert(
        "elcorteingles".to_string(),
        TargetAccount {
            username: "elcorteingles".to_string(),
            name: "El Corte Inglés".to_string(),
            sector: "Retail/Moda".to_string(),
            min_followers: 100,
        },
    );
    accounts.insert(
        "mercadona".to_string(),
        TargetAccount {
            username: "mercadona".to_string(),
            name: "Mercadona".to_string(),
            sector: "Supermercados".to_string(),
            min_followers: 100,
        },
    );
    accounts.insert(
        "carrefoures".to_string(),
        TargetAccount {
            username: "carrefoures".to_string(),
            name: "Carrefour España".to_string(),
            sector: "Supermercados".to_string(),
            min_followers: 100,
        },
    );
    accounts
}

pub const INSTAGRAM_BASE_URL: &str = "https://www.instagram.com";

pub fn profile_url(username: &str) -> String {
    format!("{}/{}/", INSTAGRAM_BASE_URL, username)
}

pub fn login_url() -> String {
    format!("{}/accounts/login/", INSTAGRAM_BASE_URL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_env_absent() {
        let settings = Settings::from_env();
        assert_eq!(settings.target_accounts.len(), 3);
        assert!(settings.target_accounts.contains_key("mercadona"));
        assert_eq!(settings.rate_limits.requests_per_minute, 20);
        assert_eq!(settings.rate_limits.delay_between_profiles, 5);
        assert_eq!(settings.output.sheet_prefix, "Seguidores_");
    }

    #[test]
    fn profile_url_shape() {
        assert_eq!(profile_url("mercadona"), "https://www.instagram.com/mercadona/");
    }

    #[test]
    fn bool_parsing_accepts_common_forms() {
        std::env::set_var("GRAMSCOUT_TEST_FLAG", "yes");
        assert!(env_bool("GRAMSCOUT_TEST_FLAG", false));
        std::env::set_var("GRAMSCOUT_TEST_FLAG", "0");
        assert!(!env_bool("GRAMSCOUT_TEST_FLAG", true));
        std::env::remove_var("GRAMSCOUT_TEST_FLAG");
    }
}
