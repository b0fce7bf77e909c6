use chrono::Local;
use serde::{Deserialize, Serialize};

/// One row of output per scraped profile.
///
/// `username`, `source_account` and `extraction_timestamp` are always present.
/// Counters default to 0 when the page counters cannot be parsed; there is no
/// separate "unknown" sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowerRecord {
    pub username: String,
    pub full_name: String,
    pub bio: String,
    pub posts_count: u64,
    pub follower_count: u64,
    pub following_count: u64,
    pub is_verified: bool,
    pub is_private: bool,
    pub phone_numbers: Vec<String>,
    pub external_url: String,
    pub extraction_timestamp: String,
    pub source_account: String,
}

impl FollowerRecord {
    /// Builds the all-defaults record, timestamped at creation.
    pub fn template(username: &str, source_account: &str) -> Self {
        Self {
            username: username.to_string(),
            full_name: String::new(),
            bio: String::new(),
            posts_count: 0,
            follower_count: 0,
            following_count: 0,
            is_verified: false,
            is_private: false,
            phone_numbers: Vec::new(),
            external_url: String::new(),
            extraction_timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            source_account: source_account.to_string(),
        }
    }
}

/// Account key -> ordered records, in the order accounts were processed.
/// Built once by the orchestrator and consumed once by the exporter.
pub type ExtractionResult = Vec<(String, Vec<FollowerRecord>)>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}
