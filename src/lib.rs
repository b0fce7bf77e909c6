pub mod browser;
pub mod config;
pub mod errors;
pub mod export;
pub mod extractor;
pub mod orchestrator;
pub mod parse;
pub mod selectors;
pub mod types;

pub use browser::{BrowserKind, BrowserSession};
pub use config::Settings;
pub use errors::{ExtractError, Result};
pub use export::Exporter;
pub use extractor::{Extractor, InstagramExtractor};
pub use orchestrator::{extract_multiple_accounts, ContinuePolicy, Pacing};
pub use types::{ExtractionResult, FollowerRecord};
