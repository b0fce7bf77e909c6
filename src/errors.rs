use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Scrape failed for {account}: {reason}")]
    ScrapeFailed { account: String, reason: String },

    #[error("Unknown account key: {0}")]
    UnknownAccount(String),

    #[error("Workbook write failed: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;

// Convert anyhow::Error (headless_chrome's error currency) to ExtractError
impl From<anyhow::Error> for ExtractError {
    fn from(err: anyhow::Error) -> Self {
        ExtractError::JavaScriptFailed(err.to_string())
    }
}
