use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gramscout::orchestrator::{
    extract_multiple_accounts, AlwaysContinue, ContinuePolicy, Pacing, PromptOperator,
};
use gramscout::{Exporter, ExtractError, Extractor, InstagramExtractor, Settings};

#[derive(Debug, Parser)]
#[command(name = "gramscout", about = "Instagram follower metadata extraction")]
struct Cli {
    /// Account keys to process (defaults to every configured account)
    #[arg(long, value_delimiter = ',')]
    accounts: Vec<String>,

    /// Directory for generated files
    #[arg(long, default_value = "data/output")]
    output_dir: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = ExportFormat::Excel)]
    export_format: ExportFormat,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Accepted for compatibility; this flow always drives a real browser
    #[arg(long)]
    no_selenium: bool,

    /// Seconds to wait between accounts
    #[arg(long, default_value_t = 5)]
    delay: u64,

    /// Cap on harvested followers per account
    #[arg(long)]
    max_followers: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Excel,
    Csv,
    Both,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if cli.no_selenium {
        warn!("--no-selenium is not supported for follower extraction; using the browser flow");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Extraction failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> gramscout::Result<()> {
    let mut settings = Settings::from_env();
    if cli.debug {
        settings.debug_mode = true;
    }

    // Validate account keys before any browser work so a typo cannot cost a
    // long run.
    let accounts: Vec<String> = if cli.accounts.is_empty() {
        settings.target_accounts.keys().cloned().collect()
    } else {
        for account in &cli.accounts {
            if !settings.target_accounts.contains_key(account) {
                let known: Vec<&str> =
                    settings.target_accounts.keys().map(String::as_str).collect();
                error!("Unknown account '{}'. Configured: {}", account, known.join(", "));
                return Err(ExtractError::UnknownAccount(account.clone()));
            }
        }
        cli.accounts.clone()
    };

    info!("Processing {} account(s): {}", accounts.len(), accounts.join(", "));

    let pacing = Pacing::from_rate_limits(&settings.rate_limits, Some(cli.delay));
    let mut policy: Box<dyn ContinuePolicy> = if settings.rate_limits.skip_on_error {
        Box::new(AlwaysContinue)
    } else {
        Box::new(PromptOperator)
    };

    let mut extractor = InstagramExtractor::new(&settings);
    extractor.setup().await?;
    info!("Session ready (authenticated: {})", extractor.is_logged_in());

    let results = tokio::select! {
        results = extract_multiple_accounts(
            &mut extractor,
            &accounts,
            cli.max_followers,
            &pacing,
            policy.as_mut(),
        ) => Some(results),
        _ = tokio::signal::ctrl_c() => None,
    };

    extractor.cleanup().await;

    let Some(results) = results else {
        warn!("Interrupted, shutting down");
        return Err(ExtractError::ScrapeFailed {
            account: String::new(),
            reason: "interrupted by operator".to_string(),
        });
    };

    let total: usize = results.iter().map(|(_, records)| records.len()).sum();
    info!("Extraction finished: {} records across {} account(s)", total, results.len());

    let exporter = Exporter::new(&cli.output_dir, settings.output.clone());
    match cli.export_format {
        ExportFormat::Excel => {
            let path = exporter.export_to_excel(&results, None)?;
            info!("Generated {}", path.display());
        }
        ExportFormat::Csv => {
            for path in exporter.export_to_csv(&results)? {
                info!("Generated {}", path.display());
            }
        }
        ExportFormat::Both => {
            let path = exporter.export_to_excel(&results, None)?;
            info!("Generated {}", path.display());
            for path in exporter.export_to_csv(&results)? {
                info!("Generated {}", path.display());
            }
        }
    }

    Ok(())
}
