//! cwlogs-export
//!
//! Exports the events of a CloudWatch Logs group within a time window to CSV.
//!
//! # Usage
//!
//! ```bash
//! # Logs Insights query, newest first, header row, overwrites output.csv
//! cwlogs-export query --log-group /app/api --profile prod \
//!     --start-date 2024-01-01T00:00:00 --end-date 2024-01-01T01:00:00 --limit 500
//!
//! # Every event in the window, appended to a timestamped file
//! cwlogs-export scan --log-group /app/api --profile prod \
//!     --start-date 2024-01-01T00:00:00 --end-date 2024-01-01T01:00:00
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Level;

use cwlogs_export::Result;
use cwlogs_export::cli::CliInterface;
use cwlogs_export::client::CloudWatchLogsApi;
use cwlogs_export::retrieval::TokioClock;

/// Application entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle non-export subcommands
/// 4. Run the export
///
/// # Returns
/// * `Result<()>` - Success or error
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(());
    }

    let Some(plan) = cli.export_plan()? else {
        return Ok(());
    };

    let api = CloudWatchLogsApi::connect(&cli.config().aws).await;
    let cancel = spawn_ctrl_c_handler();

    let result = plan
        .execute(Arc::new(api), Arc::new(TokioClock), cancel)
        .await?;

    if result.cancelled {
        println!(
            "Export cancelled; {} records were saved to {}",
            result.records_exported, result.path
        );
    } else {
        if result.records_skipped > 0 {
            eprintln!("Skipped {} malformed records", result.records_skipped);
        }
        println!("Logs have been saved to {}", result.path);
    }

    Ok(())
}

/// Cancel the returned token on the first Ctrl+C
fn spawn_ctrl_c_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => token_clone.cancel(),
            Err(err) => eprintln!("Failed to listen for Ctrl+C: {}", err),
        }
    });

    token
}

/// Initialize logging system based on verbosity level
///
/// Logs go to stderr so stdout only carries the final report.
///
/// # Arguments
/// * `cli` - CLI interface with verbosity settings
fn initialize_logging(cli: &CliInterface) {
    let level: Level = cli.config().logging.level.to_tracing_level();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
