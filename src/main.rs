use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use rss_digest::{scheduler, App, Config, Result};

#[derive(Parser)]
#[command(name = "rss-digest", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest feeds, then analyse one batch of pending articles
    Fetch {
        /// Only ingest this feed
        #[arg(long)]
        url: Option<String>,
    },
    /// Analyse one batch of pending articles
    Analyze,
    /// Send the daily digest now
    Report,
    /// Delete old artifacts
    Cleanup {
        /// Age in days (defaults to the configured value)
        #[arg(long)]
        days: Option<u64>,
    },
    /// Fetch, then report
    Run,
    /// Run the scheduler until interrupted
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let app = App::new(config).await?;

    match cli.command {
        Command::Fetch { url } => {
            let reports = app.fetch(url.as_deref()).await?;
            let created: usize = reports.iter().map(|r| r.created).sum();
            println!("Ingested {} feeds, {} new articles", reports.len(), created);
        }
        Command::Analyze => match app.analyze().await? {
            Some(report) => println!(
                "Analyzed {} of {} pending articles",
                report.analyzed, report.scanned
            ),
            None => println!("Analysis disabled: set OPENAI_API_KEY"),
        },
        Command::Report => match app.report().await? {
            Some(outcome) => println!(
                "{} candidates, delivered to {} channels, {} marked sent",
                outcome.candidates, outcome.channels_delivered, outcome.marked_sent
            ),
            None => println!("Reports disabled: set OPENAI_API_KEY"),
        },
        Command::Cleanup { days } => {
            let removed = app.cleanup(days).await?;
            println!("Removed {removed} files");
        }
        Command::Run => app.run().await?,
        Command::Serve => scheduler::serve(Arc::new(app)).await?,
    }

    Ok(())
}
