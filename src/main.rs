//! feedmgr
//!
//! Command-line access to the ThreatHunter feed manager API.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedmgr::{FeedClient, FeedInfoUpdate, HttpTransport, Record, TransportConfig};

/// feedmgr
#[derive(Parser, Debug)]
#[command(name = "feedmgr")]
#[command(about = "Manage ThreatHunter threat intelligence feeds")]
struct Args {
    #[command(flatten)]
    transport: TransportConfig,

    /// Print records as JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List feeds
    List {
        /// Include public feeds
        #[arg(long)]
        public: bool,
    },
    /// Show one feed with its reports
    Show { feed_id: String },
    /// List the reports of a feed
    Reports { feed_id: String },
    /// Create a feed
    Create {
        #[command(flatten)]
        info: NewFeedArgs,

        /// JSON file holding a list of reports
        #[arg(long)]
        reports: Option<PathBuf>,
    },
    /// Update a feed's metadata
    Update {
        feed_id: String,

        #[command(flatten)]
        changes: UpdateArgs,
    },
    /// Delete a feed
    Delete { feed_id: String },
    /// Delete one report of a feed
    DeleteReport { feed_id: String, report_id: String },
}

#[derive(clap::Args, Debug)]
struct NewFeedArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    owner: String,
    #[arg(long)]
    provider_url: String,
    #[arg(long)]
    summary: String,
    #[arg(long)]
    category: String,
    #[arg(long, default_value = "private")]
    access: String,
}

#[derive(clap::Args, Debug)]
struct UpdateArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    owner: Option<String>,
    #[arg(long)]
    provider_url: Option<String>,
    #[arg(long)]
    summary: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    access: Option<String>,
}

impl From<UpdateArgs> for FeedInfoUpdate {
    fn from(args: UpdateArgs) -> Self {
        FeedInfoUpdate {
            name: args.name,
            owner: args.owner,
            provider_url: args.provider_url,
            summary: args.summary,
            category: args.category,
            access: args.access,
        }
    }
}

fn print_record(record: &dyn Record, as_json: bool) -> Result<()> {
    if as_json {
        let blob = Value::Object(record.serialize()?);
        println!("{}", serde_json::to_string_pretty(&blob)?);
    } else {
        println!("{}", record.describe());
    }
    Ok(())
}

fn load_reports(path: &Path) -> Result<Vec<Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let reports: Vec<Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON list of reports", path.display()))?;
    Ok(reports)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feedmgr=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let transport = HttpTransport::new(&args.transport).context("Failed to set up HTTP client")?;
    let client = FeedClient::new(transport);
    tracing::debug!(server = %client.server(), "Connected");

    match args.command {
        Command::List { public } => {
            for feed in client.list_feeds(public).await? {
                print_record(&feed, args.json)?;
            }
        }
        Command::Show { feed_id } => {
            let feed = client.get_feed(&feed_id).await?;
            print_record(&feed, args.json)?;
            if !args.json {
                for report in feed.reports() {
                    print_record(report, false)?;
                }
            }
        }
        Command::Reports { feed_id } => {
            for report in client.feed_reports(&feed_id).await? {
                print_record(&report, args.json)?;
            }
        }
        Command::Create { info, reports } => {
            let reports = match reports {
                Some(path) => load_reports(&path)?,
                None => vec![],
            };
            let feedinfo = json!({
                "name": info.name,
                "owner": info.owner,
                "provider_url": info.provider_url,
                "summary": info.summary,
                "category": info.category,
                "access": info.access,
            });

            let created = client
                .create_feed(feedinfo, reports)
                .await
                .context("Failed to create feed")?;
            print_record(&created, args.json)?;
        }
        Command::Update { feed_id, changes } => {
            let changes = FeedInfoUpdate::from(changes);
            if changes.is_empty() {
                anyhow::bail!("Nothing to update");
            }

            let feed = client.get_feed(&feed_id).await?;
            let mut info = feed.feedinfo().clone();
            info.update(changes).await.context("Failed to update feed")?;
            print_record(&info, args.json)?;
        }
        Command::Delete { feed_id } => {
            client.delete_feed(&feed_id).await?;
        }
        Command::DeleteReport { feed_id, report_id } => {
            client.delete_report(&feed_id, &report_id).await?;
        }
    }

    Ok(())
}
