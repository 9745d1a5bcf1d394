//! Zine CLI
//!
//! Command-line driver for the reader:
//! - Install posts into the store
//! - List posts, optionally filtered by tag, date, text or person
//! - Show the archive and the about page
//! - Check status

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zine::config::{generate_default_config, Config, LoggingConfig};
use zine::ingest::{self, Ingestor};
use zine::query::{ArchiveEntry, PostFilter, Reader};
use zine::store::{Document, DocumentStore, SqliteStore};

#[derive(Parser)]
#[command(name = "zine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Self-hosted reader for a folder of plain-text posts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load posts into the store (skipped when already installed)
    Install,

    /// List posts, oldest first unless filtered
    Posts {
        /// Comma-separated tags
        #[arg(long)]
        tag: Option<String>,
        /// Comma-separated days (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Comma-separated words
        #[arg(long)]
        text: Option<String>,
        /// Comma-separated people
        #[arg(long)]
        person: Option<String>,
    },

    /// Post counts for every day from the first post to the last
    Archive,

    /// Show the about page
    About,

    /// Show store and index status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("Failed to write config to {:?}", path))?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);

    tracing::debug!("Zine v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(
        SqliteStore::open(config.store.store_config())
            .await
            .with_context(|| format!("Failed to open store at {}", config.store.data_dir))?,
    );
    let source = ingest::from_config(&config.posts).context("Failed to set up post source")?;
    let ingestor = Ingestor::new(store.clone(), source);
    let reader = Reader::new(store.clone()).with_policy(config.query.retry_policy());
    let json = cli.format == "json";

    match cli.command {
        Commands::Install => {
            let ready = ingestor.run().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&ready)?);
            } else {
                println!("{:?}", ready.outcome);
            }
        }

        Commands::Posts {
            tag,
            date,
            text,
            person,
        } => {
            let params: HashMap<String, String> = [
                ("tag", tag),
                ("date", date),
                ("text", text),
                ("person", person),
            ]
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
            .collect();
            let filter = PostFilter::from_params(&params);

            let (_, posts) = tokio::join!(ingestor.run(), reader.get_posts(filter.as_ref()));
            let posts = posts.context("Posts are not available")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&posts)?);
            } else {
                print_posts(&posts);
            }
        }

        Commands::Archive => {
            let (_, archive) = tokio::join!(ingestor.run(), reader.get_archive());
            let archive = archive.context("Archive is not available")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&archive)?);
            } else {
                print_archive(&archive);
            }
        }

        Commands::About => {
            let (_, about) = tokio::join!(ingestor.run(), reader.get_about());
            let about = about.context("About page is not available")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&about)?);
            } else {
                println!("{}", about.text.as_deref().unwrap_or_default());
            }
        }

        Commands::Status => {
            let info = store.info().await?;
            let stats = store.index_stats().await?;

            if json {
                let status = serde_json::json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "data_dir": store.data_dir(),
                    "store": info,
                    "index": stats,
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Zine v{}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Store: {:?}", store.data_dir());
                println!("  Documents: {}", info.doc_count);
                println!("  Update seq: {}", info.update_seq);
                println!();
                if stats.design_installed {
                    println!("{:<10} {:>12} {:>10}", "Index", "Indexed seq", "Rows");
                    println!("{}", "-".repeat(34));
                    for view in &stats.views {
                        println!(
                            "{:<10} {:>12} {:>10}",
                            view.view.name(),
                            view.indexed_seq,
                            view.rows
                        );
                    }
                } else {
                    println!("Indexes not installed. Run `zine install`.");
                }
            }
        }

        // written out before the store is opened
        Commands::Config { .. } => {}
    }

    store.shutdown().await?;
    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("zine={}", logging.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_posts(posts: &[Document]) {
    if posts.is_empty() {
        println!("No posts");
        return;
    }

    println!("{:<20} {:<24} {}", "Date", "Id", "Tags");
    println!("{}", "-".repeat(60));
    for post in posts {
        println!(
            "{:<20} {:<24} {}",
            post.datetime.as_deref().unwrap_or("-"),
            post.id,
            post.tags.join(", ")
        );
    }
}

fn print_archive(archive: &[ArchiveEntry]) {
    if archive.is_empty() {
        println!("No posts");
        return;
    }

    for entry in archive {
        println!("{}  {:>3} {}", entry.date, entry.count, "#".repeat(entry.count as usize));
    }
}
