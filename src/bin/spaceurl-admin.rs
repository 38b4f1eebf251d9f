use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spaceurl::analytics::AnalyticsAggregator;
use spaceurl::config::Config;
use spaceurl::service::LinkService;
use spaceurl::storage;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "spaceurl-admin")]
#[command(about = "Spaceurl link management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shorten a URL
    Shorten {
        /// Destination URL (http or https)
        url: String,
        /// Custom alias to use instead of a generated code
        #[arg(long)]
        alias: Option<String>,
        /// Owner account id
        #[arg(long)]
        owner: Option<String>,
    },
    /// List the links of an owner, newest first
    List {
        /// Owner account id
        #[arg(long)]
        owner: String,
    },
    /// Show aggregated analytics for a link
    Stats {
        /// Link id
        link_id: String,
        /// Number of countries to show
        #[arg(long, default_value_t = 3)]
        top: usize,
    },
    /// Remove a link
    Remove {
        /// Link id
        link_id: String,
        /// Owner account id; must match the link's owner
        #[arg(long)]
        owner: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage = storage::connect(&config.database).await?;
    // Management commands never record visits
    let aggregator = Arc::new(AnalyticsAggregator::new(Arc::clone(&storage)));
    let service = LinkService::new(
        storage,
        aggregator,
        None,
        config.links.public_base_url.clone(),
    );

    match cli.command {
        Commands::Shorten { url, alias, owner } => {
            let created = service
                .shorten(&url, alias.as_deref(), owner.as_deref())
                .await
                .context("failed to shorten URL")?;
            println!("✓ {} -> {}", created.short_url, created.link.original_url);
            println!("  id: {}", created.link.id);
        }
        Commands::List { owner } => {
            let links = service.list_for_owner(&owner).await?;
            if links.is_empty() {
                println!("No links found for '{}'.", owner);
            } else {
                println!("{:<38} {:<34} {:>8} {}", "ID", "Code", "Clicks", "URL");
                println!("{}", "-".repeat(100));
                for link in links {
                    println!(
                        "{:<38} {:<34} {:>8} {}",
                        link.id, link.short_code, link.click_count, link.original_url
                    );
                }
            }
        }
        Commands::Stats { link_id, top } => {
            let stats = service.aggregate(&link_id).await?;
            println!("Total visits: {}", stats.total());
            println!(
                "Most common browser: {}",
                stats.most_common_browser().unwrap_or_else(|| "-".to_string())
            );
            println!(
                "Most common device: {}",
                stats.most_common_device().unwrap_or_else(|| "-".to_string())
            );
            println!("Top countries:");
            for (country, count) in stats.top_countries(top) {
                println!("  {:<30} {}", country, count);
            }
        }
        Commands::Remove { link_id, owner } => {
            service.remove(&link_id, Some(&owner)).await?;
            println!("✓ Removed link '{}'", link_id);
        }
    }

    Ok(())
}
