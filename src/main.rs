mod cache;
mod config;
mod grouping;
mod models;
mod pipeline;
mod render;
mod scraper;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cache::TtlCache;
use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::scraper::NaverScraper;

#[derive(Parser)]
#[command(name = "naver-hot100", about = "Naver Finance top-100 theme grouper", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline and print the grouped top-100
    Analyze {
        /// Emit the grouping as JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Print the ranked top-100 rising stocks only
    Top,

    /// Print the theme index (name, rate, detail URL)
    Themes,

    /// Re-run periodically, refreshing through the TTL cache
    Watch {
        /// Seconds between freshness checks
        #[arg(short, long, default_value_t = 5)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "naver_hot100=info,warn",
        1 => "naver_hot100=debug,info",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    let source = Arc::new(NaverScraper::new(&config.scraper).context("Failed to build scraper")?);

    match cli.command {
        Command::Analyze { json } => {
            let _t = utils::Timer::start("Theme analysis");
            let pipeline = Pipeline::new(config, source);
            let analysis = pipeline.run().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&analysis.grouping.groups)?);
            } else {
                render::print_grouping(&analysis.grouping);
            }
        }

        Command::Top => {
            let _t = utils::Timer::start("Top-100 ranking");
            let pipeline = Pipeline::new(config, source);
            let (top, failed) = pipeline.rank_top().await;
            if failed > 0 {
                warn!("{} segment(s) unreachable — list may be partial", failed);
            }
            render::print_top(&top);
        }

        Command::Themes => {
            let _t = utils::Timer::start("Theme listing");
            let pipeline = Pipeline::new(config, source);
            let stubs = pipeline.list_themes().await;
            render::print_themes(&stubs);
        }

        Command::Watch { interval } => {
            let ttl = Duration::from_secs(config.cache.ttl_secs);
            let pipeline = Pipeline::new(config, source);
            let mut cached = TtlCache::new(ttl);

            info!("Watching (refresh every {:?}, poll every {}s)", ttl, interval);

            loop {
                if cached.get().is_none() {
                    match pipeline.run().await {
                        Ok(analysis) => {
                            render::print_grouping(&analysis.grouping);
                            cached.put(analysis);
                        }
                        Err(e) => {
                            // Show one generic failure, keep the loop alive.
                            warn!("Analysis failed: {:#}", e);
                        }
                    }
                }
                tokio::time::sleep(Duration::from_secs(interval)).await;
            }
        }
    }

    Ok(())
}
