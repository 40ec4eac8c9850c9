use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use nregalens::cache::CacheService;
use nregalens::config::Config;
use nregalens::data::DataService;
use nregalens::logger::{self, LogLevel, LogTag};
use nregalens::types::to_envelope;

/// MGNREGA district performance service
///
/// Loads the government CSV export (or deterministic fallback data), serves
/// the aggregated queries and demonstrates the cache path a routing layer
/// would use.
#[derive(Parser)]
#[command(name = "nregalens", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Force a reload pass of the CSV source before querying
    #[arg(long)]
    refresh: bool,

    /// Print performance for one district of the configured state
    #[arg(long)]
    district: Option<String>,

    /// Print comparative data for the configured state
    #[arg(long)]
    comparative: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;
    logger::init(LogLevel::parse(&config.general.log_level).unwrap_or(LogLevel::Info));
    logger::info(LogTag::System, "nregalens starting up");

    let cache = Arc::new(CacheService::new(&config.cache));
    let _sweeper = CacheService::start_sweeper(cache.clone(), config.cache.sweep_interval_secs);

    let data = DataService::new(&config.data);
    data.initialize().await;

    if args.refresh {
        let refreshed = data.refresh().await;
        logger::info(
            LogTag::Data,
            &format!(
                "Refresh complete: {} districts ({})",
                refreshed.district_count,
                refreshed.source.as_str()
            ),
        );
    }

    let status = data.file_status().await;
    println!("{}", serde_json::to_string_pretty(&status)?);

    let state = config.data.state_name.as_str();

    // District list goes through the cache, the same path the routing layer
    // takes for repeated requests.
    let districts_key = CacheService::cache_key(&["districts", state]);
    let districts = match cache.get_json::<serde_json::Value>(&districts_key).await {
        Some(hit) => {
            logger::debug(LogTag::Cache, "District list served from cache");
            hit
        }
        None => {
            let envelope = to_envelope(data.get_districts_for_state(state).await);
            cache.set_envelope(&districts_key, &envelope, None).await;
            envelope
        }
    };
    println!("{}", serde_json::to_string_pretty(&districts)?);

    if let Some(district) = &args.district {
        let perf_key = CacheService::cache_key(&["performance", state, district]);
        let performance = match cache.get_json::<serde_json::Value>(&perf_key).await {
            Some(hit) => {
                logger::debug(LogTag::Cache, "Performance served from cache");
                hit
            }
            None => {
                let envelope = to_envelope(data.get_district_performance(state, district).await);
                cache.set_envelope(&perf_key, &envelope, None).await;
                envelope
            }
        };
        println!("{}", serde_json::to_string_pretty(&performance)?);
    }

    if args.comparative {
        let comparative = to_envelope(data.get_comparative_data(state).await);
        println!("{}", serde_json::to_string_pretty(&comparative)?);
    }

    let stats = cache.stats().await;
    logger::info(
        LogTag::Cache,
        &format!(
            "Cache stats: {} items, {} pending expiries, ~{} bytes ({:?})",
            stats.total_items, stats.pending_expiries, stats.approx_bytes, stats.backend
        ),
    );

    Ok(())
}
