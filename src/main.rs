use anyhow::{Context, Result};
use dotenv::dotenv;
use solana_sdk::program_pack::Pack;
use solana_sdk::signer::Signer;
use spl_token::state::Mint;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod bot;
mod cache;
mod config;
mod error;
mod executor;
mod filters;
mod listeners;
mod raydium;
mod solana;

use crate::bot::Bot;
use crate::cache::{AvoidListCache, MarketCache, PoolCache, SnipeListCache};
use crate::config::Config;
use crate::error::SniperError;
use crate::executor::build_executor;
use crate::filters::PoolFilterEngine;
use crate::listeners::{ListenerConfig, Listeners};
use crate::solana::endpoints::EndpointPool;
use crate::solana::wallet::load_keypair;

const EVENT_CHANNEL_CAPACITY: usize = 256;

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|raw| raw.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load environment variables
    dotenv().ok();

    let config = Arc::new(Config::load()?);
    info!("Configuration loaded successfully");

    let wallet = Arc::new(load_keypair(&config.wallet_secret)?);
    let endpoint_pool = Arc::new(EndpointPool::from_config(&config)?);

    // Reach the chain once before subscribing to anything.
    let rpc = endpoint_pool.connection();
    rpc.get_latest_blockhash()
        .await
        .context("Failed to reach the RPC endpoint")?;
    info!(
        "Connected ({} endpoint(s) configured)",
        endpoint_pool.endpoint_count()
    );

    let quote_mint_account = rpc
        .get_account(&config.quote_mint)
        .await
        .context("Failed to fetch the quote mint")?;
    let quote_decimals = Mint::unpack(&quote_mint_account.data)
        .map_err(|e| SniperError::ConfigError(format!("QUOTE_MINT is not a mint account: {}", e)))?
        .decimals;

    let snipe_list = Arc::new(SnipeListCache::new(&config.snipe_list_path));
    if config.use_snipe_list {
        snipe_list.init().await?;
        if snipe_list.is_empty() {
            warn!("Snipe list is enabled but empty; no buys will trigger");
        }
    }
    let avoid_list = Arc::new(AvoidListCache::new(&config.avoid_list_path));
    if config.use_avoid_list {
        avoid_list.init().await?;
    }

    let market_cache = Arc::new(MarketCache::new(endpoint_pool.clone()));
    let pool_cache = Arc::new(PoolCache::new());
    let executor = build_executor(&config, endpoint_pool.clone())?;
    let filter_engine = PoolFilterEngine::from_config(endpoint_pool.clone(), &config);

    let bot = Arc::new(Bot::new(
        endpoint_pool.clone(),
        wallet.clone(),
        executor,
        filter_engine,
        snipe_list,
        avoid_list,
        market_cache.clone(),
        pool_cache.clone(),
        config.clone(),
        quote_decimals,
    ));
    bot.validate().await?;

    let (pool_tx, mut pool_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (market_tx, mut market_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (wallet_tx, mut wallet_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let listeners = Arc::new(Listeners::new(
        endpoint_pool.clone(),
        pool_tx,
        market_tx,
        wallet_tx,
    ));
    listeners
        .start(Some(ListenerConfig {
            quote_mint: config.quote_mint,
            wallet_pubkey: wallet.pubkey(),
            cache_new_markets: config.cache_new_markets,
            subscribe_cpmm: config.is_devnet(),
            auto_sell: config.auto_sell,
        }))
        .await?;

    // Market events only feed the cache.
    {
        let market_cache = market_cache.clone();
        tokio::spawn(async move {
            while let Some(event) = market_rx.recv().await {
                market_cache.save(event.id, event.market);
            }
        });
    }

    // Pool events feed the cache and the buy path. The stream fires on every
    // pool account change, so only pools that are new to the cache and opened
    // after startup trigger a buy. Each buy gets its own task; serialization,
    // when requested, happens inside the coordinator.
    {
        let bot = bot.clone();
        let pool_cache = pool_cache.clone();
        let listeners = listeners.clone();
        let run_timestamp = unix_timestamp();
        tokio::spawn(async move {
            while let Some(event) = pool_rx.recv().await {
                if pool_cache.get(&event.pool.base_mint).is_some()
                    || event.pool.open_time <= run_timestamp
                {
                    continue;
                }
                pool_cache.save(event.id, event.pool.clone());
                let bot = bot.clone();
                let listeners = listeners.clone();
                tokio::spawn(async move {
                    bot.buy(event.id, event.pool, &listeners).await;
                });
            }
        });
    }

    // Wallet events feed the sell path, except changes to the quote token
    // account itself (every trade touches it).
    {
        let bot = bot.clone();
        let listeners = listeners.clone();
        let quote_mint = config.quote_mint;
        tokio::spawn(async move {
            while let Some(event) = wallet_rx.recv().await {
                if event.token_account.mint == quote_mint {
                    continue;
                }
                let bot = bot.clone();
                let listeners = listeners.clone();
                tokio::spawn(async move {
                    bot.sell(event.account_id, event.token_account, &listeners).await;
                });
            }
        });
    }

    info!("Wallet: {}", wallet.pubkey());
    info!(
        "Quote: {} ({} per buy, {} decimals)",
        config.quote_mint, config.quote_amount, quote_decimals
    );
    info!(
        "Executor: {:?} | one token at a time: {}",
        config.executor_mode, config.one_token_at_a_time
    );
    info!(
        "Filters: burned={} renounced={} freezable={} pump.fun={} pool size=[{}, {}]",
        config.check_burned,
        config.check_renounced,
        config.check_freezable,
        config.check_from_pump_fun,
        config.min_pool_size,
        config.max_pool_size
    );
    info!("🚀 Sniper is running. Press CTRL+C to stop.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping listeners...");
    listeners.stop().await;

    Ok(())
}
