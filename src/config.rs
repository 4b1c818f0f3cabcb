use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::env;
use std::str::FromStr;

use crate::error::SniperError;

/// Which transaction executor submits trades.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum ExecutorMode {
    Default,
    Warp,
    Bundle,
}

impl FromStr for ExecutorMode {
    type Err = SniperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "warp" => Ok(Self::Warp),
            "bundle" => Ok(Self::Bundle),
            other => Err(SniperError::ConfigError(format!(
                "Unknown executor mode '{}', expected default|warp|bundle",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub rpc_endpoints: Vec<String>,
    pub ws_endpoints: Vec<String>,
    pub commitment: CommitmentConfig,
    pub network: String,
    pub wallet_secret: String,

    pub quote_mint: Pubkey,
    pub quote_amount: f64,

    pub min_pool_size: f64,
    pub max_pool_size: f64,
    pub check_renounced: bool,
    pub check_freezable: bool,
    pub check_burned: bool,
    pub check_from_pump_fun: bool,

    pub use_snipe_list: bool,
    pub use_avoid_list: bool,
    pub snipe_list_path: String,
    pub avoid_list_path: String,

    pub auto_sell: bool,
    pub auto_buy_delay_ms: u64,
    pub auto_sell_delay_ms: u64,
    pub max_buy_retries: u32,
    pub max_sell_retries: u32,

    pub unit_limit: u32,
    pub unit_price: u64,

    pub take_profit: u64,
    pub stop_loss: u64,
    pub buy_slippage: u64,
    pub sell_slippage: u64,
    pub price_check_interval_ms: u64,
    pub price_check_duration_ms: u64,

    pub filter_check_interval_ms: u64,
    pub filter_check_duration_ms: u64,
    pub consecutive_filter_matches: u32,

    pub one_token_at_a_time: bool,
    pub cache_new_markets: bool,
    pub executor_mode: ExecutorMode,
    pub warp_fee_wallet: Option<Pubkey>,
}

/// Split a pipe-delimited endpoint list into trimmed, non-empty URLs.
pub fn split_endpoints(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub fn parse_commitment(raw: &str) -> Result<CommitmentConfig, SniperError> {
    match raw.to_lowercase().as_str() {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        other => Err(SniperError::ConfigError(format!(
            "Invalid commitment level '{}', expected processed|confirmed|finalized",
            other
        ))),
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(default)
}

fn env_parse<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("Failed to parse {}='{}': {}", key, raw, e))
}

impl Config {
    pub fn load() -> Result<Self> {
        let rpc_endpoints = split_endpoints(
            &env::var("RPC_ENDPOINTS").context("RPC_ENDPOINTS not set in environment")?,
        );
        let ws_endpoints = split_endpoints(
            &env::var("WS_ENDPOINTS").context("WS_ENDPOINTS not set in environment")?,
        );
        if rpc_endpoints.is_empty() {
            return Err(SniperError::ConfigError("RPC_ENDPOINTS is empty".to_string()).into());
        }
        if rpc_endpoints.len() != ws_endpoints.len() {
            return Err(SniperError::ConfigError(format!(
                "Endpoint count mismatch: {} RPC vs {} WS",
                rpc_endpoints.len(),
                ws_endpoints.len()
            ))
            .into());
        }

        let commitment = parse_commitment(
            &env::var("COMMITMENT_LEVEL").unwrap_or_else(|_| "confirmed".to_string()),
        )?;

        let quote_mint = env::var("QUOTE_MINT")
            .context("QUOTE_MINT not set in environment")?
            .parse::<Pubkey>()
            .map_err(|e| SniperError::ConfigError(format!("Invalid QUOTE_MINT: {}", e)))?;

        Ok(Self {
            rpc_endpoints,
            ws_endpoints,
            commitment,
            network: env::var("NETWORK").unwrap_or_else(|_| "mainnet".to_string()),
            wallet_secret: env::var("WALLET_SECRET")
                .context("WALLET_SECRET not set in environment")?,

            quote_mint,
            quote_amount: env_parse("QUOTE_AMOUNT", "0.01")?,

            min_pool_size: env_parse("MIN_POOL_SIZE", "0")?,
            max_pool_size: env_parse("MAX_POOL_SIZE", "0")?,
            check_renounced: env_bool("CHECK_IF_MINT_IS_RENOUNCED", false),
            check_freezable: env_bool("CHECK_IF_FREEZABLE", false),
            check_burned: env_bool("CHECK_IF_BURNED", false),
            check_from_pump_fun: env_bool("CHECK_IF_FROM_PUMP_FUN", false),

            use_snipe_list: env_bool("USE_SNIPE_LIST", false),
            use_avoid_list: env_bool("USE_AVOID_LIST", false),
            snipe_list_path: env::var("SNIPE_LIST_PATH")
                .unwrap_or_else(|_| "snipe-list.txt".to_string()),
            avoid_list_path: env::var("AVOID_LIST_PATH")
                .unwrap_or_else(|_| "avoid-list.txt".to_string()),

            auto_sell: env_bool("AUTO_SELL", true),
            auto_buy_delay_ms: env_parse("AUTO_BUY_DELAY", "0")?,
            auto_sell_delay_ms: env_parse("AUTO_SELL_DELAY", "0")?,
            max_buy_retries: env_parse("MAX_BUY_RETRIES", "5")?,
            max_sell_retries: env_parse("MAX_SELL_RETRIES", "5")?,

            unit_limit: env_parse("COMPUTE_UNIT_LIMIT", "101337")?,
            unit_price: env_parse("COMPUTE_UNIT_PRICE", "421197")?,

            take_profit: env_parse("TAKE_PROFIT", "40")?,
            stop_loss: env_parse("STOP_LOSS", "20")?,
            buy_slippage: env_parse("BUY_SLIPPAGE", "10")?,
            sell_slippage: env_parse("SELL_SLIPPAGE", "10")?,
            price_check_interval_ms: env_parse("PRICE_CHECK_INTERVAL", "2000")?,
            price_check_duration_ms: env_parse("PRICE_CHECK_DURATION", "60000")?,

            filter_check_interval_ms: env_parse("FILTER_CHECK_INTERVAL", "2000")?,
            filter_check_duration_ms: env_parse("FILTER_CHECK_DURATION", "60000")?,
            consecutive_filter_matches: env_parse("CONSECUTIVE_FILTER_MATCHES", "3")?,

            one_token_at_a_time: env_bool("ONE_TOKEN_AT_A_TIME", true),
            cache_new_markets: env_bool("CACHE_NEW_MARKETS", false),
            executor_mode: env::var("TRANSACTION_EXECUTOR")
                .unwrap_or_else(|_| "default".to_string())
                .parse()?,
            warp_fee_wallet: match env::var("WARP_FEE_WALLET") {
                Ok(raw) => Some(raw.parse::<Pubkey>().map_err(|e| {
                    SniperError::ConfigError(format!("Invalid WARP_FEE_WALLET: {}", e))
                })?),
                Err(_) => None,
            },
        })
    }

    pub fn is_devnet(&self) -> bool {
        self.network.to_lowercase() == "devnet"
    }
}
