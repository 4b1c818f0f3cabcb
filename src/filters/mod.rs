pub mod authority;
pub mod burn;
pub mod pool_size;
pub mod pump_fun;

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::raydium::pool_keys::PoolKeys;
use crate::solana::endpoints::EndpointPool;

use authority::{FreezableFilter, RenouncedFilter};
use burn::BurnFilter;
use pool_size::PoolSizeFilter;
use pump_fun::PumpFunFilter;

#[derive(Debug, Clone)]
pub struct FilterResult {
    pub ok: bool,
    pub message: Option<String>,
}

impl FilterResult {
    pub fn pass() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }
}

/// One independent eligibility check against a candidate pool. A failed
/// fetch inside a filter is reported as a failed check, never an error.
#[async_trait]
pub trait PoolFilter: Send + Sync {
    async fn execute(&self, pool_keys: &PoolKeys) -> FilterResult;
}

/// Runs every configured filter in parallel and ANDs the verdicts.
pub struct PoolFilterEngine {
    filters: Vec<Box<dyn PoolFilter>>,
}

impl PoolFilterEngine {
    pub fn new(filters: Vec<Box<dyn PoolFilter>>) -> Self {
        Self { filters }
    }

    pub fn from_config(endpoint_pool: Arc<EndpointPool>, config: &Config) -> Self {
        let mut filters: Vec<Box<dyn PoolFilter>> = Vec::new();
        if config.check_burned {
            filters.push(Box::new(BurnFilter::new(endpoint_pool.clone())));
        }
        if config.check_renounced {
            filters.push(Box::new(RenouncedFilter::new(endpoint_pool.clone())));
        }
        if config.check_freezable {
            filters.push(Box::new(FreezableFilter::new(endpoint_pool.clone())));
        }
        if config.min_pool_size > 0.0 || config.max_pool_size > 0.0 {
            filters.push(Box::new(PoolSizeFilter::new(
                endpoint_pool.clone(),
                config.min_pool_size,
                config.max_pool_size,
            )));
        }
        if config.check_from_pump_fun {
            filters.push(Box::new(PumpFunFilter::new(endpoint_pool)));
        }
        Self { filters }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// True iff every filter passed. An empty engine passes without any
    /// on-chain calls.
    pub async fn execute(&self, pool_keys: &PoolKeys) -> bool {
        if self.filters.is_empty() {
            return true;
        }

        let results = join_all(self.filters.iter().map(|f| f.execute(pool_keys))).await;
        let mut ok = true;
        for result in results {
            if !result.ok {
                ok = false;
                if let Some(message) = result.message {
                    info!(mint = %pool_keys.base_mint, "{}", message);
                }
            }
        }
        ok
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::raydium::layout::OPENBOOK_PROGRAM;
    use crate::raydium::pool_keys::amm_authority;
    use solana_sdk::pubkey::Pubkey;

    pub fn sample_pool_keys() -> PoolKeys {
        PoolKeys {
            id: Pubkey::new_unique(),
            base_mint: Pubkey::new_unique(),
            quote_mint: Pubkey::new_unique(),
            base_decimals: 9,
            quote_decimals: 9,
            lp_mint: Pubkey::new_unique(),
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            authority: amm_authority(),
            open_orders: Pubkey::new_unique(),
            target_orders: Pubkey::new_unique(),
            market_program_id: OPENBOOK_PROGRAM,
            market_id: Pubkey::new_unique(),
            market_bids: Pubkey::new_unique(),
            market_asks: Pubkey::new_unique(),
            market_event_queue: Pubkey::new_unique(),
            market_base_vault: Pubkey::new_unique(),
            market_quote_vault: Pubkey::new_unique(),
            market_authority: Pubkey::new_unique(),
        }
    }
}
