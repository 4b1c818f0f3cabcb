use async_trait::async_trait;
use std::sync::Arc;

use crate::filters::{FilterResult, PoolFilter};
use crate::raydium::pool_keys::PoolKeys;
use crate::solana::endpoints::EndpointPool;

/// Passes when the LP mint supply is zero, i.e. the creator burnt the
/// liquidity tokens and cannot pull the pool.
pub struct BurnFilter {
    endpoint_pool: Arc<EndpointPool>,
}

impl BurnFilter {
    pub fn new(endpoint_pool: Arc<EndpointPool>) -> Self {
        Self { endpoint_pool }
    }
}

#[async_trait]
impl PoolFilter for BurnFilter {
    async fn execute(&self, pool_keys: &PoolKeys) -> FilterResult {
        match self
            .endpoint_pool
            .connection()
            .get_token_supply(&pool_keys.lp_mint)
            .await
        {
            Ok(supply) => {
                let burned = supply.amount == "0" || supply.ui_amount.unwrap_or(0.0) == 0.0;
                if burned {
                    FilterResult::pass()
                } else {
                    FilterResult::fail("Burned -> LP supply is not zero")
                }
            }
            Err(e) => FilterResult::fail(format!("Burned -> Failed to fetch LP supply: {}", e)),
        }
    }
}
