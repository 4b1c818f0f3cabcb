use async_trait::async_trait;
use solana_sdk::program_pack::Pack;
use spl_token::state::Mint;
use std::sync::Arc;

use crate::filters::{FilterResult, PoolFilter};
use crate::raydium::pool_keys::PoolKeys;
use crate::solana::endpoints::EndpointPool;

async fn fetch_mint(endpoint_pool: &EndpointPool, pool_keys: &PoolKeys) -> Result<Mint, String> {
    let account = endpoint_pool
        .connection()
        .get_account(&pool_keys.base_mint)
        .await
        .map_err(|e| format!("Failed to fetch mint account: {}", e))?;
    Mint::unpack(&account.data).map_err(|e| format!("Failed to unpack mint account: {}", e))
}

/// Passes when the base mint's mint authority has been renounced, so no new
/// supply can be printed over holders.
pub struct RenouncedFilter {
    endpoint_pool: Arc<EndpointPool>,
}

impl RenouncedFilter {
    pub fn new(endpoint_pool: Arc<EndpointPool>) -> Self {
        Self { endpoint_pool }
    }
}

#[async_trait]
impl PoolFilter for RenouncedFilter {
    async fn execute(&self, pool_keys: &PoolKeys) -> FilterResult {
        match fetch_mint(&self.endpoint_pool, pool_keys).await {
            Ok(mint) => {
                if mint.mint_authority.is_none() {
                    FilterResult::pass()
                } else {
                    FilterResult::fail("Renounced -> Creator can still mint new tokens")
                }
            }
            Err(e) => FilterResult::fail(format!("Renounced -> {}", e)),
        }
    }
}

/// Passes when the base mint has no freeze authority, so holder accounts
/// cannot be frozen out of selling.
pub struct FreezableFilter {
    endpoint_pool: Arc<EndpointPool>,
}

impl FreezableFilter {
    pub fn new(endpoint_pool: Arc<EndpointPool>) -> Self {
        Self { endpoint_pool }
    }
}

#[async_trait]
impl PoolFilter for FreezableFilter {
    async fn execute(&self, pool_keys: &PoolKeys) -> FilterResult {
        match fetch_mint(&self.endpoint_pool, pool_keys).await {
            Ok(mint) => {
                if mint.freeze_authority.is_none() {
                    FilterResult::pass()
                } else {
                    FilterResult::fail("Freezable -> Creator can freeze token accounts")
                }
            }
            Err(e) => FilterResult::fail(format!("Freezable -> {}", e)),
        }
    }
}
