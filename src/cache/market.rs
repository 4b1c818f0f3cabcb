use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::trace;

use crate::raydium::layout::MinimalMarket;
use crate::solana::endpoints::EndpointPool;

/// In-memory `market id -> minimal market` store. Entries arrive either from
/// the market subscription or lazily from an on-chain fetch on first use.
pub struct MarketCache {
    endpoint_pool: Arc<EndpointPool>,
    markets: RwLock<HashMap<Pubkey, MinimalMarket>>,
}

impl MarketCache {
    pub fn new(endpoint_pool: Arc<EndpointPool>) -> Self {
        Self {
            endpoint_pool,
            markets: RwLock::new(HashMap::new()),
        }
    }

    pub fn save(&self, id: Pubkey, market: MinimalMarket) {
        trace!(market = %id, "Caching market");
        self.markets.write().unwrap().insert(id, market);
    }

    /// Cached market, falling back to a direct account fetch on a miss.
    pub async fn get(&self, id: &Pubkey) -> Result<MinimalMarket> {
        if let Some(market) = self.markets.read().unwrap().get(id).copied() {
            return Ok(market);
        }

        trace!(market = %id, "Market cache miss, fetching");
        let account = self
            .endpoint_pool
            .connection()
            .get_account(id)
            .await
            .with_context(|| format!("Failed to fetch market {}", id))?;
        let market = MinimalMarket::decode(&account.data)?;
        self.save(*id, market);
        Ok(market)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::commitment_config::CommitmentConfig;

    fn cache() -> MarketCache {
        let pool = EndpointPool::new(
            vec!["https://rpc.example".to_string()],
            vec!["wss://ws.example".to_string()],
            CommitmentConfig::confirmed(),
        )
        .unwrap();
        MarketCache::new(Arc::new(pool))
    }

    #[tokio::test]
    async fn test_save_then_get_skips_fetch() {
        let cache = cache();
        let id = Pubkey::new_unique();
        let market = MinimalMarket {
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            event_queue: Pubkey::new_unique(),
            bids: Pubkey::new_unique(),
            asks: Pubkey::new_unique(),
        };
        cache.save(id, market);
        // The endpoint is a dead URL, so a hit proves no fetch happened.
        assert_eq!(cache.get(&id).await.unwrap(), market);
    }
}
