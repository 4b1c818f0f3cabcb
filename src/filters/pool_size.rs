use async_trait::async_trait;
use std::sync::Arc;

use crate::filters::{FilterResult, PoolFilter};
use crate::raydium::pool_keys::PoolKeys;
use crate::solana::endpoints::EndpointPool;

/// Bounds the quote vault balance to [min, max] in quote-asset units.
/// A bound of zero disables that side of the range.
pub struct PoolSizeFilter {
    endpoint_pool: Arc<EndpointPool>,
    min_pool_size: f64,
    max_pool_size: f64,
}

impl PoolSizeFilter {
    pub fn new(endpoint_pool: Arc<EndpointPool>, min_pool_size: f64, max_pool_size: f64) -> Self {
        Self {
            endpoint_pool,
            min_pool_size,
            max_pool_size,
        }
    }

    fn check(&self, size: f64) -> FilterResult {
        if self.max_pool_size > 0.0 && size > self.max_pool_size {
            return FilterResult::fail(format!(
                "PoolSize -> Pool size {:.2} above {:.2}",
                size, self.max_pool_size
            ));
        }
        if self.min_pool_size > 0.0 && size < self.min_pool_size {
            return FilterResult::fail(format!(
                "PoolSize -> Pool size {:.2} below {:.2}",
                size, self.min_pool_size
            ));
        }
        FilterResult::pass()
    }
}

#[async_trait]
impl PoolFilter for PoolSizeFilter {
    async fn execute(&self, pool_keys: &PoolKeys) -> FilterResult {
        match self
            .endpoint_pool
            .connection()
            .get_token_account_balance(&pool_keys.quote_vault)
            .await
        {
            Ok(balance) => self.check(balance.ui_amount.unwrap_or(0.0)),
            Err(e) => {
                FilterResult::fail(format!("PoolSize -> Failed to fetch quote vault: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::commitment_config::CommitmentConfig;

    fn filter(min: f64, max: f64) -> PoolSizeFilter {
        let pool = EndpointPool::new(
            vec!["https://rpc.example".to_string()],
            vec!["wss://ws.example".to_string()],
            CommitmentConfig::confirmed(),
        )
        .unwrap();
        PoolSizeFilter::new(Arc::new(pool), min, max)
    }

    #[test]
    fn test_range_check() {
        let f = filter(5.0, 50.0);
        assert!(f.check(5.0).ok);
        assert!(f.check(50.0).ok);
        assert!(!f.check(4.9).ok);
        assert!(!f.check(50.1).ok);
    }

    #[test]
    fn test_zero_bounds_disable_sides() {
        assert!(filter(0.0, 50.0).check(0.1).ok);
        assert!(filter(5.0, 0.0).check(1_000_000.0).ok);
    }
}
