use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::trace;

use crate::raydium::layout::AmmPool;

#[derive(Debug, Clone)]
pub struct CachedPool {
    pub id: Pubkey,
    pub state: AmmPool,
}

/// In-memory `base mint -> pool` store, populated from pool events. The sell
/// path looks pools up by the mint of the wallet token account that changed.
pub struct PoolCache {
    pools: RwLock<HashMap<Pubkey, CachedPool>>,
}

impl PoolCache {
    pub fn new() -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
        }
    }

    pub fn save(&self, id: Pubkey, state: AmmPool) {
        trace!(pool = %id, mint = %state.base_mint, "Caching pool");
        self.pools
            .write()
            .unwrap()
            .entry(state.base_mint)
            .or_insert(CachedPool { id, state });
    }

    pub fn get(&self, base_mint: &Pubkey) -> Option<CachedPool> {
        self.pools.read().unwrap().get(base_mint).cloned()
    }
}

impl Default for PoolCache {
    fn default() -> Self {
        Self::new()
    }
}
