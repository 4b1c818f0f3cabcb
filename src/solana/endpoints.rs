use rand::Rng;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::SniperError;

/// Public endpoint used when every configured endpoint has been exhausted.
const FALLBACK_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
const FALLBACK_WS_URL: &str = "wss://api.mainnet-beta.solana.com";

#[derive(Clone)]
pub struct Endpoint {
    pub rpc_url: String,
    pub ws_url: String,
    pub client: Arc<RpcClient>,
}

impl Endpoint {
    fn new(rpc_url: String, ws_url: String, commitment: CommitmentConfig) -> Self {
        let client = Arc::new(RpcClient::new_with_commitment(rpc_url.clone(), commitment));
        Self {
            rpc_url,
            ws_url,
            client,
        }
    }
}

struct PoolState {
    endpoints: Vec<Endpoint>,
    current: usize,
}

/// Holds the configured RPC/WS endpoint pairs and the index of the most
/// recently selected one. Never fails over on a caller's behalf; callers
/// invoke `refresh()` after a failed submission.
pub struct EndpointPool {
    state: RwLock<PoolState>,
    commitment: CommitmentConfig,
}

impl EndpointPool {
    pub fn from_config(config: &Config) -> Result<Self, SniperError> {
        Self::new(
            config.rpc_endpoints.clone(),
            config.ws_endpoints.clone(),
            config.commitment,
        )
    }

    pub fn new(
        rpc_urls: Vec<String>,
        ws_urls: Vec<String>,
        commitment: CommitmentConfig,
    ) -> Result<Self, SniperError> {
        if rpc_urls.is_empty() {
            return Err(SniperError::ConfigError(
                "At least one RPC endpoint is required".to_string(),
            ));
        }
        if rpc_urls.len() != ws_urls.len() {
            return Err(SniperError::ConfigError(format!(
                "Endpoint count mismatch: {} RPC vs {} WS",
                rpc_urls.len(),
                ws_urls.len()
            )));
        }

        let endpoints = rpc_urls
            .into_iter()
            .zip(ws_urls)
            .map(|(rpc, ws)| Endpoint::new(rpc, ws, commitment))
            .collect();

        Ok(Self {
            state: RwLock::new(PoolState {
                endpoints,
                current: 0,
            }),
            commitment,
        })
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }

    /// The current selection's RPC client.
    pub fn connection(&self) -> Arc<RpcClient> {
        let state = self.state.read().unwrap();
        state.endpoints[state.current].client.clone()
    }

    /// The current selection's websocket URL.
    pub fn ws_url(&self) -> String {
        let state = self.state.read().unwrap();
        state.endpoints[state.current].ws_url.clone()
    }

    pub fn endpoint_count(&self) -> usize {
        self.state.read().unwrap().endpoints.len()
    }

    pub fn current_index(&self) -> usize {
        self.state.read().unwrap().current
    }

    /// Pick a uniformly random endpoint different from the last-used one
    /// (the sole endpoint when the pool has one entry). Returns the new index.
    pub fn refresh(&self) -> usize {
        let mut state = self.state.write().unwrap();
        if state.endpoints.len() == 1 {
            return state.current;
        }

        let mut rng = rand::thread_rng();
        let next = loop {
            let candidate = rng.gen_range(0..state.endpoints.len());
            if candidate != state.current {
                break candidate;
            }
        };
        debug!(
            "Switching RPC endpoint {} -> {} ({})",
            state.current, next, state.endpoints[next].rpc_url
        );
        state.current = next;
        next
    }

    /// Replace the current selection with the hard-coded public endpoint.
    pub fn fallback(&self) {
        warn!(
            "Falling back to public endpoint {} - expect rate limits",
            FALLBACK_RPC_URL
        );
        let mut state = self.state.write().unwrap();
        let current = state.current;
        state.endpoints[current] = Endpoint::new(
            FALLBACK_RPC_URL.to_string(),
            FALLBACK_WS_URL.to_string(),
            self.commitment,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(n: usize) -> EndpointPool {
        let rpc = (0..n).map(|i| format!("https://rpc{}.example", i)).collect();
        let ws = (0..n).map(|i| format!("wss://ws{}.example", i)).collect();
        EndpointPool::new(rpc, ws, CommitmentConfig::confirmed()).unwrap()
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let result = EndpointPool::new(
            vec!["https://a.example".to_string()],
            vec![],
            CommitmentConfig::confirmed(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_refresh_never_repeats_previous_index() {
        let pool = pool_of(3);
        let mut previous = pool.current_index();
        for _ in 0..50 {
            let next = pool.refresh();
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn test_refresh_single_endpoint_keeps_selection() {
        let pool = pool_of(1);
        assert_eq!(pool.refresh(), 0);
        assert_eq!(pool.current_index(), 0);
    }

    #[test]
    fn test_fallback_replaces_current_entry() {
        let pool = pool_of(2);
        pool.fallback();
        assert_eq!(pool.ws_url(), FALLBACK_WS_URL);
        assert_eq!(pool.endpoint_count(), 2);
    }
}
