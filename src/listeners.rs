// src/listeners.rs
//
// Translates program-account-change streams into typed domain events. One
// mpsc channel per event kind; consumers must tolerate concurrent delivery
// and there is no ordering across subscriptions.

use anyhow::Result;
use futures::future::join_all;
use futures::{Future, StreamExt};
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::SniperError;
use crate::raydium::layout::{
    AmmPool, CpmmPoolState, LiquidityStateV4, MinimalMarket, CPMM_POOL_STATE_SIZE,
    LIQUIDITY_STATE_V4_SIZE, MARKET_QUOTE_MINT_OFFSET, MARKET_STATE_V3_SIZE,
    OPENBOOK_PROGRAM, POOL_MARKET_PROGRAM_ID_OFFSET, POOL_QUOTE_MINT_OFFSET, POOL_STATUS_OFFSET,
    POOL_STATUS_SWAP, RAYDIUM_AMM_V4_PROGRAM, RAYDIUM_CPMM_PROGRAM, TOKEN_ACCOUNT_OWNER_OFFSET,
    TOKEN_ACCOUNT_SIZE,
};
use crate::solana::endpoints::EndpointPool;

#[derive(Debug, Clone)]
pub struct PoolEvent {
    pub id: Pubkey,
    pub pool: AmmPool,
}

#[derive(Debug, Clone)]
pub struct MarketEvent {
    pub id: Pubkey,
    pub market: MinimalMarket,
}

#[derive(Debug, Clone)]
pub struct WalletEvent {
    pub account_id: Pubkey,
    pub token_account: spl_token::state::Account,
}

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub quote_mint: Pubkey,
    pub wallet_pubkey: Pubkey,
    pub cache_new_markets: bool,
    pub subscribe_cpmm: bool,
    pub auto_sell: bool,
}

/// Owns the subscription task handles. `start` can be called again with
/// `None` to resubscribe with the previous configuration (the coordinator
/// does this after a pause-on-sell).
pub struct Listeners {
    endpoint_pool: Arc<EndpointPool>,
    pool_tx: mpsc::Sender<PoolEvent>,
    market_tx: mpsc::Sender<MarketEvent>,
    wallet_tx: mpsc::Sender<WalletEvent>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
    last_config: Mutex<Option<ListenerConfig>>,
}

impl Listeners {
    pub fn new(
        endpoint_pool: Arc<EndpointPool>,
        pool_tx: mpsc::Sender<PoolEvent>,
        market_tx: mpsc::Sender<MarketEvent>,
        wallet_tx: mpsc::Sender<WalletEvent>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            endpoint_pool,
            pool_tx,
            market_tx,
            wallet_tx,
            handles: Mutex::new(Vec::new()),
            shutdown_tx,
            last_config: Mutex::new(None),
        }
    }

    pub async fn handle_count(&self) -> usize {
        self.handles.lock().await.len()
    }

    /// Establish the configured subscriptions. Passing `None` reuses the
    /// configuration of the previous `start`; calling while already started
    /// stops the current subscriptions first.
    pub async fn start(&self, config: Option<ListenerConfig>) -> Result<()> {
        if self.handle_count().await > 0 {
            self.stop().await;
        }

        let config = {
            let mut last = self.last_config.lock().await;
            let effective = config.or_else(|| last.clone()).ok_or_else(|| {
                SniperError::SubscriptionError("start(None) before any configured start".to_string())
            })?;
            *last = Some(effective.clone());
            effective
        };

        let ws_url = self.endpoint_pool.ws_url();
        let commitment = self.endpoint_pool.commitment();
        let mut handles = self.handles.lock().await;

        handles.push(self.spawn_pool_subscription(&config, &ws_url, commitment));
        if config.cache_new_markets {
            handles.push(self.spawn_market_subscription(&config, &ws_url, commitment));
        }
        if config.subscribe_cpmm {
            handles.push(self.spawn_cpmm_subscription(&config, &ws_url, commitment));
        }
        if config.auto_sell {
            handles.push(self.spawn_wallet_subscription(&config, &ws_url, commitment));
        }

        info!("📡 {} subscriptions started", handles.len());
        Ok(())
    }

    /// Signal every subscription task, wait for them in parallel and clear
    /// the handle set. Individual failures are logged and swallowed.
    pub async fn stop(&self) {
        let mut handles = self.handles.lock().await;
        if handles.is_empty() {
            return;
        }

        let _ = self.shutdown_tx.send(());
        let draining: Vec<JoinHandle<()>> = handles.drain(..).collect();
        for result in join_all(draining).await {
            if let Err(e) = result {
                error!("Subscription task failed to stop cleanly: {:?}", e);
            }
        }
        info!("Subscriptions stopped");
    }

    fn spawn_pool_subscription(
        &self,
        config: &ListenerConfig,
        ws_url: &str,
        commitment: CommitmentConfig,
    ) -> JoinHandle<()> {
        let filters = vec![
            RpcFilterType::DataSize(LIQUIDITY_STATE_V4_SIZE as u64),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                POOL_QUOTE_MINT_OFFSET,
                config.quote_mint.to_bytes().to_vec(),
            )),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                POOL_MARKET_PROGRAM_ID_OFFSET,
                OPENBOOK_PROGRAM.to_bytes().to_vec(),
            )),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                POOL_STATUS_OFFSET,
                POOL_STATUS_SWAP.to_vec(),
            )),
        ];

        let pool_tx = self.pool_tx.clone();
        tokio::spawn(run_program_subscription(
            "Pool",
            ws_url.to_string(),
            RAYDIUM_AMM_V4_PROGRAM,
            account_config(filters, commitment),
            self.shutdown_tx.subscribe(),
            move |id, data| {
                let pool_tx = pool_tx.clone();
                async move {
                    match LiquidityStateV4::decode(&data) {
                        Ok(state) => {
                            let event = PoolEvent {
                                id,
                                pool: AmmPool::from_v4(&state),
                            };
                            let _ = pool_tx.send(event).await;
                        }
                        Err(e) => warn!(pool = %id, "Undecodable pool account: {}", e),
                    }
                }
            },
        ))
    }

    fn spawn_market_subscription(
        &self,
        config: &ListenerConfig,
        ws_url: &str,
        commitment: CommitmentConfig,
    ) -> JoinHandle<()> {
        let filters = vec![
            RpcFilterType::DataSize(MARKET_STATE_V3_SIZE as u64),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                MARKET_QUOTE_MINT_OFFSET,
                config.quote_mint.to_bytes().to_vec(),
            )),
        ];

        let market_tx = self.market_tx.clone();
        tokio::spawn(run_program_subscription(
            "Market",
            ws_url.to_string(),
            OPENBOOK_PROGRAM,
            account_config(filters, commitment),
            self.shutdown_tx.subscribe(),
            move |id, data| {
                let market_tx = market_tx.clone();
                async move {
                    match MinimalMarket::decode(&data) {
                        Ok(market) => {
                            let _ = market_tx.send(MarketEvent { id, market }).await;
                        }
                        Err(e) => warn!(market = %id, "Undecodable market account: {}", e),
                    }
                }
            },
        ))
    }

    fn spawn_cpmm_subscription(
        &self,
        config: &ListenerConfig,
        ws_url: &str,
        commitment: CommitmentConfig,
    ) -> JoinHandle<()> {
        let filters = vec![RpcFilterType::DataSize(CPMM_POOL_STATE_SIZE as u64)];

        let pool_tx = self.pool_tx.clone();
        let quote_mint = config.quote_mint;
        tokio::spawn(run_program_subscription(
            "CPMM pool",
            ws_url.to_string(),
            RAYDIUM_CPMM_PROGRAM,
            account_config(filters, commitment),
            self.shutdown_tx.subscribe(),
            move |id, data| {
                let pool_tx = pool_tx.clone();
                async move {
                    match CpmmPoolState::decode(&data) {
                        Ok(state) => {
                            if state.token0_mint != quote_mint && state.token1_mint != quote_mint {
                                return;
                            }
                            let event = PoolEvent {
                                id,
                                pool: AmmPool::from_cpmm(&state, &quote_mint),
                            };
                            let _ = pool_tx.send(event).await;
                        }
                        Err(e) => warn!(pool = %id, "Undecodable CPMM account: {}", e),
                    }
                }
            },
        ))
    }

    fn spawn_wallet_subscription(
        &self,
        config: &ListenerConfig,
        ws_url: &str,
        commitment: CommitmentConfig,
    ) -> JoinHandle<()> {
        let filters = vec![
            RpcFilterType::DataSize(TOKEN_ACCOUNT_SIZE as u64),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                TOKEN_ACCOUNT_OWNER_OFFSET,
                config.wallet_pubkey.to_bytes().to_vec(),
            )),
        ];

        let wallet_tx = self.wallet_tx.clone();
        tokio::spawn(run_program_subscription(
            "Wallet",
            ws_url.to_string(),
            spl_token::id(),
            account_config(filters, commitment),
            self.shutdown_tx.subscribe(),
            move |account_id, data| {
                let wallet_tx = wallet_tx.clone();
                async move {
                    match spl_token::state::Account::unpack(&data) {
                        Ok(token_account) => {
                            let event = WalletEvent {
                                account_id,
                                token_account,
                            };
                            let _ = wallet_tx.send(event).await;
                        }
                        Err(e) => warn!(account = %account_id, "Undecodable token account: {}", e),
                    }
                }
            },
        ))
    }
}

fn account_config(
    filters: Vec<RpcFilterType>,
    commitment: CommitmentConfig,
) -> RpcProgramAccountsConfig {
    RpcProgramAccountsConfig {
        filters: Some(filters),
        account_config: RpcAccountInfoConfig {
            encoding: Some(UiAccountEncoding::Base64),
            commitment: Some(commitment),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// One subscription's lifetime: connect, subscribe, pump notifications into
/// the handler until the stream dies or shutdown is signalled, unsubscribe.
async fn run_program_subscription<F, Fut>(
    label: &'static str,
    ws_url: String,
    program: Pubkey,
    config: RpcProgramAccountsConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
    on_account: F,
) where
    F: Fn(Pubkey, Vec<u8>) -> Fut + Send,
    Fut: Future<Output = ()> + Send,
{
    let client = match PubsubClient::new(&ws_url).await {
        Ok(client) => client,
        Err(e) => {
            error!("{} subscription: websocket connect failed: {:?}", label, e);
            return;
        }
    };

    let (mut stream, unsubscribe) = match client.program_subscribe(&program, Some(config)).await {
        Ok(subscription) => subscription,
        Err(e) => {
            error!("{} subscription failed: {:?}", label, e);
            return;
        }
    };
    info!("✅ {} subscription established", label);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("{} subscription: shutdown requested", label);
                break;
            }
            update = stream.next() => match update {
                Some(response) => {
                    let keyed = response.value;
                    let Ok(pubkey) = Pubkey::from_str(&keyed.pubkey) else {
                        continue;
                    };
                    let account: Account = match keyed.account.decode() {
                        Some(account) => account,
                        None => {
                            warn!("{} subscription: undecodable account payload", label);
                            continue;
                        }
                    };
                    on_account(pubkey, account.data).await;
                }
                None => {
                    warn!("{} subscription: stream ended upstream", label);
                    break;
                }
            }
        }
    }

    unsubscribe().await;
    debug!("{} subscription closed", label);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listeners() -> Listeners {
        let pool = Arc::new(
            EndpointPool::new(
                vec!["https://rpc.example".to_string()],
                vec!["wss://ws.example".to_string()],
                CommitmentConfig::confirmed(),
            )
            .unwrap(),
        );
        let (pool_tx, _pool_rx) = mpsc::channel(8);
        let (market_tx, _market_rx) = mpsc::channel(8);
        let (wallet_tx, _wallet_rx) = mpsc::channel(8);
        Listeners::new(pool, pool_tx, market_tx, wallet_tx)
    }

    #[tokio::test]
    async fn test_stop_without_start_is_a_noop() {
        let listeners = listeners();
        listeners.stop().await;
        assert_eq!(listeners.handle_count().await, 0);
    }

    #[tokio::test]
    async fn test_start_none_without_prior_config_fails() {
        let listeners = listeners();
        assert!(listeners.start(None).await.is_err());
    }

    #[tokio::test]
    async fn test_stop_clears_handles() {
        let listeners = listeners();
        let config = ListenerConfig {
            quote_mint: Pubkey::new_unique(),
            wallet_pubkey: Pubkey::new_unique(),
            cache_new_markets: true,
            subscribe_cpmm: false,
            auto_sell: true,
        };
        // The dead websocket URL makes every task exit after its connect
        // attempt, but handles must be registered and then cleared.
        listeners.start(Some(config)).await.unwrap();
        assert_eq!(listeners.handle_count().await, 3);
        listeners.stop().await;
        assert_eq!(listeners.handle_count().await, 0);
    }
}
