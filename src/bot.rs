// src/bot.rs
//
// The trade coordinator. Serializes buys and sells when one_token_at_a_time
// is set, pauses listeners while a sell is in flight, drives the filter and
// price loops and hands finished transactions to the configured executor.

use anyhow::{Context, Result};
use futures::Future;
use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use spl_token::state::Account as TokenAccount;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

use crate::cache::{AvoidListCache, MarketCache, PoolCache, SnipeListCache};
use crate::config::Config;
use crate::error::SniperError;
use crate::executor::{RecentBlockhash, SubmissionResult, TransactionExecutor};
use crate::filters::PoolFilterEngine;
use crate::listeners::Listeners;
use crate::raydium::layout::AmmPool;
use crate::raydium::pool_keys::{create_pool_keys, PoolKeys};
use crate::raydium::{instruction, quote};
use crate::solana::endpoints::EndpointPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TradeDirection {
    Buy,
    Sell,
}

pub struct Bot {
    endpoint_pool: Arc<EndpointPool>,
    wallet: Arc<Keypair>,
    executor: Arc<dyn TransactionExecutor>,
    filter_engine: PoolFilterEngine,
    snipe_list: Arc<SnipeListCache>,
    avoid_list: Arc<AvoidListCache>,
    market_cache: Arc<MarketCache>,
    pool_cache: Arc<PoolCache>,
    config: Arc<Config>,

    /// Trade mutex for one_token_at_a_time mode. Held across network I/O
    /// during a buy.
    mutex: Mutex<()>,
    /// Number of sells currently in flight. Read by the buy path to decide
    /// whether to stand down.
    sell_executions: AtomicUsize,

    quote_ata: Pubkey,
    quote_amount_raw: u64,
}

#[allow(clippy::too_many_arguments)]
impl Bot {
    pub fn new(
        endpoint_pool: Arc<EndpointPool>,
        wallet: Arc<Keypair>,
        executor: Arc<dyn TransactionExecutor>,
        filter_engine: PoolFilterEngine,
        snipe_list: Arc<SnipeListCache>,
        avoid_list: Arc<AvoidListCache>,
        market_cache: Arc<MarketCache>,
        pool_cache: Arc<PoolCache>,
        config: Arc<Config>,
        quote_decimals: u8,
    ) -> Self {
        let quote_ata = get_associated_token_address(&wallet.pubkey(), &config.quote_mint);
        let quote_amount_raw = to_raw_amount(config.quote_amount, quote_decimals);
        Self {
            endpoint_pool,
            wallet,
            executor,
            filter_engine,
            snipe_list,
            avoid_list,
            market_cache,
            pool_cache,
            config,
            mutex: Mutex::new(()),
            sell_executions: AtomicUsize::new(0),
            quote_ata,
            quote_amount_raw,
        }
    }

    /// The quote token account must exist before trading; its balance funds
    /// every buy.
    pub async fn validate(&self) -> Result<()> {
        self.endpoint_pool
            .connection()
            .get_account(&self.quote_ata)
            .await
            .map_err(|e| {
                SniperError::ConfigError(format!(
                    "Quote token account {} does not exist ({}); create and fund it first",
                    self.quote_ata, e
                ))
            })?;
        Ok(())
    }

    fn sell_execution_count(&self) -> usize {
        self.sell_executions.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Buy path
    // ------------------------------------------------------------------

    pub async fn buy(&self, pool_id: Pubkey, pool: AmmPool, listeners: &Listeners) {
        trace!(mint = %pool.base_mint, pool = %pool_id, "New pool event");
        let mint = pool.base_mint.to_string();

        if self.config.use_snipe_list && !self.snipe_list.is_in_list(&mint) {
            trace!(mint = %mint, "Skipping buy: token not in snipe list");
            return;
        }
        if self.config.use_avoid_list && self.avoid_list.is_in_list(&mint) {
            debug!(mint = %mint, "Skipping buy: token is on the avoid list");
            return;
        }

        if self.config.auto_buy_delay_ms > 0 {
            debug!(mint = %mint, "Waiting {}ms before buy", self.config.auto_buy_delay_ms);
            sleep(Duration::from_millis(self.config.auto_buy_delay_ms)).await;
        }

        let mut stopped_listeners = false;
        let _guard = if self.config.one_token_at_a_time {
            if self.sell_execution_count() > 0 {
                debug!(mint = %mint, "Sell in flight, pausing listeners");
                listeners.stop().await;
                stopped_listeners = true;
            }

            // A held mutex or an in-flight sell means another trade owns the
            // wallet; the sell's own finally block restarts the listeners.
            match self.mutex.try_lock() {
                Ok(guard) if self.sell_execution_count() == 0 => Some(guard),
                _ => {
                    debug!(mint = %mint, "Skipping buy: another trade is in progress");
                    return;
                }
            }
        } else {
            None
        };

        if let Err(e) = self.try_buy(pool_id, &pool).await {
            error!(mint = %mint, error = ?e, "Failed to buy token");
        }

        if stopped_listeners {
            if let Err(e) = listeners.start(None).await {
                error!("Failed to restart listeners after buy: {:?}", e);
            }
        }
    }

    async fn try_buy(&self, pool_id: Pubkey, pool: &AmmPool) -> Result<()> {
        let Some(market_ref) = pool.market else {
            debug!(mint = %pool.base_mint, "Skipping constant-product pool without market");
            return Ok(());
        };

        let market = self
            .market_cache
            .get(&market_ref.id)
            .await
            .context("Market lookup failed")?;
        let base_ata = get_associated_token_address(&self.wallet.pubkey(), &pool.base_mint);
        let pool_keys = create_pool_keys(pool_id, pool, &market)?;

        if !self.config.use_snipe_list && !self.filter_match(&pool_keys).await {
            debug!(mint = %pool.base_mint, "Skipping buy: pool did not pass filters");
            return Ok(());
        }

        let mint = pool.base_mint.to_string();
        for attempt in 0..self.config.max_buy_retries {
            debug!(
                mint = %mint,
                "Send buy transaction attempt {}/{}",
                attempt + 1,
                self.config.max_buy_retries
            );
            match self
                .swap(
                    &pool_keys,
                    &self.quote_ata,
                    &base_ata,
                    &pool.base_mint,
                    self.quote_amount_raw,
                    self.config.buy_slippage,
                    TradeDirection::Buy,
                )
                .await
            {
                Ok(None) => break,
                Ok(Some(result)) if result.confirmed => {
                    let signature = result.signature.unwrap_or_default();
                    info!(
                        mint = %mint,
                        signature = %signature,
                        url = %explorer_url(&signature),
                        "✅ Confirmed buy"
                    );
                    break;
                }
                Ok(Some(result)) => {
                    info!(
                        mint = %mint,
                        signature = ?result.signature,
                        error = ?result.error,
                        "Buy not confirmed"
                    );
                }
                Err(e) => {
                    error!(mint = %mint, error = ?e, "Buy attempt failed");
                    self.endpoint_pool.refresh();
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sell path
    // ------------------------------------------------------------------

    pub async fn sell(&self, account_id: Pubkey, token_account: TokenAccount, listeners: &Listeners) {
        let mut stopped_listeners = false;
        if self.config.one_token_at_a_time {
            self.sell_executions.fetch_add(1, Ordering::SeqCst);
            listeners.stop().await;
            stopped_listeners = true;
        }

        if let Err(e) = self.try_sell(account_id, &token_account).await {
            error!(mint = %token_account.mint, error = ?e, "Failed to sell token");
        }

        if self.config.one_token_at_a_time {
            self.sell_executions.fetch_sub(1, Ordering::SeqCst);
        }
        if stopped_listeners {
            if let Err(e) = listeners.start(None).await {
                error!("Failed to restart listeners after sell: {:?}", e);
            }
        }
    }

    async fn try_sell(&self, account_id: Pubkey, token_account: &TokenAccount) -> Result<()> {
        let mint = token_account.mint.to_string();

        let Some(cached) = self.pool_cache.get(&token_account.mint) else {
            trace!(mint = %mint, "No cached pool for wallet change, ignoring");
            return Ok(());
        };

        let amount_in = token_account.amount;
        if amount_in == 0 {
            debug!(mint = %mint, "Empty balance, nothing to sell");
            return Ok(());
        }

        if self.config.auto_sell_delay_ms > 0 {
            debug!(mint = %mint, "Waiting {}ms before sell", self.config.auto_sell_delay_ms);
            sleep(Duration::from_millis(self.config.auto_sell_delay_ms)).await;
        }

        let market_ref = cached
            .state
            .market
            .ok_or_else(|| SniperError::MarketNotFound(mint.clone()))?;
        let market = self
            .market_cache
            .get(&market_ref.id)
            .await
            .context("Market lookup failed")?;
        let pool_keys = create_pool_keys(cached.id, &cached.state, &market)?;

        self.price_match(amount_in, &pool_keys).await;

        let mut sold = false;
        for attempt in 0..self.config.max_sell_retries {
            debug!(
                mint = %mint,
                "Send sell transaction attempt {}/{}",
                attempt + 1,
                self.config.max_sell_retries
            );
            match self
                .swap(
                    &pool_keys,
                    &account_id,
                    &self.quote_ata,
                    &pool_keys.quote_mint,
                    amount_in,
                    self.config.sell_slippage,
                    TradeDirection::Sell,
                )
                .await
            {
                Ok(None) => break,
                Ok(Some(result)) if result.confirmed => {
                    let signature = result.signature.unwrap_or_default();
                    info!(
                        mint = %mint,
                        signature = %signature,
                        url = %explorer_url(&signature),
                        "✅ Confirmed sell"
                    );
                    sold = true;
                    break;
                }
                Ok(Some(result)) => {
                    info!(
                        mint = %mint,
                        signature = ?result.signature,
                        error = ?result.error,
                        "Sell not confirmed"
                    );
                }
                Err(e) => {
                    error!(mint = %mint, error = ?e, "Sell attempt failed");
                    self.endpoint_pool.refresh();
                }
            }
        }

        // A token that cannot be sold is not worth buying again.
        if !sold && self.config.use_avoid_list {
            if let Err(e) = self.avoid_list.add(&mint, Some("failed to sell")).await {
                error!(mint = %mint, "Failed to extend avoid list: {:?}", e);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Swap helper
    // ------------------------------------------------------------------

    /// Quote the minimum output against live reserves, build and sign the
    /// swap transaction and hand it to the executor. Returns `None` without
    /// submitting when the computed output is zero.
    async fn swap(
        &self,
        pool_keys: &PoolKeys,
        ata_in: &Pubkey,
        ata_out: &Pubkey,
        mint_out: &Pubkey,
        amount_in: u64,
        slippage_percent: u64,
        direction: TradeDirection,
    ) -> Result<Option<SubmissionResult>> {
        let rpc = self.endpoint_pool.connection();

        let reserves = quote::fetch_reserves(&rpc, pool_keys).await?;
        let minimum_out = quote::minimum_amount_out(
            &reserves,
            amount_in,
            slippage_percent,
            direction == TradeDirection::Buy,
        );
        if minimum_out == 0 {
            warn!(mint = %pool_keys.base_mint, "Computed minimum output is zero, aborting trade");
            return Ok(None);
        }

        let (hash, last_valid_block_height) = rpc
            .get_latest_blockhash_with_commitment(self.endpoint_pool.commitment())
            .await
            .context("Failed to fetch blockhash")?;
        let blockhash = RecentBlockhash {
            hash,
            last_valid_block_height,
        };

        let owner = self.wallet.pubkey();
        let mut instructions: Vec<Instruction> = Vec::new();
        if !self.executor.provides_compute_budget() {
            instructions.push(ComputeBudgetInstruction::set_compute_unit_price(
                self.config.unit_price,
            ));
            instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(
                self.config.unit_limit,
            ));
        }
        if direction == TradeDirection::Buy {
            instructions.push(create_associated_token_account_idempotent(
                &owner,
                &owner,
                mint_out,
                &spl_token::id(),
            ));
        }
        instructions.push(instruction::swap_base_in(
            pool_keys,
            ata_in,
            ata_out,
            &owner,
            amount_in,
            minimum_out,
        ));
        if direction == TradeDirection::Sell {
            // Reclaim the rent of the emptied base token account.
            instructions.push(
                spl_token::instruction::close_account(&spl_token::id(), ata_in, &owner, &owner, &[])
                    .map_err(|e| {
                        SniperError::TransactionError(format!("Close account build failed: {}", e))
                    })?,
            );
        }

        let message = v0::Message::try_compile(&owner, &instructions, &[], hash)
            .map_err(|e| SniperError::TransactionError(format!("Compile failed: {}", e)))?;
        let transaction =
            VersionedTransaction::try_new(VersionedMessage::V0(message), &[self.wallet.as_ref()])
                .map_err(|e| SniperError::TransactionError(format!("Signing failed: {}", e)))?;

        let result = self
            .executor
            .execute_and_confirm(&transaction, &self.wallet, &blockhash)
            .await?;
        Ok(Some(result))
    }

    // ------------------------------------------------------------------
    // Filter window & price watcher
    // ------------------------------------------------------------------

    /// Poll the filter engine until `consecutive_filter_matches` successive
    /// passes or the window closes. Zero knobs bypass the engine entirely.
    async fn filter_match(&self, pool_keys: &PoolKeys) -> bool {
        if self.config.filter_check_interval_ms == 0 || self.config.filter_check_duration_ms == 0 {
            return true;
        }

        let max_iterations =
            self.config.filter_check_duration_ms / self.config.filter_check_interval_ms;
        poll_consecutive_matches(
            max_iterations,
            Duration::from_millis(self.config.filter_check_interval_ms),
            self.config.consecutive_filter_matches,
            || self.filter_engine.execute(pool_keys),
        )
        .await
    }

    /// Block until the quoted proceeds cross take-profit or stop-loss, or
    /// the poll window closes. The caller sells unconditionally afterwards.
    async fn price_match(&self, amount_in: u64, pool_keys: &PoolKeys) {
        if self.config.price_check_duration_ms == 0 || self.config.price_check_interval_ms == 0 {
            return;
        }

        let max_iterations =
            self.config.price_check_duration_ms / self.config.price_check_interval_ms;
        let (take_profit, stop_loss) = exit_targets(
            self.quote_amount_raw,
            self.config.take_profit,
            self.config.stop_loss,
        );

        let mut iteration = 0u64;
        while iteration < max_iterations {
            match quote::fetch_reserves(&self.endpoint_pool.connection(), pool_keys).await {
                Ok(reserves) => {
                    let amount_out = quote::minimum_amount_out(
                        &reserves,
                        amount_in,
                        self.config.sell_slippage,
                        false,
                    );
                    debug!(
                        mint = %pool_keys.base_mint,
                        amount_out,
                        take_profit,
                        stop_loss,
                        "Price check {}/{}",
                        iteration + 1,
                        max_iterations
                    );
                    if amount_out < stop_loss {
                        info!(mint = %pool_keys.base_mint, "Stop loss triggered");
                        break;
                    }
                    if amount_out > take_profit {
                        info!(mint = %pool_keys.base_mint, "Take profit triggered");
                        break;
                    }
                }
                Err(e) => debug!(mint = %pool_keys.base_mint, "Price check failed: {:?}", e),
            }

            iteration += 1;
            sleep(Duration::from_millis(self.config.price_check_interval_ms)).await;
        }
    }
}

/// Run `check` up to `max_iterations` times, returning true once it passes
/// `required` times in a row. Any failure resets the streak.
pub(crate) async fn poll_consecutive_matches<F, Fut>(
    max_iterations: u64,
    interval: Duration,
    required: u32,
    mut check: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let mut consecutive = 0u32;
    for iteration in 0..max_iterations {
        if check().await {
            consecutive += 1;
            if consecutive >= required {
                return true;
            }
        } else {
            consecutive = 0;
        }
        if iteration + 1 < max_iterations {
            sleep(interval).await;
        }
    }
    false
}

/// TP/SL thresholds in raw quote units.
pub(crate) fn exit_targets(
    quote_amount: u64,
    take_profit_percent: u64,
    stop_loss_percent: u64,
) -> (u64, u64) {
    let gain = (quote_amount as u128 * take_profit_percent as u128 / 100) as u64;
    let loss = (quote_amount as u128 * stop_loss_percent.min(100) as u128 / 100) as u64;
    (quote_amount + gain, quote_amount - loss)
}

pub(crate) fn to_raw_amount(ui_amount: f64, decimals: u8) -> u64 {
    (ui_amount * 10f64.powi(decimals as i32)).round() as u64
}

fn explorer_url(signature: &str) -> String {
    format!("https://solscan.io/tx/{}", signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_single_match_wins_when_one_required() {
        let hit = poll_consecutive_matches(10, Duration::from_millis(1), 1, || async { true }).await;
        assert!(hit);
    }

    #[tokio::test]
    async fn test_streak_resets_on_failure() {
        // pass, pass, fail, pass, pass, pass -> needs three in a row, so the
        // early streak must not count.
        let outcomes = [true, true, false, true, true, true];
        let index = Cell::new(0usize);
        let hit = poll_consecutive_matches(outcomes.len() as u64, Duration::from_millis(1), 3, || {
            let i = index.get();
            index.set(i + 1);
            async move { outcomes[i] }
        })
        .await;
        assert!(hit);
        assert_eq!(index.get(), 6);
    }

    #[tokio::test]
    async fn test_window_exhaustion_fails() {
        let outcomes = [true, false, true, false];
        let index = Cell::new(0usize);
        let hit = poll_consecutive_matches(outcomes.len() as u64, Duration::from_millis(1), 2, || {
            let i = index.get();
            index.set(i + 1);
            async move { outcomes[i] }
        })
        .await;
        assert!(!hit);
    }

    #[tokio::test]
    async fn test_zero_iterations_never_checks() {
        let hit = poll_consecutive_matches(0, Duration::from_millis(1), 1, || async {
            panic!("check must not run")
        })
        .await;
        assert!(!hit);
    }

    #[test]
    fn test_exit_targets() {
        // 1.0 quote at 9 decimals, +50% / -20%.
        let quote = to_raw_amount(1.0, 9);
        let (tp, sl) = exit_targets(quote, 50, 20);
        assert_eq!(tp, 1_500_000_000);
        assert_eq!(sl, 800_000_000);

        // An output of 1.6 quote crosses take profit, 0.79 crosses stop loss.
        assert!(to_raw_amount(1.6, 9) > tp);
        assert!(to_raw_amount(0.79, 9) < sl);
    }

    #[test]
    fn test_exit_targets_clamp_stop_loss() {
        let (_, sl) = exit_targets(1_000, 0, 500);
        assert_eq!(sl, 0);
    }

    #[test]
    fn test_to_raw_amount() {
        assert_eq!(to_raw_amount(0.01, 9), 10_000_000);
        assert_eq!(to_raw_amount(2.5, 6), 2_500_000);
        assert_eq!(to_raw_amount(0.0, 9), 0);
    }
}
