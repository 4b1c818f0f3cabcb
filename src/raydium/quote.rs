// Constant-product quoting against live vault reserves. The swap itself is
// executed by the on-chain program; this only sizes the minimum-out bound.

use anyhow::{Context, Result};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::program_pack::Pack;
use spl_token::state::Account as TokenAccount;

use crate::error::SniperError;
use crate::raydium::pool_keys::PoolKeys;

/// AMM v4 swap fee: 25 bps.
const FEE_NUMERATOR: u128 = 25;
const FEE_DENOMINATOR: u128 = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct PoolReserves {
    pub base: u64,
    pub quote: u64,
}

/// Fetch both vault balances in one round trip.
pub async fn fetch_reserves(rpc: &RpcClient, keys: &PoolKeys) -> Result<PoolReserves> {
    let accounts = rpc
        .get_multiple_accounts(&[keys.base_vault, keys.quote_vault])
        .await
        .context("Failed to fetch pool vaults")?;

    let mut amounts = [0u64; 2];
    for (i, account) in accounts.iter().enumerate() {
        let account = account
            .as_ref()
            .ok_or_else(|| SniperError::DecodeError("Pool vault account missing".to_string()))?;
        let token_account = TokenAccount::unpack(&account.data)
            .map_err(|e| SniperError::DecodeError(format!("Failed to unpack vault: {}", e)))?;
        amounts[i] = token_account.amount;
    }

    Ok(PoolReserves {
        base: amounts[0],
        quote: amounts[1],
    })
}

/// Expected output of a fixed-input swap after the pool fee.
pub fn compute_amount_out(reserve_in: u64, reserve_out: u64, amount_in: u64) -> u64 {
    if reserve_in == 0 || reserve_out == 0 || amount_in == 0 {
        return 0;
    }
    let amount_in_with_fee =
        amount_in as u128 * (FEE_DENOMINATOR - FEE_NUMERATOR) / FEE_DENOMINATOR;
    let numerator = reserve_out as u128 * amount_in_with_fee;
    let denominator = reserve_in as u128 + amount_in_with_fee;
    (numerator / denominator) as u64
}

/// Haircut an expected output by the slippage tolerance in percent.
pub fn apply_slippage(amount_out: u64, slippage_percent: u64) -> u64 {
    let slippage = slippage_percent.min(100);
    (amount_out as u128 * (100 - slippage) as u128 / 100) as u64
}

/// Minimum acceptable output for `amount_in` against the given reserves.
pub fn minimum_amount_out(
    reserves: &PoolReserves,
    amount_in: u64,
    slippage_percent: u64,
    quote_to_base: bool,
) -> u64 {
    let (reserve_in, reserve_out) = if quote_to_base {
        (reserves.quote, reserves.base)
    } else {
        (reserves.base, reserves.quote)
    };
    apply_slippage(
        compute_amount_out(reserve_in, reserve_out, amount_in),
        slippage_percent,
    )
}
