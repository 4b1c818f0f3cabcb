// src/raydium/layout.rs
//
// On-chain account layouts for the Raydium AMM v4 pool, the OpenBook market
// (minimal view) and the Raydium constant-product (CPMM) pool, plus the
// normalized pool descriptor the rest of the bot works with.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

use crate::error::SniperError;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Raydium AMM v4 (liquidity pool) program
pub const RAYDIUM_AMM_V4_PROGRAM: Pubkey = pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8");

/// OpenBook (Serum v3 fork) order-book program
pub const OPENBOOK_PROGRAM: Pubkey = pubkey!("srmqPvymJeFKQ4zGQed1GFppgkRHL9kaELCbyksJtv8");

/// Raydium constant-product (CPMM, no order book) program
pub const RAYDIUM_CPMM_PROGRAM: Pubkey = pubkey!("CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C");

/// Byte length of an AMM v4 pool state account
pub const LIQUIDITY_STATE_V4_SIZE: usize = 752;

/// Byte length of an OpenBook market state account
pub const MARKET_STATE_V3_SIZE: usize = 388;

/// Byte length of a CPMM pool state account (8-byte discriminator included)
pub const CPMM_POOL_STATE_SIZE: usize = 637;

/// Byte length of an SPL token account
pub const TOKEN_ACCOUNT_SIZE: usize = 165;

// Memcmp offsets used by the subscription filters.
pub const POOL_STATUS_OFFSET: usize = 0;
pub const POOL_QUOTE_MINT_OFFSET: usize = 432;
pub const POOL_MARKET_PROGRAM_ID_OFFSET: usize = 560;
pub const MARKET_QUOTE_MINT_OFFSET: usize = 85;
pub const TOKEN_ACCOUNT_OWNER_OFFSET: usize = 32;

/// Status prefix of a pool that has been initialized for swapping.
pub const POOL_STATUS_SWAP: [u8; 8] = [6, 0, 0, 0, 0, 0, 0, 0];

// OpenBook market field offsets (5-byte "serum" header included).
const MARKET_BASE_VAULT_OFFSET: usize = 117;
const MARKET_QUOTE_VAULT_OFFSET: usize = 165;
const MARKET_EVENT_QUEUE_OFFSET: usize = 253;
const MARKET_BIDS_OFFSET: usize = 285;
const MARKET_ASKS_OFFSET: usize = 317;

// ============================================================================
// AMM V4 POOL STATE
// ============================================================================

/// The full AMM v4 pool state. Field order matches the on-chain layout, so
/// borsh deserialization of the raw 752 bytes yields the struct directly.
#[derive(BorshDeserialize, BorshSerialize, Debug, Clone)]
pub struct LiquidityStateV4 {
    pub status: u64,
    pub nonce: u64,
    pub max_order: u64,
    pub depth: u64,
    pub base_decimal: u64,
    pub quote_decimal: u64,
    pub state: u64,
    pub reset_flag: u64,
    pub min_size: u64,
    pub vol_max_cut_ratio: u64,
    pub amount_wave_ratio: u64,
    pub base_lot_size: u64,
    pub quote_lot_size: u64,
    pub min_price_multiplier: u64,
    pub max_price_multiplier: u64,
    pub system_decimal_value: u64,
    pub min_separate_numerator: u64,
    pub min_separate_denominator: u64,
    pub trade_fee_numerator: u64,
    pub trade_fee_denominator: u64,
    pub pnl_numerator: u64,
    pub pnl_denominator: u64,
    pub swap_fee_numerator: u64,
    pub swap_fee_denominator: u64,
    pub base_need_take_pnl: u64,
    pub quote_need_take_pnl: u64,
    pub quote_total_pnl: u64,
    pub base_total_pnl: u64,
    pub pool_open_time: u64,
    pub punish_pc_amount: u64,
    pub punish_coin_amount: u64,
    pub orderbook_to_init_time: u64,
    pub swap_base_in_amount: u128,
    pub swap_quote_out_amount: u128,
    pub swap_base_to_quote_fee: u64,
    pub swap_quote_in_amount: u128,
    pub swap_base_out_amount: u128,
    pub swap_quote_to_base_fee: u64,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub open_orders: Pubkey,
    pub market_id: Pubkey,
    pub market_program_id: Pubkey,
    pub target_orders: Pubkey,
    pub withdraw_queue: Pubkey,
    pub lp_vault: Pubkey,
    pub owner: Pubkey,
    pub lp_reserve: u64,
    pub padding: [u64; 3],
}

impl LiquidityStateV4 {
    pub fn decode(data: &[u8]) -> Result<Self, SniperError> {
        if data.len() != LIQUIDITY_STATE_V4_SIZE {
            return Err(SniperError::DecodeError(format!(
                "Pool state length {} != {}",
                data.len(),
                LIQUIDITY_STATE_V4_SIZE
            )));
        }
        Self::try_from_slice(data)
            .map_err(|e| SniperError::DecodeError(format!("Pool state decode failed: {}", e)))
    }
}

// ============================================================================
// OPENBOOK MARKET (MINIMAL VIEW)
// ============================================================================

/// The slice of the OpenBook market state the swap instruction needs. The
/// market keeps its own base/quote vaults, distinct from the pool's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinimalMarket {
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub event_queue: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
}

impl MinimalMarket {
    pub fn decode(data: &[u8]) -> Result<Self, SniperError> {
        if data.len() != MARKET_STATE_V3_SIZE {
            return Err(SniperError::DecodeError(format!(
                "Market state length {} != {}",
                data.len(),
                MARKET_STATE_V3_SIZE
            )));
        }
        Ok(Self {
            base_vault: read_pubkey(data, MARKET_BASE_VAULT_OFFSET)?,
            quote_vault: read_pubkey(data, MARKET_QUOTE_VAULT_OFFSET)?,
            event_queue: read_pubkey(data, MARKET_EVENT_QUEUE_OFFSET)?,
            bids: read_pubkey(data, MARKET_BIDS_OFFSET)?,
            asks: read_pubkey(data, MARKET_ASKS_OFFSET)?,
        })
    }
}

fn read_pubkey(data: &[u8], offset: usize) -> Result<Pubkey, SniperError> {
    data.get(offset..offset + 32)
        .and_then(|s| Pubkey::try_from(s).ok())
        .ok_or_else(|| SniperError::DecodeError(format!("Pubkey read at offset {}", offset)))
}

// ============================================================================
// CPMM POOL STATE
// ============================================================================

/// Raydium constant-product pool state, after the 8-byte discriminator.
#[derive(BorshDeserialize, BorshSerialize, Debug, Clone)]
pub struct CpmmPoolState {
    pub amm_config: Pubkey,
    pub pool_creator: Pubkey,
    pub token0_vault: Pubkey,
    pub token1_vault: Pubkey,
    pub lp_mint: Pubkey,
    pub token0_mint: Pubkey,
    pub token1_mint: Pubkey,
    pub token0_program: Pubkey,
    pub token1_program: Pubkey,
    pub observation_key: Pubkey,
    pub auth_bump: u8,
    pub status: u8,
    pub lp_mint_decimals: u8,
    pub mint0_decimals: u8,
    pub mint1_decimals: u8,
    pub lp_supply: u64,
    pub protocol_fees_token0: u64,
    pub protocol_fees_token1: u64,
    pub fund_fees_token0: u64,
    pub fund_fees_token1: u64,
    pub open_time: u64,
    pub padding: [u64; 32],
}

impl CpmmPoolState {
    /// Skip the discriminator before deserializing.
    pub fn decode(data: &[u8]) -> Result<Self, SniperError> {
        if data.len() != CPMM_POOL_STATE_SIZE {
            return Err(SniperError::DecodeError(format!(
                "CPMM pool state length {} != {}",
                data.len(),
                CPMM_POOL_STATE_SIZE
            )));
        }
        let mut body = &data[8..];
        BorshDeserialize::deserialize(&mut body)
            .map_err(|e| SniperError::DecodeError(format!("CPMM pool state decode failed: {}", e)))
    }
}

// ============================================================================
// NORMALIZED POOL DESCRIPTOR
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Classical,
    ConstantProduct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketRef {
    pub id: Pubkey,
    pub program_id: Pubkey,
}

/// Pool descriptor normalized across the classical and constant-product
/// layouts. Classical pools carry a market reference, CPMM pools never do.
#[derive(Debug, Clone)]
pub struct AmmPool {
    pub kind: PoolKind,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub lp_mint: Pubkey,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub market: Option<MarketRef>,
    pub open_time: u64,
}

impl AmmPool {
    pub fn from_v4(state: &LiquidityStateV4) -> Self {
        Self {
            kind: PoolKind::Classical,
            base_mint: state.base_mint,
            quote_mint: state.quote_mint,
            base_decimals: state.base_decimal as u8,
            quote_decimals: state.quote_decimal as u8,
            base_vault: state.base_vault,
            quote_vault: state.quote_vault,
            lp_mint: state.lp_mint,
            open_orders: state.open_orders,
            target_orders: state.target_orders,
            market: Some(MarketRef {
                id: state.market_id,
                program_id: state.market_program_id,
            }),
            open_time: state.pool_open_time,
        }
    }

    /// Normalize a CPMM pool so that the configured quote asset lands on the
    /// quote side regardless of the on-chain token ordering.
    pub fn from_cpmm(state: &CpmmPoolState, quote_mint: &Pubkey) -> Self {
        let quote_is_token0 = state.token0_mint == *quote_mint;
        let (base_mint, quote_mint, base_vault, quote_vault, base_decimals, quote_decimals) =
            if quote_is_token0 {
                (
                    state.token1_mint,
                    state.token0_mint,
                    state.token1_vault,
                    state.token0_vault,
                    state.mint1_decimals,
                    state.mint0_decimals,
                )
            } else {
                (
                    state.token0_mint,
                    state.token1_mint,
                    state.token0_vault,
                    state.token1_vault,
                    state.mint0_decimals,
                    state.mint1_decimals,
                )
            };

        Self {
            kind: PoolKind::ConstantProduct,
            base_mint,
            quote_mint,
            base_decimals,
            quote_decimals,
            base_vault,
            quote_vault,
            lp_mint: state.lp_mint,
            open_orders: Pubkey::default(),
            target_orders: Pubkey::default(),
            market: None,
            open_time: state.open_time,
        }
    }

    pub fn is_cpmm(&self) -> bool {
        self.kind == PoolKind::ConstantProduct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_v4_state() -> LiquidityStateV4 {
        LiquidityStateV4 {
            status: 6,
            nonce: 254,
            max_order: 7,
            depth: 3,
            base_decimal: 9,
            quote_decimal: 9,
            state: 1,
            reset_flag: 0,
            min_size: 1,
            vol_max_cut_ratio: 500,
            amount_wave_ratio: 5_000_000,
            base_lot_size: 1_000_000,
            quote_lot_size: 1_000,
            min_price_multiplier: 1,
            max_price_multiplier: 1_000_000_000,
            system_decimal_value: 1_000_000_000,
            min_separate_numerator: 5,
            min_separate_denominator: 10_000,
            trade_fee_numerator: 25,
            trade_fee_denominator: 10_000,
            pnl_numerator: 12,
            pnl_denominator: 100,
            swap_fee_numerator: 25,
            swap_fee_denominator: 10_000,
            base_need_take_pnl: 0,
            quote_need_take_pnl: 0,
            quote_total_pnl: 0,
            base_total_pnl: 0,
            pool_open_time: 1_700_000_000,
            punish_pc_amount: 0,
            punish_coin_amount: 0,
            orderbook_to_init_time: 0,
            swap_base_in_amount: 0,
            swap_quote_out_amount: 0,
            swap_base_to_quote_fee: 0,
            swap_quote_in_amount: 0,
            swap_base_out_amount: 0,
            swap_quote_to_base_fee: 0,
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            base_mint: Pubkey::new_unique(),
            quote_mint: Pubkey::new_unique(),
            lp_mint: Pubkey::new_unique(),
            open_orders: Pubkey::new_unique(),
            market_id: Pubkey::new_unique(),
            market_program_id: OPENBOOK_PROGRAM,
            target_orders: Pubkey::new_unique(),
            withdraw_queue: Pubkey::new_unique(),
            lp_vault: Pubkey::new_unique(),
            owner: Pubkey::new_unique(),
            lp_reserve: 0,
            padding: [0; 3],
        }
    }

    #[test]
    fn test_v4_layout_is_752_bytes() {
        let bytes = sample_v4_state().try_to_vec().unwrap();
        assert_eq!(bytes.len(), LIQUIDITY_STATE_V4_SIZE);
    }

    #[test]
    fn test_v4_filter_offsets() {
        let state = sample_v4_state();
        let bytes = state.try_to_vec().unwrap();
        assert_eq!(&bytes[POOL_STATUS_OFFSET..8], &POOL_STATUS_SWAP);
        assert_eq!(
            &bytes[POOL_QUOTE_MINT_OFFSET..POOL_QUOTE_MINT_OFFSET + 32],
            state.quote_mint.as_ref()
        );
        assert_eq!(
            &bytes[POOL_MARKET_PROGRAM_ID_OFFSET..POOL_MARKET_PROGRAM_ID_OFFSET + 32],
            OPENBOOK_PROGRAM.as_ref()
        );
    }

    #[test]
    fn test_v4_decode_round_trip() {
        let state = sample_v4_state();
        let bytes = state.try_to_vec().unwrap();
        let decoded = LiquidityStateV4::decode(&bytes).unwrap();
        assert_eq!(decoded.base_mint, state.base_mint);
        assert_eq!(decoded.market_id, state.market_id);
        assert_eq!(decoded.pool_open_time, state.pool_open_time);
    }

    #[test]
    fn test_v4_decode_rejects_wrong_length() {
        assert!(LiquidityStateV4::decode(&[0u8; 100]).is_err());
    }

    #[test]
    fn test_minimal_market_decode() {
        let base_vault = Pubkey::new_unique();
        let quote_vault = Pubkey::new_unique();
        let event_queue = Pubkey::new_unique();
        let bids = Pubkey::new_unique();
        let asks = Pubkey::new_unique();
        let mut data = vec![0u8; MARKET_STATE_V3_SIZE];
        data[MARKET_BASE_VAULT_OFFSET..MARKET_BASE_VAULT_OFFSET + 32]
            .copy_from_slice(base_vault.as_ref());
        data[MARKET_QUOTE_VAULT_OFFSET..MARKET_QUOTE_VAULT_OFFSET + 32]
            .copy_from_slice(quote_vault.as_ref());
        data[MARKET_EVENT_QUEUE_OFFSET..MARKET_EVENT_QUEUE_OFFSET + 32]
            .copy_from_slice(event_queue.as_ref());
        data[MARKET_BIDS_OFFSET..MARKET_BIDS_OFFSET + 32].copy_from_slice(bids.as_ref());
        data[MARKET_ASKS_OFFSET..MARKET_ASKS_OFFSET + 32].copy_from_slice(asks.as_ref());

        let market = MinimalMarket::decode(&data).unwrap();
        assert_eq!(
            market,
            MinimalMarket {
                base_vault,
                quote_vault,
                event_queue,
                bids,
                asks
            }
        );
    }

    #[test]
    fn test_cpmm_decode_and_normalize() {
        let quote = Pubkey::new_unique();
        let state = CpmmPoolState {
            amm_config: Pubkey::new_unique(),
            pool_creator: Pubkey::new_unique(),
            token0_vault: Pubkey::new_unique(),
            token1_vault: Pubkey::new_unique(),
            lp_mint: Pubkey::new_unique(),
            token0_mint: quote,
            token1_mint: Pubkey::new_unique(),
            token0_program: spl_token::id(),
            token1_program: spl_token::id(),
            observation_key: Pubkey::new_unique(),
            auth_bump: 255,
            status: 0,
            lp_mint_decimals: 9,
            mint0_decimals: 9,
            mint1_decimals: 6,
            lp_supply: 0,
            protocol_fees_token0: 0,
            protocol_fees_token1: 0,
            fund_fees_token0: 0,
            fund_fees_token1: 0,
            open_time: 42,
            padding: [0; 32],
        };

        let mut data = vec![0u8; 8];
        data.extend(state.try_to_vec().unwrap());
        assert_eq!(data.len(), CPMM_POOL_STATE_SIZE);

        let decoded = CpmmPoolState::decode(&data).unwrap();
        let pool = AmmPool::from_cpmm(&decoded, &quote);
        assert!(pool.is_cpmm());
        assert!(pool.market.is_none());
        assert_eq!(pool.quote_mint, quote);
        assert_eq!(pool.base_mint, state.token1_mint);
        assert_eq!(pool.base_decimals, 6);
        assert_eq!(pool.quote_decimals, 9);
    }

    #[test]
    fn test_classical_pool_keeps_market() {
        let state = sample_v4_state();
        let pool = AmmPool::from_v4(&state);
        assert_eq!(pool.kind, PoolKind::Classical);
        let market = pool.market.unwrap();
        assert_eq!(market.id, state.market_id);
        assert_eq!(market.program_id, OPENBOOK_PROGRAM);
    }
}
