use solana_sdk::pubkey::Pubkey;

use crate::error::SniperError;
use crate::raydium::layout::{AmmPool, MinimalMarket, RAYDIUM_AMM_V4_PROGRAM};

/// Everything the swap instruction needs to know about one pool.
#[derive(Debug, Clone)]
pub struct PoolKeys {
    pub id: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub lp_mint: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub authority: Pubkey,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub market_program_id: Pubkey,
    pub market_id: Pubkey,
    pub market_bids: Pubkey,
    pub market_asks: Pubkey,
    pub market_event_queue: Pubkey,
    pub market_base_vault: Pubkey,
    pub market_quote_vault: Pubkey,
    pub market_authority: Pubkey,
}

/// The AMM v4 pool authority PDA (shared by every pool).
pub fn amm_authority() -> Pubkey {
    Pubkey::find_program_address(&[b"amm authority"], &RAYDIUM_AMM_V4_PROGRAM).0
}

/// Derive the market vault-signer address the order-book program expects.
/// The nonce is not stored in the minimal market view, so probe the same
/// 0..100 range the market initializer uses.
pub fn market_vault_signer(
    market_program_id: &Pubkey,
    market_id: &Pubkey,
) -> Result<Pubkey, SniperError> {
    for nonce in 0u64..100 {
        if let Ok(address) = Pubkey::create_program_address(
            &[market_id.as_ref(), &nonce.to_le_bytes()],
            market_program_id,
        ) {
            return Ok(address);
        }
    }
    Err(SniperError::DecodeError(format!(
        "No vault signer nonce found for market {}",
        market_id
    )))
}

/// Assemble the swap key set from the cached pool state and the minimal
/// market view. Only classical pools have one; CPMM pools are rejected.
pub fn create_pool_keys(
    id: Pubkey,
    pool: &AmmPool,
    market: &MinimalMarket,
) -> Result<PoolKeys, SniperError> {
    let market_ref = pool
        .market
        .ok_or_else(|| SniperError::MarketNotFound(format!("Pool {} has no market", id)))?;

    Ok(PoolKeys {
        id,
        base_mint: pool.base_mint,
        quote_mint: pool.quote_mint,
        base_decimals: pool.base_decimals,
        quote_decimals: pool.quote_decimals,
        lp_mint: pool.lp_mint,
        base_vault: pool.base_vault,
        quote_vault: pool.quote_vault,
        authority: amm_authority(),
        open_orders: pool.open_orders,
        target_orders: pool.target_orders,
        market_program_id: market_ref.program_id,
        market_id: market_ref.id,
        market_bids: market.bids,
        market_asks: market.asks,
        market_event_queue: market.event_queue,
        market_base_vault: market.base_vault,
        market_quote_vault: market.quote_vault,
        market_authority: market_vault_signer(&market_ref.program_id, &market_ref.id)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raydium::layout::{MarketRef, PoolKind, OPENBOOK_PROGRAM};

    #[test]
    fn test_amm_authority_is_stable() {
        let a = amm_authority();
        let b = amm_authority();
        assert_eq!(a, b);
        assert_ne!(a, Pubkey::default());
    }

    #[test]
    fn test_market_vault_signer_found_for_arbitrary_market() {
        let market = Pubkey::new_unique();
        let signer = market_vault_signer(&OPENBOOK_PROGRAM, &market).unwrap();
        // Deterministic for the same market.
        assert_eq!(
            signer,
            market_vault_signer(&OPENBOOK_PROGRAM, &market).unwrap()
        );
    }

    #[test]
    fn test_market_vaults_come_from_the_market() {
        let pool = AmmPool {
            kind: PoolKind::Classical,
            base_mint: Pubkey::new_unique(),
            quote_mint: Pubkey::new_unique(),
            base_decimals: 9,
            quote_decimals: 9,
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            lp_mint: Pubkey::new_unique(),
            open_orders: Pubkey::new_unique(),
            target_orders: Pubkey::new_unique(),
            market: Some(MarketRef {
                id: Pubkey::new_unique(),
                program_id: OPENBOOK_PROGRAM,
            }),
            open_time: 0,
        };
        let market = MinimalMarket {
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            event_queue: Pubkey::new_unique(),
            bids: Pubkey::new_unique(),
            asks: Pubkey::new_unique(),
        };

        let keys = create_pool_keys(Pubkey::new_unique(), &pool, &market).unwrap();

        // The order book holds its own vaults; they must never alias the
        // pool's.
        assert_eq!(keys.market_base_vault, market.base_vault);
        assert_eq!(keys.market_quote_vault, market.quote_vault);
        assert_ne!(keys.market_base_vault, pool.base_vault);
        assert_ne!(keys.market_quote_vault, pool.quote_vault);
        assert_eq!(keys.base_vault, pool.base_vault);
        assert_eq!(keys.quote_vault, pool.quote_vault);
    }

    #[test]
    fn test_cpmm_pool_is_rejected() {
        let pool = AmmPool {
            kind: PoolKind::ConstantProduct,
            base_mint: Pubkey::new_unique(),
            quote_mint: Pubkey::new_unique(),
            base_decimals: 9,
            quote_decimals: 9,
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            lp_mint: Pubkey::new_unique(),
            open_orders: Pubkey::default(),
            target_orders: Pubkey::default(),
            market: None,
            open_time: 0,
        };
        let market = MinimalMarket {
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            event_queue: Pubkey::new_unique(),
            bids: Pubkey::new_unique(),
            asks: Pubkey::new_unique(),
        };
        assert!(create_pool_keys(Pubkey::new_unique(), &pool, &market).is_err());
    }
}
