use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::raydium::layout::RAYDIUM_AMM_V4_PROGRAM;
use crate::raydium::pool_keys::PoolKeys;

/// Instruction tag for a fixed-input swap on the AMM v4 program.
const SWAP_BASE_IN_TAG: u8 = 9;

/// Build the raw swap-base-in instruction: tag, amount in, minimum amount
/// out, followed by the 18 accounts the program expects.
pub fn swap_base_in(
    keys: &PoolKeys,
    user_source: &Pubkey,
    user_destination: &Pubkey,
    user_owner: &Pubkey,
    amount_in: u64,
    minimum_amount_out: u64,
) -> Instruction {
    let mut data = Vec::with_capacity(17);
    data.push(SWAP_BASE_IN_TAG);
    data.extend_from_slice(&amount_in.to_le_bytes());
    data.extend_from_slice(&minimum_amount_out.to_le_bytes());

    let accounts = vec![
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new(keys.id, false),
        AccountMeta::new_readonly(keys.authority, false),
        AccountMeta::new(keys.open_orders, false),
        AccountMeta::new(keys.target_orders, false),
        AccountMeta::new(keys.base_vault, false),
        AccountMeta::new(keys.quote_vault, false),
        AccountMeta::new_readonly(keys.market_program_id, false),
        AccountMeta::new(keys.market_id, false),
        AccountMeta::new(keys.market_bids, false),
        AccountMeta::new(keys.market_asks, false),
        AccountMeta::new(keys.market_event_queue, false),
        AccountMeta::new(keys.market_base_vault, false),
        AccountMeta::new(keys.market_quote_vault, false),
        AccountMeta::new_readonly(keys.market_authority, false),
        AccountMeta::new(*user_source, false),
        AccountMeta::new(*user_destination, false),
        AccountMeta::new_readonly(*user_owner, true),
    ];

    Instruction {
        program_id: RAYDIUM_AMM_V4_PROGRAM,
        accounts,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raydium::layout::OPENBOOK_PROGRAM;
    use crate::raydium::pool_keys::amm_authority;

    fn sample_keys() -> PoolKeys {
        PoolKeys {
            id: Pubkey::new_unique(),
            base_mint: Pubkey::new_unique(),
            quote_mint: Pubkey::new_unique(),
            base_decimals: 9,
            quote_decimals: 9,
            lp_mint: Pubkey::new_unique(),
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            authority: amm_authority(),
            open_orders: Pubkey::new_unique(),
            target_orders: Pubkey::new_unique(),
            market_program_id: OPENBOOK_PROGRAM,
            market_id: Pubkey::new_unique(),
            market_bids: Pubkey::new_unique(),
            market_asks: Pubkey::new_unique(),
            market_event_queue: Pubkey::new_unique(),
            market_base_vault: Pubkey::new_unique(),
            market_quote_vault: Pubkey::new_unique(),
            market_authority: Pubkey::new_unique(),
        }
    }

    #[test]
    fn test_swap_instruction_shape() {
        let keys = sample_keys();
        let owner = Pubkey::new_unique();
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();

        let ix = swap_base_in(&keys, &source, &destination, &owner, 1_000, 990);

        assert_eq!(ix.program_id, RAYDIUM_AMM_V4_PROGRAM);
        assert_eq!(ix.accounts.len(), 18);
        assert_eq!(ix.data.len(), 17);
        assert_eq!(ix.data[0], SWAP_BASE_IN_TAG);
        assert_eq!(u64::from_le_bytes(ix.data[1..9].try_into().unwrap()), 1_000);
        assert_eq!(u64::from_le_bytes(ix.data[9..17].try_into().unwrap()), 990);
    }

    #[test]
    fn test_swap_instruction_signer_is_owner() {
        let keys = sample_keys();
        let owner = Pubkey::new_unique();
        let ix = swap_base_in(
            &keys,
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &owner,
            1,
            1,
        );
        let signers: Vec<_> = ix.accounts.iter().filter(|m| m.is_signer).collect();
        assert_eq!(signers.len(), 1);
        assert_eq!(signers[0].pubkey, owner);
    }
}
