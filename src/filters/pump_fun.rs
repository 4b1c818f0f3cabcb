use async_trait::async_trait;
use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

use crate::filters::{FilterResult, PoolFilter};
use crate::raydium::pool_keys::PoolKeys;
use crate::solana::endpoints::EndpointPool;

/// Token metadata program
const METADATA_PROGRAM: Pubkey = pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

/// Update authority pump.fun stamps on tokens it launches
const PUMP_FUN_AUTHORITY: Pubkey = pubkey!("TSLvdd1pWpHVjahSpsvCXUbgwsL3JAcvokwaKt1eokM");

/// The metadata fields this filter inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub update_authority: Pubkey,
    pub uri: String,
}

/// Passes when the base token originates from pump.fun: metadata URI
/// mentions pump.fun, the mint address carries the vanity `pump` suffix, or
/// the metadata update authority is the pump.fun authority.
pub struct PumpFunFilter {
    endpoint_pool: Arc<EndpointPool>,
}

impl PumpFunFilter {
    pub fn new(endpoint_pool: Arc<EndpointPool>) -> Self {
        Self { endpoint_pool }
    }
}

#[async_trait]
impl PoolFilter for PumpFunFilter {
    async fn execute(&self, pool_keys: &PoolKeys) -> FilterResult {
        let metadata_account = metadata_address(&pool_keys.base_mint);
        match self
            .endpoint_pool
            .connection()
            .get_account(&metadata_account)
            .await
        {
            Ok(account) => match parse_metadata(&account.data) {
                Some(metadata) => {
                    if is_pump_fun(&pool_keys.base_mint, &metadata) {
                        FilterResult::pass()
                    } else {
                        FilterResult::fail("PumpFun -> Token was not launched on pump.fun")
                    }
                }
                None => FilterResult::fail("PumpFun -> Malformed metadata account"),
            },
            Err(e) => FilterResult::fail(format!("PumpFun -> Failed to fetch metadata: {}", e)),
        }
    }
}

pub fn metadata_address(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[b"metadata", METADATA_PROGRAM.as_ref(), mint.as_ref()],
        &METADATA_PROGRAM,
    )
    .0
}

pub fn is_pump_fun(mint: &Pubkey, metadata: &TokenMetadata) -> bool {
    metadata.uri.contains("pump.fun")
        || mint.to_string().ends_with("pump")
        || metadata.update_authority == PUMP_FUN_AUTHORITY
}

/// Pull the update authority and URI out of a raw metadata account. Layout:
/// key byte, update authority, mint, then length-prefixed name, symbol and
/// uri strings padded with NULs.
pub fn parse_metadata(data: &[u8]) -> Option<TokenMetadata> {
    let update_authority = Pubkey::try_from(data.get(1..33)?).ok()?;

    let mut offset = 65usize;
    let _name = read_padded_string(data, &mut offset)?;
    let _symbol = read_padded_string(data, &mut offset)?;
    let uri = read_padded_string(data, &mut offset)?;

    Some(TokenMetadata {
        update_authority,
        uri,
    })
}

fn read_padded_string(data: &[u8], offset: &mut usize) -> Option<String> {
    let len_bytes = data.get(*offset..*offset + 4)?;
    let len = u32::from_le_bytes(len_bytes.try_into().ok()?) as usize;
    let raw = data.get(*offset + 4..*offset + 4 + len)?;
    *offset += 4 + len;
    Some(
        String::from_utf8_lossy(raw)
            .trim_end_matches('\0')
            .to_string(),
    )
}
