use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde_json::json;
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::error::SniperError;
use crate::executor::{confirm_signature, RecentBlockhash, SubmissionResult, TransactionExecutor};
use crate::solana::endpoints::EndpointPool;

const BLOCK_ENGINE_URL: &str = "https://mainnet.block-engine.jito.wtf/api/v1/bundles";

/// Tip paid to the block engine per bundle.
const TIP_LAMPORTS: u64 = 1_000_000;

/// Well-known block-engine tip accounts; one is picked at random per bundle.
const TIP_ACCOUNTS: [&str; 8] = [
    "96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5",
    "HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe",
    "Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY",
    "ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49",
    "DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh",
    "ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt",
    "DttWaMuVvTiduZRnguLF7jNxTgiMBZ1hyAumKUiL2KRL",
    "3AVi9Tg9Uo68tJfuvoKvqKNWKkC5wPdSSdeBnizKZ6jT",
];

fn random_tip_account() -> Result<Pubkey> {
    let raw = TIP_ACCOUNTS
        .choose(&mut rand::thread_rng())
        .expect("tip account list is non-empty");
    Pubkey::from_str(raw)
        .map_err(|e| SniperError::RelayError(format!("Bad tip account {}: {}", raw, e)).into())
}

/// Submits the user transaction plus a tip transfer as a bundle to the block
/// engine, then polls for inclusion. The block engine prices compute itself,
/// so this executor provides the compute budget.
pub struct JitoExecutor {
    endpoint_pool: Arc<EndpointPool>,
    http: reqwest::Client,
}

impl JitoExecutor {
    pub fn new(endpoint_pool: Arc<EndpointPool>) -> Self {
        Self {
            endpoint_pool,
            http: reqwest::Client::new(),
        }
    }

    fn tip_transaction(
        &self,
        payer: &Keypair,
        blockhash: &RecentBlockhash,
    ) -> Result<VersionedTransaction> {
        let tip_account = random_tip_account()?;
        debug!(tip_account = %tip_account, "Tipping block engine");
        let instruction =
            system_instruction::transfer(&payer.pubkey(), &tip_account, TIP_LAMPORTS);
        let message = v0::Message::try_compile(&payer.pubkey(), &[instruction], &[], blockhash.hash)
            .map_err(|e| SniperError::TransactionError(format!("Tip compile failed: {}", e)))?;
        VersionedTransaction::try_new(VersionedMessage::V0(message), &[payer])
            .map_err(|e| SniperError::TransactionError(format!("Tip signing failed: {}", e)).into())
    }
}

#[async_trait]
impl TransactionExecutor for JitoExecutor {
    fn provides_compute_budget(&self) -> bool {
        true
    }

    async fn execute_and_confirm(
        &self,
        transaction: &VersionedTransaction,
        payer: &Keypair,
        blockhash: &RecentBlockhash,
    ) -> Result<SubmissionResult> {
        let tip_transaction = self.tip_transaction(payer, blockhash)?;

        let bundle: Vec<String> = [transaction, &tip_transaction]
            .iter()
            .map(|tx| {
                bincode::serialize(tx)
                    .map(|bytes| bs58::encode(bytes).into_string())
                    .context("Serialize bundle transaction")
            })
            .collect::<Result<_>>()?;

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sendBundle",
            "params": [bundle],
        });

        let response: serde_json::Value = self
            .http
            .post(BLOCK_ENGINE_URL)
            .json(&body)
            .send()
            .await
            .map_err(|e| SniperError::RelayError(format!("Bundle submit failed: {}", e)))?
            .json()
            .await
            .map_err(|e| SniperError::RelayError(format!("Bundle response malformed: {}", e)))?;

        if let Some(error) = response.get("error") {
            return Err(SniperError::RelayError(format!("Bundle rejected: {}", error)).into());
        }
        debug!(bundle_id = %response["result"], "Bundle accepted");

        // Bundles land or expire silently; poll the user signature until the
        // blockhash runs out.
        let signature = transaction.signatures[0];
        Ok(confirm_signature(
            &self.endpoint_pool.connection(),
            &signature,
            self.endpoint_pool.commitment(),
            blockhash,
        )
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tip_account_parses() {
        for raw in TIP_ACCOUNTS {
            assert!(Pubkey::from_str(raw).is_ok(), "bad tip account {}", raw);
        }
    }

    #[test]
    fn test_random_tip_account_is_from_the_set() {
        for _ in 0..16 {
            let picked = random_tip_account().unwrap().to_string();
            assert!(TIP_ACCOUNTS.contains(&picked.as_str()));
        }
    }
}
