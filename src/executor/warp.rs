use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
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

const WARP_RELAY_URL: &str = "https://tx.warp.id/transaction/execute";

/// Flat relay service fee per trade.
const SERVICE_FEE_LAMPORTS: u64 = 1_000_000;

#[derive(Serialize)]
struct RelayRequest {
    transactions: Vec<String>,
}

#[derive(Deserialize)]
struct RelayResponse {
    confirmed: bool,
    signature: Option<String>,
    error: Option<String>,
}

/// Forwards the user transaction together with a service-fee transfer to the
/// warp relay. The relay owns priority-fee placement, so this executor
/// provides the compute budget.
pub struct WarpExecutor {
    endpoint_pool: Arc<EndpointPool>,
    fee_wallet: Pubkey,
    http: reqwest::Client,
}

impl WarpExecutor {
    pub fn new(endpoint_pool: Arc<EndpointPool>, fee_wallet: Pubkey) -> Self {
        Self {
            endpoint_pool,
            fee_wallet,
            http: reqwest::Client::new(),
        }
    }

    fn fee_transaction(
        &self,
        payer: &Keypair,
        blockhash: &RecentBlockhash,
    ) -> Result<VersionedTransaction> {
        let instruction =
            system_instruction::transfer(&payer.pubkey(), &self.fee_wallet, SERVICE_FEE_LAMPORTS);
        let message = v0::Message::try_compile(&payer.pubkey(), &[instruction], &[], blockhash.hash)
            .map_err(|e| SniperError::TransactionError(format!("Fee compile failed: {}", e)))?;
        VersionedTransaction::try_new(VersionedMessage::V0(message), &[payer])
            .map_err(|e| SniperError::TransactionError(format!("Fee signing failed: {}", e)).into())
    }
}

#[async_trait]
impl TransactionExecutor for WarpExecutor {
    fn provides_compute_budget(&self) -> bool {
        true
    }

    async fn execute_and_confirm(
        &self,
        transaction: &VersionedTransaction,
        payer: &Keypair,
        blockhash: &RecentBlockhash,
    ) -> Result<SubmissionResult> {
        let fee_transaction = self.fee_transaction(payer, blockhash)?;

        let request = RelayRequest {
            transactions: vec![
                BASE64.encode(bincode::serialize(transaction).context("Serialize transaction")?),
                BASE64.encode(
                    bincode::serialize(&fee_transaction).context("Serialize fee transaction")?,
                ),
            ],
        };

        let response: RelayResponse = self
            .http
            .post(WARP_RELAY_URL)
            .json(&request)
            .send()
            .await
            .map_err(|e| SniperError::RelayError(format!("Warp request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| SniperError::RelayError(format!("Warp response malformed: {}", e)))?;
        debug!(confirmed = response.confirmed, "Warp relay replied");

        // The relay only reports acceptance; inclusion is confirmed on the
        // main endpoint.
        match response.signature.as_deref() {
            Some(raw) => {
                let signature = solana_sdk::signature::Signature::from_str(raw).map_err(|e| {
                    SniperError::RelayError(format!("Warp returned bad signature: {}", e))
                })?;
                Ok(confirm_signature(
                    &self.endpoint_pool.connection(),
                    &signature,
                    self.endpoint_pool.commitment(),
                    blockhash,
                )
                .await)
            }
            None => Ok(SubmissionResult {
                confirmed: false,
                signature: None,
                error: response.error.or(Some("Warp relay returned no signature".to_string())),
            }),
        }
    }
}
