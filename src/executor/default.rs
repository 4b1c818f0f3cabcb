use anyhow::Result;
use async_trait::async_trait;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::signature::Keypair;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::UiTransactionEncoding;
use std::sync::Arc;
use tracing::debug;

use crate::error::SniperError;
use crate::executor::{
    confirm_signature, log_simulation_error, RecentBlockhash, SubmissionResult,
    TransactionExecutor,
};
use crate::solana::endpoints::EndpointPool;

/// Plain RPC submission through the endpoint pool's current connection.
/// The coordinator supplies compute-budget instructions for this executor.
pub struct DefaultExecutor {
    endpoint_pool: Arc<EndpointPool>,
}

impl DefaultExecutor {
    pub fn new(endpoint_pool: Arc<EndpointPool>) -> Self {
        Self { endpoint_pool }
    }
}

#[async_trait]
impl TransactionExecutor for DefaultExecutor {
    async fn execute_and_confirm(
        &self,
        transaction: &VersionedTransaction,
        _payer: &Keypair,
        blockhash: &RecentBlockhash,
    ) -> Result<SubmissionResult> {
        let rpc = self.endpoint_pool.connection();
        let send_config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(self.endpoint_pool.commitment().commitment),
            encoding: Some(UiTransactionEncoding::Base64),
            max_retries: Some(0),
            min_context_slot: None,
        };

        let signature = match rpc.send_transaction_with_config(transaction, send_config).await {
            Ok(signature) => signature,
            Err(e) => {
                log_simulation_error(&e);
                return Err(
                    SniperError::TransactionError(format!("Send failed: {}", e)).into(),
                );
            }
        };
        debug!(signature = %signature, "Transaction sent");

        Ok(confirm_signature(
            &rpc,
            &signature,
            self.endpoint_pool.commitment(),
            blockhash,
        )
        .await)
    }
}
