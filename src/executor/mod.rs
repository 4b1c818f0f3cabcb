// src/executor/mod.rs
//
// Pluggable transaction submission. Each executor takes a signed user
// transaction, submits it its own way and reports whether the network
// confirmed it. An unconfirmed-but-submitted transaction is a normal result,
// not an error; only failures before submission surface as errors.

pub mod default;
pub mod jito;
pub mod warp;

use anyhow::Result;
use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::{RpcError, RpcResponseErrorData};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{Config, ExecutorMode};
use crate::error::SniperError;
use crate::solana::endpoints::EndpointPool;

/// Outcome of one submission attempt.
#[derive(Debug, Clone)]
pub struct SubmissionResult {
    pub confirmed: bool,
    pub signature: Option<String>,
    pub error: Option<String>,
}

impl SubmissionResult {
    pub fn confirmed(signature: &Signature) -> Self {
        Self {
            confirmed: true,
            signature: Some(signature.to_string()),
            error: None,
        }
    }

    pub fn unconfirmed(signature: &Signature, error: impl Into<String>) -> Self {
        Self {
            confirmed: false,
            signature: Some(signature.to_string()),
            error: Some(error.into()),
        }
    }
}

/// Blockhash a transaction was compiled against, with its expiry height.
#[derive(Debug, Clone, Copy)]
pub struct RecentBlockhash {
    pub hash: Hash,
    pub last_valid_block_height: u64,
}

#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    /// True when the executor supplies compute-budget instructions itself;
    /// the coordinator must not prepend its own.
    fn provides_compute_budget(&self) -> bool {
        false
    }

    async fn execute_and_confirm(
        &self,
        transaction: &VersionedTransaction,
        payer: &Keypair,
        blockhash: &RecentBlockhash,
    ) -> Result<SubmissionResult>;
}

pub fn build_executor(
    config: &Config,
    endpoint_pool: Arc<EndpointPool>,
) -> Result<Arc<dyn TransactionExecutor>> {
    Ok(match config.executor_mode {
        ExecutorMode::Default => Arc::new(default::DefaultExecutor::new(endpoint_pool)),
        ExecutorMode::Warp => {
            let fee_wallet = config.warp_fee_wallet.ok_or_else(|| {
                SniperError::ConfigError(
                    "WARP_FEE_WALLET is required for the warp executor".to_string(),
                )
            })?;
            Arc::new(warp::WarpExecutor::new(endpoint_pool, fee_wallet))
        }
        ExecutorMode::Bundle => Arc::new(jito::JitoExecutor::new(endpoint_pool)),
    })
}

const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(1_000);
const CONFIRM_MAX_POLLS: u32 = 90;

/// Poll a signature until the configured commitment is reached, the
/// transaction errors, or the blockhash expires.
pub(crate) async fn confirm_signature(
    rpc: &RpcClient,
    signature: &Signature,
    commitment: CommitmentConfig,
    blockhash: &RecentBlockhash,
) -> SubmissionResult {
    for _ in 0..CONFIRM_MAX_POLLS {
        match rpc.get_signature_statuses(&[*signature]).await {
            Ok(response) => {
                if let Some(status) = response.value.first().cloned().flatten() {
                    if let Some(err) = status.err {
                        return SubmissionResult::unconfirmed(signature, format!("{:?}", err));
                    }
                    if status.satisfies_commitment(commitment) {
                        return SubmissionResult::confirmed(signature);
                    }
                }
            }
            Err(e) => warn!(signature = %signature, "Status check failed: {}", e),
        }

        match rpc.get_block_height().await {
            Ok(height) if height > blockhash.last_valid_block_height => {
                return SubmissionResult::unconfirmed(signature, "Blockhash expired");
            }
            Ok(_) => {}
            Err(e) => warn!("Block height check failed: {}", e),
        }

        sleep(CONFIRM_POLL_INTERVAL).await;
    }

    SubmissionResult::unconfirmed(signature, "Confirmation polling exhausted")
}

/// Best-effort extraction of preflight simulation logs into a debug record.
pub(crate) fn log_simulation_error(error: &ClientError) {
    if let ClientErrorKind::RpcError(RpcError::RpcResponseError {
        data: RpcResponseErrorData::SendTransactionPreflightFailure(simulation),
        ..
    }) = error.kind()
    {
        if let Some(logs) = &simulation.logs {
            debug!("Simulation logs: {:?}", logs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Arc<EndpointPool> {
        Arc::new(
            EndpointPool::new(
                vec!["https://rpc.example".to_string()],
                vec!["wss://ws.example".to_string()],
                CommitmentConfig::confirmed(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_compute_budget_capability_flags() {
        let default = default::DefaultExecutor::new(pool());
        let warp = warp::WarpExecutor::new(pool(), solana_sdk::pubkey::Pubkey::new_unique());
        let bundle = jito::JitoExecutor::new(pool());

        assert!(!default.provides_compute_budget());
        assert!(warp.provides_compute_budget());
        assert!(bundle.provides_compute_budget());
    }

    #[test]
    fn test_submission_result_constructors() {
        let signature = Signature::default();
        let ok = SubmissionResult::confirmed(&signature);
        assert!(ok.confirmed);
        assert!(ok.error.is_none());

        let failed = SubmissionResult::unconfirmed(&signature, "Blockhash expired");
        assert!(!failed.confirmed);
        assert_eq!(failed.error.as_deref(), Some("Blockhash expired"));
        assert_eq!(failed.signature, Some(signature.to_string()));
    }
}
