use thiserror::Error;

#[derive(Debug, Error)]
pub enum SniperError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Wallet error: {0}")]
    WalletError(String),

    #[error("Subscription error: {0}")]
    SubscriptionError(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Relay error: {0}")]
    RelayError(String),

    #[error("Market not found: {0}")]
    MarketNotFound(String),

    #[error("Account decode error: {0}")]
    DecodeError(String),
}
