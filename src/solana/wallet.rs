use anyhow::Result;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use std::path::Path;
use tracing::info;

use crate::error::SniperError;

/// Load the payer keypair from the configured wallet secret.
///
/// Accepts either a path to a JSON file holding the 64-byte secret key array,
/// the array itself inline, or a base58-encoded secret key string.
pub fn load_keypair(secret: &str) -> Result<Keypair> {
    let trimmed = secret.trim();

    let keypair = if Path::new(trimmed).is_file() {
        let raw = std::fs::read_to_string(trimmed)
            .map_err(|e| SniperError::WalletError(format!("Failed to read {}: {}", trimmed, e)))?;
        keypair_from_json(&raw)?
    } else if trimmed.starts_with('[') {
        keypair_from_json(trimmed)?
    } else {
        let bytes = bs58::decode(trimmed)
            .into_vec()
            .map_err(|e| SniperError::WalletError(format!("Invalid base58 secret key: {}", e)))?;
        Keypair::from_bytes(&bytes)
            .map_err(|e| SniperError::WalletError(format!("Invalid secret key data: {}", e)))?
    };

    info!("Wallet loaded: {}", keypair.pubkey());
    Ok(keypair)
}

fn keypair_from_json(raw: &str) -> Result<Keypair> {
    let bytes: Vec<u8> = serde_json::from_str(raw)
        .map_err(|e| SniperError::WalletError(format!("Invalid wallet file format: {}", e)))?;
    Ok(Keypair::from_bytes(&bytes)
        .map_err(|e| SniperError::WalletError(format!("Invalid secret key data: {}", e)))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_base58() {
        let original = Keypair::new();
        let encoded = bs58::encode(original.to_bytes()).into_string();
        let loaded = load_keypair(&encoded).unwrap();
        assert_eq!(loaded.pubkey(), original.pubkey());
    }

    #[test]
    fn test_load_from_json_file() {
        let original = Keypair::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        std::fs::write(&path, serde_json::to_string(&original.to_bytes().to_vec()).unwrap())
            .unwrap();
        let loaded = load_keypair(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.pubkey(), original.pubkey());
    }

    #[test]
    fn test_load_from_inline_array() {
        let original = Keypair::new();
        let raw = serde_json::to_string(&original.to_bytes().to_vec()).unwrap();
        let loaded = load_keypair(&raw).unwrap();
        assert_eq!(loaded.pubkey(), original.pubkey());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(load_keypair("not-a-key").is_err());
    }
}
