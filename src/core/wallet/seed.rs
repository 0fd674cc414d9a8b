//! Seed decoding and generation

use bip39::Mnemonic;
use rand::RngCore;
use secrecy::SecretString;
use zeroize::{Zeroize, Zeroizing};

use crate::core::errors::WalletError;
use crate::security::SecretVec;

const MIN_SEED_LEN: usize = 16;
const MAX_SEED_LEN: usize = 64;

/// Decodes user-entered seed material.
///
/// A single token is read as a hex seed (16 to 64 bytes); several tokens are
/// read as a BIP39 mnemonic and yield its entropy.
pub fn decode_seed(input: &str) -> Result<SecretVec, WalletError> {
    let words: Vec<&str> = input.split_whitespace().collect();
    match words.len() {
        0 => Err(WalletError::EmptySeed),
        1 => {
            let seed = Zeroizing::new(
                hex::decode(words[0]).map_err(|e| WalletError::InvalidSeed(e.to_string()))?,
            );
            if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&seed.len()) {
                return Err(WalletError::InvalidSeed(format!(
                    "hex seed must be {}-{} bytes, got {}",
                    MIN_SEED_LEN,
                    MAX_SEED_LEN,
                    seed.len()
                )));
            }
            Ok(seed)
        }
        _ => {
            let phrase = Zeroizing::new(words.join(" "));
            let mnemonic = Mnemonic::parse_normalized(&phrase)
                .map_err(|e| WalletError::InvalidSeed(e.to_string()))?;
            Ok(Zeroizing::new(mnemonic.to_entropy()))
        }
    }
}

/// Generates a fresh 24-word mnemonic.
pub fn generate_seed() -> Result<SecretString, WalletError> {
    let mut entropy = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut entropy);

    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|e| WalletError::InvalidSeed(format!("Failed to generate mnemonic: {}", e)));
    entropy.zeroize();

    Ok(SecretString::new(mnemonic?.to_string()))
}
