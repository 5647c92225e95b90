//! Sealed signing keys for the wallet registry
//!
//! A key is stored as `version || nonce || AES-256-GCM(secret)`, with the
//! wallet address as associated data. A sealed key copied onto another wallet
//! row fails to open. The cipher key ships in the binary, so this keeps keys
//! out of plain sight on disk and nothing more.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use rand::Rng;

use crate::error::{Error, Result};

const APP_KEY: &[u8; 32] = b"kiln-keystore-encryption-key-32!";

/// Layout tag of the sealed key, bumped when the layout changes
const SEAL_VERSION: u8 = 1;

/// AES-GCM nonce length (96 bits)
const NONCE_SIZE: usize = 12;

const HEADER_SIZE: usize = 1 + NONCE_SIZE;

/// Seal a signer's secret, bound to its address
pub fn seal_signer(signer: &PrivateKeySigner) -> Result<Vec<u8>> {
    let address = signer.address();
    let secret = signer.to_bytes();

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill(&mut nonce_bytes);

    let ciphertext = cipher()
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: secret.as_slice(),
                aad: address.as_slice(),
            },
        )
        .map_err(|e| Error::Keyring(format!("Encryption failed: {}", e)))?;

    let mut sealed = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    sealed.push(SEAL_VERSION);
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend(ciphertext);
    Ok(sealed)
}

/// Open a sealed key stored for `address`
pub fn unseal_signer(sealed: &[u8], address: Address) -> Result<PrivateKeySigner> {
    if sealed.len() < HEADER_SIZE {
        return Err(Error::Keyring("sealed key is truncated".into()));
    }
    let (version, rest) = sealed.split_at(1);
    if version[0] != SEAL_VERSION {
        return Err(Error::Keyring(format!(
            "unsupported sealed key version {}",
            version[0]
        )));
    }
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

    let secret = cipher()
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: address.as_slice(),
            },
        )
        .map_err(|_| Error::Keyring(format!("key sealed for another wallet than {}", address)))?;

    let secret: [u8; 32] = secret
        .try_into()
        .map_err(|_| Error::Keyring("sealed key has the wrong length".into()))?;
    let signer = PrivateKeySigner::from_bytes(&B256::from(secret))
        .map_err(|e| Error::Keyring(format!("Invalid private key: {}", e)))?;

    if signer.address() != address {
        return Err(Error::Keyring(format!(
            "sealed key belongs to {}, not {}",
            signer.address(),
            address
        )));
    }
    Ok(signer)
}

/// Parse a hex private key, with or without `0x`
pub fn parse_signing_key(private_key: &str) -> Result<PrivateKeySigner> {
    let hex = private_key.trim();
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    hex.parse::<PrivateKeySigner>()
        .map_err(|e| Error::Keyring(format!("Invalid private key: {}", e)))
}

fn cipher() -> Aes256Gcm {
    Aes256Gcm::new(APP_KEY.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    // anvil accounts 0 and 1
    const KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEY_1: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    #[test]
    fn test_sealed_key_opens_for_its_address() {
        let signer = parse_signing_key(KEY_0).unwrap();
        let sealed = seal_signer(&signer).unwrap();

        assert_eq!(sealed[0], SEAL_VERSION);
        assert_eq!(sealed.len(), HEADER_SIZE + 32 + 16);
        let opened = unseal_signer(&sealed, signer.address()).unwrap();
        assert_eq!(
            opened.address().to_checksum(None),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn test_nonce_is_random() {
        let signer = parse_signing_key(KEY_0).unwrap();
        assert_ne!(seal_signer(&signer).unwrap(), seal_signer(&signer).unwrap());
    }

    #[test]
    fn test_sealed_key_is_bound_to_address() {
        let alice = parse_signing_key(KEY_0).unwrap();
        let bob = parse_signing_key(KEY_1).unwrap();
        let sealed = seal_signer(&alice).unwrap();

        let err = unseal_signer(&sealed, bob.address()).unwrap_err();
        assert!(err.to_string().contains("another wallet"));
    }

    #[test]
    fn test_unseal_rejects_damaged_data() {
        let signer = parse_signing_key(KEY_0).unwrap();
        let address = signer.address();
        assert!(unseal_signer(&[SEAL_VERSION; 5], address).is_err());

        let mut sealed = seal_signer(&signer).unwrap();
        sealed[0] = 0;
        assert!(unseal_signer(&sealed, address)
            .unwrap_err()
            .to_string()
            .contains("version"));

        let mut sealed = seal_signer(&signer).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 1;
        assert!(matches!(unseal_signer(&sealed, address), Err(Error::Keyring(_))));
    }

    #[test]
    fn test_parse_signing_key_accepts_bare_hex() {
        assert_eq!(
            parse_signing_key(KEY_1).unwrap().address(),
            parse_signing_key(&format!("0x{KEY_1}")).unwrap().address()
        );
        assert!(matches!(
            parse_signing_key("not a key"),
            Err(Error::Keyring(_))
        ));
    }
}
