//! Contract binary handling
//!
//! Holds creation bytecode, computes its content hash, and assembles the
//! init code submitted by a contract-creation transaction.

use alloy::primitives::{keccak256, B256};

use crate::error::{Error, Result};

/// Compiled contract creation bytecode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bytecode {
    bytes: Vec<u8>,
}

impl Bytecode {
    /// Create bytecode from a hex string (with or without 0x prefix)
    pub fn from_hex(hex: &str) -> Result<Self> {
        let clean = hex.trim().trim_start_matches("0x");
        if clean.is_empty() {
            return Ok(Self { bytes: Vec::new() });
        }
        let bytes = hex::decode(clean)?;
        Ok(Self { bytes })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Lower-case hex keccak256 of the bytecode, without prefix
    pub fn hash(&self) -> String {
        if self.bytes.is_empty() {
            return String::new();
        }
        format!("{:x}", keccak256(&self.bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Convert to hex string (with 0x prefix)
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.bytes))
    }

    /// Creation code followed by ABI-encoded constructor arguments
    pub fn init_code(&self, encoded_args: &[u8]) -> Vec<u8> {
        let mut code = Vec::with_capacity(self.bytes.len() + encoded_args.len());
        code.extend_from_slice(&self.bytes);
        code.extend_from_slice(encoded_args);
        code
    }
}

/// Left-pad a user salt to 32 bytes for CREATE2
pub fn salt_to_b256(salt: &[u8]) -> Result<B256> {
    if salt.len() > 32 {
        return Err(Error::invalid_param(
            "salt",
            format!("must be at most 32 bytes, got {}", salt.len()),
        ));
    }
    let mut padded = [0u8; 32];
    padded[32 - salt.len()..].copy_from_slice(salt);
    Ok(B256::from(padded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytecode_from_hex() {
        let bytecode = Bytecode::from_hex("0x6080604052").unwrap();
        assert_eq!(bytecode.len(), 5);

        let no_prefix = Bytecode::from_hex("6080604052").unwrap();
        assert_eq!(bytecode, no_prefix);
    }

    #[test]
    fn test_bytecode_empty() {
        let bytecode = Bytecode::from_hex("0x").unwrap();
        assert!(bytecode.is_empty());
        assert_eq!(bytecode.hash(), "");
    }

    #[test]
    fn test_bytecode_hash_matches_keccak() {
        let bytecode = Bytecode::from_hex("0x6080604052").unwrap();
        let expected = format!("{:x}", keccak256([0x60, 0x80, 0x60, 0x40, 0x52]));
        assert_eq!(bytecode.hash(), expected);
        assert_eq!(bytecode.hash().len(), 64);
    }

    #[test]
    fn test_bytecode_invalid_hex() {
        assert!(matches!(
            Bytecode::from_hex("not_hex"),
            Err(Error::HexDecode(_))
        ));
    }

    #[test]
    fn test_init_code_appends_args() {
        let bytecode = Bytecode::from_hex("6080").unwrap();
        assert_eq!(bytecode.init_code(&[0x01, 0x02]), vec![0x60, 0x80, 0x01, 0x02]);
        assert_eq!(bytecode.to_hex(), "0x6080");
    }

    #[test]
    fn test_salt_is_left_padded() {
        let salt = salt_to_b256(&[0xab, 0xcd]).unwrap();
        assert_eq!(salt[30], 0xab);
        assert_eq!(salt[31], 0xcd);
        assert!(salt[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_salt_too_long() {
        assert!(salt_to_b256(&[0u8; 33]).is_err());
        assert!(salt_to_b256(&[0u8; 32]).is_ok());
    }
}
