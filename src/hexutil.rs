// src/hexutil.rs
//! Conversions between the hex text used on the wire and the byte/integer
//! types used internally.

use ethers::types::{Address, H256, U256};
use ethers::utils::to_checksum;

use crate::error::EncodeError;

fn strip_prefix(value: &str) -> &str {
    let trimmed = value.trim();
    trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
}

/// Decodes `0x`-prefixed (or bare) hex. `"0x"` and `""` both decode to no bytes.
pub fn parse_hex_bytes(value: &str) -> Result<Vec<u8>, EncodeError> {
    hex::decode(strip_prefix(value)).map_err(|_| EncodeError::InvalidHex(value.to_string()))
}

pub fn parse_address(value: &str) -> Result<Address, EncodeError> {
    let bytes = parse_hex_bytes(value)?;
    if bytes.len() != 20 {
        return Err(EncodeError::InvalidLength {
            field: "address",
            expected: 20,
            actual: bytes.len(),
        });
    }
    Ok(Address::from_slice(&bytes))
}

pub fn parse_bytes32(value: &str) -> Result<H256, EncodeError> {
    let bytes = parse_hex_bytes(value)?;
    if bytes.len() != 32 {
        return Err(EncodeError::InvalidLength {
            field: "bytes32",
            expected: 32,
            actual: bytes.len(),
        });
    }
    Ok(H256::from_slice(&bytes))
}

/// Parses a hex quantity such as `0x3` or `0xf708ca6`. An empty quantity is zero.
pub fn parse_quantity(value: &str) -> Result<U256, EncodeError> {
    let digits = strip_prefix(value).trim_start_matches('0');
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EncodeError::InvalidHex(value.to_string()));
    }
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    if digits.len() > 64 {
        return Err(EncodeError::Overflow(value.to_string()));
    }
    U256::from_str_radix(digits, 16).map_err(|_| EncodeError::InvalidHex(value.to_string()))
}

pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn to_quantity(value: U256) -> String {
    format!("0x{:x}", value)
}

/// EIP-55 mixed-case form, as relays print addresses.
pub fn checksummed(address: &Address) -> String {
    to_checksum(address, None)
}

/// Serde adapter writing addresses checksummed and reading them case-insensitively.
pub mod checksum_address {
    use ethers::types::Address;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(address: &Address, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::checksummed(address))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Address, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        super::parse_address(&value).map_err(serde::de::Error::custom)
    }
}
