// src/hash.rs
use ethers::utils::keccak256 as ethers_keccak256;

use crate::error::EncodeError;
use crate::hexutil::parse_hex_bytes;

/// Keccak-256, the hash every on-chain verifier of user operations recomputes.
pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
    ethers_keccak256(data)
}

/// Hashes the bytes a hex string denotes rather than its text.
pub fn keccak256_hex(value: &str) -> Result<[u8; 32], EncodeError> {
    Ok(keccak256(parse_hex_bytes(value)?))
}

/// First four bytes of the hash of a method signature such as `mint(address,uint256)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}
