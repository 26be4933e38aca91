// src/userop.rs
use ethers::types::{Address, H256, U256};

use crate::abi::{encode_parameters, AbiValue};
use crate::error::EncodeError;
use crate::hash::keccak256;
use crate::types::UserOperation;

const PACKED_TYPES: [&str; 10] = [
    "address", "uint256", "bytes32", "bytes32", "uint256", "uint256", "uint256", "uint256",
    "uint256", "bytes32",
];

const DOMAIN_TYPES: [&str; 3] = ["bytes32", "address", "uint256"];

/// Packs every field except the signature; the three byte fields enter as their hashes.
pub fn pack_user_operation(op: &UserOperation) -> Result<Vec<u8>, EncodeError> {
    encode_parameters(
        &PACKED_TYPES,
        &[
            AbiValue::Address(op.sender),
            AbiValue::Uint(op.nonce),
            keccak256(&op.init_code).into(),
            keccak256(&op.call_data).into(),
            AbiValue::Uint(op.call_gas_limit),
            AbiValue::Uint(op.verification_gas_limit),
            AbiValue::Uint(op.pre_verification_gas),
            AbiValue::Uint(op.max_fee_per_gas),
            AbiValue::Uint(op.max_priority_fee_per_gas),
            keccak256(&op.paymaster_and_data).into(),
        ],
    )
}

/// The hash the wallet owner signs: the packed operation bound to an EntryPoint and chain.
pub fn user_operation_hash(
    op: &UserOperation,
    entry_point: Address,
    chain_id: u64,
) -> Result<H256, EncodeError> {
    let packed = pack_user_operation(op)?;
    domain_hash(&packed, entry_point, chain_id)
}

pub fn domain_hash(packed: &[u8], entry_point: Address, chain_id: u64) -> Result<H256, EncodeError> {
    let domain = encode_parameters(
        &DOMAIN_TYPES,
        &[
            keccak256(packed).into(),
            AbiValue::Address(entry_point),
            AbiValue::Uint(U256::from(chain_id)),
        ],
    )?;
    Ok(H256(keccak256(domain)))
}
