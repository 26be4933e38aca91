// src/types.rs
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::hexutil::checksum_address;

pub const SIGNATURE_LENGTH: usize = 65;

/// An ERC-4337 (EntryPoint v0.6) user operation.
///
/// Integers travel as `0x` quantities and byte fields as `0x` hex, `0x`
/// meaning empty; the sender is written checksummed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    #[serde(with = "checksum_address")]
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub signature: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
}

impl UserOperation {
    /// Unsigned operation with zeroed gas fields and no sponsor.
    pub fn new(sender: Address, nonce: U256, call_data: Bytes) -> Self {
        Self {
            sender,
            nonce,
            call_data,
            ..Default::default()
        }
    }

    pub fn with_init_code(mut self, init_code: Bytes) -> Self {
        self.init_code = init_code;
        self
    }

    /// Copies gas limits, fees and sponsor data returned by the relay.
    pub fn with_gas_and_paymaster(mut self, gas: &GasAndPaymasterResult) -> Self {
        self.call_gas_limit = gas.call_gas_limit;
        self.verification_gas_limit = gas.verification_gas_limit;
        self.pre_verification_gas = gas.pre_verification_gas;
        self.max_fee_per_gas = gas.max_fee_per_gas;
        self.max_priority_fee_per_gas = gas.max_priority_fee_per_gas;
        self.paymaster_and_data = gas.paymaster_and_data.clone();
        self
    }

    /// Sets the signature, which must be `r || s || v` (65 bytes).
    pub fn with_signature(mut self, signature: impl Into<Bytes>) -> Result<Self, RelayError> {
        let signature = signature.into();
        if signature.len() != SIGNATURE_LENGTH {
            return Err(RelayError::InvalidSignatureLength(signature.len()));
        }
        self.signature = signature;
        Ok(self)
    }

    pub fn is_signed(&self) -> bool {
        self.signature.len() == SIGNATURE_LENGTH
    }
}

/// Gas limits, fees and sponsor data quoted by the relay for a partial operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasAndPaymasterResult {
    pub pre_verification_gas: U256,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub paymaster_and_data: Bytes,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// Outcome of an included operation. The transaction receipt and logs are kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    pub user_op_hash: H256,
    #[serde(default)]
    pub entry_point: Option<Address>,
    pub sender: Address,
    pub nonce: U256,
    #[serde(default)]
    pub paymaster: Option<Address>,
    pub actual_gas_cost: U256,
    pub actual_gas_used: U256,
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub logs: Vec<serde_json::Value>,
    #[serde(default)]
    pub receipt: serde_json::Value,
}

/// What a caller wants executed by its smart wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationCall {
    pub sender: Address,
    pub nonce: U256,
    pub call_data: Bytes,
    /// Owner of a not-yet-deployed wallet; the relayer then attaches factory init code.
    #[serde(default)]
    pub deploy_for: Option<Address>,
}

impl OperationCall {
    pub fn new(sender: Address, nonce: U256, call_data: impl Into<Bytes>) -> Self {
        Self {
            sender,
            nonce,
            call_data: call_data.into(),
            deploy_for: None,
        }
    }

    pub fn deploying_for(mut self, owner: Address) -> Self {
        self.deploy_for = Some(owner);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hexutil::parse_address;

    fn sample() -> UserOperation {
        UserOperation {
            sender: parse_address("0x045F756F248799F4413a026100Ae49e5E7F2031E").unwrap(),
            nonce: U256::from(3),
            call_data: Bytes::from(vec![0x11, 0x11]),
            call_gas_limit: U256::from(0x6000),
            verification_gas_limit: U256::from(0xd8f8),
            pre_verification_gas: U256::from(0xab90),
            max_fee_per_gas: U256::from(0xf708ca6u64),
            max_priority_fee_per_gas: U256::from(0x6dc),
            ..Default::default()
        }
    }

    #[test]
    fn wire_format_uses_hex_strings() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["sender"], "0x045F756F248799F4413a026100Ae49e5E7F2031E");
        assert_eq!(value["nonce"], "0x3");
        assert_eq!(value["initCode"], "0x");
        assert_eq!(value["callData"], "0x1111");
        assert_eq!(value["signature"], "0x");
        assert_eq!(value["callGasLimit"], "0x6000");
        assert_eq!(value["verificationGasLimit"], "0xd8f8");
        assert_eq!(value["preVerificationGas"], "0xab90");
        assert_eq!(value["maxFeePerGas"], "0xf708ca6");
        assert_eq!(value["maxPriorityFeePerGas"], "0x6dc");
        assert_eq!(value["paymasterAndData"], "0x");
    }

    #[test]
    fn wire_format_round_trips() {
        let op = sample();
        let json = serde_json::to_string(&op).unwrap();
        let back: UserOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn lower_case_sender_is_accepted() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["sender"] = "0x045f756f248799f4413a026100ae49e5e7f2031e".into();
        let op: UserOperation = serde_json::from_value(value).unwrap();
        assert_eq!(op.sender, sample().sender);
    }

    #[test]
    fn signature_must_be_65_bytes() {
        let err = sample().with_signature(vec![0u8; 64]).unwrap_err();
        assert!(matches!(err, RelayError::InvalidSignatureLength(64)));

        let signed = sample().with_signature(vec![0u8; 65]).unwrap();
        assert!(signed.is_signed());
        assert!(!sample().is_signed());
    }

    #[test]
    fn gas_quote_is_copied() {
        let gas = GasAndPaymasterResult {
            pre_verification_gas: U256::from(0xab84),
            call_gas_limit: U256::from(0x5000),
            verification_gas_limit: U256::from(0xd7e2),
            paymaster_and_data: Bytes::from(vec![0xc0, 0x3a]),
            max_fee_per_gas: U256::from(0xf732015ceu64),
            max_priority_fee_per_gas: U256::from(0x60b),
        };
        let op = UserOperation::new(sample().sender, U256::from(8), Bytes::new())
            .with_gas_and_paymaster(&gas);
        assert_eq!(op.call_gas_limit, gas.call_gas_limit);
        assert_eq!(op.pre_verification_gas, gas.pre_verification_gas);
        assert_eq!(op.paymaster_and_data, gas.paymaster_and_data);
        assert!(op.signature.is_empty());
    }
}
