// src/envelope.rs
//! JSON-RPC 2.0 requests sent to the relay and decoding of its answers.

use ethers::types::{Address, Bytes, H256, U256};
use serde::de::{self, DeserializeOwned, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::error::RelayError;
use crate::hexutil::{checksum_address, checksummed, parse_address, parse_hex_bytes};
use crate::types::{GasAndPaymasterResult, UserOperation, UserOperationReceipt};

pub const JSONRPC_VERSION: &str = "2.0";
pub const SEND_USER_OPERATION: &str = "eth_sendUserOperation";
pub const GET_USER_OPERATION_RECEIPT: &str = "eth_getUserOperationReceipt";
pub const GAS_AND_PAYMASTER_METHOD: &str = "requestGasAndPaymasterAndData";

/// Placeholder signature the relay accepts while estimating gas for an unsigned operation.
pub const DUMMY_SIGNATURE: &str = "0xfffffffffffffffffffffffffffffff0000000000000000000000000000000007aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1c";

pub fn dummy_signature() -> Result<Bytes, RelayError> {
    Ok(parse_hex_bytes(DUMMY_SIGNATURE)?.into())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcRequest<P> {
    pub id: u64,
    pub jsonrpc: String,
    pub method: String,
    pub params: P,
}

impl<P: Serialize> JsonRpcRequest<P> {
    pub fn new(id: u64, method: impl Into<String>, params: P) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, RelayError> {
        serde_json::to_vec(self).map_err(|e| RelayError::Serialize(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasAndPaymasterParams {
    pub policy_id: String,
    #[serde(with = "checksum_address")]
    pub entry_point: Address,
    pub user_operation: UserOperation,
    pub dummy_signature: Bytes,
}

/// Positional params of `eth_sendUserOperation`: the operation, optionally followed by the
/// EntryPoint address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOperationParams {
    pub user_operation: UserOperation,
    pub entry_point: Option<Address>,
}

impl Serialize for SendOperationParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.entry_point.is_some() { 2 } else { 1 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.user_operation)?;
        if let Some(entry_point) = &self.entry_point {
            seq.serialize_element(&checksummed(entry_point))?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for SendOperationParams {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ParamsVisitor;

        impl<'de> Visitor<'de> for ParamsVisitor {
            type Value = SendOperationParams;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("[userOperation] or [userOperation, entryPoint]")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let user_operation: UserOperation = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let entry_point = seq
                    .next_element::<String>()?
                    .map(|value| parse_address(&value).map_err(de::Error::custom))
                    .transpose()?;
                if seq.next_element::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(3, &self));
                }
                Ok(SendOperationParams {
                    user_operation,
                    entry_point,
                })
            }
        }

        deserializer.deserialize_seq(ParamsVisitor)
    }
}

pub type GasAndPaymasterRequest = JsonRpcRequest<[GasAndPaymasterParams; 1]>;
pub type SendOperationRequest = JsonRpcRequest<SendOperationParams>;
pub type ReceiptRequest = JsonRpcRequest<[H256; 1]>;

/// Asks the relay to quote gas and sponsor a not-yet-signed operation.
///
/// The quoted operation carries zero gas fields, no paymaster data and the
/// dummy signature; `namespace` is the relay's method prefix, e.g. `alchemy`.
#[allow(clippy::too_many_arguments)]
pub fn request_gas_and_paymaster(
    id: u64,
    namespace: &str,
    policy_id: &str,
    entry_point: Address,
    call_data: Bytes,
    sender: Address,
    nonce: U256,
    init_code: Bytes,
) -> Result<GasAndPaymasterRequest, RelayError> {
    let dummy = dummy_signature()?;
    let user_operation = UserOperation {
        signature: dummy.clone(),
        ..UserOperation::new(sender, nonce, call_data).with_init_code(init_code)
    };
    Ok(JsonRpcRequest::new(
        id,
        format!("{}_{}", namespace, GAS_AND_PAYMASTER_METHOD),
        [GasAndPaymasterParams {
            policy_id: policy_id.to_string(),
            entry_point,
            user_operation,
            dummy_signature: dummy,
        }],
    ))
}

pub fn build_send_operation(
    id: u64,
    operation: UserOperation,
    entry_point: Address,
    append_entry_point: bool,
) -> SendOperationRequest {
    JsonRpcRequest::new(
        id,
        SEND_USER_OPERATION,
        SendOperationParams {
            user_operation: operation,
            entry_point: append_entry_point.then_some(entry_point),
        },
    )
}

pub fn build_get_receipt(id: u64, operation_hash: H256) -> ReceiptRequest {
    JsonRpcRequest::new(id, GET_USER_OPERATION_RECEIPT, [operation_hash])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse<R> {
    pub id: Option<u64>,
    pub jsonrpc: String,
    pub result: Option<R>,
    pub error: Option<JsonRpcErrorObject>,
}

impl<R> JsonRpcResponse<R> {
    /// Error object first: a populated `error` wins over any `result`.
    pub fn into_result(self) -> Result<Option<R>, RelayError> {
        if let Some(error) = self.error {
            warn!(code = error.code, message = %error.message, "relay returned an error");
            return Err(RelayError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(self.result)
    }
}

fn decode<R: DeserializeOwned>(response: &[u8]) -> Result<Option<R>, RelayError> {
    let parsed: JsonRpcResponse<R> =
        serde_json::from_slice(response).map_err(|e| RelayError::Parse(e.to_string()))?;
    parsed.into_result()
}

fn decode_required<R: DeserializeOwned>(response: &[u8]) -> Result<R, RelayError> {
    decode(response)?.ok_or_else(|| RelayError::Parse("response has no result".to_string()))
}

pub fn decode_gas_and_paymaster(response: &[u8]) -> Result<GasAndPaymasterResult, RelayError> {
    decode_required(response)
}

/// The relay's hash for an accepted operation.
pub fn decode_send_operation(response: &[u8]) -> Result<H256, RelayError> {
    decode_required(response)
}

/// `None` while the operation has not been included yet.
pub fn decode_receipt(response: &[u8]) -> Result<Option<UserOperationReceipt>, RelayError> {
    decode(response)
}
