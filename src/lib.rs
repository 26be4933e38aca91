// src/lib.rs
//! Builds, signs and relays ERC-4337 user operations for smart-contract wallets.

pub mod abi;
pub mod calldata;
pub mod config;
pub mod envelope;
pub mod error;
pub mod hash;
pub mod hexutil;
pub mod relayer;
pub mod rpc;
pub mod signer;
pub mod types;
pub mod userop;

pub use config::RelayConfig;
pub use error::{EncodeError, RelayError};
pub use relayer::{HttpTransport, OperationRelay, Relayer, Transport};
pub use signer::OperationSigner;
pub use types::{GasAndPaymasterResult, OperationCall, UserOperation, UserOperationReceipt};
pub use userop::{pack_user_operation, user_operation_hash};
