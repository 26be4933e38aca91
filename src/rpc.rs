// src/rpc.rs
use std::sync::Arc;

use ethers::types::H256;
use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::error::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use tracing::{debug, error, info};

use crate::error::RelayError;
use crate::relayer::OperationRelay;
use crate::types::{OperationCall, UserOperation, UserOperationReceipt};

/// Code used for every failure that did not come from the relay itself.
pub const SERVICE_ERROR_CODE: i32 = -32000;

#[rpc(server, namespace = "aa")]
pub trait OperationRpc {
    /// Sponsors, signs and relays a wallet call; returns the operation hash.
    #[method(name = "submitOperation")]
    async fn submit_operation(&self, call: OperationCall) -> RpcResult<H256>;

    #[method(name = "getOperationReceipt")]
    async fn get_operation_receipt(&self, operation_hash: H256) -> RpcResult<Option<UserOperationReceipt>>;

    /// Hash a wallet owner would sign for the given operation.
    #[method(name = "userOperationHash")]
    async fn user_operation_hash(&self, operation: UserOperation) -> RpcResult<H256>;
}

pub struct OperationRpcImpl {
    relay: Arc<dyn OperationRelay>,
}

impl OperationRpcImpl {
    pub fn new(relay: Arc<dyn OperationRelay>) -> Self {
        Self { relay }
    }
}

/// Relay error objects keep their code; anything else becomes a service error.
pub fn to_rpc_error(e: RelayError) -> ErrorObjectOwned {
    match e {
        RelayError::Rpc { code, message } => ErrorObjectOwned::owned(
            i32::try_from(code).unwrap_or(SERVICE_ERROR_CODE),
            message,
            None::<()>,
        ),
        other => ErrorObjectOwned::owned(
            SERVICE_ERROR_CODE,
            format!("Relay error: {}", other),
            None::<()>,
        ),
    }
}

#[async_trait]
impl OperationRpcServer for OperationRpcImpl {
    async fn submit_operation(&self, call: OperationCall) -> RpcResult<H256> {
        debug!("Received operation for sender: {:?}", call.sender);

        match self.relay.submit(call).await {
            Ok(hash) => {
                info!("Operation relayed: {:?}", hash);
                Ok(hash)
            }
            Err(e) => {
                error!("Failed to relay operation: {}", e);
                Err(to_rpc_error(e))
            }
        }
    }

    async fn get_operation_receipt(&self, operation_hash: H256) -> RpcResult<Option<UserOperationReceipt>> {
        self.relay.receipt(operation_hash).await.map_err(|e| {
            error!("Failed to fetch receipt for {:?}: {}", operation_hash, e);
            to_rpc_error(e)
        })
    }

    async fn user_operation_hash(&self, operation: UserOperation) -> RpcResult<H256> {
        self.relay.operation_hash(&operation).map_err(to_rpc_error)
    }
}

pub fn rpc_module(rpc: OperationRpcImpl) -> RpcModule<OperationRpcImpl> {
    rpc.into_rpc()
}
