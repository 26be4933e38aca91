// src/relayer.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Bytes, H256};
use tracing::{debug, info, warn};

use crate::calldata::account_init_code;
use crate::config::RelayConfig;
use crate::envelope::{
    build_get_receipt, build_send_operation, decode_gas_and_paymaster, decode_receipt,
    decode_send_operation, request_gas_and_paymaster, SendOperationRequest,
};
use crate::error::RelayError;
use crate::signer::OperationSigner;
use crate::types::{GasAndPaymasterResult, OperationCall, UserOperation, UserOperationReceipt};
use crate::userop::user_operation_hash;

/// Carries one JSON-RPC request body to the relay and returns the raw response body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, body: Vec<u8>) -> Result<Vec<u8>, RelayError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, body: Vec<u8>) -> Result<Vec<u8>, RelayError> {
        (**self).send(body).await
    }
}

/// HTTP POST transport. Failures are returned as-is, retrying is up to the caller.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, body: Vec<u8>) -> Result<Vec<u8>, RelayError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| RelayError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::Transport(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(RelayError::Transport(format!(
                "HTTP request failed with status {}: {}",
                status,
                String::from_utf8_lossy(&bytes)
            )));
        }

        Ok(bytes.to_vec())
    }
}

/// What the service needs from a relay, independent of the vendor behind it.
#[async_trait]
pub trait OperationRelay: Send + Sync {
    /// Sponsors, signs and submits the call. Returns the operation hash.
    async fn submit(&self, call: OperationCall) -> Result<H256, RelayError>;

    /// `None` until the operation is included.
    async fn receipt(&self, operation_hash: H256) -> Result<Option<UserOperationReceipt>, RelayError>;

    /// Hash the wallet owner signs for `operation` under this relay's EntryPoint and chain.
    fn operation_hash(&self, operation: &UserOperation) -> Result<H256, RelayError>;
}

/// Builds, signs and relays user operations through a sponsoring bundler.
pub struct Relayer<T> {
    transport: T,
    signer: OperationSigner,
    config: RelayConfig,
    next_id: AtomicU64,
}

impl<T: Transport> Relayer<T> {
    pub fn new(transport: T, signer: OperationSigner, config: RelayConfig) -> Self {
        Self {
            transport,
            signer,
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn signer(&self) -> &OperationSigner {
        &self.signer
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Factory init code when the call deploys the wallet, empty otherwise.
    pub fn init_code_for(&self, call: &OperationCall) -> Result<Bytes, RelayError> {
        match (call.deploy_for, self.config.account_factory) {
            (None, _) => Ok(Bytes::new()),
            (Some(owner), Some(factory)) => Ok(account_init_code(factory, owner)?),
            (Some(_), None) => Err(RelayError::InvalidParameters(
                "wallet deployment requested but no account factory is configured".to_string(),
            )),
        }
    }

    pub async fn request_gas_and_paymaster(
        &self,
        call: &OperationCall,
    ) -> Result<GasAndPaymasterResult, RelayError> {
        let request = request_gas_and_paymaster(
            self.next_id(),
            &self.config.namespace,
            &self.config.policy_id,
            self.config.entry_point,
            call.call_data.clone(),
            call.sender,
            call.nonce,
            self.init_code_for(call)?,
        )?;
        debug!(id = request.id, method = %request.method, sender = ?call.sender, "requesting gas and paymaster data");

        let response = self.transport.send(request.to_json()?).await?;
        decode_gas_and_paymaster(&response)
    }

    /// Hash of `operation` under the configured EntryPoint and chain.
    pub fn operation_hash(&self, operation: &UserOperation) -> Result<H256, RelayError> {
        Ok(user_operation_hash(
            operation,
            self.config.entry_point,
            self.config.chain_id,
        )?)
    }

    /// Fills in the relay's gas quote and returns the hash to sign with the still unsigned operation.
    pub async fn prepare(&self, call: &OperationCall) -> Result<(H256, UserOperation), RelayError> {
        let gas = self.request_gas_and_paymaster(call).await?;
        let operation = UserOperation::new(call.sender, call.nonce, call.call_data.clone())
            .with_init_code(self.init_code_for(call)?)
            .with_gas_and_paymaster(&gas);
        let hash = self.operation_hash(&operation)?;
        debug!(hash = ?hash, sender = ?call.sender, "operation prepared");
        Ok((hash, operation))
    }

    /// Attaches an externally produced signature and builds the send request.
    pub fn attach_signature(
        &self,
        operation: UserOperation,
        signature: impl Into<Bytes>,
    ) -> Result<SendOperationRequest, RelayError> {
        let operation = operation.with_signature(signature)?;
        Ok(build_send_operation(
            self.next_id(),
            operation,
            self.config.entry_point,
            self.config.append_entry_point,
        ))
    }

    /// Signs `operation` with the relayer's own key.
    pub fn sign(&self, operation: UserOperation) -> Result<UserOperation, RelayError> {
        let hash = self.operation_hash(&operation)?;
        let signature = self.signer.sign_hash(hash.as_bytes())?;
        operation.with_signature(signature.to_vec())
    }

    pub async fn build_and_sign(&self, call: &OperationCall) -> Result<UserOperation, RelayError> {
        let (_, operation) = self.prepare(call).await?;
        self.sign(operation)
    }

    /// Sends a signed operation and returns the hash the relay assigned to it.
    pub async fn send(&self, operation: UserOperation) -> Result<H256, RelayError> {
        if !operation.is_signed() {
            return Err(RelayError::InvalidSignatureLength(operation.signature.len()));
        }
        let request = build_send_operation(
            self.next_id(),
            operation,
            self.config.entry_point,
            self.config.append_entry_point,
        );
        self.send_request(&request).await
    }

    pub async fn send_request(&self, request: &SendOperationRequest) -> Result<H256, RelayError> {
        let response = self.transport.send(request.to_json()?).await?;
        match decode_send_operation(&response) {
            Ok(hash) => {
                info!(hash = ?hash, sender = ?request.params.user_operation.sender, "operation accepted by relay");
                Ok(hash)
            }
            Err(e) => {
                warn!(id = request.id, "operation rejected: {}", e);
                Err(e)
            }
        }
    }

    pub async fn get_receipt(
        &self,
        operation_hash: H256,
    ) -> Result<Option<UserOperationReceipt>, RelayError> {
        let request = build_get_receipt(self.next_id(), operation_hash);
        let response = self.transport.send(request.to_json()?).await?;
        let receipt = decode_receipt(&response)?;
        if receipt.is_none() {
            debug!(hash = ?operation_hash, "operation not included yet");
        }
        Ok(receipt)
    }
}

#[async_trait]
impl<T: Transport> OperationRelay for Relayer<T> {
    async fn submit(&self, call: OperationCall) -> Result<H256, RelayError> {
        let operation = self.build_and_sign(&call).await?;
        self.send(operation).await
    }

    async fn receipt(&self, operation_hash: H256) -> Result<Option<UserOperationReceipt>, RelayError> {
        self.get_receipt(operation_hash).await
    }

    fn operation_hash(&self, operation: &UserOperation) -> Result<H256, RelayError> {
        Relayer::operation_hash(self, operation)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::calldata::{approve, execute, execute_batch, mint};
    use crate::hexutil::{parse_address, parse_hex_bytes, to_hex_prefixed};
    use ethers::types::{Address, U256};

    pub(crate) const PRIVATE_KEY: &str =
        "ac4bab11ad6b7ec2c84e5e293710828234ab63b62d377a23681228be588fab57";
    const SCW: &str = "0x045F756F248799F4413a026100Ae49e5E7F2031E";
    const OWNER: &str = "0x61d1eeE7FBF652482DEa98A1Df591C626bA09a60";
    const TOKEN: &str = "0x8AE88b2b35F15D6320D77ab8EC7E3410F78376F6";

    const GAS_RESPONSE: &str = r#"{"jsonrpc":"2.0","id":1,"result":{
        "preVerificationGas":"0xab84",
        "callGasLimit":"0x5000",
        "verificationGasLimit":"0xd7e2",
        "paymasterAndData":"0xc03aac639bb21233e0139381970328db8bceeb67000064f9ca6c000064f9dad40000000000000000000000000000000000000000796f4ebcef9ae51a6d5131b1344228c971982353cc698f67e309ffb320ef04787ccec730f240788c78e6e1d096e3376a49782f51d38ba28b9eaeed1bca833be01c",
        "maxFeePerGas":"0xf732015ce",
        "maxPriorityFeePerGas":"0x60b"}}"#;

    const SEND_RESPONSE: &str = r#"{"jsonrpc":"2.0","id":2,"result":"0xa417d6e564c27e7803097f7c712490896d093e27c6f9f44b0192252d82522792"}"#;

    /// Replays canned responses in order and records every request body.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        responses: Mutex<VecDeque<Vec<u8>>>,
        requests: Mutex<Vec<serde_json::Value>>,
    }

    impl MockTransport {
        pub(crate) fn replying(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|r| r.as_bytes().to_vec()).collect()),
                requests: Mutex::default(),
            })
        }

        pub(crate) fn requests(&self) -> Vec<serde_json::Value> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, body: Vec<u8>) -> Result<Vec<u8>, RelayError> {
            self.requests
                .lock()
                .unwrap()
                .push(serde_json::from_slice(&body).unwrap());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| RelayError::Transport("connection closed".to_string()))
        }
    }

    fn addr(value: &str) -> Address {
        parse_address(value).unwrap()
    }

    fn config() -> RelayConfig {
        RelayConfig::new("http://relay.invalid", "22032aca-2101-40d5-8550-14a6a11366ba", 11155111)
            .unwrap()
    }

    fn relayer(transport: Arc<MockTransport>, config: RelayConfig) -> Relayer<Arc<MockTransport>> {
        Relayer::new(
            transport,
            OperationSigner::from_private_key(PRIVATE_KEY).unwrap(),
            config,
        )
    }

    fn mint_call(nonce: u64) -> OperationCall {
        let inner = mint(addr(SCW), U256::from(100)).unwrap();
        OperationCall::new(addr(SCW), U256::from(nonce), execute(addr(TOKEN), inner).unwrap())
    }

    #[test]
    fn exposes_signer_and_config() {
        let config = config().appending_entry_point(true);
        let relayer = relayer(MockTransport::replying(&[]), config.clone());
        assert_eq!(relayer.config(), &config);
        assert_eq!(
            relayer.signer().address(),
            OperationSigner::from_private_key(PRIVATE_KEY).unwrap().address()
        );
    }

    #[tokio::test]
    async fn http_transport_reports_connection_failure() {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let transport = HttpTransport::with_client(client, "http://127.0.0.1:1");
        assert!(matches!(
            transport.send(b"{}".to_vec()).await,
            Err(RelayError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn builds_and_signs_sponsored_operation() {
        let transport = MockTransport::replying(&[GAS_RESPONSE]);
        let relayer = relayer(transport.clone(), config());

        let operation = relayer.build_and_sign(&mint_call(8)).await.unwrap();

        assert_eq!(operation.nonce, U256::from(8));
        assert!(operation.init_code.is_empty());
        assert_eq!(operation.call_gas_limit, U256::from(0x5000));
        assert_eq!(
            to_hex_prefixed(&operation.signature),
            "0x571ec8a77c9ed42958db1f2f31b3883f773cb4bb6a225208fa13ea8f53dc435939c22e6fae79da717977881d5288bc7de2b840b54b27df6230906244c665e6d51b"
        );

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["method"], "alchemy_requestGasAndPaymasterAndData");
        assert_eq!(requests[0]["params"][0]["userOperation"]["nonce"], "0x8");
    }

    #[tokio::test]
    async fn deploys_wallet_through_factory() {
        let transport = MockTransport::replying(&[GAS_RESPONSE]);
        let config = config().with_account_factory(OWNER).unwrap();
        let relayer = relayer(transport.clone(), config);

        let call = mint_call(8).deploying_for(addr(OWNER));
        let operation = relayer.build_and_sign(&call).await.unwrap();

        assert_eq!(
            to_hex_prefixed(&operation.init_code),
            "0x61d1eee7fbf652482dea98a1df591c626ba09a605fbfb9cf00000000000000000000000061d1eee7fbf652482dea98a1df591c626ba09a600000000000000000000000000000000000000000000000000000000000000000"
        );
        assert_eq!(
            to_hex_prefixed(&operation.signature),
            "0xd1e8c6a31b68ea76f58428f95c59e6eaea030869ffd198acd1bf767448a726553bc94a719f5fcdccc28a95bd527c9f526ce813e38791ffcf7ba5d5cfb0b854011c"
        );
        assert_eq!(
            transport.requests()[0]["params"][0]["userOperation"]["initCode"],
            to_hex_prefixed(&operation.init_code)
        );
    }

    #[tokio::test]
    async fn deployment_without_factory_is_rejected() {
        let transport = MockTransport::replying(&[]);
        let relayer = relayer(transport.clone(), config());
        let call = mint_call(8).deploying_for(addr(OWNER));

        let err = relayer.build_and_sign(&call).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidParameters(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn batch_operation_hash_and_signature() {
        let gas = r#"{"jsonrpc":"2.0","id":1,"result":{
            "preVerificationGas":"0xc3fc",
            "callGasLimit":"0x7000",
            "verificationGasLimit":"0xdb25",
            "paymasterAndData":"0xc03aac639bb21233e0139381970328db8bceeb670000652d4dfa0000652d5e62000000000000000000000000000000000000000008ffdc2f37b611e7a11839283f4bbe14abc0d7a3ff6f418e40f36cf494b9cacf1bb5c34020b38ce526c8940d6a8d64fa2ef2198667093cf09b088d98459bc89c1b",
            "maxFeePerGas":"0xa23be3181",
            "maxPriorityFeePerGas":"0x6422c4b"}}"#;
        let transport = MockTransport::replying(&[gas]);
        let relayer = relayer(transport, config());

        let token = addr(TOKEN);
        let call_data = execute_batch(
            &[token, token],
            &[
                mint(addr(SCW), U256::from(100)).unwrap(),
                approve(
                    addr("0xc8b944dda833fb33134b96199e52f999dfbd6689"),
                    U256::from(100_000_000u64),
                )
                .unwrap(),
            ],
        )
        .unwrap();
        let call = OperationCall::new(addr(SCW), U256::from(0x15), call_data);

        let (hash, unsigned) = relayer.prepare(&call).await.unwrap();
        assert_eq!(
            format!("{:?}", hash),
            "0xf629143c5622adb70b0f0aac4c56c644d1d3f22f67aaea673014ab307795e94f"
        );
        assert!(!unsigned.is_signed());

        let signed = relayer.sign(unsigned).unwrap();
        assert_eq!(
            to_hex_prefixed(&signed.signature),
            "0x48e0411bf17e1beb381b65b9d460e174589cc7d6ff96b307cad5a7c37bd14ac53846077023f38b07b7811d7dd62b374ca14d204f6f59a71753f452d0dd2048db1b"
        );
    }

    #[tokio::test]
    async fn submit_sends_signed_operation() {
        let transport = MockTransport::replying(&[GAS_RESPONSE, SEND_RESPONSE]);
        let relayer = relayer(transport.clone(), config().appending_entry_point(true));

        let hash = relayer.submit(mint_call(8)).await.unwrap();
        assert_eq!(
            format!("{:?}", hash),
            "0xa417d6e564c27e7803097f7c712490896d093e27c6f9f44b0192252d82522792"
        );

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["id"], 1);
        assert_eq!(requests[1]["id"], 2);
        assert_eq!(requests[1]["method"], "eth_sendUserOperation");
        let params = requests[1]["params"].as_array().unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[1], "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");
        assert_eq!(params[0]["sender"], SCW);
        assert_eq!(
            params[0]["signature"],
            "0x571ec8a77c9ed42958db1f2f31b3883f773cb4bb6a225208fa13ea8f53dc435939c22e6fae79da717977881d5288bc7de2b840b54b27df6230906244c665e6d51b"
        );
    }

    #[tokio::test]
    async fn external_signature_is_attached() {
        let transport = MockTransport::replying(&[GAS_RESPONSE, SEND_RESPONSE]);
        let relayer = relayer(transport.clone(), config());

        let (hash, unsigned) = relayer.prepare(&mint_call(8)).await.unwrap();
        let signature = OperationSigner::from_private_key(PRIVATE_KEY)
            .unwrap()
            .sign_hash(hash.as_bytes())
            .unwrap();

        assert!(matches!(
            relayer.attach_signature(unsigned.clone(), vec![0u8; 64]),
            Err(RelayError::InvalidSignatureLength(64))
        ));

        let request = relayer.attach_signature(unsigned, signature.to_vec()).unwrap();
        assert_eq!(request.params.entry_point, None);
        relayer.send_request(&request).await.unwrap();
        assert_eq!(transport.requests()[1]["params"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unsigned_operation_is_not_sent() {
        let transport = MockTransport::replying(&[]);
        let relayer = relayer(transport.clone(), config());
        let unsigned = UserOperation::new(addr(SCW), U256::one(), Bytes::new());

        assert!(matches!(
            relayer.send(unsigned).await,
            Err(RelayError::InvalidSignatureLength(0))
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn relay_errors_are_surfaced() {
        let rejected = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid policy"}}"#;
        let transport = MockTransport::replying(&[rejected]);
        let relayer = relayer(transport, config());

        match relayer.submit(mint_call(8)).await {
            Err(RelayError::Rpc { code, message }) => {
                assert_eq!(code, -32602);
                assert_eq!(message, "invalid policy");
            }
            other => panic!("expected relay error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_failure_is_surfaced() {
        let relayer = relayer(MockTransport::replying(&[]), config());
        assert!(matches!(
            relayer.get_receipt(H256::zero()).await,
            Err(RelayError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn receipt_lookup() {
        let pending = r#"{"jsonrpc":"2.0","id":1,"result":null}"#;
        let included = r#"{"jsonrpc":"2.0","id":2,"result":{
            "userOpHash":"0xa417d6e564c27e7803097f7c712490896d093e27c6f9f44b0192252d82522792",
            "sender":"0x045F756F248799F4413a026100Ae49e5E7F2031E",
            "nonce":"0x8",
            "actualGasCost":"0x1",
            "actualGasUsed":"0x2",
            "success":false,
            "reason":"AA23 reverted"}}"#;
        let transport = MockTransport::replying(&[pending, included]);
        let relayer = relayer(transport.clone(), config());
        let hash = H256::from_slice(
            &parse_hex_bytes("0xa417d6e564c27e7803097f7c712490896d093e27c6f9f44b0192252d82522792")
                .unwrap(),
        );

        assert_eq!(relayer.receipt(hash).await.unwrap(), None);
        let receipt = relayer.receipt(hash).await.unwrap().unwrap();
        assert!(!receipt.success);
        assert_eq!(receipt.reason.as_deref(), Some("AA23 reverted"));
        assert_eq!(
            transport.requests()[0]["method"],
            "eth_getUserOperationReceipt"
        );
    }
}
