// src/config.rs
use ethers::types::Address;

use crate::error::RelayError;
use crate::hexutil::parse_address;

/// EntryPoint v0.6, deployed at the same address on every supported chain.
pub const DEFAULT_ENTRY_POINT: &str = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789";
pub const DEFAULT_NAMESPACE: &str = "alchemy";

/// Where and how operations are relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub relay_url: String,
    /// Method prefix of the sponsor call, e.g. `alchemy_requestGasAndPaymasterAndData`.
    pub namespace: String,
    pub policy_id: String,
    pub entry_point: Address,
    pub chain_id: u64,
    pub account_factory: Option<Address>,
    /// Send the EntryPoint as a second `eth_sendUserOperation` parameter.
    pub append_entry_point: bool,
}

impl RelayConfig {
    pub fn new(relay_url: impl Into<String>, policy_id: impl Into<String>, chain_id: u64) -> Result<Self, RelayError> {
        Ok(Self {
            relay_url: relay_url.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            policy_id: policy_id.into(),
            entry_point: parse_address(DEFAULT_ENTRY_POINT)?,
            chain_id,
            account_factory: None,
            append_entry_point: false,
        })
    }

    pub fn with_entry_point(mut self, entry_point: &str) -> Result<Self, RelayError> {
        self.entry_point = parse_address(entry_point)?;
        Ok(self)
    }

    pub fn with_account_factory(mut self, factory: &str) -> Result<Self, RelayError> {
        self.account_factory = Some(parse_address(factory)?);
        Ok(self)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn appending_entry_point(mut self, append: bool) -> Self {
        self.append_entry_point = append;
        self
    }
}
