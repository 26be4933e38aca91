// src/calldata.rs
//! Call data for the wallet, token and factory methods the relayer invokes.

use ethers::types::{Address, Bytes, U256};

use crate::abi::{encode_call, AbiValue};
use crate::error::EncodeError;

pub const EXECUTE: &str = "execute(address,uint256,bytes)";
pub const EXECUTE_BATCH: &str = "executeBatch(address[],bytes[])";
pub const MINT: &str = "mint(address,uint256)";
pub const APPROVE: &str = "approve(address,uint256)";
pub const APPROVE_FOR: &str = "approveFor(address,address,uint256)";
pub const CREATE_ACCOUNT: &str = "createAccount(address,uint256)";

/// Wallet call forwarding `data` to `dest`. No ether is attached.
pub fn execute(dest: Address, data: impl Into<Bytes>) -> Result<Bytes, EncodeError> {
    let call = encode_call(
        EXECUTE,
        &[
            AbiValue::Address(dest),
            AbiValue::Uint(U256::zero()),
            AbiValue::Bytes(data.into()),
        ],
    )?;
    Ok(call.into())
}

/// Wallet call forwarding `datas[i]` to `dests[i]` in one operation.
pub fn execute_batch(dests: &[Address], datas: &[Bytes]) -> Result<Bytes, EncodeError> {
    if dests.len() != datas.len() {
        return Err(EncodeError::ArrayLengthMismatch {
            left: dests.len(),
            right: datas.len(),
        });
    }
    let call = encode_call(
        EXECUTE_BATCH,
        &[
            AbiValue::AddressArray(dests.to_vec()),
            AbiValue::BytesArray(datas.to_vec()),
        ],
    )?;
    Ok(call.into())
}

pub fn mint(to: Address, amount: U256) -> Result<Bytes, EncodeError> {
    let call = encode_call(MINT, &[AbiValue::Address(to), AbiValue::Uint(amount)])?;
    Ok(call.into())
}

pub fn approve(spender: Address, amount: U256) -> Result<Bytes, EncodeError> {
    let call = encode_call(APPROVE, &[AbiValue::Address(spender), AbiValue::Uint(amount)])?;
    Ok(call.into())
}

/// Allowance granted by the token admin on behalf of `owner`.
pub fn approve_for(owner: Address, spender: Address, amount: U256) -> Result<Bytes, EncodeError> {
    let call = encode_call(
        APPROVE_FOR,
        &[
            AbiValue::Address(owner),
            AbiValue::Address(spender),
            AbiValue::Uint(amount),
        ],
    )?;
    Ok(call.into())
}

/// `factory || createAccount(owner, 0)`, deploying the owner's wallet on first use.
pub fn account_init_code(factory: Address, owner: Address) -> Result<Bytes, EncodeError> {
    let create = encode_call(
        CREATE_ACCOUNT,
        &[AbiValue::Address(owner), AbiValue::Uint(U256::zero())],
    )?;
    let mut init_code = factory.as_bytes().to_vec();
    init_code.extend(create);
    Ok(init_code.into())
}

/// Whole tokens to base units, `full_tokens * 10^decimals`.
pub fn token_amount(full_tokens: U256, decimals: u8) -> Result<U256, EncodeError> {
    U256::from(10)
        .checked_pow(U256::from(decimals))
        .and_then(|unit| full_tokens.checked_mul(unit))
        .ok_or_else(|| EncodeError::Overflow(format!("{} * 10^{}", full_tokens, decimals)))
}
