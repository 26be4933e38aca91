// src/abi.rs
//! Contract ABI encoding for the handful of parameter kinds user operations need.
//!
//! Static values (`address`, `uint256`, `bytes32`) occupy one 32-byte word in
//! the head. Dynamic values (`bytes`, `address[]`, `bytes[]`) put an offset in
//! the head and their length-prefixed content in the tail.

use std::fmt;
use std::str::FromStr;

use ethers::types::{Address, Bytes, H256, U256};

use crate::error::EncodeError;
use crate::hash::selector;
use crate::hexutil::{parse_address, parse_bytes32, parse_quantity};

pub const WORD: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Address,
    Uint256,
    Bytes32,
    Bytes,
    AddressArray,
    BytesArray,
}

impl ParamKind {
    pub fn is_dynamic(self) -> bool {
        matches!(
            self,
            ParamKind::Bytes | ParamKind::AddressArray | ParamKind::BytesArray
        )
    }

    fn name(self) -> &'static str {
        match self {
            ParamKind::Address => "address",
            ParamKind::Uint256 => "uint256",
            ParamKind::Bytes32 => "bytes32",
            ParamKind::Bytes => "bytes",
            ParamKind::AddressArray => "address[]",
            ParamKind::BytesArray => "bytes[]",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamKind {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "address" => Ok(ParamKind::Address),
            "uint256" | "uint" => Ok(ParamKind::Uint256),
            "bytes32" => Ok(ParamKind::Bytes32),
            "bytes" => Ok(ParamKind::Bytes),
            "address[]" => Ok(ParamKind::AddressArray),
            "bytes[]" => Ok(ParamKind::BytesArray),
            other => Err(EncodeError::UnsupportedType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Uint(U256),
    Bytes32(H256),
    Bytes(Bytes),
    AddressArray(Vec<Address>),
    BytesArray(Vec<Bytes>),
}

impl AbiValue {
    /// Address from hex text, any letter case.
    pub fn address(value: &str) -> Result<Self, EncodeError> {
        parse_address(value).map(AbiValue::Address)
    }

    /// Integer from a hex quantity such as `0xd8f8`.
    pub fn uint(value: &str) -> Result<Self, EncodeError> {
        parse_quantity(value).map(AbiValue::Uint)
    }

    pub fn bytes32(value: &str) -> Result<Self, EncodeError> {
        parse_bytes32(value).map(AbiValue::Bytes32)
    }

    pub fn kind(&self) -> ParamKind {
        match self {
            AbiValue::Address(_) => ParamKind::Address,
            AbiValue::Uint(_) => ParamKind::Uint256,
            AbiValue::Bytes32(_) => ParamKind::Bytes32,
            AbiValue::Bytes(_) => ParamKind::Bytes,
            AbiValue::AddressArray(_) => ParamKind::AddressArray,
            AbiValue::BytesArray(_) => ParamKind::BytesArray,
        }
    }
}

impl From<Address> for AbiValue {
    fn from(value: Address) -> Self {
        AbiValue::Address(value)
    }
}

impl From<U256> for AbiValue {
    fn from(value: U256) -> Self {
        AbiValue::Uint(value)
    }
}

impl From<H256> for AbiValue {
    fn from(value: H256) -> Self {
        AbiValue::Bytes32(value)
    }
}

impl From<[u8; 32]> for AbiValue {
    fn from(value: [u8; 32]) -> Self {
        AbiValue::Bytes32(H256(value))
    }
}

impl From<Bytes> for AbiValue {
    fn from(value: Bytes) -> Self {
        AbiValue::Bytes(value)
    }
}

/// Address in the low 20 bytes of a zeroed word.
pub fn address_word(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

/// Big-endian, left-zero-padded.
pub fn uint_word(value: U256) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    value.to_big_endian(&mut word);
    word
}

fn usize_word(value: usize) -> [u8; WORD] {
    uint_word(U256::from(value))
}

fn padded_len(len: usize) -> usize {
    (len + WORD - 1) / WORD * WORD
}

/// Encodes `values` as a tuple of the named `types`, e.g. `["address", "uint256"]`.
pub fn encode_parameters(types: &[&str], values: &[AbiValue]) -> Result<Vec<u8>, EncodeError> {
    if types.len() != values.len() {
        return Err(EncodeError::ArityMismatch {
            types: types.len(),
            values: values.len(),
        });
    }
    let kinds = types
        .iter()
        .map(|t| t.parse::<ParamKind>())
        .collect::<Result<Vec<_>, _>>()?;
    encode_tuple(&kinds, values)
}

pub fn encode_tuple(kinds: &[ParamKind], values: &[AbiValue]) -> Result<Vec<u8>, EncodeError> {
    if kinds.len() != values.len() {
        return Err(EncodeError::ArityMismatch {
            types: kinds.len(),
            values: values.len(),
        });
    }

    let mut encoded = Vec::with_capacity(values.len());
    for (index, (kind, value)) in kinds.iter().zip(values).enumerate() {
        if value.kind() != *kind {
            return Err(EncodeError::TypeMismatch {
                index,
                expected: *kind,
                found: value.kind(),
            });
        }
        encoded.push((*kind, encode_value(value)));
    }
    Ok(layout(encoded))
}

/// `selector(signature) || encode(args)`, with the parameter kinds read from the signature.
pub fn encode_call(signature: &str, values: &[AbiValue]) -> Result<Vec<u8>, EncodeError> {
    let kinds = signature_kinds(signature)?;
    let mut data = selector(signature).to_vec();
    data.extend(encode_tuple(&kinds, values)?);
    Ok(data)
}

fn signature_kinds(signature: &str) -> Result<Vec<ParamKind>, EncodeError> {
    let args = signature
        .find('(')
        .zip(signature.rfind(')'))
        .filter(|(open, close)| open < close)
        .map(|(open, close)| &signature[open + 1..close])
        .ok_or_else(|| EncodeError::UnsupportedType(signature.to_string()))?;
    if args.trim().is_empty() {
        return Ok(Vec::new());
    }
    args.split(',').map(str::parse::<ParamKind>).collect()
}

fn encode_value(value: &AbiValue) -> Vec<u8> {
    match value {
        AbiValue::Address(address) => address_word(address).to_vec(),
        AbiValue::Uint(value) => uint_word(*value).to_vec(),
        AbiValue::Bytes32(value) => value.0.to_vec(),
        AbiValue::Bytes(bytes) => encode_bytes(bytes),
        AbiValue::AddressArray(addresses) => {
            let mut out = Vec::with_capacity(WORD * (addresses.len() + 1));
            out.extend_from_slice(&usize_word(addresses.len()));
            for address in addresses {
                out.extend_from_slice(&address_word(address));
            }
            out
        }
        AbiValue::BytesArray(items) => {
            let mut out = usize_word(items.len()).to_vec();
            let elements = items
                .iter()
                .map(|item| (ParamKind::Bytes, encode_bytes(item)))
                .collect();
            out.extend(layout(elements));
            out
        }
    }
}

fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(WORD + padded_len(bytes.len()));
    out.extend_from_slice(&usize_word(bytes.len()));
    out.extend_from_slice(bytes);
    out.resize(WORD + padded_len(bytes.len()), 0);
    out
}

// Static values are a single head word. Offsets in the head are relative to
// the start of the enclosing tuple.
fn layout(encoded: Vec<(ParamKind, Vec<u8>)>) -> Vec<u8> {
    let head_len = WORD * encoded.len();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for (kind, bytes) in encoded {
        if kind.is_dynamic() {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
            tail.extend(bytes);
        } else {
            head.extend(bytes);
        }
    }
    head.extend(tail);
    head
}
