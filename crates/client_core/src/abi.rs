//! Minimal contract ABI codec for the voting contract's two functions.

use alloy_primitives::{hex, keccak256, U256};
use shared::domain::ContestantRecord;
use thiserror::Error;

const WORD: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("return data too short: need {needed} bytes, have {available}")]
    OutOfBounds { needed: usize, available: usize },
    #[error("encoded offset or length does not fit in memory")]
    OffsetTooLarge,
    #[error("uint256 value {0} does not fit in u64")]
    ValueTooLarge(U256),
    #[error("contestant name is not valid utf-8")]
    InvalidUtf8,
    #[error("invalid hex payload: {0}")]
    Hex(String),
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Calldata for a function taking only `uint256` arguments.
pub fn encode_call(signature: &str, args: &[U256]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + args.len() * WORD);
    out.extend_from_slice(&selector(signature));
    for arg in args {
        out.extend_from_slice(&arg.to_be_bytes::<WORD>());
    }
    out
}

pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode_prefixed(bytes)
}

pub fn from_hex(payload: &str) -> Result<Vec<u8>, AbiError> {
    hex::decode(payload).map_err(|err| AbiError::Hex(err.to_string()))
}

/// Decodes the return data of `getContestants()`: a dynamic array of
/// `(string name, uint256 likes)` tuples.
pub fn decode_contestants(data: &[u8]) -> Result<Vec<ContestantRecord>, AbiError> {
    let reader = Reader { data };
    let array_start = reader.offset_at(0)?;
    let len = reader.offset_at(array_start)?;
    let heads_start = checked(array_start.checked_add(WORD))?;

    let heads_len = checked(len.checked_mul(WORD))?;
    reader.slice(heads_start, heads_len)?;

    let mut records = Vec::with_capacity(len);
    for i in 0..len {
        let element_start = checked(heads_start.checked_add(reader.offset_at(heads_start + i * WORD)?))?;
        let name_start = checked(element_start.checked_add(reader.offset_at(element_start)?))?;
        let likes = reader.uint_at(checked(element_start.checked_add(WORD))?)?;

        let name_len = reader.offset_at(name_start)?;
        let name_bytes = reader.slice(checked(name_start.checked_add(WORD))?, name_len)?;
        let name = String::from_utf8(name_bytes.to_vec()).map_err(|_| AbiError::InvalidUtf8)?;

        records.push(ContestantRecord {
            name,
            likes: u256_to_u64(likes)?,
        });
    }

    Ok(records)
}

fn u256_to_u64(value: U256) -> Result<u64, AbiError> {
    if value.bit_len() > 64 {
        return Err(AbiError::ValueTooLarge(value));
    }
    Ok(value.as_limbs()[0])
}

fn checked(value: Option<usize>) -> Result<usize, AbiError> {
    value.ok_or(AbiError::OffsetTooLarge)
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn slice(&self, start: usize, len: usize) -> Result<&'a [u8], AbiError> {
        let end = checked(start.checked_add(len))?;
        if end > self.data.len() {
            return Err(AbiError::OutOfBounds {
                needed: end,
                available: self.data.len(),
            });
        }
        Ok(&self.data[start..end])
    }

    fn uint_at(&self, offset: usize) -> Result<U256, AbiError> {
        Ok(U256::from_be_slice(self.slice(offset, WORD)?))
    }

    fn offset_at(&self, offset: usize) -> Result<usize, AbiError> {
        let value = self.uint_at(offset)?;
        let value = u256_to_u64(value).map_err(|_| AbiError::OffsetTooLarge)?;
        usize::try_from(value).map_err(|_| AbiError::OffsetTooLarge)
    }
}

/// Encodes a contestant list the way the contract returns it.
#[cfg(test)]
pub(crate) fn encode_contestants(records: &[(&str, u64)]) -> Vec<u8> {
    fn word(value: usize) -> [u8; WORD] {
        U256::from(value).to_be_bytes::<WORD>()
    }

    let mut elements = Vec::with_capacity(records.len());
    for (name, likes) in records {
        let mut element = Vec::new();
        element.extend_from_slice(&word(2 * WORD));
        element.extend_from_slice(&U256::from(*likes).to_be_bytes::<WORD>());
        element.extend_from_slice(&word(name.len()));
        let mut padded = name.as_bytes().to_vec();
        padded.resize(name.len().div_ceil(WORD) * WORD, 0);
        element.extend_from_slice(&padded);
        elements.push(element);
    }

    let mut out = Vec::new();
    out.extend_from_slice(&word(WORD));
    out.extend_from_slice(&word(records.len()));
    let mut next = records.len() * WORD;
    for element in &elements {
        out.extend_from_slice(&word(next));
        next += element.len();
    }
    for element in elements {
        out.extend_from_slice(&element);
    }
    out
}

#[cfg(test)]
#[path = "tests/abi_tests.rs"]
mod tests;
