//! ABI encoding of lookup failures.
//!
//! A failed lookup is reported as `abi.encode(HttpError[])`, i.e. the schema
//! `(uint16,string)[]`, so a client that can decode the success payload can
//! decode the failure one too.

use alloy_primitives::Bytes;
use alloy_sol_types::sol_data::Array;
use alloy_sol_types::SolType;

use crate::abi::HttpError;
use crate::ErrorEntry;

/// Solidity type of an encoded failure.
pub type HttpErrors = Array<HttpError>;

/// Encodes every `(status, message)` pair, keeping their order.
pub fn encode_errors(entries: &[ErrorEntry]) -> Bytes {
    let errors = entries
        .iter()
        .map(|(status, message)| HttpError {
            status: *status,
            message: message.clone(),
        })
        .collect::<Vec<_>>();

    HttpErrors::abi_encode(&errors).into()
}

/// Encodes a single failure.
pub fn encode_error(
    status: u16,
    message: impl Into<String>,
) -> Bytes {
    encode_errors(&[(status, message.into())])
}

/// Decodes a payload produced by [`encode_errors`].
pub fn decode_errors(data: &[u8]) -> Result<Vec<ErrorEntry>, alloy_sol_types::Error> {
    let errors = HttpErrors::abi_decode(data, true)?;

    Ok(errors
        .into_iter()
        .map(|error| (error.status, error.message))
        .collect())
}
