//! Wire types shared between the gateway and the lookup resolver.
//!
//! Everything crossing the gateway boundary is either Solidity ABI encoded
//! (calldata, return data, lookup errors) or JSON wrapping hex strings.

pub mod abi;
pub mod errors;
pub mod types;

pub use abi::GatewayFunction;
pub use abi::HttpError;
pub use abi::Lookup;
pub use errors::decode_errors;
pub use errors::encode_error;
pub use errors::encode_errors;
pub use types::BatchOutcome;
pub use types::LookupOutcome;
pub use types::LookupTriple;
pub use types::ResponseData;
pub use types::RpcCall;
pub use types::RpcResponse;

/// A 4-byte function selector.
pub type Selector = [u8; 4];

/// A `(status, message)` pair describing one failed upstream attempt.
pub type ErrorEntry = (u16, String);
