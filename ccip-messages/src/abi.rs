//! Solidity definitions of the gateway interface.

use alloy_primitives::keccak256;
use alloy_primitives::Bytes;
use alloy_sol_types::sol;
use alloy_sol_types::SolCall;

use crate::Selector;

sol! {
    /// One off-chain lookup extracted from an `OffchainLookup` revert.
    #[derive(Debug, PartialEq, Eq)]
    struct Lookup {
        address sender;
        string[] urls;
        bytes callData;
    }

    /// A failed upstream attempt, as reported back to the caller.
    #[derive(Debug, PartialEq, Eq)]
    struct HttpError {
        uint16 status;
        string message;
    }

    /// Resolves a batch of lookups; `success[i]` tells whether `data[i]` is the
    /// gateway answer or an ABI encoded `HttpError[]`.
    #[derive(Debug, PartialEq, Eq)]
    function query(Lookup[] lookups) external returns (bool[] success, bytes[] data);
}

/// A contract function the gateway can serve.
///
/// The call type carries the argument schema and the selector; `Output` is the
/// Rust value the function's return tuple is encoded from.
pub trait GatewayFunction: SolCall + Send + 'static {
    type Output: Send + 'static;

    /// ABI encodes the return values, without selector.
    fn encode_output(output: &Self::Output) -> Vec<u8>;
}

impl GatewayFunction for queryCall {
    type Output = (Vec<bool>, Vec<Bytes>);

    fn encode_output(output: &Self::Output) -> Vec<u8> {
        Self::abi_encode_returns(output)
    }
}

/// Computes the selector of a canonical function signature, e.g.
/// `query((address,string[],bytes)[])`.
pub fn selector_of(signature: &str) -> Selector {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}
