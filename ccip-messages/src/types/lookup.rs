use alloy_primitives::hex;
use alloy_primitives::Address;
use alloy_primitives::Bytes;

use crate::abi::Lookup;
use crate::errors::encode_errors;
use crate::ErrorEntry;

/// A single off-chain lookup: who asked, where to ask, and what to ask.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupTriple {
    pub sender: Address,

    /// Candidate URL templates, in priority order. May contain the `{sender}`
    /// and `{data}` placeholders.
    pub urls: Vec<String>,

    pub data: Bytes,
}

impl LookupTriple {
    pub fn new(
        sender: Address,
        urls: Vec<String>,
        data: Bytes,
    ) -> Self {
        Self { sender, urls, data }
    }

    /// Lowercase, `0x` prefixed sender.
    pub fn sender_hex(&self) -> String {
        hex::encode_prefixed(self.sender.as_slice())
    }

    /// Lowercase, `0x` prefixed calldata.
    pub fn data_hex(&self) -> String {
        hex::encode_prefixed(&self.data)
    }
}

impl From<Lookup> for LookupTriple {
    fn from(lookup: Lookup) -> Self {
        Self {
            sender: lookup.sender,
            urls: lookup.urls,
            data: lookup.callData,
        }
    }
}

/// Result of resolving one [`LookupTriple`].
///
/// When `success` is false, `data` is an ABI encoded `HttpError[]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupOutcome {
    pub success: bool,
    pub data: Bytes,
}

impl LookupOutcome {
    pub fn success(data: Bytes) -> Self {
        Self {
            success: true,
            data,
        }
    }

    pub fn failure(entries: &[ErrorEntry]) -> Self {
        Self {
            success: false,
            data: encode_errors(entries),
        }
    }
}

/// Index aligned results of a batch of lookups.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub success: Vec<bool>,
    pub data: Vec<Bytes>,
}

impl BatchOutcome {
    pub fn len(&self) -> usize {
        self.success.len()
    }

    pub fn is_empty(&self) -> bool {
        self.success.is_empty()
    }
}

impl FromIterator<LookupOutcome> for BatchOutcome {
    fn from_iter<I: IntoIterator<Item = LookupOutcome>>(iter: I) -> Self {
        let (success, data) = iter
            .into_iter()
            .map(|outcome| (outcome.success, outcome.data))
            .unzip();

        Self { success, data }
    }
}

impl From<BatchOutcome> for (Vec<bool>, Vec<Bytes>) {
    fn from(outcome: BatchOutcome) -> Self {
        (outcome.success, outcome.data)
    }
}
