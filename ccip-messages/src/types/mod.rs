use alloy_primitives::Address;
use alloy_primitives::Bytes;
use serde_derive::Deserialize;
use serde_derive::Serialize;

mod lookup;

pub use lookup::BatchOutcome;
pub use lookup::LookupOutcome;
pub use lookup::LookupTriple;

/// A contract call received by the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcCall {
    /// The contract that emitted the `OffchainLookup`.
    pub to: Address,

    /// Selector followed by the ABI encoded arguments.
    pub data: Bytes,
}

impl RpcCall {
    pub fn new(
        to: Address,
        data: Bytes,
    ) -> Self {
        Self { to, data }
    }
}

/// Outcome of dispatching an [`RpcCall`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RpcResponse {
    /// HTTP status the response is served with.
    pub status: u16,

    /// Serialized as the JSON body.
    pub body: ResponseBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResponseBody {
    pub data: ResponseData,
}

/// `{"data": "0x.."}` on success, `{"data": {"error": ".."}}` otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ResponseData {
    Error { error: String },
    Result(Bytes),
}

impl RpcResponse {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const INTERNAL_ERROR: u16 = 500;

    pub fn ok(data: impl Into<Bytes>) -> Self {
        Self {
            status: Self::OK,
            body: ResponseBody {
                data: ResponseData::Result(data.into()),
            },
        }
    }

    pub fn error(
        status: u16,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status,
            body: ResponseBody {
                data: ResponseData::Error {
                    error: error.into(),
                },
            },
        }
    }

    /// The return data, if the call succeeded.
    pub fn data(&self) -> Option<&Bytes> {
        match &self.body.data {
            ResponseData::Result(data) => Some(data),
            ResponseData::Error { .. } => None,
        }
    }

    /// The error message, if the call failed.
    pub fn error_message(&self) -> Option<&str> {
        match &self.body.data {
            ResponseData::Error { error } => Some(error),
            ResponseData::Result(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_success_body() {
        let response = RpcResponse::ok(vec![0x12, 0x34]);

        assert_eq!(response.status, RpcResponse::OK);
        assert_eq!(
            serde_json::to_value(&response.body).unwrap(),
            json!({ "data": "0x1234" })
        );
    }

    #[test]
    fn test_error_body() {
        let response = RpcResponse::error(RpcResponse::NOT_FOUND, "nope");

        assert_eq!(response.status, RpcResponse::NOT_FOUND);
        assert_eq!(response.error_message(), Some("nope"));
        assert_eq!(
            serde_json::to_value(&response.body).unwrap(),
            json!({ "data": { "error": "nope" } })
        );
    }

    #[test]
    fn test_body_parse() {
        let body: ResponseBody = serde_json::from_value(json!({ "data": "0xabcd" })).unwrap();
        assert_eq!(
            body.data,
            ResponseData::Result(Bytes::from_static(&[0xab, 0xcd]))
        );

        let body: ResponseBody =
            serde_json::from_value(json!({ "data": { "error": "boom" } })).unwrap();
        assert_eq!(
            body.data,
            ResponseData::Error {
                error: "boom".to_string()
            }
        );
    }
}
