use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::hex;
use alloy_primitives::Address;
use alloy_primitives::Bytes;
use base64::engine::general_purpose::STANDARD;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ccip_messages::RpcCall;
use ccip_messages::RpcResponse;
use serde_derive::Deserialize;
use tracing::debug;
use tracing::warn;
use warp::http::StatusCode;
use warp::hyper::body::Bytes as Body;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::dispatcher::DispatchError;
use crate::dispatcher::Dispatcher;
use crate::dispatcher::SenderPolicy;

/// Largest accepted `POST` body.
const MAX_BODY_BYTES: u64 = 1024 * 1024;

const JSON_SUFFIX: &str = ".json";

/// Dispatcher plus the sender policy it is queried with.
pub struct Gateway {
    dispatcher: Dispatcher,
    policy: SenderPolicy,
}

#[derive(Deserialize, Debug, Default)]
struct PostBody {
    sender: Option<String>,
    data: Option<String>,
}

impl Gateway {
    pub fn new(
        dispatcher: Dispatcher,
        policy: SenderPolicy,
    ) -> Self {
        Self { dispatcher, policy }
    }

    /// Answers a raw request. Missing or unparsable parts yield a 400.
    pub async fn handle(
        &self,
        sender: Option<&str>,
        data: Option<&str>,
    ) -> RpcResponse {
        match parse_request(sender, data) {
            Ok(call) => self.dispatcher.call(&call, &self.policy).await,
            Err(err) => {
                warn!("rejecting request. err: {}", err);
                err.into()
            },
        }
    }
}

fn parse_request(
    sender: Option<&str>,
    data: Option<&str>,
) -> Result<RpcCall, DispatchError> {
    let sender = sender.ok_or_else(|| malformed("missing sender"))?;
    let data = data.ok_or_else(|| malformed("missing data"))?;

    Ok(RpcCall::new(parse_sender(sender)?, parse_calldata(data)?))
}

fn malformed(reason: &str) -> DispatchError {
    DispatchError::MalformedRequest(reason.to_string())
}

pub fn parse_sender(sender: &str) -> Result<Address, DispatchError> {
    Address::from_str(sender.trim())
        .map_err(|err| DispatchError::MalformedRequest(format!("invalid sender `{sender}`: {err}")))
}

/// Accepts `0x` prefixed hex, or base64 (URL safe then standard alphabet).
/// A trailing `.json` is ignored.
pub fn parse_calldata(data: &str) -> Result<Bytes, DispatchError> {
    let data = data.trim();
    let data = data.strip_suffix(JSON_SUFFIX).unwrap_or(data);

    let decoded = if let Some(digits) = data.strip_prefix("0x") {
        hex::decode(digits).map_err(|err| malformed(&format!("invalid hex calldata: {err}")))?
    } else {
        URL_SAFE_NO_PAD
            .decode(data)
            .or_else(|_| STANDARD.decode(data))
            .map_err(|err| malformed(&format!("invalid base64 calldata: {err}")))?
    };

    Ok(decoded.into())
}

fn into_reply(response: RpcResponse) -> warp::reply::Response {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    warp::reply::with_status(warp::reply::json(&response.body), status).into_response()
}

fn with_gateway(
    gateway: Arc<Gateway>,
) -> impl Filter<Extract = (Arc<Gateway>,), Error = Infallible> + Clone {
    warp::any().map(move || gateway.clone())
}

/// Every route the gateway serves, CORS included.
pub fn routes(
    gateway: Arc<Gateway>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health_route = warp::get()
        .and(warp::path::end())
        .map(|| warp::reply::with_status("OK", StatusCode::OK).into_response());

    let get_route = warp::get()
        .and(warp::path!(String / String))
        .and(with_gateway(gateway.clone()))
        .then(
            |sender: String, data: String, gateway: Arc<Gateway>| async move {
                debug!("GET lookup. sender: {} data: {}", sender, data);
                into_reply(gateway.handle(Some(&sender), Some(&data)).await)
            },
        );

    let post_route = warp::post()
        .and(warp::path::end())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_gateway(gateway))
        .then(|body: Body, gateway: Arc<Gateway>| async move {
            match serde_json::from_slice::<PostBody>(&body) {
                Ok(body) => {
                    into_reply(
                        gateway
                            .handle(body.sender.as_deref(), body.data.as_deref())
                            .await,
                    )
                },
                Err(err) => {
                    warn!("rejecting POST body. err: {}", err);
                    into_reply(malformed(&format!("invalid JSON body: {err}")).into())
                },
            }
        });

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type"]);

    health_route
        .or(get_route)
        .unify()
        .or(post_route)
        .unify()
        .recover(handle_rejection)
        .with(cors)
}

async fn handle_rejection(rejection: Rejection) -> Result<warp::reply::Response, Infallible> {
    let response = if rejection
        .find::<warp::reject::PayloadTooLarge>()
        .is_some()
    {
        RpcResponse::error(
            StatusCode::PAYLOAD_TOO_LARGE.as_u16(),
            format!("Request body exceeds {MAX_BODY_BYTES} bytes"),
        )
    } else if rejection
        .find::<warp::reject::LengthRequired>()
        .is_some()
    {
        RpcResponse::error(
            StatusCode::LENGTH_REQUIRED.as_u16(),
            "A Content-Length header is required",
        )
    } else if rejection.is_not_found() {
        RpcResponse::error(RpcResponse::NOT_FOUND, "Not found")
    } else if rejection
        .find::<warp::reject::MethodNotAllowed>()
        .is_some()
    {
        RpcResponse::error(
            StatusCode::METHOD_NOT_ALLOWED.as_u16(),
            "Method not allowed",
        )
    } else {
        debug!("unhandled rejection: {:?}", rejection);
        malformed("unsupported request").into()
    };

    Ok(into_reply(response))
}
