use std::any::Any;
use std::collections::HashMap;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use alloy_primitives::hex;
use alloy_primitives::Address;
use alloy_primitives::Bytes;
use alloy_sol_types::SolCall;
use anyhow::ensure;
use async_trait::async_trait;
use ccip_messages::abi::selector_of;
use ccip_messages::GatewayFunction;
use ccip_messages::RpcCall;
use ccip_messages::RpcResponse;
use ccip_messages::Selector;
use futures_util::FutureExt;
use metrics::counter;
use metrics::histogram;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

const UNKNOWN_LABEL: &str = "unknown";
const MALFORMED_LABEL: &str = "malformed";

/// Serves one contract function.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    type Function: GatewayFunction;

    /// Answers a decoded call. `call` is the raw request the arguments were
    /// decoded from.
    async fn handle(
        &self,
        args: Self::Function,
        call: &RpcCall,
    ) -> anyhow::Result<<Self::Function as GatewayFunction>::Output>;
}

/// Errors surfaced to the HTTP layer. These are not ABI encoded.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Invalid request format: {0}")]
    MalformedRequest(String),

    #[error("No implementation for function with selector {}", hex::encode_prefixed(.0))]
    UnknownSelector(Selector),

    #[error("Sender not supported: {0}")]
    SenderNotAllowed(Address),

    #[error("Internal server error: {0}")]
    HandlerFault(String),
}

impl DispatchError {
    pub fn status(&self) -> u16 {
        match self {
            Self::MalformedRequest(_) | Self::SenderNotAllowed(_) => RpcResponse::BAD_REQUEST,
            Self::UnknownSelector(_) => RpcResponse::NOT_FOUND,
            Self::HandlerFault(_) => RpcResponse::INTERNAL_ERROR,
        }
    }
}

impl From<DispatchError> for RpcResponse {
    fn from(err: DispatchError) -> Self {
        RpcResponse::error(err.status(), err.to_string())
    }
}

/// The senders the gateway answers for. Empty means anyone.
#[derive(Clone, Debug, Default)]
pub struct SenderPolicy {
    allowed: HashSet<Address>,
}

impl SenderPolicy {
    pub fn allow_any() -> Self {
        Self::default()
    }

    pub fn new(allowed: impl IntoIterator<Item = Address>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn allows(
        &self,
        sender: &Address,
    ) -> bool {
        self.allowed.is_empty() || self.allowed.contains(sender)
    }
}

/// Type erased [`Handler`], working on raw calldata.
#[async_trait]
trait ErasedHandler: Send + Sync {
    fn signature(&self) -> &'static str;

    async fn invoke(
        &self,
        args: &[u8],
        call: &RpcCall,
    ) -> Result<Bytes, DispatchError>;
}

struct Registration<H>(H);

#[async_trait]
impl<H: Handler> ErasedHandler for Registration<H> {
    fn signature(&self) -> &'static str {
        <H::Function as SolCall>::SIGNATURE
    }

    async fn invoke(
        &self,
        args: &[u8],
        call: &RpcCall,
    ) -> Result<Bytes, DispatchError> {
        let args = <H::Function as SolCall>::abi_decode_raw(args, true).map_err(|err| {
            DispatchError::MalformedRequest(format!(
                "invalid arguments for {}: {err}",
                self.signature()
            ))
        })?;

        let output = AssertUnwindSafe(self.0.handle(args, call))
            .catch_unwind()
            .await
            .map_err(|panic| {
                DispatchError::HandlerFault(format!(
                    "handler panicked: {}",
                    panic_message(&*panic)
                ))
            })?
            .map_err(|err| DispatchError::HandlerFault(format!("{err:#}")))?;

        Ok(H::Function::encode_output(&output).into())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    match panic.downcast_ref::<&'static str>() {
        Some(s) => *s,
        None => {
            match panic.downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<dyn Any>",
            }
        },
    }
}

/// Routes ABI encoded calls to their handler by selector.
///
/// Built once at startup, read-only afterwards.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<Selector, Box<dyn ErasedHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under the selector of its function signature.
    ///
    /// Fails if a handler is already registered for that selector.
    pub fn register<H: Handler>(
        &mut self,
        handler: H,
    ) -> anyhow::Result<()> {
        let signature = <H::Function as SolCall>::SIGNATURE;
        let selector = selector_of(signature);

        ensure!(
            !self.handlers.contains_key(&selector),
            "a handler is already registered for selector {} ({})",
            hex::encode_prefixed(selector),
            signature,
        );

        info!(
            "Registering handler. selector: {} signature: {}",
            hex::encode_prefixed(selector),
            signature,
        );
        self.handlers
            .insert(selector, Box::new(Registration(handler)));

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Answers a call. Every failure, handler ones included, is turned into
    /// an error response.
    pub async fn call(
        &self,
        call: &RpcCall,
        policy: &SenderPolicy,
    ) -> RpcResponse {
        let start_time = Instant::now();

        let response = match self.try_call(call, policy).await {
            Ok(data) => RpcResponse::ok(data),
            Err(err) => {
                warn!("call failed. to: {} err: {}", call.to, err);
                err.into()
            },
        };

        counter!(
            "ccip_gateway_calls_total",
            "function" => self.function_label(&call.data),
            "status" => response.status.to_string(),
        )
        .increment(1);
        histogram!("ccip_gateway_call_duration_seconds").record(start_time.elapsed().as_secs_f64());

        response
    }

    /// Metrics label of a call: the signature of the registered function,
    /// `unknown` or `malformed` otherwise.
    pub fn function_label(
        &self,
        data: &[u8],
    ) -> &'static str {
        let Some(selector) = data
            .get(..4)
            .and_then(|bytes| Selector::try_from(bytes).ok())
        else {
            return MALFORMED_LABEL;
        };

        self.handlers
            .get(&selector)
            .map_or(UNKNOWN_LABEL, |handler| handler.signature())
    }

    async fn try_call(
        &self,
        call: &RpcCall,
        policy: &SenderPolicy,
    ) -> Result<Bytes, DispatchError> {
        if !policy.allows(&call.to) {
            return Err(DispatchError::SenderNotAllowed(call.to));
        }

        if call.data.len() < 4 {
            return Err(DispatchError::MalformedRequest(
                "calldata is shorter than a selector".to_string(),
            ));
        }
        let (selector, args) = call.data.split_at(4);
        let selector: Selector = selector
            .try_into()
            .map_err(|_| DispatchError::MalformedRequest("invalid selector".to_string()))?;

        let handler = self
            .handlers
            .get(&selector)
            .ok_or(DispatchError::UnknownSelector(selector))?;

        debug!(
            "Dispatching call. to: {} function: {}",
            call.to,
            handler.signature()
        );

        handler.invoke(args, call).await
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use alloy_primitives::U256;
    use alloy_sol_types::sol;

    use super::*;

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        function echo(uint256 value, string label) external returns (uint256 doubled, string label);

        #[derive(Debug, PartialEq, Eq)]
        function ping() external;

        #[derive(Debug, PartialEq, Eq)]
        function explode(bool panics) external returns (bool);
    }

    impl GatewayFunction for echoCall {
        type Output = (U256, String);

        fn encode_output(output: &Self::Output) -> Vec<u8> {
            Self::abi_encode_returns(output)
        }
    }

    impl GatewayFunction for pingCall {
        type Output = ();

        fn encode_output(_: &Self::Output) -> Vec<u8> {
            Vec::new()
        }
    }

    impl GatewayFunction for explodeCall {
        type Output = bool;

        fn encode_output(output: &Self::Output) -> Vec<u8> {
            Self::abi_encode_returns(&(*output,))
        }
    }

    #[derive(Default)]
    struct Echo {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler for Echo {
        type Function = echoCall;

        async fn handle(
            &self,
            args: echoCall,
            _call: &RpcCall,
        ) -> anyhow::Result<(U256, String)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((args.value * U256::from(2), args.label))
        }
    }

    struct Ping;

    #[async_trait]
    impl Handler for Ping {
        type Function = pingCall;

        async fn handle(
            &self,
            _args: pingCall,
            _call: &RpcCall,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Explode;

    #[async_trait]
    impl Handler for Explode {
        type Function = explodeCall;

        async fn handle(
            &self,
            args: explodeCall,
            _call: &RpcCall,
        ) -> anyhow::Result<bool> {
            if args.panics {
                panic!("kaboom");
            }
            anyhow::bail!("lookup backend unreachable")
        }
    }

    fn sender() -> Address {
        Address::repeat_byte(0x42)
    }

    fn dispatcher(echo: Echo) -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(echo).unwrap();
        dispatcher.register(Ping).unwrap();
        dispatcher.register(Explode).unwrap();
        dispatcher
    }

    #[tokio::test]
    async fn test_round_trip() {
        let echo = Echo::default();
        let calls = echo.calls.clone();
        let dispatcher = dispatcher(echo);

        let data = echoCall {
            value: U256::from(21),
            label: "answer".to_string(),
        }
        .abi_encode();
        let response = dispatcher
            .call(&RpcCall::new(sender(), data.into()), &SenderPolicy::allow_any())
            .await;

        assert_eq!(response.status, RpcResponse::OK);
        let returned = echoCall::abi_decode_returns(response.data().unwrap(), true).unwrap();
        assert_eq!(returned.doubled, U256::from(42));
        assert_eq!(returned.label, "answer");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_outputs() {
        let dispatcher = dispatcher(Echo::default());

        let response = dispatcher
            .call(
                &RpcCall::new(sender(), pingCall {}.abi_encode().into()),
                &SenderPolicy::allow_any(),
            )
            .await;

        assert_eq!(response.status, RpcResponse::OK);
        assert!(response.data().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_selector() {
        let echo = Echo::default();
        let calls = echo.calls.clone();
        let dispatcher = dispatcher(echo);

        let response = dispatcher
            .call(
                &RpcCall::new(sender(), Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00])),
                &SenderPolicy::allow_any(),
            )
            .await;

        assert_eq!(response.status, RpcResponse::NOT_FOUND);
        assert_eq!(
            response.error_message(),
            Some("No implementation for function with selector 0xdeadbeef")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_calldata() {
        let dispatcher = dispatcher(Echo::default());

        let response = dispatcher
            .call(
                &RpcCall::new(sender(), Bytes::from_static(&[0x01, 0x02])),
                &SenderPolicy::allow_any(),
            )
            .await;
        assert_eq!(response.status, RpcResponse::BAD_REQUEST);

        // right selector, truncated arguments
        let mut data = echoCall {
            value: U256::from(1),
            label: "x".to_string(),
        }
        .abi_encode();
        data.truncate(40);
        let response = dispatcher
            .call(&RpcCall::new(sender(), data.into()), &SenderPolicy::allow_any())
            .await;
        assert_eq!(response.status, RpcResponse::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_handler_failures() {
        let dispatcher = dispatcher(Echo::default());

        for panics in [false, true] {
            let data = explodeCall { panics }.abi_encode();
            let response = dispatcher
                .call(&RpcCall::new(sender(), data.into()), &SenderPolicy::allow_any())
                .await;

            assert_eq!(response.status, RpcResponse::INTERNAL_ERROR);
            let message = response.error_message().unwrap();
            if panics {
                assert!(message.contains("kaboom"), "{message}");
            } else {
                assert!(message.contains("lookup backend unreachable"), "{message}");
            }
        }
    }

    #[tokio::test]
    async fn test_sender_policy() {
        let echo = Echo::default();
        let calls = echo.calls.clone();
        let dispatcher = dispatcher(echo);
        let policy = SenderPolicy::new([Address::repeat_byte(0x01)]);
        let data: Bytes = echoCall {
            value: U256::from(1),
            label: String::new(),
        }
        .abi_encode()
        .into();

        let response = dispatcher
            .call(&RpcCall::new(sender(), data.clone()), &policy)
            .await;
        assert_eq!(response.status, RpcResponse::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let response = dispatcher
            .call(&RpcCall::new(Address::repeat_byte(0x01), data), &policy)
            .await;
        assert_eq!(response.status, RpcResponse::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Ping).unwrap();

        assert!(dispatcher.register(Ping).is_err());
        assert_eq!(dispatcher.len(), 1);
        assert_eq!(dispatcher.function_label(&pingCall::SELECTOR), "ping()");
    }

    #[test]
    fn test_function_label_is_bounded() {
        let dispatcher = dispatcher(Echo::default());

        let data = echoCall {
            value: U256::from(1),
            label: String::new(),
        }
        .abi_encode();
        assert_eq!(dispatcher.function_label(&data), "echo(uint256,string)");

        for selector in [[0xde, 0xad, 0xbe, 0xef], [0x00, 0x00, 0x00, 0x01], [0xff; 4]] {
            assert_eq!(dispatcher.function_label(&selector), UNKNOWN_LABEL);
        }
        assert_eq!(dispatcher.function_label(&[0x01, 0x02]), MALFORMED_LABEL);
        assert_eq!(dispatcher.function_label(&[]), MALFORMED_LABEL);
    }
}
