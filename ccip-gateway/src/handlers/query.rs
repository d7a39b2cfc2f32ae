use alloy_primitives::Bytes;
use async_trait::async_trait;
use ccip_messages::abi::queryCall;
use ccip_messages::LookupTriple;
use ccip_messages::RpcCall;
use ccip_resolver::LookupResolver;
use tracing::debug;

use crate::dispatcher::Handler;

/// Serves `query((address,string[],bytes)[])` by resolving every lookup
/// against its own candidate gateways.
pub struct QueryHandler {
    resolver: LookupResolver,
}

impl QueryHandler {
    pub fn new(resolver: LookupResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Handler for QueryHandler {
    type Function = queryCall;

    async fn handle(
        &self,
        args: queryCall,
        call: &RpcCall,
    ) -> anyhow::Result<(Vec<bool>, Vec<Bytes>)> {
        debug!(
            "Resolving query. to: {} lookups: {}",
            call.to,
            args.lookups.len()
        );

        let triples = args
            .lookups
            .into_iter()
            .map(LookupTriple::from)
            .collect();

        Ok(self.resolver.resolve_all(triples).await.into())
    }
}
