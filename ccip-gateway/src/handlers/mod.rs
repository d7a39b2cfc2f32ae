use ccip_resolver::LookupResolver;

use crate::dispatcher::Dispatcher;

mod query;

pub use query::QueryHandler;

/// Builds the dispatcher with every function the gateway serves.
pub fn dispatcher(resolver: LookupResolver) -> anyhow::Result<Dispatcher> {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(QueryHandler::new(resolver))?;

    Ok(dispatcher)
}
