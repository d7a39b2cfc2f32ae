//! Resolution of CCIP-Read lookups against their candidate gateways.

pub mod batch;
pub mod dedup;
pub mod error;
pub mod resolver;

pub use batch::resolve_all;
pub use dedup::DedupKey;
pub use dedup::RequestDeduplicator;
pub use error::FetchError;
pub use error::LookupError;
pub use resolver::LookupResolver;
