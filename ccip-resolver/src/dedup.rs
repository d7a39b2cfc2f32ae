use std::collections::hash_map::Entry;
use std::collections::HashMap;

use ccip_messages::LookupOutcome;
use ccip_messages::LookupTriple;
use futures_util::future::BoxFuture;
use futures_util::future::Shared;
use futures_util::FutureExt;
use metrics::counter;
use tracing::debug;

use crate::resolver::LookupResolver;

/// A lookup resolution that may be awaited by several batch entries.
pub type InFlight<'a> = Shared<BoxFuture<'a, LookupOutcome>>;

/// Identity of a lookup for in-flight sharing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DedupKey {
    sender: String,
    urls: Vec<String>,
    data: String,
}

impl DedupKey {
    pub fn of(triple: &LookupTriple) -> Self {
        Self {
            sender: triple.sender_hex(),
            urls: triple.urls.clone(),
            data: triple.data_hex(),
        }
    }
}

/// Shares one resolution between identical lookups of the same batch.
///
/// The map is only touched synchronously, before the returned future is
/// polled, so two identical lookups can never both miss it.
pub struct RequestDeduplicator<'a> {
    resolver: &'a LookupResolver,
    in_flight: HashMap<DedupKey, InFlight<'a>>,
}

impl<'a> RequestDeduplicator<'a> {
    pub fn new(resolver: &'a LookupResolver) -> Self {
        Self {
            resolver,
            in_flight: HashMap::new(),
        }
    }

    /// Returns the resolution of `triple`, reusing the one already started
    /// for an identical lookup if any.
    pub fn resolve(
        &mut self,
        triple: LookupTriple,
    ) -> InFlight<'a> {
        match self.in_flight.entry(DedupKey::of(&triple)) {
            Entry::Occupied(entry) => {
                debug!("sharing in-flight lookup. sender: {}", triple.sender);
                counter!("ccip_resolver_deduplicated_lookups_total").increment(1);
                entry.get().clone()
            },
            Entry::Vacant(entry) => {
                let resolver = self.resolver;
                let resolution = async move { resolver.resolve(&triple).await }
                    .boxed()
                    .shared();
                entry.insert(resolution).clone()
            },
        }
    }

    /// Number of distinct lookups started.
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use alloy_primitives::Address;
    use alloy_primitives::Bytes;

    use super::*;

    #[test]
    fn test_key_covers_urls() {
        let a = LookupTriple::new(
            Address::repeat_byte(0xab),
            vec!["https://a/{data}".to_string()],
            Bytes::from_static(&[0xca, 0xfe]),
        );
        let mut b = a.clone();
        assert_eq!(DedupKey::of(&a), DedupKey::of(&b));

        b.urls.push("https://b/{data}".to_string());
        assert_ne!(DedupKey::of(&a), DedupKey::of(&b));
    }

    #[test]
    fn test_identical_lookups_share() {
        let resolver = LookupResolver::new(Duration::from_secs(1)).unwrap();
        let mut dedup = RequestDeduplicator::new(&resolver);
        let triple = LookupTriple::new(Address::ZERO, vec![], Bytes::new());

        let _first = dedup.resolve(triple.clone());
        let _second = dedup.resolve(triple.clone());
        assert_eq!(dedup.len(), 1);

        let _third = dedup.resolve(LookupTriple {
            data: Bytes::from_static(&[1]),
            ..triple
        });
        assert_eq!(dedup.len(), 2);
    }
}
