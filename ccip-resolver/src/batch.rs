use ccip_messages::BatchOutcome;
use ccip_messages::LookupTriple;
use futures_util::future::join_all;
use tracing::info;

use crate::dedup::RequestDeduplicator;
use crate::resolver::LookupResolver;

/// Resolves every lookup concurrently.
///
/// The outcome is index aligned with `triples`. A failed lookup only marks its
/// own entry as failed, the batch itself always completes once every entry is
/// resolved.
pub async fn resolve_all(
    resolver: &LookupResolver,
    triples: Vec<LookupTriple>,
) -> BatchOutcome {
    let total = triples.len();

    let pending = {
        let mut dedup = RequestDeduplicator::new(resolver);
        let pending = triples
            .into_iter()
            .map(|triple| dedup.resolve(triple))
            .collect::<Vec<_>>();

        info!(
            "resolving lookups. total: {} distinct: {}",
            total,
            dedup.len()
        );
        pending
    };

    let outcome: BatchOutcome = join_all(pending).await.into_iter().collect();

    info!(
        "lookups resolved. total: {} failed: {}",
        total,
        outcome.success.iter().filter(|success| !**success).count()
    );

    outcome
}
