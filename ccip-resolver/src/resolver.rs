use std::time::Duration;
use std::time::Instant;

use alloy_primitives::hex;
use alloy_primitives::Bytes;
use ccip_messages::BatchOutcome;
use ccip_messages::LookupOutcome;
use ccip_messages::LookupTriple;
use metrics::counter;
use metrics::histogram;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use tracing::debug;
use tracing::warn;

use crate::error::FetchError;
use crate::error::LookupError;
use crate::error::TRANSPORT_ERROR_STATUS;

pub const SENDER_PLACEHOLDER: &str = "{sender}";
pub const DATA_PLACEHOLDER: &str = "{data}";

const UNKNOWN_ERROR: &str = "unknown error";

/// JSON body POSTed to templates without a `{data}` placeholder.
#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    data: &'a str,
    sender: &'a str,
}

/// JSON body returned by a gateway.
#[derive(Debug, Default, Deserialize)]
struct GatewayReply {
    data: Option<String>,
}

impl GatewayReply {
    /// Anything that is not `{"data": "<string>"}` reads as a reply without
    /// data.
    fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }
}

/// Resolves lookups by querying their candidate URLs in order.
#[derive(Clone, Debug)]
pub struct LookupResolver {
    client: reqwest::Client,
}

impl LookupResolver {
    /// Creates a resolver whose every fetch is bounded by `timeout`.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client })
    }

    /// Resolves a lookup. Failures are ABI encoded into the outcome, this
    /// never fails.
    #[tracing::instrument(skip_all, fields(sender = %triple.sender, urls = triple.urls.len()))]
    pub async fn resolve(
        &self,
        triple: &LookupTriple,
    ) -> LookupOutcome {
        let start_time = Instant::now();

        let outcome = match self.try_resolve(triple).await {
            Ok(data) => {
                counter!("ccip_resolver_lookups_total", "outcome" => "success").increment(1);
                LookupOutcome::success(data)
            },
            Err(err) => {
                warn!("lookup failed. err: {err}");
                counter!("ccip_resolver_lookups_total", "outcome" => err.kind()).increment(1);
                LookupOutcome::failure(&err.entries())
            },
        };

        histogram!("ccip_resolver_lookup_duration_seconds")
            .record(start_time.elapsed().as_secs_f64());

        outcome
    }

    /// Resolves a batch of lookups concurrently, see [`crate::batch::resolve_all`].
    pub async fn resolve_all(
        &self,
        triples: Vec<LookupTriple>,
    ) -> BatchOutcome {
        crate::batch::resolve_all(self, triples).await
    }

    /// Tries every candidate URL until one answers, one reports the record
    /// missing, or none is left.
    pub async fn try_resolve(
        &self,
        triple: &LookupTriple,
    ) -> Result<Bytes, LookupError> {
        if triple.urls.is_empty() {
            return Err(LookupError::NoUrls);
        }

        let sender = triple.sender_hex();
        let data = triple.data_hex();

        let mut failures = Vec::with_capacity(triple.urls.len());
        for template in &triple.urls {
            match self.fetch(template, &sender, &data).await {
                Ok(payload) => return Ok(payload),
                Err(err) if err.is_terminal() => {
                    let (status, message) = err.into_entry();
                    return Err(LookupError::UpstreamNotFound { status, message });
                },
                Err(err) => {
                    debug!("trying next candidate. url: {template} err: {err}");
                    failures.push(err.into_entry());
                },
            }
        }

        Err(LookupError::AllCandidatesExhausted(failures))
    }

    /// Queries a single candidate.
    async fn fetch(
        &self,
        template: &str,
        sender: &str,
        data: &str,
    ) -> Result<Bytes, FetchError> {
        let url = expand_url(template, sender, data);

        let (method, request) = if template.contains(DATA_PLACEHOLDER) {
            ("GET", self.client.get(&url))
        } else {
            (
                "POST",
                self.client.post(&url).json(&LookupRequest { data, sender }),
            )
        };
        debug!("fetching lookup. method: {method} url: {url}");

        let response = request.send().await.map_err(|err| {
            counter!(
                "ccip_resolver_upstream_requests_total",
                "method" => method,
                "status" => "transport_error",
            )
            .increment(1);

            FetchError::UpstreamUnavailable {
                status: TRANSPORT_ERROR_STATUS,
                message: err.to_string(),
            }
        })?;

        let status = response.status();
        counter!(
            "ccip_resolver_upstream_requests_total",
            "method" => method,
            "status" => status.as_u16().to_string(),
        )
        .increment(1);

        let body = response.bytes().await.unwrap_or_default();
        let reply = GatewayReply::parse(&body);

        if let Some(payload) = reply.data.filter(|payload| !payload.is_empty()) {
            return hex::decode(&payload).map(Bytes::from).map_err(|err| {
                FetchError::UpstreamUnavailable {
                    status: status.as_u16(),
                    message: format!("invalid data returned by gateway: {err}"),
                }
            });
        }

        let message = status
            .canonical_reason()
            .unwrap_or(UNKNOWN_ERROR)
            .to_string();

        if status.is_client_error() {
            Err(FetchError::UpstreamNotFound {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(FetchError::UpstreamUnavailable {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Substitutes the `{sender}` and `{data}` placeholders of a URL template.
pub fn expand_url(
    template: &str,
    sender: &str,
    data: &str,
) -> String {
    template
        .replace(SENDER_PLACEHOLDER, sender)
        .replace(DATA_PLACEHOLDER, data)
}
