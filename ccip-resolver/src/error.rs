use ccip_messages::ErrorEntry;
use thiserror::Error;

/// Status recorded for an attempt that never got an HTTP response.
pub const TRANSPORT_ERROR_STATUS: u16 = 502;

/// Status recorded when a lookup names no candidate URL.
pub const NO_URLS_STATUS: u16 = 400;

/// Failure of a single candidate URL.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The gateway answered with a 4xx: the record does not exist, later
    /// candidates are not consulted.
    #[error("response not found during CCIP fetch: {message}")]
    UpstreamNotFound { status: u16, message: String },

    /// 5xx, unexpected status, bad payload or transport failure; the next
    /// candidate is tried.
    #[error("upstream unavailable ({status}): {message}")]
    UpstreamUnavailable { status: u16, message: String },
}

impl FetchError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::UpstreamNotFound { .. })
    }

    pub fn into_entry(self) -> ErrorEntry {
        match self {
            Self::UpstreamNotFound { status, message } |
            Self::UpstreamUnavailable { status, message } => (status, message),
        }
    }
}

/// Failure of a whole lookup, after candidate fallback.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("CCIP Read provided no URLs")]
    NoUrls,

    #[error("response not found during CCIP fetch: {message}")]
    UpstreamNotFound { status: u16, message: String },

    #[error("error encountered during CCIP fetch: {}", join_messages(.0))]
    AllCandidatesExhausted(Vec<ErrorEntry>),
}

impl LookupError {
    /// The `(status, message)` pairs reported to the caller.
    pub fn entries(&self) -> Vec<ErrorEntry> {
        match self {
            Self::NoUrls => vec![(NO_URLS_STATUS, self.to_string())],
            Self::UpstreamNotFound { status, message } => vec![(*status, message.clone())],
            Self::AllCandidatesExhausted(entries) => entries.clone(),
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoUrls => "no_urls",
            Self::UpstreamNotFound { .. } => "not_found",
            Self::AllCandidatesExhausted(_) => "exhausted",
        }
    }
}

fn join_messages(entries: &[ErrorEntry]) -> String {
    entries
        .iter()
        .map(|(_, message)| format!("{message:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_messages() {
        let err = LookupError::AllCandidatesExhausted(vec![
            (503, "Service Unavailable".to_string()),
            (500, "Internal Server Error".to_string()),
        ]);
        assert_eq!(
            err.to_string(),
            r#"error encountered during CCIP fetch: "Service Unavailable", "Internal Server Error""#
        );

        assert_eq!(
            LookupError::NoUrls.entries(),
            vec![(NO_URLS_STATUS, "CCIP Read provided no URLs".to_string())]
        );
    }

    #[test]
    fn test_terminal() {
        let not_found = FetchError::UpstreamNotFound {
            status: 404,
            message: "Not Found".to_string(),
        };
        let unavailable = FetchError::UpstreamUnavailable {
            status: 503,
            message: "Service Unavailable".to_string(),
        };

        assert!(not_found.is_terminal());
        assert!(!unavailable.is_terminal());
        assert_eq!(unavailable.into_entry(), (503, "Service Unavailable".to_string()));
    }
}
