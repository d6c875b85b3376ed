use thiserror::Error;

use crate::provider::dns01::ChallengeError;

/// Failures of a single CloudDNS client call.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {detail}")]
    Transport { url: String, detail: String },

    #[error("HTTP {status}: {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error(
        "apiError unmarshaling error: {detail}: the request {url} sent a response with a body which is an invalid format: \"{body}\""
    )]
    UnreadableBody {
        url: String,
        body: String,
        detail: String,
    },

    #[error("unexpected {context} response body: {detail}")]
    Decode {
        context: &'static str,
        detail: String,
    },

    #[error("domain {zone} not found")]
    DomainNotFound { zone: String },

    #[error("TXT record {name} not found in domain {domain_id}")]
    RecordNotFound { domain_id: String, name: String },

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors surfaced by the challenge provider, always prefixed with the
/// provider name.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("clouddns: {0}")]
    Client(#[from] ClientError),

    #[error("clouddns: {0}")]
    Challenge(#[from] ChallengeError),
}
