//! DNS-01 challenge helpers: where the TXT record goes and what it holds.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

const CHALLENGE_LABEL: &str = "_acme-challenge";

#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("could not find zone for {0}")]
    NoZone(String),
}

/// TXT record expected by the ACME server for a DNS-01 challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeRecord {
    pub fqdn: String,
    pub value: String,
}

impl ChallengeRecord {
    pub fn derive(domain: &str, key_auth: &str) -> Self {
        let domain = domain.strip_prefix("*.").unwrap_or(domain);
        let fqdn = to_fqdn(&format!("{}.{}", CHALLENGE_LABEL, domain));
        let value = URL_SAFE_NO_PAD.encode(Sha256::digest(key_auth.as_bytes()));

        Self { fqdn, value }
    }
}

/// Finds the zone (dot-terminated) that owns an FQDN.
pub trait ZoneResolver: Send + Sync {
    fn find_zone(&self, fqdn: &str) -> Result<String, ChallengeError>;
}

/// Always answers with the configured zone.
pub struct StaticZone(String);

impl StaticZone {
    pub fn new(zone: &str) -> Self {
        Self(to_fqdn(zone))
    }
}

impl ZoneResolver for StaticZone {
    fn find_zone(&self, _fqdn: &str) -> Result<String, ChallengeError> {
        Ok(self.0.clone())
    }
}

/// Takes the last two labels of the FQDN. Wrong for zones under public
/// suffixes such as `co.uk`; configure a static zone for those.
pub struct ApexZone;

impl ZoneResolver for ApexZone {
    fn find_zone(&self, fqdn: &str) -> Result<String, ChallengeError> {
        let labels: Vec<&str> = fqdn
            .trim_end_matches('.')
            .split('.')
            .filter(|l| !l.is_empty())
            .collect();

        if labels.len() < 2 {
            return Err(ChallengeError::NoZone(fqdn.to_string()));
        }

        Ok(to_fqdn(&labels[labels.len() - 2..].join(".")))
    }
}

pub fn to_fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}
