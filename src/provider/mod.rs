pub mod clouddns;
pub mod dns01;

use std::time::Duration;

use async_trait::async_trait;

use clouddns::ProviderError;

/// Present/clean-up contract of a DNS-01 challenge provider.
#[async_trait]
pub trait ChallengeProvider: Send + Sync {
    async fn present(&self, domain: &str, token: &str, key_auth: &str)
        -> Result<(), ProviderError>;

    async fn cleanup(&self, domain: &str, token: &str, key_auth: &str)
        -> Result<(), ProviderError>;

    /// Propagation timeout and polling interval for the caller's DNS check.
    fn timeout(&self) -> (Duration, Duration);
}
