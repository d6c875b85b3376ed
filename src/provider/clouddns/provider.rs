use std::time::Duration;

use async_trait::async_trait;
use log::info;

use super::{Client, Credentials, ProviderError};
use crate::config::CloudDnsConfig;
use crate::provider::dns01::{ApexZone, ChallengeRecord, StaticZone, ZoneResolver};
use crate::provider::ChallengeProvider;
use crate::transport::{HttpTransport, ReqwestTransport};

/// DNS-01 challenge provider backed by CloudDNS.
pub struct CloudDnsProvider<T = ReqwestTransport> {
    client: Client<T>,
    zones: Box<dyn ZoneResolver>,
    propagation_timeout: Duration,
    polling_interval: Duration,
}

impl CloudDnsProvider {
    pub fn from_config(config: &CloudDnsConfig) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new(config.http_timeout.map(Duration::from_secs))?;
        let credentials = Credentials {
            client_id: config.client_id.clone(),
            email: config.email.clone(),
            password: config.password.clone(),
        };
        let client = Client::new(transport, credentials, config.ttl)
            .with_endpoints(&config.api_base_url, &config.login_url);

        let zones: Box<dyn ZoneResolver> = match &config.zone {
            Some(zone) => Box::new(StaticZone::new(zone)),
            None => Box::new(ApexZone),
        };

        Ok(Self::new(
            client,
            zones,
            Duration::from_secs(config.propagation_timeout),
            Duration::from_secs(config.polling_interval),
        ))
    }
}

impl<T: HttpTransport> CloudDnsProvider<T> {
    pub fn new(
        client: Client<T>,
        zones: Box<dyn ZoneResolver>,
        propagation_timeout: Duration,
        polling_interval: Duration,
    ) -> Self {
        Self {
            client,
            zones,
            propagation_timeout,
            polling_interval,
        }
    }
}

#[async_trait]
impl<T: HttpTransport> ChallengeProvider for CloudDnsProvider<T> {
    async fn present(&self, domain: &str, _token: &str, key_auth: &str) -> Result<(), ProviderError> {
        let record = ChallengeRecord::derive(domain, key_auth);
        let zone = self.zones.find_zone(&record.fqdn)?;

        info!("Presenting challenge record {} in zone {}", record.fqdn, zone);
        self.client
            .add_record(&zone, &record.fqdn, &record.value)
            .await?;
        Ok(())
    }

    async fn cleanup(&self, domain: &str, _token: &str, key_auth: &str) -> Result<(), ProviderError> {
        let record = ChallengeRecord::derive(domain, key_auth);
        let zone = self.zones.find_zone(&record.fqdn)?;

        info!("Cleaning up challenge record {} in zone {}", record.fqdn, zone);
        self.client.delete_record(&zone, &record.fqdn).await?;
        Ok(())
    }

    fn timeout(&self) -> (Duration, Duration) {
        (self.propagation_timeout, self.polling_interval)
    }
}
