//! AWS Lightsail instance client.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_lightsail::Client;
use aws_sdk_lightsail::error::DisplayErrorContext;
use aws_sdk_lightsail::types;

use crate::discovery::{DiscoveryError, Instance, InstanceClient};

/// Total attempts per API call (one try plus three retries).
const MAX_ATTEMPTS: u32 = 4;

/// Timeout of a single API call attempt.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`InstanceClient`] backed by the Lightsail `GetInstances` API.
#[derive(Debug, Clone)]
pub struct LightsailClient {
    client: Client,
}

impl LightsailClient {
    /// Build a client from the default credential chain.
    ///
    /// `profile` selects a named profile from the shared config files and
    /// `region` overrides the region resolved from the environment.
    ///
    /// # Errors
    /// Returns `DiscoveryError::Config` if no region can be resolved.
    pub async fn connect(
        profile: Option<&str>,
        region: Option<&str>,
    ) -> Result<Self, DiscoveryError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(RetryConfig::standard().with_max_attempts(MAX_ATTEMPTS))
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_attempt_timeout(ATTEMPT_TIMEOUT)
                    .build(),
            );

        if let Some(profile) = profile {
            tracing::debug!(profile, "Loading AWS profile");
            loader = loader.profile_name(profile);
        } else {
            tracing::debug!("Loading shared AWS config");
        }
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_owned()));
        }

        let sdk_config = loader.load().await;
        let Some(region) = sdk_config.region() else {
            return Err(DiscoveryError::Config(
                "no AWS region configured; set --region, AWS_REGION or a profile region"
                    .to_string(),
            ));
        };
        tracing::info!(region = %region, "Lightsail client configured");

        Ok(Self::from_client(Client::new(&sdk_config)))
    }

    /// Wrap an existing SDK client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl InstanceClient for LightsailClient {
    async fn list_instances(&self) -> Result<Vec<Instance>, DiscoveryError> {
        let mut instances = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let output = self
                .client
                .get_instances()
                .set_page_token(page_token.take())
                .send()
                .await
                .map_err(|e| DiscoveryError::Api(DisplayErrorContext(&e).to_string()))?;

            instances.extend(output.instances().iter().filter_map(convert_instance));

            match output.next_page_token() {
                Some(token) if !token.is_empty() => page_token = Some(token.to_owned()),
                _ => break,
            }
        }

        Ok(instances)
    }
}

/// Convert an SDK instance into a discovery record.
///
/// Instances without a name or private address cannot be scraped and are
/// skipped. Tags without a key or value are dropped.
fn convert_instance(raw: &types::Instance) -> Option<Instance> {
    let (Some(name), Some(private_ip)) = (raw.name(), raw.private_ip_address()) else {
        tracing::warn!(
            name = raw.name().unwrap_or_default(),
            "Skipping instance without name or private address"
        );
        return None;
    };

    let tags = raw
        .tags()
        .iter()
        .filter_map(|t| Some((t.key()?.to_owned(), t.value()?.to_owned())))
        .collect();

    Some(Instance {
        name: name.to_owned(),
        private_ip: private_ip.to_owned(),
        public_ip: raw.public_ip_address().map(str::to_owned),
        availability_zone: raw
            .location()
            .and_then(|l| l.availability_zone())
            .unwrap_or_default()
            .to_owned(),
        blueprint_id: raw.blueprint_id().unwrap_or_default().to_owned(),
        bundle_id: raw.bundle_id().unwrap_or_default().to_owned(),
        support_code: raw.support_code().unwrap_or_default().to_owned(),
        state: raw
            .state()
            .and_then(|s| s.name())
            .unwrap_or_default()
            .to_owned(),
        tags,
    })
}
