//! Core discovery traits and types.

use thiserror::Error;

use crate::discovery::TargetGroup;

/// Errors that can occur while listing instances.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The provider API call failed. Always treated as transient.
    #[error("api error: {0}")]
    Api(String),

    /// The client could not be set up.
    #[error("config error: {0}")]
    Config(String),
}

/// A compute instance as reported by the provider.
///
/// Only `public_ip` is optional; everything else is always present on a
/// record that reached the discovery layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instance {
    pub name: String,
    pub private_ip: String,
    pub public_ip: Option<String>,
    pub availability_zone: String,
    pub blueprint_id: String,
    pub bundle_id: String,
    /// Provider reference code, `<account>/<instance-id>`.
    pub support_code: String,
    pub state: String,
    /// Tags in the order the provider returned them.
    pub tags: Vec<(String, String)>,
}

impl Instance {
    /// Create an instance record with the required fields set.
    pub fn new(name: impl Into<String>, private_ip: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            private_ip: private_ip.into(),
            ..Default::default()
        }
    }

    /// Set the public address.
    pub fn with_public_ip(mut self, ip: impl Into<String>) -> Self {
        self.public_ip = Some(ip.into());
        self
    }

    /// Append a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Set the support code.
    pub fn with_support_code(mut self, code: impl Into<String>) -> Self {
        self.support_code = code.into();
        self
    }

    /// Set the lifecycle state name.
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }
}

/// Source of instance records.
///
/// Implementations perform their own internal retries; any error returned
/// here is counted as one failed poll and retried on the next tick.
#[async_trait::async_trait]
pub trait InstanceClient: Send + Sync + 'static {
    /// List all current instances.
    async fn list_instances(&self) -> Result<Vec<Instance>, DiscoveryError>;
}

#[async_trait::async_trait]
impl<C: InstanceClient + ?Sized> InstanceClient for std::sync::Arc<C> {
    async fn list_instances(&self) -> Result<Vec<Instance>, DiscoveryError> {
        (**self).list_instances().await
    }
}

/// One batch from a named fetcher: the complete current truth for `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub name: String,
    pub groups: Vec<TargetGroup>,
}
