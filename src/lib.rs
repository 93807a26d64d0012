//! lightsail-sd - Prometheus file-based service discovery for AWS Lightsail
//!
//! This crate provides the discovery pipeline behind the `lightsail-sd`
//! binary. It can be embedded by other Rust projects that want to publish
//! `file_sd` documents from their own instance sources.
//!
//! # Architecture
//!
//! - **Discovery**: Timer-driven [`Fetcher`]s polling an [`InstanceClient`]
//! - **Publisher**: Single-writer fan-in producing the `file_sd` JSON file
//! - **Metrics**: Request latency, failures and discovered targets
//! - **Server**: Metrics exposition over HTTP
//!
//! # Example
//!
//! ```rust,ignore
//! use lightsail_sd::{DiscoveryMetrics, Fetcher, LightsailClient, Publisher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = prometheus::Registry::new();
//!     let metrics = DiscoveryMetrics::register(&registry)?;
//!     let client = LightsailClient::connect(None, None).await?;
//!     let cancel = tokio_util::sync::CancellationToken::new();
//!
//!     let (publisher, tx) = Publisher::new("lightsail_sd.json", 1);
//!     let fetcher = Fetcher::new("lightsail", client, std::time::Duration::from_secs(60), metrics);
//!
//!     tokio::spawn(fetcher.run(tx, cancel.clone()));
//!     publisher.spawn(cancel).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod metrics;
pub mod publisher;
pub mod server;

pub use discovery::{
    DiscoveryError, Fetcher, Instance, InstanceClient, LightsailClient, TargetGroup, Update,
};
pub use metrics::DiscoveryMetrics;
pub use publisher::{FileSdGroup, Publisher, PublisherError};
