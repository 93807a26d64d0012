//! Discovery Layer
//!
//! Periodically lists cloud instances and turns them into target groups that
//! are pushed to the [`Publisher`](crate::Publisher) through an MPSC channel.
//! Each fetcher runs in its own Tokio task.
//!
//! # Architecture
//!
//! - [`InstanceClient`]: Narrow "list current instances" capability
//! - [`Fetcher`]: Timer-driven poll/diff loop for one discovery source
//! - [`TargetGroup`]: Normalized unit exchanged with the publisher
//! - [`LightsailClient`]: AWS Lightsail implementation of [`InstanceClient`]
//!
//! # Example
//!
//! ```rust,no_run
//! use lightsail_sd::{DiscoveryMetrics, Fetcher, LightsailClient, Publisher};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = prometheus::Registry::new();
//! let metrics = DiscoveryMetrics::register(&registry)?;
//! let client = LightsailClient::connect(None, None).await?;
//! let (publisher, tx) = Publisher::new("lightsail_sd.json", 1);
//! let cancel = CancellationToken::new();
//!
//! let fetcher = Fetcher::new("lightsail", client, Duration::from_secs(60), metrics);
//! tokio::spawn(fetcher.run(tx, cancel.clone()));
//! publisher.spawn(cancel).await?;
//! # Ok(())
//! # }
//! ```

mod fetcher;
pub mod lightsail;
mod target;
mod traits;

pub use fetcher::{Fetcher, MIN_INTERVAL};
pub use lightsail::LightsailClient;
pub use target::{PUBLIC_IP_MISSING, SOURCE_PREFIX, TargetGroup, labels, sanitize_label_name};
pub use traits::{DiscoveryError, Instance, InstanceClient, Update};
