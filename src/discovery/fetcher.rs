//! Timer-driven fetcher: poll, diff, emit.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::discovery::{DiscoveryError, InstanceClient, TargetGroup, Update};
use crate::metrics::DiscoveryMetrics;

/// Minimum allowed refresh interval (1 second).
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Polls one [`InstanceClient`] on a fixed interval and emits complete batches.
///
/// The fetcher remembers which sources it saw on the previous successful poll
/// so that it can emit a tombstone for every source that disappeared.
pub struct Fetcher<C> {
    name: String,
    client: C,
    interval: Duration,
    metrics: DiscoveryMetrics,
    lasts: HashSet<String>,
}

impl<C: InstanceClient> Fetcher<C> {
    /// Create a fetcher.
    ///
    /// Interval is clamped to a minimum of 1 second.
    pub fn new(
        name: impl Into<String>,
        client: C,
        interval: Duration,
        metrics: DiscoveryMetrics,
    ) -> Self {
        let interval = if interval < MIN_INTERVAL {
            tracing::warn!(min_interval = ?MIN_INTERVAL,
                "Refresh interval is less than minimum allowed. Using minimum interval."
            );
            MIN_INTERVAL
        } else {
            interval
        };

        Self {
            name: name.into(),
            client,
            interval,
            metrics,
            lasts: HashSet::new(),
        }
    }

    /// Name the fetcher's batches are tagged with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective refresh interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Perform one poll and return the full batch.
    ///
    /// On error the remembered sources are left untouched, so the next
    /// successful poll still detects removals relative to the last good one.
    pub async fn refresh(&mut self) -> Result<Vec<TargetGroup>, DiscoveryError> {
        let start = Instant::now();
        let result = self.client.list_instances().await;
        self.metrics
            .request_duration
            .observe(start.elapsed().as_secs_f64());

        let instances = match result {
            Ok(instances) => instances,
            Err(e) => {
                self.metrics.request_failures.inc();
                return Err(e);
            }
        };

        tracing::debug!(fetcher = %self.name, count = instances.len(), "Listed instances");

        let mut groups: Vec<TargetGroup> =
            instances.iter().map(TargetGroup::from_instance).collect();
        groups.sort_by(|a, b| a.source.cmp(&b.source));
        self.metrics.discovered_targets.set(groups.len() as i64);

        let current: HashSet<String> = groups.iter().map(|g| g.source.clone()).collect();
        for group in &groups {
            tracing::debug!(fetcher = %self.name, source = %group.source, "Instance discovered");
        }

        let mut removed: Vec<&String> = self.lasts.difference(&current).collect();
        removed.sort();
        for source in removed {
            tracing::debug!(fetcher = %self.name, source = %source, "Instance removed");
            groups.push(TargetGroup::tombstone(source.clone()));
        }

        self.lasts = current;
        Ok(groups)
    }

    /// Run the poll loop until `cancel` fires or the receiver is dropped.
    ///
    /// The first poll happens immediately. Ticks that elapse while a send is
    /// blocked are skipped, never queued. Cancellation also abandons a poll
    /// that is still waiting on the client.
    pub async fn run(mut self, tx: mpsc::Sender<Update>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(fetcher = %self.name, interval = ?self.interval, "Fetcher started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // An in-flight API call may sit in SDK retries for a long time.
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.refresh() => result,
            };

            let groups = match result {
                Ok(groups) => groups,
                Err(e) => {
                    tracing::error!(fetcher = %self.name, error = %e, "Error fetching targets");
                    continue;
                }
            };

            let update = Update {
                name: self.name.clone(),
                groups,
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = tx.send(update) => {
                    if sent.is_err() {
                        tracing::warn!(fetcher = %self.name, "Publisher channel closed");
                        break;
                    }
                }
            }
        }

        tracing::info!(fetcher = %self.name, "Fetcher stopped");
    }
}

impl<C> std::fmt::Debug for Fetcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("known_sources", &self.lasts.len())
            .finish_non_exhaustive()
    }
}
