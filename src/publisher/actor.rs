//! Publisher actor with exclusive ownership of the output file.
//!
//! Single-writer pattern: one task owns the per-fetcher state and the output
//! path, processing batches from a bounded MPSC channel.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::discovery::{TargetGroup, Update};
use crate::publisher::{PublisherError, render, write_atomic};

/// Default channel capacity: at most one pending batch.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// Fans in batches from named fetchers and keeps the output file current.
///
/// Each fetcher name maps to its latest batch; a new batch replaces the old
/// one wholesale. The exported document is the concatenation of all batches
/// in ascending name order.
pub struct Publisher {
    output: PathBuf,
    rx: mpsc::Receiver<Update>,
    batches: BTreeMap<String, Vec<TargetGroup>>,
    last_written: Option<Vec<u8>>,
}

impl Publisher {
    /// Create a publisher for `output` and the sender fetchers push into.
    ///
    /// `capacity` is clamped to at least one.
    pub fn new(output: impl AsRef<Path>, capacity: usize) -> (Self, mpsc::Sender<Update>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let publisher = Self {
            output: output.as_ref().to_path_buf(),
            rx,
            batches: BTreeMap::new(),
            last_written: None,
        };
        (publisher, tx)
    }

    /// Path of the output file.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Spawn the consumer task and return immediately.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(output = %self.output.display(), "Publisher started");

        loop {
            let update = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                update = self.rx.recv() => match update {
                    Some(update) => update,
                    None => {
                        tracing::warn!("All fetchers disconnected, shutting down");
                        break;
                    }
                },
            };

            if let Err(e) = self.apply(update) {
                tracing::error!(
                    output = %self.output.display(),
                    error = %e,
                    "Failed to write output file"
                );
            }
        }

        tracing::info!("Publisher stopped");
    }

    /// Replace the batch for `update.name` and rewrite the output if the
    /// merged document changed.
    ///
    /// Returns `Ok(true)` if the file was written. On error the in-memory
    /// state is kept and the next call retries the write.
    pub fn apply(&mut self, update: Update) -> Result<bool, PublisherError> {
        tracing::debug!(
            fetcher = %update.name,
            groups = update.groups.len(),
            "Received target groups"
        );
        self.batches.insert(update.name, update.groups);

        let contents = render(self.batches.values().flatten())?;
        if self.last_written.as_deref() == Some(contents.as_slice()) {
            tracing::debug!("Target groups unchanged, skipping write");
            return Ok(false);
        }

        write_atomic(&self.output, &contents)?;
        tracing::info!(
            output = %self.output.display(),
            bytes = contents.len(),
            "Wrote target groups"
        );
        self.last_written = Some(contents);
        Ok(true)
    }

    /// Number of fetcher names with a stored batch.
    pub fn source_count(&self) -> usize {
        self.batches.len()
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("output", &self.output)
            .field("sources", &self.batches.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Instance;
    use crate::publisher::FileSdGroup;

    fn update(name: &str, groups: Vec<TargetGroup>) -> Update {
        Update {
            name: name.to_string(),
            groups,
        }
    }

    fn group(name: &str, ip: &str) -> TargetGroup {
        TargetGroup::from_instance(&Instance::new(name, ip))
    }

    fn read(path: &Path) -> Vec<FileSdGroup> {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_apply_writes_and_skips_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sd.json");
        let (mut publisher, _tx) = Publisher::new(&path, 1);
        assert_eq!(publisher.output(), path.as_path());

        assert!(publisher.apply(update("lightsail", vec![group("web1", "10.0.0.5")])).unwrap());
        let first = std::fs::read(&path).unwrap();

        // Remove the file: a skipped write must not recreate it.
        std::fs::remove_file(&path).unwrap();
        assert!(!publisher.apply(update("lightsail", vec![group("web1", "10.0.0.5")])).unwrap());
        assert!(!path.exists());

        assert!(publisher.apply(update("lightsail", vec![group("web1", "10.0.0.6")])).unwrap());
        assert_ne!(std::fs::read(&path).unwrap(), first);
    }

    #[test]
    fn test_apply_replaces_batch_per_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sd.json");
        let (mut publisher, _tx) = Publisher::new(&path, 1);

        publisher
            .apply(update(
                "lightsail",
                vec![group("web1", "10.0.0.5"), group("web2", "10.0.0.6")],
            ))
            .unwrap();
        publisher
            .apply(update("lightsail", vec![group("web2", "10.0.0.6")]))
            .unwrap();

        let doc = read(&path);
        assert_eq!(doc.len(), 1);
        assert_eq!(doc[0].targets, vec!["10.0.0.6"]);
    }

    #[test]
    fn test_apply_merges_names_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sd.json");
        let (mut publisher, _tx) = Publisher::new(&path, 1);

        publisher
            .apply(update("zeta", vec![group("z1", "10.0.1.1")]))
            .unwrap();
        publisher
            .apply(update("alpha", vec![group("a1", "10.0.2.1")]))
            .unwrap();
        assert_eq!(publisher.source_count(), 2);

        let doc = read(&path);
        let targets: Vec<&str> = doc.iter().map(|g| g.targets[0].as_str()).collect();
        assert_eq!(targets, vec!["10.0.2.1", "10.0.1.1"]);

        // Arrival order does not change the merged result.
        let other = dir.path().join("other.json");
        let (mut reversed, _tx) = Publisher::new(&other, 1);
        reversed
            .apply(update("alpha", vec![group("a1", "10.0.2.1")]))
            .unwrap();
        reversed
            .apply(update("zeta", vec![group("z1", "10.0.1.1")]))
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), std::fs::read(&other).unwrap());
    }

    #[test]
    fn test_apply_retries_after_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sd.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("blocker"), b"x").unwrap();
        let (mut publisher, _tx) = Publisher::new(&path, 1);

        let batch = vec![group("web1", "10.0.0.5")];
        assert!(publisher.apply(update("lightsail", batch.clone())).is_err());

        std::fs::remove_dir_all(&path).unwrap();
        assert!(publisher.apply(update("lightsail", batch)).unwrap());
        assert_eq!(read(&path).len(), 1);
    }

    #[tokio::test]
    async fn test_spawned_publisher_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sd.json");
        let (publisher, tx) = Publisher::new(&path, 1);
        let cancel = CancellationToken::new();
        let handle = publisher.spawn(cancel.clone());

        tx.send(update("lightsail", vec![group("web1", "10.0.0.5")]))
            .await
            .unwrap();

        // Wait until the batch has been written.
        for _ in 0..100 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(read(&path).len(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_spawned_publisher_stops_when_senders_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let (publisher, tx) = Publisher::new(dir.path().join("sd.json"), 1);
        let handle = publisher.spawn(CancellationToken::new());

        drop(tx);
        handle.await.unwrap();
    }
}
