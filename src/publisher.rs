//! Publisher Layer
//!
//! Single-writer fan-in of discovery batches into one `file_sd` document:
//! - **Actor**: Async task owning the per-fetcher state, fed by a bounded MPSC channel
//! - **Output**: Rendering and atomic replacement of the target file
//!
//! # Components
//!
//! - [`Publisher`]: Consumer task and merge logic
//! - [`FileSdGroup`]: One element of the exported JSON array
//! - [`PublisherError`]: Render and write failures

mod actor;
mod error;
mod output;

pub use actor::{DEFAULT_CHANNEL_CAPACITY, Publisher};
pub use error::PublisherError;
pub use output::{FileSdGroup, render, write_atomic};
