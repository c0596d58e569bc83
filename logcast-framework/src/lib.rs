//! # logcast-framework
//!
//! Building blocks for tailing a growing, append-only log file and pushing
//! newly completed lines to any number of live viewers.
//!
//! ## Overview
//!
//! A [`LogProvider`] watches the source and hands out [`Delta`]s of complete
//! lines. The poller thread started by [`spawn_provider_thread`] drives the
//! provider on a fixed interval and passes each delta to the [`Broadcaster`],
//! which stamps the lines through a [`LineFormatter`] and sends them to every
//! registered viewer as a [`WireMessage`].
//!
//! New viewers get a snapshot of the trailing lines on registration, computed
//! by a [`SnapshotSource`], usually backed by [`tail_reader::read_file_tail`].
//!
//! ## Backward reads
//!
//! [`tail_reader::read_tail_lines`] finds the last N complete lines of a byte
//! region by walking it backward in fixed-size chunks. The result does not
//! depend on the chunk size, and unterminated fragments are never returned.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use logcast_framework::{
//!     Broadcaster, Delta, HtmlEntryFormatter, LogProvider, SnapshotSource,
//!     spawn_provider_thread,
//! };
//! use anyhow::Result;
//! use std::{sync::Arc, time::Duration};
//!
//! struct Static;
//!
//! impl LogProvider for Static {
//!     fn start(&mut self) -> Result<()> { Ok(()) }
//!     fn stop(&mut self) -> Result<()> { Ok(()) }
//!     fn poll_logs(&mut self) -> Result<Option<Delta>> { Ok(None) }
//! }
//!
//! impl SnapshotSource for Static {
//!     fn snapshot_lines(&self, _: Option<u64>, _: usize) -> Result<Vec<String>> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! let broadcaster = Arc::new(Broadcaster::new(
//!     Arc::new(Static),
//!     Arc::new(HtmlEntryFormatter),
//!     10,
//! ));
//! let (handle, stop) = spawn_provider_thread(Static, broadcaster, Duration::from_secs(1));
//! stop.store(true, std::sync::atomic::Ordering::Relaxed);
//! handle.join().ok();
//! ```

pub mod broadcaster;
pub mod desc;
pub mod error;
pub mod provider;
pub mod tail_reader;
pub mod wire;

// re-export commonly used types
pub use broadcaster::{
    BroadcastReport, Broadcaster, DeliveryError, SnapshotSource, ViewerId, ViewerSender,
};
pub use desc::{StartPosition, TailDesc};
pub use error::TailError;
pub use provider::{
    Delta, HtmlEntryFormatter, LineFormatter, LogItem, LogProvider, PlainFormatter, run_tick,
    spawn_provider_thread,
};
pub use tail_reader::{TailLines, read_file_tail, read_tail_lines};
pub use wire::WireMessage;
