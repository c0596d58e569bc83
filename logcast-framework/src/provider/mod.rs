//! Provider trait, line formatting and the change poller.
//!
//! This module defines the core abstractions for turning a growing log into
//! pushed updates:
//!
//! - [`LogProvider`]: detects growth of a log source and returns new lines
//! - [`LineFormatter`]: stamps and renders lines for the wire
//! - [`LogItem`]: a single detected line
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    poll_logs()      ┌─────────────┐
//! │ LogProvider  │ ──────────────────> │   Delta     │ (raw lines + offset)
//! └──────────────┘                     └──────┬──────┘
//!                                             │
//!                                             │ publish()
//!                                             │
//! ┌──────────────┐    format_batch()   ┌──────▼──────┐    newLine    ┌────────┐
//! │LineFormatter │ <────────────────── │ Broadcaster │ ────────────> │viewers │
//! └──────────────┘                     └─────────────┘               └────────┘
//! ```
//!
//! The provider owns all offset state and is only ever driven from the poller
//! thread, so delta computations are serialized by construction.

mod log_item;

pub use log_item::{HtmlEntryFormatter, LineFormatter, LogItem, PlainFormatter, TIMESTAMP_FORMAT};

use crate::{broadcaster::Broadcaster, error::TailError};
use anyhow::Result;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

/// Newly completed lines and the offset they end at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    /// complete lines in file order (oldest first)
    pub lines: Vec<String>,
    /// byte offset just after the last delivered line
    pub offset: u64,
}

/// Trait for detecting new lines in a log source.
///
/// # Non-blocking Contract
///
/// `poll_logs()` must return promptly. If nothing changed it returns
/// `Ok(None)`; the poller calls it again after the configured interval.
///
/// # Thread Safety
///
/// Providers run on a dedicated background thread via
/// [`spawn_provider_thread`], hence the `Send` bound.
pub trait LogProvider: Send {
    /// Initialize the provider and pick the starting offset.
    ///
    /// # Errors
    ///
    /// An error aborts the poller thread.
    fn start(&mut self) -> Result<()>;

    /// Release any held resources.
    ///
    /// # Errors
    ///
    /// Errors are logged but do not prevent shutdown.
    fn stop(&mut self) -> Result<()>;

    /// Return the lines completed since the last successful poll.
    ///
    /// # Contract
    ///
    /// - Only complete lines are returned; a trailing fragment waits for its
    ///   delimiter
    /// - On error the delivered offset must be left as it was (or reset, for
    ///   a [`TailError::Truncated`] anomaly) so the next poll can retry
    fn poll_logs(&mut self) -> Result<Option<Delta>>;

    /// Byte offset up to which lines have been handed out, if known.
    fn delivered_offset(&self) -> Option<u64> {
        None
    }
}

/// Run one poll and publish its result. Returns the number of new lines.
///
/// Truncation anomalies move the broadcaster watermark to wherever the
/// provider reset to, then surface as the returned error.
pub fn run_tick<P>(provider: &mut P, broadcaster: &Broadcaster) -> Result<usize>
where
    P: LogProvider + ?Sized,
{
    match provider.poll_logs() {
        Ok(Some(delta)) => {
            let count = delta.lines.len();
            let report = broadcaster.publish(&delta);
            if count > 0 {
                log::debug!(
                    "Published {} new lines to {} viewers ({} skipped, {} failed)",
                    count,
                    report.delivered,
                    report.skipped,
                    report.failures.len()
                );
            }
            Ok(count)
        }
        Ok(None) => Ok(0),
        Err(e) => {
            if e.downcast_ref::<TailError>().is_some_and(TailError::is_anomaly) {
                broadcaster.set_watermark(provider.delivered_offset());
            }
            Err(e)
        }
    }
}

/// Spawns a background thread that polls a provider and publishes its deltas.
///
/// # Lifecycle
///
/// 1. Calls `provider.start()` and seeds the broadcaster watermark
/// 2. Loops: [`run_tick`], then sleeps for `poll_interval`
/// 3. On stop signal: calls `provider.stop()` and exits
///
/// Ticks run one after the other on this thread, so a slow tick delays the
/// next one instead of overlapping it.
///
/// # Errors
///
/// - Errors from `start()` are logged and abort the thread
/// - Errors from a tick are logged and polling continues on the next interval
/// - Errors from `stop()` are logged but don't prevent shutdown
pub fn spawn_provider_thread<P>(
    mut provider: P,
    broadcaster: Arc<Broadcaster>,
    poll_interval: Duration,
) -> (thread::JoinHandle<()>, Arc<AtomicBool>)
where
    P: LogProvider + 'static,
{
    let should_stop = Arc::new(AtomicBool::new(false));
    let should_stop_clone = should_stop.clone();

    let handle = thread::spawn(move || {
        if let Err(e) = provider.start() {
            log::error!("Failed to start log provider: {:#}", e);
            return;
        }
        broadcaster.set_watermark(provider.delivered_offset());

        log::debug!("Provider thread started");

        while !should_stop_clone.load(Ordering::Relaxed) {
            if let Err(e) = run_tick(&mut provider, &broadcaster) {
                match e.downcast_ref::<TailError>() {
                    Some(tail_err) if tail_err.is_anomaly() => {
                        log::warn!("Tail state reset: {}", tail_err);
                    }
                    _ => log::error!("Provider poll error: {:#}", e),
                }
            }

            sleep_unless_stopped(poll_interval, &should_stop_clone);
        }

        if let Err(e) = provider.stop() {
            log::error!("Failed to stop log provider: {:#}", e);
        }

        log::debug!("Provider thread stopped");
    });

    (handle, should_stop)
}

// sleeps in short steps so a stop request is noticed well before a long
// interval elapses
fn sleep_unless_stopped(interval: Duration, should_stop: &AtomicBool) {
    const STEP: Duration = Duration::from_millis(50);
    let mut remaining = interval;
    while !remaining.is_zero() && !should_stop.load(Ordering::Relaxed) {
        let step = remaining.min(STEP);
        thread::sleep(step);
        remaining -= step;
    }
}
