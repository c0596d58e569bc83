// logcast-file - file-backed log provider for logcast
//
// This crate tails a single append-only file: it tracks the delivered offset
// and the last observed metadata, and reads new lines with the backward chunk
// reader from logcast-framework.

pub mod metadata;
mod provider;
pub mod tail_state;

pub use provider::{FileSnapshotSource, FileTailProvider};
pub use tail_state::TailState;
