use crate::{metadata, tail_state::TailState};
use anyhow::{Context, Result};
use logcast_framework::{
    Delta, LogProvider, SnapshotSource, StartPosition, TailDesc, TailError, read_file_tail,
    read_tail_lines,
};
use std::{fs::File, path::PathBuf};

/// log provider that tails one append-only file
pub struct FileTailProvider {
    log_file_path: PathBuf,
    chunk_size: usize,
    batch_size: usize,
    start_position: StartPosition,
    state: TailState,
}

impl FileTailProvider {
    pub fn new(desc: &TailDesc) -> Self {
        Self {
            log_file_path: desc.log_file_path.clone(),
            chunk_size: desc.chunk_size,
            batch_size: desc.batch_size,
            start_position: desc.start_position,
            state: TailState::default(),
        }
    }

    pub fn current_offset(&self) -> u64 {
        self.state.current_offset()
    }

    /// Read the newest complete lines past the offset. The flag is true when
    /// older new lines did not fit in the batch.
    fn read_delta(&self, len: u64) -> Result<(Delta, bool), TailError> {
        let mut file = File::open(&self.log_file_path)?;
        // one extra line tells a full batch apart from an overflowing one
        let tail = read_tail_lines(
            &mut file,
            self.state.current_offset(),
            len,
            self.batch_size.saturating_add(1),
            self.chunk_size,
        )?;
        let mut lines = tail.lines;
        let capped = cap_to_newest(&mut lines, self.batch_size);
        Ok((
            Delta {
                lines,
                offset: tail.complete_end,
            },
            capped,
        ))
    }
}

impl LogProvider for FileTailProvider {
    fn start(&mut self) -> Result<()> {
        log::debug!(
            "FileTailProvider: Starting on {}",
            self.log_file_path.display()
        );

        let offset = match self.start_position {
            StartPosition::Beginning => 0,
            // skip everything up to the end of the last complete line
            StartPosition::End if self.log_file_path.exists() => {
                read_file_tail(&self.log_file_path, None, 0, self.chunk_size)
                    .with_context(|| {
                        format!("Failed to read {}", self.log_file_path.display())
                    })?
                    .complete_end
            }
            StartPosition::End => 0,
        };
        self.state = TailState::new(offset);

        log::info!(
            "Tailing {} from byte {}",
            self.log_file_path.display(),
            offset
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        log::debug!("FileTailProvider: Stopping");
        Ok(())
    }

    fn poll_logs(&mut self) -> Result<Option<Delta>> {
        if !self.log_file_path.exists() {
            log::debug!(
                "FileTailProvider: {} does not exist yet",
                self.log_file_path.display()
            );
            return Ok(None);
        }

        let current_meta = metadata::stat_path(&self.log_file_path)
            .map_err(TailError::from)
            .with_context(|| format!("Failed to stat {}", self.log_file_path.display()))?;

        match self.state.check_for_change(&current_meta) {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(e) => {
                // handle file truncation
                self.state.reset();
                return Err(e.into());
            }
        }

        if current_meta.len == self.state.current_offset() {
            return Ok(None);
        }

        let (delta, capped) = match self.read_delta(current_meta.len) {
            Ok(read) => read,
            Err(e) => {
                self.state.invalidate();
                return Err(anyhow::Error::from(e).context(format!(
                    "Failed to read {}",
                    self.log_file_path.display()
                )));
            }
        };

        let previous = self.state.current_offset();
        self.state.advance_offset_to(delta.offset, current_meta.len)?;

        if capped {
            log::debug!(
                "FileTailProvider: Batch capped at {} lines, older new lines skipped",
                self.batch_size
            );
        }
        log::debug!(
            "FileTailProvider: Read {} new lines, offset {} -> {}",
            delta.lines.len(),
            previous,
            delta.offset
        );

        Ok(Some(delta))
    }

    fn delivered_offset(&self) -> Option<u64> {
        Some(self.state.current_offset())
    }
}

// drops the oldest lines beyond `batch_size`, returning whether any were dropped
fn cap_to_newest(lines: &mut Vec<String>, batch_size: usize) -> bool {
    let excess = lines.len().saturating_sub(batch_size);
    lines.drain(..excess);
    excess > 0
}

/// snapshot source reading the trailing lines of the tailed file
pub struct FileSnapshotSource {
    log_file_path: PathBuf,
    chunk_size: usize,
}

impl FileSnapshotSource {
    pub fn new(desc: &TailDesc) -> Self {
        Self {
            log_file_path: desc.log_file_path.clone(),
            chunk_size: desc.chunk_size,
        }
    }
}

impl SnapshotSource for FileSnapshotSource {
    fn snapshot_lines(&self, end: Option<u64>, max_lines: usize) -> Result<Vec<String>> {
        let tail = read_file_tail(&self.log_file_path, end, max_lines, self.chunk_size)
            .with_context(|| format!("Failed to read {}", self.log_file_path.display()))?;
        Ok(tail.lines)
    }
}
