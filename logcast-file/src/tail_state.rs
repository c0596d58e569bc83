use crate::metadata::{self, MetaSnap};
use logcast_framework::TailError;

/// Per-file tail state: the delivered offset and the last observed metadata.
///
/// The offset only moves forward and never past the size seen at check time.
/// A file that shrinks below the offset is reported as
/// [`TailError::Truncated`] instead of being clamped.
#[derive(Debug, Clone, Default)]
pub struct TailState {
    offset: u64,
    prev_meta: Option<MetaSnap>,
}

impl TailState {
    pub fn new(offset: u64) -> Self {
        Self {
            offset,
            prev_meta: None,
        }
    }

    /// Compare `current` with the last observation and record it when newer.
    ///
    /// Returns `Ok(false)` when nothing changed, so callers can skip the read.
    pub fn check_for_change(&mut self, current: &MetaSnap) -> Result<bool, TailError> {
        if !metadata::has_changed(&self.prev_meta, current) {
            return Ok(false);
        }
        if current.len < self.offset {
            return Err(TailError::Truncated {
                offset: self.offset,
                len: current.len,
            });
        }
        self.prev_meta = Some(*current);
        Ok(true)
    }

    pub fn current_offset(&self) -> u64 {
        self.offset
    }

    /// Move the offset to `offset`, given the file is `len` bytes long.
    pub fn advance_offset_to(&mut self, offset: u64, len: u64) -> Result<(), TailError> {
        if offset < self.offset {
            return Err(TailError::OffsetRegression {
                current: self.offset,
                requested: offset,
            });
        }
        if offset > len {
            return Err(TailError::OffsetBeyondEnd {
                requested: offset,
                len,
            });
        }
        self.offset = offset;
        Ok(())
    }

    /// Forget the last observation so the next check reports a change and the
    /// same offset is read again.
    pub fn invalidate(&mut self) {
        self.prev_meta = None;
    }

    /// Start over from byte 0, after truncation.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.prev_meta = None;
    }
}
