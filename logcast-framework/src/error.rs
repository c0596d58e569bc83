use thiserror::Error;

/// Errors raised while tailing a log file.
///
/// `Io` covers open, stat and read failures. `Truncated` is the anomaly raised
/// when the file got smaller than the offset already delivered, which usually
/// means the file was truncated or replaced. The two offset variants guard the
/// monotonic offset contract of the tail state.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("I/O error while tailing")]
    Io(#[from] std::io::Error),

    #[error("file shrank to {len} bytes, below the delivered offset {offset}")]
    Truncated { offset: u64, len: u64 },

    #[error("offset cannot move backward from {current} to {requested}")]
    OffsetRegression { current: u64, requested: u64 },

    #[error("offset {requested} is past the end of the file ({len} bytes)")]
    OffsetBeyondEnd { requested: u64, len: u64 },
}

impl TailError {
    /// true for the truncation anomaly, which callers usually log as a warning
    /// rather than a failure
    pub fn is_anomaly(&self) -> bool {
        matches!(self, TailError::Truncated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_cause_is_reported_once() {
        let err = anyhow::Error::from(TailError::from(std::io::Error::other("disk gone")))
            .context("Failed to read log.txt");
        let chain = format!("{:#}", err);
        assert_eq!(chain, "Failed to read log.txt: I/O error while tailing: disk gone");
        assert_eq!(chain.matches("disk gone").count(), 1);
    }

    #[test]
    fn test_only_truncation_is_an_anomaly() {
        assert!(TailError::Truncated { offset: 4, len: 1 }.is_anomaly());
        assert!(!TailError::from(std::io::Error::other("x")).is_anomaly());
    }
}
