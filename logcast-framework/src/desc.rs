use std::{path::PathBuf, time::Duration};

// constants
pub const DEFAULT_LOG_FILE_PATH: &str = "logs/log.txt";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_CHUNK_SIZE: usize = 1024;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_SNAPSHOT_SIZE: usize = 10;

/// where tailing begins when the provider starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPosition {
    /// replay the file from byte 0 on the first tick
    Beginning,
    /// only lines completed after start-up are delivered
    #[default]
    End,
}

/// tailing configuration shared by the provider, the poller and the broadcaster
#[derive(Debug, Clone)]
pub struct TailDesc {
    pub log_file_path: PathBuf,
    pub poll_interval: Duration,
    /// bytes read per backward chunk
    pub chunk_size: usize,
    /// most new lines delivered per tick
    pub batch_size: usize,
    /// lines sent to a viewer on connect; fewer available means none are sent
    pub snapshot_size: usize,
    pub start_position: StartPosition,
}

impl TailDesc {
    pub fn new(log_file_path: impl Into<PathBuf>) -> Self {
        Self {
            log_file_path: log_file_path.into(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            snapshot_size: DEFAULT_SNAPSHOT_SIZE,
            start_position: StartPosition::default(),
        }
    }
}

impl Default for TailDesc {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_FILE_PATH)
    }
}
