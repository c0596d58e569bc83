//! Messages pushed from the server to viewers.
//!
//! Encoded as internally tagged JSON:
//!
//! ```text
//! {"type":"initialLines","lines":["<entry>", ...]}
//! {"type":"newLine","lines":["<entry>", ...]}
//! ```
//!
//! Both kinds list entries most-recent first.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WireMessage {
    /// trailing window sent once to a viewer right after it connects
    InitialLines { lines: Vec<String> },
    /// batch of newly detected lines sent to every viewer
    NewLine { lines: Vec<String> },
}

impl WireMessage {
    /// build a snapshot message from entries in file order
    pub fn initial_lines(mut entries: Vec<String>) -> Self {
        entries.reverse();
        Self::InitialLines { lines: entries }
    }

    /// build a delta message from entries in file order
    pub fn new_lines(mut entries: Vec<String>) -> Self {
        entries.reverse();
        Self::NewLine { lines: entries }
    }

    pub fn lines(&self) -> &[String] {
        match self {
            Self::InitialLines { lines } | Self::NewLine { lines } => lines,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
