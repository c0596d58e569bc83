use chrono::{DateTime, Local};

/// display format of the bracketed detection timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// represents a single complete line read from the tailed file
#[derive(Debug, Clone)]
pub struct LogItem {
    /// wall-clock time the line was detected, not any time embedded in the text
    pub time: String,
    pub content: String,
}

impl LogItem {
    pub fn new(content: String) -> Self {
        Self::with_time(content, Local::now())
    }

    pub fn with_time(content: String, detected_at: DateTime<Local>) -> Self {
        Self {
            time: detected_at.format(TIMESTAMP_FORMAT).to_string(),
            content,
        }
    }
}

/// trait for rendering log items into self-contained wire entries
pub trait LineFormatter: Send + Sync {
    /// render one item, embedding its bracketed timestamp
    fn format(&self, item: &LogItem) -> String;

    /// stamp and render a batch of raw lines, keeping their order
    fn format_batch(&self, lines: &[String]) -> Vec<String> {
        lines
            .iter()
            .map(|line| self.format(&LogItem::new(line.clone())))
            .collect()
    }
}

/// renders `<div class="log-entry"><strong>[time]</strong> text</div>`
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlEntryFormatter;

impl LineFormatter for HtmlEntryFormatter {
    fn format(&self, item: &LogItem) -> String {
        format!(
            "<div class=\"log-entry\"><strong>[{}]</strong> {}</div>",
            item.time,
            escape_html(&item.content)
        )
    }
}

/// renders `[time] text`
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormatter;

impl LineFormatter for PlainFormatter {
    fn format(&self, item: &LogItem) -> String {
        format!("[{}] {}", item.time, item.content)
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
