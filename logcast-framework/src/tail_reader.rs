//! Backward chunk reader.
//!
//! Finds the last N complete lines of a byte region by reading it from the end
//! in fixed-size chunks, so the cost depends on the size of the lines returned
//! and not on the size of the file.
//!
//! ```text
//!   start                                               end
//!     │ ... line\n line\n line\n line\n line\n partial    │
//!     │          ◄──────── chunk ──────►◄──── chunk ─────►│
//! ```
//!
//! Bytes after the last `\n` form an unterminated fragment and are never
//! returned. A line that straddles a chunk boundary is carried over into the
//! next (earlier) chunk and only emitted once its leading delimiter is found.

use crate::error::TailError;
use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

/// Result of a backward read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailLines {
    /// complete lines in file order (oldest first), without delimiters
    pub lines: Vec<String>,
    /// byte position just after the last `\n` in the region, or the region
    /// start if the region holds no delimiter at all
    pub complete_end: u64,
}

/// Read up to `max_lines` complete lines from the region `[start, end)`.
///
/// `start` must sit on a line boundary (byte 0 or just after a `\n`); the
/// first line of the region is only emitted when that holds.
pub fn read_tail_lines<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    max_lines: usize,
    chunk_size: usize,
) -> Result<TailLines, TailError> {
    let mut tail = TailLines {
        lines: Vec::new(),
        complete_end: start,
    };
    if end <= start {
        return Ok(tail);
    }

    let chunk_size = (chunk_size.max(1) as u64).min(end - start);
    let mut buf = vec![0u8; chunk_size as usize];
    // newest line first while walking backward, flipped before returning
    let mut newest_first: Vec<String> = Vec::new();
    // tail end of the line currently being assembled, from later chunks
    let mut carry: Vec<u8> = Vec::new();
    // whether a `\n` has been seen yet; everything before it is unterminated
    let mut terminated = false;
    let mut pos = end;

    while pos > start {
        let len = chunk_size.min(pos - start);
        let chunk_start = pos - len;
        let chunk = &mut buf[..len as usize];
        reader.seek(SeekFrom::Start(chunk_start))?;
        reader.read_exact(chunk)?;

        let mut seg_end = chunk.len();
        for i in (0..chunk.len()).rev() {
            if chunk[i] != b'\n' {
                continue;
            }
            if terminated {
                let mut line = chunk[i + 1..seg_end].to_vec();
                line.append(&mut carry);
                newest_first.push(decode_line(line));
            } else {
                // the last delimiter of the region, bytes after it are a fragment
                tail.complete_end = chunk_start + i as u64 + 1;
                terminated = true;
            }
            seg_end = i;
            if newest_first.len() >= max_lines {
                break;
            }
        }

        pos = chunk_start;
        if terminated {
            if newest_first.len() >= max_lines {
                break;
            }
            let mut prefix = chunk[..seg_end].to_vec();
            prefix.append(&mut carry);
            carry = prefix;
        }
    }

    // region start is a line boundary, so whatever is carried is a whole line
    if pos == start && terminated && newest_first.len() < max_lines {
        newest_first.push(decode_line(carry));
    }

    newest_first.reverse();
    tail.lines = newest_first;
    Ok(tail)
}

/// Open `path` and read up to `max_lines` complete lines ending at or before
/// `end` (or the end of the file when `end` is `None`).
pub fn read_file_tail(
    path: &Path,
    end: Option<u64>,
    max_lines: usize,
    chunk_size: usize,
) -> Result<TailLines, TailError> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let end = end.map_or(len, |e| e.min(len));
    read_tail_lines(&mut file, 0, end, max_lines, chunk_size)
}

fn decode_line(mut bytes: Vec<u8>) -> String {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tail(content: &str, max_lines: usize, chunk_size: usize) -> TailLines {
        let mut cursor = Cursor::new(content.as_bytes().to_vec());
        read_tail_lines(&mut cursor, 0, content.len() as u64, max_lines, chunk_size).unwrap()
    }

    fn brute_force(content: &str, max_lines: usize) -> Vec<String> {
        let complete = match content.rfind('\n') {
            Some(i) => &content[..i],
            None => return Vec::new(),
        };
        let all: Vec<String> = complete.split('\n').map(|s| s.to_string()).collect();
        let skip = all.len().saturating_sub(max_lines);
        all[skip..].to_vec()
    }

    fn numbered(count: usize) -> String {
        (1..=count).map(|i| format!("line number {}\n", i)).collect()
    }

    #[test]
    fn test_empty_region() {
        let result = tail("", 10, 1024);
        assert!(result.lines.is_empty());
        assert_eq!(result.complete_end, 0);
    }

    #[test]
    fn test_file_shorter_than_chunk() {
        let result = tail("a\nb\nc\n", 10, 1024);
        assert_eq!(result.lines, vec!["a", "b", "c"]);
        assert_eq!(result.complete_end, 6);
    }

    #[test]
    fn test_no_trailing_delimiter_skips_fragment() {
        let result = tail("a\nb\nhalf", 10, 1024);
        assert_eq!(result.lines, vec!["a", "b"]);
        assert_eq!(result.complete_end, 4);
    }

    #[test]
    fn test_single_unterminated_fragment() {
        let result = tail("no newline here", 10, 4);
        assert!(result.lines.is_empty());
        assert_eq!(result.complete_end, 0);
    }

    #[test]
    fn test_exactly_max_lines() {
        let content = numbered(10);
        let result = tail(&content, 10, 16);
        assert_eq!(result.lines.len(), 10);
        assert_eq!(result.lines[0], "line number 1");
        assert_eq!(result.lines[9], "line number 10");
    }

    #[test]
    fn test_more_than_max_lines_keeps_newest() {
        let content = numbered(25);
        let result = tail(&content, 10, 16);
        assert_eq!(result.lines, brute_force(&content, 10));
        assert_eq!(result.lines[0], "line number 16");
        assert_eq!(result.complete_end, content.len() as u64);
    }

    #[test]
    fn test_chunk_size_invariance() {
        let mut content = numbered(40);
        content.push_str("\n\nsome longer line that spans several tiny chunks\ntrailing");
        let expected = brute_force(&content, 12);
        for chunk_size in [1, 2, 3, 7, 16, 64, 1024, 4096] {
            let result = tail(&content, 12, chunk_size);
            assert_eq!(result.lines, expected, "chunk size {}", chunk_size);
            assert_eq!(result.complete_end, content.rfind('\n').unwrap() as u64 + 1);
        }
    }

    #[test]
    fn test_line_split_across_chunk_boundary() {
        // "bbbbbbbb" straddles the 4-byte chunk boundary
        let result = tail("aa\nbbbbbbbb\ncc\n", 10, 4);
        assert_eq!(result.lines, vec!["aa", "bbbbbbbb", "cc"]);
    }

    #[test]
    fn test_empty_lines_are_lines() {
        let result = tail("\n\nx\n", 10, 2);
        assert_eq!(result.lines, vec!["", "", "x"]);
    }

    #[test]
    fn test_crlf_is_stripped() {
        let result = tail("one\r\ntwo\r\n", 10, 3);
        assert_eq!(result.lines, vec!["one", "two"]);
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let content = "héllo wörld\n日本語のログ\n";
        for chunk_size in 1..8 {
            let result = tail(content, 10, chunk_size);
            assert_eq!(result.lines, vec!["héllo wörld", "日本語のログ"]);
        }
    }

    #[test]
    fn test_region_starting_mid_file() {
        let content = "old\nolder\nnew one\nnew two\n";
        let start = "old\nolder\n".len() as u64;
        let mut cursor = Cursor::new(content.as_bytes().to_vec());
        let result =
            read_tail_lines(&mut cursor, start, content.len() as u64, 10, 5).unwrap();
        assert_eq!(result.lines, vec!["new one", "new two"]);
        assert_eq!(result.complete_end, content.len() as u64);
    }

    #[test]
    fn test_region_with_only_a_fragment_keeps_start() {
        let content = "done\npartial";
        let mut cursor = Cursor::new(content.as_bytes().to_vec());
        let result = read_tail_lines(&mut cursor, 5, content.len() as u64, 10, 4).unwrap();
        assert!(result.lines.is_empty());
        assert_eq!(result.complete_end, 5);
    }

    #[test]
    fn test_zero_chunk_size_is_treated_as_one() {
        let result = tail("a\nb\n", 10, 0);
        assert_eq!(result.lines, vec!["a", "b"]);
    }

    #[test]
    fn test_huge_chunk_size_on_small_region() {
        let result = tail("a\nb\n", 10, usize::MAX);
        assert_eq!(result.lines, vec!["a", "b"]);
        assert_eq!(result.complete_end, 4);
    }

    #[test]
    fn test_zero_max_lines_still_reports_complete_end() {
        let result = tail("a\nb\nc", 0, 2);
        assert!(result.lines.is_empty());
        assert_eq!(result.complete_end, 4);
    }

    #[test]
    fn test_short_read_is_an_io_error() {
        let mut cursor = Cursor::new(b"abc\n".to_vec());
        let result = read_tail_lines(&mut cursor, 0, 64, 10, 16);
        assert!(matches!(result, Err(TailError::Io(_))));
    }
}
