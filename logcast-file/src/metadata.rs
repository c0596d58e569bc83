use std::{fs, io, path::Path, time::SystemTime};

/// size and modification time of a file at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaSnap {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

pub fn stat_path(path: &Path) -> io::Result<MetaSnap> {
    let meta = fs::metadata(path)?;
    Ok(MetaSnap {
        len: meta.len(),
        // not every platform reports mtime
        modified: meta.modified().ok(),
    })
}

/// true when `current` is newer than `prev`: a later mtime, or a different
/// size (coarse mtime resolution can hide quick successive appends)
pub fn has_changed(prev: &Option<MetaSnap>, current: &MetaSnap) -> bool {
    match prev {
        None => true,
        Some(prev) => {
            let newer = match (prev.modified, current.modified) {
                (Some(p), Some(c)) => c > p,
                (None, Some(_)) => true,
                _ => false,
            };
            newer || prev.len != current.len
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn snap(len: u64, secs: u64) -> MetaSnap {
        MetaSnap {
            len,
            modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)),
        }
    }

    #[test]
    fn test_first_observation_is_a_change() {
        assert!(has_changed(&None, &snap(0, 1)));
    }

    #[test]
    fn test_same_snapshot_is_not_a_change() {
        assert!(!has_changed(&Some(snap(10, 5)), &snap(10, 5)));
    }

    #[test]
    fn test_newer_mtime_is_a_change() {
        assert!(has_changed(&Some(snap(10, 5)), &snap(10, 6)));
    }

    #[test]
    fn test_older_mtime_same_size_is_not_a_change() {
        assert!(!has_changed(&Some(snap(10, 5)), &snap(10, 4)));
    }

    #[test]
    fn test_size_change_with_equal_mtime_is_a_change() {
        assert!(has_changed(&Some(snap(10, 5)), &snap(14, 5)));
    }

    #[test]
    fn test_stat_missing_file_fails() {
        assert!(stat_path(Path::new("/definitely/not/here.log")).is_err());
    }
}
