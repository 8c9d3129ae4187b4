//! File helpers shared by the config and crontab loaders.

use std::fs::File;
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::DEFAULT_TIMESTAMP;

/// True when the path exists, is a regular file, and can be opened for reading.
pub fn file_exists_and_can_read(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    path.is_file() && File::open(path).is_ok()
}

/// Last-modified timestamp of a file in epoch milliseconds, or
/// [`DEFAULT_TIMESTAMP`] when the file is missing or unreadable.
pub fn mtime_millis(path: impl AsRef<Path>) -> i64 {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return DEFAULT_TIMESTAMP;
    }

    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|mtime| mtime.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(DEFAULT_TIMESTAMP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_not_readable() {
        assert!(!file_exists_and_can_read("/nonexistent/omicron-test-file"));
    }

    #[test]
    fn missing_file_mtime_is_default() {
        assert_eq!(mtime_millis("/nonexistent/omicron-test-file"), DEFAULT_TIMESTAMP);
        assert_eq!(mtime_millis(""), DEFAULT_TIMESTAMP);
    }

    #[test]
    fn real_file_is_readable_with_mtime() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "hello").unwrap();

        assert!(file_exists_and_can_read(tmp.path()));
        assert!(mtime_millis(tmp.path()) > DEFAULT_TIMESTAMP);
    }

    #[test]
    fn directory_is_not_a_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!file_exists_and_can_read(dir.path()));
    }
}
