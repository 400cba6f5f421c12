//! Sibling header-file lookup.
//!
//! Some suppliers ship column names in a separate file next to the data.
//! Three conventions are recognized, checked in order:
//! - `<stem>.hdr` next to `<stem>.<ext>`
//! - `<stem>_headers.<ext>` next to `<stem>.<ext>`
//! - `<prefix>Headers.<ext>` next to `<prefix>Records.<ext>`

use std::path::{Path, PathBuf};

/// Find a header companion for a data file, if one exists on disk.
pub fn find_header_companion(path: &Path) -> Option<PathBuf> {
    let dir = path.parent()?;
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("csv");

    let mut candidates = vec![
        dir.join(format!("{}.hdr", stem)),
        dir.join(format!("{}_headers.{}", stem, ext)),
    ];
    if let Some(prefix) = stem.strip_suffix("Records") {
        candidates.push(dir.join(format!("{}Headers.{}", prefix, ext)));
    }

    candidates
        .into_iter()
        .find(|candidate| candidate != path && candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        File::create(&path).unwrap();
        path
    }

    #[test]
    fn finds_hdr_sibling() {
        let tmp = TempDir::new().unwrap();
        let data = touch(&tmp, "prices.csv");
        let header = touch(&tmp, "prices.hdr");
        assert_eq!(find_header_companion(&data), Some(header));
    }

    #[test]
    fn finds_headers_suffix_sibling() {
        let tmp = TempDir::new().unwrap();
        let data = touch(&tmp, "streets.csv");
        let header = touch(&tmp, "streets_headers.csv");
        assert_eq!(find_header_companion(&data), Some(header));
    }

    #[test]
    fn finds_records_headers_pair() {
        let tmp = TempDir::new().unwrap();
        let data = touch(&tmp, "UprnRecords.csv");
        let header = touch(&tmp, "UprnHeaders.csv");
        assert_eq!(find_header_companion(&data), Some(header));
    }

    #[test]
    fn no_companion_means_none() {
        let tmp = TempDir::new().unwrap();
        let data = touch(&tmp, "lonely.csv");
        assert_eq!(find_header_companion(&data), None);
    }
}
