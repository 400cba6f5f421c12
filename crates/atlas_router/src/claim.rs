//! Atomic file claims.
//!
//! A claim moves a file out of the inbox with a single `rename`, which is
//! atomic on the same filesystem. Two workers racing for one file resolve
//! cleanly: exactly one rename succeeds, the loser sees the source missing
//! and reports a claim conflict. The claim name carries the attempt count
//! and the original filename so crash recovery can resume from it.

use crate::{Result, RouterError};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A successfully claimed file.
#[derive(Debug, Clone)]
pub struct Claim {
    /// Location inside the processing directory.
    pub path: PathBuf,
    /// The filename as it arrived in the inbox.
    pub original_name: String,
    /// How many times this file has been picked up, starting at 1.
    pub attempt: u32,
}

/// Claim an inbox file by renaming it into the processing directory.
pub fn claim_file(inbox_path: &Path, processing_dir: &Path, attempt: u32) -> Result<Claim> {
    let original_name = inbox_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RouterError::Config(format!("unusable path {}", inbox_path.display())))?
        .to_string();

    let claim_name = format!(
        "{:02}__{}__{}",
        attempt,
        Uuid::new_v4().simple(),
        original_name
    );
    let dest = processing_dir.join(&claim_name);

    match std::fs::rename(inbox_path, &dest) {
        Ok(()) => Ok(Claim {
            path: dest,
            original_name,
            attempt,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RouterError::ConcurrentClaimConflict(original_name))
        }
        Err(e) => Err(e.into()),
    }
}

/// Parse a claim filename back into `(attempt, original_name)`.
pub fn parse_claim_name(name: &str) -> Option<(u32, &str)> {
    let mut parts = name.splitn(3, "__");
    let attempt: u32 = parts.next()?.parse().ok()?;
    let _token = parts.next()?;
    let original = parts.next()?;
    if original.is_empty() {
        return None;
    }
    Some((attempt, original))
}

/// Interpret a file already sitting in the processing directory as an
/// abandoned claim. Files with unrecognizable names are treated as first
/// attempts under their own name.
pub fn abandoned_claim(path: &Path) -> Option<Claim> {
    let name = path.file_name()?.to_str()?;
    match parse_claim_name(name) {
        Some((attempt, original)) => Some(Claim {
            path: path.to_path_buf(),
            original_name: original.to_string(),
            attempt,
        }),
        None => Some(Claim {
            path: path.to_path_buf(),
            original_name: name.to_string(),
            attempt: 1,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn claim_moves_the_file_once() {
        let tmp = TempDir::new().unwrap();
        let inbox = tmp.path().join("inbox");
        let processing = tmp.path().join("processing");
        std::fs::create_dir_all(&inbox).unwrap();
        std::fs::create_dir_all(&processing).unwrap();

        let source = inbox.join("onspd_2024.csv");
        File::create(&source).unwrap();

        let claim = claim_file(&source, &processing, 1).unwrap();
        assert!(claim.path.exists());
        assert!(!source.exists());
        assert_eq!(claim.original_name, "onspd_2024.csv");

        // The loser of the race sees a conflict, not an error
        let second = claim_file(&source, &processing, 1);
        assert!(matches!(
            second,
            Err(RouterError::ConcurrentClaimConflict(_))
        ));
    }

    #[test]
    fn claim_names_round_trip() {
        let tmp = TempDir::new().unwrap();
        let inbox = tmp.path().join("inbox");
        let processing = tmp.path().join("processing");
        std::fs::create_dir_all(&inbox).unwrap();
        std::fs::create_dir_all(&processing).unwrap();

        // Original names containing the separator survive
        let source = inbox.join("weird__name.csv");
        File::create(&source).unwrap();
        let claim = claim_file(&source, &processing, 2).unwrap();

        let recovered = abandoned_claim(&claim.path).unwrap();
        assert_eq!(recovered.attempt, 2);
        assert_eq!(recovered.original_name, "weird__name.csv");
    }

    #[test]
    fn foreign_processing_files_count_as_first_attempt() {
        let tmp = TempDir::new().unwrap();
        let stray = tmp.path().join("stray.csv");
        File::create(&stray).unwrap();
        let claim = abandoned_claim(&stray).unwrap();
        assert_eq!(claim.attempt, 1);
        assert_eq!(claim.original_name, "stray.csv");
    }
}
