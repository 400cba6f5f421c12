//! Scoring primitives for the weighted matcher.

use atlas_probe::FileFormat;
use atlas_types::{ColumnSpec, ColumnType};

/// Normalize a column name for comparison.
pub fn normalize_name(raw: &str) -> String {
    atlas_types::normalize_column_name(raw)
}

/// Jaccard similarity over normalized name sets, with a small bonus pulling
/// exact full-set matches to 1.0 even when normalization collapsed names.
pub fn header_similarity(probed: &[&str], fingerprint: &[&str]) -> f64 {
    let left: std::collections::BTreeSet<String> =
        probed.iter().map(|n| normalize_name(n)).collect();
    let right: std::collections::BTreeSet<String> =
        fingerprint.iter().map(|n| normalize_name(n)).collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    if left == right {
        return 1.0;
    }
    let intersection = left.intersection(&right).count() as f64;
    let union = left.union(&right).count() as f64;
    intersection / union
}

/// Filename score against a config's recorded pattern.
///
/// A glob match is a full point. Without a match, fall back to token
/// overlap between the filename stem and the pattern's literal tokens so
/// `onspd_2024_extract.csv` still earns partial credit against `onspd_*.csv`.
/// A config with no recorded pattern scores a neutral half point.
pub fn filename_score(file_name: &str, pattern: Option<&str>) -> f64 {
    let Some(pattern) = pattern else {
        return 0.5;
    };
    if let Ok(compiled) = glob::Pattern::new(pattern) {
        if compiled.matches(file_name) {
            return 1.0;
        }
    }
    let file_tokens = literal_tokens(file_name);
    let pattern_tokens = literal_tokens(pattern);
    if pattern_tokens.is_empty() {
        return 0.0;
    }
    let hits = pattern_tokens
        .iter()
        .filter(|t| file_tokens.contains(*t))
        .count();
    0.5 * hits as f64 / pattern_tokens.len() as f64
}

/// Declared file-type score: binary match between the incoming file's
/// extension and the extension the pattern declares, neutral when the
/// pattern declares none.
pub fn filetype_score(file_name: &str, pattern: Option<&str>, format: &FileFormat) -> f64 {
    let Some(pattern) = pattern else {
        return 0.5;
    };
    let Some(expected_ext) = extension_of(pattern) else {
        return 0.5;
    };
    match extension_of(file_name) {
        Some(actual) if actual == expected_ext => 1.0,
        Some(_) => 0.0,
        // Extension-less fixed-width drops are common enough to stay neutral
        None => match format {
            FileFormat::FixedWidth { .. } => 0.5,
            FileFormat::Delimited { .. } => 0.0,
        },
    }
}

/// Content compatibility: the fraction of shared columns whose probed type
/// can be coerced to the recorded target type.
pub fn content_score(probed: &[ColumnSpec], targets: &[(String, ColumnType)]) -> f64 {
    let mut shared = 0usize;
    let mut compatible = 0usize;
    for (name, target_type) in targets {
        let normalized = normalize_name(name);
        if let Some(col) = probed.iter().find(|c| normalize_name(&c.name) == normalized) {
            shared += 1;
            if col.column_type.coercible_to(target_type) {
                compatible += 1;
            }
        }
    }
    if shared == 0 {
        return 0.0;
    }
    compatible as f64 / shared as f64
}

fn extension_of(name: &str) -> Option<String> {
    let trimmed = name.rsplit('/').next().unwrap_or(name);
    let (_, ext) = trimmed.rsplit_once('.')?;
    if ext.is_empty() || ext.contains('*') || ext.contains('?') {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn literal_tokens(raw: &str) -> Vec<String> {
    let stem = raw.rsplit('/').next().unwrap_or(raw);
    let stem = stem.rsplit_once('.').map(|(s, _)| s).unwrap_or(stem);
    stem.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1 && !t.contains('*') && !t.contains('?'))
        .map(|t| t.to_ascii_lowercase())
        .collect()
}
