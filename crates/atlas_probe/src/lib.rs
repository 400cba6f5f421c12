//! Schema prober for Atlas Ingest.
//!
//! Given a file, produces ordered column names, a per-column inferred
//! primitive type, and a small row sample for display and matching. Probing
//! never mutates or moves the source file, and the sample size is capped so
//! memory stays bounded regardless of file size.
//!
//! Handles three source shapes:
//! - delimited text (comma/semicolon/tab/pipe, sniffed from the first line)
//! - fixed-width text with no delimiter (field boundaries detected from
//!   stable column-start positions across the sample)
//! - data files paired with a separate header file by naming convention

mod fixed_width;
mod infer;
mod pairing;

pub use fixed_width::FixedWidthLayout;
pub use infer::TypeInferencer;
pub use pairing::find_header_companion;

use atlas_types::{ColumnSpec, ColumnType};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Probe errors.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Probe failure: {0}")]
    Unreadable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, ProbeError>;

/// How the file's rows are physically laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FileFormat {
    Delimited { delimiter: u8 },
    FixedWidth { layout: FixedWidthLayout },
}

/// Probing knobs. Defaults bound the sample to 100 rows.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Maximum data rows read into the sample.
    pub max_sample_rows: usize,
    /// SRID declared for geometry columns detected during probing. The
    /// catalog is authoritative at load time; this only seeds suggestions.
    pub default_srid: u32,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            max_sample_rows: 100,
            default_srid: 4326,
        }
    }
}

/// The prober's output: a declarative value object, never a table handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbedSchema {
    pub columns: Vec<ColumnSpec>,
    pub sample: Vec<Vec<String>>,
    pub format: FileFormat,
    /// True when column names came from the file itself (or a paired header
    /// file) rather than being synthesized as `column_1..n`.
    pub named_columns: bool,
}

impl ProbedSchema {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Probe a file with default options.
pub fn probe(path: &Path) -> Result<ProbedSchema> {
    probe_with_options(path, &ProbeOptions::default())
}

/// Probe a file.
pub fn probe_with_options(path: &Path, options: &ProbeOptions) -> Result<ProbedSchema> {
    let header_companion = find_header_companion(path);

    let first_line = read_first_line(path)?;
    if first_line.trim().is_empty() {
        return Err(ProbeError::Unreadable(format!(
            "{}: empty or header-only file",
            path.display()
        )));
    }

    match sniff_delimiter(&first_line) {
        Some(delimiter) => probe_delimited(path, delimiter, header_companion.as_deref(), options),
        // No delimiter at all: aligned positions make it fixed-width,
        // anything else is a one-column table.
        None => match probe_fixed_width(path, options) {
            Err(ProbeError::Unreadable(_)) => {
                probe_delimited(path, b',', header_companion.as_deref(), options)
            }
            other => other,
        },
    }
}

fn probe_delimited(
    path: &Path,
    delimiter: u8,
    header_file: Option<&Path>,
    options: &ProbeOptions,
) -> Result<ProbedSchema> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
        // +1 leaves room for a potential in-file header row
        if rows.len() > options.max_sample_rows {
            break;
        }
    }
    if rows.is_empty() {
        return Err(ProbeError::Unreadable(format!(
            "{}: no rows",
            path.display()
        )));
    }

    let (names, data_rows, named) = match header_file {
        Some(header_path) => {
            let names = read_header_file(header_path, delimiter)?;
            debug!(header = %header_path.display(), "Paired header file");
            (names, rows, true)
        }
        None if looks_like_header(&rows[0]) => {
            let names = rows[0].iter().map(|s| normalize_name(s)).collect();
            (names, rows[1..].to_vec(), true)
        }
        None => {
            let names = (1..=rows[0].len()).map(|i| format!("column_{}", i)).collect();
            (names, rows, false)
        }
    };

    let mut data_rows = data_rows;
    data_rows.truncate(options.max_sample_rows);

    let columns = infer_columns(&names, &data_rows, options);

    Ok(ProbedSchema {
        columns,
        sample: data_rows,
        format: FileFormat::Delimited { delimiter },
        named_columns: named,
    })
}

fn probe_fixed_width(path: &Path, options: &ProbeOptions) -> Result<ProbedSchema> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        lines.push(line);
        if lines.len() >= options.max_sample_rows {
            break;
        }
    }
    if lines.is_empty() {
        return Err(ProbeError::Unreadable(format!(
            "{}: no rows",
            path.display()
        )));
    }

    let layout = FixedWidthLayout::detect(&lines).ok_or_else(|| {
        ProbeError::Unreadable(format!(
            "{}: could not detect fixed-width field boundaries",
            path.display()
        ))
    })?;

    let data_rows: Vec<Vec<String>> = lines.iter().map(|l| layout.split(l)).collect();
    let names: Vec<String> = (1..=layout.field_count())
        .map(|i| format!("field_{}", i))
        .collect();

    let columns = infer_columns(&names, &data_rows, options);

    Ok(ProbedSchema {
        columns,
        sample: data_rows,
        format: FileFormat::FixedWidth { layout },
        named_columns: false,
    })
}

fn infer_columns(names: &[String], rows: &[Vec<String>], options: &ProbeOptions) -> Vec<ColumnSpec> {
    names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let mut inferencer = TypeInferencer::new(options.default_srid);
            for row in rows {
                if let Some(value) = row.get(idx) {
                    inferencer.add_value(value);
                }
            }
            ColumnSpec::new(name.clone(), inferencer.resolve())
        })
        .collect()
}

/// Pick the delimiter with the highest count in the first line.
///
/// Returns None when no candidate appears at all, which sends the file to
/// fixed-width detection and, failing that, one-column treatment.
fn sniff_delimiter(line: &str) -> Option<u8> {
    const CANDIDATES: [u8; 4] = [b',', b'\t', b';', b'|'];
    CANDIDATES
        .iter()
        .map(|&d| (d, line.bytes().filter(|&b| b == d).count()))
        .filter(|&(_, count)| count > 0)
        .max_by_key(|&(_, count)| count)
        .map(|(d, _)| d)
}

/// A row is a header when none of its cells parse as a number and no cell
/// is empty. Coordinate files always carry numeric cells in data rows.
fn looks_like_header(row: &[String]) -> bool {
    !row.is_empty()
        && row.iter().all(|cell| {
            let trimmed = cell.trim();
            !trimmed.is_empty() && trimmed.parse::<f64>().is_err()
        })
}

fn read_first_line(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file).take(64 * 1024);
    let mut buf = String::new();
    let mut byte_buf = Vec::new();
    std::io::BufRead::read_until(&mut reader, b'\n', &mut byte_buf)?;
    buf.push_str(&String::from_utf8_lossy(&byte_buf));
    Ok(buf)
}

fn read_header_file(path: &Path, delimiter: u8) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_path(path)?;
    let record = reader
        .records()
        .next()
        .transpose()?
        .ok_or_else(|| ProbeError::Unreadable(format!("{}: empty header file", path.display())))?;
    Ok(record.iter().map(normalize_name).collect())
}

fn normalize_name(raw: &str) -> String {
    raw.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn probes_headed_csv() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            &tmp,
            "onspd_2024.csv",
            "pcd,pcd2,pcds,x_coord,y_coord\nAB1 2CD,AB12CD,AB1 2CD,385386.0,801193.0\nEF3 4GH,EF34GH,EF3 4GH,394251.5,806376.0\n",
        );

        let schema = probe(&path).unwrap();
        assert!(schema.named_columns);
        assert_eq!(
            schema.column_names(),
            vec!["pcd", "pcd2", "pcds", "x_coord", "y_coord"]
        );
        assert_eq!(schema.columns[0].column_type, ColumnType::Text);
        assert_eq!(schema.columns[3].column_type, ColumnType::Decimal);
        assert_eq!(schema.sample.len(), 2);
    }

    #[test]
    fn probes_headerless_csv_with_synthesized_names() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "data.csv", "AB1 2CD,385386.0\nEF3 4GH,394251.5\n");

        let schema = probe(&path).unwrap();
        assert!(!schema.named_columns);
        assert_eq!(schema.column_names(), vec!["column_1", "column_2"]);
        assert_eq!(schema.sample.len(), 2);
    }

    #[test]
    fn pairs_sibling_header_file() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp, "prices.hdr", "postcode,price\n");
        let path = write_file(&tmp, "prices.csv", "AB1 2CD,125000\nEF3 4GH,98000\n");

        let schema = probe(&path).unwrap();
        assert!(schema.named_columns);
        assert_eq!(schema.column_names(), vec!["postcode", "price"]);
        // With a paired header, every in-file row is data
        assert_eq!(schema.sample.len(), 2);
        assert_eq!(schema.columns[1].column_type, ColumnType::Integer);
    }

    #[test]
    fn sample_is_capped() {
        let tmp = TempDir::new().unwrap();
        let mut content = String::from("id,name\n");
        for i in 0..500 {
            content.push_str(&format!("{},row{}\n", i, i));
        }
        let path = write_file(&tmp, "big.csv", &content);

        let options = ProbeOptions {
            max_sample_rows: 25,
            ..Default::default()
        };
        let schema = probe_with_options(&path, &options).unwrap();
        assert_eq!(schema.sample.len(), 25);
    }

    #[test]
    fn probe_does_not_move_source() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "keep.csv", "a,b\n1,2\n");
        probe(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn empty_file_is_probe_failure() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "empty.csv", "");
        assert!(matches!(probe(&path), Err(ProbeError::Unreadable(_))));
    }

    #[test]
    fn fixed_width_file_detected() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            &tmp,
            "streets.dat",
            "AB12CD   385386   801193\nEF34GH   394251   806376\nIJ56KL   401823   81244\n",
        );

        let schema = probe(&path).unwrap();
        match schema.format {
            FileFormat::FixedWidth { ref layout } => assert_eq!(layout.field_count(), 3),
            _ => panic!("expected fixed-width format"),
        }
        assert_eq!(schema.columns[1].column_type, ColumnType::Integer);
        assert_eq!(schema.sample[0][0], "AB12CD");
    }

    #[test]
    fn single_column_file_probes_as_one_column_table() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "postcodes.csv", "pcd\nAB00000\nAB00001\nAB00002\n");

        let schema = probe(&path).unwrap();
        assert!(schema.named_columns);
        assert_eq!(schema.column_names(), vec!["pcd"]);
        assert_eq!(schema.columns[0].column_type, ColumnType::Text);
        assert_eq!(schema.sample.len(), 3);
        assert!(matches!(schema.format, FileFormat::Delimited { .. }));
    }

    #[test]
    fn headerless_single_column_gets_a_synthesized_name() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "counts.txt", "125000\n98000\n");

        let schema = probe(&path).unwrap();
        assert!(!schema.named_columns);
        assert_eq!(schema.column_names(), vec!["column_1"]);
        assert_eq!(schema.columns[0].column_type, ColumnType::Integer);
    }

    #[test]
    fn delimiter_sniffing_prefers_majority() {
        assert_eq!(sniff_delimiter("a,b,c"), Some(b','));
        assert_eq!(sniff_delimiter("a\tb\tc"), Some(b'\t'));
        assert_eq!(sniff_delimiter("a|b|c,d"), Some(b'|'));
        assert_eq!(sniff_delimiter("abc def"), None);
    }
}
