//! Streaming row sources over the two physical layouts.

use crate::{LoadError, Result};
use atlas_probe::{FileFormat, FixedWidthLayout};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// Streams rows from a source file without materializing it.
pub enum RowSource {
    Delimited(csv::Reader<File>),
    FixedWidth {
        lines: Lines<BufReader<File>>,
        layout: FixedWidthLayout,
    },
}

impl RowSource {
    /// Open a source for streaming, skipping `skip_rows` leading rows
    /// (the in-file header, when the probe found one).
    pub fn open(path: &Path, format: &FileFormat, skip_rows: usize) -> Result<Self> {
        let mut source = match format {
            FileFormat::Delimited { delimiter } => {
                let reader = csv::ReaderBuilder::new()
                    .delimiter(*delimiter)
                    .has_headers(false)
                    .flexible(true)
                    .from_path(path)
                    .map_err(LoadError::from)?;
                RowSource::Delimited(reader)
            }
            FileFormat::FixedWidth { layout } => {
                let file = File::open(path)?;
                RowSource::FixedWidth {
                    lines: BufReader::new(file).lines(),
                    layout: layout.clone(),
                }
            }
        };
        for _ in 0..skip_rows {
            source.next_row()?;
        }
        Ok(source)
    }

    /// Next data row, or None at end of file. Blank lines are skipped.
    pub fn next_row(&mut self) -> Result<Option<Vec<String>>> {
        match self {
            RowSource::Delimited(reader) => {
                let mut record = csv::StringRecord::new();
                loop {
                    if !reader.read_record(&mut record)? {
                        return Ok(None);
                    }
                    if record.iter().any(|cell| !cell.trim().is_empty()) {
                        return Ok(Some(record.iter().map(|s| s.to_string()).collect()));
                    }
                }
            }
            RowSource::FixedWidth { lines, layout } => {
                for line in lines.by_ref() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Ok(Some(layout.split(&line)));
                }
                Ok(None)
            }
        }
    }
}
