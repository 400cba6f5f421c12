//! One-shot file inspection.

use crate::cli::output;
use anyhow::Result;
use atlas_probe::{FileFormat, ProbeOptions};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// File to probe
    pub file: PathBuf,

    /// SRID assigned to detected geometry columns
    #[arg(long, default_value_t = 4326)]
    pub srid: u32,

    /// Sample rows to display
    #[arg(short = 'n', long, default_value_t = 10)]
    pub rows: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ProbeArgs) -> Result<()> {
    let options = ProbeOptions {
        default_srid: args.srid,
        ..Default::default()
    };
    let schema = atlas_probe::probe_with_options(&args.file, &options)?;

    if args.json {
        return output::print_json(&schema);
    }

    match &schema.format {
        FileFormat::Delimited { delimiter } => {
            println!("Format: delimited ({})", delimiter_label(*delimiter))
        }
        FileFormat::FixedWidth { layout } => {
            println!("Format: fixed-width ({} fields)", layout.field_count())
        }
    }
    if !schema.named_columns {
        println!("Column names are synthesized (no header found)");
    }

    println!();
    let columns = vec!["column".to_string(), "type".to_string()];
    let rows: Vec<Vec<String>> = schema
        .columns
        .iter()
        .map(|c| vec![c.name.clone(), output::type_label(&c.column_type)])
        .collect();
    print!("{}", output::render_table(&columns, &rows));

    if !schema.sample.is_empty() && args.rows > 0 {
        println!();
        println!("Sample ({} of {} rows read):", args.rows.min(schema.sample.len()), schema.sample.len());
        let names: Vec<String> = schema.columns.iter().map(|c| c.name.clone()).collect();
        let sample: Vec<Vec<String>> = schema.sample.iter().take(args.rows).cloned().collect();
        print!("{}", output::render_table(&names, &sample));
    }

    Ok(())
}

fn delimiter_label(delimiter: u8) -> &'static str {
    match delimiter {
        b',' => "comma",
        b'\t' => "tab",
        b';' => "semicolon",
        b'|' => "pipe",
        _ => "other",
    }
}
