use crate::error::{BankForgeError, BfResult};
use crate::template::{Point, TemplateRecord};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// Reads template rows from CSV with a header.
///
/// Only `mass1` and `mass2` are required; `spin1z`, `spin2z`, `is_seed`,
/// `sequence` and `accept_match` default when absent.
pub fn read_records<R: Read>(reader: R) -> BfResult<Vec<TemplateRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (row, result) in rdr.deserialize::<TemplateRecord>().enumerate() {
        let record = result?;
        if !record.point().is_finite() {
            return Err(BankForgeError::Validation(format!(
                "row {}: non-finite parameter value",
                row + 1
            )));
        }
        records.push(record);
    }
    Ok(records)
}

pub fn load_records<P: AsRef<Path>>(path: P) -> BfResult<Vec<TemplateRecord>> {
    let path = path.as_ref();
    let records = read_records(File::open(path)?)?;
    info!("📂 Loaded {} rows from {}", records.len(), path.display());
    Ok(records)
}

/// Loads a point list (seed bank or replay stream) from CSV.
pub fn load_points<P: AsRef<Path>>(path: P) -> BfResult<Vec<Point>> {
    Ok(load_records(path)?.iter().map(|r| r.point()).collect())
}

pub fn write_records<W: Write>(writer: W, records: &[TemplateRecord]) -> BfResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in records {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}
