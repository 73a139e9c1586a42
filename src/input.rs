use std::io::Read;
use std::path::Path;

use tracing::{info, warn};

use crate::error::InputError;
use crate::record::InputDescriptor;

/// Read every scrape target from the input CSV, in file order.
pub fn read_descriptors(path: &Path) -> Result<Vec<InputDescriptor>, InputError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| InputError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    let descriptors = parse_descriptors(reader, path)?;
    info!("Loaded {} scrape targets from {}", descriptors.len(), path.display());
    Ok(descriptors)
}

fn parse_descriptors<R: Read>(
    mut reader: csv::Reader<R>,
    path: &Path,
) -> Result<Vec<InputDescriptor>, InputError> {
    let mut out = Vec::new();
    for (i, row) in reader.deserialize::<InputDescriptor>().enumerate() {
        // +2: 1-based and the header line
        let row_no = i as u64 + 2;
        let descriptor = row.map_err(|source| InputError::Row {
            path: path.to_path_buf(),
            row: row_no,
            source,
        })?;
        if descriptor.url.is_empty() {
            warn!(row = row_no, "Skipping input row with empty url");
            continue;
        }
        out.push(descriptor);
    }
    Ok(out)
}
