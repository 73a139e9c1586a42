use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::info;

use crate::error::SinkError;
use crate::normalize::{OutputRow, HEADER};

/// Append rows to the CSV at `path`.
///
/// A missing or empty file gets the header first. An existing file must already
/// carry exactly that header.
pub fn append(path: &Path, rows: &[OutputRow]) -> Result<usize, SinkError> {
    let io_err = |source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let fresh = match existing_header(path).map_err(io_err)? {
        None => true,
        Some(found) => {
            let expected = HEADER.join(",");
            if found != expected {
                return Err(SinkError::SchemaMismatch {
                    path: path.to_path_buf(),
                    found,
                    expected,
                });
            }
            false
        }
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    if !fresh && !ends_with_newline(path).map_err(io_err)? {
        file.write_all(b"\n").map_err(io_err)?;
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if fresh {
        writer.write_record(HEADER)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(io_err)?;

    info!(path = %path.display(), rows = rows.len(), header = fresh, "Appended rows");
    Ok(rows.len())
}

/// First line of the file, or `None` when it does not exist or is empty.
fn existing_header(path: &Path) -> std::io::Result<Option<String>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut first = String::new();
    if BufReader::new(file).read_line(&mut first)? == 0 {
        return Ok(None);
    }
    let first = first.trim_end_matches(['\r', '\n']).trim_start_matches('\u{feff}');
    Ok(Some(first.to_string()))
}

fn ends_with_newline(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    if file.seek(SeekFrom::End(0))? == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
