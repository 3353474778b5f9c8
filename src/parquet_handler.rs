// src/parquet_handler.rs
use std::fs::File;
use std::path::Path;

use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use tracing::debug;

use crate::data_types::Dataset;
use crate::error::Result;

/// Reads a Parquet file row by row. Column names come from the top-level
/// schema fields; every value is rendered as text and nulls become "".
pub fn read_parquet(path: &Path) -> Result<Dataset> {
    let reader = SerializedFileReader::new(File::open(path)?)?;
    let metadata = reader.metadata().file_metadata();
    let columns: Vec<String> = metadata
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect();

    let mut rows = Vec::new();
    for row in reader.get_row_iter(None)? {
        let row = row?;
        rows.push(row.get_column_iter().map(|(_, field)| field_to_string(field)).collect());
    }

    debug!(path = %path.display(), rows = rows.len(), columns = columns.len(), "read parquet file");
    Ok(Dataset::new(columns, rows))
}

fn field_to_string(field: &Field) -> String {
    match field {
        Field::Null => String::new(),
        // Display quotes strings
        Field::Str(value) => value.clone(),
        other => other.to_string(),
    }
}
