// src/excel_handler.rs
use std::path::Path;

use calamine::{open_workbook_auto, DataType, Range, Reader};
use tracing::debug;

use crate::data_types::Dataset;
use crate::error::Result;

/// Reads the first worksheet of an xlsx/xlsm/xls/ods workbook. The first row
/// is the header.
pub fn read_workbook(path: &Path) -> Result<Dataset> {
    let mut workbook = open_workbook_auto(path)?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Ok(Dataset::empty()),
    };

    debug!(path = %path.display(), size = ?range.get_size(), "read first worksheet");
    Ok(range_to_dataset(&range))
}

fn range_to_dataset(range: &Range<DataType>) -> Dataset {
    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(first) => first.iter().map(|cell| cell_to_string(Some(cell))).collect(),
        None => return Dataset::empty(),
    };

    let body = rows
        .map(|row| row.iter().map(|cell| cell_to_string(Some(cell))).collect())
        .collect();
    Dataset::new(headers, body)
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
