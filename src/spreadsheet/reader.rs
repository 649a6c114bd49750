use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

use super::CellValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
    Xls,
    Ods,
}

impl FileFormat {
    /// Detect the format from the upload's file name, falling back to its
    /// declared content type. `None` means the upload is not a spreadsheet.
    pub fn detect(filename: Option<&str>, content_type: Option<&str>) -> Option<Self> {
        let by_extension = filename
            .and_then(|name| name.rsplit_once('.'))
            .and_then(|(_, ext)| match ext.to_lowercase().as_str() {
                "csv" => Some(FileFormat::Csv),
                "xlsx" | "xlsm" => Some(FileFormat::Xlsx),
                "xls" => Some(FileFormat::Xls),
                "ods" => Some(FileFormat::Ods),
                _ => None,
            });
        if by_extension.is_some() {
            return by_extension;
        }

        let mime = content_type?.split(';').next()?.trim().to_lowercase();
        match mime.as_str() {
            "text/csv" | "application/csv" => Some(FileFormat::Csv),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(FileFormat::Xlsx)
            }
            "application/vnd.ms-excel" => Some(FileFormat::Xls),
            "application/vnd.oasis.opendocument.spreadsheet" => Some(FileFormat::Ods),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Could not read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Could not read workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("Workbook has no worksheet")]
    NoWorksheet,
    #[error("File has no header row")]
    Empty,
}

/// First worksheet of an upload: the header row and every row below it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawSheet {
    /// Number of rows that carry at least one non-blank cell.
    pub fn data_row_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.iter().any(|cell| !cell.is_blank()))
            .count()
    }
}

pub fn read_sheet(bytes: &[u8], format: FileFormat) -> Result<RawSheet, ReadError> {
    let grid = match format {
        FileFormat::Csv => read_csv(bytes)?,
        FileFormat::Xlsx | FileFormat::Xls | FileFormat::Ods => read_workbook(bytes)?,
    };

    let mut rows = grid.into_iter();
    let headers = rows
        .next()
        .ok_or(ReadError::Empty)?
        .iter()
        .map(CellValue::to_text)
        .collect::<Vec<_>>();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(ReadError::Empty);
    }

    Ok(RawSheet {
        headers,
        rows: rows.collect(),
    })
}

fn read_csv(bytes: &[u8]) -> Result<Vec<Vec<CellValue>>, ReadError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    // The csv reader drops empty lines; after the header they are put back
    // as blank rows so row numbers match the file, as in workbooks.
    let mut grid = Vec::new();
    let mut record = csv::StringRecord::new();
    loop {
        let start = reader.position().byte() as usize;
        if !reader.read_record(&mut record)? {
            break;
        }
        let end = reader.position().byte() as usize;
        if !grid.is_empty() {
            grid.extend((0..skipped_lines(bytes, start, end)).map(|_| Vec::new()));
        }
        grid.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(grid)
}

/// Empty lines passed over at the start of `bytes[start..end]`. A `\n`
/// completing a `\r\n` pair is not a line of its own.
fn skipped_lines(bytes: &[u8], start: usize, end: usize) -> usize {
    let Some(chunk) = bytes.get(start..end) else {
        return 0;
    };
    let mut previous = start.checked_sub(1).and_then(|i| bytes.get(i)).copied();
    let mut lines = 0;
    for &byte in chunk {
        match byte {
            b'\r' => lines += 1,
            b'\n' if previous != Some(b'\r') => lines += 1,
            b'\n' => {}
            _ => break,
        }
        previous = Some(byte);
    }
    lines
}

fn read_workbook(bytes: &[u8]) -> Result<Vec<Vec<CellValue>>, ReadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ReadError::NoWorksheet)??;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect())
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        other => CellValue::Text(other.to_string()),
    }
}
