//! Import templates generated from the column schema.

use crate::domain::EntityKind;
use crate::spreadsheet::{write_workbook, CellValue, SheetData, WriteError, XLSX_CONTENT_TYPE};

use super::export_service::ExportFile;

/// Blank import workbook for `kind`: the schema header row, optionally
/// followed by one example row.
pub fn template(kind: EntityKind, with_example: bool) -> Result<ExportFile, WriteError> {
    let schema = kind.schema();
    let mut sheet = SheetData::new(
        schema.sheet_name,
        schema.header().into_iter().map(String::from).collect(),
    );

    if with_example {
        sheet.rows.push(
            schema
                .columns
                .iter()
                .map(|column| CellValue::Text(column.example.to_string()))
                .collect(),
        );
    }

    Ok(ExportFile {
        bytes: write_workbook(&[sheet])?,
        filename: format!("{}_import_template.xlsx", kind.as_str()),
        content_type: XLSX_CONTENT_TYPE,
    })
}
