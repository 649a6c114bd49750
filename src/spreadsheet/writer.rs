use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, XlsxError};

use super::CellValue;

const HEADER_FILL: u32 = 0x4472C4;

/// One worksheet to be written: a header row and its data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetData {
    pub fn new(name: impl Into<String>, header: Vec<String>) -> Self {
        Self {
            name: name.into(),
            header,
            rows: Vec::new(),
        }
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Could not write workbook: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("Could not write CSV: {0}")]
    Csv(String),
}

impl From<csv::Error> for WriteError {
    fn from(e: csv::Error) -> Self {
        WriteError::Csv(e.to_string())
    }
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_border(FormatBorder::Thin)
}

/// Write every sheet into one XLSX workbook: styled, frozen header row and
/// autofit columns.
pub fn write_workbook(sheets: &[SheetData]) -> Result<Vec<u8>, WriteError> {
    let mut workbook = Workbook::new();
    let header_format = header_format();

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (col, title) in sheet.header.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, title, &header_format)?;
        }

        for (index, row) in sheet.rows.iter().enumerate() {
            let row_num = index as u32 + 1;
            for (col, cell) in row.iter().enumerate() {
                let col = col as u16;
                match cell {
                    CellValue::Empty => {}
                    CellValue::Text(s) => {
                        worksheet.write_string(row_num, col, s)?;
                    }
                    CellValue::Number(n) => {
                        worksheet.write_number(row_num, col, *n)?;
                    }
                    CellValue::Bool(b) => {
                        worksheet.write_boolean(row_num, col, *b)?;
                    }
                }
            }
        }

        worksheet.set_freeze_panes(1, 0)?;
        worksheet.autofit();
    }

    Ok(workbook.save_to_buffer()?)
}

/// Write a single sheet as UTF-8 CSV.
pub fn write_csv(sheet: &SheetData) -> Result<Vec<u8>, WriteError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&sheet.header)?;
    for row in &sheet.rows {
        writer.write_record(row.iter().map(CellValue::to_text))?;
    }
    writer
        .into_inner()
        .map_err(|e| WriteError::Csv(e.to_string()))
}
