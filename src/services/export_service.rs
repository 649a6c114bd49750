//! Export Service - reads the record store into styled spreadsheets
//!
//! Entity sheets use exactly the import schema's columns, so any export is
//! a valid import file for the same kind.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::{
    BookFilter, BookRepository, DomainError, EntityKind, LibraryFilter, LibraryRepository,
    UserFilter, UserRepository,
};
use crate::models::{Book, Library, User};
use crate::spreadsheet::{
    write_csv, write_workbook, CellValue, SheetData, WriteError, CSV_CONTENT_TYPE,
    XLSX_CONTENT_TYPE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTarget {
    Entity(EntityKind),
    CompleteReport,
}

impl ExportTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportTarget::Entity(kind) => kind.as_str(),
            ExportTarget::CompleteReport => "complete-report",
        }
    }
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "complete-report" | "complete_report" | "report" => Ok(ExportTarget::CompleteReport),
            other => other
                .parse::<EntityKind>()
                .map(ExportTarget::Entity)
                .map_err(|_| format!("Unknown export target: {}", other)),
        }
    }
}

/// What a user may export of their own records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnedExport {
    Books,
    Libraries,
    /// Profile, summary, books and libraries in one workbook
    All,
}

impl OwnedExport {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnedExport::Books => "my-books",
            OwnedExport::Libraries => "my-libraries",
            OwnedExport::All => "my-data",
        }
    }

    fn file_stem(&self) -> &'static str {
        match self {
            OwnedExport::Books => "my_books",
            OwnedExport::Libraries => "my_libraries",
            OwnedExport::All => "my_data",
        }
    }
}

impl FromStr for OwnedExport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "my-books" => Ok(OwnedExport::Books),
            "my-libraries" => Ok(OwnedExport::Libraries),
            "my-data" => Ok(OwnedExport::All),
            other => Err(format!("Unknown export: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => XLSX_CONTENT_TYPE,
            ExportFormat::Csv => CSV_CONTENT_TYPE,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "xlsx" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("Unsupported export format: {}", other)),
        }
    }
}

/// A generated file ready to be sent or stored.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("{0}")]
    UnsupportedFormat(String),
    #[error("Record store error: {0}")]
    Store(#[from] DomainError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error("Export task failed: {0}")]
    Task(String),
}

/// Catalog totals, shown on the report's Statistics sheet and returned by
/// statistics jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStatistics {
    pub total_books: u64,
    pub total_libraries: u64,
    pub total_users: u64,
    pub active_users: u64,
    pub verified_users: u64,
    pub book_library_links: u64,
}

impl CatalogStatistics {
    fn to_sheet(&self) -> SheetData {
        metric_sheet(
            "Statistics",
            &[
                ("Total Books", self.total_books),
                ("Total Libraries", self.total_libraries),
                ("Total Users", self.total_users),
                ("Active Users", self.active_users),
                ("Verified Users", self.verified_users),
                ("Book-Library Links", self.book_library_links),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportBook {
    pub id: i32,
    pub title: String,
    pub author: String,
}

/// Holdings of one library, produced by library report jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryReport {
    pub library_id: i32,
    pub library_name: String,
    pub address: String,
    pub created_at: String,
    pub total_books: usize,
    pub books: Vec<ReportBook>,
}

fn metric_sheet(name: &str, metrics: &[(&str, u64)]) -> SheetData {
    let mut sheet = SheetData::new(name, vec!["metric".into(), "value".into()]);
    for (metric, value) in metrics {
        sheet.rows.push(vec![
            CellValue::Text(metric.to_string()),
            CellValue::Number(*value as f64),
        ]);
    }
    sheet
}

fn profile_sheet(user: &User) -> SheetData {
    let mut sheet = SheetData::new(
        "My Profile",
        ["username", "email", "full_name", "is_active", "is_verified", "created_at"]
            .into_iter()
            .map(String::from)
            .collect(),
    );
    sheet.rows.push(vec![
        text(&user.username),
        text(&user.email),
        optional_text(&user.full_name),
        CellValue::Bool(user.is_active),
        CellValue::Bool(user.is_verified),
        text(&user.created_at),
    ]);
    sheet
}

/// Maps a stored record onto schema column names.
trait SheetRecord {
    fn cell(&self, column: &str) -> CellValue;
}

fn text(value: &str) -> CellValue {
    CellValue::Text(value.to_string())
}

fn optional_text(value: &Option<String>) -> CellValue {
    value.as_deref().map(text).unwrap_or(CellValue::Empty)
}

impl SheetRecord for Book {
    fn cell(&self, column: &str) -> CellValue {
        match column {
            "title" => text(&self.title),
            "author" => text(&self.author),
            "isbn" => text(&self.isbn),
            "published_year" => self
                .published_year
                .map(|y| CellValue::Number(y as f64))
                .unwrap_or(CellValue::Empty),
            "description" => optional_text(&self.description),
            _ => CellValue::Empty,
        }
    }
}

impl SheetRecord for Library {
    fn cell(&self, column: &str) -> CellValue {
        match column {
            "name" => text(&self.name),
            "address" => text(&self.address),
            "description" => optional_text(&self.description),
            _ => CellValue::Empty,
        }
    }
}

impl SheetRecord for User {
    fn cell(&self, column: &str) -> CellValue {
        match column {
            "email" => text(&self.email),
            "username" => text(&self.username),
            "full_name" => optional_text(&self.full_name),
            "role" => text(&self.role),
            "is_active" => CellValue::Bool(self.is_active),
            "is_verified" => CellValue::Bool(self.is_verified),
            _ => CellValue::Empty,
        }
    }
}

fn entity_sheet<R: SheetRecord>(kind: EntityKind, records: &[R]) -> SheetData {
    let schema = kind.schema();
    let mut sheet = SheetData::new(
        schema.sheet_name,
        schema.header().into_iter().map(String::from).collect(),
    );
    sheet.rows = records
        .iter()
        .map(|record| schema.columns.iter().map(|c| record.cell(c.name)).collect())
        .collect();
    sheet
}

#[derive(Clone)]
pub struct ExportService {
    books: Arc<dyn BookRepository>,
    libraries: Arc<dyn LibraryRepository>,
    users: Arc<dyn UserRepository>,
}

impl ExportService {
    pub fn new(
        books: Arc<dyn BookRepository>,
        libraries: Arc<dyn LibraryRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            books,
            libraries,
            users,
        }
    }

    pub async fn statistics(&self) -> Result<CatalogStatistics, DomainError> {
        Ok(CatalogStatistics {
            total_books: self.books.count().await?,
            total_libraries: self.libraries.count().await?,
            total_users: self.users.count().await?,
            active_users: self.users.count_active().await?,
            verified_users: self.users.count_verified().await?,
            book_library_links: self.books.count_links().await?,
        })
    }

    /// Every record of one kind as a sheet in schema column order.
    pub async fn entity_sheet(&self, kind: EntityKind) -> Result<SheetData, DomainError> {
        let sheet = match kind {
            EntityKind::Book => {
                let books = self.books.find_all(BookFilter::default()).await?;
                entity_sheet(kind, &books)
            }
            EntityKind::Library => {
                let libraries = self.libraries.find_all(LibraryFilter::default()).await?;
                entity_sheet(kind, &libraries)
            }
            EntityKind::User => {
                let users = self.users.find_all(UserFilter::default()).await?;
                entity_sheet(kind, &users)
            }
        };
        Ok(sheet)
    }

    pub async fn export(
        &self,
        target: ExportTarget,
        format: ExportFormat,
    ) -> Result<ExportFile, ExportError> {
        let sheets = match target {
            ExportTarget::Entity(kind) => vec![self.entity_sheet(kind).await?],
            ExportTarget::CompleteReport => {
                if format != ExportFormat::Xlsx {
                    return Err(ExportError::UnsupportedFormat(
                        "The complete report is only available as xlsx".to_string(),
                    ));
                }
                let mut sheets = vec![self.statistics().await?.to_sheet()];
                for kind in EntityKind::ALL {
                    sheets.push(self.entity_sheet(kind).await?);
                }
                sheets
            }
        };

        render(sheets, target.as_str(), format).await
    }

    /// Export the records a user owns. Book and library sheets keep the
    /// import columns, so the file can be imported again.
    pub async fn export_owned(
        &self,
        owner: &User,
        what: OwnedExport,
        format: ExportFormat,
    ) -> Result<ExportFile, ExportError> {
        let own_books = || BookFilter {
            owner_id: Some(owner.id),
            ..Default::default()
        };
        let own_libraries = || LibraryFilter {
            owner_id: Some(owner.id),
            ..Default::default()
        };

        let sheets = match what {
            OwnedExport::Books => {
                let books = self.books.find_all(own_books()).await?;
                vec![entity_sheet(EntityKind::Book, &books).renamed("My Books")]
            }
            OwnedExport::Libraries => {
                let libraries = self.libraries.find_all(own_libraries()).await?;
                vec![entity_sheet(EntityKind::Library, &libraries).renamed("My Libraries")]
            }
            OwnedExport::All => {
                if format != ExportFormat::Xlsx {
                    return Err(ExportError::UnsupportedFormat(
                        "my-data is only available as xlsx".to_string(),
                    ));
                }
                let books = self.books.find_all(own_books()).await?;
                let libraries = self.libraries.find_all(own_libraries()).await?;
                vec![
                    profile_sheet(owner),
                    metric_sheet(
                        "Summary",
                        &[
                            ("Total Books", books.len() as u64),
                            ("Total Libraries", libraries.len() as u64),
                        ],
                    ),
                    entity_sheet(EntityKind::Book, &books).renamed("My Books"),
                    entity_sheet(EntityKind::Library, &libraries).renamed("My Libraries"),
                ]
            }
        };

        render(sheets, what.file_stem(), format).await
    }

    pub async fn library_report(&self, library_id: i32) -> Result<LibraryReport, DomainError> {
        let library = self
            .libraries
            .find_by_id(library_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        let books: Vec<ReportBook> = self
            .libraries
            .books_in(library_id)
            .await?
            .into_iter()
            .map(|book| ReportBook {
                id: book.id,
                title: book.title,
                author: book.author,
            })
            .collect();

        Ok(LibraryReport {
            library_id,
            library_name: library.name,
            address: library.address,
            created_at: library.created_at,
            total_books: books.len(),
            books,
        })
    }
}

/// Write sheets off the async runtime and name the file
/// `<stem>_<YYYYmmdd_HHMMSS>.<ext>`. CSV carries the first sheet only.
async fn render(
    sheets: Vec<SheetData>,
    stem: &str,
    format: ExportFormat,
) -> Result<ExportFile, ExportError> {
    let rows: usize = sheets.iter().map(|s| s.rows.len()).sum();
    let bytes = tokio::task::spawn_blocking(move || match format {
        ExportFormat::Xlsx => write_workbook(&sheets),
        ExportFormat::Csv => write_csv(&sheets[0]),
    })
    .await
    .map_err(|e| ExportError::Task(e.to_string()))??;

    let filename = format!(
        "{}_{}.{}",
        stem,
        chrono::Utc::now().format("%Y%m%d_%H%M%S"),
        format.extension()
    );
    tracing::info!(export = stem, rows, "Export generated: {}", filename);

    Ok(ExportFile {
        bytes,
        filename,
        content_type: format.content_type(),
    })
}
