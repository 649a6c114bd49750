//! Services Layer
//!
//! The import/export pipeline: validation and duplicate detection, the
//! importer, the exporter and the template generator. Handlers and jobs
//! both call into these.

pub mod export_service;
pub mod import_service;
pub mod template_service;
pub mod validation;

pub use export_service::{
    CatalogStatistics, ExportError, ExportFile, ExportFormat, ExportService, ExportTarget,
    LibraryReport, OwnedExport, ReportBook,
};
pub use import_service::{DuplicateRow, ImportError, ImportReport, ImportService, RejectedRow};
pub use template_service::template;
pub use validation::DuplicateDetector;
