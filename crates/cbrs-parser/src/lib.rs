//! CBRS Parser - Rating table loaders
//!
//! Supports loading of:
//! - CSV / TSV files
//! - JSON arrays of row objects
//! - Microsoft Excel (XLSX, XLS)
//!
//! Source tables name their columns inconsistently (`from_id` vs `user`,
//! `to_id` vs `item`, `rating` vs `score`). Every reader resolves headers
//! through a `ColumnSchema` and produces a `RatingFrame` in the canonical
//! {user_id, item_id, rating} schema.

use std::path::Path;

use cbrs_core::{RatingFrame, RatingRecord, UserGroups};
use thiserror::Error;

pub mod delimited;
pub mod excel;
pub mod json;

pub use delimited::CsvFrameReader;
pub use excel::ExcelFrameReader;
pub use json::JsonFrameReader;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while loading a rating table
#[derive(Error, Debug)]
pub enum ParserError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Excel parsing error
    #[error("Excel parsing error: {0}")]
    ExcelError(String),

    /// None of the accepted header names is present
    #[error("Missing required column '{column}' (accepted names: {accepted})")]
    MissingColumn { column: String, accepted: String },

    /// A cell could not be converted to the expected type
    #[error("Invalid value '{value}' in column '{column}' at row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    /// File content does not have the expected shape
    #[error("Malformed input: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, ParserError>;

// ============================================================================
// File Types
// ============================================================================

/// Supported table formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Csv,
    Tsv,
    Json,
    Xlsx,
    Xls,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "csv" => Self::Csv,
            "tsv" | "tab" => Self::Tsv,
            "json" => Self::Json,
            "xlsx" => Self::Xlsx,
            "xls" => Self::Xls,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Tsv => write!(f, "tsv"),
            Self::Json => write!(f, "json"),
            Self::Xlsx => write!(f, "xlsx"),
            Self::Xls => write!(f, "xls"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// Column Schema
// ============================================================================

/// Accepted header names for each canonical column.
///
/// Matching is case-insensitive and ignores surrounding whitespace.
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub user_columns: Vec<String>,
    pub item_columns: Vec<String>,
    pub rating_columns: Vec<String>,
    pub original_rating_columns: Vec<String>,
    pub timestamp_columns: Vec<String>,
}

impl Default for ColumnSchema {
    fn default() -> Self {
        fn names(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        Self {
            user_columns: names(&["from_id", "user", "user_id"]),
            item_columns: names(&["to_id", "item", "item_id"]),
            rating_columns: names(&["rating", "score", "score_value"]),
            original_rating_columns: names(&["original_rating"]),
            timestamp_columns: names(&["timestamp"]),
        }
    }
}

impl ColumnSchema {
    /// Resolve column positions from a header row
    pub fn resolve<S: AsRef<str>>(&self, headers: &[S]) -> Result<ColumnIndex> {
        let required = |aliases: &[String], column: &str| -> Result<usize> {
            find_column(headers, aliases).ok_or_else(|| ParserError::MissingColumn {
                column: column.to_string(),
                accepted: aliases.join(", "),
            })
        };

        Ok(ColumnIndex {
            user: required(&self.user_columns, "user_id")?,
            item: required(&self.item_columns, "item_id")?,
            rating: required(&self.rating_columns, "rating")?,
            original_rating: find_column(headers, &self.original_rating_columns),
            timestamp: find_column(headers, &self.timestamp_columns),
        })
    }
}

fn find_column<S: AsRef<str>>(headers: &[S], aliases: &[String]) -> Option<usize> {
    aliases.iter().find_map(|alias| {
        headers
            .iter()
            .position(|h| h.as_ref().trim().eq_ignore_ascii_case(alias))
    })
}

/// Resolved column positions for one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndex {
    pub user: usize,
    pub item: usize,
    pub rating: usize,
    pub original_rating: Option<usize>,
    pub timestamp: Option<usize>,
}

impl ColumnIndex {
    /// Convert one row of cells into a record. `row` is 1-based, for messages.
    pub fn to_record<S: AsRef<str>>(&self, row: usize, cells: &[S]) -> Result<RatingRecord> {
        let cell = |idx: usize| cells.get(idx).map(|c| c.as_ref().trim()).unwrap_or("");
        let optional = |idx: Option<usize>| {
            idx.map(cell)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let raw_rating = cell(self.rating);
        let rating = raw_rating
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| ParserError::InvalidValue {
                row,
                column: "rating".to_string(),
                value: raw_rating.to_string(),
            })?;

        let user_id = cell(self.user);
        let item_id = cell(self.item);
        for (column, value) in [("user_id", user_id), ("item_id", item_id)] {
            if value.is_empty() {
                return Err(ParserError::InvalidValue {
                    row,
                    column: column.to_string(),
                    value: String::new(),
                });
            }
        }

        Ok(RatingRecord {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            rating,
            original_rating: optional(self.original_rating),
            timestamp: optional(self.timestamp),
        })
    }
}

// ============================================================================
// Reader Trait
// ============================================================================

/// Trait for rating table readers
pub trait FrameReader: Send + Sync {
    /// Load a table from a file path
    fn read(&self, path: &Path) -> Result<RatingFrame>;

    /// Get supported file types
    fn supported_types(&self) -> &[FileType];

    /// Check if this reader can handle a file type
    fn can_read(&self, file_type: FileType) -> bool {
        self.supported_types().contains(&file_type)
    }
}

// ============================================================================
// Reader Registry
// ============================================================================

/// Registry of available readers
pub struct ReaderRegistry {
    readers: Vec<Box<dyn FrameReader>>,
}

impl ReaderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            readers: Vec::new(),
        }
    }

    /// Registry with CSV, TSV, JSON and Excel readers sharing one schema
    pub fn with_defaults(schema: ColumnSchema) -> Self {
        let mut registry = Self::new();
        registry.register(CsvFrameReader::new().with_schema(schema.clone()));
        registry.register(
            CsvFrameReader::new()
                .with_delimiter(b'\t')
                .with_schema(schema.clone()),
        );
        registry.register(JsonFrameReader::new().with_schema(schema.clone()));
        registry.register(ExcelFrameReader::new().with_schema(schema));
        registry
    }

    /// Register a reader
    pub fn register<R: FrameReader + 'static>(&mut self, reader: R) {
        self.readers.push(Box::new(reader));
    }

    /// Find a reader for a file type
    pub fn find_reader(&self, file_type: FileType) -> Option<&dyn FrameReader> {
        self.readers
            .iter()
            .find(|r| r.can_read(file_type))
            .map(|r| r.as_ref())
    }

    /// Load a file using the appropriate reader
    pub fn read(&self, path: &Path) -> Result<RatingFrame> {
        let file_type = FileType::from_path(path);

        if file_type == FileType::Unknown {
            return Err(ParserError::UnsupportedFormat(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("none")
                    .to_string(),
            ));
        }

        let reader = self
            .find_reader(file_type)
            .ok_or_else(|| ParserError::UnsupportedFormat(file_type.to_string()))?;

        let frame = reader.read(path)?;
        tracing::debug!(
            "Loaded {} rows from {} ({})",
            frame.len(),
            path.display(),
            file_type
        );
        Ok(frame)
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::with_defaults(ColumnSchema::default())
    }
}

// ============================================================================
// User Groups
// ============================================================================

/// Load user groups from a JSON object mapping group names to user id arrays.
///
/// Groups keep the order in which they are listed in the file.
pub fn load_user_groups(path: &Path) -> Result<UserGroups> {
    let content = std::fs::read_to_string(path).map_err(|e| ParserError::IoError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_user_groups(&content)
}

/// Parse user groups from a JSON string
pub fn parse_user_groups(content: &str) -> Result<UserGroups> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let serde_json::Value::Object(map) = value else {
        return Err(ParserError::Malformed(
            "user groups must be a JSON object of arrays".to_string(),
        ));
    };

    let mut groups = UserGroups::new();
    for (name, members) in map {
        let users: Vec<String> = serde_json::from_value(members)?;
        groups.insert(name, users);
    }
    Ok(groups)
}

// ============================================================================
// Tests
// ============================================================================
