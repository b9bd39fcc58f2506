//! Excel table reader using calamine
//!
//! Reads the first worksheet (or a named one); the first row holds the headers.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use cbrs_core::RatingFrame;

use crate::{ColumnSchema, FileType, FrameReader, ParserError, Result};

/// Largest magnitude below which every integral f64 converts to i64 exactly (2^53)
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Excel table reader
pub struct ExcelFrameReader {
    /// Sheet to read (None = first sheet)
    pub sheet: Option<String>,
    /// Header aliases
    pub schema: ColumnSchema,
}

impl ExcelFrameReader {
    /// Create a new Excel reader with default settings
    pub fn new() -> Self {
        Self {
            sheet: None,
            schema: ColumnSchema::default(),
        }
    }

    /// Read a specific sheet
    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Set the header schema
    pub fn with_schema(mut self, schema: ColumnSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Convert a Data cell to string
    fn cell_to_string(cell: &Data) -> String {
        match cell {
            Data::Empty => String::new(),
            Data::String(s) => s.clone(),
            Data::Float(f) => {
                // Integral ids should not pick up a ".0" suffix
                if f.fract() == 0.0 && f.abs() <= MAX_EXACT_INTEGER {
                    format!("{}", *f as i64)
                } else {
                    format!("{f}")
                }
            }
            Data::Int(i) => format!("{i}"),
            Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Data::Error(e) => format!("#ERROR: {e:?}"),
            Data::DateTime(dt) => format!("{dt}"),
            Data::DateTimeIso(s) => s.clone(),
            Data::DurationIso(s) => s.clone(),
        }
    }
}

impl Default for ExcelFrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader for ExcelFrameReader {
    fn read(&self, path: &Path) -> Result<RatingFrame> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| ParserError::ExcelError(e.to_string()))?;

        let sheet_name = match &self.sheet {
            Some(name) => name.clone(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| ParserError::ExcelError("workbook has no sheets".to_string()))?,
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ParserError::ExcelError(e.to_string()))?;

        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            return Ok(RatingFrame::new());
        };
        let headers: Vec<String> = header_row.iter().map(Self::cell_to_string).collect();
        let index = self.schema.resolve(&headers)?;

        let mut frame = RatingFrame::new();
        for (i, row) in rows.enumerate() {
            let cells: Vec<String> = row.iter().map(Self::cell_to_string).collect();
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }
            frame.push(index.to_record(i + 1, &cells)?);
        }

        Ok(frame)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Xlsx, FileType::Xls]
    }
}
