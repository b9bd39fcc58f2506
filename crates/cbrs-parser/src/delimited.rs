//! Delimited text reader (CSV, TSV) using the csv crate

use std::io::Read;
use std::path::Path;

use cbrs_core::RatingFrame;

use crate::{ColumnSchema, FileType, FrameReader, ParserError, Result};

/// CSV / TSV table reader
pub struct CsvFrameReader {
    /// Field delimiter
    pub delimiter: u8,
    /// Header aliases
    pub schema: ColumnSchema,
}

impl CsvFrameReader {
    /// Create a comma-separated reader with the default schema
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            schema: ColumnSchema::default(),
        }
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the header schema
    pub fn with_schema(mut self, schema: ColumnSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Read a table from any byte source
    pub fn read_from<R: Read>(&self, source: R) -> Result<RatingFrame> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let index = self.schema.resolve(&headers)?;

        let mut frame = RatingFrame::new();
        for (i, row) in reader.records().enumerate() {
            let row = row?;
            // skip blank lines
            if row.iter().all(str::is_empty) {
                continue;
            }
            let cells: Vec<&str> = row.iter().collect();
            frame.push(index.to_record(i + 1, &cells)?);
        }

        Ok(frame)
    }
}

impl Default for CsvFrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader for CsvFrameReader {
    fn read(&self, path: &Path) -> Result<RatingFrame> {
        let file = std::fs::File::open(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        self.read_from(file)
    }

    fn supported_types(&self) -> &[FileType] {
        if self.delimiter == b'\t' {
            &[FileType::Tsv]
        } else {
            &[FileType::Csv]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_legacy_headers() {
        let data = "from_id,to_id,rating\nu1,i1,4\nu1,i2,2.5\nu2,i1,-1\n";
        let frame = CsvFrameReader::new().read_from(data.as_bytes()).unwrap();

        assert_eq!(frame.len(), 3);
        assert_eq!(frame.users(), vec!["u1", "u2"]);
        assert_eq!(frame.records()[2].rating, -1.0);
    }

    #[test]
    fn test_read_optional_columns() {
        let data = "user,item,score,original_rating,timestamp\nu1,i1,0.9,,1000\n";
        let frame = CsvFrameReader::new().read_from(data.as_bytes()).unwrap();
        let record = &frame.records()[0];

        assert_eq!(record.original_rating, None);
        assert_eq!(record.timestamp.as_deref(), Some("1000"));
    }

    #[test]
    fn test_read_tsv_file() {
        let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        write!(file, "user\titem\trating\nu1\ti1\t3\n").unwrap();

        let reader = CsvFrameReader::new().with_delimiter(b'\t');
        assert!(reader.can_read(FileType::Tsv));
        assert!(!reader.can_read(FileType::Csv));

        let frame = reader.read(file.path()).unwrap();
        assert_eq!(frame.len(), 1);
    }

    #[test]
    fn test_duplicate_rows_are_kept() {
        let data = "user,item,rating\nu1,i1,1\nu1,i1,1\n";
        let frame = CsvFrameReader::new().read_from(data.as_bytes()).unwrap();
        assert_eq!(frame.len(), 2);
    }

    #[test]
    fn test_header_without_rating_fails() {
        let data = "user,item\nu1,i1\n";
        let err = CsvFrameReader::new().read_from(data.as_bytes()).unwrap_err();
        assert!(matches!(err, ParserError::MissingColumn { .. }));
    }
}
