//! JSON table reader
//!
//! Accepts an array of row objects, e.g.
//! `[{"user": "u1", "item": "i1", "rating": 4}]`.

use std::path::Path;

use cbrs_core::RatingFrame;
use serde_json::Value;

use crate::{ColumnSchema, FileType, FrameReader, ParserError, Result};

/// JSON table reader
pub struct JsonFrameReader {
    /// Header aliases
    pub schema: ColumnSchema,
}

impl JsonFrameReader {
    /// Create a reader with the default schema
    pub fn new() -> Self {
        Self {
            schema: ColumnSchema::default(),
        }
    }

    /// Set the header schema
    pub fn with_schema(mut self, schema: ColumnSchema) -> Self {
        self.schema = schema;
        self
    }

    fn value_to_string(value: Option<&Value>) -> String {
        match value {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Parse a table from a JSON string
    pub fn read_str(&self, content: &str) -> Result<RatingFrame> {
        let value: Value = serde_json::from_str(content)?;
        let Value::Array(rows) = value else {
            return Err(ParserError::Malformed(
                "expected a JSON array of row objects".to_string(),
            ));
        };

        let mut objects = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let Value::Object(object) = row else {
                return Err(ParserError::Malformed(format!(
                    "row {} is not a JSON object",
                    i + 1
                )));
            };
            objects.push(object);
        }

        if objects.is_empty() {
            return Ok(RatingFrame::new());
        }

        // Union of keys over all rows, in order of first appearance
        let mut headers: Vec<String> = Vec::new();
        for object in &objects {
            for key in object.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }
        let index = self.schema.resolve(&headers)?;

        let mut frame = RatingFrame::new();
        for (i, object) in objects.into_iter().enumerate() {
            let cells: Vec<String> = headers
                .iter()
                .map(|h| Self::value_to_string(object.get(h)))
                .collect();
            frame.push(index.to_record(i + 1, &cells)?);
        }

        Ok(frame)
    }
}

impl Default for JsonFrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader for JsonFrameReader {
    fn read(&self, path: &Path) -> Result<RatingFrame> {
        let content = std::fs::read_to_string(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        self.read_str(&content)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Json]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_mixed_value_types() {
        let content = r#"[
            {"from_id": "u1", "to_id": "i1", "rating": 4},
            {"from_id": "u2", "to_id": 17, "rating": "3.5", "timestamp": null}
        ]"#;
        let frame = JsonFrameReader::new().read_str(content).unwrap();

        assert_eq!(frame.len(), 2);
        assert_eq!(frame.records()[1].item_id, "17");
        assert_eq!(frame.records()[1].rating, 3.5);
        assert_eq!(frame.records()[1].timestamp, None);
    }

    #[test]
    fn test_optional_columns_from_later_rows() {
        let content = r#"[
            {"user": "u1", "item": "i1", "rating": 4},
            {"user": "u2", "item": "i2", "rating": 2, "timestamp": "978300760"}
        ]"#;
        let frame = JsonFrameReader::new().read_str(content).unwrap();

        assert_eq!(frame.records()[0].timestamp, None);
        assert_eq!(frame.records()[1].timestamp.as_deref(), Some("978300760"));
    }

    #[test]
    fn test_non_object_row_rejected() {
        let content = r#"[{"user": "u1", "item": "i1", "rating": 4}, 5]"#;
        let err = JsonFrameReader::new().read_str(content).unwrap_err();
        assert!(matches!(err, ParserError::Malformed(_)));
    }

    #[test]
    fn test_empty_array() {
        let frame = JsonFrameReader::new().read_str("[]").unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_non_array_rejected() {
        let err = JsonFrameReader::new().read_str(r#"{"user": "u1"}"#).unwrap_err();
        assert!(matches!(err, ParserError::Malformed(_)));
    }
}
