//! JSON and JSON Lines output of image records.
//!
//! Records are written with their resolved display path, so consumers never
//! have to check whether a cached thumbnail still exists.

use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

use crate::types::{Classification, Dimensions, ImageRecord};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON array
    Json,
    /// One JSON object per line (newline-delimited JSON)
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Serialized view of one record.
#[derive(Debug, Serialize)]
pub struct RecordOutput<'a> {
    pub path: &'a Path,
    /// Thumbnail if it still exists, otherwise the original
    pub display_path: &'a Path,
    #[serde(flatten)]
    pub dimensions: Dimensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<&'a Classification>,
    pub favorite: bool,
}

impl<'a> From<&'a ImageRecord> for RecordOutput<'a> {
    fn from(record: &'a ImageRecord) -> Self {
        Self {
            path: &record.path,
            display_path: record.display_path(),
            dimensions: record.dimensions,
            thumbnail_path: record.thumbnail_path.as_deref(),
            classification: record.classification.as_ref(),
            favorite: record.favorite,
        }
    }
}

/// Writes records in the chosen format.
pub struct RecordWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
}

impl<W: Write> RecordWriter<W> {
    /// `pretty` only affects [`OutputFormat::Json`].
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
        }
    }

    /// Write all records and flush. Returns the number written.
    pub fn write_records(&mut self, records: &[ImageRecord]) -> io::Result<usize> {
        let views: Vec<RecordOutput<'_>> = records.iter().map(RecordOutput::from).collect();
        match self.format {
            OutputFormat::Json => {
                let written = if self.pretty {
                    serde_json::to_writer_pretty(&mut self.writer, &views)
                } else {
                    serde_json::to_writer(&mut self.writer, &views)
                };
                written.map_err(io::Error::other)?;
                writeln!(self.writer)?;
            }
            OutputFormat::JsonLines => {
                for view in &views {
                    serde_json::to_writer(&mut self.writer, view).map_err(io::Error::other)?;
                    writeln!(self.writer)?;
                }
            }
        }
        self.writer.flush()?;
        Ok(views.len())
    }

    /// Consume the writer and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Label;
    use std::path::PathBuf;

    fn records() -> Vec<ImageRecord> {
        let mut a = ImageRecord::new("/photos/a.jpg");
        a.dimensions = Dimensions::new(500, 400);
        a.classification = Some(Classification::new(vec![Label::new("cat", 0.9)]));

        let mut b = ImageRecord::new("/photos/b.png");
        b.dimensions = Dimensions::new(600, 450);
        b.thumbnail_path = Some(PathBuf::from("/gone/cache/12.jpg"));
        b.favorite = true;
        vec![a, b]
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("ndjson"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("csv"), None);
    }

    #[test]
    fn test_write_json_array() {
        let mut writer = RecordWriter::new(Vec::new(), OutputFormat::Json, false);
        assert_eq!(writer.write_records(&records()).unwrap(), 2);

        let output = String::from_utf8(writer.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[0]["width"], 500);
        assert_eq!(array[0]["classification"]["labels"][0]["name"], "cat");
        assert!(array[0].get("thumbnail_path").is_none());
    }

    #[test]
    fn test_write_jsonl_resolves_display_path() {
        let mut writer = RecordWriter::new(Vec::new(), OutputFormat::JsonLines, false);
        writer.write_records(&records()).unwrap();

        let output = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = output.trim().split('\n').collect();
        assert_eq!(lines.len(), 2);

        let b: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(b["display_path"], "/photos/b.png");
        assert_eq!(b["thumbnail_path"], "/gone/cache/12.jpg");
        assert_eq!(b["favorite"], true);
    }

    #[test]
    fn test_write_empty() {
        let mut writer = RecordWriter::new(Vec::new(), OutputFormat::Json, true);
        assert_eq!(writer.write_records(&[]).unwrap(), 0);
        assert_eq!(String::from_utf8(writer.into_inner()).unwrap().trim(), "[]");
    }
}
