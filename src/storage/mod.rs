// src/storage/mod.rs
//! Line-delimited JSON records exchanged between the pipeline stages.

use crate::extractors::score::{DimensionMap, ScoreRecord};
use crate::extractors::section::{SectionRecord, Segmentation};
use crate::utils::error::StorageError;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const INVALID_JSON: &str = "Invalid JSON format";
pub const MISSING_CONTENT_LIST: &str = "Invalid data format, missing 'content' list";
pub const INVALID_UTF8: &str = "Invalid UTF-8 encoding";

// --- Record Shapes ---

/// One source document: `{filename, content: [section, ...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub filename: String,
    pub content: Vec<SectionEntry>,
}

impl DocumentRecord {
    pub fn from_segmentation(filename: impl Into<String>, segmentation: Segmentation) -> Self {
        Self {
            filename: filename.into(),
            content: segmentation.into_retained().into_iter().map(SectionEntry::from).collect(),
        }
    }
}

/// A section record plus whatever later stages attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionEntry {
    #[serde(flatten)]
    pub section: SectionRecord,
    #[serde(rename = "summary_LLM", default, skip_serializing_if = "Option::is_none")]
    pub summary_llm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_data: Option<ScoreData>,
}

impl From<SectionRecord> for SectionEntry {
    fn from(section: SectionRecord) -> Self {
        Self { section, summary_llm: None, score_data: None }
    }
}

/// Persisted scoring outcome for one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreData {
    #[serde(flatten)]
    pub record: ScoreRecord,
    #[serde(default)]
    pub status_message: String,
}

impl ScoreData {
    /// Placeholder for a section that was never sent to the evaluator.
    pub fn not_scored(status: impl Into<String>) -> Self {
        Self {
            record: ScoreRecord {
                scores: DimensionMap::default(),
                reasons: DimensionMap::default(),
                calculated_total: 0,
                declared_total: None,
                parsing_error: false,
                raw_text: String::new(),
            },
            status_message: status.into(),
        }
    }
}

/// Stand-in written for an input line that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    pub original_line_number: usize,
    pub error: String,
    pub line_content: String,
}

impl RecordError {
    pub fn new(line_number: usize, error: impl Into<String>, line: &str) -> Self {
        Self {
            original_line_number: line_number,
            error: error.into(),
            line_content: line.trim().to_string(),
        }
    }
}

/// Parses one JSONL line into a document record, or the placeholder to write instead.
pub fn parse_document_line(line_number: usize, line: &str) -> Result<DocumentRecord, RecordError> {
    // Typed parse straight from the text; a `Value` map would re-sort the dimension keys.
    serde_json::from_str::<DocumentRecord>(line).map_err(|e| {
        let error = match serde_json::from_str::<serde_json::Value>(line) {
            Err(_) => INVALID_JSON.to_string(),
            Ok(value) if !value.get("content").is_some_and(serde_json::Value::is_array) => {
                MISSING_CONTENT_LIST.to_string()
            }
            Ok(_) => format!("Unknown error: {e}"),
        };
        RecordError::new(line_number, error, line)
    })
}

/// Parses a line yielded by [`JsonlReader`], passing an undecodable line's placeholder through.
pub fn parse_read_line(
    line_number: usize,
    line: Result<String, RecordError>,
) -> Result<DocumentRecord, RecordError> {
    line.and_then(|text| parse_document_line(line_number, &text))
}

// --- JSONL I/O ---

/// Appends one JSON value per line, flushing after each record.
pub struct JsonlWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl JsonlWriter {
    /// Creates (or truncates) the output file, creating parent directories as needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        ensure_parent(&path)?;
        let file = File::create(&path).map_err(StorageError::IoError)?;
        tracing::debug!("Writing records to {}", path.display());
        Ok(Self { path, writer: BufWriter::new(file), written: 0 })
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<(), StorageError> {
        let line = serde_json::to_string(record)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Iterates the non-blank lines of a JSONL file with 1-based line numbers.
///
/// A line that is not valid UTF-8 comes back as its placeholder; only I/O
/// failures end the iteration with an error.
pub struct JsonlReader {
    reader: BufReader<File>,
    buf: Vec<u8>,
    line_number: usize,
}

impl JsonlReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let file = File::open(path.as_ref()).map_err(StorageError::IoError)?;
        Ok(Self { reader: BufReader::new(file), buf: Vec::new(), line_number: 0 })
    }
}

impl Iterator for JsonlReader {
    type Item = Result<(usize, Result<String, RecordError>), StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(StorageError::IoError(e))),
            }
            self.line_number += 1;

            let line = match std::str::from_utf8(&self.buf) {
                Ok(text) if text.trim().is_empty() => continue,
                Ok(text) => Ok(text.trim_end_matches(['\n', '\r']).to_string()),
                Err(_) => Err(RecordError::new(
                    self.line_number,
                    INVALID_UTF8,
                    &String::from_utf8_lossy(&self.buf),
                )),
            };
            return Some(Ok((self.line_number, line)));
        }
    }
}

/// Reads every well-formed document record, logging and skipping the rest.
pub fn read_documents<P: AsRef<Path>>(path: P) -> Result<Vec<DocumentRecord>, StorageError> {
    let path = path.as_ref();
    let mut documents = Vec::new();
    for entry in JsonlReader::open(path)? {
        let (line_number, line) = entry?;
        match parse_read_line(line_number, line) {
            Ok(doc) => documents.push(doc),
            Err(e) => tracing::warn!(
                "Skipping line {} of {}: {}",
                line_number,
                path.display(),
                e.error
            ),
        }
    }
    Ok(documents)
}

/// Writes `value` as pretty-printed JSON.
pub fn write_json_pretty<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<(), StorageError> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;
    fs::write(path, json).map_err(StorageError::IoError)?;
    tracing::info!("Saved {}", path.display());
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(StorageError::IoError)?;
        }
    }
    Ok(())
}
