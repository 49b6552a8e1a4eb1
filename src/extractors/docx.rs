// src/extractors/docx.rs
//! Reads a `.docx` (WordprocessingML) archive into content blocks in reading order.
//!
//! Only `word/document.xml` is consulted. Direct children of `w:body` are walked:
//! paragraphs become text blocks and tables become table blocks.

use crate::extractors::section::ContentBlock;
use crate::utils::error::DocumentError;
use roxmltree::Node;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const DOCUMENT_PART: &str = "word/document.xml";

/// Opens a `.docx` file and returns its blocks.
pub fn read_docx<P: AsRef<Path>>(path: P) -> Result<Vec<ContentBlock>, DocumentError> {
    let path = path.as_ref();
    tracing::debug!("Reading document blocks from {}", path.display());
    let file = File::open(path)?;
    read_docx_from(file)
}

/// Same as [`read_docx`], for any seekable reader.
pub fn read_docx_from<R: Read + Seek>(reader: R) -> Result<Vec<ContentBlock>, DocumentError> {
    let mut archive = ZipArchive::new(reader)
        .map_err(|e| DocumentError::Archive(e.to_string()))?;

    let xml = {
        let mut part = archive
            .by_name(DOCUMENT_PART)
            .map_err(|e| DocumentError::MissingPart(format!("{DOCUMENT_PART}: {e}")))?;
        let mut content = String::new();
        part.read_to_string(&mut content)?;
        content
    };

    parse_document_xml(&xml)
}

/// Walks the body of a `word/document.xml` payload.
pub fn parse_document_xml(xml: &str) -> Result<Vec<ContentBlock>, DocumentError> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| DocumentError::Xml(e.to_string()))?;

    let body = doc
        .descendants()
        .find(|n| is_word(n, "body"))
        .ok_or_else(|| DocumentError::Xml("document has no w:body".to_string()))?;

    let mut blocks = Vec::new();
    for child in body.children().filter(|n| n.is_element()) {
        if is_word(&child, "p") {
            blocks.push(ContentBlock::Text(paragraph_text(child)));
        } else if is_word(&child, "tbl") {
            blocks.push(ContentBlock::Table(table_rows(child)));
        }
    }

    tracing::debug!("Parsed {} blocks from document body", blocks.len());
    Ok(blocks)
}

fn is_word(node: &Node<'_, '_>, local: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local
        && node.tag_name().namespace() == Some(WORD_NS)
}

// All w:t runs under the paragraph, hyperlinks included.
fn paragraph_text(paragraph: Node<'_, '_>) -> String {
    paragraph
        .descendants()
        .filter(|n| is_word(n, "t"))
        .filter_map(|n| n.text())
        .collect()
}

/// One entry per grid column: a `w:gridSpan` cell repeats across the columns it
/// covers and a `w:vMerge` continuation repeats the text of the cell that opened it.
fn table_rows(table: Node<'_, '_>) -> Vec<Vec<String>> {
    // grid column -> text of the open vertical merge
    let mut merge_tops: HashMap<usize, String> = HashMap::new();
    let mut rows = Vec::new();

    for row in table.children().filter(|n| is_word(n, "tr")) {
        let mut cells = Vec::new();
        for cell in row.children().filter(|n| is_word(n, "tc")) {
            let column = cells.len();
            let text = match vertical_merge(cell) {
                Some(VerticalMerge::Restart) => {
                    let text = cell_text(cell);
                    merge_tops.insert(column, text.clone());
                    text
                }
                Some(VerticalMerge::Continue) => merge_tops.get(&column).cloned().unwrap_or_default(),
                None => {
                    merge_tops.remove(&column);
                    cell_text(cell)
                }
            };
            let span = grid_span(cell);
            cells.extend(std::iter::repeat(text).take(span));
        }
        rows.push(cells);
    }
    rows
}

enum VerticalMerge {
    Restart,
    Continue,
}

fn cell_property<'a, 'input>(cell: Node<'a, 'input>, local: &str) -> Option<Node<'a, 'input>> {
    cell.children()
        .find(|n| is_word(n, "tcPr"))?
        .children()
        .find(|n| is_word(n, local))
}

fn grid_span(cell: Node<'_, '_>) -> usize {
    cell_property(cell, "gridSpan")
        .and_then(|n| n.attribute((WORD_NS, "val")))
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&span| span > 0)
        .unwrap_or(1)
}

// `<w:vMerge/>` without a value continues the merge above.
fn vertical_merge(cell: Node<'_, '_>) -> Option<VerticalMerge> {
    let merge = cell_property(cell, "vMerge")?;
    match merge.attribute((WORD_NS, "val")) {
        Some("restart") => Some(VerticalMerge::Restart),
        _ => Some(VerticalMerge::Continue),
    }
}

fn cell_text(cell: Node<'_, '_>) -> String {
    cell.descendants()
        .filter(|n| is_word(n, "p"))
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}
