// src/pipeline/segment.rs
//! Source documents to section records, one JSONL line per document.

use crate::config::SegmentConfig;
use crate::extractors::docx::read_docx;
use crate::extractors::section::segment;
use crate::pipeline::RunSummary;
use crate::storage::{DocumentRecord, JsonlWriter};
use crate::utils::AppError;
use std::fs;
use std::path::{Path, PathBuf};

pub fn run(config: &SegmentConfig) -> Result<RunSummary, AppError> {
    let mut writer = JsonlWriter::create(&config.output)?;
    let mut summary = RunSummary::default();

    for dir in &config.input_dirs {
        let files = list_docx_files(dir)?;
        tracing::info!("Found {} .docx files in {}", files.len(), dir.display());

        for path in files {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            match read_docx(&path) {
                Ok(blocks) => {
                    let record = DocumentRecord::from_segmentation(&filename, segment(&blocks));
                    writer.write_record(&record)?;
                    summary.processed += 1;
                    tracing::info!("Segmented {} ({} blocks)", filename, blocks.len());
                }
                Err(e) => {
                    tracing::error!("Failed to read {}: {}", path.display(), e);
                    summary.failed += 1;
                }
            }
        }
    }

    tracing::info!("Results saved to {}", writer.path().display());
    Ok(summary)
}

/// `.docx` files directly inside `dir`, sorted by name. Word lock files (`~$...`) are ignored.
fn list_docx_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_file() || !name.ends_with(".docx") {
            continue;
        }
        if name.starts_with("~$") {
            tracing::debug!("Skipping lock file {}", name);
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::read_documents;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_docx(path: &Path, paragraphs: &[&str]) {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("word/document.xml", SimpleFileOptions::default()).unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        fs::write(path, writer.finish().unwrap().into_inner()).unwrap();
    }

    #[test]
    fn test_segments_folder_and_counts_failures() {
        let input = tempfile::tempdir().unwrap();
        write_docx(&input.path().join("b.docx"), &["经营管理分析", "团队稳定。"]);
        write_docx(&input.path().join("a.docx"), &["第一部分 基本情况分析", "成立于2001年。"]);
        fs::write(input.path().join("broken.docx"), "not a zip").unwrap();
        fs::write(input.path().join("~$a.docx"), "lock").unwrap();
        fs::write(input.path().join("notes.txt"), "ignored").unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("sections.jsonl");
        let config = SegmentConfig::new(vec![input.path().to_path_buf()], output.clone()).unwrap();

        let summary = run(&config).unwrap();
        assert_eq!(summary, RunSummary { processed: 2, skipped: 0, failed: 1 });

        let documents = read_documents(&output).unwrap();
        let names: Vec<_> = documents.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, ["a.docx", "b.docx"]);
        assert_eq!(documents[0].content[0].section.content, "成立于2001年。\n");
        assert_eq!(documents[1].content[1].section.content, "团队稳定。\n");
        assert!(documents.iter().all(|d| d.content.len() == 5));
    }
}
