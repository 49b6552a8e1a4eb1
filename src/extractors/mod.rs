// src/extractors/mod.rs
pub mod docx;
pub mod score;
pub mod section;

// Re-export key extraction types for convenience
#[allow(unused_imports)]
pub use score::{extract, DeclaredTotal, ScoreRecord, DIMENSIONS};
#[allow(unused_imports)]
pub use section::{segment, ContentBlock, Section, SectionRecord, Segmentation, Segmenter};
