//! Local document text extraction

mod extractor;

pub use extractor::{truncate_chars, SourceFormat, TextExtractor};
