//! Local plain-text extraction used by the text fallback strategy
//!
//! All functions here are synchronous and may be slow on large or
//! pathological files; callers run them on the blocking pool under a
//! deadline.

use crate::error::{Error, Result};

/// Document formats the extractor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Pdf,
    Docx,
    Spreadsheet,
    Csv,
    PlainText,
}

impl SourceFormat {
    /// Detect from the filename extension
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "xlsx" | "xlsm" | "xls" | "ods" => Some(Self::Spreadsheet),
            "csv" => Some(Self::Csv),
            "txt" | "md" | "json" | "xml" | "edi" => Some(Self::PlainText),
            _ => None,
        }
    }
}

/// Multi-format text extractor
pub struct TextExtractor;

impl TextExtractor {
    /// Extract readable text from a document's bytes
    pub fn extract(filename: &str, data: &[u8]) -> Result<String> {
        let format = SourceFormat::from_filename(filename).ok_or_else(|| {
            Error::extraction(filename, "File type not supported for text extraction")
        })?;

        let text = match format {
            SourceFormat::Pdf => Self::extract_pdf(filename, data)?,
            SourceFormat::Docx => Self::extract_docx(filename, data)?,
            SourceFormat::Spreadsheet => Self::extract_spreadsheet(filename, data)?,
            SourceFormat::Csv => Self::extract_csv(data),
            SourceFormat::PlainText => String::from_utf8_lossy(data).into_owned(),
        };

        let text = normalize(&text);
        if text.is_empty() {
            return Err(Error::extraction(filename, "No text content could be extracted"));
        }
        Ok(text)
    }

    fn extract_pdf(filename: &str, data: &[u8]) -> Result<String> {
        match pdf_extract::extract_text_from_mem(data) {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => {
                tracing::debug!("pdf-extract returned no text for {}, trying lopdf", filename);
                Self::extract_pdf_fallback(filename, data)
            }
            Err(e) => {
                tracing::warn!("pdf-extract failed for {}: {}, trying lopdf", filename, e);
                Self::extract_pdf_fallback(filename, data)
            }
        }
    }

    /// Page-by-page extraction through lopdf for PDFs pdf-extract chokes on
    fn extract_pdf_fallback(filename: &str, data: &[u8]) -> Result<String> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::extraction(filename, format!("Failed to load PDF: {}", e)))?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        let mut all_text = String::new();
        for page in page_numbers {
            match doc.extract_text(&[page]) {
                Ok(text) if !text.trim().is_empty() => {
                    all_text.push_str(&format!("\n--- Page {} ---\n", page));
                    all_text.push_str(&text);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("No text on page {} of {}: {}", page, filename, e),
            }
        }

        if all_text.trim().is_empty() {
            return Err(Error::extraction(
                filename,
                "PDF appears to be image-based or has no extractable text",
            ));
        }
        Ok(all_text)
    }

    #[allow(irrefutable_let_patterns)]
    fn extract_docx(filename: &str, data: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(data)
            .map_err(|e| Error::extraction(filename, e.to_string()))?;

        let mut content = String::new();
        for child in doc.document.children {
            match child {
                docx_rs::DocumentChild::Paragraph(p) => {
                    content.push_str(&paragraph_text(&p));
                    content.push('\n');
                }
                // Invoices keep their goods in tables; render rows pipe-separated
                docx_rs::DocumentChild::Table(table) => {
                    for table_child in table.rows.iter() {
                        if let docx_rs::TableChild::TableRow(row) = table_child {
                            let cells: Vec<String> = row.cells.iter().map(cell_text).collect();
                            content.push_str(&cells.join(" | "));
                            content.push('\n');
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(content)
    }

    fn extract_spreadsheet(filename: &str, data: &[u8]) -> Result<String> {
        use calamine::Reader;

        let cursor = std::io::Cursor::new(data);
        let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
            .map_err(|e| Error::extraction(filename, e.to_string()))?;

        let mut content = String::new();
        for sheet_name in workbook.sheet_names().to_vec() {
            let Ok(range) = workbook.worksheet_range(&sheet_name) else {
                continue;
            };
            content.push_str(&format!("Sheet: {}\n", sheet_name));

            for row in range.rows() {
                let row_text: Vec<String> = row
                    .iter()
                    .map(|cell| match cell {
                        calamine::Data::Empty => String::new(),
                        calamine::Data::String(s) => s.clone(),
                        calamine::Data::Float(f) => f.to_string(),
                        calamine::Data::Int(i) => i.to_string(),
                        calamine::Data::Bool(b) => b.to_string(),
                        calamine::Data::DateTime(dt) => dt.to_string(),
                        _ => String::new(),
                    })
                    .collect();

                if !row_text.iter().all(|s| s.is_empty()) {
                    content.push_str(&row_text.join(" | "));
                    content.push('\n');
                }
            }
            content.push('\n');
        }
        Ok(content)
    }

    fn extract_csv(data: &[u8]) -> String {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data);

        let mut content = String::new();
        for record in reader.records().flatten() {
            content.push_str(&record.iter().collect::<Vec<_>>().join(" | "));
            content.push('\n');
        }
        content
    }
}

#[allow(irrefutable_let_patterns)]
fn cell_text(child: &docx_rs::TableRowChild) -> String {
    let docx_rs::TableRowChild::TableCell(cell) = child else {
        return String::new();
    };
    cell.children
        .iter()
        .filter_map(|c| match c {
            docx_rs::TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn paragraph_text(p: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &p.children {
        if let docx_rs::ParagraphChild::Run(run) = child {
            for child in &run.children {
                if let docx_rs::RunChild::Text(t) = child {
                    text.push_str(&t.text);
                }
            }
        }
    }
    text
}

/// Strip NULs and typographic variants, drop blank lines
fn normalize(text: &str) -> String {
    text.replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
///
/// Returns the (possibly shortened) text and whether anything was dropped.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => (&text[..byte_index], true),
        None => (text, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(SourceFormat::from_filename("INV-001.PDF"), Some(SourceFormat::Pdf));
        assert_eq!(SourceFormat::from_filename("lines.xlsx"), Some(SourceFormat::Spreadsheet));
        assert_eq!(SourceFormat::from_filename("scan.tiff"), None);
        assert_eq!(SourceFormat::from_filename("noextension"), None);
    }

    #[test]
    fn test_plain_text_is_normalized() {
        let text = TextExtractor::extract("note.txt", "  Incoterm: FOB\u{00A0}Santos \n\n\0\n Total: 10 ".as_bytes())
            .unwrap();
        assert_eq!(text, "Incoterm: FOB Santos\nTotal: 10");
    }

    #[test]
    fn test_csv_rows_are_pipe_joined() {
        let text = TextExtractor::extract("items.csv", b"code,qty\nA1,10\nB2,5\n").unwrap();
        assert_eq!(text, "code | qty\nA1 | 10\nB2 | 5");
    }

    #[test]
    fn test_empty_and_unsupported_fail() {
        assert!(matches!(
            TextExtractor::extract("blank.txt", b"   \n  "),
            Err(Error::Extraction { .. })
        ));
        assert!(matches!(
            TextExtractor::extract("photo.png", b"\x89PNG"),
            Err(Error::Extraction { .. })
        ));
    }

    #[test]
    fn test_corrupt_pdf_fails_cleanly() {
        let result = TextExtractor::extract("broken.pdf", b"not a pdf at all");
        assert!(result.is_err());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let (cut, truncated) = truncate_chars("açúcar", 3);
        assert_eq!(cut, "açú");
        assert!(truncated);

        let (whole, truncated) = truncate_chars("abc", 3);
        assert_eq!(whole, "abc");
        assert!(!truncated);
    }
}
