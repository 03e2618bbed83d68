//! Word (.docx) to plain text.
//!
//! A .docx file is a zip archive; the body lives in `word/document.xml`. Text runs
//! are `w:t` elements, paragraphs are `w:p`.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::ingest::ExtractionError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Converts a Word document buffer to plain text.
pub trait WordConverter: Send + Sync {
    fn convert(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Built-in converter reading the OOXML body directly.
pub struct DocxConverter;

impl WordConverter for DocxConverter {
    fn convert(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExtractionError::Converter(format!("not a valid .docx archive: {e}")))?;

        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_PART)
            .map_err(|e| ExtractionError::Converter(format!("{DOCUMENT_PART}: {e}")))?
            .read_to_string(&mut xml)
            .map_err(|e| ExtractionError::Converter(format!("{DOCUMENT_PART}: {e}")))?;

        document_xml_to_text(&xml)
    }
}

/// Flattens `word/document.xml` into text: one line per paragraph, tabs and
/// explicit breaks kept.
pub fn document_xml_to_text(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_text_run = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ExtractionError::Converter(format!("malformed document XML: {e}")))?;

        match event {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text_run = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" | b"p" => text.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_text_run => {
                let unescaped = e
                    .unescape()
                    .map_err(|e| ExtractionError::Converter(format!("bad text escape: {e}")))?;
                text.push_str(&unescaped);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
pub mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;

    /// Builds a minimal .docx with one paragraph per entry.
    pub fn docx_fixture(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{p}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{body}</w:body></w:document>"
        );

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(DOCUMENT_PART, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_paragraphs_become_lines() {
        let bytes = docx_fixture(&["Jane Doe", "Rust Engineer"]);
        let text = DocxConverter.convert(&bytes).unwrap();
        assert_eq!(text, "Jane Doe\nRust Engineer\n");
    }

    #[test]
    fn test_runs_tabs_and_breaks() {
        let xml = r#"<w:document xmlns:w="urn:w"><w:body>
            <w:p><w:r><w:t>Skills:</w:t><w:tab/><w:t xml:space="preserve">Rust, </w:t></w:r><w:r><w:t>Go</w:t></w:r></w:p>
            <w:p><w:r><w:t>Line one</w:t><w:br/><w:t>Line two</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = document_xml_to_text(xml).unwrap();
        assert_eq!(text, "Skills:\tRust, Go\nLine one\nLine two\n");
    }

    #[test]
    fn test_entities_are_unescaped() {
        let xml = r#"<w:document xmlns:w="urn:w"><w:p><w:r><w:t>R&amp;D &lt;lead&gt;</w:t></w:r></w:p></w:document>"#;
        assert_eq!(document_xml_to_text(xml).unwrap(), "R&D <lead>\n");
    }

    #[test]
    fn test_whitespace_outside_text_runs_is_dropped() {
        let xml = "<w:document xmlns:w=\"urn:w\">\n  <w:p>\n    <w:r><w:t>Only</w:t></w:r>\n  </w:p>\n</w:document>";
        assert_eq!(document_xml_to_text(xml).unwrap(), "Only\n");
    }

    #[test]
    fn test_non_zip_input_is_converter_error() {
        let err = DocxConverter.convert(b"plain bytes").unwrap_err();
        assert!(matches!(err, ExtractionError::Converter(_)));
    }

    #[test]
    fn test_archive_without_document_part_is_converter_error() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/styles.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<styles/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = DocxConverter.convert(&bytes).unwrap_err();
        assert!(matches!(err, ExtractionError::Converter(msg) if msg.contains(DOCUMENT_PART)));
    }
}
