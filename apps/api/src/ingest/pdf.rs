//! PDF text layer and the scanned-document heuristic.
//!
//! Runs from every page are concatenated (newline after line-ending runs, a space
//! otherwise). If the result is too sparse to be a real text PDF, the first page
//! alone is rasterized for OCR and the sparse text layer is thrown away.
//! Multi-page scans lose everything past page 1; that limit is deliberate.

use std::sync::Arc;

use crate::ingest::ExtractionError;

/// Trimmed text-layer length below which a PDF is treated as scanned.
pub const SCANNED_TEXT_THRESHOLD: usize = 100;
/// Rasterization scale relative to the page's native size.
pub const OCR_RENDER_SCALE: f32 = 2.0;

/// One positioned string from a page's text layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub ends_line: bool,
}

/// Opens PDF buffers. Implementations are synchronous and run on the blocking pool.
pub trait PdfRenderer: Send + Sync {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, ExtractionError>;
}

/// An opened PDF. Pages are 0-indexed.
pub trait PdfDocument {
    fn page_count(&self) -> usize;
    fn text_runs(&self, page: usize) -> Result<Vec<TextRun>, ExtractionError>;
    /// Renders `page` at `scale` and returns PNG bytes.
    fn render_png(&self, page: usize, scale: f32) -> Result<Vec<u8>, ExtractionError>;
}

/// Outcome of reading a PDF's text layer.
#[derive(Debug)]
pub enum TextLayer {
    /// The text layer is trusted as-is.
    Text(String),
    /// Too sparse; the first page has been rendered for OCR.
    Scanned {
        text_layer_chars: usize,
        first_page_png: Vec<u8>,
    },
}

/// Appends runs the way the text layer is laid out on the page.
pub fn append_runs(out: &mut String, runs: &[TextRun]) {
    for run in runs {
        out.push_str(&run.text);
        out.push(if run.ends_line { '\n' } else { ' ' });
    }
}

pub fn looks_scanned(full_text: &str) -> bool {
    full_text.trim().chars().count() < SCANNED_TEXT_THRESHOLD
}

/// Reads all pages; renders page 1 only when the heuristic says the PDF is scanned.
pub fn read_text_layer(
    renderer: &dyn PdfRenderer,
    bytes: &[u8],
) -> Result<TextLayer, ExtractionError> {
    let document = renderer.open(bytes)?;
    let page_count = document.page_count();

    let mut full_text = String::new();
    for page in 0..page_count {
        append_runs(&mut full_text, &document.text_runs(page)?);
    }

    if !looks_scanned(&full_text) || page_count == 0 {
        return Ok(TextLayer::Text(full_text));
    }

    let first_page_png = document.render_png(0, OCR_RENDER_SCALE)?;
    Ok(TextLayer::Scanned {
        text_layer_chars: full_text.trim().chars().count(),
        first_page_png,
    })
}

/// MuPDF when built with the `mupdf` feature, otherwise the pdf-extract text layer.
pub fn default_renderer() -> Arc<dyn PdfRenderer> {
    #[cfg(feature = "mupdf")]
    {
        Arc::new(mupdf_backend::MupdfBackend)
    }
    #[cfg(not(feature = "mupdf"))]
    {
        Arc::new(TextLayerBackend)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// pdf-extract backend
// ────────────────────────────────────────────────────────────────────────────

/// Text-only backend built on `pdf-extract`.
///
/// pdf-extract yields one string per page and no positions, so every non-blank
/// line becomes a line-ending run. It cannot rasterize: scanned PDFs fail with
/// [`ExtractionError::RendererUnavailable`].
pub struct TextLayerBackend;

impl PdfRenderer for TextLayerBackend {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, ExtractionError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| ExtractionError::Renderer(e.to_string()))?;
        Ok(Box::new(TextLayerDocument { pages }))
    }
}

struct TextLayerDocument {
    pages: Vec<String>,
}

impl PdfDocument for TextLayerDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn text_runs(&self, page: usize) -> Result<Vec<TextRun>, ExtractionError> {
        let text = self
            .pages
            .get(page)
            .ok_or_else(|| ExtractionError::Renderer(format!("page {page} out of range")))?;
        Ok(text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| TextRun {
                text: line.to_string(),
                ends_line: true,
            })
            .collect())
    }

    fn render_png(&self, _page: usize, _scale: f32) -> Result<Vec<u8>, ExtractionError> {
        Err(ExtractionError::RendererUnavailable)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MuPDF backend
// ────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "mupdf")]
mod mupdf_backend {
    use mupdf::{Colorspace, Document, ImageFormat, Matrix, TextPageFlags};

    use super::{PdfDocument, PdfRenderer, TextRun};
    use crate::ingest::ExtractionError;

    fn renderer_error(e: mupdf::Error) -> ExtractionError {
        ExtractionError::Renderer(e.to_string())
    }

    /// Full backend: per-line runs from the structured text page, plus rasterization.
    pub struct MupdfBackend;

    impl PdfRenderer for MupdfBackend {
        fn open(&self, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, ExtractionError> {
            let document =
                Document::from_bytes(bytes, "application/pdf").map_err(renderer_error)?;
            Ok(Box::new(MupdfDocument { document }))
        }
    }

    struct MupdfDocument {
        document: Document,
    }

    impl MupdfDocument {
        fn load(&self, page: usize) -> Result<mupdf::Page, ExtractionError> {
            self.document
                .load_page(page as i32)
                .map_err(renderer_error)
        }
    }

    impl PdfDocument for MupdfDocument {
        fn page_count(&self) -> usize {
            self.document
                .page_count()
                .map(|n| n.max(0) as usize)
                .unwrap_or(0)
        }

        fn text_runs(&self, page: usize) -> Result<Vec<TextRun>, ExtractionError> {
            let text_page = self
                .load(page)?
                .to_text_page(TextPageFlags::empty())
                .map_err(renderer_error)?;

            let mut runs = Vec::new();
            for block in text_page.blocks() {
                for line in block.lines() {
                    let text: String = line
                        .chars()
                        .map(|c| c.char().unwrap_or('\u{FFFD}'))
                        .collect();
                    runs.push(TextRun {
                        text,
                        ends_line: true,
                    });
                }
            }
            Ok(runs)
        }

        fn render_png(&self, page: usize, scale: f32) -> Result<Vec<u8>, ExtractionError> {
            let pixmap = self
                .load(page)?
                .to_pixmap(
                    &Matrix::new_scale(scale, scale),
                    &Colorspace::device_rgb(),
                    false,
                    true,
                )
                .map_err(renderer_error)?;

            let mut png = Vec::new();
            pixmap
                .write_to(&mut png, ImageFormat::PNG)
                .map_err(renderer_error)?;
            Ok(png)
        }
    }
}

#[cfg(all(test, feature = "mupdf"))]
mod mupdf_tests {
    use super::mupdf_backend::MupdfBackend;
    use super::tests::pdf_fixture;
    use super::*;

    #[test]
    fn test_mupdf_reads_runs_per_page() {
        let bytes = pdf_fixture(&["PageOneText", "PageTwoText"]);

        let document = MupdfBackend.open(&bytes).unwrap();

        assert_eq!(document.page_count(), 2);
        let first = document.text_runs(0).unwrap();
        assert!(first.iter().any(|r| r.text.contains("PageOneText")));
        assert!(first.last().is_some_and(|r| r.ends_line));
        let second = document.text_runs(1).unwrap();
        assert!(second.iter().any(|r| r.text.contains("PageTwoText")));
        assert!(document.text_runs(2).is_err());
    }

    #[test]
    fn test_mupdf_renders_png() {
        let bytes = pdf_fixture(&["PageOneText"]);

        let document = MupdfBackend.open(&bytes).unwrap();
        let png = document.render_png(0, OCR_RENDER_SCALE).unwrap();

        assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
    }

    #[test]
    fn test_mupdf_sparse_pdf_is_rendered_for_ocr() {
        let bytes = pdf_fixture(&["Scan"]);

        match read_text_layer(&MupdfBackend, &bytes).unwrap() {
            TextLayer::Scanned {
                text_layer_chars,
                first_page_png,
            } => {
                assert_eq!(text_layer_chars, 4);
                assert!(first_page_png.starts_with(b"\x89PNG"));
            }
            other => panic!("expected scanned layer, got {other:?}"),
        }
    }

    #[test]
    fn test_mupdf_rejects_garbage() {
        assert!(MupdfBackend.open(b"not a pdf").is_err());
    }
}
