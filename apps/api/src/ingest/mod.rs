//! Document ingestion: turns an uploaded résumé into plain text.
//!
//! Flow: classify media type → one handler per [`MediaKind`] → non-empty check.
//! Word and PDF parsing run on the blocking pool; images and scanned PDFs are
//! transcribed through the LLM client's vision path.

pub mod docx;
pub mod pdf;
pub mod vision;

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::ingest::docx::{DocxConverter, WordConverter};
use crate::ingest::pdf::{read_text_layer, PdfRenderer, TextLayer};
use crate::llm_client::{LlmClient, LlmError};

pub const DOCX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PDF_MEDIA_TYPE: &str = "application/pdf";
pub const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("No text content was detected in the document")]
    NoTextDetected,

    #[error("The Word document converter is not available")]
    ConverterUnavailable,

    #[error("The PDF renderer is not available")]
    RendererUnavailable,

    #[error("Word document conversion failed: {0}")]
    Converter(String),

    #[error("PDF processing failed: {0}")]
    Renderer(String),

    #[error("Vision transcription failed: {0}")]
    Vision(#[from] LlmError),
}

/// Extraction strategy selected from a declared media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    PlainText,
    WordDocument,
    Image,
    Pdf,
    Unknown,
}

impl MediaKind {
    /// Word → image → PDF → plain text, in that priority. Parameters such as
    /// `; charset=utf-8` are ignored.
    pub fn classify(media_type: &str) -> Self {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence == DOCX_MEDIA_TYPE {
            MediaKind::WordDocument
        } else if essence.starts_with("image/") {
            MediaKind::Image
        } else if essence == PDF_MEDIA_TYPE {
            MediaKind::Pdf
        } else if essence == "text/plain" {
            MediaKind::PlainText
        } else {
            MediaKind::Unknown
        }
    }
}

/// Media type implied by a file name's extension, for uploads that don't declare one.
pub fn media_type_for_file_name(file_name: &str) -> Option<&'static str> {
    let extension = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some(PDF_MEDIA_TYPE),
        "txt" => Some("text/plain"),
        "docx" => Some(DOCX_MEDIA_TYPE),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// An uploaded file. Immutable once created.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub media_type: String,
    pub bytes: Bytes,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::classify(&self.media_type)
    }
}

/// Format dispatcher. Collaborators left as `None` report themselves unavailable.
#[derive(Clone)]
pub struct Extractor {
    llm: LlmClient,
    word: Option<Arc<dyn WordConverter>>,
    pdf: Option<Arc<dyn PdfRenderer>>,
}

impl Extractor {
    /// Extractor with the built-in DOCX converter and the default PDF backend.
    pub fn new(llm: LlmClient) -> Self {
        Self::with_collaborators(
            llm,
            Some(Arc::new(DocxConverter)),
            Some(pdf::default_renderer()),
        )
    }

    pub fn with_collaborators(
        llm: LlmClient,
        word: Option<Arc<dyn WordConverter>>,
        pdf: Option<Arc<dyn PdfRenderer>>,
    ) -> Self {
        Self { llm, word, pdf }
    }

    /// Returns the document's text. Text that trims to nothing is a failure.
    pub async fn extract(&self, document: &SourceDocument) -> Result<String, ExtractionError> {
        let kind = document.kind();
        debug!(
            "Extracting '{}' ({} bytes) as {:?}",
            document.name,
            document.bytes.len(),
            kind
        );

        let text = match kind {
            MediaKind::WordDocument => self.extract_word(document).await?,
            MediaKind::Image => {
                vision::transcribe(&self.llm, &document.bytes, &document.media_type).await?
            }
            MediaKind::Pdf => self.extract_pdf(document).await?,
            MediaKind::PlainText | MediaKind::Unknown => decode_text(&document.bytes),
        };

        if text.trim().is_empty() {
            return Err(ExtractionError::NoTextDetected);
        }
        Ok(text)
    }

    async fn extract_word(&self, document: &SourceDocument) -> Result<String, ExtractionError> {
        let converter = self
            .word
            .clone()
            .ok_or(ExtractionError::ConverterUnavailable)?;
        let bytes = document.bytes.clone();

        tokio::task::spawn_blocking(move || converter.convert(&bytes))
            .await
            .map_err(|e| ExtractionError::Converter(e.to_string()))?
    }

    async fn extract_pdf(&self, document: &SourceDocument) -> Result<String, ExtractionError> {
        let renderer = self
            .pdf
            .clone()
            .ok_or(ExtractionError::RendererUnavailable)?;
        let bytes = document.bytes.clone();

        let layer = tokio::task::spawn_blocking(move || read_text_layer(renderer.as_ref(), &bytes))
            .await
            .map_err(|e| ExtractionError::Renderer(e.to_string()))??;

        match layer {
            TextLayer::Text(full_text) => Ok(full_text),
            TextLayer::Scanned {
                text_layer_chars,
                first_page_png,
            } => {
                info!(
                    "Scanned PDF detected ('{}': {} text-layer chars), running OCR on page 1",
                    document.name, text_layer_chars
                );
                vision::transcribe(&self.llm, &first_page_png, "image/png").await
            }
        }
    }
}

/// UTF-8 decode; invalid sequences become U+FFFD rather than failing.
fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
