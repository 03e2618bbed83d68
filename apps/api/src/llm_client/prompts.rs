// Shared prompt constants used by more than one pipeline stage.
// Each stage that needs LLM calls defines its own prompts.rs alongside it.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// System instruction for vision transcription of résumé images and scanned pages.
pub const TRANSCRIBE_SYSTEM: &str = "Extract all of the text in this résumé. \
    Return only the plain text content, preserving the section structure \
    (headings, entries, bullet order). Do not summarize, translate or comment.";

/// User turn that accompanies the image in a transcription request.
pub const TRANSCRIBE_REQUEST: &str = "Transcribe the text of this document.";
