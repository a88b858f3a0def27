//! Prompts for the language-model and vision stages.
//!
//! Every prompt lives here so a wording change touches one file, and so
//! unit tests can inspect prompts without a model.
//!
//! Documents are mostly English or Bahasa Indonesia, and the prompts say so:
//! a small local model corrects Indonesian far better when told to expect it.

/// System prompt for the `summary` stage (summarise and correct).
pub const SUMMARIZE_SYSTEM_PROMPT: &str = r#"You are a helpful assistant that processes documents. Your tasks are:
1. Correct any spelling and grammar errors (especially for Bahasa Indonesia and English)
2. Reformat the markdown if needed for better readability
3. Summarize the content into concise, well-structured paragraphs
4. Maintain the original meaning and important details

Output only the corrected and summarized content in markdown format."#;

/// System prompt for the `correction` stage (correct without summarising).
pub const CORRECT_SYSTEM_PROMPT: &str = r#"You are a helpful assistant that corrects documents. Your tasks are:
1. Correct any spelling and grammar errors (especially for Bahasa Indonesia and English)
2. Reformat the markdown if needed for better readability
3. Maintain all original content without summarizing

Output only the corrected content in markdown format."#;

/// System prompt for the `title` stage.
pub const TITLE_SYSTEM_PROMPT: &str = r#"You are a helpful assistant that generates concise document titles. Your task is to:
1. Read the document content carefully
2. Identify the main topic and purpose
3. Generate a clear, descriptive title (max 10-15 words)
4. Output ONLY the title without any additional text or formatting

For documents in Bahasa Indonesia, provide the title in Bahasa Indonesia.
For documents in English, provide the title in English."#;

/// System prompt for OCR of one page image through a vision model.
pub const TRANSCRIBE_SYSTEM_PROMPT: &str = r#"You are an OCR engine. Transcribe the text of this page image into clean Markdown.

Rules:
- Preserve ALL text in reading order; do not summarise or translate
- Use # / ## / ### for visible headings, - and 1. for lists
- Convert tables to GFM pipe tables
- Ignore page numbers and repeated headers/footers
- Output ONLY the Markdown: no ```markdown fences, no commentary
- If the page has no readable text, output nothing"#;

/// Stop sequences applied to every generation.
pub const DEFAULT_STOP: &[&str] = &["<|im_end|>", "<|endoftext|>"];

/// Stop sequences for title generation: a title never spans a blank line.
pub const TITLE_STOP: &[&str] = &["<|im_end|>", "<|endoftext|>", "\n\n"];

/// Marker appended when a document is cut to fit the prompt budget.
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated...]";

/// User turn for the summary stage.
pub fn summarize_prompt(document: &str) -> String {
    format!("Process this document:\n\n{document}")
}

/// User turn for the correction stage.
pub fn correct_prompt(document: &str) -> String {
    format!("Correct this document:\n\n{document}")
}

/// User turn for the title stage.
pub fn title_prompt(document: &str) -> String {
    format!("Generate a title for this document:\n\n{document}")
}
