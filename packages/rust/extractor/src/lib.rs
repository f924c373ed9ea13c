//! HTML question extraction.
//!
//! Reads a quiz document exported from a word processor and turns its
//! paragraphs into [`ExtractedQuestion`]s:
//! - [`red_class`]: finds the class the document uses to paint the correct option red
//! - [`document`]: flattens the candidate paragraphs into owned records
//! - [`segmenter`]: the paragraph state machine producing finished questions

pub mod document;
pub mod red_class;
pub mod segmenter;

use quizbank_shared::{ExtractedQuestion, ExtractorConfig, Result};
use tracing::{info, instrument};

pub use document::{Paragraph, ParagraphFilter, QuestionDocument, read_document};
pub use red_class::{find_red_class, find_red_class_in_css};
pub use segmenter::{ImageResolver, QuestionDraft, SegmentRules, segment};

/// Extract every question from `html` using the rules in `config`.
///
/// Images are handed to `resolver` as they are encountered; the first
/// failure aborts extraction.
#[instrument(skip_all, fields(html_len = html.len()))]
pub async fn extract_questions<R: ImageResolver>(
    html: &str,
    config: &ExtractorConfig,
    resolver: &R,
) -> Result<Vec<ExtractedQuestion>> {
    let document = read_document(html, &ParagraphFilter::from(config));
    info!(
        red_class = document.red_class.as_deref().unwrap_or("<none>"),
        paragraphs = document.paragraphs.len(),
        "read question document"
    );
    segment(&document.paragraphs, &SegmentRules::from(config), resolver).await
}
