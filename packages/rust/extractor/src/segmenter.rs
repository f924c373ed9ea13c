//! Question block segmentation: a single pass over paragraphs that opens a
//! draft on every numbered stem, collects lettered options, and folds wrapped
//! lines back into the option they belong to.

use std::future::Future;

use quizbank_shared::{ExtractedQuestion, ExtractorConfig, Result};
use tracing::{debug, instrument};

use crate::document::Paragraph;

/// Turns an image reference found in the document into a remote URL.
///
/// Implementations locate the file and upload it. Any error aborts the
/// whole document.
pub trait ImageResolver: Send + Sync {
    fn resolve(&self, src: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Classification knobs for the segmenter.
#[derive(Debug, Clone)]
pub struct SegmentRules {
    /// Literal prefixes that open an option line.
    pub option_prefixes: Vec<String>,
    /// Separator between options in the finished `options` string.
    pub options_separator: String,
}

impl From<&ExtractorConfig> for SegmentRules {
    fn from(config: &ExtractorConfig) -> Self {
        Self {
            option_prefixes: config.option_prefixes.clone(),
            options_separator: config.options_separator.clone(),
        }
    }
}

impl Default for SegmentRules {
    fn default() -> Self {
        Self::from(&ExtractorConfig::default())
    }
}

/// The in-progress question. At most one is open at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionDraft {
    pub question_text: Option<String>,
    pub options: Vec<String>,
    pub correct_answer: Option<char>,
    pub image_ref: Option<String>,
}

impl QuestionDraft {
    fn open(stem: &str) -> Self {
        Self {
            question_text: Some(stem.to_string()),
            ..Self::default()
        }
    }

    /// Close the draft. Drafts without a stem produce nothing.
    pub fn finish(self, separator: &str) -> Option<ExtractedQuestion> {
        let text = self.question_text.filter(|t| !t.is_empty())?;
        Some(ExtractedQuestion {
            text,
            options: self.options.join(separator),
            true_answer: self.correct_answer.map(String::from),
            image: self.image_ref,
        })
    }
}

/// What a trimmed paragraph line means.
#[derive(Debug, PartialEq, Eq)]
enum LineKind {
    Question,
    Option,
    Continuation,
}

fn classify(text: &str, rules: &SegmentRules) -> LineKind {
    let starts_with_digit = text.chars().next().is_some_and(|c| c.is_ascii_digit());
    if starts_with_digit && text.contains('.') {
        LineKind::Question
    } else if rules
        .option_prefixes
        .iter()
        .any(|p| text.starts_with(p.as_str()))
    {
        LineKind::Option
    } else {
        LineKind::Continuation
    }
}

/// Segment `paragraphs` into finished questions, in document order.
#[instrument(skip_all, fields(paragraphs = paragraphs.len()))]
pub async fn segment<R: ImageResolver>(
    paragraphs: &[Paragraph],
    rules: &SegmentRules,
    resolver: &R,
) -> Result<Vec<ExtractedQuestion>> {
    let mut questions = Vec::new();
    let mut draft = QuestionDraft::default();

    for paragraph in paragraphs {
        let text = paragraph.text.trim();
        if text.is_empty() {
            continue;
        }

        if let Some(src) = &paragraph.image_src {
            draft.image_ref = Some(resolver.resolve(src).await?);
        }

        match classify(text, rules) {
            LineKind::Question => {
                let finished = std::mem::replace(&mut draft, QuestionDraft::open(text));
                questions.extend(finished.finish(&rules.options_separator));
            }
            LineKind::Option => {
                draft.options.push(text.to_string());
                if paragraph.marked_correct {
                    draft.correct_answer = text.chars().next();
                }
            }
            LineKind::Continuation => match draft.options.last_mut() {
                Some(last) => {
                    last.push(' ');
                    last.push_str(text);
                }
                None => debug!(text, "dropping text outside any option"),
            },
        }
    }

    questions.extend(draft.finish(&rules.options_separator));
    debug!(count = questions.len(), "segmented questions");
    Ok(questions)
}
