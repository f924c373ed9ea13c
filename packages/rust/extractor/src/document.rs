//! Flattening of a question document into owned paragraph records.
//!
//! `scraper::Html` is not `Send`, so the tree is walked once up front and
//! dropped before the segmenter starts awaiting image uploads.

use quizbank_shared::{ExtractorConfig, ParagraphMatch};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::red_class::find_red_class;

/// Predicate deciding which `<p>` elements carry question content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphFilter {
    mode: ParagraphMatch,
    class: String,
}

impl ParagraphFilter {
    /// Accept paragraphs with any class starting with `prefix`.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            mode: ParagraphMatch::Prefix,
            class: prefix.into(),
        }
    }

    /// Accept paragraphs carrying exactly `class`.
    pub fn exact(class: impl Into<String>) -> Self {
        Self {
            mode: ParagraphMatch::Exact,
            class: class.into(),
        }
    }

    /// Whether `el` should be fed to the segmenter.
    pub fn matches(&self, el: &ElementRef) -> bool {
        el.value().classes().any(|c| match self.mode {
            ParagraphMatch::Prefix => c.starts_with(&self.class),
            ParagraphMatch::Exact => c == self.class,
        })
    }
}

impl From<&ExtractorConfig> for ParagraphFilter {
    fn from(config: &ExtractorConfig) -> Self {
        Self {
            mode: config.paragraph_match,
            class: config.paragraph_class.clone(),
        }
    }
}

impl Default for ParagraphFilter {
    fn default() -> Self {
        Self::from(&ExtractorConfig::default())
    }
}

/// One candidate paragraph, reduced to what the segmenter needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    /// Visible text, trimmed.
    pub text: String,
    /// `src` of the first embedded image.
    pub image_src: Option<String>,
    /// The paragraph or one of its descendants carries the red class.
    pub marked_correct: bool,
}

/// A document reduced to its red class and candidate paragraphs.
#[derive(Debug, Clone, Default)]
pub struct QuestionDocument {
    pub red_class: Option<String>,
    pub paragraphs: Vec<Paragraph>,
}

/// Parse `html` and flatten the paragraphs accepted by `filter`.
pub fn read_document(html: &str, filter: &ParagraphFilter) -> QuestionDocument {
    let doc = Html::parse_document(html);
    let red_class = find_red_class(&doc);
    debug!(red_class = ?red_class, "resolved red class");

    let p_sel = Selector::parse("p").expect("valid selector");
    let img_sel = Selector::parse("img").expect("valid selector");

    let paragraphs = doc
        .select(&p_sel)
        .filter(|p| filter.matches(p))
        .map(|p| Paragraph {
            text: p.text().collect::<String>().trim().to_string(),
            image_src: p
                .select(&img_sel)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(str::to_string),
            marked_correct: red_class
                .as_deref()
                .is_some_and(|red| carries_class(&p, red)),
        })
        .collect();

    QuestionDocument {
        red_class,
        paragraphs,
    }
}

/// `el` itself or any element below it has `class`.
fn carries_class(el: &ElementRef, class: &str) -> bool {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .any(|e| e.value().classes().any(|c| c == class))
}
