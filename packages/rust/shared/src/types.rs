//! Core domain types for quizbank question records and users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

/// A finished question as it comes out of the extractor, before it is
/// attributed to an owner and a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedQuestion {
    /// The full stem, including its leading number (e.g. `1. What is 2+2?`).
    pub text: String,
    /// All option lines joined with the configured separator.
    pub options: String,
    /// Letter of the correct option, if the document marked one.
    pub true_answer: Option<String>,
    /// Remote URL of the attached image.
    pub image: Option<String>,
}

/// A question ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuestion {
    #[serde(flatten)]
    pub question: ExtractedQuestion,
    pub category: String,
    pub subject: String,
    /// Owning user.
    pub user_id: i64,
}

impl NewQuestion {
    /// Attribute an extracted question to its owner and grouping.
    pub fn new(question: ExtractedQuestion, category: &str, subject: &str, user_id: i64) -> Self {
        Self {
            question,
            category: category.to_string(),
            subject: subject.to_string(),
            user_id,
        }
    }
}

/// A stored question row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: i64,
    pub text: String,
    pub options: String,
    pub true_answer: Option<String>,
    pub image: Option<String>,
    pub category: String,
    pub subject: String,
    pub user_id: i64,
}

/// The public projection of a question returned by the list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: i64,
    pub category: String,
    pub subject: String,
    pub text: String,
    pub options: String,
    pub true_answer: Option<String>,
    pub image: Option<String>,
}

impl From<QuestionRecord> for QuestionView {
    fn from(record: QuestionRecord) -> Self {
        Self {
            id: record.id,
            category: record.category,
            subject: record.subject,
            text: record.text,
            options: record.options,
            true_answer: record.true_answer,
            image: record.image,
        }
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// A registered account. The password hash never leaves the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Bearer token handed out on login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
}

impl AccessToken {
    pub fn bearer(token: String) -> Self {
        Self {
            access_token: token,
            token_type: "bearer".into(),
        }
    }
}
