use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id prefix marking a question that came out of the importer and has not
/// been persisted yet. The bulk-save step allocates a storage id for these.
pub const NEW_QUESTION_PREFIX: &str = "q_new_";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Question {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Question {
            id: String::new(),
            title: title.into(),
            description: description.into(),
            difficulty: None,
            category: None,
            tags: None,
            example: None,
            constraints: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Fresh placeholder id for a question produced by the importer.
    /// Unique within a batch and recognizable by [`Question::is_unsaved`].
    pub fn new_import_id() -> String {
        format!("{}{}", NEW_QUESTION_PREFIX, Uuid::new_v4())
    }

    /// True when the question has no storage id yet and the save step must
    /// allocate one instead of upserting by the existing id.
    pub fn is_unsaved(&self) -> bool {
        self.id.is_empty() || self.id.starts_with(NEW_QUESTION_PREFIX)
    }
}

/// Prepare a batch of questions for storage: placeholder ids from the
/// importer get a fresh storage id, existing ids are kept for upsert, and
/// both timestamps are stamped.
pub fn prepare_for_save(questions: Vec<Question>, now: DateTime<Utc>) -> Vec<Question> {
    questions
        .into_iter()
        .map(|mut question| {
            if question.is_unsaved() {
                question.id = Uuid::new_v4().to_string();
            }
            question.created_at = Some(now);
            question.updated_at = Some(now);
            question
        })
        .collect()
}

/// The question pinned to a calendar date. Created lazily on the first
/// request of the day and never reassigned afterwards.
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DailyAssignment {
    /// Date key in `YYYY-MM-DD` form.
    pub date: String,
    pub question_id: String,
    pub assigned_at: DateTime<Utc>,
    pub question: Question,
}
