//! Typed records for scraped jobs and generated proposals.
//!
//! Scraped attributes arrive from the page boundary already shaped into
//! [`JobDetails`]; the policy filter and the record store only ever see
//! this struct, never a loose string map. Money and percentage fields
//! stay as the raw scraped text (`"$12.3k"`, `"75%"`) because parsing
//! them is a filter concern with its own failure semantics.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Attribute snapshot of one discovered job posting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDetails {
    /// Canonical link to the posting; the record key.
    pub job_url: String,
    /// Posting title.
    #[serde(default)]
    pub title: String,
    /// Full description text.
    #[serde(default)]
    pub summary: String,
    /// Raw client spend text, e.g. `"$12.3k"` or `"N/A"`.
    #[serde(default)]
    pub total_spent: String,
    /// Whether the client's payment method is verified.
    #[serde(default)]
    pub payment_verified: bool,
    /// Whether this account meets the posting's qualifications.
    #[serde(default = "default_true")]
    pub qualified: bool,
    /// Duration class badge, e.g. `"duration1"`.
    #[serde(default)]
    pub duration_type: String,
    /// `"Hourly"` or `"Fixed Price"`.
    #[serde(default)]
    pub job_type: String,
    /// Raw rate text, e.g. `"$25"` or `"$15-$30"`.
    #[serde(default)]
    pub hourly_rate: String,
    /// Raw hire-rate text, e.g. `"80% hire rate"`.
    #[serde(default)]
    pub hire_rate: String,
    /// Comma-joined skill tags.
    #[serde(default)]
    pub skills: String,
    /// Client location text.
    #[serde(default)]
    pub client_location: String,
    /// Client membership date text.
    #[serde(default)]
    pub member_since: String,
}

/// One client question on a bid form, with the generated answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    /// Question text exactly as posed by the client.
    pub question: String,
    /// Generated answer to paste into the matching textarea.
    pub answer: String,
}

/// A generated proposal ready to submit for one job.
///
/// Produced by the external proposal pipeline and stored on the job's
/// record under the `proposal` field; the apply session only consumes
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Cover letter for the primary free-text field.
    pub cover_letter: String,
    /// Itemized question/answer pairs, possibly empty.
    #[serde(default)]
    pub questions_and_answers: Vec<QuestionAnswer>,
}

impl Proposal {
    /// Returns question/answer pairs keyed by normalized question text.
    ///
    /// Questions are matched against page labels by exact text after
    /// stripping a leading `"N. "` ordinal, which the site prepends and
    /// the generator sometimes echoes.
    #[must_use]
    pub fn answers_by_question(&self) -> std::collections::HashMap<String, String> {
        self.questions_and_answers
            .iter()
            .map(|qa| {
                (
                    normalize_question(&qa.question),
                    qa.answer.trim().to_string(),
                )
            })
            .collect()
    }
}

/// Strips a leading `"N. "` ordinal and surrounding whitespace.
#[must_use]
pub fn normalize_question(question: &str) -> String {
    let trimmed = question.trim();
    let without_ordinal = trimmed
        .split_once(". ")
        .filter(|(prefix, _)| !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()))
        .map_or(trimmed, |(_, rest)| rest);
    without_ordinal.trim().to_string()
}
