use crate::{media, Category, DateTime, Utc};
use alloc::{string::String, vec::Vec};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Most choices (and therefore feedback slots) a question may have.
pub const MAX_CHOICES: usize = 5;

/// Splits a comma-delimited choice list into trimmed, non-empty choices.
pub fn parse_choices(raw: &str) -> Vec<&str> {
    raw.split(',').map(str::trim).filter(|choice| !choice.is_empty()).collect()
}

/// A stored quiz question.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Question {
    pub id: i64,
    pub category: Category,
    pub question: String,
    /// Comma-delimited choices, as the author typed them.
    pub choices: String,
    /// Must equal one of the choices after trimming.
    pub answer: String,
    /// Feedback shown when the choice at the same index is selected.
    pub feedback: Vec<String>,
    pub difficulty: u8,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn choices(&self) -> Vec<&str> {
        parse_choices(&self.choices)
    }

    /// Compares a selection with the answer, ignoring surrounding whitespace.
    pub fn is_correct(&self, selected: &str) -> bool {
        selected.trim() == self.answer.trim()
    }

    /// Index of the selection among the choices, if it is one of them.
    pub fn choice_index(&self, selected: &str) -> Option<usize> {
        let selected = selected.trim();
        self.choices().into_iter().position(|choice| choice == selected)
    }

    /// Learning feedback attached to the selected choice. Blank feedback counts as missing.
    pub fn feedback_for(&self, selected: &str) -> Option<&str> {
        let index = self.choice_index(selected)?;
        self.feedback.get(index).map(String::as_str).map(str::trim).filter(|text| !text.is_empty())
    }
}

/// The learner's view of a question: everything but the answer and feedback.
#[derive(Debug, Serialize)]
pub struct Prompt<'q> {
    pub position: u32,
    pub total: u32,
    pub category: Category,
    pub question: &'q str,
    pub choices: Vec<&'q str>,
    pub difficulty: u8,
    pub image_url: Option<&'q str>,
    pub video_url: Option<&'q str>,
    pub submitted: bool,
    pub selected: Option<&'q str>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Invalid {
    EmptyQuestion,
    TooFewChoices,
    TooManyChoices,
    AnswerNotAChoice,
    TooMuchFeedback,
    Difficulty,
}

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EmptyQuestion => "question text must not be empty",
            Self::TooFewChoices => "a question needs at least two choices",
            Self::TooManyChoices => "a question may have at most five choices",
            Self::AnswerNotAChoice => "the answer must match one of the choices",
            Self::TooMuchFeedback => "there are more feedback entries than choices",
            Self::Difficulty => "difficulty must be between 1 and 5",
        })
    }
}

fn default_difficulty() -> u8 {
    3
}

/// Admin input for creating or replacing a question.
#[derive(Clone, Debug, Deserialize)]
pub struct Draft {
    pub category: Category,
    pub question: String,
    pub choices: String,
    pub answer: String,
    #[serde(default)]
    pub feedback: Vec<String>,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

impl Draft {
    pub fn validate(&self) -> Result<(), Invalid> {
        if self.question.trim().is_empty() {
            return Err(Invalid::EmptyQuestion);
        }

        let choices = parse_choices(&self.choices);
        if choices.len() < 2 {
            return Err(Invalid::TooFewChoices);
        }
        if choices.len() > MAX_CHOICES {
            return Err(Invalid::TooManyChoices);
        }
        if !choices.contains(&self.answer.trim()) {
            return Err(Invalid::AnswerNotAChoice);
        }
        if self.feedback.len() > choices.len() {
            return Err(Invalid::TooMuchFeedback);
        }
        if !(1..=5).contains(&self.difficulty) {
            return Err(Invalid::Difficulty);
        }

        Ok(())
    }

    pub fn image_url(&self) -> Option<&str> {
        media::normalize_url(self.image_url.as_deref())
    }

    pub fn video_url(&self) -> Option<&str> {
        media::normalize_url(self.video_url.as_deref())
    }
}
