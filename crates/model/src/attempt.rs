//! The learner's cursor through the question deck. A question is shown, a
//! choice may be selected any number of times, then submitted exactly once;
//! only a submitted question lets the cursor advance.

use crate::{Category, DateTime, Question, Utc};
use alloc::string::String;
use core::fmt;

pub const CORRECT: &str = "Correct! Well done.";
pub const INCORRECT: &str = "Not quite. Shall we take another look?";

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    AlreadySubmitted,
    NotSubmitted,
    UnknownChoice,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AlreadySubmitted => "this question has already been answered",
            Self::NotSubmitted => "submit an answer first",
            Self::UnknownChoice => "the selection is not one of the choices",
        })
    }
}

/// Result of grading a submission.
#[derive(Debug, PartialEq)]
pub struct Outcome {
    pub correct: bool,
    pub solving_time: f64,
    pub corrective: &'static str,
    pub learning: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Moved on to the given position.
    Next(u32),
    /// The submitted question was the last one of the deck.
    Finished,
}

#[derive(Clone, Debug)]
pub struct Attempt {
    /// One-based deck position.
    pub position: u32,
    pub category: Option<Category>,
    pub started_at: DateTime<Utc>,
    pub selected: Option<String>,
    pub submitted: bool,
}

impl Attempt {
    pub fn new(position: u32, category: Option<Category>, now: DateTime<Utc>) -> Self {
        Self { position: position.max(1), category, started_at: now, selected: None, submitted: false }
    }

    /// Starts over from the first question of a (possibly different) deck.
    pub fn restart(&mut self, category: Option<Category>, now: DateTime<Utc>) {
        *self = Self::new(1, category, now);
    }

    /// Pulls the position back inside a deck of `total` questions.
    pub fn clamp(&mut self, total: u32) {
        self.position = self.position.min(total).max(1);
    }

    pub fn select(&mut self, question: &Question, choice: &str) -> Result<(), Error> {
        if self.submitted {
            return Err(Error::AlreadySubmitted);
        }
        question.choice_index(choice).ok_or(Error::UnknownChoice)?;
        self.selected = Some(choice.trim().into());
        Ok(())
    }

    pub fn submit(&mut self, question: &Question, choice: &str, now: DateTime<Utc>) -> Result<Outcome, Error> {
        if self.submitted {
            return Err(Error::AlreadySubmitted);
        }
        question.choice_index(choice).ok_or(Error::UnknownChoice)?;

        self.selected = Some(choice.trim().into());
        self.submitted = true;

        let correct = question.is_correct(choice);
        let millis = now.signed_duration_since(self.started_at).num_milliseconds().max(0);
        Ok(Outcome {
            correct,
            solving_time: millis as f64 / 1000.0,
            corrective: if correct { CORRECT } else { INCORRECT },
            learning: question.feedback_for(choice).map(String::from),
        })
    }

    pub fn advance(&mut self, total: u32, now: DateTime<Utc>) -> Result<Step, Error> {
        if !self.submitted {
            return Err(Error::NotSubmitted);
        }
        if self.position >= total {
            return Ok(Step::Finished);
        }
        *self = Self::new(self.position + 1, self.category, now);
        Ok(Step::Next(self.position))
    }
}
