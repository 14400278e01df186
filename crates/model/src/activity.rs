use crate::{DateTime, Utc};
use alloc::string::String;
use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};

/// Something a learner did (or was shown) during the quiz.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Register,
    StartQuestion,
    SelectAnswer,
    SubmitAnswer,
    CorrectiveFeedback,
    LearningFeedback,
    EmpatheticFeedback,
    FollowUpQuestion,
    FollowUpAnswer,
    End,
}

impl Action {
    pub const ALL: [Self; 10] = [
        Self::Register,
        Self::StartQuestion,
        Self::SelectAnswer,
        Self::SubmitAnswer,
        Self::CorrectiveFeedback,
        Self::LearningFeedback,
        Self::EmpatheticFeedback,
        Self::FollowUpQuestion,
        Self::FollowUpAnswer,
        Self::End,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::StartQuestion => "start_question",
            Self::SelectAnswer => "select_answer",
            Self::SubmitAnswer => "submit_answer",
            Self::CorrectiveFeedback => "corrective_feedback",
            Self::LearningFeedback => "learning_feedback",
            Self::EmpatheticFeedback => "empathetic_feedback",
            Self::FollowUpQuestion => "follow_up_question",
            Self::FollowUpAnswer => "follow_up_answer",
            Self::End => "end",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownAction;

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown activity action")
    }
}

impl FromStr for Action {
    type Err = UnknownAction;
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|action| action.as_str() == text).ok_or(UnknownAction)
    }
}

/// One row of the activity log.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Event {
    pub at: DateTime<Utc>,
    pub member: String,
    /// Deck position the event refers to, if any. Positions restart in every category deck.
    pub position: Option<u32>,
    /// ID of the question the event refers to, if any.
    pub question: Option<i64>,
    pub action: Action,
    pub choice: Option<String>,
    pub correct: Option<bool>,
    /// Seconds between the question being shown and the answer being submitted.
    pub solving_time: Option<f64>,
    pub content: Option<String>,
}

impl Event {
    pub fn new(at: DateTime<Utc>, member: &str, action: Action) -> Self {
        Self {
            at,
            member: member.into(),
            position: None,
            question: None,
            action,
            choice: None,
            correct: None,
            solving_time: None,
            content: None,
        }
    }

    /// Ties the event to the question shown at the deck position.
    pub fn on(mut self, position: u32, question: i64) -> Self {
        self.position = Some(position);
        self.question = Some(question);
        self
    }

    pub fn with_choice(mut self, choice: &str) -> Self {
        self.choice = Some(choice.into());
        self
    }

    pub fn with_outcome(mut self, correct: bool, solving_time: f64) -> Self {
        self.correct = Some(correct);
        self.solving_time = Some(solving_time);
        self
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = Some(content.into());
        self
    }
}
