//! Server-side session registry keyed by the `sid` cookie.

use crate::util::session::SessionId;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use hyper::StatusCode;
use model::{
    attempt::{self, Attempt, Outcome, Step},
    chat::Message,
    Category, Question,
};
use std::collections::HashMap;

/// What a tutor conversation outside the quiz is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    Post(i64),
    Material(i64),
}

/// Sessions untouched for this many seconds are evicted.
pub const IDLE_TIMEOUT_SECS: i64 = 2 * 60 * 60;

/// Quiz cursor plus everything shown or said about the questions so far.
#[derive(Debug)]
pub struct QuizState {
    pub attempt: Attempt,
    /// ID of the question under the cursor once it has been graded.
    pub graded: Option<i64>,
    /// Messages shown for the current question only.
    pub transcript: Vec<Message>,
    /// Tutor conversation shared by empathetic feedback and follow-ups.
    pub history: Vec<Message>,
    /// Correctness of every submission in this session, oldest first.
    pub outcomes: Vec<bool>,
}

impl QuizState {
    pub fn new(attempt: Attempt) -> Self {
        Self { attempt, graded: None, transcript: Vec::new(), history: Vec::new(), outcomes: Vec::new() }
    }

    pub fn restart(&mut self, category: Option<Category>, now: DateTime<Utc>) {
        self.attempt.restart(category, now);
        self.graded = None;
        self.transcript.clear();
    }

    /// Grades the choice and records the feedback in the transcript.
    pub fn submit(&mut self, question: &Question, choice: &str, now: DateTime<Utc>) -> Result<Outcome, attempt::Error> {
        let outcome = self.attempt.submit(question, choice, now)?;
        self.transcript.push(Message::ai(outcome.corrective));
        if let Some(learning) = &outcome.learning {
            self.transcript.push(Message::ai(learning.as_str()));
        }
        self.outcomes.push(outcome.correct);
        self.graded = Some(question.id);
        Ok(outcome)
    }

    /// Submits the choice, then describes it to the tutor along with the updated track record.
    pub fn grade(
        &mut self,
        question: &Question,
        choice: &str,
        now: DateTime<Utc>,
    ) -> Result<(Outcome, String), attempt::Error> {
        let outcome = self.submit(question, choice, now)?;
        Ok((outcome, self.learning_context(question, choice)))
    }

    /// Moves past a submitted question. The transcript is cleared only when a new question starts.
    pub fn advance(&mut self, total: u32, now: DateTime<Utc>) -> Result<Step, attempt::Error> {
        let step = self.attempt.advance(total, now)?;
        if let Step::Next(_) = step {
            self.graded = None;
            self.transcript.clear();
        }
        Ok(step)
    }

    /// Tutor input describing the graded submission and the session's track record.
    pub fn learning_context(&self, question: &Question, choice: &str) -> String {
        let history: Vec<_> = self.outcomes.iter().map(|&correct| if correct { "correct" } else { "wrong" }).collect();
        format!(
            "Question: {}, Choices: {}, Correct Answer: {}, Student Answer: {}, Learning History: [{}]",
            question.question.trim(),
            question.choices().join(", "),
            question.answer.trim(),
            choice.trim(),
            history.join(", "),
        )
    }
}

#[derive(Debug)]
pub struct Session {
    pub member: String,
    /// Whether the admin gate has been passed.
    pub admin: bool,
    pub quiz: QuizState,
    pub chats: HashMap<Topic, Vec<Message>>,
    pub last_seen: DateTime<Utc>,
}

impl Session {
    pub fn new(member: String, attempt: Attempt) -> Self {
        let last_seen = attempt.started_at;
        Self { member, admin: false, quiz: QuizState::new(attempt), chats: HashMap::new(), last_seen }
    }
}

#[derive(Default)]
pub struct Sessions(DashMap<SessionId, Session>);

impl Sessions {
    /// Registers the session under a fresh random ID.
    pub fn create(&self, session: Session) -> Result<SessionId, getrandom::Error> {
        loop {
            let id = SessionId::generate()?;
            if let Entry::Vacant(entry) = self.0.entry(id) {
                entry.insert(session);
                return Ok(id);
            }
        }
    }

    pub fn remove(&self, id: SessionId) -> Option<Session> {
        self.0.remove(&id).map(|(_, session)| session)
    }

    /// Runs the closure against the session and marks it as seen.
    /// The entry lock is released before returning.
    pub fn with<T>(&self, id: SessionId, f: impl FnOnce(&mut Session) -> T) -> Result<T, StatusCode> {
        let mut session = self.0.get_mut(&id).ok_or(StatusCode::UNAUTHORIZED)?;
        session.last_seen = Utc::now();
        Ok(f(&mut session))
    }

    /// Drops every session idle for longer than [`IDLE_TIMEOUT_SECS`]. Returns how many were dropped.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let mut evicted = 0;
        self.0.retain(|_, session| {
            let keep = now.signed_duration_since(session.last_seen).num_seconds() < IDLE_TIMEOUT_SECS;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }
}
