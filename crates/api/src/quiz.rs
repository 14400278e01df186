use crate::{
    from_db, parse_json,
    tutor::{self, Prompt, Tutor},
    util::{
        reply::{self, Reply},
        session::SessionId,
    },
    Portal,
};
use chrono::{DateTime, Utc};
use db::TryStreamExt;
use hyper::StatusCode;
use model::{
    activity::{Action, Event},
    attempt::{self, Outcome, Step},
    chat::Message,
    quiz::Prompt as QuestionView,
    Category, Question,
};
use serde::{Deserialize, Serialize};

fn from_attempt(err: attempt::Error) -> StatusCode {
    match err {
        attempt::Error::AlreadySubmitted | attempt::Error::NotSubmitted => StatusCode::CONFLICT,
        attempt::Error::UnknownChoice => StatusCode::BAD_REQUEST,
    }
}

/// Loads the deck for the category, ordered by question ID.
pub(crate) async fn load_deck(portal: &Portal, category: Option<Category>) -> Result<Vec<Question>, StatusCode> {
    portal.db.get_questions(category).await.map_err(from_db)?.try_collect().await.map_err(from_db)
}

fn deck_size(deck: &[Question]) -> Result<u32, StatusCode> {
    match u32::try_from(deck.len()) {
        Ok(0) => Err(StatusCode::NOT_FOUND),
        Ok(total) => Ok(total),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// The question under the cursor, after pulling the cursor back inside the deck.
fn current(portal: &Portal, sid: SessionId, deck: &[Question]) -> Result<(u32, usize), StatusCode> {
    let total = deck_size(deck)?;
    let position = portal.sessions.with(sid, |session| {
        session.quiz.attempt.clamp(total);
        session.quiz.attempt.position
    })?;
    let index = usize::try_from(position - 1).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok((position, index))
}

async fn record(portal: &Portal, event: Event) -> Result<(), StatusCode> {
    portal.db.log_event(&event).await.map_err(from_db)
}

#[derive(Deserialize)]
struct Start {
    #[serde(default)]
    category: Option<Category>,
}

pub fn try_start(portal: &Portal, sid: SessionId, body: &[u8]) -> Result<Reply, StatusCode> {
    let Start { category } = if body.is_empty() { Start { category: None } } else { parse_json(body)? };
    portal.sessions.with(sid, |session| session.quiz.restart(category, Utc::now()))?;
    Ok(reply::empty(StatusCode::NO_CONTENT))
}

pub async fn try_show(portal: &Portal, sid: SessionId) -> Result<Reply, StatusCode> {
    let (member, category) =
        portal.sessions.with(sid, |session| (session.member.clone(), session.quiz.attempt.category))?;
    let deck = load_deck(portal, category).await?;
    let (position, index) = current(portal, sid, &deck)?;
    portal.db.save_progress(&member, position, category).await.map_err(from_db)?;

    let (submitted, selected) =
        portal.sessions.with(sid, |session| (session.quiz.attempt.submitted, session.quiz.attempt.selected.clone()))?;
    let question = &deck[index];
    let view = QuestionView {
        position,
        total: deck_size(&deck)?,
        category: question.category,
        question: &question.question,
        choices: question.choices(),
        difficulty: question.difficulty,
        image_url: question.image_url.as_deref(),
        video_url: question.video_url.as_deref(),
        submitted,
        selected: selected.as_deref(),
    };
    reply::json(StatusCode::OK, &view)
}

#[derive(Deserialize)]
struct Choice {
    choice: String,
}

pub async fn try_select(portal: &Portal, sid: SessionId, body: &[u8]) -> Result<Reply, StatusCode> {
    let Choice { choice } = parse_json(body)?;
    let (member, category) =
        portal.sessions.with(sid, |session| (session.member.clone(), session.quiz.attempt.category))?;
    let deck = load_deck(portal, category).await?;
    let (position, index) = current(portal, sid, &deck)?;

    portal.sessions.with(sid, |session| session.quiz.attempt.select(&deck[index], &choice))?.map_err(from_attempt)?;
    let selected =
        Event::new(Utc::now(), &member, Action::SelectAnswer).on(position, deck[index].id).with_choice(choice.trim());
    record(portal, selected).await?;
    Ok(reply::empty(StatusCode::NO_CONTENT))
}

#[derive(Serialize)]
struct Graded<'a> {
    correct: bool,
    solving_time: f64,
    corrective: &'a str,
    learning: Option<&'a str>,
    empathy: Option<&'a str>,
    transcript: &'a [Message],
}

fn graded(outcome: &Outcome, empathy: Option<&str>, transcript: &[Message]) -> Result<Reply, StatusCode> {
    let graded = Graded {
        correct: outcome.correct,
        solving_time: outcome.solving_time,
        corrective: outcome.corrective,
        learning: outcome.learning.as_deref(),
        empathy,
        transcript,
    };
    reply::json(StatusCode::OK, &graded)
}

/// Asks the tutor to comfort the learner. Without a working tutor there is simply no reply.
async fn empathize(tutor: Option<&dyn Tutor>, history: &[Message], context: &str) -> Option<String> {
    match tutor?.reply(&Prompt::empathy(), history, context).await {
        Ok(text) => Some(text),
        Err(err) => {
            log::warn!("empathetic feedback unavailable: {err}");
            None
        }
    }
}

pub async fn try_submit(portal: &Portal, sid: SessionId, body: &[u8]) -> Result<Reply, StatusCode> {
    let Choice { choice } = parse_json(body)?;
    let (member, category) =
        portal.sessions.with(sid, |session| (session.member.clone(), session.quiz.attempt.category))?;
    let deck = load_deck(portal, category).await?;
    let (position, index) = current(portal, sid, &deck)?;
    let question = &deck[index];

    let now = Utc::now();
    let (outcome, context) =
        portal.sessions.with(sid, |session| session.quiz.grade(question, &choice, now))?.map_err(from_attempt)?;
    log::info!("{member} answered question {}: correct = {}", question.id, outcome.correct);

    let event = |at, action| Event::new(at, &member, action).on(position, question.id);
    let submitted =
        event(now, Action::SubmitAnswer).with_choice(choice.trim()).with_outcome(outcome.correct, outcome.solving_time);
    record(portal, submitted).await?;
    record(portal, event(now, Action::CorrectiveFeedback).with_content(outcome.corrective)).await?;
    if let Some(learning) = &outcome.learning {
        record(portal, event(now, Action::LearningFeedback).with_content(learning)).await?;
    }

    let history = portal.sessions.with(sid, |session| session.quiz.history.clone())?;
    let empathy = empathize(portal.tutor.as_deref(), &history, &context).await;
    if let Some(text) = &empathy {
        portal.sessions.with(sid, |session| {
            tutor::append_exchange(&mut session.quiz.history, &context, text);
            session.quiz.transcript.push(Message::ai(text.as_str()));
        })?;
        record(portal, event(Utc::now(), Action::EmpatheticFeedback).with_content(text)).await?;
    }

    let transcript = portal.sessions.with(sid, |session| session.quiz.transcript.clone())?;
    graded(&outcome, empathy.as_deref(), &transcript)
}

#[derive(Deserialize)]
struct FollowUp {
    question: String,
}

#[derive(Serialize)]
struct Answered<'a> {
    answer: &'a str,
    transcript: &'a [Message],
}

/// Follow-ups need a graded question first, then a tutor to answer them.
fn follow_up_tutor(graded: Option<i64>, tutor: Option<&dyn Tutor>) -> Result<(i64, &dyn Tutor), StatusCode> {
    let question = graded.ok_or(StatusCode::CONFLICT)?;
    let tutor = tutor.ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    Ok((question, tutor))
}

async fn answer_follow_up(tutor: &dyn Tutor, history: &[Message], question: &str) -> Result<String, StatusCode> {
    tutor.reply(&Prompt::follow_up(), history, question).await.map_err(|err| {
        log::warn!("follow-up answer unavailable: {err}");
        StatusCode::BAD_GATEWAY
    })
}

pub async fn try_follow_up(portal: &Portal, sid: SessionId, body: &[u8]) -> Result<Reply, StatusCode> {
    let FollowUp { question } = parse_json(body)?;
    let question = question.trim();
    if question.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let (member, position, graded, history) = portal.sessions.with(sid, |session| {
        let quiz = &session.quiz;
        (session.member.clone(), quiz.attempt.position, quiz.graded, quiz.history.clone())
    })?;
    let (id, tutor) = follow_up_tutor(graded, portal.tutor.as_deref())?;

    let event = |action| Event::new(Utc::now(), &member, action).on(position, id);
    record(portal, event(Action::FollowUpQuestion).with_content(question)).await?;
    let answer = answer_follow_up(tutor, &history, question).await?;
    record(portal, event(Action::FollowUpAnswer).with_content(&answer)).await?;

    let transcript = portal.sessions.with(sid, |session| {
        tutor::append_exchange(&mut session.quiz.history, question, &answer);
        session.quiz.transcript.push(Message::human(question));
        session.quiz.transcript.push(Message::ai(answer.as_str()));
        session.quiz.transcript.clone()
    })?;
    reply::json(StatusCode::OK, &Answered { answer: &answer, transcript: &transcript })
}

#[derive(Serialize)]
struct Advanced {
    finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<u32>,
}

/// The event logged after moving past the question at `position`.
fn step_event(now: DateTime<Utc>, member: &str, deck: &[Question], position: u32, step: Step) -> Option<Event> {
    let (action, position) = match step {
        Step::Finished => (Action::End, position),
        Step::Next(next) => (Action::StartQuestion, next),
    };
    let question = deck.get(usize::try_from(position).ok()?.checked_sub(1)?)?;
    Some(Event::new(now, member, action).on(position, question.id))
}

pub async fn try_next(portal: &Portal, sid: SessionId) -> Result<Reply, StatusCode> {
    let (member, category) =
        portal.sessions.with(sid, |session| (session.member.clone(), session.quiz.attempt.category))?;
    let deck = load_deck(portal, category).await?;
    let (position, _) = current(portal, sid, &deck)?;
    let total = deck_size(&deck)?;

    let now = Utc::now();
    let step = portal.sessions.with(sid, |session| session.quiz.advance(total, now))?.map_err(from_attempt)?;
    let event = step_event(now, &member, &deck, position, step).ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    let advanced = match step {
        Step::Finished => {
            log::info!("{member} finished the deck");
            Advanced { finished: true, position: None }
        }
        Step::Next(next) => {
            portal.db.save_progress(&member, next, category).await.map_err(from_db)?;
            Advanced { finished: false, position: Some(next) }
        }
    };
    record(portal, event).await?;
    reply::json(StatusCode::OK, &advanced)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_errors_map_to_statuses() {
        assert_eq!(from_attempt(attempt::Error::AlreadySubmitted), StatusCode::CONFLICT);
        assert_eq!(from_attempt(attempt::Error::NotSubmitted), StatusCode::CONFLICT);
        assert_eq!(from_attempt(attempt::Error::UnknownChoice), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn empty_deck_is_not_found() {
        assert_eq!(deck_size(&[]), Err(StatusCode::NOT_FOUND));
    }

    #[test]
    fn start_body_is_optional() {
        let Start { category } = parse_json(br#"{"category":"dizziness"}"#).unwrap();
        assert_eq!(category, Some(Category::Dizziness));
        let Start { category } = parse_json(b"{}").unwrap();
        assert_eq!(category, None);
    }

    use crate::{
        sessions::QuizState,
        tutor::tests::{Echo, Offline},
    };
    use chrono::TimeZone;
    use http_body_util::BodyExt;
    use model::attempt::Attempt;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn question(id: i64) -> Question {
        Question {
            id,
            category: Category::Stroke,
            question: format!("Which artery? ({id})"),
            choices: String::from("MCA, PCA, ACA"),
            answer: String::from("MCA"),
            feedback: Vec::new(),
            difficulty: 2,
            image_url: None,
            video_url: None,
            author: String::from("Yoon"),
            created_at: at(0),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empathy_sees_the_graded_answer() {
        let mut quiz = QuizState::new(Attempt::new(1, None, at(0)));
        let (outcome, context) = quiz.grade(&question(7), "PCA", at(3)).unwrap();
        assert!(!outcome.correct);

        let tutor = Echo::default();
        let empathy = empathize(Some(&tutor), &quiz.history, &context).await;
        assert_eq!(empathy, Some(format!("echo: {context}")));
        let (prompt, _, input) = tutor.asked.lock().unwrap().remove(0);
        assert_eq!(prompt.temperature, 0.9);
        assert!(input.ends_with("Learning History: [wrong]"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn submission_survives_a_failing_tutor() {
        let mut quiz = QuizState::new(Attempt::new(1, None, at(0)));
        let (outcome, context) = quiz.grade(&question(7), "MCA", at(3)).unwrap();
        assert_eq!(empathize(Some(&Offline), &quiz.history, &context).await, None);
        assert_eq!(empathize(None, &quiz.history, &context).await, None);

        let res = graded(&outcome, None, &quiz.transcript).unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["correct"], true);
        assert!(json["empathy"].is_null());
        assert_eq!(json["transcript"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn follow_ups_wait_for_grading_and_a_tutor() {
        let tutor = Echo::default();
        assert_eq!(follow_up_tutor(None, Some(&tutor)).err(), Some(StatusCode::CONFLICT));
        assert_eq!(follow_up_tutor(None, None).err(), Some(StatusCode::CONFLICT));
        assert_eq!(follow_up_tutor(Some(7), None).err(), Some(StatusCode::SERVICE_UNAVAILABLE));

        let (id, tutor) = follow_up_tutor(Some(7), Some(&tutor)).unwrap();
        assert_eq!(id, 7);
        assert_eq!(answer_follow_up(tutor, &[], "Why not PCA?").await, Ok(String::from("echo: Why not PCA?")));
        assert_eq!(answer_follow_up(&Offline, &[], "Why not PCA?").await, Err(StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn last_question_logs_the_end() {
        let deck = [question(30), question(41)];
        let mut quiz = QuizState::new(Attempt::new(2, None, at(0)));
        quiz.grade(&deck[1], "MCA", at(1)).unwrap();
        let step = quiz.advance(2, at(2)).unwrap();
        assert_eq!(step, Step::Finished);

        let end = step_event(at(2), "Kim", &deck, 2, step).unwrap();
        assert_eq!((end.action, end.position, end.question), (Action::End, Some(2), Some(41)));
    }

    #[test]
    fn advancing_logs_the_next_question() {
        let deck = [question(30), question(41)];
        let start = step_event(at(2), "Kim", &deck, 1, Step::Next(2)).unwrap();
        assert_eq!((start.action, start.position, start.question), (Action::StartQuestion, Some(2), Some(41)));
        assert!(step_event(at(2), "Kim", &deck, 2, Step::Next(3)).is_none());
    }
}
