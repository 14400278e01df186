//! Folds a member's activity log into per-question summaries and the
//! aggregate figures shown on the learning dashboard.

use crate::activity::{Action, Event};
use alloc::{collections::BTreeMap, string::String, vec::Vec};
use serde::Serialize;

/// What the dashboard needs to know about a question.
#[derive(Clone, Debug)]
pub struct QuestionInfo {
    pub id: i64,
    pub question: String,
    pub difficulty: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FollowUp {
    pub question: String,
    pub answer: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuestionSummary {
    pub question_id: i64,
    /// Deck position the question was answered at.
    pub position: Option<u32>,
    pub question: Option<String>,
    pub difficulty: Option<u8>,
    /// Solving time of the first submission.
    pub solving_time: Option<f64>,
    /// Correctness of the first submission.
    pub correct: Option<bool>,
    /// Selections made up to (and including the moment of) the first submission.
    pub selections: usize,
    pub asked_follow_up: bool,
    /// The most recent learning feedback shown.
    pub learning_feedback: Option<String>,
    pub follow_ups: Vec<FollowUp>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Breakdown {
    pub difficulty: Option<u8>,
    pub questions: usize,
    pub mean_solving_time: Option<f64>,
    pub accuracy: Option<f64>,
    pub follow_up_ratio: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dashboard {
    pub overall: Breakdown,
    pub by_difficulty: Vec<Breakdown>,
    pub questions: Vec<QuestionSummary>,
    /// Questions answered wrong.
    pub wrong: Vec<i64>,
    /// Questions answered right after changing the selection more than once.
    pub confused: Vec<i64>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / f64::from(count))
}

fn summarize_question(id: i64, events: &[&Event], info: Option<&QuestionInfo>) -> QuestionSummary {
    let submit = events.iter().find(|event| event.action == Action::SubmitAnswer);
    let position = submit.or_else(|| events.first()).and_then(|event| event.position);
    let selections = events
        .iter()
        .filter(|event| event.action == Action::SelectAnswer)
        .filter(|event| submit.map_or(true, |submit| event.at <= submit.at))
        .count();

    let learning_feedback = events
        .iter()
        .rev()
        .find(|event| event.action == Action::LearningFeedback)
        .and_then(|event| event.content.clone());

    let follow_ups: Vec<_> = events
        .iter()
        .filter(|event| event.action == Action::FollowUpQuestion)
        .map(|asked| {
            let answer = events
                .iter()
                .find(|event| event.action == Action::FollowUpAnswer && event.at >= asked.at)
                .and_then(|event| event.content.clone())
                .unwrap_or_default();
            FollowUp { question: asked.content.clone().unwrap_or_default(), answer }
        })
        .collect();

    QuestionSummary {
        question_id: id,
        position,
        question: info.map(|info| info.question.clone()),
        difficulty: info.map(|info| info.difficulty),
        solving_time: submit.and_then(|event| event.solving_time),
        correct: submit.and_then(|event| event.correct),
        selections,
        asked_follow_up: !follow_ups.is_empty(),
        learning_feedback,
        follow_ups,
    }
}

fn breakdown(difficulty: Option<u8>, summaries: &[&QuestionSummary]) -> Breakdown {
    let share = |flag: bool| if flag { 1.0 } else { 0.0 };
    Breakdown {
        difficulty,
        questions: summaries.len(),
        mean_solving_time: mean(summaries.iter().filter_map(|summary| summary.solving_time)),
        // Unsubmitted questions do not count towards accuracy.
        accuracy: mean(summaries.iter().filter_map(|summary| summary.correct).map(share)),
        follow_up_ratio: mean(summaries.iter().map(|summary| share(summary.asked_follow_up))),
    }
}

/// Builds the dashboard from a member's events (any order) and the known questions.
pub fn summarize(events: &[Event], known: &[QuestionInfo]) -> Dashboard {
    let mut by_question = BTreeMap::<i64, Vec<&Event>>::new();
    for event in events {
        if let Some(id) = event.question {
            by_question.entry(id).or_default().push(event);
        }
    }

    let questions: Vec<_> = by_question
        .into_iter()
        .map(|(id, mut events)| {
            events.sort_by_key(|event| event.at);
            let info = known.iter().find(|info| info.id == id);
            summarize_question(id, &events, info)
        })
        .collect();

    let mut by_difficulty = BTreeMap::<Option<u8>, Vec<&QuestionSummary>>::new();
    for summary in &questions {
        by_difficulty.entry(summary.difficulty).or_default().push(summary);
    }

    let all: Vec<_> = questions.iter().collect();
    let overall = breakdown(None, &all);
    let by_difficulty = by_difficulty.into_iter().map(|(difficulty, group)| breakdown(difficulty, &group)).collect();

    let wrong =
        questions.iter().filter(|summary| summary.correct == Some(false)).map(|summary| summary.question_id).collect();
    let confused = questions
        .iter()
        .filter(|summary| summary.correct == Some(true) && summary.selections > 1)
        .map(|summary| summary.question_id)
        .collect();

    Dashboard { overall, by_difficulty, questions, wrong, confused }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DateTime, Utc};
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    /// Question IDs are `10 + position`.
    fn event(secs: i64, position: u32, action: Action) -> Event {
        Event::new(at(secs), "Kim", action).on(position, 10 + i64::from(position))
    }

    fn known() -> Vec<QuestionInfo> {
        vec![
            QuestionInfo { id: 11, question: String::from("q1"), difficulty: 1 },
            QuestionInfo { id: 12, question: String::from("q2"), difficulty: 3 },
            QuestionInfo { id: 13, question: String::from("q3"), difficulty: 3 },
        ]
    }

    fn log() -> Vec<Event> {
        vec![
            Event::new(at(0), "Kim", Action::Register),
            // Question 1: two selections, correct, one follow-up.
            event(1, 1, Action::SelectAnswer).with_choice("a"),
            event(2, 1, Action::SelectAnswer).with_choice("b"),
            event(3, 1, Action::SubmitAnswer).with_choice("b").with_outcome(true, 10.0),
            event(4, 1, Action::LearningFeedback).with_content("b is right"),
            event(5, 1, Action::FollowUpQuestion).with_content("why not a?"),
            event(6, 1, Action::FollowUpAnswer).with_content("because"),
            // Question 2: wrong on the first try.
            event(11, 2, Action::SubmitAnswer).with_choice("c").with_outcome(false, 20.0),
            event(10, 2, Action::SelectAnswer).with_choice("c"),
            event(12, 2, Action::LearningFeedback).with_content("c is a distractor"),
            // Question 3: follow-up never answered, nothing submitted.
            event(20, 3, Action::FollowUpQuestion).with_content("hint?"),
            event(21, 3, Action::SelectAnswer),
        ]
    }

    #[test]
    fn summarizes_each_question() {
        let dashboard = summarize(&log(), &known());
        let [first, second, third] = dashboard.questions.as_slice() else { panic!("expected three questions") };

        assert_eq!(first.selections, 2);
        assert_eq!(first.correct, Some(true));
        assert_eq!(first.solving_time, Some(10.0));
        assert_eq!(first.learning_feedback.as_deref(), Some("b is right"));
        assert_eq!(first.follow_ups, [FollowUp { question: String::from("why not a?"), answer: String::from("because") }]);

        assert_eq!(second.selections, 1);
        assert_eq!(second.correct, Some(false));
        assert_eq!(second.difficulty, Some(3));
        assert!(!second.asked_follow_up);

        assert_eq!(third.correct, None);
        assert_eq!(third.selections, 1);
        assert_eq!(third.follow_ups[0].answer, "");
        assert!(third.asked_follow_up);
    }

    #[test]
    fn aggregates_overall_and_by_difficulty() {
        let dashboard = summarize(&log(), &known());
        assert_eq!(dashboard.overall.questions, 3);
        assert_eq!(dashboard.overall.mean_solving_time, Some(15.0));
        assert_eq!(dashboard.overall.accuracy, Some(0.5));
        assert_eq!(dashboard.by_difficulty.len(), 2);

        let hard = &dashboard.by_difficulty[1];
        assert_eq!(hard.difficulty, Some(3));
        assert_eq!(hard.questions, 2);
        assert_eq!(hard.accuracy, Some(0.0));
        assert_eq!(hard.follow_up_ratio, Some(0.5));
    }

    #[test]
    fn flags_wrong_and_confused_questions() {
        let dashboard = summarize(&log(), &known());
        assert_eq!(dashboard.wrong, [12]);
        assert_eq!(dashboard.confused, [11]);
    }

    #[test]
    fn empty_log_yields_empty_dashboard() {
        let dashboard = summarize(&[], &known());
        assert!(dashboard.questions.is_empty());
        assert_eq!(dashboard.overall.accuracy, None);
        assert_eq!(dashboard.overall.follow_up_ratio, None);
        assert!(dashboard.by_difficulty.is_empty());
    }

    #[test]
    fn questions_missing_from_the_bank_have_no_metadata() {
        let dashboard = summarize(&[event(0, 9, Action::SubmitAnswer).with_outcome(true, 1.0)], &known());
        assert_eq!(dashboard.questions[0].question, None);
        assert_eq!(dashboard.by_difficulty[0].difficulty, None);
    }

    #[test]
    fn same_position_in_different_decks_stays_apart() {
        let stroke = Event::new(at(0), "Kim", Action::SubmitAnswer).on(1, 21).with_outcome(false, 4.0);
        let epilepsy = Event::new(at(60), "Kim", Action::SubmitAnswer).on(1, 35).with_outcome(true, 6.0);
        let known = [
            QuestionInfo { id: 21, question: String::from("stroke q1"), difficulty: 2 },
            QuestionInfo { id: 35, question: String::from("epilepsy q1"), difficulty: 4 },
        ];

        let dashboard = summarize(&[epilepsy, stroke], &known);
        let [first, second] = dashboard.questions.as_slice() else { panic!("expected two questions") };
        assert_eq!((first.question_id, first.position, first.correct), (21, Some(1), Some(false)));
        assert_eq!(first.question.as_deref(), Some("stroke q1"));
        assert_eq!((second.question_id, second.correct), (35, Some(true)));
        assert_eq!(second.question.as_deref(), Some("epilepsy q1"));
        assert_eq!(dashboard.wrong, [21]);
        assert_eq!(dashboard.overall.accuracy, Some(0.5));
    }
}
