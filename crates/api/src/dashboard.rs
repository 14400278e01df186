use crate::{
    from_db,
    quiz::load_deck,
    util::{
        reply::{self, Reply},
        session::SessionId,
    },
    Portal,
};
use hyper::StatusCode;
use model::{dashboard::QuestionInfo, Question};

fn question_info(questions: &[Question]) -> Vec<QuestionInfo> {
    questions
        .iter()
        .map(|question| QuestionInfo {
            id: question.id,
            question: question.question.clone(),
            difficulty: question.difficulty,
        })
        .collect()
}

pub async fn try_respond(portal: &Portal, sid: SessionId) -> Result<Reply, StatusCode> {
    let member = portal.member(sid)?;
    let events = portal.db.get_events(&member).await.map_err(from_db)?;
    // Events may come from any category deck.
    let questions = load_deck(portal, None).await?;
    let dashboard = model::dashboard::summarize(&events, &question_info(&questions));
    reply::json(StatusCode::OK, &dashboard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use model::Category;

    #[test]
    fn info_is_keyed_by_question_id() {
        let question = |id, difficulty| Question {
            id,
            category: Category::Dementia,
            question: format!("q{id}"),
            choices: String::from("a, b"),
            answer: String::from("a"),
            feedback: Vec::new(),
            difficulty,
            image_url: None,
            video_url: None,
            author: String::from("Yoon"),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        };
        let info = question_info(&[question(10, 2), question(12, 5)]);
        assert_eq!(info.len(), 2);
        assert_eq!((info[0].id, info[0].question.as_str(), info[0].difficulty), (10, "q10", 2));
        assert_eq!((info[1].id, info[1].difficulty), (12, 5));
    }
}
