mod admin;
mod conference;
mod dashboard;
mod material;
mod quiz;
mod register;

pub mod sessions;
pub mod tutor;
pub mod upload;

mod util {
    pub mod query;
    pub mod reply;
    pub mod session;
}

use db::Database;
use hyper::{body::Bytes, HeaderMap, Method, StatusCode};
use model::roster::Roster;
use serde::Deserialize;
use sessions::Sessions;
use tutor::Tutor;
use upload::Uploader;
use util::session::SessionId;

pub use util::reply::{empty, Reply};

/// Shared state behind every request.
pub struct Portal {
    db: Database,
    roster: Roster,
    sessions: Sessions,
    tutor: Option<Box<dyn Tutor>>,
    uploader: Option<Uploader>,
}

fn from_db(err: db::error::Error) -> StatusCode {
    use db::error::Error;
    match err {
        Error::NotFound => StatusCode::NOT_FOUND,
        Error::BadInput => StatusCode::BAD_REQUEST,
        Error::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn parse_json<'de, T: Deserialize<'de>>(body: &'de [u8]) -> Result<T, StatusCode> {
    serde_json::from_slice(body).map_err(|_| StatusCode::BAD_REQUEST)
}

fn parse_id(segment: &str) -> Result<i64, StatusCode> {
    segment.parse().map_err(|_| StatusCode::NOT_FOUND)
}

/// Admin routes other than the gate itself need an unlocked session.
fn check_admin(sessions: &Sessions, sid: SessionId, segments: &[&str]) -> Result<(), StatusCode> {
    match segments {
        ["admin", "session"] => Ok(()),
        ["admin", ..] if !sessions.with(sid, |session| session.admin)? => Err(StatusCode::FORBIDDEN),
        _ => Ok(()),
    }
}

impl Portal {
    pub fn new(db: Database, roster: Roster) -> Self {
        Self { db, roster, sessions: Sessions::default(), tutor: None, uploader: None }
    }

    pub fn with_tutor(mut self, tutor: impl Tutor + 'static) -> Self {
        self.tutor = Some(Box::new(tutor));
        self
    }

    pub fn with_uploader(mut self, uploader: Uploader) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Drops idle sessions. Returns how many were dropped.
    pub fn evict_idle_sessions(&self) -> usize {
        self.sessions.evict_idle(chrono::Utc::now())
    }

    fn tutor(&self) -> Result<&dyn Tutor, StatusCode> {
        self.tutor.as_deref().ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }

    fn member(&self, sid: SessionId) -> Result<String, StatusCode> {
        self.sessions.with(sid, |session| session.member.clone())
    }

    /// Routes the request to its handler.
    pub async fn try_respond(
        &self,
        method: &Method,
        path: &str,
        query: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Reply, StatusCode> {
        let segments: Vec<_> = path.split('/').filter(|segment| !segment.is_empty()).collect();

        // Public routes
        if let (&Method::POST, ["register"]) = (method, segments.as_slice()) {
            return register::try_register(self, &body).await;
        }

        let sid = util::session::extract_session(headers)?;
        check_admin(&self.sessions, sid, &segments)?;

        match (method, segments.as_slice()) {
            (&Method::POST, ["logout"]) => register::try_logout(self, sid),

            // Quiz
            (&Method::POST, ["quiz", "start"]) => quiz::try_start(self, sid, &body),
            (&Method::GET, ["quiz"]) => quiz::try_show(self, sid).await,
            (&Method::POST, ["quiz", "select"]) => quiz::try_select(self, sid, &body).await,
            (&Method::POST, ["quiz", "submit"]) => quiz::try_submit(self, sid, &body).await,
            (&Method::POST, ["quiz", "follow-up"]) => quiz::try_follow_up(self, sid, &body).await,
            (&Method::POST, ["quiz", "next"]) => quiz::try_next(self, sid).await,
            (&Method::GET, ["dashboard"]) => dashboard::try_respond(self, sid).await,

            // Morning conference
            (&Method::GET, ["conference"]) => conference::try_list(self, sid).await,
            (&Method::GET, ["conference", id, "replies"]) => conference::try_replies(self, sid, parse_id(id)?).await,
            (&Method::POST, ["conference", id, "replies"]) => {
                conference::try_reply(self, sid, parse_id(id)?, &body).await
            }
            (&Method::POST, ["conference", id, "chat"]) => conference::try_chat(self, sid, parse_id(id)?, &body).await,
            (&Method::DELETE, ["conference", id, "chat"]) => conference::try_clear_chat(self, sid, parse_id(id)?),

            // Study materials
            (&Method::GET, ["materials"]) => material::try_list(self, sid, query).await,
            (&Method::GET, ["materials", "counts"]) => material::try_counts(self, sid).await,
            (&Method::GET, ["materials", id, "comments"]) => material::try_comments(self, sid, parse_id(id)?).await,
            (&Method::POST, ["materials", id, "comments"]) => {
                material::try_comment(self, sid, parse_id(id)?, &body).await
            }
            (&Method::DELETE, ["comments", id]) => material::try_uncomment(self, sid, parse_id(id)?).await,
            (&Method::POST, ["materials", id, "chat"]) => material::try_chat(self, sid, parse_id(id)?, &body).await,
            (&Method::DELETE, ["materials", id, "chat"]) => material::try_clear_chat(self, sid, parse_id(id)?),

            // Administration
            (&Method::POST, ["admin", "session"]) => admin::try_unlock(self, sid, &body),
            (&Method::DELETE, ["admin", "session"]) => admin::try_lock(self, sid),
            (&Method::GET, ["admin", "questions"]) => admin::try_list_questions(self, query).await,
            (&Method::POST, ["admin", "questions"]) => admin::try_create_question(self, sid, &body).await,
            (&Method::PUT, ["admin", "questions", id]) => admin::try_update_question(self, parse_id(id)?, &body).await,
            (&Method::DELETE, ["admin", "questions", id]) => admin::try_delete_question(self, parse_id(id)?).await,
            (&Method::POST, ["admin", "conference"]) => admin::try_create_post(self, sid, &body).await,
            (&Method::PUT, ["admin", "conference", id]) => admin::try_update_post(self, parse_id(id)?, &body).await,
            (&Method::DELETE, ["admin", "conference", id]) => admin::try_delete_post(self, parse_id(id)?).await,
            (&Method::POST, ["admin", "materials"]) => admin::try_create_material(self, sid, &body).await,
            (&Method::PUT, ["admin", "materials", id]) => admin::try_update_material(self, parse_id(id)?, &body).await,
            (&Method::DELETE, ["admin", "materials", id]) => admin::try_delete_material(self, parse_id(id)?).await,
            (&Method::POST, ["admin", "uploads"]) => admin::try_upload(self, headers, &body).await,

            _ => Err(StatusCode::NOT_FOUND),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_errors_map_to_statuses() {
        assert_eq!(from_db(db::error::Error::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(from_db(db::error::Error::BadInput), StatusCode::BAD_REQUEST);
        assert_eq!(from_db(db::error::Error::Fatal), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn ids_must_be_numeric() {
        assert_eq!(parse_id("42"), Ok(42));
        assert_eq!(parse_id("abc"), Err(StatusCode::NOT_FOUND));
    }

    #[test]
    fn admin_routes_need_an_unlocked_session() {
        use chrono::Utc;
        use crate::sessions::Session;
        use model::attempt::Attempt;

        let sessions = Sessions::default();
        let sid = sessions.create(Session::new("Yoon".into(), Attempt::new(1, None, Utc::now()))).unwrap();
        assert_eq!(check_admin(&sessions, sid, &["admin", "questions"]), Err(StatusCode::FORBIDDEN));
        assert_eq!(check_admin(&sessions, sid, &["admin", "materials", "3"]), Err(StatusCode::FORBIDDEN));
        assert_eq!(check_admin(&sessions, sid, &["admin", "session"]), Ok(()));
        assert_eq!(check_admin(&sessions, sid, &["quiz", "submit"]), Ok(()));

        sessions.with(sid, |session| session.admin = true).unwrap();
        assert_eq!(check_admin(&sessions, sid, &["admin", "questions"]), Ok(()));

        let stranger = SessionId::generate().unwrap();
        assert_eq!(check_admin(&sessions, stranger, &["admin", "questions"]), Err(StatusCode::UNAUTHORIZED));
        assert_eq!(check_admin(&sessions, stranger, &["dashboard"]), Ok(()));
    }

    #[test]
    fn json_bodies_must_parse() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Choice<'a> {
            choice: &'a str,
        }
        assert_eq!(parse_json::<Choice>(br#"{"choice":"MCA"}"#), Ok(Choice { choice: "MCA" }));
        assert_eq!(parse_json::<Choice>(b"choice=MCA"), Err(StatusCode::BAD_REQUEST));
    }
}
