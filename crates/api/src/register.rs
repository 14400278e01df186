use crate::{
    from_db, parse_json,
    sessions::Session,
    util::{
        reply::{self, Reply},
        session::{SessionId, EXPIRED_COOKIE},
    },
    Portal,
};
use chrono::{DateTime, Utc};
use hyper::StatusCode;
use model::{
    activity::{Action, Event},
    attempt::Attempt,
    progress::Progress,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct Credentials {
    name: String,
    /// Last four digits of the phone number.
    phone: String,
}

#[derive(Debug, Serialize)]
struct Registered<'m> {
    user: &'m str,
    /// Whether the member may unlock the admin pages.
    admin: bool,
    /// Deck position the quiz resumes at, if any.
    resume: Option<u32>,
}

/// Picks up where the member left off if their progress is recent enough.
fn resume_attempt(progress: Option<&Progress>, now: DateTime<Utc>) -> (Attempt, Option<u32>) {
    match progress.and_then(|progress| Some((progress.resumable(now)?, progress.category))) {
        Some((position, category)) => (Attempt::new(position, category, now), Some(position)),
        None => (Attempt::new(1, None, now), None),
    }
}

pub async fn try_register(portal: &Portal, body: &[u8]) -> Result<Reply, StatusCode> {
    let Credentials { name, phone } = parse_json(body)?;
    let member = portal.roster.verify(name.trim(), phone.trim()).ok_or_else(|| {
        log::warn!("rejected registration attempt for {name:?}");
        StatusCode::UNAUTHORIZED
    })?;

    let now = Utc::now();
    portal.db.log_event(&Event::new(now, &member.name, Action::Register)).await.map_err(from_db)?;

    let progress = portal.db.get_progress(&member.name).await.map_err(from_db)?;
    let (attempt, resume) = resume_attempt(progress.as_ref(), now);

    let sid = portal.sessions.create(Session::new(member.name.clone(), attempt)).map_err(|err| {
        log::error!("cannot generate session ID: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    log::info!("{} registered (resume: {resume:?})", member.name);

    let res = reply::json(StatusCode::CREATED, &Registered { user: &member.name, admin: member.admin, resume })?;
    reply::with_cookie(res, &sid.to_cookie())
}

pub fn try_logout(portal: &Portal, sid: SessionId) -> Result<Reply, StatusCode> {
    let session = portal.sessions.remove(sid).ok_or(StatusCode::UNAUTHORIZED)?;
    log::info!("{} logged out", session.member);
    reply::with_cookie(reply::empty(StatusCode::NO_CONTENT), EXPIRED_COOKIE)
}
