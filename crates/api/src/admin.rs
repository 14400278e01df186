use crate::{
    conference::Created,
    from_db, parse_json,
    util::{
        query,
        reply::{self, Reply},
        session::SessionId,
    },
    Portal,
};
use core::fmt::Display;
use db::TryStreamExt;
use hyper::{HeaderMap, StatusCode};
use model::{conference, material, quiz, Category, Question};
use serde::{Deserialize, Serialize};

/// Header carrying the original file name of an uploaded image.
pub const FILE_NAME: &str = "x-file-name";

#[derive(Deserialize)]
struct Passcode {
    name: String,
    code: String,
}

pub fn try_unlock(portal: &Portal, sid: SessionId, body: &[u8]) -> Result<Reply, StatusCode> {
    let Passcode { name, code } = parse_json(body)?;
    let admin = portal.roster.verify_admin(name.trim(), code.trim()).is_some();
    let member = portal.sessions.with(sid, |session| {
        session.admin = admin;
        session.member.clone()
    })?;

    if !admin {
        log::warn!("{member} failed to unlock the admin pages");
        return Err(StatusCode::UNAUTHORIZED);
    }

    log::info!("{member} unlocked the admin pages as {}", name.trim());
    Ok(reply::empty(StatusCode::NO_CONTENT))
}

pub fn try_lock(portal: &Portal, sid: SessionId) -> Result<Reply, StatusCode> {
    portal.sessions.with(sid, |session| session.admin = false)?;
    Ok(reply::empty(StatusCode::NO_CONTENT))
}

fn reject(err: impl Display) -> StatusCode {
    log::warn!("rejected admin input: {err}");
    StatusCode::BAD_REQUEST
}

pub async fn try_list_questions(portal: &Portal, params: &str) -> Result<Reply, StatusCode> {
    let category = query::parse_param::<Category>(params, "category").map_err(|_| StatusCode::BAD_REQUEST)?;
    let questions: Vec<Question> =
        portal.db.get_questions(category).await.map_err(from_db)?.try_collect().await.map_err(from_db)?;
    reply::json(StatusCode::OK, &questions)
}

fn parse_question(body: &[u8]) -> Result<quiz::Draft, StatusCode> {
    let draft: quiz::Draft = parse_json(body)?;
    draft.validate().map_err(reject)?;
    Ok(draft)
}

pub async fn try_create_question(portal: &Portal, sid: SessionId, body: &[u8]) -> Result<Reply, StatusCode> {
    let author = portal.member(sid)?;
    let draft = parse_question(body)?;
    let id = portal.db.create_question(&author, &draft).await.map_err(from_db)?;
    log::info!("{author} created question {id}");
    reply::json(StatusCode::CREATED, &Created { id })
}

pub async fn try_update_question(portal: &Portal, id: i64, body: &[u8]) -> Result<Reply, StatusCode> {
    let draft = parse_question(body)?;
    portal.db.update_question(id, &draft).await.map_err(from_db)?;
    log::info!("updated question {id}");
    Ok(reply::empty(StatusCode::NO_CONTENT))
}

pub async fn try_delete_question(portal: &Portal, id: i64) -> Result<Reply, StatusCode> {
    portal.db.delete_question(id).await.map_err(from_db)?;
    log::info!("deleted question {id}");
    Ok(reply::empty(StatusCode::NO_CONTENT))
}

fn parse_post(body: &[u8]) -> Result<conference::Draft, StatusCode> {
    let draft: conference::Draft = parse_json(body)?;
    draft.validate().map_err(reject)?;
    Ok(draft)
}

pub async fn try_create_post(portal: &Portal, sid: SessionId, body: &[u8]) -> Result<Reply, StatusCode> {
    let author = portal.member(sid)?;
    let draft = parse_post(body)?;
    let id = portal.db.create_post(&author, &draft).await.map_err(from_db)?;
    log::info!("{author} created post {id}");
    reply::json(StatusCode::CREATED, &Created { id })
}

pub async fn try_update_post(portal: &Portal, id: i64, body: &[u8]) -> Result<Reply, StatusCode> {
    let draft = parse_post(body)?;
    portal.db.update_post(id, &draft).await.map_err(from_db)?;
    log::info!("updated post {id}");
    Ok(reply::empty(StatusCode::NO_CONTENT))
}

pub async fn try_delete_post(portal: &Portal, id: i64) -> Result<Reply, StatusCode> {
    portal.db.delete_post(id).await.map_err(from_db)?;
    log::info!("deleted post {id}");
    Ok(reply::empty(StatusCode::NO_CONTENT))
}

fn parse_material(body: &[u8]) -> Result<material::Draft, StatusCode> {
    let draft: material::Draft = parse_json(body)?;
    draft.validate().map_err(reject)?;
    Ok(draft)
}

pub async fn try_create_material(portal: &Portal, sid: SessionId, body: &[u8]) -> Result<Reply, StatusCode> {
    let author = portal.member(sid)?;
    let draft = parse_material(body)?;
    let id = portal.db.create_material(&author, &draft).await.map_err(from_db)?;
    log::info!("{author} created material {id}");
    reply::json(StatusCode::CREATED, &Created { id })
}

pub async fn try_update_material(portal: &Portal, id: i64, body: &[u8]) -> Result<Reply, StatusCode> {
    let draft = parse_material(body)?;
    portal.db.update_material(id, &draft).await.map_err(from_db)?;
    log::info!("updated material {id}");
    Ok(reply::empty(StatusCode::NO_CONTENT))
}

pub async fn try_delete_material(portal: &Portal, id: i64) -> Result<Reply, StatusCode> {
    portal.db.delete_material(id).await.map_err(from_db)?;
    log::info!("deleted material {id}");
    Ok(reply::empty(StatusCode::NO_CONTENT))
}

#[derive(Serialize)]
struct Uploaded {
    url: String,
}

fn file_name(headers: &HeaderMap) -> Result<&str, StatusCode> {
    headers
        .get(FILE_NAME)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(StatusCode::BAD_REQUEST)
}

pub async fn try_upload(portal: &Portal, headers: &HeaderMap, body: &[u8]) -> Result<Reply, StatusCode> {
    let uploader = portal.uploader.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    let name = file_name(headers)?;
    if body.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let url = uploader.upload(name, body).await.map_err(|err| {
        log::warn!("upload of {name:?} failed: {err}");
        StatusCode::BAD_GATEWAY
    })?;
    log::info!("uploaded {name:?} to {url}");
    reply::json(StatusCode::CREATED, &Uploaded { url })
}
