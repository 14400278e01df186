use crate::{
    conference::{converse, Ask, Content, Created},
    from_db, parse_json,
    sessions::Topic,
    tutor::Prompt,
    util::{
        query,
        reply::{self, Reply},
        session::SessionId,
    },
    Portal,
};
use hyper::StatusCode;
use model::{material::count_by_kind, TestKind};
use serde::Serialize;

pub async fn try_list(portal: &Portal, sid: SessionId, params: &str) -> Result<Reply, StatusCode> {
    portal.member(sid)?;
    let category = query::parse_param::<TestKind>(params, "category").map_err(|_| StatusCode::BAD_REQUEST)?;
    let materials = portal.db.get_materials(category).await.map_err(from_db)?;
    reply::json(StatusCode::OK, &materials)
}

#[derive(Debug, PartialEq, Serialize)]
struct Count {
    category: TestKind,
    label: &'static str,
    count: usize,
}

fn counts(materials: &[model::material::Material]) -> Vec<Count> {
    count_by_kind(materials)
        .into_iter()
        .map(|(category, count)| Count { category, label: category.label(), count })
        .collect()
}

pub async fn try_counts(portal: &Portal, sid: SessionId) -> Result<Reply, StatusCode> {
    portal.member(sid)?;
    let materials = portal.db.get_materials(None).await.map_err(from_db)?;
    reply::json(StatusCode::OK, &counts(&materials))
}

pub async fn try_comments(portal: &Portal, sid: SessionId, material: i64) -> Result<Reply, StatusCode> {
    portal.member(sid)?;
    let comments = portal.db.get_comments(material).await.map_err(from_db)?;
    reply::json(StatusCode::OK, &comments)
}

pub async fn try_comment(portal: &Portal, sid: SessionId, material: i64, body: &[u8]) -> Result<Reply, StatusCode> {
    let member = portal.member(sid)?;
    let Content { content, parent } = parse_json(body)?;
    let content = content.trim();
    if content.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let id = portal.db.create_comment(material, &member, content, parent).await.map_err(from_db)?;
    log::info!("{member} commented on material {material}");
    reply::json(StatusCode::CREATED, &Created { id })
}

pub async fn try_uncomment(portal: &Portal, sid: SessionId, comment: i64) -> Result<Reply, StatusCode> {
    let member = portal.member(sid)?;
    portal.db.delete_comment(comment, &member).await.map_err(from_db)?;
    log::info!("{member} deleted comment {comment}");
    Ok(reply::empty(StatusCode::NO_CONTENT))
}

pub async fn try_chat(portal: &Portal, sid: SessionId, material: i64, body: &[u8]) -> Result<Reply, StatusCode> {
    portal.member(sid)?;
    let Ask { question } = parse_json(body)?;
    let question = question.trim();
    if question.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    portal.tutor()?;
    let material = portal.db.get_material(material).await.map_err(from_db)?;
    converse(portal, sid, Topic::Material(material.id), Prompt::material(&material.context()), question).await
}

pub fn try_clear_chat(portal: &Portal, sid: SessionId, material: i64) -> Result<Reply, StatusCode> {
    portal.sessions.with(sid, |session| session.chats.remove(&Topic::Material(material)))?;
    Ok(reply::empty(StatusCode::NO_CONTENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_include_empty_kinds() {
        let counts = counts(&[]);
        assert_eq!(counts.len(), TestKind::ALL.len());
        assert!(counts.iter().all(|count| count.count == 0));
        assert_eq!(counts[0], Count { category: TestKind::Ncs, label: TestKind::Ncs.label(), count: 0 });

        let json = serde_json::to_value(&counts[0]).unwrap();
        assert_eq!(json["category"], "ncs");
    }
}
