use crate::{
    from_db, parse_json,
    sessions::Topic,
    tutor::{self, Prompt},
    util::{
        reply::{self, Reply},
        session::SessionId,
    },
    Portal,
};
use hyper::StatusCode;
use model::{
    chat::Message,
    conference::{Post, Reply as PostReply},
    DateTime, Utc,
};
use serde::{Deserialize, Serialize};

/// A post as shown to learners, with its image list already parsed.
#[derive(Debug, Serialize)]
struct PostView<'p> {
    id: i64,
    author: &'p str,
    content_above: &'p str,
    content_below: &'p str,
    images: Vec<&'p str>,
    video_url: Option<&'p str>,
    created_at: DateTime<Utc>,
}

impl<'p> From<&'p Post> for PostView<'p> {
    fn from(post: &'p Post) -> Self {
        Self {
            id: post.id,
            author: &post.author,
            content_above: &post.content_above,
            content_below: &post.content_below,
            images: post.images(),
            video_url: model::media::normalize_url(post.video_url.as_deref()),
            created_at: post.created_at,
        }
    }
}

pub async fn try_list(portal: &Portal, sid: SessionId) -> Result<Reply, StatusCode> {
    portal.member(sid)?;
    let posts = portal.db.get_posts().await.map_err(from_db)?;
    let views: Vec<_> = posts.iter().map(PostView::from).collect();
    reply::json(StatusCode::OK, &views)
}

pub async fn try_replies(portal: &Portal, sid: SessionId, post: i64) -> Result<Reply, StatusCode> {
    portal.member(sid)?;
    let replies: Vec<PostReply> = portal.db.get_replies(post).await.map_err(from_db)?;
    reply::json(StatusCode::OK, &replies)
}

#[derive(Deserialize)]
pub(crate) struct Content {
    pub(crate) content: String,
    #[serde(default)]
    pub(crate) parent: Option<i64>,
}

#[derive(Serialize)]
pub(crate) struct Created {
    pub(crate) id: i64,
}

pub async fn try_reply(portal: &Portal, sid: SessionId, post: i64, body: &[u8]) -> Result<Reply, StatusCode> {
    let member = portal.member(sid)?;
    let Content { content, .. } = parse_json(body)?;
    let content = content.trim();
    if content.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let id = portal.db.create_reply(post, &member, content).await.map_err(from_db)?;
    log::info!("{member} replied to post {post}");
    reply::json(StatusCode::CREATED, &Created { id })
}

#[derive(Deserialize)]
pub(crate) struct Ask {
    pub(crate) question: String,
}

#[derive(Serialize)]
pub(crate) struct Conversation<'a> {
    pub(crate) answer: &'a str,
    pub(crate) history: &'a [Message],
}

/// Asks the tutor about a topic and records the exchange in the session.
pub(crate) async fn converse(
    portal: &Portal,
    sid: SessionId,
    topic: Topic,
    prompt: Prompt,
    question: &str,
) -> Result<Reply, StatusCode> {
    let tutor = portal.tutor()?;
    let history = portal.sessions.with(sid, |session| session.chats.get(&topic).cloned().unwrap_or_default())?;
    let answer = tutor.reply(&prompt, &history, question).await.map_err(|err| {
        log::warn!("tutor unavailable for {topic:?}: {err}");
        StatusCode::BAD_GATEWAY
    })?;

    let history = portal.sessions.with(sid, |session| {
        let chat = session.chats.entry(topic).or_default();
        tutor::append_exchange(chat, question, &answer);
        chat.clone()
    })?;
    reply::json(StatusCode::OK, &Conversation { answer: &answer, history: &history })
}

pub async fn try_chat(portal: &Portal, sid: SessionId, post: i64, body: &[u8]) -> Result<Reply, StatusCode> {
    portal.member(sid)?;
    let Ask { question } = parse_json(body)?;
    let question = question.trim();
    if question.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    portal.tutor()?;
    let post = portal.db.get_post(post).await.map_err(from_db)?;
    converse(portal, sid, Topic::Post(post.id), Prompt::case(&post.context()), question).await
}

pub fn try_clear_chat(portal: &Portal, sid: SessionId, post: i64) -> Result<Reply, StatusCode> {
    portal.sessions.with(sid, |session| session.chats.remove(&Topic::Post(post)))?;
    Ok(reply::empty(StatusCode::NO_CONTENT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn view_filters_media() {
        let post = Post {
            id: 3,
            author: String::from("Yoon"),
            content_above: String::from("68F, ptosis worse at night"),
            content_below: String::new(),
            image_urls: String::from("https://i.ibb.co/a.png,None"),
            video_url: Some(String::from("nan")),
            created_at: Utc.with_ymd_and_hms(2025, 3, 3, 7, 0, 0).unwrap(),
        };
        let view = PostView::from(&post);
        assert_eq!(view.images, ["https://i.ibb.co/a.png"]);
        assert_eq!(view.video_url, None);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["content_above"], "68F, ptosis worse at night");
        assert!(json.get("image_urls").is_none());
    }

    #[test]
    fn content_parent_is_optional() {
        let Content { content, parent } = parse_json(br#"{"content":"MG?"}"#).unwrap();
        assert_eq!((content.as_str(), parent), ("MG?", None));
        let Content { parent, .. } = parse_json(br#"{"content":"agreed","parent":9}"#).unwrap();
        assert_eq!(parent, Some(9));
    }
}
