#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod error;

use alloc::vec::Vec;
use core::str::FromStr;
use model::{
    activity::{Action, Event},
    conference::{self, Post, Reply},
    material::{self, Comment, Material},
    progress::Progress,
    quiz::{self, Question},
    Category, TestKind,
};
use tokio_postgres::Row;

pub use futures_util::{TryStream, TryStreamExt};
pub use tokio_postgres::{tls::NoTls, Client, Config};

/// Table definitions applied by [`Database::migrate`].
pub const SCHEMA: &str = include_str!("../schema.sql");

pub struct Database(Client);

impl From<Client> for Database {
    fn from(client: Client) -> Self {
        Self(client)
    }
}

fn parse_slug<T: FromStr>(slug: &str) -> error::Result<T> {
    slug.parse().map_err(|_| {
        log::error!("unrecognized slug {slug:?} stored in the database");
        error::Error::Fatal
    })
}

fn to_position(raw: i32) -> error::Result<u32> {
    u32::try_from(raw).map_err(|_| error::Error::Fatal)
}

fn from_position(position: u32) -> error::Result<i32> {
    i32::try_from(position).map_err(|_| error::Error::BadInput)
}

/// Maps the affected row count of a keyed `UPDATE` or `DELETE`.
fn expect_one(count: u64) -> error::Result<()> {
    match count {
        0 => Err(error::Error::NotFound),
        1 => Ok(()),
        _ => Err(error::Error::Fatal),
    }
}

fn deserialize_question_from_row(row: Row) -> error::Result<Question> {
    let category: &str = row.try_get("category")?;
    let difficulty: i16 = row.try_get("difficulty")?;
    Ok(Question {
        id: row.try_get("id")?,
        category: parse_slug(category)?,
        question: row.try_get("question")?,
        choices: row.try_get("choices")?,
        answer: row.try_get("answer")?,
        feedback: row.try_get("feedback")?,
        difficulty: u8::try_from(difficulty).map_err(|_| error::Error::Fatal)?,
        image_url: row.try_get("image_url")?,
        video_url: row.try_get("video_url")?,
        author: row.try_get("author")?,
        created_at: row.try_get("created_at")?,
    })
}

fn deserialize_progress_from_row(row: Row) -> error::Result<Progress> {
    let category: Option<&str> = row.try_get("category")?;
    Ok(Progress {
        member: row.try_get("member")?,
        position: to_position(row.try_get("position")?)?,
        category: category.map(parse_slug).transpose()?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn deserialize_event_from_row(row: Row) -> error::Result<Event> {
    let action: &str = row.try_get("action")?;
    let position: Option<i32> = row.try_get("position")?;
    Ok(Event {
        at: row.try_get("at")?,
        member: row.try_get("member")?,
        position: position.map(to_position).transpose()?,
        question: row.try_get("question")?,
        action: parse_slug::<Action>(action)?,
        choice: row.try_get("choice")?,
        correct: row.try_get("correct")?,
        solving_time: row.try_get("solving_time")?,
        content: row.try_get("content")?,
    })
}

fn deserialize_post_from_row(row: Row) -> error::Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        author: row.try_get("author")?,
        content_above: row.try_get("content_above")?,
        content_below: row.try_get("content_below")?,
        image_urls: row.try_get("image_urls")?,
        video_url: row.try_get("video_url")?,
        created_at: row.try_get("created_at")?,
    })
}

fn deserialize_reply_from_row(row: Row) -> error::Result<Reply> {
    Ok(Reply {
        id: row.try_get("id")?,
        post: row.try_get("post")?,
        author: row.try_get("author")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}

fn deserialize_material_from_row(row: Row) -> error::Result<Material> {
    let category: &str = row.try_get("category")?;
    let kind: &str = row.try_get("kind")?;
    Ok(Material {
        id: row.try_get("id")?,
        category: parse_slug(category)?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        image_url: row.try_get("image_url")?,
        video_url: row.try_get("video_url")?,
        author: row.try_get("author")?,
        created_at: row.try_get("created_at")?,
        order: row.try_get("display_order")?,
        kind: parse_slug(kind)?,
    })
}

fn deserialize_comment_from_row(row: Row) -> error::Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        material: row.try_get("material")?,
        author: row.try_get("author")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        parent: row.try_get("parent")?,
    })
}

fn collect_rows<T>(rows: Vec<Row>, deserialize: fn(Row) -> error::Result<T>) -> error::Result<Vec<T>> {
    rows.into_iter().map(deserialize).collect()
}

impl Database {
    /// Creates any missing tables.
    pub async fn migrate(&self) -> error::Result<()> {
        self.0.batch_execute(SCHEMA).await?;
        Ok(())
    }

    pub async fn create_question(&self, author: &str, draft: &quiz::Draft) -> error::Result<i64> {
        let category = draft.category.as_str();
        let difficulty = i16::from(draft.difficulty);
        let row = self
            .0
            .query_one(
                "INSERT INTO question (category, question, choices, answer, feedback, difficulty, image_url, video_url, author) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
                &[
                    &category,
                    &draft.question,
                    &draft.choices,
                    &draft.answer.trim(),
                    &draft.feedback,
                    &difficulty,
                    &draft.image_url(),
                    &draft.video_url(),
                    &author,
                ],
            )
            .await?;
        Ok(row.try_get("id")?)
    }

    /// Streams the deck in order, optionally restricted to one category.
    pub async fn get_questions(
        &self,
        category: Option<Category>,
    ) -> error::Result<impl TryStream<Ok = Question, Error = error::Error> + '_> {
        let slug = category.map(Category::as_str);
        Ok(self
            .0
            .query_raw(
                "SELECT id, category, question, choices, answer, feedback, difficulty, image_url, video_url, author, created_at \
                 FROM question WHERE $1::TEXT IS NULL OR category = $1 ORDER BY id",
                &[&slug],
            )
            .await?
            .map_err(error::Error::from)
            .and_then(|row| core::future::ready(deserialize_question_from_row(row))))
    }

    pub async fn update_question(&self, id: i64, draft: &quiz::Draft) -> error::Result<()> {
        let category = draft.category.as_str();
        let difficulty = i16::from(draft.difficulty);
        let count = self
            .0
            .execute(
                "UPDATE question SET category = $2, question = $3, choices = $4, answer = $5, feedback = $6, \
                 difficulty = $7, image_url = $8, video_url = $9 WHERE id = $1",
                &[
                    &id,
                    &category,
                    &draft.question,
                    &draft.choices,
                    &draft.answer.trim(),
                    &draft.feedback,
                    &difficulty,
                    &draft.image_url(),
                    &draft.video_url(),
                ],
            )
            .await?;
        expect_one(count)
    }

    pub async fn delete_question(&self, id: i64) -> error::Result<()> {
        let count = self.0.execute("DELETE FROM question WHERE id = $1", &[&id]).await?;
        expect_one(count)
    }

    pub async fn get_progress(&self, member: &str) -> error::Result<Option<Progress>> {
        self.0
            .query_opt("SELECT member, position, category, updated_at FROM progress WHERE member = $1", &[&member])
            .await?
            .map(deserialize_progress_from_row)
            .transpose()
    }

    /// Records the member's deck position, stamping it with the current time.
    pub async fn save_progress(&self, member: &str, position: u32, category: Option<Category>) -> error::Result<()> {
        let position = from_position(position)?;
        let slug = category.map(Category::as_str);
        self.0
            .execute(
                "INSERT INTO progress (member, position, category, updated_at) VALUES ($1, $2, $3, now()) \
                 ON CONFLICT (member) DO UPDATE SET position = EXCLUDED.position, category = EXCLUDED.category, \
                 updated_at = EXCLUDED.updated_at",
                &[&member, &position, &slug],
            )
            .await?;
        Ok(())
    }

    pub async fn log_event(&self, event: &Event) -> error::Result<()> {
        let position = event.position.map(from_position).transpose()?;
        let action = event.action.as_str();
        self.0
            .execute(
                "INSERT INTO activity (at, member, position, question, action, choice, correct, solving_time, content) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                &[
                    &event.at,
                    &event.member,
                    &position,
                    &event.question,
                    &action,
                    &event.choice,
                    &event.correct,
                    &event.solving_time,
                    &event.content,
                ],
            )
            .await?;
        Ok(())
    }

    /// All events of a member, oldest first.
    pub async fn get_events(&self, member: &str) -> error::Result<Vec<Event>> {
        let rows = self
            .0
            .query(
                "SELECT at, member, position, question, action, choice, correct, solving_time, content \
                 FROM activity WHERE member = $1 ORDER BY at, id",
                &[&member],
            )
            .await?;
        collect_rows(rows, deserialize_event_from_row)
    }

    pub async fn create_post(&self, author: &str, draft: &conference::Draft) -> error::Result<i64> {
        let images = draft.joined_images();
        let row = self
            .0
            .query_one(
                "INSERT INTO post (author, content_above, content_below, image_urls, video_url) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
                &[&author, &draft.content_above, &draft.content_below, &images, &draft.video_url()],
            )
            .await?;
        Ok(row.try_get("id")?)
    }

    /// All posts, newest first.
    pub async fn get_posts(&self) -> error::Result<Vec<Post>> {
        let rows = self
            .0
            .query(
                "SELECT id, author, content_above, content_below, image_urls, video_url, created_at \
                 FROM post ORDER BY id DESC",
                &[],
            )
            .await?;
        collect_rows(rows, deserialize_post_from_row)
    }

    pub async fn get_post(&self, id: i64) -> error::Result<Post> {
        let row = self
            .0
            .query_opt(
                "SELECT id, author, content_above, content_below, image_urls, video_url, created_at \
                 FROM post WHERE id = $1",
                &[&id],
            )
            .await?
            .ok_or(error::Error::NotFound)?;
        deserialize_post_from_row(row)
    }

    pub async fn update_post(&self, id: i64, draft: &conference::Draft) -> error::Result<()> {
        let images = draft.joined_images();
        let count = self
            .0
            .execute(
                "UPDATE post SET content_above = $2, content_below = $3, image_urls = $4, video_url = $5 WHERE id = $1",
                &[&id, &draft.content_above, &draft.content_below, &images, &draft.video_url()],
            )
            .await?;
        expect_one(count)
    }

    /// Deletes the post along with its replies.
    pub async fn delete_post(&self, id: i64) -> error::Result<()> {
        let count = self.0.execute("DELETE FROM post WHERE id = $1", &[&id]).await?;
        expect_one(count)
    }

    pub async fn create_reply(&self, post: i64, author: &str, content: &str) -> error::Result<i64> {
        let row = self
            .0
            .query_one(
                "INSERT INTO reply (post, author, content) VALUES ($1, $2, $3) RETURNING id",
                &[&post, &author, &content],
            )
            .await?;
        Ok(row.try_get("id")?)
    }

    /// Replies under a post, oldest first. An unknown post is [`NotFound`](error::Error::NotFound).
    pub async fn get_replies(&self, post: i64) -> error::Result<Vec<Reply>> {
        self.0.query_opt("SELECT 1 FROM post WHERE id = $1", &[&post]).await?.ok_or(error::Error::NotFound)?;
        let rows = self
            .0
            .query("SELECT id, post, author, content, created_at FROM reply WHERE post = $1 ORDER BY id", &[&post])
            .await?;
        collect_rows(rows, deserialize_reply_from_row)
    }

    pub async fn create_material(&self, author: &str, draft: &material::Draft) -> error::Result<i64> {
        let category = draft.category.as_str();
        let kind = draft.kind.as_str();
        let row = self
            .0
            .query_one(
                "INSERT INTO material (category, title, content, image_url, video_url, author, display_order, kind) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
                &[
                    &category,
                    &draft.title,
                    &draft.content,
                    &draft.image_url(),
                    &draft.video_url(),
                    &author,
                    &draft.order,
                    &kind,
                ],
            )
            .await?;
        Ok(row.try_get("id")?)
    }

    /// Materials in display order, optionally restricted to one test kind.
    pub async fn get_materials(&self, category: Option<TestKind>) -> error::Result<Vec<Material>> {
        let slug = category.map(TestKind::as_str);
        let rows = self
            .0
            .query(
                "SELECT id, category, title, content, image_url, video_url, author, created_at, display_order, kind \
                 FROM material WHERE $1::TEXT IS NULL OR category = $1 ORDER BY display_order, id",
                &[&slug],
            )
            .await?;
        collect_rows(rows, deserialize_material_from_row)
    }

    pub async fn get_material(&self, id: i64) -> error::Result<Material> {
        let row = self
            .0
            .query_opt(
                "SELECT id, category, title, content, image_url, video_url, author, created_at, display_order, kind \
                 FROM material WHERE id = $1",
                &[&id],
            )
            .await?
            .ok_or(error::Error::NotFound)?;
        deserialize_material_from_row(row)
    }

    pub async fn update_material(&self, id: i64, draft: &material::Draft) -> error::Result<()> {
        let category = draft.category.as_str();
        let kind = draft.kind.as_str();
        let count = self
            .0
            .execute(
                "UPDATE material SET category = $2, title = $3, content = $4, image_url = $5, video_url = $6, \
                 display_order = $7, kind = $8 WHERE id = $1",
                &[
                    &id,
                    &category,
                    &draft.title,
                    &draft.content,
                    &draft.image_url(),
                    &draft.video_url(),
                    &draft.order,
                    &kind,
                ],
            )
            .await?;
        expect_one(count)
    }

    /// Deletes the material along with its comments.
    pub async fn delete_material(&self, id: i64) -> error::Result<()> {
        let count = self.0.execute("DELETE FROM material WHERE id = $1", &[&id]).await?;
        expect_one(count)
    }

    /// Adds a comment. A parent comment, if given, must belong to the same material.
    pub async fn create_comment(
        &self,
        material: i64,
        author: &str,
        content: &str,
        parent: Option<i64>,
    ) -> error::Result<i64> {
        let row = self
            .0
            .query_opt(
                "INSERT INTO comment (material, author, content, parent) \
                 SELECT $1::BIGINT, $2::TEXT, $3::TEXT, $4::BIGINT \
                 WHERE $4::BIGINT IS NULL OR EXISTS (SELECT 1 FROM comment WHERE id = $4 AND material = $1) \
                 RETURNING id",
                &[&material, &author, &content, &parent],
            )
            .await?
            .ok_or(error::Error::NotFound)?;
        Ok(row.try_get("id")?)
    }

    /// Comments under a material, newest first. An unknown material is [`NotFound`](error::Error::NotFound).
    pub async fn get_comments(&self, material: i64) -> error::Result<Vec<Comment>> {
        self.0.query_opt("SELECT 1 FROM material WHERE id = $1", &[&material]).await?.ok_or(error::Error::NotFound)?;
        let rows = self
            .0
            .query(
                "SELECT id, material, author, content, created_at, parent FROM comment \
                 WHERE material = $1 ORDER BY created_at DESC, id DESC",
                &[&material],
            )
            .await?;
        collect_rows(rows, deserialize_comment_from_row)
    }

    /// Deletes a comment, but only on behalf of its author.
    pub async fn delete_comment(&self, id: i64, author: &str) -> error::Result<()> {
        let count = self.0.execute("DELETE FROM comment WHERE id = $1 AND author = $2", &[&id, &author]).await?;
        expect_one(count)
    }
}

#[cfg(test)]
mod tests {
    use super::{error::Error, Config, Database, NoTls, TryStreamExt};
    use model::{
        activity::{Action, Event},
        conference, material, quiz, Category, MaterialKind, TestKind,
    };

    async fn connect() -> (Database, tokio::task::JoinHandle<Result<(), tokio_postgres::Error>>) {
        use std::env::var;
        let user = var("PG_USERNAME").unwrap();
        let pass = var("PG_PASSWORD").unwrap();
        let host = var("PG_HOSTNAME").unwrap();
        let data = var("PG_DATABASE").unwrap();

        let (client, conn) = Config::new()
            .user(&user)
            .password(&pass)
            .host(&host)
            .dbname(&data)
            .port(5432)
            .connect(NoTls)
            .await
            .expect("cannot connect to database");
        let handle = tokio::spawn(conn);
        let db = Database::from(client);
        db.migrate().await.unwrap();
        (db, handle)
    }

    #[test]
    fn expect_one_maps_row_counts() {
        assert_eq!(super::expect_one(1), Ok(()));
        assert_eq!(super::expect_one(0), Err(Error::NotFound));
        assert_eq!(super::expect_one(2), Err(Error::Fatal));
    }

    #[test]
    fn positions_must_fit_the_column() {
        assert_eq!(super::from_position(7), Ok(7));
        assert_eq!(super::from_position(u32::MAX), Err(Error::BadInput));
        assert_eq!(super::to_position(-1), Err(Error::Fatal));
    }

    #[tokio::test(flavor = "current_thread")]
    #[ignore = "requires a live PostgreSQL instance"]
    async fn database_test() {
        let (db, handle) = connect().await;
        let member = "db-test-member";

        // Question lifecycle
        let draft = quiz::Draft {
            category: Category::Epilepsy,
            question: String::from("First-line drug for absence seizures?"),
            choices: String::from("Ethosuximide, Carbamazepine, Phenytoin"),
            answer: String::from(" Ethosuximide "),
            feedback: vec![String::from("Yes."), String::from("Worsens absences."), String::new()],
            difficulty: 2,
            image_url: None,
            video_url: Some(String::from("https://youtu.be/abc")),
        };
        let qid = db.create_question(member, &draft).await.unwrap();
        let deck: Vec<_> = db.get_questions(Some(Category::Epilepsy)).await.unwrap().try_collect().await.unwrap();
        let stored = deck.iter().find(|q| q.id == qid).unwrap();
        assert_eq!(stored.answer, "Ethosuximide");
        assert_eq!(stored.feedback.len(), 3);
        assert_eq!(stored.video_url.as_deref(), Some("https://youtu.be/abc"));

        let mut edited = draft.clone();
        edited.difficulty = 4;
        db.update_question(qid, &edited).await.unwrap();
        db.delete_question(qid).await.unwrap();
        assert_eq!(db.delete_question(qid).await, Err(Error::NotFound));
        assert_eq!(db.update_question(qid, &edited).await, Err(Error::NotFound));

        // Progress upsert
        db.save_progress(member, 3, Some(Category::Stroke)).await.unwrap();
        db.save_progress(member, 4, None).await.unwrap();
        let progress = db.get_progress(member).await.unwrap().unwrap();
        assert_eq!(progress.position, 4);
        assert_eq!(progress.category, None);
        assert!(db.get_progress("db-test-nobody").await.unwrap().is_none());

        // Activity log
        let event =
            Event::new(chrono::Utc::now(), member, Action::SubmitAnswer).on(4, qid).with_choice("a").with_outcome(true, 3.5);
        db.log_event(&event).await.unwrap();
        let events = db.get_events(member).await.unwrap();
        assert!(events.iter().any(|e| e.question == Some(qid) && e.solving_time == Some(3.5)));

        // Posts and replies
        let post = conference::Draft { content_above: String::from("72M, sudden aphasia"), ..Default::default() };
        let pid = db.create_post(member, &post).await.unwrap();
        db.create_reply(pid, member, "Left MCA?").await.unwrap();
        assert_eq!(db.create_reply(pid, member, "   ").await, Err(Error::BadInput));
        assert_eq!(db.get_replies(pid).await.unwrap().len(), 1);
        db.delete_post(pid).await.unwrap();
        assert_eq!(db.create_reply(pid, member, "too late").await, Err(Error::NotFound));
        assert_eq!(db.get_replies(pid).await.err(), Some(Error::NotFound));
        assert_eq!(db.get_post(pid).await, Err(Error::NotFound));

        // Materials and comments
        let draft = material::Draft {
            category: TestKind::Eeg,
            title: String::from("Spike and wave"),
            content: String::new(),
            image_url: None,
            video_url: None,
            order: 2,
            kind: MaterialKind::Case,
        };
        let mid = db.create_material(member, &draft).await.unwrap();
        let cid = db.create_comment(mid, member, "3 Hz?", None).await.unwrap();
        db.create_comment(mid, "someone-else", "Yes, 3 Hz.", Some(cid)).await.unwrap();
        assert_eq!(db.create_comment(mid, member, "orphan", Some(-1)).await, Err(Error::NotFound));
        assert_eq!(db.get_comments(mid).await.unwrap().len(), 2);
        assert_eq!(db.delete_comment(cid, "someone-else").await, Err(Error::NotFound));
        db.delete_comment(cid, member).await.unwrap();
        assert_eq!(db.get_material(mid).await.unwrap().kind, MaterialKind::Case);
        db.delete_material(mid).await.unwrap();
        assert_eq!(db.get_comments(mid).await.err(), Some(Error::NotFound));

        drop(db);
        handle.await.unwrap().unwrap();
    }
}
