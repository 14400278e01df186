use crate::{media, DateTime, MaterialKind, TestKind, Utc};
use alloc::{string::String, vec::Vec};
use core::fmt;
use serde::{Deserialize, Serialize};

/// A study material about one clinical neurophysiology test.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Material {
    pub id: i64,
    pub category: TestKind,
    pub title: String,
    /// Markdown body.
    pub content: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub author: String,
    pub created_at: DateTime<Utc>,
    /// Smaller values are listed first.
    pub order: i32,
    pub kind: MaterialKind,
}

impl Material {
    /// Tutor context describing this material.
    pub fn context(&self) -> String {
        let body = crate::conference::truncate_chars(self.content.trim(), crate::conference::MAX_CONTEXT_CHARS);
        alloc::format!("Test: {}\nTitle: {}\nContent: {}", self.category.label(), self.title, body)
    }
}

/// A comment under a material. Replies point at their parent comment.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Comment {
    pub id: i64,
    pub material: i64,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub parent: Option<i64>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Invalid {
    EmptyTitle,
    Order,
}

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EmptyTitle => "a material needs a title",
            Self::Order => "display order starts at 1",
        })
    }
}

fn default_order() -> i32 {
    1
}

/// Admin input for creating or replacing a material.
#[derive(Clone, Debug, Deserialize)]
pub struct Draft {
    pub category: TestKind,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default = "default_order")]
    pub order: i32,
    #[serde(default)]
    pub kind: MaterialKind,
}

impl Draft {
    pub fn validate(&self) -> Result<(), Invalid> {
        if self.title.trim().is_empty() {
            return Err(Invalid::EmptyTitle);
        }
        if self.order < 1 {
            return Err(Invalid::Order);
        }
        Ok(())
    }

    pub fn image_url(&self) -> Option<&str> {
        media::normalize_url(self.image_url.as_deref())
    }

    pub fn video_url(&self) -> Option<&str> {
        media::normalize_url(self.video_url.as_deref())
    }
}

/// Number of materials filed under each test kind, in taxonomy order.
pub fn count_by_kind(materials: &[Material]) -> Vec<(TestKind, usize)> {
    TestKind::ALL
        .into_iter()
        .map(|kind| (kind, materials.iter().filter(|material| material.category == kind).count()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn material(id: i64, category: TestKind) -> Material {
        Material {
            id,
            category,
            title: String::from("F-wave basics"),
            content: String::from("## Latency\nMeasure the minimal latency."),
            image_url: None,
            video_url: None,
            author: String::from("Yoon"),
            created_at: Utc.with_ymd_and_hms(2025, 2, 2, 2, 2, 2).unwrap(),
            order: 1,
            kind: MaterialKind::Lecture,
        }
    }

    #[test]
    fn counts_every_kind() {
        let counts = count_by_kind(&[material(1, TestKind::Ncs), material(2, TestKind::Ncs), material(3, TestKind::Eeg)]);
        assert_eq!(counts.len(), TestKind::ALL.len());
        assert_eq!(counts[0], (TestKind::Ncs, 2));
        assert!(counts.contains(&(TestKind::Eeg, 1)));
        assert!(counts.contains(&(TestKind::Gait, 0)));
    }

    #[test]
    fn context_names_the_test() {
        let context = material(1, TestKind::Ncs).context();
        assert!(context.starts_with("Test: Nerve Conduction Study\nTitle: F-wave basics\n"));
    }

    #[test]
    fn draft_validation() {
        let mut draft: Draft = serde_json::from_str(r#"{"category":"emg","title":"Fibrillations"}"#).unwrap();
        assert_eq!(draft.order, 1);
        assert_eq!(draft.kind, MaterialKind::Lecture);
        assert_eq!(draft.validate(), Ok(()));

        draft.order = 0;
        assert_eq!(draft.validate(), Err(Invalid::Order));

        draft.order = 2;
        draft.title = String::from(" ");
        assert_eq!(draft.validate(), Err(Invalid::EmptyTitle));
    }
}
