use crate::{media, DateTime, Utc};
use alloc::{string::String, vec::Vec};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Case text handed to the tutor is cut off after this many characters.
pub const MAX_CONTEXT_CHARS: usize = 3000;

/// A morning-conference case post.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Post {
    pub id: i64,
    pub author: String,
    /// Text shown above the media.
    pub content_above: String,
    /// Text shown below the media.
    pub content_below: String,
    /// Comma-separated image URLs.
    pub image_urls: String,
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn images(&self) -> Vec<&str> {
        media::parse_image_urls(&self.image_urls)
    }

    /// The case as plain text, truncated for use as tutor context.
    pub fn context(&self) -> String {
        let mut text = String::new();
        for part in [self.content_above.trim(), self.content_below.trim()] {
            if part.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(part);
        }
        truncate_chars(&text, MAX_CONTEXT_CHARS).into()
    }
}

/// Cuts the text after `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// A learner's reply under a post.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Reply {
    pub id: i64,
    pub post: i64,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Invalid {
    EmptyContent,
}

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EmptyContent => "write something above or below the media",
        })
    }
}

/// Admin input for creating or replacing a post.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Draft {
    pub content_above: String,
    pub content_below: String,
    pub image_urls: Vec<String>,
    pub video_url: Option<String>,
}

impl Draft {
    pub fn validate(&self) -> Result<(), Invalid> {
        if self.content_above.trim().is_empty() && self.content_below.trim().is_empty() {
            return Err(Invalid::EmptyContent);
        }
        Ok(())
    }

    /// Valid image URLs joined back into the stored comma list.
    pub fn joined_images(&self) -> String {
        let urls: Vec<&str> =
            self.image_urls.iter().map(|url| url.trim()).filter(|url| media::is_valid_url(url)).collect();
        urls.join(",")
    }

    pub fn video_url(&self) -> Option<&str> {
        media::normalize_url(self.video_url.as_deref())
    }
}
