use crate::{Category, DateTime, Utc};
use alloc::string::String;
use serde::{Deserialize, Serialize};

/// Activity older than this many seconds is not resumed.
pub const RESUME_WINDOW_SECS: i64 = 600;

/// Where a member last was in the quiz deck.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Progress {
    pub member: String,
    /// One-based deck position.
    pub position: u32,
    pub category: Option<Category>,
    pub updated_at: DateTime<Utc>,
}

impl Progress {
    /// Returns the saved position if the member was active within the resume window.
    pub fn resumable(&self, now: DateTime<Utc>) -> Option<u32> {
        let age = now.signed_duration_since(self.updated_at).num_seconds();
        (age < RESUME_WINDOW_SECS && self.position > 0).then_some(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn progress(position: u32) -> Progress {
        Progress {
            member: String::from("Song"),
            position,
            category: Some(Category::Dizziness),
            updated_at: Utc.with_ymd_and_hms(2025, 5, 2, 8, 30, 0).unwrap(),
        }
    }

    #[test]
    fn resumes_recent_activity() {
        let saved = progress(7);
        assert_eq!(saved.resumable(saved.updated_at), Some(7));
        assert_eq!(saved.resumable(saved.updated_at + Duration::seconds(599)), Some(7));
    }

    #[test]
    fn forgets_stale_activity() {
        let saved = progress(7);
        assert_eq!(saved.resumable(saved.updated_at + Duration::seconds(600)), None);
        assert_eq!(saved.resumable(saved.updated_at + Duration::hours(3)), None);
    }

    #[test]
    fn never_resumes_position_zero() {
        let saved = progress(0);
        assert_eq!(saved.resumable(saved.updated_at), None);
    }
}
