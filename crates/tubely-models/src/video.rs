//! Video record models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when a path or document segment is not a valid video ID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid video id: {0}")]
pub struct InvalidVideoId(pub String);

/// Unique identifier of a video record.
///
/// IDs are UUIDs rendered in their hyphenated lowercase form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse and normalize an externally supplied ID.
    pub fn parse(s: &str) -> Result<Self, InvalidVideoId> {
        Uuid::parse_str(s.trim())
            .map(|id| Self(id.to_string()))
            .map_err(|_| InvalidVideoId(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VideoId {
    type Err = InvalidVideoId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Identity of an authenticated user (the token subject).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Video record as stored in the record store.
///
/// `video_url` stays `None` until an upload has gone all the way through
/// storage and the record update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    /// Record ID
    pub id: VideoId,

    /// Owning user
    pub user_id: UserId,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Public URL of the uploaded thumbnail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    /// Public URL of the processed video object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Store-assigned revision used for conditional writes. Never serialized
    /// to clients.
    #[serde(skip)]
    #[schemars(skip)]
    pub version: Option<String>,
}

impl VideoRecord {
    /// Create a fresh record with no media attached.
    pub fn new(user_id: UserId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: VideoId::new(),
            user_id,
            title: title.into(),
            description: String::new(),
            thumbnail_url: None,
            video_url: None,
            created_at: now,
            updated_at: now,
            version: None,
        }
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    /// Point the record at a newly stored video object.
    pub fn set_video_url(&mut self, url: impl Into<String>) {
        self.video_url = Some(url.into());
        self.updated_at = Utc::now();
    }

    /// Point the record at a newly written thumbnail.
    pub fn set_thumbnail_url(&mut self, url: impl Into<String>) {
        self.thumbnail_url = Some(url.into());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_parse_normalizes() {
        let id = VideoId::parse(" 6F9619FF-8B86-D011-B42D-00C04FC964FF ").unwrap();
        assert_eq!(id.as_str(), "6f9619ff-8b86-d011-b42d-00c04fc964ff");
    }

    #[test]
    fn test_video_id_parse_rejects_garbage() {
        assert!(VideoId::parse("not-a-uuid").is_err());
        assert!("".parse::<VideoId>().is_err());
    }

    #[test]
    fn test_new_record_has_no_media() {
        let record = VideoRecord::new(UserId::from("user-1"), "My clip");
        assert!(record.video_url.is_none());
        assert!(record.thumbnail_url.is_none());
        assert!(record.is_owned_by(&UserId::from("user-1")));
        assert!(!record.is_owned_by(&UserId::from("user-2")));
    }

    #[test]
    fn test_version_is_not_serialized() {
        let mut record = VideoRecord::new(UserId::from("user-1"), "t");
        record.version = Some("2024-01-01T00:00:00Z".to_string());
        record.set_video_url("https://cdn.example.com/landscape/abc.mp4");

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("version").is_none());
        assert_eq!(json["video_url"], "https://cdn.example.com/landscape/abc.mp4");
        assert!(json.get("thumbnail_url").is_none());
    }
}
