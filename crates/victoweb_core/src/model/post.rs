//! Post, video and media models.
//!
//! # Invariants
//! - `Post::slug` is unique and assigned once, on first save.
//! - `Media::post_id` becomes `None` when the source post is deleted.

use super::committee::committee_label;
use super::validation::{max_chars, optional_url, require, url, ValidationResult};
use super::EpochMillis;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type PostId = i64;
pub type VideoId = i64;
pub type MediaId = i64;

pub const MAX_POST_TITLE_LENGTH: usize = 200;
pub const MAX_POST_SLUG_LENGTH: usize = 220;
pub const MAX_POST_EXCERPT_LENGTH: usize = 500;
pub const MAX_VIDEO_TITLE_LENGTH: usize = 200;
pub const MAX_MEDIA_TITLE_LENGTH: usize = 200;

/// Blog-style post with Markdown/HTML content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub thumbnail: String,
    pub date: NaiveDate,
    pub committee: String,
    pub created_at: EpochMillis,
    pub updated_at: EpochMillis,
}

impl Post {
    pub fn committee_label(&self) -> String {
        committee_label(&self.committee)
    }
}

/// Editable post fields as submitted by a publisher.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct PostDraft {
    pub title: String,
    pub thumbnail: String,
    pub excerpt: String,
    pub content: String,
    pub committee: String,
}

impl PostDraft {
    pub fn validate(&self) -> ValidationResult {
        require("title", &self.title)?;
        max_chars("title", self.title.trim(), MAX_POST_TITLE_LENGTH)?;
        optional_url("thumbnail", &self.thumbnail)?;
        max_chars("excerpt", self.excerpt.trim(), MAX_POST_EXCERPT_LENGTH)?;
        require("content", &self.content)?;
        max_chars("committee", self.committee.trim(), 64)?;
        Ok(())
    }
}

/// Insert/update payload handed to the post repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecordInput {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub thumbnail: String,
    pub date: NaiveDate,
    pub committee: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Video {
    pub id: VideoId,
    pub title: String,
    pub url: String,
    pub image: String,
    pub created_at: EpochMillis,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct VideoDraft {
    pub title: String,
    pub url: String,
    pub image: String,
}

impl VideoDraft {
    pub fn validate(&self) -> ValidationResult {
        require("title", &self.title)?;
        max_chars("title", self.title.trim(), MAX_VIDEO_TITLE_LENGTH)?;
        url("url", &self.url)?;
        url("image", &self.image)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Video => "Video",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Gallery entry, usually extracted from post content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Media {
    pub id: MediaId,
    pub title: String,
    pub url: String,
    pub media_type: MediaType,
    pub thumbnail: String,
    pub post_id: Option<PostId>,
    pub created_at: EpochMillis,
}

impl Media {
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.url
        } else {
            &self.title
        }
    }
}

/// Media extracted from content before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMedia {
    pub title: String,
    pub url: String,
    pub media_type: MediaType,
    pub thumbnail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_draft_requires_title_and_content() {
        let mut draft = PostDraft {
            title: "Welcome week".to_string(),
            content: "Hello".to_string(),
            ..PostDraft::default()
        };
        assert!(draft.validate().is_ok());

        draft.content = "   ".to_string();
        assert_eq!(draft.validate().unwrap_err().field, "content");

        draft.content = "Hello".to_string();
        draft.thumbnail = "not a url".to_string();
        assert_eq!(draft.validate().unwrap_err().field, "thumbnail");
    }

    #[test]
    fn video_draft_requires_urls() {
        let draft = VideoDraft {
            title: "Highlights".to_string(),
            url: "https://youtu.be/abc".to_string(),
            image: "cover.png".to_string(),
        };
        assert_eq!(draft.validate().unwrap_err().field, "image");
    }

    #[test]
    fn media_title_falls_back_to_url() {
        let media = Media {
            id: 1,
            title: String::new(),
            url: "https://example.com/a.png".to_string(),
            media_type: MediaType::Image,
            thumbnail: String::new(),
            post_id: None,
            created_at: 0,
        };
        assert_eq!(media.display_title(), "https://example.com/a.png");
    }
}
