//! Post use-case service.
//!
//! # Responsibility
//! - Create, edit and delete posts from publisher drafts.
//! - Derive slug, excerpt and rendered HTML from post content.
//! - Keep the media gallery in sync with each post's content.
//!
//! # Invariants
//! - A slug is assigned once and survives edits.
//! - A blank excerpt is always re-derived from content.
//! - Gallery rows of a post mirror the media found in its latest content.

use crate::model::committee::{committee_by_key, normalize_committee_key, Committee};
use crate::model::post::{
    MediaType, NewMedia, Post, PostDraft, PostId, PostRecordInput, MAX_MEDIA_TITLE_LENGTH,
    MAX_POST_EXCERPT_LENGTH,
};
use crate::model::validation::{is_http_url, truncate_chars, ValidationError};
use crate::repo::post_repo::{MediaListItem, MediaQuery, PostRepository};
use crate::repo::RepoError;
use chrono::NaiveDate;
use log::info;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const MAX_SLUG_BASE_LENGTH: usize = 200;
pub const EXCERPT_SOURCE_LENGTH: usize = 300;

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static EXCERPT_SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[#*_`\[\]!]").expect("valid excerpt symbol regex"));
static MARKDOWN_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(!?)\[([^\]]*)\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#)
        .expect("valid markdown link regex")
});
static HTML_MEDIA_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(img|video|iframe)\b([^>]*)>").expect("valid media tag regex")
});
static SRC_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\bsrc\s*=\s*["']([^"']+)["']"#).expect("valid src regex")
});
static TITLE_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\b(?:alt|title)\s*=\s*["']([^"']*)["']"#).expect("valid title regex")
});
static YOUTUBE_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:youtube(?:-nocookie)?\.com/(?:watch\?(?:[^#]*&)?v=|embed/|shorts/|live/|v/)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .expect("valid youtube regex")
});

const EDITOR_HELP: &str = r#"# Formatting help

Posts accept Markdown and raw HTML.

| You type | You get |
|---|---|
| `# Heading 1` / `## Heading 2` | section headings |
| `**bold**` / `*italic*` | **bold** / *italic* |
| `~~struck~~` | ~~struck~~ |
| `- item` / `1. item` | bullet / numbered list |
| `- [ ] task` | checklist |
| `[text](https://example.com)` | link |
| `![caption](https://example.com/photo.jpg)` | image (added to the media gallery) |
| `[clip](https://youtu.be/VIDEO_ID)` | video link (added to the media gallery) |
| ```` ```code``` ```` | code block |

Embedded `<img>`, `<video>` and `<iframe>` tags are also added to the media gallery.
Leave the preview text empty to generate it from the content.
"#;

#[derive(Debug)]
pub enum PostServiceError {
    Validation(ValidationError),
    PostNotFound(PostId),
    SlugNotFound(String),
    CommitteeNotFound(String),
    Repo(RepoError),
    InconsistentState(&'static str),
}

impl Display for PostServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::PostNotFound(id) => write!(f, "post not found: {id}"),
            Self::SlugNotFound(slug) => write!(f, "post not found: `{slug}`"),
            Self::CommitteeNotFound(key) => write!(f, "committee not found: `{key}`"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent post state: {details}"),
        }
    }
}

impl Error for PostServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for PostServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { entity: "post", id } => Self::PostNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for PostServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Post together with its rendered body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostDetail {
    pub post: Post,
    pub committee_label: String,
    pub rendered_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitteePosts {
    pub committee: &'static Committee,
    pub posts: Vec<Post>,
}

/// Gallery filter as submitted (raw query values).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MediaFilter {
    pub media_type: String,
    pub search: String,
}

pub struct PostService<R: PostRepository> {
    repo: R,
}

impl<R: PostRepository> PostService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a post dated `today` and syncs its gallery.
    pub fn create_post(
        &self,
        draft: &PostDraft,
        today: NaiveDate,
    ) -> Result<Post, PostServiceError> {
        draft.validate()?;
        let title = draft.title.trim().to_string();
        let slug = self.unique_slug(&title, None)?;
        let input = PostRecordInput {
            excerpt: excerpt_or_derived(&draft.excerpt, &draft.content),
            title,
            slug,
            content: draft.content.clone(),
            thumbnail: draft.thumbnail.trim().to_string(),
            date: today,
            committee: normalize_committee_key(&draft.committee)
                .unwrap_or_default()
                .to_string(),
        };
        let post_id = self.repo.create_post(&input)?;
        let media_count = self.sync_post_media(post_id, &input.content)?;
        info!(
            "event=post_create module=post status=ok post_id={} media_count={}",
            post_id, media_count
        );
        self.repo
            .get_post(post_id)?
            .ok_or(PostServiceError::InconsistentState(
                "created post not found in read-back",
            ))
    }

    /// Replaces editable fields; slug and date are kept.
    pub fn update_post(&self, id: PostId, draft: &PostDraft) -> Result<Post, PostServiceError> {
        draft.validate()?;
        let existing = self
            .repo
            .get_post(id)?
            .ok_or(PostServiceError::PostNotFound(id))?;
        let title = draft.title.trim().to_string();
        let slug = if existing.slug.is_empty() {
            self.unique_slug(&title, Some(id))?
        } else {
            existing.slug
        };
        let input = PostRecordInput {
            excerpt: excerpt_or_derived(&draft.excerpt, &draft.content),
            title,
            slug,
            content: draft.content.clone(),
            thumbnail: draft.thumbnail.trim().to_string(),
            date: existing.date,
            committee: normalize_committee_key(&draft.committee)
                .unwrap_or_default()
                .to_string(),
        };
        self.repo.update_post(id, &input)?;
        let media_count = self.sync_post_media(id, &input.content)?;
        info!(
            "event=post_update module=post status=ok post_id={} media_count={}",
            id, media_count
        );
        self.repo
            .get_post(id)?
            .ok_or(PostServiceError::InconsistentState(
                "updated post not found in read-back",
            ))
    }

    /// Deletes a post; its gallery entries stay, detached.
    pub fn delete_post(&self, id: PostId) -> Result<(), PostServiceError> {
        self.repo.delete_post(id)?;
        info!("event=post_delete module=post status=ok post_id={}", id);
        Ok(())
    }

    pub fn get_post(&self, id: PostId) -> Result<Post, PostServiceError> {
        self.repo
            .get_post(id)?
            .ok_or(PostServiceError::PostNotFound(id))
    }

    pub fn post_detail(&self, slug: &str) -> Result<PostDetail, PostServiceError> {
        let post = self
            .repo
            .get_post_by_slug(slug)?
            .ok_or_else(|| PostServiceError::SlugNotFound(slug.to_string()))?;
        Ok(PostDetail {
            committee_label: post.committee_label(),
            rendered_content: render_post_content(&post.content),
            post,
        })
    }

    pub fn list_posts(&self) -> Result<Vec<Post>, PostServiceError> {
        Ok(self.repo.list_posts()?)
    }

    /// Posts whose committee normalizes to the requested committee.
    pub fn committee_posts(&self, raw_key: &str) -> Result<CommitteePosts, PostServiceError> {
        let committee = committee_by_key(raw_key)
            .ok_or_else(|| PostServiceError::CommitteeNotFound(raw_key.to_string()))?;
        let posts = self
            .repo
            .list_posts()?
            .into_iter()
            .filter(|post| normalize_committee_key(&post.committee) == Some(committee.key))
            .collect();
        Ok(CommitteePosts { committee, posts })
    }

    /// Gallery listing; an unknown media type matches nothing.
    pub fn list_media(&self, filter: &MediaFilter) -> Result<Vec<MediaListItem>, PostServiceError> {
        let raw_type = filter.media_type.trim();
        let media_type = if raw_type.is_empty() {
            None
        } else {
            match MediaType::parse(raw_type) {
                Some(media_type) => Some(media_type),
                None => return Ok(Vec::new()),
            }
        };
        let search = filter.search.trim();
        let query = MediaQuery {
            media_type,
            search: (!search.is_empty()).then(|| search.to_string()),
        };
        Ok(self.repo.list_media(&query)?)
    }

    fn unique_slug(
        &self,
        title: &str,
        exclude: Option<PostId>,
    ) -> Result<String, PostServiceError> {
        let base = slugify(title);
        let mut candidate = base.clone();
        let mut counter = 1;
        while self.repo.slug_exists(&candidate, exclude)? {
            candidate = format!("{base}-{counter}");
            counter += 1;
        }
        Ok(candidate)
    }

    fn sync_post_media(&self, post_id: PostId, content: &str) -> Result<usize, PostServiceError> {
        let media = extract_media_from_content(content);
        self.repo.replace_post_media(post_id, &media)?;
        Ok(media.len())
    }
}

/// Static Markdown cheat-sheet shown by the post editor.
pub fn editor_help() -> &'static str {
    EDITOR_HELP
}

/// ASCII slug of `title`; never empty.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' {
            pending_dash = true;
        }
    }
    let mut slug = truncate_chars(&slug, MAX_SLUG_BASE_LENGTH);
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        return "post".to_string();
    }
    slug
}

/// Plain-text preview: tags and Markdown markers removed, 300 chars max.
pub fn derive_excerpt(content: &str) -> String {
    let without_tags = HTML_TAG_RE.replace_all(content, "");
    let text = EXCERPT_SYMBOL_RE.replace_all(&without_tags, "");
    let head = truncate_chars(&text, EXCERPT_SOURCE_LENGTH);
    let mut excerpt = head.trim().to_string();
    if text.chars().count() > EXCERPT_SOURCE_LENGTH {
        excerpt.push_str("...");
    }
    excerpt
}

fn excerpt_or_derived(excerpt: &str, content: &str) -> String {
    let excerpt = excerpt.trim();
    if excerpt.is_empty() {
        truncate_chars(&derive_excerpt(content), MAX_POST_EXCERPT_LENGTH)
    } else {
        excerpt.to_string()
    }
}

/// Markdown (with raw HTML passthrough) to HTML.
pub fn render_post_content(content: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    let parser = Parser::new_ext(content, options);
    let mut rendered = String::with_capacity(content.len() * 3 / 2);
    html::push_html(&mut rendered, parser);
    rendered
}

/// Images and videos referenced by `content`, in document order, unique by URL.
pub fn extract_media_from_content(content: &str) -> Vec<NewMedia> {
    let mut found: Vec<(usize, NewMedia)> = Vec::new();

    for caps in MARKDOWN_LINK_RE.captures_iter(content) {
        let (Some(whole), Some(url)) = (caps.get(0), caps.get(3)) else {
            continue;
        };
        let is_image = caps.get(1).is_some_and(|bang| bang.as_str() == "!");
        let title = caps.get(2).map_or("", |label| label.as_str());
        let media_type = if is_image {
            MediaType::Image
        } else if is_video_url(url.as_str()) {
            MediaType::Video
        } else {
            continue;
        };
        if let Some(media) = new_media(title, url.as_str(), media_type) {
            found.push((whole.start(), media));
        }
    }

    for caps in HTML_MEDIA_TAG_RE.captures_iter(content) {
        let (Some(whole), Some(tag), Some(attrs)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(src) = SRC_ATTR_RE
            .captures(attrs.as_str())
            .and_then(|src| src.get(1))
        else {
            continue;
        };
        let title = TITLE_ATTR_RE
            .captures(attrs.as_str())
            .and_then(|title| title.get(1))
            .map_or("", |title| title.as_str());
        let media_type = if tag.as_str().eq_ignore_ascii_case("img") {
            MediaType::Image
        } else {
            MediaType::Video
        };
        if let Some(media) = new_media(title, src.as_str(), media_type) {
            found.push((whole.start(), media));
        }
    }

    found.sort_by_key(|(position, _)| *position);
    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter(|(_, media)| seen.insert(media.url.clone()))
        .map(|(_, media)| media)
        .collect()
}

fn new_media(title: &str, raw_url: &str, media_type: MediaType) -> Option<NewMedia> {
    let raw_url = raw_url.trim();
    let url = match raw_url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => raw_url.to_string(),
    };
    if !is_http_url(&url) {
        return None;
    }
    let thumbnail = match media_type {
        MediaType::Video => youtube_thumbnail(&url).unwrap_or_default(),
        MediaType::Image => String::new(),
    };
    Some(NewMedia {
        title: truncate_chars(title.trim(), MAX_MEDIA_TITLE_LENGTH),
        url,
        media_type,
        thumbnail,
    })
}

/// YouTube, Vimeo or a direct video file link.
pub fn is_video_url(url: &str) -> bool {
    let lowered = url.to_ascii_lowercase();
    if lowered.contains("youtube.com/")
        || lowered.contains("youtu.be/")
        || lowered.contains("vimeo.com/")
    {
        return true;
    }
    let path = lowered
        .split(['?', '#'])
        .next()
        .unwrap_or(lowered.as_str());
    [".mp4", ".webm", ".mov"]
        .iter()
        .any(|extension| path.ends_with(extension))
}

pub fn youtube_thumbnail(url: &str) -> Option<String> {
    let video_id = YOUTUBE_ID_RE.captures(url)?.get(1)?.as_str();
    Some(format!("https://img.youtube.com/vi/{video_id}/hqdefault.jpg"))
}
