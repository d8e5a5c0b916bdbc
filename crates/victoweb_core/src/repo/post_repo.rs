//! Post and media repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist posts and the media gallery derived from their content.
//! - Keep gallery replacement for one post atomic.
//!
//! # Invariants
//! - Posts list by `date DESC, id DESC`; media by `created_at DESC, id DESC`.
//! - Deleting a post detaches (not deletes) its media rows.

use super::{format_date, parse_date, RepoError, RepoResult};
use crate::model::post::{
    Media, MediaId, MediaType, NewMedia, Post, PostId, PostRecordInput,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;

const POST_SELECT_SQL: &str = "SELECT
    id,
    title,
    slug,
    excerpt,
    content,
    thumbnail,
    date,
    committee,
    created_at,
    updated_at
FROM posts";

/// Gallery filter options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaQuery {
    pub media_type: Option<MediaType>,
    /// Case-insensitive substring match on the media title.
    pub search: Option<String>,
}

/// Media row joined with its source post, when one is still attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaListItem {
    #[serde(flatten)]
    pub media: Media,
    pub post_slug: Option<String>,
    pub post_title: Option<String>,
}

/// Repository interface for posts and their media.
pub trait PostRepository {
    fn create_post(&self, input: &PostRecordInput) -> RepoResult<PostId>;
    fn update_post(&self, id: PostId, input: &PostRecordInput) -> RepoResult<()>;
    fn get_post(&self, id: PostId) -> RepoResult<Option<Post>>;
    fn get_post_by_slug(&self, slug: &str) -> RepoResult<Option<Post>>;
    /// Whether another post (other than `exclude`) already uses `slug`.
    fn slug_exists(&self, slug: &str, exclude: Option<PostId>) -> RepoResult<bool>;
    fn list_posts(&self) -> RepoResult<Vec<Post>>;
    fn delete_post(&self, id: PostId) -> RepoResult<()>;
    /// Replaces every media row attached to `post_id` in one transaction.
    fn replace_post_media(&self, post_id: PostId, media: &[NewMedia]) -> RepoResult<Vec<MediaId>>;
    fn list_media(&self, query: &MediaQuery) -> RepoResult<Vec<MediaListItem>>;
}

/// SQLite-backed post repository.
pub struct SqlitePostRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePostRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_one_post(&self, filter_sql: &str, value: Value) -> RepoResult<Option<Post>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{POST_SELECT_SQL} WHERE {filter_sql};"))?;
        let mut rows = stmt.query([value])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_post_row(row)?)),
            None => Ok(None),
        }
    }
}

impl PostRepository for SqlitePostRepository<'_> {
    fn create_post(&self, input: &PostRecordInput) -> RepoResult<PostId> {
        let result = self.conn.execute(
            "INSERT INTO posts (
                title,
                slug,
                excerpt,
                content,
                thumbnail,
                date,
                committee,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, (strftime('%s', 'now') * 1000));",
            params![
                input.title.as_str(),
                input.slug.as_str(),
                input.excerpt.as_str(),
                input.content.as_str(),
                input.thumbnail.as_str(),
                format_date(input.date),
                input.committee.as_str(),
            ],
        );
        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(err) => Err(slug_conflict(err, &input.slug)),
        }
    }

    fn update_post(&self, id: PostId, input: &PostRecordInput) -> RepoResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE posts
                 SET
                    title = ?2,
                    slug = ?3,
                    excerpt = ?4,
                    content = ?5,
                    thumbnail = ?6,
                    date = ?7,
                    committee = ?8,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![
                    id,
                    input.title.as_str(),
                    input.slug.as_str(),
                    input.excerpt.as_str(),
                    input.content.as_str(),
                    input.thumbnail.as_str(),
                    format_date(input.date),
                    input.committee.as_str(),
                ],
            )
            .map_err(|err| slug_conflict(err, &input.slug))?;

        if changed == 0 {
            return Err(RepoError::not_found("post", id));
        }
        Ok(())
    }

    fn get_post(&self, id: PostId) -> RepoResult<Option<Post>> {
        self.query_one_post("id = ?1", Value::Integer(id))
    }

    fn get_post_by_slug(&self, slug: &str) -> RepoResult<Option<Post>> {
        if slug.is_empty() {
            return Ok(None);
        }
        self.query_one_post("slug = ?1", Value::Text(slug.to_string()))
    }

    fn slug_exists(&self, slug: &str, exclude: Option<PostId>) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM posts WHERE slug = ?1 AND (?2 IS NULL OR id <> ?2)
            );",
            params![slug, exclude],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_posts(&self) -> RepoResult<Vec<Post>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{POST_SELECT_SQL} ORDER BY date DESC, id DESC;"))?;
        let mut rows = stmt.query([])?;
        let mut posts = Vec::new();
        while let Some(row) = rows.next()? {
            posts.push(parse_post_row(row)?);
        }
        Ok(posts)
    }

    fn delete_post(&self, id: PostId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM posts WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("post", id));
        }
        Ok(())
    }

    fn replace_post_media(&self, post_id: PostId, media: &[NewMedia]) -> RepoResult<Vec<MediaId>> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM media WHERE post_id = ?1;", [post_id])?;

        let mut ids = Vec::with_capacity(media.len());
        {
            let mut insert = tx.prepare(
                "INSERT INTO media (title, url, media_type, thumbnail, post_id)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
            )?;
            for item in media {
                insert.execute(params![
                    item.title.as_str(),
                    item.url.as_str(),
                    item.media_type.as_str(),
                    item.thumbnail.as_str(),
                    post_id,
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    fn list_media(&self, query: &MediaQuery) -> RepoResult<Vec<MediaListItem>> {
        let mut sql = String::from(
            "SELECT
                m.id,
                m.title,
                m.url,
                m.media_type,
                m.thumbnail,
                m.post_id,
                m.created_at,
                p.slug AS post_slug,
                p.title AS post_title
             FROM media m
             LEFT JOIN posts p ON p.id = m.post_id
             WHERE 1 = 1",
        );
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(media_type) = query.media_type {
            sql.push_str(" AND m.media_type = ?");
            bind_values.push(Value::Text(media_type.as_str().to_string()));
        }
        if let Some(search) = query.search.as_ref().filter(|value| !value.is_empty()) {
            sql.push_str(" AND instr(lower(m.title), lower(?)) > 0");
            bind_values.push(Value::Text(search.clone()));
        }
        sql.push_str(" ORDER BY m.created_at DESC, m.id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(MediaListItem {
                media: parse_media_row(row)?,
                post_slug: row.get("post_slug")?,
                post_title: row.get("post_title")?,
            });
        }
        Ok(items)
    }
}

fn slug_conflict(err: rusqlite::Error, slug: &str) -> RepoError {
    match RepoError::from(err) {
        RepoError::Conflict(_) => RepoError::Conflict(format!("slug `{slug}` is already taken")),
        other => other,
    }
}

fn parse_post_row(row: &Row<'_>) -> RepoResult<Post> {
    let date_text: String = row.get("date")?;
    Ok(Post {
        id: row.get("id")?,
        title: row.get("title")?,
        slug: row.get("slug")?,
        excerpt: row.get("excerpt")?,
        content: row.get("content")?,
        thumbnail: row.get("thumbnail")?,
        date: parse_date(&date_text, "posts.date")?,
        committee: row.get("committee")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_media_row(row: &Row<'_>) -> RepoResult<Media> {
    let type_text: String = row.get("media_type")?;
    let media_type = MediaType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid media type `{type_text}` in media.media_type"))
    })?;
    Ok(Media {
        id: row.get("id")?,
        title: row.get("title")?,
        url: row.get("url")?,
        media_type,
        thumbnail: row.get("thumbnail")?,
        post_id: row.get("post_id")?,
        created_at: row.get("created_at")?,
    })
}
