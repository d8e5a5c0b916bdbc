//! Legacy video repository.

use super::{RepoError, RepoResult};
use crate::model::post::{Video, VideoDraft, VideoId};
use rusqlite::{params, Connection, Row};

pub trait VideoRepository {
    fn create_video(&self, draft: &VideoDraft) -> RepoResult<VideoId>;
    fn update_video(&self, id: VideoId, draft: &VideoDraft) -> RepoResult<()>;
    fn get_video(&self, id: VideoId) -> RepoResult<Option<Video>>;
    /// Newest first (`id DESC`).
    fn list_videos(&self) -> RepoResult<Vec<Video>>;
    fn delete_video(&self, id: VideoId) -> RepoResult<()>;
}

pub struct SqliteVideoRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVideoRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl VideoRepository for SqliteVideoRepository<'_> {
    fn create_video(&self, draft: &VideoDraft) -> RepoResult<VideoId> {
        draft.validate()?;
        self.conn.execute(
            "INSERT INTO videos (title, url, image) VALUES (?1, ?2, ?3);",
            params![draft.title.trim(), draft.url.trim(), draft.image.trim()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_video(&self, id: VideoId, draft: &VideoDraft) -> RepoResult<()> {
        draft.validate()?;
        let changed = self.conn.execute(
            "UPDATE videos SET title = ?2, url = ?3, image = ?4 WHERE id = ?1;",
            params![id, draft.title.trim(), draft.url.trim(), draft.image.trim()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("video", id));
        }
        Ok(())
    }

    fn get_video(&self, id: VideoId) -> RepoResult<Option<Video>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, url, image, created_at FROM videos WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_video_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_videos(&self) -> RepoResult<Vec<Video>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, url, image, created_at FROM videos ORDER BY id DESC;")?;
        let mut rows = stmt.query([])?;
        let mut videos = Vec::new();
        while let Some(row) = rows.next()? {
            videos.push(parse_video_row(row)?);
        }
        Ok(videos)
    }

    fn delete_video(&self, id: VideoId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM videos WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("video", id));
        }
        Ok(())
    }
}

fn parse_video_row(row: &Row<'_>) -> RepoResult<Video> {
    Ok(Video {
        id: row.get("id")?,
        title: row.get("title")?,
        url: row.get("url")?,
        image: row.get("image")?,
        created_at: row.get("created_at")?,
    })
}
