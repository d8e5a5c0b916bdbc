//! Legacy video list service.

use crate::model::post::{Video, VideoDraft, VideoId};
use crate::model::validation::ValidationError;
use crate::repo::video_repo::VideoRepository;
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum VideoServiceError {
    Validation(ValidationError),
    VideoNotFound(VideoId),
    Repo(RepoError),
    InconsistentState(&'static str),
}

impl Display for VideoServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::VideoNotFound(id) => write!(f, "video not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent video state: {details}"),
        }
    }
}

impl Error for VideoServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for VideoServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { entity: "video", id } => Self::VideoNotFound(id),
            other => Self::Repo(other),
        }
    }
}

pub struct VideoService<R: VideoRepository> {
    repo: R,
}

impl<R: VideoRepository> VideoService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_video(&self, draft: &VideoDraft) -> Result<Video, VideoServiceError> {
        let id = self.repo.create_video(draft)?;
        info!("event=video_create module=video status=ok video_id={}", id);
        self.repo
            .get_video(id)?
            .ok_or(VideoServiceError::InconsistentState(
                "created video not found in read-back",
            ))
    }

    pub fn update_video(
        &self,
        id: VideoId,
        draft: &VideoDraft,
    ) -> Result<Video, VideoServiceError> {
        self.repo.update_video(id, draft)?;
        info!("event=video_update module=video status=ok video_id={}", id);
        self.repo
            .get_video(id)?
            .ok_or(VideoServiceError::VideoNotFound(id))
    }

    pub fn delete_video(&self, id: VideoId) -> Result<(), VideoServiceError> {
        self.repo.delete_video(id)?;
        info!("event=video_delete module=video status=ok video_id={}", id);
        Ok(())
    }

    pub fn get_video(&self, id: VideoId) -> Result<Video, VideoServiceError> {
        self.repo
            .get_video(id)?
            .ok_or(VideoServiceError::VideoNotFound(id))
    }

    pub fn list_videos(&self) -> Result<Vec<Video>, VideoServiceError> {
        Ok(self.repo.list_videos()?)
    }
}
