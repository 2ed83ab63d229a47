use async_trait::async_trait;
use bytes::Bytes;
use kubrick_core::{JobId, MediaFile};

use crate::api::models::{ChatRequest, ChatResponse, RemoteTaskStatus};
use crate::error::ApiError;

/// The HTTP contract of the Kubrick service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KubrickApi: Send + Sync {
    /// `POST /upload-video`. Returns the remote storage path.
    async fn upload_video(&self, file: &MediaFile) -> Result<String, ApiError>;

    /// `POST /process-video`. Returns the processing job id.
    async fn process_video(&self, video_path: &str) -> Result<JobId, ApiError>;

    /// `GET /task-status/{task_id}`
    async fn task_status(&self, job_id: &JobId) -> Result<RemoteTaskStatus, ApiError>;

    /// `POST /chat`
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError>;

    /// `GET /media/{name}`
    async fn fetch_media(&self, name: &str) -> Result<Bytes, ApiError>;

    /// `POST /reset-memory`. Returns the service's confirmation message.
    async fn reset_memory(&self) -> Result<String, ApiError>;
}
