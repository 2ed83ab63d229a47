//! Two-phase video submission: transfer the bytes, then start processing.

use std::sync::Arc;

use kubrick_core::{JobId, MediaFile, SharedSession, StatusUpdate, VideoId};
use log::{error, info, warn};

use crate::client_trait::KubrickApi;
use crate::error::PipelineError;

/// A video the service accepted and started processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedJob {
    pub video_id: VideoId,
    pub remote_path: String,
    pub job_id: JobId,
}

pub struct UploadPipeline {
    api: Arc<dyn KubrickApi>,
    session: SharedSession,
}

impl UploadPipeline {
    pub fn new(api: Arc<dyn KubrickApi>, session: SharedSession) -> Self {
        Self { api, session }
    }

    /// Submits a video. Exactly one library entry is created, before any I/O,
    /// and it always ends up either `in_progress` or `failed`. Nothing is
    /// retried here.
    pub async fn submit(&self, file: MediaFile) -> Result<SubmittedJob, PipelineError> {
        let video_id = self.session.write().await.add_video(file.clone());

        let remote_path = match self.api.upload_video(&file).await {
            Ok(remote_path) => remote_path,
            Err(err) => {
                error!("Upload of {} failed: {}", file.name(), err);
                self.session.write().await.mark_failed(&video_id);
                return Err(PipelineError::Transfer(err));
            }
        };
        info!("Uploaded {} to {}", file.name(), remote_path);
        self.session
            .write()
            .await
            .record_remote_path(&video_id, remote_path.clone());

        let job_id = match self.api.process_video(&remote_path).await {
            Ok(job_id) => job_id,
            Err(err) => {
                error!("Processing request for {} failed: {}", remote_path, err);
                self.session.write().await.mark_failed(&video_id);
                return Err(PipelineError::ProcessingStart {
                    remote_path,
                    source: err,
                });
            }
        };

        {
            let mut session = self.session.write().await;
            match session.start_job(&video_id, job_id.clone()) {
                StatusUpdate::Applied => {
                    session.set_active_video(Some(&video_id));
                    info!("Video {} processing as job {}", video_id, job_id);
                }
                other => warn!(
                    "Job {} for video {} was not tracked: {:?}",
                    job_id, video_id, other
                ),
            }
        }

        Ok(SubmittedJob {
            video_id,
            remote_path,
            job_id,
        })
    }
}
