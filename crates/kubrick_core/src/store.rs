//! Session state store
//!
//! The single owner of the message log, the attachment slot, the video
//! library and the active-video pointer. Every mutation is a total function
//! over the current state; background tasks only ever apply identifier-keyed
//! merges through the methods below.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::RwLock;

use crate::config::{Config, VideoContextPolicy};
use crate::media::{MediaFile, MediaKind};
use crate::message::{MediaRef, Message, MessageId, Role};
use crate::resources::{PreviewHandle, ResourceManager};
use crate::video::{JobId, ProcessingStatus, UploadedVideo, VideoId};

/// Shared handle passed to the pipeline, poller and dispatcher.
///
/// Holders must not keep the guard across a network call.
pub type SharedSession = Arc<RwLock<SessionStore>>;

/// A file staged for the next chat turn.
#[derive(Debug, Clone)]
pub struct AttachedFile {
    pub preview: PreviewHandle,
    pub file: MediaFile,
}

impl AttachedFile {
    pub fn kind(&self) -> MediaKind {
        self.file.kind()
    }
}

/// Outcome of a status merge into the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    Applied,
    /// The entry already had this status.
    Unchanged,
    /// The transition would move backwards or out of a terminal state.
    Rejected { current: ProcessingStatus },
    /// No matching entry (removed, orphaned, or never existed).
    Missing,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    messages: Vec<Message>,
    attachment: Option<AttachedFile>,
    videos: Vec<UploadedVideo>,
    active_video: Option<VideoId>,
    orphaned_jobs: HashSet<JobId>,
    resources: ResourceManager,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with the configured assistant greeting.
    pub fn from_config(config: &Config) -> Self {
        let mut store = Self::new();
        if let Some(greeting) = config.greeting.as_deref() {
            store.append_message(Role::Assistant, greeting, None, None);
        }
        store
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(RwLock::new(self))
    }

    // ========== Message log ==========

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn append_message(
        &mut self,
        role: Role,
        content: impl Into<String>,
        media: Option<MediaRef>,
        clip_path: Option<String>,
    ) -> MessageId {
        let now = Utc::now();
        let id = MessageId::after(self.messages.last().map(|m| m.id), now);
        self.messages.push(Message {
            id,
            content: content.into(),
            role,
            created_at: now,
            media,
            clip_path,
        });
        id
    }

    // ========== Attachment slot ==========

    pub fn attachment(&self) -> Option<&AttachedFile> {
        self.attachment.as_ref()
    }

    /// Stages a file for the next turn, releasing whatever was staged before.
    pub fn stage_attachment(&mut self, file: MediaFile) -> PreviewHandle {
        let preview = self.resources.acquire(&file);
        let previous = self.attachment.replace(AttachedFile {
            preview: preview.clone(),
            file,
        });
        if let Some(previous) = previous {
            debug!("Attachment {} superseded", previous.file.name());
            self.resources.release(&previous.preview);
        }
        preview
    }

    /// Drops the staged file. Returns `false` when nothing was staged.
    pub fn clear_attachment(&mut self) -> bool {
        match self.take_attachment() {
            Some(attachment) => {
                debug!("Attachment {} removed", attachment.file.name());
                true
            }
            None => false,
        }
    }

    /// Removes the staged file and releases its preview. The returned value
    /// keeps the payload; its handle is no longer live.
    pub fn take_attachment(&mut self) -> Option<AttachedFile> {
        let attachment = self.attachment.take()?;
        self.resources.release(&attachment.preview);
        Some(attachment)
    }

    // ========== Video library ==========

    pub fn videos(&self) -> &[UploadedVideo] {
        &self.videos
    }

    pub fn video(&self, id: &VideoId) -> Option<&UploadedVideo> {
        self.videos.iter().find(|video| &video.id == id)
    }

    fn video_mut(&mut self, id: &VideoId) -> Option<&mut UploadedVideo> {
        self.videos.iter_mut().find(|video| &video.id == id)
    }

    /// Most recently added entry.
    pub fn latest_video(&self) -> Option<&UploadedVideo> {
        self.videos.last()
    }

    /// Adds a new `pending` entry and acquires its preview.
    pub fn add_video(&mut self, file: MediaFile) -> VideoId {
        let preview = self.resources.acquire(&file);
        let id = VideoId::new();
        info!("Video {} added to library as {}", file.name(), id);
        self.videos.push(UploadedVideo {
            id: id.clone(),
            preview,
            file,
            created_at: Utc::now(),
            remote_path: None,
            job_id: None,
            status: ProcessingStatus::Pending,
        });
        id
    }

    /// Removes an entry, releasing its preview. The remote job (if any) keeps
    /// running; its id is remembered so late poll results are discarded.
    pub fn remove_video(&mut self, id: &VideoId) -> Option<UploadedVideo> {
        let index = self.videos.iter().position(|video| &video.id == id)?;
        let video = self.videos.remove(index);
        self.resources.release(&video.preview);

        if self.active_video.as_ref() == Some(id) {
            self.active_video = None;
        }
        if let Some(job_id) = &video.job_id {
            if !video.status.is_terminal() {
                debug!("Job {} orphaned by removal of video {}", job_id, id);
            }
            self.orphaned_jobs.insert(job_id.clone());
        }
        info!("Video {} removed from library", id);
        Some(video)
    }

    /// Records the remote storage path once the upload succeeded.
    pub fn record_remote_path(&mut self, id: &VideoId, remote_path: impl Into<String>) -> bool {
        match self.video_mut(id) {
            Some(video) => {
                video.remote_path = Some(remote_path.into());
                true
            }
            None => false,
        }
    }

    /// Attaches a processing job to an entry and moves it to `in_progress`.
    /// If the entry is gone the job id is recorded as orphaned.
    pub fn start_job(&mut self, id: &VideoId, job_id: JobId) -> StatusUpdate {
        if self.video(id).is_none() {
            warn!("Job {} started for removed video {}", job_id, id);
            self.orphaned_jobs.insert(job_id);
            return StatusUpdate::Missing;
        }
        if let Some(video) = self.video_mut(id) {
            if video.status.is_terminal() {
                return StatusUpdate::Rejected {
                    current: video.status,
                };
            }
            video.job_id = Some(job_id.clone());
        }
        // The service may hand out an id it used for a removed entry.
        if self.orphaned_jobs.remove(&job_id) {
            debug!("Job {} reused for video {}", job_id, id);
        }
        self.update_status(id, ProcessingStatus::InProgress)
    }

    pub fn mark_failed(&mut self, id: &VideoId) -> StatusUpdate {
        self.update_status(id, ProcessingStatus::Failed)
    }

    /// Applies a status if it moves the entry forward.
    pub fn update_status(&mut self, id: &VideoId, status: ProcessingStatus) -> StatusUpdate {
        let Some(video) = self.video_mut(id) else {
            return StatusUpdate::Missing;
        };
        let current = video.status;
        if current == status {
            return StatusUpdate::Unchanged;
        }
        if !current.can_advance_to(status) {
            debug!(
                "Ignoring status {} for video {} (currently {})",
                status, id, current
            );
            return StatusUpdate::Rejected { current };
        }

        video.status = status;
        info!("Video {} status {} -> {}", id, current, status);

        if status == ProcessingStatus::Completed {
            self.auto_select(id);
        }
        StatusUpdate::Applied
    }

    /// Merges a poll result. The job id must still belong to the entry; results
    /// for removed entries and orphaned jobs are dropped.
    pub fn apply_job_status(
        &mut self,
        id: &VideoId,
        job_id: &JobId,
        status: ProcessingStatus,
    ) -> StatusUpdate {
        let owns_job = self
            .video(id)
            .is_some_and(|video| video.job_id.as_ref() == Some(job_id));
        if owns_job {
            return self.update_status(id, status);
        }
        if self.orphaned_jobs.contains(job_id) {
            debug!("Discarding status {} for orphaned job {}", status, job_id);
        } else {
            debug!("Discarding status {} for job {}: no matching video", status, job_id);
        }
        StatusUpdate::Missing
    }

    /// Entries the poller should query: `in_progress` with a job id.
    pub fn pollable_jobs(&self) -> Vec<(VideoId, JobId)> {
        self.videos
            .iter()
            .filter(|video| video.is_pollable())
            .filter_map(|video| Some((video.id.clone(), video.job_id.clone()?)))
            .collect()
    }

    pub fn is_orphaned(&self, job_id: &JobId) -> bool {
        self.orphaned_jobs.contains(job_id)
    }

    // ========== Active pointer ==========

    pub fn active_video_id(&self) -> Option<&VideoId> {
        self.active_video.as_ref()
    }

    pub fn active_video(&self) -> Option<&UploadedVideo> {
        self.active_video.as_ref().and_then(|id| self.video(id))
    }

    /// Points the active pointer at an entry, or clears it with `None`.
    /// Returns `false` (pointer unchanged) for ids not in the library.
    pub fn set_active_video(&mut self, id: Option<&VideoId>) -> bool {
        match id {
            None => {
                self.active_video = None;
                true
            }
            Some(id) if self.video(id).is_some() => {
                self.active_video = Some(id.clone());
                true
            }
            Some(id) => {
                warn!("Cannot activate unknown video {}", id);
                false
            }
        }
    }

    /// User selection of a video: activates it and drops the staged file.
    pub fn select_video(&mut self, id: &VideoId) -> bool {
        if !self.set_active_video(Some(id)) {
            return false;
        }
        self.clear_attachment();
        true
    }

    fn auto_select(&mut self, id: &VideoId) {
        let is_latest = self.latest_video().map(|video| &video.id) == Some(id);
        if self.active_video.is_none() && is_latest {
            info!("Auto-selecting completed video {}", id);
            self.active_video = Some(id.clone());
        }
    }

    /// Video used as context for the next chat turn: the active one, else
    /// the most recently added. Under `CompletedOnly`, only completed entries
    /// qualify.
    pub fn resolve_video_context(&self, policy: VideoContextPolicy) -> Option<&UploadedVideo> {
        match policy {
            VideoContextPolicy::AnyUploaded => self.active_video().or_else(|| self.latest_video()),
            VideoContextPolicy::CompletedOnly => {
                let completed = |video: &&UploadedVideo| video.status == ProcessingStatus::Completed;
                self.active_video()
                    .filter(completed)
                    .or_else(|| self.videos.iter().rev().find(completed))
            }
        }
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(name: &str) -> MediaFile {
        MediaFile::new(name, MediaKind::Video, vec![0u8; 16])
    }

    fn image(name: &str) -> MediaFile {
        MediaFile::new(name, MediaKind::Image, vec![0xffu8, 0xd8])
    }

    fn in_progress(store: &mut SessionStore, name: &str, job: &str) -> VideoId {
        let id = store.add_video(clip(name));
        store.record_remote_path(&id, format!("shared_media/{name}"));
        assert_eq!(store.start_job(&id, JobId::new(job)), StatusUpdate::Applied);
        id
    }

    #[test]
    fn greeting_is_seeded_from_config() {
        let store = SessionStore::from_config(&Config::default());
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].role, Role::Assistant);

        let quiet = SessionStore::from_config(&Config {
            greeting: None,
            ..Config::default()
        });
        assert!(quiet.messages().is_empty());
    }

    #[test]
    fn message_log_is_ordered_with_increasing_ids() {
        let mut store = SessionStore::new();
        let a = store.append_message(Role::User, "one", None, None);
        let b = store.append_message(Role::Assistant, "two", None, None);
        let c = store.append_message(Role::User, "three", None, None);

        assert!(a < b && b < c);
        let contents: Vec<_> = store.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three"]);
    }

    #[test]
    fn staging_replaces_and_releases_previous_attachment() {
        let mut store = SessionStore::new();
        let first = store.stage_attachment(image("a.png"));
        let second = store.stage_attachment(image("b.png"));

        assert!(!store.resources().is_live(&first));
        assert!(store.resources().is_live(&second));
        assert_eq!(store.resources().released_count(), 1);
        assert_eq!(store.attachment().unwrap().file.name(), "b.png");

        assert!(store.clear_attachment());
        assert!(!store.clear_attachment());
        assert_eq!(store.resources().released_count(), 2);
        assert_eq!(store.resources().live_count(), 0);
    }

    #[test]
    fn take_attachment_releases_once() {
        let mut store = SessionStore::new();
        let handle = store.stage_attachment(image("a.png"));
        let taken = store.take_attachment().expect("staged");

        assert_eq!(taken.preview, handle);
        assert!(!store.resources().is_live(&handle));
        assert!(store.take_attachment().is_none());
        assert_eq!(store.resources().released_count(), 1);
    }

    #[test]
    fn new_videos_start_pending_in_insertion_order() {
        let mut store = SessionStore::new();
        let a = store.add_video(clip("a.mp4"));
        let b = store.add_video(clip("b.mp4"));

        let ids: Vec<_> = store.videos().iter().map(|v| v.id.clone()).collect();
        assert_eq!(ids, [a, b.clone()]);
        assert_eq!(store.video(&b).unwrap().status, ProcessingStatus::Pending);
        assert_eq!(store.latest_video().unwrap().id, b);
    }

    #[test]
    fn terminal_status_is_never_overwritten() {
        let mut store = SessionStore::new();
        let id = in_progress(&mut store, "clip.mp4", "t1");
        let job = JobId::new("t1");

        assert_eq!(
            store.apply_job_status(&id, &job, ProcessingStatus::Completed),
            StatusUpdate::Applied
        );
        assert_eq!(
            store.apply_job_status(&id, &job, ProcessingStatus::InProgress),
            StatusUpdate::Rejected {
                current: ProcessingStatus::Completed
            }
        );
        assert_eq!(
            store.apply_job_status(&id, &job, ProcessingStatus::Failed),
            StatusUpdate::Rejected {
                current: ProcessingStatus::Completed
            }
        );
        assert_eq!(store.video(&id).unwrap().status, ProcessingStatus::Completed);
        assert!(store.pollable_jobs().is_empty());
    }

    #[test]
    fn failed_upload_keeps_no_job() {
        let mut store = SessionStore::new();
        let id = store.add_video(clip("clip.mp4"));
        assert_eq!(store.mark_failed(&id), StatusUpdate::Applied);

        let video = store.video(&id).unwrap();
        assert!(video.job_id.is_none());
        assert!(video.remote_path.is_none());
        assert_eq!(
            store.start_job(&id, JobId::new("late")),
            StatusUpdate::Rejected {
                current: ProcessingStatus::Failed
            }
        );
    }

    #[test]
    fn removal_releases_clears_pointer_and_orphans_job() {
        let mut store = SessionStore::new();
        let id = in_progress(&mut store, "clip.mp4", "t1");
        assert!(store.set_active_video(Some(&id)));
        let preview = store.video(&id).unwrap().preview.clone();

        let removed = store.remove_video(&id).expect("present");
        assert_eq!(removed.id, id);
        assert!(store.active_video_id().is_none());
        assert!(!store.resources().is_live(&preview));
        assert!(store.is_orphaned(&JobId::new("t1")));

        assert_eq!(
            store.apply_job_status(&id, &JobId::new("t1"), ProcessingStatus::Completed),
            StatusUpdate::Missing
        );
        assert!(store.remove_video(&id).is_none());
        assert_eq!(store.resources().released_count(), 1);
    }

    #[test]
    fn reused_job_id_reaches_the_live_entry() {
        let mut store = SessionStore::new();
        let removed = in_progress(&mut store, "old.mp4", "t1");
        store.remove_video(&removed);
        assert!(store.is_orphaned(&JobId::new("t1")));

        let live = in_progress(&mut store, "new.mp4", "t1");
        assert!(!store.is_orphaned(&JobId::new("t1")));
        assert_eq!(
            store.apply_job_status(&removed, &JobId::new("t1"), ProcessingStatus::Completed),
            StatusUpdate::Missing
        );
        assert_eq!(
            store.apply_job_status(&live, &JobId::new("t1"), ProcessingStatus::Completed),
            StatusUpdate::Applied
        );
        assert_eq!(store.video(&live).unwrap().status, ProcessingStatus::Completed);
        assert!(store.pollable_jobs().is_empty());
    }

    #[test]
    fn removing_another_video_keeps_active_pointer() {
        let mut store = SessionStore::new();
        let keep = store.add_video(clip("keep.mp4"));
        let drop = store.add_video(clip("drop.mp4"));
        store.set_active_video(Some(&keep));

        store.remove_video(&drop);
        assert_eq!(store.active_video_id(), Some(&keep));
    }

    #[test]
    fn job_started_after_removal_is_orphaned() {
        let mut store = SessionStore::new();
        let id = store.add_video(clip("clip.mp4"));
        store.remove_video(&id);

        assert_eq!(store.start_job(&id, JobId::new("t9")), StatusUpdate::Missing);
        assert!(store.is_orphaned(&JobId::new("t9")));
    }

    #[test]
    fn mismatched_job_ids_are_discarded() {
        let mut store = SessionStore::new();
        let id = in_progress(&mut store, "clip.mp4", "t1");

        assert_eq!(
            store.apply_job_status(&id, &JobId::new("other"), ProcessingStatus::Failed),
            StatusUpdate::Missing
        );
        assert_eq!(store.video(&id).unwrap().status, ProcessingStatus::InProgress);
    }

    #[test]
    fn unknown_video_cannot_become_active() {
        let mut store = SessionStore::new();
        assert!(!store.set_active_video(Some(&VideoId::from("nope"))));
        assert!(store.active_video_id().is_none());
    }

    #[test]
    fn selecting_a_video_drops_the_staged_attachment() {
        let mut store = SessionStore::new();
        let id = store.add_video(clip("clip.mp4"));
        let handle = store.stage_attachment(image("a.png"));

        assert!(store.select_video(&id));
        assert!(store.attachment().is_none());
        assert!(!store.resources().is_live(&handle));
        assert_eq!(store.active_video_id(), Some(&id));
    }

    #[test]
    fn completed_latest_video_is_auto_selected() {
        let mut store = SessionStore::new();
        let older = in_progress(&mut store, "a.mp4", "t1");
        let newer = in_progress(&mut store, "b.mp4", "t2");

        store.apply_job_status(&older, &JobId::new("t1"), ProcessingStatus::Completed);
        assert!(store.active_video_id().is_none());

        store.apply_job_status(&newer, &JobId::new("t2"), ProcessingStatus::Completed);
        assert_eq!(store.active_video_id(), Some(&newer));
    }

    #[test]
    fn context_prefers_active_then_latest() {
        let mut store = SessionStore::new();
        assert!(store
            .resolve_video_context(VideoContextPolicy::AnyUploaded)
            .is_none());

        let a = in_progress(&mut store, "a.mp4", "t1");
        let b = in_progress(&mut store, "b.mp4", "t2");
        let latest = store.resolve_video_context(VideoContextPolicy::AnyUploaded);
        assert_eq!(latest.map(|v| &v.id), Some(&b));

        store.set_active_video(Some(&a));
        let active = store.resolve_video_context(VideoContextPolicy::AnyUploaded);
        assert_eq!(active.map(|v| &v.id), Some(&a));
    }

    #[test]
    fn completed_only_policy_skips_unfinished_videos() {
        let mut store = SessionStore::new();
        let done = in_progress(&mut store, "done.mp4", "t1");
        store.apply_job_status(&done, &JobId::new("t1"), ProcessingStatus::Completed);
        let busy = in_progress(&mut store, "busy.mp4", "t2");
        store.set_active_video(Some(&busy));

        let context = store.resolve_video_context(VideoContextPolicy::CompletedOnly);
        assert_eq!(context.map(|v| &v.id), Some(&done));

        store.remove_video(&done);
        assert!(store
            .resolve_video_context(VideoContextPolicy::CompletedOnly)
            .is_none());
    }
}
