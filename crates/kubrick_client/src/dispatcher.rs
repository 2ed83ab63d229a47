//! Chat turns: request construction, sending, and logging the reply.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kubrick_core::{
    Config, MediaFile, MediaKind, MediaRef, MessageId, Role, SharedSession, VideoContextPolicy,
};
use log::{debug, error};

use crate::api::models::ChatRequest;
use crate::client_trait::KubrickApi;
use crate::utils::media_file_name;

/// Assistant reply logged when the chat call fails for any reason.
pub const FALLBACK_REPLY: &str =
    "I'm sorry, Dave. I'm experiencing some technical difficulties. Please try again.";

/// Everything a chat request is built from.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatContext<'a> {
    pub text: &'a str,
    pub attachment: Option<&'a MediaFile>,
    /// Remote path of the video resolved as context, if any.
    pub video_path: Option<&'a str>,
    /// Rebase `video_path` onto this directory when set.
    pub media_dir: Option<&'a str>,
}

/// Message text for a turn, falling back to a placeholder for bare attachments.
pub fn message_text(text: &str, attachment: Option<MediaKind>) -> String {
    match attachment {
        Some(kind) if text.trim().is_empty() => kind.placeholder().to_string(),
        _ => text.to_string(),
    }
}

pub fn build_chat_request(context: &ChatContext<'_>) -> ChatRequest {
    let message = message_text(context.text, context.attachment.map(MediaFile::kind));

    let image_base64 = context
        .attachment
        .filter(|file| file.kind() == MediaKind::Image)
        .map(|file| STANDARD.encode(file.bytes()));

    let video_path = context.video_path.map(|path| match context.media_dir {
        Some(dir) => format!("{}/{}", dir.trim_end_matches('/'), media_file_name(path)),
        None => path.to_string(),
    });

    ChatRequest {
        message,
        image_base64,
        video_path,
    }
}

/// Result of one dispatched turn.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub user_message: MessageId,
    pub assistant_message: MessageId,
    pub request: ChatRequest,
    /// Assistant text as logged, which is [`FALLBACK_REPLY`] on failure.
    pub reply: String,
    pub clip_path: Option<String>,
    /// `true` when the assistant message is the local fallback.
    pub fallback: bool,
}

pub struct ChatDispatcher {
    api: Arc<dyn KubrickApi>,
    session: SharedSession,
    policy: VideoContextPolicy,
    media_dir: Option<String>,
}

impl ChatDispatcher {
    pub fn new(api: Arc<dyn KubrickApi>, session: SharedSession) -> Self {
        Self {
            api,
            session,
            policy: VideoContextPolicy::default(),
            media_dir: None,
        }
    }

    pub fn from_config(api: Arc<dyn KubrickApi>, session: SharedSession, config: &Config) -> Self {
        Self::new(api, session)
            .with_policy(config.video_context)
            .with_media_dir(config.media_dir.clone())
    }

    pub fn with_policy(mut self, policy: VideoContextPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_media_dir(mut self, media_dir: Option<String>) -> Self {
        self.media_dir = media_dir;
        self
    }

    /// Sends `text` together with the staged attachment.
    ///
    /// Returns `None` without touching the log when there is neither text nor
    /// an attachment. Otherwise exactly one user and one assistant message are
    /// appended; failures produce [`FALLBACK_REPLY`] rather than an error.
    pub async fn send(&self, text: &str) -> Option<ChatTurn> {
        let (request, user_message) = {
            let mut session = self.session.write().await;
            if text.trim().is_empty() && session.attachment().is_none() {
                return None;
            }

            let attachment = session.take_attachment();
            let video_path = session
                .resolve_video_context(self.policy)
                .and_then(|video| video.remote_path.clone());
            if video_path.is_none() {
                debug!("No video context for this turn");
            }

            let request = build_chat_request(&ChatContext {
                text,
                attachment: attachment.as_ref().map(|staged| &staged.file),
                video_path: video_path.as_deref(),
                media_dir: self.media_dir.as_deref(),
            });
            let media = attachment.as_ref().map(|staged| MediaRef {
                url: staged.preview.to_string(),
                kind: staged.kind(),
            });
            let user_message =
                session.append_message(Role::User, request.message.clone(), media, None);
            (request, user_message)
        };

        let (content, clip_path, fallback) = match self.api.chat(&request).await {
            Ok(response) => (response.message, response.clip_path, false),
            Err(err) => {
                error!("Error calling chat API: {}", err);
                (FALLBACK_REPLY.to_string(), None, true)
            }
        };

        let assistant_message = self.session.write().await.append_message(
            Role::Assistant,
            content.clone(),
            None,
            clip_path.clone(),
        );

        Some(ChatTurn {
            user_message,
            assistant_message,
            request,
            reply: content,
            clip_path,
            fallback,
        })
    }
}
