//! Wire types of the Kubrick HTTP API.

use kubrick_core::ProcessingStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct UploadVideoResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub video_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessVideoRequest<'a> {
    pub video_path: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessVideoResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub task_id: String,
}

/// Task status as reported by `GET /task-status/{task_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteTaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    /// The service does not know the task, e.g. after a restart.
    NotFound,
}

impl RemoteTaskStatus {
    /// The library status to merge, if this is a terminal report.
    pub fn terminal_status(&self) -> Option<ProcessingStatus> {
        match self {
            Self::Completed => Some(ProcessingStatus::Completed),
            Self::Failed => Some(ProcessingStatus::Failed),
            Self::Pending | Self::InProgress | Self::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatusResponse {
    #[serde(default)]
    pub task_id: Option<String>,
    pub status: RemoteTaskStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    #[serde(default)]
    pub clip_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetMemoryResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_chat_request_only_carries_the_message() {
        let request = ChatRequest {
            message: "hello".to_string(),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "message": "hello" })
        );
    }

    #[test]
    fn task_status_parses_service_values() {
        let parsed: TaskStatusResponse =
            serde_json::from_str(r#"{"task_id": "t1", "status": "not_found"}"#).unwrap();
        assert_eq!(parsed.status, RemoteTaskStatus::NotFound);
        assert_eq!(parsed.status.terminal_status(), None);

        let parsed: TaskStatusResponse =
            serde_json::from_str(r#"{"status": "completed"}"#).unwrap();
        assert_eq!(
            parsed.status.terminal_status(),
            Some(ProcessingStatus::Completed)
        );
    }

    #[test]
    fn unknown_task_status_is_a_decode_error() {
        let parsed = serde_json::from_str::<TaskStatusResponse>(r#"{"status": "exploded"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn chat_response_clip_is_optional() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(parsed.clip_path, None);
    }
}
