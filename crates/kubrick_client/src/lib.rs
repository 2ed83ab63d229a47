pub mod api;
pub mod client_trait;
pub mod dispatcher;
pub mod error;
pub mod pipeline;
pub mod poller;
pub mod utils;

pub use api::client::KubrickClient;
pub use api::models::{ChatRequest, ChatResponse, RemoteTaskStatus};
pub use client_trait::KubrickApi;
pub use dispatcher::{build_chat_request, ChatContext, ChatDispatcher, ChatTurn, FALLBACK_REPLY};
pub use error::{ApiError, PipelineError};
pub use pipeline::{SubmittedJob, UploadPipeline};
pub use poller::{PollReport, StatusPoller};
