//! kubrick_core - Session state and media bookkeeping for the Kubrick client
//!
//! This crate holds everything the client keeps in memory between network calls:
//! - `config` - Client configuration (file + environment)
//! - `media` - Raw media payloads and their kinds
//! - `message` - The append-only chat message log entries
//! - `video` - Video library entries and their processing status
//! - `resources` - Local preview handles and their release bookkeeping
//! - `store` - The session store that owns all of the above

pub mod config;
pub mod media;
pub mod message;
pub mod resources;
pub mod store;
pub mod video;

// Re-export commonly used types
pub use config::{Config, ConfigError, VideoContextPolicy};
pub use media::{MediaFile, MediaKind};
pub use message::{MediaRef, Message, MessageId, Role};
pub use resources::{PreviewHandle, ResourceManager};
pub use store::{AttachedFile, SessionStore, SharedSession, StatusUpdate};
pub use video::{JobId, ProcessingStatus, UploadedVideo, VideoId};
