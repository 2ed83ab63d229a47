//! Local preview handles.
//!
//! A handle is a `blob:` style reference to bytes held in memory. It never
//! touches the network or disk, and must be released exactly once when its
//! owner goes away.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::media::{MediaFile, MediaKind};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PreviewHandle(String);

impl PreviewHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
struct PreviewEntry {
    name: String,
    kind: MediaKind,
    size: usize,
}

/// Handle table for local previews.
#[derive(Debug, Default)]
pub struct ResourceManager {
    live: HashMap<PreviewHandle, PreviewEntry>,
    released: HashSet<PreviewHandle>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, file: &MediaFile) -> PreviewHandle {
        let handle = PreviewHandle(format!("blob:kubrick/{}", Uuid::new_v4()));
        debug!(
            "Acquired preview {} for {} {} ({} bytes)",
            handle,
            file.kind(),
            file.name(),
            file.len()
        );
        self.live.insert(
            handle.clone(),
            PreviewEntry {
                name: file.name().to_string(),
                kind: file.kind(),
                size: file.len(),
            },
        );
        handle
    }

    /// Releases a handle. Returns `false` (and logs) for handles that are
    /// unknown or already released; the table is left untouched in that case.
    pub fn release(&mut self, handle: &PreviewHandle) -> bool {
        match self.live.remove(handle) {
            Some(entry) => {
                debug!(
                    "Released preview {} for {} {} ({} bytes)",
                    handle, entry.kind, entry.name, entry.size
                );
                self.released.insert(handle.clone());
                true
            }
            None if self.released.contains(handle) => {
                warn!("Preview {} was already released", handle);
                false
            }
            None => {
                warn!("Attempted to release unknown preview {}", handle);
                false
            }
        }
    }

    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        self.live.contains_key(handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn released_count(&self) -> usize {
        self.released.len()
    }
}
