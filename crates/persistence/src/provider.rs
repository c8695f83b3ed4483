//! Collaborators the engine consults on every call: retention settings and
//! the analytics-session correlation lookup.

use std::sync::{Arc, RwLock};

use retention::RetentionSettings;

use crate::SessionId;

/// Synchronous, non-blocking source of the current retention caps.
///
/// Returning `None` means "nothing resolved yet"; the engine then falls back
/// to [`RetentionSettings::default`].
pub trait SettingsProvider: Send + Sync {
    fn current_settings(&self) -> Option<RetentionSettings>;
}

impl SettingsProvider for RetentionSettings {
    fn current_settings(&self) -> Option<RetentionSettings> {
        Some(*self)
    }
}

/// Settings slot shared with whatever resolves settings for the host.
///
/// Clones share the slot, so the host keeps one handle to publish new
/// values while the engine reads through another.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Option<RetentionSettings>>>,
}

impl SharedSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(settings: RetentionSettings) -> Self {
        let shared = Self::new();
        shared.set(settings);
        shared
    }

    /// Publish a newly resolved value.
    pub fn set(&self, settings: RetentionSettings) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some(settings);
        }
    }

    /// Forget the resolved value; readers fall back to defaults.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = None;
        }
    }
}

impl SettingsProvider for SharedSettings {
    fn current_settings(&self) -> Option<RetentionSettings> {
        self.inner.read().ok().and_then(|guard| *guard)
    }
}

/// Maps a crash session to the analytics session it belongs to.
pub trait CorrelationLookup: Send + Sync {
    fn correlation_id_for(&self, session_id: &SessionId) -> Option<String>;
}

impl<F> CorrelationLookup for F
where
    F: Fn(&SessionId) -> Option<String> + Send + Sync,
{
    fn correlation_id_for(&self, session_id: &SessionId) -> Option<String> {
        self(session_id)
    }
}

/// Lookup for hosts without an analytics-session subsystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCorrelation;

impl CorrelationLookup for NoCorrelation {
    fn correlation_id_for(&self, _session_id: &SessionId) -> Option<String> {
        None
    }
}
