//! Media host abstraction
//!
//! The pool never touches a concrete player. It drives `MediaElement`
//! handles obtained from a `MediaHost`, the same way page code drives DOM
//! media elements: set a source, load, seek, pause, and an asynchronous
//! `play()` that the host's autoplay policy may reject.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

/// Why the host refused a `play()` call
///
/// Expected outcome, not an application error: the caller decides what a
/// rejection means for the run.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum PlayRejection {
    /// Autoplay policy: no user activation covers this call
    #[error("NotAllowedError: {0}")]
    NotAllowed(String),

    /// Play request interrupted (pause or new load before it resolved)
    #[error("AbortError: {0}")]
    Aborted(String),

    /// No usable source bound to the element
    #[error("NotSupportedError: {0}")]
    NotSupported(String),
}

/// One reusable playback resource
///
/// Methods take `&self`; implementations use interior mutability because a
/// handle is shared between the pool and an in-flight `play()`.
#[async_trait]
pub trait MediaElement: Send + Sync + Debug {
    /// Currently referenced content locator
    fn source(&self) -> Option<String>;

    /// Replace the referenced content (does not load)
    fn set_source(&self, source: &str);

    /// Start (re)loading the referenced content
    fn load(&self);

    /// Move the playback position, in seconds
    fn seek(&self, position_secs: f64);

    fn pause(&self);

    fn is_paused(&self) -> bool;

    /// Request playback; resolves once playback started or was refused
    async fn play(&self) -> Result<(), PlayRejection>;
}

/// Supplier of playback resources and source of user activation
pub trait MediaHost: Send + Sync {
    /// Create the element backing pool slot `slot_index`
    ///
    /// `None` means the host has no resource for that slot.
    fn create_element(&self, slot_index: usize) -> Option<Arc<dyn MediaElement>>;

    /// Record a direct user gesture (the click that starts a run)
    fn grant_user_activation(&self);
}

/// Point `element` at `source`, reloading only when it differs
///
/// Returns true when a reload was triggered.
pub fn bind_source(element: &dyn MediaElement, source: &str) -> bool {
    if element.source().as_deref() == Some(source) {
        return false;
    }
    element.set_source(source);
    element.load();
    true
}
