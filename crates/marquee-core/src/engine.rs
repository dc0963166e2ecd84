//! Playback engine boundary
//!
//! The playback engine is an opaque capability supplied by the host
//! environment, one instance per surface. It accepts load/cue/play/stop/
//! destroy and delivers ready, state-changed, and error callbacks back to
//! the core as [`EngineEvent`]s over an unbounded channel.

use crate::{
    types::{PlaybackState, SurfaceId, VideoId},
    Result,
};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Callback classes delivered by a playback engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The engine instance finished constructing and accepts calls
    Ready,
    /// Normalized playback-state change
    StateChange(PlaybackState),
    /// Engine-reported integer error code
    Error(u32),
}

/// An engine event tagged with the surface that raised it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSignal {
    pub surface: SurfaceId,
    pub event: EngineEvent,
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineSignal>;
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineSignal>;

/// Create the channel engines report their callbacks on
pub fn engine_event_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}

/// One playback-engine instance bound to a single surface
///
/// Every call may fail with [`Error::EngineUnavailable`] when the underlying
/// engine reference is gone (e.g. after a fallback substitution); callers
/// must route through the alternate-embedding path rather than retry.
///
/// [`Error::EngineUnavailable`]: crate::Error::EngineUnavailable
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// Prepare playback with visible effects allowed
    async fn load(&self, video: &VideoId) -> Result<()>;

    /// Prepare playback silently (used for preloading)
    async fn cue(&self, video: &VideoId) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn destroy(&self) -> Result<()>;
}

/// Constructs playback engines, one per surface
///
/// Construction may fail outright; the surface then starts detached and the
/// first command routed to it takes the alternate-embedding path.
pub trait EngineFactory: Send + Sync {
    fn create(&self, surface: SurfaceId) -> Result<Box<dyn PlaybackEngine>>;
}

/// Host-environment display capabilities: surface visibility and the
/// user-facing manual-intervention notice
///
/// `set_foreground` must leave exactly one surface visually foregrounded.
/// The notice is transient and auto-dismissing; it is never queryable by the
/// command channel.
pub trait DisplayHost: Send + Sync {
    fn set_foreground(&self, surface: SurfaceId);

    fn show_notice(&self, message: &str);
}
