//! Playback surface adapter
//!
//! A surface is one of the two playback slots. It wraps whichever backend
//! currently renders that slot: a live playback engine, a degraded fallback
//! embed with no event feedback, or nothing at all (detached, e.g. after
//! engine construction failed). The adapter normalizes readiness and keeps
//! the per-surface fault bookkeeping the fallback ladder consults.

use crate::{
    engine::PlaybackEngine,
    types::{PlaybackState, SurfaceId, VideoId},
    Error, Result,
};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A degraded embedding of a single video, used when no live engine is
/// available. Offers no event feedback; readiness is inferred from the
/// identifier marker it carries.
#[derive(Debug, Clone)]
pub struct FallbackEmbed {
    pub video: VideoId,
    pub autoplay: bool,
    pub installed_at: Instant,
}

/// What currently renders this surface
pub enum SurfaceBackend {
    /// A live playback engine with event callbacks
    Live(Box<dyn PlaybackEngine>),
    /// Alternate embedding transport, no event feedback
    Embed(FallbackEmbed),
    /// No playback capability at all
    Detached,
}

/// One of the two playback slots
pub struct Surface {
    id: SurfaceId,
    backend: SurfaceBackend,
    /// Engine construction callback seen
    engine_ready: bool,
    /// Content readiness derived from the normalized state signal
    ready: bool,
    last_state: Option<PlaybackState>,
    last_playing_at: Option<Instant>,
    substitution_attempted: bool,
    alternate_embed_attempted: bool,
    /// Automated recovery stopped for the current fault episode
    escalated: bool,
}

impl Surface {
    pub fn new(id: SurfaceId, backend: SurfaceBackend) -> Self {
        Self {
            id,
            backend,
            engine_ready: false,
            ready: false,
            last_state: None,
            last_playing_at: None,
            substitution_attempted: false,
            alternate_embed_attempted: false,
            escalated: false,
        }
    }

    /// A surface with no playback capability
    pub fn detached(id: SurfaceId) -> Self {
        Self::new(id, SurfaceBackend::Detached)
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn is_live(&self) -> bool {
        matches!(self.backend, SurfaceBackend::Live(_))
    }

    /// The identifier marker of an installed fallback embed, if any
    pub fn embed_video(&self) -> Option<&VideoId> {
        self.fallback_embed().map(|embed| &embed.video)
    }

    /// The installed fallback embed, if any; hosts render from this
    pub fn fallback_embed(&self) -> Option<&FallbackEmbed> {
        match &self.backend {
            SurfaceBackend::Embed(embed) => Some(embed),
            _ => None,
        }
    }

    /// Flip a preload-installed embed to autoplaying
    ///
    /// A cutover must never foreground idle content; an embed cued without
    /// autoplay starts here when its surface becomes current.
    pub fn start_embed(&mut self) {
        if let SurfaceBackend::Embed(embed) = &mut self.backend {
            if !embed.autoplay {
                debug!(surface = %self.id, video = %embed.video, "starting fallback embed");
                embed.autoplay = true;
            }
        }
    }

    pub fn engine_ready(&self) -> bool {
        self.engine_ready
    }

    /// Whether the surface can participate in rotation at all
    ///
    /// A live engine counts once its construction callback arrived; an embed
    /// or detached backend has no callback to wait for.
    pub fn is_up(&self) -> bool {
        !self.is_live() || self.engine_ready
    }

    /// Engine construction finished; the surface accepts calls
    pub fn mark_engine_ready(&mut self) {
        self.engine_ready = true;
        self.ready = true;
    }

    pub fn last_state(&self) -> Option<PlaybackState> {
        self.last_state
    }

    /// Whether this surface can be switched to for the given identifier
    ///
    /// A live engine answers from the normalized readiness flag; a fallback
    /// embed answers from its identifier marker.
    pub fn ready_for(&self, video: &VideoId) -> bool {
        match &self.backend {
            SurfaceBackend::Live(_) => self.ready,
            SurfaceBackend::Embed(embed) => embed.video == *video,
            SurfaceBackend::Detached => false,
        }
    }

    /// Record a normalized state change from the engine
    pub fn observe_state(&mut self, state: PlaybackState, now: Instant) {
        self.last_state = Some(state);
        if state == PlaybackState::Playing {
            self.last_playing_at = Some(now);
        }
        if state.is_ready() {
            self.ready = true;
        } else if state.is_not_ready() {
            self.ready = false;
        }
        debug!(surface = %self.id, state = %state, ready = self.ready, "surface state");
    }

    /// Engines sometimes report a restriction error spuriously mid-playback;
    /// active playback within the window is treated as ground truth.
    pub fn recently_playing(&self, now: Instant, window: Duration) -> bool {
        if self.last_state == Some(PlaybackState::Playing) {
            return true;
        }
        self.last_playing_at
            .is_some_and(|at| now.saturating_duration_since(at) < window)
    }

    /// A command-initiated cue/load starts a new fault episode: the
    /// substitution budget and escalation latch reset.
    pub fn begin_episode(&mut self) {
        self.substitution_attempted = false;
        self.alternate_embed_attempted = false;
        self.escalated = false;
    }

    pub fn substitution_attempted(&self) -> bool {
        self.substitution_attempted
    }

    pub fn record_substitution(&mut self) {
        self.substitution_attempted = true;
    }

    pub fn alternate_embed_attempted(&self) -> bool {
        self.alternate_embed_attempted
    }

    pub fn escalated(&self) -> bool {
        self.escalated
    }

    pub fn mark_escalated(&mut self) {
        self.escalated = true;
    }

    /// Prepare playback with visible effects allowed
    pub async fn load(&self, video: &VideoId) -> Result<()> {
        match &self.backend {
            SurfaceBackend::Live(engine) => engine.load(video).await,
            _ => Err(Error::EngineUnavailable { surface: self.id }),
        }
    }

    /// Prepare playback silently
    pub async fn cue(&self, video: &VideoId) -> Result<()> {
        match &self.backend {
            SurfaceBackend::Live(engine) => engine.cue(video).await,
            _ => Err(Error::EngineUnavailable { surface: self.id }),
        }
    }

    pub async fn play(&self) -> Result<()> {
        match &self.backend {
            SurfaceBackend::Live(engine) => engine.play().await,
            _ => Err(Error::EngineUnavailable { surface: self.id }),
        }
    }

    pub async fn stop(&self) -> Result<()> {
        match &self.backend {
            SurfaceBackend::Live(engine) => engine.stop().await,
            _ => Err(Error::EngineUnavailable { surface: self.id }),
        }
    }

    /// Replace the backend with a fallback embed for `video`
    ///
    /// A live engine is destroyed first (destroy-then-reconstruct, never
    /// leak). The embed counts as the surface's one alternate-embedding
    /// attempt for this fault episode.
    pub async fn install_embed(&mut self, video: VideoId, autoplay: bool, now: Instant) {
        if let SurfaceBackend::Live(engine) = &self.backend {
            if let Err(error) = engine.destroy().await {
                warn!(surface = %self.id, %error, "engine destroy failed");
            }
        }
        debug!(surface = %self.id, video = %video, autoplay, "installing fallback embed");
        self.alternate_embed_attempted = true;
        self.ready = false;
        self.last_state = None;
        self.backend = SurfaceBackend::Embed(FallbackEmbed {
            video,
            autoplay,
            installed_at: now,
        });
    }

    /// Tear down the backend on shutdown
    pub async fn destroy(&mut self) {
        if let SurfaceBackend::Live(engine) = &self.backend {
            if let Err(error) = engine.destroy().await {
                warn!(surface = %self.id, %error, "engine destroy failed");
            }
        }
        self.backend = SurfaceBackend::Detached;
        self.ready = false;
    }
}
