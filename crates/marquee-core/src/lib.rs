//! Marquee Core - Kiosk Video Player Library
//!
//! This crate provides the core of a kiosk-style continuous video display:
//! - Dual-surface rotation with silent preload and gapless cutover
//! - Remote PRELOAD/PLAY command polling and state feedback
//! - Playback-engine boundary with normalized states and error codes
//! - Layered failure recovery: content substitution, alternate embedding,
//!   manual-intervention notice
//! - Error-burst classification to keep noise from exhausting the ladder
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Marquee Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐        ┌──────────────────────────────┐       │
//! │  │   Command/   │        │   Dual-Surface Rotation      │       │
//! │  │   Feedback   │───────▶│        Controller            │       │
//! │  │   Channel    │◀───────│  (current / next surfaces)   │       │
//! │  └──────────────┘        └──────┬────────────────┬──────┘       │
//! │                                 │                │              │
//! │                          ┌──────┴──────┐  ┌──────┴──────┐       │
//! │                          │   Surface   │  │   Surface   │       │
//! │                          │  Adapter A  │  │  Adapter B  │       │
//! │                          └──────┬──────┘  └──────┬──────┘       │
//! │                                 │                │              │
//! │                          ┌──────┴────────────────┴──────┐       │
//! │                          │  Fallback Ladder + Burst     │       │
//! │                          │        Classifier            │       │
//! │                          └──────────────────────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod channel;
pub mod engine;
pub mod error;
pub mod faults;
pub mod rotation;
pub mod surface;
pub mod types;

pub use channel::{feedback_channel, CommandChannel, ControlEndpoints};
pub use engine::{
    engine_event_channel, DisplayHost, EngineEvent, EngineEventReceiver, EngineEventSender,
    EngineFactory, EngineSignal, PlaybackEngine,
};
pub use error::{Error, FaultClass, Result};
pub use faults::{
    BurstClassifier, EscalationReason, FallbackLadder, FaultContext, IgnoreReason, RecoveryAction,
};
pub use rotation::RotationController;
pub use surface::{FallbackEmbed, Surface, SurfaceBackend};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Marquee Core initialized");
}
