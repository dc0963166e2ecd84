//! Error types for Marquee Core

use crate::types::SurfaceId;
use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Surface errors
    #[error("no live playback engine on surface {surface}")]
    EngineUnavailable { surface: SurfaceId },

    /// An engine call failed outright; engine implementations return this
    /// from load/cue/play/stop rather than inventing their own error type
    #[error("playback engine fault on surface {surface} (code {code})")]
    EngineFault { surface: SurfaceId, code: u32 },

    // Channel errors
    #[error("command poll failed: {0}")]
    CommandPoll(#[source] reqwest::Error),

    #[error("feedback post failed: {0}")]
    FeedbackPost(#[source] reqwest::Error),

    #[error("invalid control endpoint: {0}")]
    InvalidEndpoint(String),

    // Configuration errors
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Returns true if this error leaves rotation state untouched when logged
    pub fn is_channel_fault(&self) -> bool {
        matches!(self, Error::CommandPoll(_) | Error::FeedbackPost(_))
    }
}

/// Engine error codes meaning "this content refuses embedded playback"
pub const EMBED_RESTRICTED_CODES: [u32; 2] = [150, 153];

/// Known-benign engine error code ("invalid parameter", environment dependent)
pub const BENIGN_PARAMETER_CODE: u32 = 2;

/// Classification of an engine-reported integer error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// Embedding refused by the content owner
    ContentRestricted,
    /// Retrying has no corrective value; ignored outright
    BenignNoise,
    /// Generic engine fault, eligible for content substitution
    Transient,
}

impl FaultClass {
    /// Classify a raw engine error code
    pub fn of_code(code: u32) -> Self {
        if EMBED_RESTRICTED_CODES.contains(&code) {
            FaultClass::ContentRestricted
        } else if code == BENIGN_PARAMETER_CODE {
            FaultClass::BenignNoise
        } else {
            FaultClass::Transient
        }
    }
}
