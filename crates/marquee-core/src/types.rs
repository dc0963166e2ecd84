//! Core types for Marquee

use serde::{Deserialize, Serialize};

/// Identifier of an externally-hosted video
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VideoId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for VideoId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the two playback slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceId {
    A,
    B,
}

impl SurfaceId {
    /// The other slot
    pub fn other(&self) -> SurfaceId {
        match self {
            SurfaceId::A => SurfaceId::B,
            SurfaceId::B => SurfaceId::A,
        }
    }

    pub const ALL: [SurfaceId; 2] = [SurfaceId::A, SurfaceId::B];
}

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceId::A => write!(f, "A"),
            SurfaceId::B => write!(f, "B"),
        }
    }
}

/// Normalized playback state reported by an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl PlaybackState {
    /// Whether this state means the surface can be switched to
    pub fn is_ready(&self) -> bool {
        matches!(self, PlaybackState::Cued | PlaybackState::Playing)
    }

    /// Whether this state definitively means not ready
    pub fn is_not_ready(&self) -> bool {
        matches!(self, PlaybackState::Unstarted | PlaybackState::Buffering)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Unstarted => write!(f, "unstarted"),
            PlaybackState::Ended => write!(f, "ended"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Buffering => write!(f, "buffering"),
            PlaybackState::Cued => write!(f, "cued"),
        }
    }
}

/// Remote command driving the rotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Silently prepare the next surface for a video
    Preload(VideoId),
    /// Cut over to a video, preloading first if necessary
    Play(VideoId),
}

impl Command {
    pub fn video(&self) -> &VideoId {
        match self {
            Command::Preload(v) | Command::Play(v) => v,
        }
    }
}

/// Wire shape of one command-poll response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(default, rename = "videoId", skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

/// Outcome of interpreting a poll response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPoll {
    /// Absent or blank `cmd`, or a command with no target: no-op tick
    Idle,
    /// A well-formed command
    Command(Command),
    /// Unknown command tag, logged and ignored
    Unknown(String),
}

impl PollResponse {
    /// Interpret the response; blank fields are treated as absent
    pub fn into_parsed(self) -> ParsedPoll {
        let cmd = match self.cmd.as_deref().map(str::trim) {
            None | Some("") => return ParsedPoll::Idle,
            Some(cmd) => cmd,
        };
        let video = match self.video_id.as_deref().map(str::trim) {
            None | Some("") => return ParsedPoll::Idle,
            Some(id) => VideoId::from(id),
        };
        match cmd {
            "PRELOAD" => ParsedPoll::Command(Command::Preload(video)),
            "PLAY" => ParsedPoll::Command(Command::Play(video)),
            other => ParsedPoll::Unknown(other.to_string()),
        }
    }
}

/// State tag reported upstream on the feedback endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackState {
    Preloading,
    Ready,
    Playing,
}

impl std::fmt::Display for FeedbackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedbackState::Preloading => write!(f, "preloading"),
            FeedbackState::Ready => write!(f, "ready"),
            FeedbackState::Playing => write!(f, "playing"),
        }
    }
}

/// Fire-and-forget state report to the command source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub state: FeedbackState,
    #[serde(rename = "videoId")]
    pub video_id: VideoId,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl FeedbackEvent {
    /// Build an event stamped with the current wall clock
    pub fn now(state: FeedbackState, video_id: VideoId) -> Self {
        Self {
            state,
            video_id,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Rotation state machine states (of the rotation, not of a single surface)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationState {
    /// No pending identifier
    Idle,
    /// Next surface preparing an identifier, not yet confirmed ready
    Preloading,
    /// Next surface confirmed ready with the target identifier
    ArmedForSwitch,
    /// Cutover in progress
    Switching,
}

impl RotationState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: RotationState) -> bool {
        use RotationState::*;
        matches!(
            (self, target),
            // From Idle
            (Idle, Preloading) |
            // From Preloading
            (Preloading, ArmedForSwitch) | (Preloading, Switching) |
            // From ArmedForSwitch
            (ArmedForSwitch, Switching) | (ArmedForSwitch, Preloading) |
            // From Switching
            (Switching, Idle)
        )
    }
}

impl std::fmt::Display for RotationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationState::Idle => write!(f, "idle"),
            RotationState::Preloading => write!(f, "preloading"),
            RotationState::ArmedForSwitch => write!(f, "armed_for_switch"),
            RotationState::Switching => write!(f, "switching"),
        }
    }
}

/// Player configuration
///
/// The five timing constants are independent of each other; none is derived
/// from another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Command poll cadence in milliseconds
    pub command_poll_interval_ms: u64,
    /// Readiness poll cadence in milliseconds (PLAY slow path)
    pub readiness_poll_interval_ms: u64,
    /// Fixed wait before optimistically reporting `ready` after a preload
    pub settle_delay_ms: u64,
    /// Same-code errors closer together than this count toward a burst
    pub burst_window_ms: u64,
    /// Burst count at which a surface is escalated to the user notice
    pub burst_threshold: u32,
    /// Restriction errors this close to an observed `playing` are ignored
    pub playing_through_window_ms: u64,
    /// Optional cap on the PLAY readiness wait; `None` waits forever
    pub readiness_timeout_ms: Option<u64>,
    /// Known-always-embeddable placeholder for content substitution
    pub substitute_video: VideoId,
    /// Video to autoplay once both surfaces are up
    pub default_video: Option<VideoId>,
    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            command_poll_interval_ms: 100,
            readiness_poll_interval_ms: 100,
            settle_delay_ms: 1000,
            burst_window_ms: 1500,
            burst_threshold: 3,
            playing_through_window_ms: 2500,
            readiness_timeout_ms: None,
            substitute_video: VideoId::from("dQw4w9WgXcQ"),
            default_video: None,
            request_timeout_ms: 5000,
        }
    }
}
