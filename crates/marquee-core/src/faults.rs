//! Fault policy: burst classification and the fallback ladder
//!
//! Playback engines can emit rapid duplicate error events for a single
//! underlying fault. The classifier de-duplicates those so the ladder's
//! single-attempt budgets are spent on real faults, not noise. The ladder
//! itself is pure decision logic; the rotation controller executes whatever
//! action it returns.

use crate::{
    error::FaultClass,
    types::{SurfaceId, VideoId},
};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
struct BurstState {
    last_code: Option<u32>,
    last_at: Option<Instant>,
    count: u32,
}

/// Tracks per-surface error timing and codes to distinguish transient noise
/// from systemic failure.
#[derive(Debug)]
pub struct BurstClassifier {
    window: Duration,
    states: [BurstState; 2],
}

impl BurstClassifier {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            states: [BurstState::default(); 2],
        }
    }

    fn slot(&mut self, surface: SurfaceId) -> &mut BurstState {
        match surface {
            SurfaceId::A => &mut self.states[0],
            SurfaceId::B => &mut self.states[1],
        }
    }

    /// Record an error and return the updated burst count for the surface
    ///
    /// Same code within the window increments the count; anything else
    /// resets it to 1.
    pub fn observe(&mut self, surface: SurfaceId, code: u32, now: Instant) -> u32 {
        let window = self.window;
        let state = self.slot(surface);

        let within_window = state
            .last_at
            .is_some_and(|at| now.saturating_duration_since(at) < window);
        if within_window && state.last_code == Some(code) {
            state.count += 1;
        } else {
            state.count = 1;
        }
        state.last_at = Some(now);
        state.last_code = Some(code);

        debug!(surface = %surface, code, burst = state.count, "error observed");
        state.count
    }

    /// Current burst count without recording anything
    pub fn count(&self, surface: SurfaceId) -> u32 {
        match surface {
            SurfaceId::A => self.states[0].count,
            SurfaceId::B => self.states[1].count,
        }
    }

    /// Forget the surface's error history (new fault episode)
    pub fn reset(&mut self, surface: SurfaceId) {
        *self.slot(surface) = BurstState::default();
    }
}

/// Why the ladder gave up on automated recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationReason {
    /// Embedding refused and the alternate embedding was already tried
    EmbedRestricted,
    /// Same-code error burst crossed the threshold
    ErrorBurst,
    /// The one content substitution for this episode was already spent
    SubstituteExhausted,
}

impl EscalationReason {
    /// User-facing notice text
    pub fn notice(&self) -> &'static str {
        match self {
            EscalationReason::EmbedRestricted => {
                "This video can't be played (embedding restricted)"
            }
            EscalationReason::ErrorBurst | EscalationReason::SubstituteExhausted => {
                "This video can't be played"
            }
        }
    }
}

/// Why an error was deliberately not acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Restriction error while the surface was (recently) playing
    PlayingThrough,
    /// Known environment-dependent code with no corrective action
    BenignCode,
    /// Recovery already escalated for this fault episode
    AlreadyEscalated,
}

/// Next recovery action for a surface fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    Ignore(IgnoreReason),
    /// Re-embed the same identifier through the alternate transport
    AlternateEmbed { video: VideoId },
    /// Load the known-always-embeddable placeholder into the surface
    Substitute { video: VideoId },
    /// Stop automated recovery and show the manual-intervention notice
    GiveUp(EscalationReason),
}

/// Everything the ladder needs to know about the faulting surface
#[derive(Debug, Clone)]
pub struct FaultContext<'a> {
    pub surface: SurfaceId,
    pub code: u32,
    /// Identifier committed or pending on this surface, if known
    pub active_video: Option<&'a VideoId>,
    pub recently_playing: bool,
    pub burst_count: u32,
    pub substitution_attempted: bool,
    pub alternate_embed_attempted: bool,
    pub escalated: bool,
}

/// Ordered recovery policy: substitute content, then alternate embedding,
/// then give up.
#[derive(Debug, Clone)]
pub struct FallbackLadder {
    substitute_video: VideoId,
    burst_threshold: u32,
}

impl FallbackLadder {
    pub fn new(substitute_video: VideoId, burst_threshold: u32) -> Self {
        Self {
            substitute_video,
            burst_threshold,
        }
    }

    /// Decide the next recovery action; has no side effects
    pub fn decide(&self, ctx: &FaultContext<'_>) -> RecoveryAction {
        if ctx.escalated {
            return RecoveryAction::Ignore(IgnoreReason::AlreadyEscalated);
        }

        match FaultClass::of_code(ctx.code) {
            FaultClass::ContentRestricted => {
                // Active playback is ground truth over the error signal
                if ctx.recently_playing {
                    return RecoveryAction::Ignore(IgnoreReason::PlayingThrough);
                }
                match ctx.active_video {
                    Some(video) if !ctx.alternate_embed_attempted => {
                        RecoveryAction::AlternateEmbed {
                            video: video.clone(),
                        }
                    }
                    _ => RecoveryAction::GiveUp(EscalationReason::EmbedRestricted),
                }
            }
            FaultClass::BenignNoise => RecoveryAction::Ignore(IgnoreReason::BenignCode),
            FaultClass::Transient => {
                if ctx.burst_count >= self.burst_threshold {
                    return RecoveryAction::GiveUp(EscalationReason::ErrorBurst);
                }
                if ctx.substitution_attempted {
                    return RecoveryAction::GiveUp(EscalationReason::SubstituteExhausted);
                }
                RecoveryAction::Substitute {
                    video: self.substitute_video.clone(),
                }
            }
        }
    }
}
