//! Dual-surface rotation controller
//!
//! Owns both playback surfaces in strict rotation: one is always visible and
//! playing while the other silently prepares the next video. PRELOAD and
//! PLAY commands drive preload and cutover; engine faults are routed through
//! the fallback ladder. The controller is owned by a single task, so all
//! state mutations are serialized without locks.
//!
//! Readiness waiting is deliberately poll-based with staleness checks
//! rather than cancellation tokens: a pending wait re-validates its own
//! relevance against the pending identifier each tick and retires silently
//! when a newer command has overwritten it.

use crate::{
    engine::{DisplayHost, EngineEvent, EngineFactory, EngineSignal},
    error::FaultClass,
    faults::{BurstClassifier, FallbackLadder, FaultContext, RecoveryAction},
    surface::Surface,
    surface::SurfaceBackend,
    types::{
        Command, FeedbackEvent, FeedbackState, PlaybackState, PlayerConfig, RotationState,
        SurfaceId, VideoId,
    },
    Error,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// One-shot timer behind the optimistic `ready` feedback
#[derive(Debug)]
struct SettleTimer {
    video: VideoId,
    due_at: Instant,
}

/// Poll task waiting for the next surface to become ready for a PLAY target
///
/// Keyed by the target identifier; retires itself once the pending
/// identifier no longer matches.
#[derive(Debug)]
struct ReadinessPoll {
    video: VideoId,
    started_at: Instant,
    last_checked: Instant,
}

struct SurfacePair {
    a: Surface,
    b: Surface,
}

impl SurfacePair {
    fn get(&self, id: SurfaceId) -> &Surface {
        match id {
            SurfaceId::A => &self.a,
            SurfaceId::B => &self.b,
        }
    }

    fn get_mut(&mut self, id: SurfaceId) -> &mut Surface {
        match id {
            SurfaceId::A => &mut self.a,
            SurfaceId::B => &mut self.b,
        }
    }
}

/// The rotation controller: both surfaces, the rotation invariant, and the
/// preload/cutover algorithm.
pub struct RotationController {
    config: PlayerConfig,
    surfaces: SurfacePair,
    /// Visible, authoritative for playback; the other slot is "next"
    current: SurfaceId,
    foreground: SurfaceId,
    state: RotationState,
    current_video: Option<VideoId>,
    pending_video: Option<VideoId>,
    settle: Option<SettleTimer>,
    readiness_poll: Option<ReadinessPoll>,
    classifier: BurstClassifier,
    ladder: FallbackLadder,
    host: Arc<dyn DisplayHost>,
    feedback_tx: mpsc::UnboundedSender<FeedbackEvent>,
    /// Both surfaces have come up; commands are accepted
    started: bool,
}

impl RotationController {
    /// Create the controller and both surfaces
    ///
    /// Surface A starts foregrounded. A surface whose engine cannot be
    /// constructed starts detached; the first command routed to it takes the
    /// alternate-embedding path.
    pub fn new(
        config: PlayerConfig,
        factory: &dyn EngineFactory,
        host: Arc<dyn DisplayHost>,
        feedback_tx: mpsc::UnboundedSender<FeedbackEvent>,
    ) -> Self {
        let make_surface = |id: SurfaceId| match factory.create(id) {
            Ok(engine) => Surface::new(id, SurfaceBackend::Live(engine)),
            Err(err) => {
                warn!(surface = %id, error = %err, "engine construction failed; surface starts detached");
                Surface::detached(id)
            }
        };

        let classifier = BurstClassifier::new(Duration::from_millis(config.burst_window_ms));
        let ladder = FallbackLadder::new(config.substitute_video.clone(), config.burst_threshold);

        host.set_foreground(SurfaceId::A);
        info!(current = %SurfaceId::A, "rotation controller initialized");

        Self {
            surfaces: SurfacePair {
                a: make_surface(SurfaceId::A),
                b: make_surface(SurfaceId::B),
            },
            current: SurfaceId::A,
            foreground: SurfaceId::A,
            state: RotationState::Idle,
            current_video: None,
            pending_video: None,
            settle: None,
            readiness_poll: None,
            classifier,
            ladder,
            host,
            feedback_tx,
            started: false,
            config,
        }
    }

    pub fn state(&self) -> RotationState {
        self.state
    }

    /// The visible surface
    pub fn current_surface(&self) -> SurfaceId {
        self.current
    }

    pub fn foreground(&self) -> SurfaceId {
        self.foreground
    }

    pub fn current_video(&self) -> Option<&VideoId> {
        self.current_video.as_ref()
    }

    pub fn pending_video(&self) -> Option<&VideoId> {
        self.pending_video.as_ref()
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn surface(&self, id: SurfaceId) -> &Surface {
        self.surfaces.get(id)
    }

    /// The hidden slot being prepared
    fn next(&self) -> SurfaceId {
        self.current.other()
    }

    /// Dispatch a remote command
    pub async fn handle_command(&mut self, command: Command, now: Instant) {
        if !self.started {
            debug!(video = %command.video(), "command before surfaces ready; dropped");
            return;
        }
        match command {
            Command::Preload(video) => self.handle_preload(video, now).await,
            Command::Play(video) => self.handle_play(video, now).await,
        }
    }

    /// Process an engine callback
    pub async fn handle_engine_event(&mut self, signal: EngineSignal, now: Instant) {
        let EngineSignal { surface: sid, event } = signal;
        match event {
            EngineEvent::Ready => {
                self.surfaces.get_mut(sid).mark_engine_ready();
                info!(surface = %sid, "engine ready");
                self.maybe_start(now).await;
            }
            EngineEvent::StateChange(state) => {
                self.surfaces.get_mut(sid).observe_state(state, now);

                if state == PlaybackState::Ended && sid == self.current {
                    // Loop semantics: restart the same content, never report
                    // "ended" upstream
                    debug!(surface = %sid, "current surface ended; looping");
                    if let Err(err) = self.surfaces.get(sid).play().await {
                        debug!(surface = %sid, error = %err, "loop restart skipped");
                    }
                    return;
                }

                // Preload confirmation arms the fast path
                if sid == self.next()
                    && self.state == RotationState::Preloading
                    && self.readiness_poll.is_none()
                {
                    if let Some(pending) = self.pending_video.clone() {
                        if self.surfaces.get(sid).ready_for(&pending) {
                            self.set_state(RotationState::ArmedForSwitch);
                        }
                    }
                }
            }
            EngineEvent::Error(code) => self.handle_engine_error(sid, code, now).await,
        }
    }

    /// Timer-driven work: startup gating, the settle timer, and the
    /// readiness poll. Invoked at the command-poll cadence; the readiness
    /// poll additionally rate-limits itself to its own interval.
    pub async fn tick(&mut self, now: Instant) {
        self.maybe_start(now).await;

        if let Some(settle) = self.settle.take() {
            if now >= settle.due_at {
                if self.pending_video.as_ref() == Some(&settle.video) {
                    // Optimistic readiness signal, independent of the
                    // engine's own readiness flag
                    self.send_feedback(FeedbackState::Ready, settle.video);
                }
            } else {
                self.settle = Some(settle);
            }
        }

        if let Some(mut poll) = self.readiness_poll.take() {
            let interval = Duration::from_millis(self.config.readiness_poll_interval_ms);
            if now.saturating_duration_since(poll.last_checked) < interval {
                self.readiness_poll = Some(poll);
                return;
            }
            poll.last_checked = now;

            if self.pending_video.as_ref() != Some(&poll.video) {
                debug!(video = %poll.video, "readiness poll stale; retiring");
            } else if self.surfaces.get(self.next()).ready_for(&poll.video) {
                self.switch_to(poll.video).await;
            } else if self.readiness_timed_out(&poll, now) {
                warn!(video = %poll.video, "readiness wait timed out");
                self.host.show_notice("This video can't be played");
            } else {
                self.readiness_poll = Some(poll);
            }
        }
    }

    /// Tear down both surfaces
    pub async fn shutdown(&mut self) {
        for sid in SurfaceId::ALL {
            self.surfaces.get_mut(sid).destroy().await;
        }
        info!("rotation controller shut down");
    }

    fn readiness_timed_out(&self, poll: &ReadinessPoll, now: Instant) -> bool {
        self.config
            .readiness_timeout_ms
            .is_some_and(|ms| now.saturating_duration_since(poll.started_at) >= Duration::from_millis(ms))
    }

    async fn maybe_start(&mut self, now: Instant) {
        if self.started {
            return;
        }
        if !(self.surfaces.get(SurfaceId::A).is_up() && self.surfaces.get(SurfaceId::B).is_up()) {
            return;
        }
        self.started = true;
        info!("both surfaces up; accepting commands");

        match self.config.default_video.clone() {
            Some(video) => self.start_default(video, now).await,
            None => {
                info!("no default video configured; waiting for commands");
                self.host.show_notice("No video configured");
            }
        }
    }

    /// Autostart the configured default video on the current surface
    async fn start_default(&mut self, video: VideoId, now: Instant) {
        info!(video = %video, surface = %self.current, "starting default video");
        let current = self.current;
        self.classifier.reset(current);
        let surface = self.surfaces.get_mut(current);
        surface.begin_episode();
        match surface.load(&video).await {
            Ok(()) => {}
            Err(Error::EngineUnavailable { .. }) => {
                surface.install_embed(video.clone(), true, now).await;
            }
            Err(err) => {
                // Nothing is playing; never report otherwise
                warn!(surface = %current, error = %err, "default video load failed");
                self.host.show_notice("This video can't be played");
                return;
            }
        }
        self.current_video = Some(video.clone());
        self.send_feedback(FeedbackState::Playing, video);
    }

    async fn handle_preload(&mut self, video: VideoId, now: Instant) {
        if self.pending_video.as_ref() == Some(&video) {
            debug!(video = %video, "preload for already-pending video; no-op");
            return;
        }

        let next = self.next();
        info!(video = %video, surface = %next, "preloading");
        self.pending_video = Some(video.clone());
        self.set_state(RotationState::Preloading);
        self.send_feedback(FeedbackState::Preloading, video.clone());

        self.classifier.reset(next);
        let surface = self.surfaces.get_mut(next);
        surface.begin_episode();
        match surface.cue(&video).await {
            Ok(()) => {}
            Err(Error::EngineUnavailable { .. }) => {
                // Prepared without autoplay; the embed marker doubles as the
                // readiness signal
                surface.install_embed(video.clone(), false, now).await;
            }
            Err(err) => warn!(surface = %next, error = %err, "cue failed"),
        }

        if self.state == RotationState::Preloading && self.surfaces.get(next).ready_for(&video) {
            self.set_state(RotationState::ArmedForSwitch);
        }

        self.settle = Some(SettleTimer {
            video,
            due_at: now + Duration::from_millis(self.config.settle_delay_ms),
        });
    }

    async fn handle_play(&mut self, video: VideoId, now: Instant) {
        let next = self.next();

        // Fast path: the content was already preloaded and confirmed
        if self.pending_video.as_ref() == Some(&video) && self.surfaces.get(next).ready_for(&video)
        {
            info!(video = %video, "play fast path; next surface ready");
            self.switch_to(video).await;
            return;
        }

        info!(video = %video, surface = %next, "play slow path; loading");
        self.pending_video = Some(video.clone());
        self.set_state(RotationState::Preloading);

        self.classifier.reset(next);
        let surface = self.surfaces.get_mut(next);
        surface.begin_episode();
        match surface.load(&video).await {
            Ok(()) => {}
            Err(Error::EngineUnavailable { .. }) => {
                surface.install_embed(video.clone(), true, now).await;
            }
            Err(err) => warn!(surface = %next, error = %err, "load failed"),
        }

        self.readiness_poll = Some(ReadinessPoll {
            video,
            started_at: now,
            last_checked: now,
        });
    }

    async fn handle_engine_error(&mut self, sid: SurfaceId, code: u32, now: Instant) {
        warn!(surface = %sid, code, "engine error");

        // Restriction and benign codes never count toward a burst
        let burst_count = match FaultClass::of_code(code) {
            FaultClass::Transient => self.classifier.observe(sid, code, now),
            _ => self.classifier.count(sid),
        };

        let active_video = if sid == self.next() {
            self.pending_video.clone()
        } else {
            self.current_video.clone()
        };

        let surface = self.surfaces.get(sid);
        let ctx = FaultContext {
            surface: sid,
            code,
            active_video: active_video.as_ref(),
            recently_playing: surface.recently_playing(
                now,
                Duration::from_millis(self.config.playing_through_window_ms),
            ),
            burst_count,
            substitution_attempted: surface.substitution_attempted(),
            alternate_embed_attempted: surface.alternate_embed_attempted(),
            escalated: surface.escalated(),
        };

        match self.ladder.decide(&ctx) {
            RecoveryAction::Ignore(reason) => {
                debug!(surface = %sid, code, ?reason, "error ignored");
            }
            RecoveryAction::AlternateEmbed { video } => {
                warn!(surface = %sid, video = %video, code, "switching to alternate embedding");
                let autoplay = sid == self.current;
                self.surfaces
                    .get_mut(sid)
                    .install_embed(video, autoplay, now)
                    .await;
            }
            RecoveryAction::Substitute { video } => {
                warn!(surface = %sid, video = %video, code, "substituting placeholder content");
                let autoplay = sid == self.current;
                let surface = self.surfaces.get_mut(sid);
                surface.record_substitution();
                match surface.load(&video).await {
                    Ok(()) => {}
                    Err(Error::EngineUnavailable { .. }) => {
                        surface.install_embed(video, autoplay, now).await;
                    }
                    Err(err) => warn!(surface = %sid, error = %err, "substitute load failed"),
                }
            }
            RecoveryAction::GiveUp(reason) => {
                error!(surface = %sid, code, ?reason, "automated recovery exhausted");
                self.surfaces.get_mut(sid).mark_escalated();
                self.host.show_notice(reason.notice());
            }
        }
    }

    /// Cutover: stop the old surface, exchange roles, toggle visibility,
    /// play the new current surface, report `playing`.
    async fn switch_to(&mut self, video: VideoId) {
        self.set_state(RotationState::Switching);
        let old = self.current;
        let new = old.other();
        info!(from = %old, to = %new, video = %video, "switching surfaces");

        // Best-effort stop; failures never block the cutover
        if self.current_video.is_some() {
            if let Err(err) = self.surfaces.get(old).stop().await {
                debug!(surface = %old, error = %err, "stop before switch failed");
            }
        }

        self.current = new;
        self.foreground = new;
        self.host.set_foreground(new);

        if self.surfaces.get(new).is_live() {
            if let Err(err) = self.surfaces.get(new).play().await {
                warn!(surface = %new, error = %err, "play after switch failed");
            }
        } else {
            // A preload-installed embed is cued without autoplay; it must
            // start now that its surface is foregrounded
            self.surfaces.get_mut(new).start_embed();
        }

        self.current_video = Some(video.clone());
        self.pending_video = None;
        self.settle = None;
        self.readiness_poll = None;
        self.send_feedback(FeedbackState::Playing, video);
        self.set_state(RotationState::Idle);
    }

    fn set_state(&mut self, target: RotationState) {
        if self.state == target {
            return;
        }
        if !self.state.can_transition_to(target) {
            warn!(from = %self.state, to = %target, "unexpected rotation transition");
        }
        debug!(from = %self.state, to = %target, "rotation state");
        self.state = target;
    }

    /// Fire and forget: a lost feedback event never affects local state
    fn send_feedback(&self, state: FeedbackState, video: VideoId) {
        let event = FeedbackEvent::now(state, video);
        if self.feedback_tx.send(event).is_err() {
            debug!("feedback channel closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PlaybackEngine;
    use crate::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum EngineCall {
        Load(SurfaceId, VideoId),
        Cue(SurfaceId, VideoId),
        Play(SurfaceId),
        Stop(SurfaceId),
        Destroy(SurfaceId),
    }

    #[derive(Clone, Default)]
    struct CallLog(Arc<Mutex<Vec<EngineCall>>>);

    impl CallLog {
        fn record(&self, call: EngineCall) {
            self.0.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<EngineCall> {
            self.0.lock().unwrap().clone()
        }

        fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
            self.0.lock().unwrap().iter().filter(|c| pred(c)).count()
        }
    }

    struct MockEngine {
        surface: SurfaceId,
        calls: CallLog,
        load_fails: bool,
    }

    #[async_trait]
    impl PlaybackEngine for MockEngine {
        async fn load(&self, video: &VideoId) -> Result<()> {
            self.calls.record(EngineCall::Load(self.surface, video.clone()));
            if self.load_fails {
                return Err(Error::EngineFault {
                    surface: self.surface,
                    code: 5,
                });
            }
            Ok(())
        }

        async fn cue(&self, video: &VideoId) -> Result<()> {
            self.calls.record(EngineCall::Cue(self.surface, video.clone()));
            Ok(())
        }

        async fn play(&self) -> Result<()> {
            self.calls.record(EngineCall::Play(self.surface));
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.calls.record(EngineCall::Stop(self.surface));
            Ok(())
        }

        async fn destroy(&self) -> Result<()> {
            self.calls.record(EngineCall::Destroy(self.surface));
            Ok(())
        }
    }

    struct MockFactory {
        calls: CallLog,
        construction_fails: bool,
        load_fails: bool,
    }

    impl EngineFactory for MockFactory {
        fn create(&self, surface: SurfaceId) -> Result<Box<dyn PlaybackEngine>> {
            if self.construction_fails {
                return Err(Error::EngineUnavailable { surface });
            }
            Ok(Box::new(MockEngine {
                surface,
                calls: self.calls.clone(),
                load_fails: self.load_fails,
            }))
        }
    }

    #[derive(Default)]
    struct RecordingHost {
        foregrounds: Mutex<Vec<SurfaceId>>,
        notices: Mutex<Vec<String>>,
    }

    impl RecordingHost {
        fn foregrounds(&self) -> Vec<SurfaceId> {
            self.foregrounds.lock().unwrap().clone()
        }

        fn notices(&self) -> Vec<String> {
            self.notices.lock().unwrap().clone()
        }
    }

    impl DisplayHost for RecordingHost {
        fn set_foreground(&self, surface: SurfaceId) {
            self.foregrounds.lock().unwrap().push(surface);
        }

        fn show_notice(&self, message: &str) {
            self.notices.lock().unwrap().push(message.to_string());
        }
    }

    struct Fixture {
        controller: RotationController,
        calls: CallLog,
        host: Arc<RecordingHost>,
        feedback_rx: mpsc::UnboundedReceiver<FeedbackEvent>,
    }

    impl Fixture {
        fn new(config: PlayerConfig) -> Self {
            Self::build(config, false, false)
        }

        fn with_construction(config: PlayerConfig, construction_fails: bool) -> Self {
            Self::build(config, construction_fails, false)
        }

        fn with_failing_loads(config: PlayerConfig) -> Self {
            Self::build(config, false, true)
        }

        fn build(config: PlayerConfig, construction_fails: bool, load_fails: bool) -> Self {
            let calls = CallLog::default();
            let factory = MockFactory {
                calls: calls.clone(),
                construction_fails,
                load_fails,
            };
            let host = Arc::new(RecordingHost::default());
            let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();
            let controller =
                RotationController::new(config, &factory, host.clone(), feedback_tx);
            Self {
                controller,
                calls,
                host,
                feedback_rx,
            }
        }

        async fn bring_up(&mut self, now: Instant) {
            for sid in SurfaceId::ALL {
                self.controller
                    .handle_engine_event(
                        EngineSignal {
                            surface: sid,
                            event: EngineEvent::Ready,
                        },
                        now,
                    )
                    .await;
            }
            assert!(self.controller.started());
        }

        async fn state_change(&mut self, sid: SurfaceId, state: PlaybackState, now: Instant) {
            self.controller
                .handle_engine_event(
                    EngineSignal {
                        surface: sid,
                        event: EngineEvent::StateChange(state),
                    },
                    now,
                )
                .await;
        }

        async fn error(&mut self, sid: SurfaceId, code: u32, now: Instant) {
            self.controller
                .handle_engine_event(
                    EngineSignal {
                        surface: sid,
                        event: EngineEvent::Error(code),
                    },
                    now,
                )
                .await;
        }

        fn drain_feedback(&mut self) -> Vec<(FeedbackState, VideoId)> {
            let mut out = Vec::new();
            while let Ok(event) = self.feedback_rx.try_recv() {
                out.push((event.state, event.video_id));
            }
            out
        }
    }

    fn v(id: &str) -> VideoId {
        VideoId::from(id)
    }

    #[tokio::test]
    async fn test_commands_dropped_before_surfaces_up() {
        let mut fx = Fixture::new(PlayerConfig::default());
        let now = Instant::now();

        fx.controller
            .handle_command(Command::Preload(v("early")), now)
            .await;

        assert!(fx.calls.calls().is_empty());
        assert!(fx.drain_feedback().is_empty());
        assert_eq!(fx.controller.state(), RotationState::Idle);
    }

    #[tokio::test]
    async fn test_preload_is_idempotent() {
        let mut fx = Fixture::new(PlayerConfig::default());
        let now = Instant::now();
        fx.bring_up(now).await;

        fx.controller
            .handle_command(Command::Preload(v("abc")), now)
            .await;
        fx.controller
            .handle_command(Command::Preload(v("abc")), now + Duration::from_millis(100))
            .await;

        let cues = fx
            .calls
            .count(|c| matches!(c, EngineCall::Cue(SurfaceId::B, _)));
        assert_eq!(cues, 1);
        assert_eq!(
            fx.drain_feedback(),
            vec![(FeedbackState::Preloading, v("abc"))]
        );
        assert_eq!(fx.controller.pending_video(), Some(&v("abc")));
    }

    #[tokio::test]
    async fn test_settle_emits_optimistic_ready() {
        let mut fx = Fixture::new(PlayerConfig::default());
        let t0 = Instant::now();
        fx.bring_up(t0).await;

        fx.controller
            .handle_command(Command::Preload(v("abc")), t0)
            .await;
        fx.drain_feedback();

        // Not due yet
        fx.controller.tick(t0 + Duration::from_millis(500)).await;
        assert!(fx.drain_feedback().is_empty());

        fx.controller.tick(t0 + Duration::from_millis(1000)).await;
        assert_eq!(fx.drain_feedback(), vec![(FeedbackState::Ready, v("abc"))]);
    }

    #[tokio::test]
    async fn test_settle_suppressed_when_pending_overwritten() {
        let mut fx = Fixture::new(PlayerConfig::default());
        let t0 = Instant::now();
        fx.bring_up(t0).await;

        fx.controller
            .handle_command(Command::Preload(v("one")), t0)
            .await;
        fx.controller
            .handle_command(Command::Preload(v("two")), t0 + Duration::from_millis(500))
            .await;
        fx.drain_feedback();

        fx.controller.tick(t0 + Duration::from_millis(1000)).await;
        assert!(fx.drain_feedback().is_empty());

        fx.controller.tick(t0 + Duration::from_millis(1500)).await;
        assert_eq!(fx.drain_feedback(), vec![(FeedbackState::Ready, v("two"))]);
    }

    #[tokio::test]
    async fn test_fast_path_switches_without_load() {
        let mut fx = Fixture::new(PlayerConfig::default());
        let t0 = Instant::now();
        fx.bring_up(t0).await;

        fx.controller
            .handle_command(Command::Preload(v("abc")), t0)
            .await;
        fx.state_change(SurfaceId::B, PlaybackState::Cued, t0 + Duration::from_millis(300))
            .await;
        assert_eq!(fx.controller.state(), RotationState::ArmedForSwitch);
        fx.drain_feedback();

        fx.controller
            .handle_command(Command::Play(v("abc")), t0 + Duration::from_millis(400))
            .await;

        assert_eq!(fx.calls.count(|c| matches!(c, EngineCall::Load(..))), 0);
        assert_eq!(
            fx.calls.count(|c| matches!(c, EngineCall::Play(SurfaceId::B))),
            1
        );
        assert_eq!(fx.controller.current_surface(), SurfaceId::B);
        assert_eq!(fx.controller.state(), RotationState::Idle);
        assert_eq!(fx.controller.pending_video(), None);
        assert_eq!(fx.controller.current_video(), Some(&v("abc")));
        assert_eq!(fx.drain_feedback(), vec![(FeedbackState::Playing, v("abc"))]);
    }

    #[tokio::test]
    async fn test_slow_path_loads_once_and_waits_for_readiness() {
        let mut fx = Fixture::new(PlayerConfig::default());
        let t0 = Instant::now();
        fx.bring_up(t0).await;

        fx.controller
            .handle_command(Command::Play(v("abc")), t0)
            .await;
        fx.state_change(SurfaceId::B, PlaybackState::Buffering, t0 + Duration::from_millis(50))
            .await;

        // Not ready yet: ticks must not switch
        fx.controller.tick(t0 + Duration::from_millis(100)).await;
        fx.controller.tick(t0 + Duration::from_millis(200)).await;
        assert_eq!(fx.controller.current_surface(), SurfaceId::A);

        fx.state_change(SurfaceId::B, PlaybackState::Cued, t0 + Duration::from_millis(250))
            .await;
        fx.controller.tick(t0 + Duration::from_millis(300)).await;

        assert_eq!(
            fx.calls
                .count(|c| matches!(c, EngineCall::Load(SurfaceId::B, video) if *video == v("abc"))),
            1
        );
        assert_eq!(fx.controller.current_surface(), SurfaceId::B);
        assert_eq!(fx.drain_feedback(), vec![(FeedbackState::Playing, v("abc"))]);
    }

    #[tokio::test]
    async fn test_stale_readiness_poll_retires_without_switching() {
        let mut fx = Fixture::new(PlayerConfig::default());
        let t0 = Instant::now();
        fx.bring_up(t0).await;

        fx.controller
            .handle_command(Command::Play(v("one")), t0)
            .await;
        fx.state_change(SurfaceId::B, PlaybackState::Buffering, t0 + Duration::from_millis(20))
            .await;

        // A newer preload overwrites the pending identifier; the in-flight
        // poll must observe the mismatch and retire
        fx.controller
            .handle_command(Command::Preload(v("two")), t0 + Duration::from_millis(50))
            .await;
        fx.controller.tick(t0 + Duration::from_millis(150)).await;

        assert_eq!(fx.controller.current_surface(), SurfaceId::A);
        assert_eq!(fx.controller.pending_video(), Some(&v("two")));

        // Readiness for the old target no longer causes a switch
        fx.state_change(SurfaceId::B, PlaybackState::Cued, t0 + Duration::from_millis(200))
            .await;
        fx.controller.tick(t0 + Duration::from_millis(300)).await;
        assert_eq!(fx.controller.current_surface(), SurfaceId::A);
    }

    #[tokio::test]
    async fn test_foreground_follows_current_across_switches() {
        let mut fx = Fixture::new(PlayerConfig::default());
        let t0 = Instant::now();
        fx.bring_up(t0).await;

        for (i, id) in ["one", "two", "three"].iter().enumerate() {
            let at = t0 + Duration::from_millis(500 * i as u64);
            fx.controller
                .handle_command(Command::Preload(v(id)), at)
                .await;
            let next = fx.controller.current_surface().other();
            fx.state_change(next, PlaybackState::Cued, at + Duration::from_millis(100))
                .await;
            fx.controller
                .handle_command(Command::Play(v(id)), at + Duration::from_millis(200))
                .await;
            assert_eq!(fx.controller.foreground(), fx.controller.current_surface());
        }

        assert_eq!(
            fx.host.foregrounds(),
            vec![SurfaceId::A, SurfaceId::B, SurfaceId::A, SurfaceId::B]
        );
    }

    #[tokio::test]
    async fn test_current_surface_loops_on_ended() {
        let mut fx = Fixture::new(PlayerConfig::default());
        let t0 = Instant::now();
        fx.bring_up(t0).await;

        fx.controller
            .handle_command(Command::Preload(v("abc")), t0)
            .await;
        fx.state_change(SurfaceId::B, PlaybackState::Cued, t0).await;
        fx.controller
            .handle_command(Command::Play(v("abc")), t0)
            .await;
        fx.drain_feedback();
        let plays_before = fx.calls.count(|c| matches!(c, EngineCall::Play(SurfaceId::B)));

        fx.state_change(SurfaceId::B, PlaybackState::Ended, t0 + Duration::from_secs(60))
            .await;

        assert_eq!(
            fx.calls.count(|c| matches!(c, EngineCall::Play(SurfaceId::B))),
            plays_before + 1
        );
        // Never reported upstream
        assert!(fx.drain_feedback().is_empty());
    }

    #[tokio::test]
    async fn test_burst_produces_single_notice() {
        let mut fx = Fixture::new(PlayerConfig::default());
        let t0 = Instant::now();
        fx.bring_up(t0).await;

        fx.error(SurfaceId::A, 5, t0).await;
        fx.error(SurfaceId::A, 5, t0 + Duration::from_millis(200)).await;
        let loads_after_two = fx.calls.count(|c| matches!(c, EngineCall::Load(..)));
        fx.error(SurfaceId::A, 5, t0 + Duration::from_millis(400)).await;

        // One substitution on the first error, one notice on the second,
        // nothing at all on the third
        assert_eq!(
            fx.calls.count(
                |c| matches!(c, EngineCall::Load(SurfaceId::A, video) if *video == PlayerConfig::default().substitute_video)
            ),
            1
        );
        assert_eq!(fx.host.notices().len(), 1);
        assert_eq!(fx.calls.count(|c| matches!(c, EngineCall::Load(..))), loads_after_two);
    }

    #[tokio::test]
    async fn test_playing_through_suppresses_restriction_error() {
        let mut fx = Fixture::new(PlayerConfig::default());
        let t0 = Instant::now();
        fx.bring_up(t0).await;

        fx.state_change(SurfaceId::A, PlaybackState::Playing, t0).await;
        let calls_before = fx.calls.calls().len();

        fx.error(SurfaceId::A, 150, t0 + Duration::from_millis(1000)).await;

        assert!(fx.host.notices().is_empty());
        assert_eq!(fx.calls.calls().len(), calls_before);
        assert!(fx.controller.surface(SurfaceId::A).is_live());
    }

    #[tokio::test]
    async fn test_restriction_error_installs_alternate_embed_then_notice() {
        let mut fx = Fixture::new(PlayerConfig::default());
        let t0 = Instant::now();
        fx.bring_up(t0).await;

        fx.controller
            .handle_command(Command::Preload(v("blocked")), t0)
            .await;
        // Cue state on B went stale long ago; no playing-through protection
        fx.error(SurfaceId::B, 153, t0 + Duration::from_millis(100)).await;

        let surface = fx.controller.surface(SurfaceId::B);
        assert!(!surface.is_live());
        assert_eq!(surface.embed_video(), Some(&v("blocked")));
        assert!(fx.host.notices().is_empty());

        // Second restriction error on the same episode escalates
        fx.error(SurfaceId::B, 153, t0 + Duration::from_millis(3000)).await;
        assert_eq!(fx.host.notices().len(), 1);

        // Escalation is not fatal: PLAY still switches on the embed marker
        fx.drain_feedback();
        fx.controller
            .handle_command(Command::Play(v("blocked")), t0 + Duration::from_millis(3200))
            .await;
        assert_eq!(fx.controller.current_surface(), SurfaceId::B);
        assert_eq!(
            fx.drain_feedback(),
            vec![(FeedbackState::Playing, v("blocked"))]
        );
    }

    #[tokio::test]
    async fn test_benign_code_is_ignored() {
        let mut fx = Fixture::new(PlayerConfig::default());
        let t0 = Instant::now();
        fx.bring_up(t0).await;
        let calls_before = fx.calls.calls().len();

        fx.error(SurfaceId::A, 2, t0).await;
        fx.error(SurfaceId::A, 2, t0 + Duration::from_millis(100)).await;

        assert!(fx.host.notices().is_empty());
        assert_eq!(fx.calls.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_new_command_opens_new_fault_episode() {
        let mut fx = Fixture::new(PlayerConfig::default());
        let t0 = Instant::now();
        fx.bring_up(t0).await;

        // Exhaust surface B's budget (it is "next" while A is current)
        fx.controller
            .handle_command(Command::Preload(v("bad")), t0)
            .await;
        fx.error(SurfaceId::B, 100, t0 + Duration::from_millis(2000)).await;
        fx.error(SurfaceId::B, 100, t0 + Duration::from_millis(4000)).await;
        assert_eq!(fx.host.notices().len(), 1);

        // A later preload resets the episode; substitution is available again
        fx.controller
            .handle_command(Command::Preload(v("good")), t0 + Duration::from_millis(5000))
            .await;
        fx.error(SurfaceId::B, 100, t0 + Duration::from_millis(7000)).await;

        assert_eq!(
            fx.calls.count(
                |c| matches!(c, EngineCall::Load(SurfaceId::B, video) if *video == PlayerConfig::default().substitute_video)
            ),
            2
        );
        assert_eq!(fx.host.notices().len(), 1);
    }

    #[tokio::test]
    async fn test_detached_surfaces_fall_back_to_embeds() {
        let mut fx = Fixture::with_construction(PlayerConfig::default(), true);
        let t0 = Instant::now();
        // No engine callbacks will ever arrive; the first tick starts the
        // controller because neither surface is live
        fx.controller.tick(t0).await;
        assert!(fx.controller.started());

        fx.controller
            .handle_command(Command::Preload(v("abc")), t0)
            .await;
        assert_eq!(
            fx.controller.surface(SurfaceId::B).embed_video(),
            Some(&v("abc"))
        );
        fx.drain_feedback();

        fx.controller
            .handle_command(Command::Play(v("abc")), t0 + Duration::from_millis(100))
            .await;
        assert_eq!(fx.controller.current_surface(), SurfaceId::B);
        assert_eq!(fx.drain_feedback(), vec![(FeedbackState::Playing, v("abc"))]);
    }

    #[tokio::test]
    async fn test_switch_starts_preloaded_embed() {
        let mut fx = Fixture::with_construction(PlayerConfig::default(), true);
        let t0 = Instant::now();
        fx.controller.tick(t0).await;
        assert!(fx.controller.started());

        fx.controller
            .handle_command(Command::Preload(v("abc")), t0)
            .await;
        let embed = fx.controller.surface(SurfaceId::B).fallback_embed().unwrap();
        assert!(!embed.autoplay);

        fx.controller
            .handle_command(Command::Play(v("abc")), t0 + Duration::from_millis(100))
            .await;

        // The embed must be running once its surface is foregrounded
        assert_eq!(fx.controller.current_surface(), SurfaceId::B);
        let embed = fx.controller.surface(SurfaceId::B).fallback_embed().unwrap();
        assert!(embed.autoplay);
        assert_eq!(embed.video, v("abc"));
    }

    #[tokio::test]
    async fn test_default_video_load_failure_shows_notice_without_feedback() {
        let config = PlayerConfig {
            default_video: Some(v("default")),
            ..PlayerConfig::default()
        };
        let mut fx = Fixture::with_failing_loads(config);
        let t0 = Instant::now();
        fx.bring_up(t0).await;

        assert_eq!(fx.host.notices().len(), 1);
        assert!(fx.drain_feedback().is_empty());
        assert_eq!(fx.controller.current_video(), None);
    }

    #[tokio::test]
    async fn test_default_video_autostarts_on_current_surface() {
        let config = PlayerConfig {
            default_video: Some(v("default")),
            ..PlayerConfig::default()
        };
        let mut fx = Fixture::new(config);
        let t0 = Instant::now();
        fx.bring_up(t0).await;

        assert_eq!(
            fx.calls.count(
                |c| matches!(c, EngineCall::Load(SurfaceId::A, video) if *video == v("default"))
            ),
            1
        );
        assert_eq!(fx.controller.current_video(), Some(&v("default")));
        assert_eq!(
            fx.drain_feedback(),
            vec![(FeedbackState::Playing, v("default"))]
        );
    }

    #[tokio::test]
    async fn test_readiness_timeout_escalates_when_configured() {
        let config = PlayerConfig {
            readiness_timeout_ms: Some(500),
            ..PlayerConfig::default()
        };
        let mut fx = Fixture::new(config);
        let t0 = Instant::now();
        fx.bring_up(t0).await;

        fx.controller
            .handle_command(Command::Play(v("stuck")), t0)
            .await;
        fx.state_change(SurfaceId::B, PlaybackState::Buffering, t0).await;

        fx.controller.tick(t0 + Duration::from_millis(200)).await;
        assert!(fx.host.notices().is_empty());

        fx.controller.tick(t0 + Duration::from_millis(600)).await;
        assert_eq!(fx.host.notices().len(), 1);
        assert_eq!(fx.controller.current_surface(), SurfaceId::A);

        // The poll retired; late readiness no longer switches
        fx.state_change(SurfaceId::B, PlaybackState::Cued, t0 + Duration::from_millis(700))
            .await;
        fx.controller.tick(t0 + Duration::from_millis(800)).await;
        assert_eq!(fx.controller.current_surface(), SurfaceId::A);
    }
}
