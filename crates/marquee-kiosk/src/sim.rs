//! Simulated playback engine
//!
//! Stands in for a real embedded player so the kiosk loop can run against a
//! control server with nothing but a terminal attached. Timings are rough
//! but ordered the way a real engine behaves: construction callback first,
//! then buffering, then cued/playing.
//!
//! Error injection: an identifier of the form `err:<code>` buffers and then
//! raises that engine error code instead of becoming ready.

use async_trait::async_trait;
use marquee_core::{
    EngineEvent, EngineEventSender, EngineFactory, EngineSignal, PlaybackEngine, PlaybackState,
    Result, SurfaceId, VideoId,
};
use std::time::Duration;
use tracing::debug;

const CONSTRUCTION_DELAY_MS: u64 = 50;
const BUFFER_DELAY_MS: u64 = 120;

fn injected_code(video: &VideoId) -> Option<u32> {
    video.as_str().strip_prefix("err:")?.parse().ok()
}

pub struct SimulatedEngine {
    surface: SurfaceId,
    events: EngineEventSender,
}

impl SimulatedEngine {
    fn emit_later(&self, event: EngineEvent, after: Duration) {
        let events = self.events.clone();
        let surface = self.surface;
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events.send(EngineSignal { surface, event });
        });
    }

    fn settle(&self, video: &VideoId, terminal: PlaybackState) {
        self.emit_later(
            EngineEvent::StateChange(PlaybackState::Buffering),
            Duration::from_millis(BUFFER_DELAY_MS / 2),
        );
        match injected_code(video) {
            Some(code) => {
                self.emit_later(EngineEvent::Error(code), Duration::from_millis(BUFFER_DELAY_MS))
            }
            None => self.emit_later(
                EngineEvent::StateChange(terminal),
                Duration::from_millis(BUFFER_DELAY_MS),
            ),
        }
    }
}

#[async_trait]
impl PlaybackEngine for SimulatedEngine {
    async fn load(&self, video: &VideoId) -> Result<()> {
        debug!(surface = %self.surface, video = %video, "sim load");
        self.settle(video, PlaybackState::Playing);
        Ok(())
    }

    async fn cue(&self, video: &VideoId) -> Result<()> {
        debug!(surface = %self.surface, video = %video, "sim cue");
        self.settle(video, PlaybackState::Cued);
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.emit_later(
            EngineEvent::StateChange(PlaybackState::Playing),
            Duration::from_millis(BUFFER_DELAY_MS / 2),
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.emit_later(
            EngineEvent::StateChange(PlaybackState::Paused),
            Duration::from_millis(10),
        );
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        debug!(surface = %self.surface, "sim destroy");
        Ok(())
    }
}

pub struct SimulatedEngineFactory {
    events: EngineEventSender,
}

impl SimulatedEngineFactory {
    pub fn new(events: EngineEventSender) -> Self {
        Self { events }
    }
}

impl EngineFactory for SimulatedEngineFactory {
    fn create(&self, surface: SurfaceId) -> Result<Box<dyn PlaybackEngine>> {
        let engine = SimulatedEngine {
            surface,
            events: self.events.clone(),
        };
        engine.emit_later(
            EngineEvent::Ready,
            Duration::from_millis(CONSTRUCTION_DELAY_MS),
        );
        Ok(Box::new(engine))
    }
}
