//! Command/feedback channel
//!
//! Polls the collaborator-owned control server for PRELOAD/PLAY commands at
//! a fixed cadence, dispatches them to the rotation controller, and reports
//! state transitions back on the feedback endpoint. Transport failures are
//! logged and never touch rotation state; the next tick retries
//! unconditionally.

use crate::{
    engine::EngineEventReceiver,
    rotation::RotationController,
    types::{FeedbackEvent, ParsedPoll, PlayerConfig, PollResponse},
    Error, Result,
};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

/// Create the channel the controller reports feedback events on
pub fn feedback_channel() -> (
    mpsc::UnboundedSender<FeedbackEvent>,
    mpsc::UnboundedReceiver<FeedbackEvent>,
) {
    mpsc::unbounded_channel()
}

/// The two collaborator-owned endpoints, derived from one control base URL
#[derive(Debug, Clone)]
pub struct ControlEndpoints {
    pub poll: Url,
    pub feedback: Url,
}

impl ControlEndpoints {
    /// Derive `/poll` and `/feedback` from the control base URL
    ///
    /// Mirrors the page-bootstrap behavior of following whatever host/port
    /// the display was served from.
    pub fn from_base(base: &Url) -> Result<Self> {
        let join = |path: &str| {
            let mut url = base.clone();
            url.path_segments_mut()
                .map_err(|_| Error::InvalidEndpoint(base.to_string()))?
                .pop_if_empty()
                .push(path);
            Ok::<Url, Error>(url)
        };
        Ok(Self {
            poll: join("poll")?,
            feedback: join("feedback")?,
        })
    }
}

/// Drives the rotation controller from a fixed-interval poll loop
///
/// Owns the controller outright: engine events, command dispatch, and timer
/// ticks all run on this single task, so controller mutations never
/// interleave.
pub struct CommandChannel {
    client: Client,
    endpoints: ControlEndpoints,
    controller: RotationController,
    engine_events: EngineEventReceiver,
    feedback_rx: mpsc::UnboundedReceiver<FeedbackEvent>,
    poll_interval: Duration,
}

impl CommandChannel {
    pub fn new(
        config: &PlayerConfig,
        endpoints: ControlEndpoints,
        controller: RotationController,
        engine_events: EngineEventReceiver,
        feedback_rx: mpsc::UnboundedReceiver<FeedbackEvent>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoints,
            controller,
            engine_events,
            feedback_rx,
            poll_interval: Duration::from_millis(config.command_poll_interval_ms),
        })
    }

    /// Run until the process receives a shutdown signal
    pub async fn run(mut self) -> Result<()> {
        info!(poll = %self.endpoints.poll, feedback = %self.endpoints.feedback, "command channel started");
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    self.controller.tick(now).await;
                    self.poll_once(now).await;
                }
                Some(signal) = self.engine_events.recv() => {
                    self.controller.handle_engine_event(signal, Instant::now()).await;
                }
                Some(event) = self.feedback_rx.recv() => {
                    self.post_feedback(event);
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    self.controller.shutdown().await;
                    return Ok(());
                }
            }
        }
    }

    /// One poll of the command endpoint
    async fn poll_once(&mut self, now: Instant) {
        let response = match self.fetch_poll().await {
            Ok(response) => response,
            Err(err) if err.is_channel_fault() => {
                // Log only, retry unconditionally next tick
                debug!(error = %err, "command poll failed");
                return;
            }
            Err(err) => {
                warn!(error = %err, "command poll failed");
                return;
            }
        };

        match response.into_parsed() {
            ParsedPoll::Idle => {}
            ParsedPoll::Command(command) => {
                info!(video = %command.video(), "command received");
                self.controller.handle_command(command, now).await;
            }
            ParsedPoll::Unknown(tag) => {
                warn!(cmd = %tag, "unknown command; ignored");
            }
        }
    }

    async fn fetch_poll(&self) -> Result<PollResponse> {
        self.client
            .get(self.endpoints.poll.clone())
            .send()
            .await
            .map_err(Error::CommandPoll)?
            .json::<PollResponse>()
            .await
            .map_err(Error::CommandPoll)
    }

    /// Fire-and-forget feedback post; a failure is logged and never retried
    fn post_feedback(&self, event: FeedbackEvent) {
        debug!(state = %event.state, video = %event.video_id, "posting feedback");
        let client = self.client.clone();
        let url = self.endpoints.feedback.clone();
        tokio::spawn(async move {
            if let Err(err) = client.post(url).json(&event).send().await {
                let err = Error::FeedbackPost(err);
                warn!(error = %err, state = %event.state, "feedback post failed");
            }
        });
    }
}
