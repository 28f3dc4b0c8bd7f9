//! Playback state machine
//!
//! Owns the authoritative [`PlayerState`] of the host and the single live
//! [`StreamEngine`] instance. Channel switches fully release the previous
//! engine before a new one is attached; late events from released engines
//! are recognised by their [`EngineId`] and ignored.
//!
//! ```text
//! Idle -> Loading -> Playing <-> Paused
//!                      |  ^
//!                      v  |
//!                    Buffering
//! any -> Errored (fatal "other" error)     any -> Loading (channel change)
//! ```

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::models::{clamp_volume, Channel, PlaybackPhase, PlayerState, DEFAULT_UNMUTE_VOLUME};
use crate::stream::engine::{
    EngineEvent, EngineEventKind, EngineFactory, EngineId, EngineSink, ErrorKind, StreamEngine,
};

struct ActiveEngine {
    id: EngineId,
    engine: Box<dyn StreamEngine>,
}

/// The host's playback state machine
pub struct Playback {
    factory: Box<dyn EngineFactory>,
    events: mpsc::UnboundedSender<EngineEvent>,
    active: Option<ActiveEngine>,
    next_engine: u64,
    phase: PlaybackPhase,
    state: PlayerState,
    channel: Option<Channel>,
    network_retries: u32,
    network_retry_limit: Option<u32>,
    changed: bool,
    observers: watch::Sender<PlayerState>,
}

impl Playback {
    /// Create a state machine; engine events must be fed back through
    /// [`Playback::handle_engine_event`]
    pub fn new(
        factory: impl EngineFactory + 'static,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        let state = PlayerState::default();
        let (observers, _) = watch::channel(state.clone());
        Self {
            factory: Box::new(factory),
            events,
            active: None,
            next_engine: 0,
            phase: PlaybackPhase::Idle,
            state,
            channel: None,
            network_retries: 0,
            network_retry_limit: None,
            changed: false,
            observers,
        }
    }

    /// Cap consecutive network reloads; `None` reloads indefinitely
    pub fn with_network_retry_limit(mut self, limit: Option<u32>) -> Self {
        self.network_retry_limit = limit;
        self
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref()
    }

    /// Id of the attached engine, if any
    pub fn engine_id(&self) -> Option<EngineId> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Observe every committed state change
    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.observers.subscribe()
    }

    /// Returns and clears the change flag
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    // -------------------------------------------------------------------------
    // Channel lifecycle
    // -------------------------------------------------------------------------

    /// Switch to a channel from any phase
    pub fn select_channel(&mut self, channel: Channel) {
        self.release_engine();

        let id = EngineId(self.next_engine);
        self.next_engine += 1;

        let mut engine = self.factory.create();
        engine.attach(EngineSink::new(id, self.events.clone()));
        engine.set_volume(self.state.volume);
        engine.set_muted(self.state.is_muted);
        engine.load(&channel.url);
        info!(%id, url = %channel.url, "loading channel");

        self.active = Some(ActiveEngine { id, engine });
        self.channel = Some(channel);
        self.network_retries = 0;
        self.phase = PlaybackPhase::Loading;
        self.state.is_playing = false;
        self.state.is_loading = true;
        self.state.current_time = 0.0;
        self.state.duration = 0.0;
        self.state.error = None;
        self.commit();
    }

    /// Release the engine and return to Idle
    pub fn unload(&mut self) {
        self.release_engine();
        self.channel = None;
        self.phase = PlaybackPhase::Idle;
        self.state = PlayerState {
            volume: self.state.volume,
            is_muted: self.state.is_muted,
            ..PlayerState::default()
        };
        self.commit();
    }

    // -------------------------------------------------------------------------
    // Direct commands
    // -------------------------------------------------------------------------

    pub fn toggle_play_pause(&mut self) {
        if !self.phase.accepts_commands() {
            debug!(phase = ?self.phase, "toggle play ignored");
            return;
        }
        if self.state.is_playing {
            self.pause();
        } else {
            self.resume();
        }
    }

    /// Pause and rewind to the start
    pub fn stop(&mut self) {
        if !self.phase.accepts_commands() {
            debug!(phase = ?self.phase, "stop ignored");
            return;
        }
        if let Some(active) = self.active.as_mut() {
            active.engine.pause();
            active.engine.seek(0.0);
        }
        self.phase = PlaybackPhase::Paused;
        self.state.is_playing = false;
        self.state.current_time = 0.0;
        self.commit();
    }

    /// Set the volume; zero mutes, anything audible unmutes
    ///
    /// Accepted whenever a channel is selected so the preference carries
    /// into an engine that is still loading.
    pub fn set_volume(&mut self, volume: f64) {
        if self.phase == PlaybackPhase::Idle {
            debug!("set volume ignored, no channel");
            return;
        }
        let volume = clamp_volume(volume);
        self.state.volume = volume;
        self.state.is_muted = volume == 0.0;
        if let Some(active) = self.active.as_mut() {
            active.engine.set_volume(volume);
            active.engine.set_muted(volume == 0.0);
        }
        self.commit();
    }

    pub fn toggle_mute(&mut self) {
        if self.phase == PlaybackPhase::Idle {
            debug!("toggle mute ignored, no channel");
            return;
        }
        if self.state.is_muted {
            if self.state.volume == 0.0 {
                self.state.volume = DEFAULT_UNMUTE_VOLUME;
            }
            self.state.is_muted = false;
        } else {
            self.state.is_muted = true;
        }
        if let Some(active) = self.active.as_mut() {
            active.engine.set_volume(self.state.volume);
            active.engine.set_muted(self.state.is_muted);
        }
        self.commit();
    }

    // -------------------------------------------------------------------------
    // Engine events
    // -------------------------------------------------------------------------

    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        if self.engine_id() != Some(event.engine) {
            debug!(engine = %event.engine, "ignoring event from released engine");
            return;
        }

        match event.kind {
            EngineEventKind::ManifestReady => self.on_engine_ready(),
            EngineEventKind::Error {
                kind,
                fatal,
                details,
            } => self.on_engine_error(kind, fatal, details),
            EngineEventKind::Playing => {
                self.network_retries = 0;
                self.phase = PlaybackPhase::Playing;
                self.state.is_playing = true;
                self.state.is_loading = false;
                self.commit();
            }
            EngineEventKind::Paused => {
                if self.phase.accepts_commands() {
                    self.phase = PlaybackPhase::Paused;
                }
                self.state.is_playing = false;
                self.commit();
            }
            EngineEventKind::Waiting => {
                if self.phase == PlaybackPhase::Playing {
                    self.phase = PlaybackPhase::Buffering;
                }
                self.state.is_loading = true;
                self.commit();
            }
            EngineEventKind::CanPlay => {
                self.state.is_loading = false;
                self.commit();
            }
            EngineEventKind::TimeUpdate(position) => {
                if position.is_finite() {
                    self.state.current_time = position;
                    self.commit();
                }
            }
            EngineEventKind::LoadedMetadata { duration } => {
                self.state.duration = if duration.is_finite() { duration } else { 0.0 };
                let (volume, muted) = (self.state.volume, self.state.is_muted);
                if let Some(active) = self.active.as_mut() {
                    active.engine.set_volume(volume);
                    active.engine.set_muted(muted);
                }
                self.commit();
            }
        }
    }

    fn on_engine_ready(&mut self) {
        if self.phase != PlaybackPhase::Loading {
            return;
        }
        let Some(active) = self.active.as_mut() else {
            return;
        };
        match active.engine.play() {
            Ok(()) => {
                self.phase = PlaybackPhase::Playing;
                self.state.is_playing = true;
            }
            Err(rejected) => {
                info!(reason = %rejected, "autoplay rejected, waiting for user");
                self.phase = PlaybackPhase::Paused;
                self.state.is_playing = false;
            }
        }
        self.state.is_loading = false;
        self.commit();
    }

    fn on_engine_error(&mut self, kind: ErrorKind, fatal: bool, details: String) {
        if !fatal {
            debug!(%kind, %details, "non-fatal engine error");
            return;
        }

        let kind = match kind {
            ErrorKind::Network if self.retry_exhausted() => {
                warn!(retries = self.network_retries, "network retry limit reached");
                ErrorKind::Other
            }
            other => other,
        };

        match kind {
            ErrorKind::Network => {
                self.network_retries += 1;
                warn!(%details, attempt = self.network_retries, "fatal network error, reloading");
                if let Some(active) = self.active.as_mut() {
                    active.engine.reload();
                }
            }
            ErrorKind::Media => {
                warn!(%details, "fatal media error, recovering decoder");
                if let Some(active) = self.active.as_mut() {
                    active.engine.recover_media();
                }
            }
            ErrorKind::Other => {
                warn!(%details, "fatal engine error, giving up");
                self.release_engine();
                self.phase = PlaybackPhase::Errored;
                self.state.is_playing = false;
                self.state.is_loading = false;
                self.state.error = Some(format!("Stream failed to play: {}", details));
                self.commit();
            }
        }
    }

    fn retry_exhausted(&self) -> bool {
        matches!(self.network_retry_limit, Some(limit) if self.network_retries >= limit)
    }

    fn pause(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.engine.pause();
        }
        self.phase = PlaybackPhase::Paused;
        self.state.is_playing = false;
        self.commit();
    }

    fn resume(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        match active.engine.play() {
            Ok(()) => {
                self.phase = PlaybackPhase::Playing;
                self.state.is_playing = true;
                self.commit();
            }
            Err(rejected) => info!(reason = %rejected, "play rejected"),
        }
    }

    fn release_engine(&mut self) {
        if let Some(mut active) = self.active.take() {
            debug!(id = %active.id, "releasing engine");
            active.engine.destroy();
        }
    }

    fn commit(&mut self) {
        self.changed = true;
        self.observers.send_replace(self.state.clone());
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.release_engine();
    }
}
