//! Application event loops
//!
//! Each device runs exactly one loop that owns all of its state. Link
//! events, engine events and local input are explicit [`HostEvent`] /
//! [`RemoteEvent`] values consumed one at a time, so nothing is ever
//! mutated concurrently and no locks are needed.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::models::ChannelList;
use crate::navigator::ChannelNavigator;
use crate::remote::{
    Command, ControllerStatus, ControllerView, HostRequest, LinkEvent, PeerLink,
    SessionController, SessionHost, SessionId, SessionStatus, SessionStore, Snapshot,
};
use crate::stream::{EngineEvent, EngineFactory, Playback};

/// Default step for volume-up / volume-down
pub const DEFAULT_VOLUME_STEP: f64 = 0.1;

// =============================================================================
// Host
// =============================================================================

/// Local actions on the playing device
#[derive(Debug, Clone, PartialEq)]
pub enum HostInput {
    /// Select a channel by url
    Select(String),
    SetSearch(String),
    SetGroup(String),
    SetChannels(ChannelList),
    /// Same commands a remote can send
    Command(Command),
    StartSharing,
    StopSharing,
    Shutdown,
}

#[derive(Debug)]
pub enum HostEvent {
    Link(LinkEvent),
    Engine(EngineEvent),
    Input(HostInput),
}

/// The playing device: navigator, playback and session host on one loop
pub struct HostApp {
    navigator: ChannelNavigator,
    playback: Playback,
    session: SessionHost,
    link: Box<dyn PeerLink>,
    store: Box<dyn SessionStore>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    engine_rx: mpsc::UnboundedReceiver<EngineEvent>,
    volume_step: f64,
    last_broadcast: Option<Snapshot>,
    running: bool,
}

impl HostApp {
    pub fn new(
        channels: ChannelList,
        engines: impl EngineFactory + 'static,
        link: impl PeerLink + 'static,
        store: impl SessionStore + 'static,
    ) -> Self {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        Self {
            navigator: ChannelNavigator::new(channels),
            playback: Playback::new(engines, engine_tx),
            session: SessionHost::new(link_tx),
            link: Box::new(link),
            store: Box::new(store),
            link_rx,
            engine_rx,
            volume_step: DEFAULT_VOLUME_STEP,
            last_broadcast: None,
            running: true,
        }
    }

    pub fn with_volume_step(mut self, step: f64) -> Self {
        self.volume_step = step;
        self
    }

    pub fn with_network_retry_limit(mut self, limit: Option<u32>) -> Self {
        self.playback = self.playback.with_network_retry_limit(limit);
        self
    }

    pub fn navigator(&self) -> &ChannelNavigator {
        &self.navigator
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn session(&self) -> &SessionHost {
        &self.session
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Snapshot of the current host state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.navigator.selected().cloned(),
            self.playback.state(),
            self.navigator.flags(),
        )
    }

    /// Apply one event, then push the new state to remotes if it changed
    pub fn dispatch(&mut self, event: HostEvent) {
        match event {
            HostEvent::Link(event) => {
                if let Some(request) = self.session.handle_event(event) {
                    self.handle_request(request);
                }
            }
            HostEvent::Engine(event) => self.playback.handle_engine_event(event),
            HostEvent::Input(input) => self.handle_input(input),
        }
        self.sync();
    }

    /// Dispatch everything already queued without waiting
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let event = if let Ok(event) = self.link_rx.try_recv() {
                HostEvent::Link(event)
            } else if let Ok(event) = self.engine_rx.try_recv() {
                HostEvent::Engine(event)
            } else {
                return handled;
            };
            self.dispatch(event);
            handled += 1;
        }
    }

    /// Run until `Shutdown` arrives or the input side hangs up
    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<HostInput>) -> Result<()> {
        info!(channels = self.navigator.channels().len(), "host running");
        while self.running {
            let event = tokio::select! {
                Some(event) = self.link_rx.recv() => HostEvent::Link(event),
                Some(event) = self.engine_rx.recv() => HostEvent::Engine(event),
                input = inputs.recv() => HostEvent::Input(input.unwrap_or(HostInput::Shutdown)),
            };
            self.dispatch(event);
        }
        Ok(())
    }

    fn handle_input(&mut self, input: HostInput) {
        match input {
            HostInput::Select(url) => self.select(&url),
            HostInput::SetSearch(search) => self.navigator.set_search(search),
            HostInput::SetGroup(group) => self.navigator.set_group(group),
            HostInput::SetChannels(list) => self.navigator.set_channels(list),
            HostInput::Command(command) => self.apply_command(command),
            HostInput::StartSharing => self
                .session
                .start(self.link.as_mut(), self.store.as_mut()),
            HostInput::StopSharing => self.session.stop(),
            HostInput::Shutdown => {
                info!("host shutting down");
                self.session.stop();
                self.playback.unload();
                self.running = false;
            }
        }
    }

    fn handle_request(&mut self, request: HostRequest) {
        match request {
            HostRequest::Snapshot(id) => {
                let snapshot = self.snapshot();
                self.session.send_to(id, &snapshot);
            }
            HostRequest::Command(_, command) => self.apply_command(command),
        }
    }

    fn select(&mut self, url: &str) {
        match self.navigator.select_url(url) {
            Some(channel) => self.playback.select_channel(channel),
            None => debug!(%url, "select ignored, unknown channel"),
        }
    }

    fn apply_command(&mut self, command: Command) {
        match command {
            Command::Next => {
                if let Some(channel) = self.navigator.next() {
                    self.playback.select_channel(channel);
                }
            }
            Command::Prev => {
                if let Some(channel) = self.navigator.prev() {
                    self.playback.select_channel(channel);
                }
            }
            Command::TogglePlay => self.playback.toggle_play_pause(),
            Command::Stop => self.playback.stop(),
            Command::ToggleMute => self.playback.toggle_mute(),
            Command::VolumeUp => {
                let volume = self.playback.state().volume + self.volume_step;
                self.playback.set_volume(volume);
            }
            Command::VolumeDown => {
                let volume = self.playback.state().volume - self.volume_step;
                self.playback.set_volume(volume);
            }
            Command::SetVolume(volume) => self.playback.set_volume(volume),
        }
    }

    /// Broadcast if anything changed and the snapshot differs from the last
    /// one sent. Time updates alone never reach remotes.
    fn sync(&mut self) {
        let changed = self.playback.take_changed() | self.navigator.take_changed();
        if !changed {
            return;
        }
        let snapshot = self.snapshot();
        if self.last_broadcast.as_ref() == Some(&snapshot) {
            return;
        }
        if self.session.status() == SessionStatus::Ready {
            let delivered = self.session.broadcast(&snapshot);
            debug!(delivered, "snapshot broadcast");
        }
        self.last_broadcast = Some(snapshot);
    }
}

// =============================================================================
// Remote
// =============================================================================

/// Local actions on the controlling device
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteInput {
    Connect(SessionId),
    Reconnect,
    Disconnect,
    Command(Command),
    Shutdown,
}

#[derive(Debug)]
pub enum RemoteEvent {
    Link(LinkEvent),
    Input(RemoteInput),
}

/// The controlling device
pub struct RemoteApp {
    controller: SessionController,
    link: Box<dyn PeerLink>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    running: bool,
}

impl RemoteApp {
    pub fn new(link: impl PeerLink + 'static) -> Self {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let mut controller = SessionController::new(link_tx);
        controller.ready();
        Self {
            controller,
            link: Box::new(link),
            link_rx,
            running: true,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn status(&self) -> ControllerStatus {
        self.controller.status()
    }

    pub fn view(&self) -> ControllerView {
        self.controller.view()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn dispatch(&mut self, event: RemoteEvent) {
        match event {
            RemoteEvent::Link(event) => self.controller.handle_event(event),
            RemoteEvent::Input(RemoteInput::Connect(id)) => {
                self.controller.connect(self.link.as_mut(), id)
            }
            RemoteEvent::Input(RemoteInput::Reconnect) => {
                if !self.controller.reconnect(self.link.as_mut()) {
                    debug!("nothing to reconnect to");
                }
            }
            RemoteEvent::Input(RemoteInput::Disconnect) => self.controller.disconnect(),
            RemoteEvent::Input(RemoteInput::Command(command)) => {
                self.controller.send(command);
            }
            RemoteEvent::Input(RemoteInput::Shutdown) => {
                self.controller.disconnect();
                self.running = false;
            }
        }
    }

    /// Dispatch every queued link event without waiting
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.link_rx.try_recv() {
            self.dispatch(RemoteEvent::Link(event));
            handled += 1;
        }
        handled
    }

    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<RemoteInput>) -> Result<()> {
        while self.running {
            let event = tokio::select! {
                Some(event) = self.link_rx.recv() => RemoteEvent::Link(event),
                input = inputs.recv() => RemoteEvent::Input(input.unwrap_or(RemoteInput::Shutdown)),
            };
            self.dispatch(event);
        }
        Ok(())
    }
}
