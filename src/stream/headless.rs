//! Headless engine
//!
//! Simulates an adaptive live stream without decoding anything: the
//! manifest becomes ready shortly after `load`, and while "playing" the
//! engine ticks `timeupdate` once per second. Lets a host run the full
//! remote protocol on machines without a media stack.

use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::stream::engine::{EngineEventKind, EngineSink, PlayRejected, StreamEngine};

/// Delay between `load` and `ManifestReady`
const MANIFEST_DELAY: Duration = Duration::from_millis(150);

/// Interval between `TimeUpdate` events while playing
const TICK: Duration = Duration::from_secs(1);

pub struct HeadlessEngine {
    sink: Option<EngineSink>,
    url: Option<String>,
    /// Position accumulated before the current play run
    base: f64,
    started: Option<Instant>,
    block_autoplay: bool,
    loader: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self {
            sink: None,
            url: None,
            base: 0.0,
            started: None,
            block_autoplay: false,
            loader: None,
            ticker: None,
        }
    }

    /// Reject the first `play` call, like a browser autoplay policy
    pub fn with_autoplay_blocked(mut self) -> Self {
        self.block_autoplay = true;
        self
    }

    /// Current simulated position in seconds
    pub fn position(&self) -> f64 {
        self.base + self.started.map(|s| s.elapsed().as_secs_f64()).unwrap_or(0.0)
    }

    fn emit(&self, kind: EngineEventKind) {
        if let Some(sink) = &self.sink {
            sink.emit(kind);
        }
    }

    /// Fetch the manifest again. With `resume` the engine goes back to
    /// playing once it arrives, as a reload mid-playback does.
    fn start_loading(&mut self, resume: bool) {
        self.abort_tasks();
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let base = self.base;
        let resume_at = resume.then(|| Instant::now() + MANIFEST_DELAY);
        self.started = resume_at;
        let task = tokio::spawn(async move {
            tokio::time::sleep(MANIFEST_DELAY).await;
            sink.emit(EngineEventKind::ManifestReady);
            sink.emit(EngineEventKind::LoadedMetadata { duration: 0.0 });
            sink.emit(EngineEventKind::CanPlay);
            if let Some(started) = resume_at {
                sink.emit(EngineEventKind::Playing);
                tick(sink, base, started).await;
            }
        });
        // A resuming load doubles as the ticker so pause stops it
        if resume {
            self.ticker = Some(task);
        } else {
            self.loader = Some(task);
        }
    }

    fn start_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let base = self.base;
        let started = Instant::now();
        self.started = Some(started);
        self.ticker = Some(tokio::spawn(tick(sink, base, started)));
    }

    fn stop_ticker(&mut self) {
        self.base = self.position();
        self.started = None;
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn abort_tasks(&mut self) {
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }
        self.stop_ticker();
    }
}

async fn tick(sink: EngineSink, base: f64, started: Instant) {
    let mut interval = tokio::time::interval(TICK);
    loop {
        interval.tick().await;
        sink.emit(EngineEventKind::TimeUpdate(
            base + started.elapsed().as_secs_f64(),
        ));
    }
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamEngine for HeadlessEngine {
    fn attach(&mut self, sink: EngineSink) {
        self.sink = Some(sink);
    }

    fn load(&mut self, url: &str) {
        debug!(%url, "headless load");
        self.url = Some(url.to_string());
        self.base = 0.0;
        self.start_loading(false);
    }

    fn play(&mut self) -> Result<(), PlayRejected> {
        if self.url.is_none() {
            return Err(PlayRejected("no source".into()));
        }
        if std::mem::take(&mut self.block_autoplay) {
            return Err(PlayRejected("autoplay blocked".into()));
        }
        if self.started.is_none() {
            self.start_ticker();
            self.emit(EngineEventKind::Playing);
        }
        Ok(())
    }

    fn pause(&mut self) {
        if self.started.is_some() {
            self.stop_ticker();
            self.emit(EngineEventKind::Paused);
        }
    }

    fn seek(&mut self, position: f64) {
        let playing = self.started.is_some();
        self.stop_ticker();
        self.base = position.max(0.0);
        if playing {
            self.start_ticker();
        }
        self.emit(EngineEventKind::TimeUpdate(self.base));
    }

    fn set_volume(&mut self, _volume: f64) {}

    fn set_muted(&mut self, _muted: bool) {}

    fn reload(&mut self) {
        let resume = self.started.is_some();
        debug!(url = ?self.url, resume, "headless reload");
        self.start_loading(resume);
    }

    fn recover_media(&mut self) {
        debug!("headless media recovery");
    }

    fn destroy(&mut self) {
        self.abort_tasks();
        self.url = None;
        self.sink = None;
    }
}

impl Drop for HeadlessEngine {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::engine::{EngineEvent, EngineId};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_manifest_ready_after_load() {
        let (tx, mut rx) = mpsc::unbounded_channel::<EngineEvent>();
        let mut engine = HeadlessEngine::new();
        engine.attach(EngineSink::new(EngineId(7), tx));
        engine.load("http://example/live.m3u8");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.engine, EngineId(7));
        assert_eq!(event.kind, EngineEventKind::ManifestReady);
    }

    #[tokio::test]
    async fn test_autoplay_block_only_first_play() {
        let (tx, _rx) = mpsc::unbounded_channel::<EngineEvent>();
        let mut engine = HeadlessEngine::new().with_autoplay_blocked();
        engine.attach(EngineSink::new(EngineId(0), tx));
        engine.load("u");
        assert!(engine.play().is_err());
        assert!(engine.play().is_ok());
    }

    #[tokio::test]
    async fn test_reload_while_playing_resumes() {
        let (tx, mut rx) = mpsc::unbounded_channel::<EngineEvent>();
        let mut engine = HeadlessEngine::new();
        engine.attach(EngineSink::new(EngineId(1), tx));
        engine.load("u");
        engine.play().unwrap();
        while rx.try_recv().is_ok() {}

        engine.reload();
        let mut kinds = Vec::new();
        while !kinds.contains(&EngineEventKind::Playing) {
            let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("timed out waiting for playing")
                .unwrap();
            kinds.push(event.kind);
        }
        assert_eq!(kinds[0], EngineEventKind::ManifestReady);

        // Still counted as playing, so pause takes effect
        engine.pause();
        let mut paused = false;
        while let Ok(event) = rx.try_recv() {
            paused |= event.kind == EngineEventKind::Paused;
        }
        assert!(paused);
    }

    #[tokio::test]
    async fn test_reload_while_paused_stays_paused() {
        let (tx, mut rx) = mpsc::unbounded_channel::<EngineEvent>();
        let mut engine = HeadlessEngine::new();
        engine.attach(EngineSink::new(EngineId(2), tx));
        engine.load("u");

        engine.reload();
        tokio::time::sleep(MANIFEST_DELAY * 3).await;
        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        assert!(kinds.contains(&EngineEventKind::ManifestReady));
        assert!(!kinds.contains(&EngineEventKind::Playing));
    }

    #[test]
    fn test_play_without_source_rejected() {
        let mut engine = HeadlessEngine::new();
        assert!(engine.play().is_err());
    }
}
