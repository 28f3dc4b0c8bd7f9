//! Shared test doubles

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use channel_remote::stream::{
    EngineEventKind, EngineId, EngineSink, ErrorKind, PlayRejected, StreamEngine,
};

#[derive(Default)]
struct EngineLog {
    calls: Vec<String>,
    sinks: Vec<EngineSink>,
    reject_play: bool,
}

/// Records every call made to the engines it creates and lets a test
/// post events as the newest engine
#[derive(Clone, Default)]
pub struct MockEngines {
    log: Arc<Mutex<EngineLog>>,
}

impl MockEngines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engines created from now on refuse `play`
    pub fn reject_play(&self, reject: bool) {
        self.log.lock().unwrap().reject_play = reject;
    }

    pub fn factory(&self) -> impl FnMut() -> Box<dyn StreamEngine> + Send + 'static {
        let log = self.log.clone();
        move || -> Box<dyn StreamEngine> { Box::new(MockEngine { log: log.clone() }) }
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.log.lock().unwrap().calls.clear();
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn created(&self) -> usize {
        self.log.lock().unwrap().sinks.len()
    }

    pub fn sink(&self, n: usize) -> EngineSink {
        self.log.lock().unwrap().sinks[n].clone()
    }

    pub fn latest(&self) -> EngineId {
        self.log.lock().unwrap().sinks.last().unwrap().engine()
    }

    /// Post an event as the newest engine
    pub fn emit(&self, kind: EngineEventKind) {
        let sink = self.log.lock().unwrap().sinks.last().cloned().unwrap();
        sink.emit(kind);
    }
}

struct MockEngine {
    log: Arc<Mutex<EngineLog>>,
}

impl MockEngine {
    fn record(&self, call: String) {
        self.log.lock().unwrap().calls.push(call);
    }
}

impl StreamEngine for MockEngine {
    fn attach(&mut self, sink: EngineSink) {
        self.log.lock().unwrap().sinks.push(sink);
    }

    fn load(&mut self, url: &str) {
        self.record(format!("load {}", url));
    }

    fn play(&mut self) -> Result<(), PlayRejected> {
        let reject = self.log.lock().unwrap().reject_play;
        if reject {
            return Err(PlayRejected("autoplay blocked".into()));
        }
        self.record("play".into());
        Ok(())
    }

    fn pause(&mut self) {
        self.record("pause".into());
    }

    fn seek(&mut self, position: f64) {
        self.record(format!("seek {}", position));
    }

    fn set_volume(&mut self, volume: f64) {
        self.record(format!("volume {}", volume));
    }

    fn set_muted(&mut self, muted: bool) {
        self.record(format!("muted {}", muted));
    }

    fn reload(&mut self) {
        self.record("reload".into());
    }

    fn recover_media(&mut self) {
        self.record("recover".into());
    }

    fn destroy(&mut self) {
        self.record("destroy".into());
    }
}

pub fn fatal(kind: ErrorKind, details: &str) -> EngineEventKind {
    EngineEventKind::Error {
        kind,
        fatal: true,
        details: details.into(),
    }
}
