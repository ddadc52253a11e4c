//! Scripted probe for unit tests. Position only moves when told to.

use std::sync::Mutex;

use crate::playback::{PlayState, PlaybackProbe};

#[derive(Debug)]
struct Script {
    ready: bool,
    position: f64,
    duration: f64,
    state: PlayState,
    seeks: Vec<f64>,
}

#[derive(Debug)]
pub(crate) struct ScriptedPlayer {
    script: Mutex<Script>,
}

impl ScriptedPlayer {
    pub(crate) fn new(duration: f64) -> Self {
        Self {
            script: Mutex::new(Script {
                ready: false,
                position: 0.0,
                duration,
                state: PlayState::Paused,
                seeks: Vec::new(),
            }),
        }
    }

    pub(crate) fn ready(duration: f64) -> Self {
        let player = Self::new(duration);
        player.set_ready(true);
        player
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        self.script.lock().unwrap().ready = ready;
    }

    pub(crate) fn set_state(&self, state: PlayState) {
        self.script.lock().unwrap().state = state;
    }

    pub(crate) fn set_duration(&self, duration: f64) {
        self.script.lock().unwrap().duration = duration;
    }

    pub(crate) fn advance(&self, secs: f64) {
        let mut s = self.script.lock().unwrap();
        s.position = (s.position + secs).min(s.duration);
    }

    pub(crate) fn seeks(&self) -> Vec<f64> {
        self.script.lock().unwrap().seeks.clone()
    }
}

impl PlaybackProbe for ScriptedPlayer {
    fn is_ready(&self) -> bool {
        self.script.lock().unwrap().ready
    }

    fn current_position(&self) -> Option<f64> {
        let s = self.script.lock().unwrap();
        s.ready.then_some(s.position)
    }

    fn duration(&self) -> Option<f64> {
        let s = self.script.lock().unwrap();
        s.ready.then_some(s.duration)
    }

    fn play_state(&self) -> PlayState {
        self.script.lock().unwrap().state
    }

    fn seek(&self, seconds: f64) {
        let mut s = self.script.lock().unwrap();
        s.position = seconds;
        s.seeks.push(seconds);
    }
}
