use std::collections::VecDeque;

use super::event::SessionEvent;
use super::metrics::{compute_snapshot, TelemetrySnapshot};

const MAX_EVENTS: usize = 10_000;

#[derive(Debug)]
pub struct TelemetryRecorder {
    buffer: VecDeque<SessionEvent>,
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(MAX_EVENTS),
        }
    }

    pub fn record(&mut self, event: SessionEvent) {
        if self.buffer.len() >= MAX_EVENTS {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        compute_snapshot(&self.buffer)
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.buffer.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}
