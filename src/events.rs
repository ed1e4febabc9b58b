//! Pre-allocated per-block event queue.
//!
//! Control events (MIDI, parameter writes) that arrive between two blocks
//! are collected here and handed to the plot handler with the next
//! completed block, then dropped. Capacity is fixed at construction so
//! recording never allocates.

use std::sync::Arc;

/// A control event observed between two blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Midi([u8; 3]),
    CtrlChange { channel: u8, ctrl: u8, value: u8 },
    PitchWheel { channel: u8, wheel: u16 },
    Param { path: Arc<str>, value: f32 },
}

#[derive(Debug)]
pub struct EventQueue {
    events: Vec<EngineEvent>,
    capacity: usize,
    dropped: usize,
}

impl EventQueue {
    /// Default number of events kept per block.
    pub const DEFAULT_CAPACITY: usize = 128;

    pub fn with_capacity(capacity: usize) -> Self {
        EventQueue {
            events: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Record an event; returns false (and counts a drop) when full.
    pub fn push(&mut self, event: EngineEvent) -> bool {
        if self.events.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.events.push(event);
        true
    }

    pub fn as_slice(&self) -> &[EngineEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events dropped since the last `clear`.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Drop all events for reuse. Keeps the allocation.
    pub fn clear(&mut self) {
        if self.dropped > 0 {
            log::warn!("event queue overflowed: {} events dropped this block", self.dropped);
        }
        self.events.clear();
        self.dropped = 0;
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}
