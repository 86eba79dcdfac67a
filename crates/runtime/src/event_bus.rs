use std::collections::VecDeque;

/// Deterministic FIFO of host events.
///
/// The rendering surface, the network layer and user input all post into one
/// bus; the owner drains it from a single place, so every state transition
/// runs serialized and in arrival order. Tests drive state machines by posting
/// events directly instead of going through a real surface.
#[derive(Debug)]
pub struct EventBus<E> {
    next_seq: u64,
    events: VecDeque<Posted<E>>,
}

/// An event together with its arrival sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct Posted<E> {
    pub seq: u64,
    pub event: E,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            events: VecDeque::new(),
        }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, event: E) -> u64 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.events.push_back(Posted { seq, event });
        seq
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Posted<E>> {
        self.events.drain(..).collect()
    }
}
