//! The two queues a session coordinates through.
//!
//! The outbound queue is bounded and is the only backpressure in the system:
//! a full queue blocks producers until the forwarder drains an item. The
//! playback queue is unbounded, but the inbound consumer can purge it when a
//! turn ends so stale model audio never plays late.

use crate::cancel::CancelToken;
use crate::chunk::OutboundChunk;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};

/// Returned by blocking queue operations when the session group was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Bounded many-producer, single-consumer queue of outbound chunks.
pub struct OutboundQueue {
    sender: Sender<OutboundChunk>,
    receiver: Receiver<OutboundChunk>,
    capacity: usize,
}

/// Enqueue half cloned into each capture producer.
#[derive(Clone)]
pub struct OutboundProducer {
    sender: Sender<OutboundChunk>,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    pub fn producer(&self) -> OutboundProducer {
        OutboundProducer {
            sender: self.sender.clone(),
        }
    }

    /// Dequeue half for the forwarder.
    pub fn consumer(&self) -> Receiver<OutboundChunk> {
        self.receiver.clone()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl OutboundProducer {
    /// Block until the chunk is queued or the session is cancelled. Never drops.
    pub fn put(&self, chunk: OutboundChunk, cancel: &CancelToken) -> Result<(), Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        select! {
            send(self.sender, chunk) -> res => res.map_err(|_| Cancelled),
            recv(cancel.receiver()) -> _ => Err(Cancelled),
        }
    }
}

/// Unbounded queue of decoded audio fragments awaiting playback.
#[derive(Clone)]
pub struct PlaybackQueue {
    sender: Sender<Vec<u8>>,
    receiver: Receiver<Vec<u8>>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn push(&self, fragment: Vec<u8>) {
        // Both halves live in this struct, so the channel cannot be disconnected.
        let _ = self.sender.send(fragment);
    }

    /// Discard every pending fragment. Returns how many were dropped.
    pub fn purge(&self) -> usize {
        self.receiver.try_iter().count()
    }

    /// Dequeue half for the playback task.
    pub fn consumer(&self) -> Receiver<Vec<u8>> {
        self.receiver.clone()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}
