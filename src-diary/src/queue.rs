//! Frame ingestion queue.
//!
//! A bounded single-producer/single-consumer buffer between the capture
//! collaborator and the writer thread. Delivery is best-effort by design:
//! `try_enqueue` drops the frame when the buffer is full so capture is never
//! made to wait, and the writer pairs prompt condvar wakeups with a short
//! bounded poll so a missed signal only costs one poll interval.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use deardiary_common::CapturedFrame;

/// Queue capacity in frames.
pub const QUEUE_CAPACITY: usize = 10;

/// Bounded drop-on-full frame buffer with a wake signal for the consumer.
pub struct FrameQueue {
    frames: Mutex<VecDeque<CapturedFrame>>,
    capacity: usize,
    ready: Condvar,
}

impl FrameQueue {
    /// Create a queue with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    /// Create a queue holding at most `capacity` frames.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            ready: Condvar::new(),
        }
    }

    /// Non-blocking enqueue. Returns `false` (frame dropped) when full.
    pub fn try_enqueue(&self, frame: CapturedFrame) -> bool {
        let mut frames = self.frames.lock().unwrap();
        if frames.len() >= self.capacity {
            tracing::debug!("frame queue full, frame dropped");
            return false;
        }
        frames.push_back(frame);
        drop(frames);
        self.ready.notify_one();
        true
    }

    /// Non-blocking dequeue, used by the writer's drain loop.
    pub fn try_dequeue(&self) -> Option<CapturedFrame> {
        self.frames.lock().unwrap().pop_front()
    }

    /// Current number of queued frames.
    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until a frame is enqueued or `timeout` elapses, whichever is
    /// first. Returns immediately if frames are already queued.
    pub fn wait_ready(&self, timeout: Duration) {
        let frames = self.frames.lock().unwrap();
        if frames.is_empty() {
            let _ = self.ready.wait_timeout(frames, timeout).unwrap();
        }
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}
