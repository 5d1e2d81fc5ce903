//! Business queues (C2, §4.2): unbounded FIFO handoffs between the
//! election loop and the I/O worker threads.
//!
//! Built directly on `std::sync::mpsc`, the same primitive used elsewhere in
//! this codebase for `PeerThreadMessage`/`MainThreadMessage` channels.
//! `recv_timeout` gives us `take(timeout)` for free; `Sender::send` on an
//! unbounded channel never blocks, which is exactly `offer`'s contract.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::types::{Notification, ToSend};

/// Producer handle for the outbound queue; held by the election loop.
#[derive(Clone)]
pub struct SendQueueHandle {
    tx: Sender<ToSend>,
}

impl SendQueueHandle {
    /// Non-blocking enqueue. Fails only if the sender worker has shut down
    /// and dropped its receiver, which we treat the same as a swallowed
    /// transport error (§7 `TransportError` policy) — the caller doesn't
    /// need to react.
    pub fn offer(&self, msg: ToSend) {
        let _ = self.tx.send(msg);
    }
}

/// Consumer side of the outbound queue; held by the sender worker.
pub struct SendQueue {
    rx: Receiver<ToSend>,
}

impl SendQueue {
    pub fn take(&self, timeout: Duration) -> Option<ToSend> {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

pub fn send_queue() -> (SendQueueHandle, SendQueue) {
    let (tx, rx) = mpsc::channel();
    (SendQueueHandle { tx }, SendQueue { rx })
}

/// Producer handle for the inbound queue; held by the receiver worker.
#[derive(Clone)]
pub struct RecvQueueHandle {
    tx: Sender<Notification>,
}

impl RecvQueueHandle {
    pub fn offer(&self, n: Notification) {
        let _ = self.tx.send(n);
    }
}

/// Consumer side of the inbound queue; held by the election loop.
///
/// Carries a small `pending` buffer so the termination drain (§4.7) can push
/// a notification back when it doesn't beat the winning proposal, to be
/// re-read on the *next* `take` without losing FIFO order among requeued
/// items.
pub struct RecvQueue {
    rx: Receiver<Notification>,
    pending: VecDeque<Notification>,
}

impl RecvQueue {
    pub fn take(&mut self, timeout: Duration) -> Option<Notification> {
        if let Some(n) = self.pending.pop_front() {
            return Some(n);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(n) => Some(n),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Re-queues a notification drained during the termination drain so the
    /// loop can re-examine it on its next iteration (§4.7).
    pub fn push_back(&mut self, n: Notification) {
        self.pending.push_front(n);
    }

    /// Drains and discards everything currently queued (`leaveInstance`, §4.8).
    pub fn clear(&mut self) {
        self.pending.clear();
        while self.rx.try_recv().is_ok() {}
    }
}

pub fn recv_queue() -> (RecvQueueHandle, RecvQueue) {
    let (tx, rx) = mpsc::channel();
    (
        RecvQueueHandle { tx },
        RecvQueue {
            rx,
            pending: VecDeque::new(),
        },
    )
}
