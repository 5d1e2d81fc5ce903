//! Connection manager contract (§6) plus the sender/receiver worker threads
//! (C3, C4) that sit between it and the election loop's queues.
//!
//! The thread-per-worker, channel-handoff shape follows `Peer::start`'s
//! pattern elsewhere in this codebase: spawn a background thread that loops
//! on a channel receive. Here the workers loop on `queue.take(timeout)` /
//! `conn.poll_recv_queue(timeout)` instead of an unbounded blocking recv,
//! since §4.3/§4.4 call for a bounded poll.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::codec;
use crate::election::Shared;
use crate::queue::{RecvQueueHandle, SendQueue, SendQueueHandle};
use crate::quorum::QuorumVerifier;
use crate::types::{ServerId, ServerState, ToSend, Vote};

/// Point-to-point delivery, out of scope for this crate (§1) — only the
/// contract it must satisfy is defined here.
pub trait ConnectionManager: Send + Sync {
    /// Best-effort send; may silently drop.
    fn send(&self, target: ServerId, frame: Vec<u8>);

    /// Blocking poll with a timeout, producing the next inbound frame.
    fn poll_recv_queue(&self, timeout: Duration) -> Option<(ServerId, Vec<u8>)>;

    /// True iff every per-peer outbound queue is currently empty.
    fn have_delivered(&self) -> bool;

    /// Kick-starts reconnection attempts to all known voters.
    fn connect_all(&self);

    fn halt(&self);

    fn connection_thread_count(&self) -> usize;
}

/// Sender worker (C3): drains `queue`, encodes a versioned frame, and hands
/// it to the connection manager. Never surfaces transport errors — delivery
/// reliability is the transport's concern (§7 `TransportError`).
pub fn spawn_sender(
    queue: SendQueue,
    conn: Arc<dyn ConnectionManager>,
    shared: Arc<Shared>,
    poll_timeout: Duration,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        if shared.stop.load(Ordering::Acquire) {
            return;
        }
        if let Some(msg) = queue.take(poll_timeout) {
            let vote = Vote::new(msg.leader, msg.zxid, msg.election_epoch, msg.peer_epoch, msg.state);
            let frame = codec::encode(&vote, &msg.config);
            conn.send(msg.target, frame);
        }
    })
}

/// Receiver worker (C4): pulls raw frames off the connection manager,
/// decodes them, and either routes them into `recvqueue` or replies
/// immediately, per §4.4.
pub fn spawn_receiver(
    conn: Arc<dyn ConnectionManager>,
    recv_handle: RecvQueueHandle,
    reply_handle: SendQueueHandle,
    shared: Arc<Shared>,
    poll_timeout: Duration,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        if shared.stop.load(Ordering::Acquire) {
            return;
        }
        let Some((sid, frame)) = conn.poll_recv_queue(poll_timeout) else {
            continue;
        };

        // Step 1: belt-and-suspenders short-frame rejection; `codec::decode`
        // enforces the same floor.
        if frame.len() < 28 {
            log::warn!("rejecting frame from {sid}: shorter than 28 bytes");
            continue;
        }

        let notification = match codec::decode(sid, &frame) {
            Ok(Some(n)) => n,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("dropping frame from {sid}: {e}");
                continue;
            }
        };

        // Step 3: reconfiguration.
        if let Some(cfg) = &notification.config {
            match QuorumVerifier::from_config_string(cfg) {
                Ok(new_qv) => handle_reconfig(&shared, new_qv),
                Err(e) => log::warn!("failed to parse quorum config from {sid}: {e}"),
            }
            if shared.stop.load(Ordering::Acquire) {
                return;
            }
        }

        // Step 4: non-voter fast path. A peer counted only under the next
        // config (mid-reconfiguration) is still a voter — matches the
        // target set `broadcast` sends to.
        if !shared
            .peer
            .current_and_next_config_voters()
            .contains(&sid)
        {
            reply_with_current_vote(&shared, &reply_handle, sid);
            continue;
        }

        let self_state = shared.peer.peer_state();
        if self_state == ServerState::Looking {
            // Step 6. The sender is lagging behind our current election
            // instance — answer with the live, still-evolving proposal (not
            // the peer facade's frozen `current_vote`) so it catches up to
            // what we're actually tallying.
            let lagging = notification.state == ServerState::Looking
                && notification.election_epoch < shared.logicalclock.load(Ordering::Acquire);
            recv_handle.offer(notification);
            if lagging {
                reply_with_live_vote(&shared, &reply_handle, sid);
            }
        } else if notification.state == ServerState::Looking {
            // Step 7.
            reply_with_current_vote(&shared, &reply_handle, sid);
            if self_state == ServerState::Leading {
                if let Some(leader) = shared.peer.leader() {
                    leader.report_looking_sid(sid);
                    let mut lvs = shared.leading_vote_set.lock().unwrap();
                    if let Some(votes) = lvs.take() {
                        leader.set_leading_vote_set(votes);
                    }
                }
            }
        }
    })
}

/// Applies a higher-version reconfiguration snapshot (§4.4 step 3, §9 "mid-
/// epoch verifier swap" open question: resolved here as restart-on-
/// difference).
fn handle_reconfig(shared: &Arc<Shared>, new_qv: QuorumVerifier) {
    let current_qv = shared.peer.quorum_verifier();
    if new_qv.version() <= current_qv.version() {
        return;
    }
    if shared.peer.peer_state() == ServerState::Looking {
        shared.peer.process_reconfig(&new_qv);
        let differs = new_qv != current_qv;
        shared.peer.set_quorum_verifier(new_qv);
        if differs {
            log::debug!("quorum reconfiguration differs from current verifier, restarting election");
            shared.shutting_down.store(true, Ordering::Release);
            shared.stop.store(true, Ordering::Release);
        }
    } else {
        shared.peer.set_last_seen_quorum_verifier(new_qv);
    }
}

fn reply_with_current_vote(shared: &Arc<Shared>, reply_handle: &SendQueueHandle, target: ServerId) {
    let vote = shared.peer.current_vote();
    let state = shared.peer.peer_state();
    let config = shared.peer.quorum_verifier().to_config_string();
    reply_handle.offer(ToSend {
        target,
        leader: vote.leader,
        zxid: vote.zxid,
        election_epoch: vote.election_epoch,
        peer_epoch: vote.peer_epoch,
        state,
        config,
    });
}

fn reply_with_live_vote(shared: &Arc<Shared>, reply_handle: &SendQueueHandle, target: ServerId) {
    let vote = shared.live_vote();
    let config = shared.peer.quorum_verifier().to_config_string();
    reply_handle.offer(ToSend {
        target,
        leader: vote.leader,
        zxid: vote.zxid,
        election_epoch: vote.election_epoch,
        peer_epoch: vote.peer_epoch,
        state: vote.state,
        config,
    });
}

/// Owns the two long-running worker threads for one election instance.
/// Daemon-style: shutdown never joins them, it just flips `shared.stop` and
/// lets them exit on their next poll (§5 "Cancellation").
pub struct Messenger {
    sender_thread: Option<JoinHandle<()>>,
    receiver_thread: Option<JoinHandle<()>>,
}

impl Messenger {
    pub fn start(
        conn: Arc<dyn ConnectionManager>,
        shared: Arc<Shared>,
        send_queue: SendQueue,
        recv_handle: RecvQueueHandle,
        reply_handle: SendQueueHandle,
        poll_timeout: Duration,
    ) -> Messenger {
        let sender_thread = spawn_sender(send_queue, conn.clone(), shared.clone(), poll_timeout);
        let receiver_thread = spawn_receiver(conn, recv_handle, reply_handle, shared, poll_timeout);
        Messenger {
            sender_thread: Some(sender_thread),
            receiver_thread: Some(receiver_thread),
        }
    }

    /// Blocks until both worker threads have observed `stop` and exited.
    /// Only used by tests that want a clean teardown; production shutdown
    /// doesn't need to wait (§5).
    #[cfg(test)]
    pub fn join(mut self) {
        if let Some(t) = self.sender_thread.take() {
            let _ = t.join();
        }
        if let Some(t) = self.receiver_thread.take() {
            let _ = t.join();
        }
    }
}
