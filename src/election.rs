//! Election loop (C7, spec §4.7) and role handoff (§4.8).
//!
//! `FastLeaderElection` is the long-lived object a peer constructs once and
//! calls `look_for_leader` on every time it transitions into LOOKING — a
//! long-running object with monitor-guarded shared fields, the same shape
//! as `Server` elsewhere in this codebase.
//!
//! Two pieces of state that must be externally observable without locking
//! out the loop — `logicalclock` and the current proposal — live in
//! [`Shared`], which is also handed to the messenger workers so the receiver
//! can apply a reconfiguration and request a restart (§5 "Cancellation").

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::error::FleError;
use crate::messenger::{ConnectionManager, Messenger};
use crate::peer::PeerFacade;
use crate::quorum::QuorumVerifier;
use crate::queue::{self, RecvQueue};
use crate::rank;
use crate::tracker;
use crate::types::{
    ElectionEpoch, LearnerType, Notification, PeerEpoch, ServerId, ServerState, ToSend, Vote,
    Zxid, NO_HISTORY, NO_VOTE,
};

#[derive(Debug, Clone, Copy)]
struct Proposal {
    leader: ServerId,
    zxid: Zxid,
    peer_epoch: PeerEpoch,
}

/// State shared between the election loop and the messenger workers.
pub struct Shared {
    pub(crate) logicalclock: AtomicI64,
    pub(crate) stop: AtomicBool,
    pub(crate) shutting_down: AtomicBool,
    pub(crate) leading_vote_set: Mutex<Option<HashMap<ServerId, Vote>>>,
    proposal: Mutex<Proposal>,
    pub(crate) peer: Arc<dyn PeerFacade>,
}

impl Shared {
    fn update_proposal(&self, leader: ServerId, zxid: Zxid, peer_epoch: PeerEpoch) {
        *self.proposal.lock().unwrap() = Proposal { leader, zxid, peer_epoch };
    }

    fn get_proposal(&self) -> Proposal {
        *self.proposal.lock().unwrap()
    }

    /// The live, still-evolving proposal as a `Vote` — the same construction
    /// `ElectionHandle::get_vote` exposes externally. Used by the receiver
    /// worker's lagging-peer catch-up reply (§4.4 step 6), which must answer
    /// with the current tally, not the peer facade's frozen `current_vote`.
    pub(crate) fn live_vote(&self) -> Vote {
        let p = self.get_proposal();
        Vote::new(
            p.leader,
            p.zxid,
            self.logicalclock.load(AtomicOrdering::Acquire),
            p.peer_epoch,
            self.peer.peer_state(),
        )
    }
}

/// Handle external observers (and the host peer's shutdown path) use without
/// owning the election loop itself — mirrors the `Election` capability's
/// `shutdown`/`getVote`/`getLogicalClock` surface (§6).
#[derive(Clone)]
pub struct ElectionHandle {
    shared: Arc<Shared>,
    conn: Arc<dyn ConnectionManager>,
}

impl ElectionHandle {
    /// Idempotent. Stops the messenger workers and unblocks a concurrent
    /// `look_for_leader` call at its next queue poll (worst case: one
    /// `receive_poll_timeout`).
    pub fn shutdown(&self) {
        self.shared.stop.store(true, AtomicOrdering::Release);
        self.shared.update_proposal(NO_VOTE, NO_HISTORY, NO_VOTE);
        *self.shared.leading_vote_set.lock().unwrap() = None;
        self.conn.halt();
    }

    pub fn get_vote(&self) -> Vote {
        self.shared.live_vote()
    }

    pub fn get_logical_clock(&self) -> ElectionEpoch {
        self.shared.logicalclock.load(AtomicOrdering::Acquire)
    }

    /// Consumes the "a differing reconfiguration forced a restart" signal.
    /// After a `look_for_leader` call returns `Ok(None)`, the host peer
    /// checks this to tell a forced restart apart from a plain `shutdown()`;
    /// either way this object's messenger workers have exited and a fresh
    /// `FastLeaderElection` must be constructed for the next LOOKING episode.
    pub fn take_reconfig_restart(&self) -> bool {
        self.shared.shutting_down.swap(false, AtomicOrdering::AcqRel)
    }
}

/// The election loop itself. Construct with [`FastLeaderElection::new`],
/// call [`FastLeaderElection::look_for_leader`] once per LOOKING episode.
pub struct FastLeaderElection {
    shared: Arc<Shared>,
    config: Config,
    conn: Arc<dyn ConnectionManager>,
    send_handle: queue::SendQueueHandle,
    recv_queue: RecvQueue,
    _messenger: Messenger,
}

impl FastLeaderElection {
    pub fn new(
        peer: Arc<dyn PeerFacade>,
        conn: Arc<dyn ConnectionManager>,
        config: Config,
    ) -> (FastLeaderElection, ElectionHandle) {
        let (send_handle, send_queue) = queue::send_queue();
        let (recv_handle, recv_queue) = queue::recv_queue();
        let shared = Arc::new(Shared {
            logicalclock: AtomicI64::new(0),
            stop: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            leading_vote_set: Mutex::new(None),
            proposal: Mutex::new(Proposal {
                leader: NO_VOTE,
                zxid: NO_HISTORY,
                peer_epoch: NO_VOTE,
            }),
            peer,
        });
        let messenger = Messenger::start(
            conn.clone(),
            shared.clone(),
            send_queue,
            recv_handle,
            send_handle.clone(),
            config.receive_poll_timeout(),
        );
        let handle = ElectionHandle {
            shared: shared.clone(),
            conn: conn.clone(),
        };
        (
            FastLeaderElection {
                shared,
                config,
                conn,
                send_handle,
                recv_queue,
                _messenger: messenger,
            },
            handle,
        )
    }

    /// Runs one election instance to completion. Returns `Ok(Some(vote))`
    /// once a leader is decided, `Ok(None)` if `shutdown()` was called or a
    /// reconfiguration forced a restart, `Err` only for the one fatal path
    /// (§7 `EpochReadFailure`).
    pub fn look_for_leader(&mut self) -> Result<Option<Vote>, FleError> {
        let self_id = self.shared.peer.id();
        let learner_type = self.shared.peer.learner_type();
        let is_voting_member = self.shared.peer.quorum_verifier().weight(self_id) > 0;

        let init_id = if is_voting_member { self_id } else { NO_VOTE };
        let init_zxid = if learner_type == LearnerType::Participant {
            self.shared.peer.last_logged_zxid()
        } else {
            NO_VOTE
        };
        let init_peer_epoch = if learner_type == LearnerType::Participant {
            self.shared.peer.current_epoch()?
        } else {
            NO_VOTE
        };

        let election_epoch = self.shared.logicalclock.fetch_add(1, AtomicOrdering::AcqRel) + 1;
        self.shared.update_proposal(init_id, init_zxid, init_peer_epoch);
        log::debug!(
            "sid {self_id} entering election instance {election_epoch} with proposal ({init_id}, {init_zxid:#x}, {init_peer_epoch})"
        );
        self.broadcast(init_id, init_zxid, election_epoch, init_peer_epoch);

        let mut recvset: HashMap<ServerId, Vote> = HashMap::new();
        let mut outofelection: HashMap<ServerId, Vote> = HashMap::new();
        let mut not_timeout = self.config.min_notification_interval();
        let mut prior_had_all_quorums = false;

        loop {
            if self.shared.stop.load(AtomicOrdering::Acquire) {
                return Ok(None);
            }
            if self.shared.peer.peer_state() != ServerState::Looking {
                return Ok(None);
            }

            match self.recv_queue.take(not_timeout) {
                None => {
                    if let Some(vote) = self.handle_idle(&mut not_timeout, prior_had_all_quorums, &recvset)
                    {
                        return Ok(Some(vote));
                    }
                }
                Some(n) => {
                    if !self.is_valid_voter(n.sid) || !self.is_valid_voter(n.leader) {
                        log::warn!(
                            "dropping notification from sid {} claiming leader {}: not a valid voter",
                            n.sid,
                            n.leader
                        );
                        continue;
                    }

                    let result = match n.state {
                        ServerState::Looking => self.process_looking(
                            &n,
                            init_id,
                            init_zxid,
                            init_peer_epoch,
                            &mut recvset,
                            &mut prior_had_all_quorums,
                        )?,
                        ServerState::Observing => None,
                        ServerState::Following => {
                            self.received_following_notification(&n, &mut recvset, &mut outofelection)?
                        }
                        ServerState::Leading => {
                            self.received_leading_notification(&n, &mut recvset, &mut outofelection)?
                        }
                    };
                    if let Some(vote) = result {
                        return Ok(Some(vote));
                    }
                }
            }
        }
    }

    fn handle_idle(
        &mut self,
        not_timeout: &mut std::time::Duration,
        prior_had_all_quorums: bool,
        recvset: &HashMap<ServerId, Vote>,
    ) -> Option<Vote> {
        if self.conn.have_delivered() {
            let p = self.shared.get_proposal();
            self.broadcast(
                p.leader,
                p.zxid,
                self.shared.logicalclock.load(AtomicOrdering::Acquire),
                p.peer_epoch,
            );
        } else {
            self.conn.connect_all();
        }

        let doubled = not_timeout
            .checked_mul(2)
            .unwrap_or(self.config.max_notification_interval());
        *not_timeout = doubled.min(self.config.max_notification_interval());

        let qv = self.shared.peer.quorum_verifier();
        if qv.need_oracle() && prior_had_all_quorums && *not_timeout != self.config.min_notification_interval()
        {
            let p = self.shared.get_proposal();
            let state = self.set_peer_state(p.leader, recvset.clone());
            let vote = Vote::new(
                p.leader,
                p.zxid,
                self.shared.logicalclock.load(AtomicOrdering::Acquire),
                p.peer_epoch,
                state,
            );
            self.leave_instance(&vote);
            return Some(vote);
        }
        None
    }

    fn process_looking(
        &mut self,
        n: &Notification,
        init_id: ServerId,
        init_zxid: Zxid,
        init_peer_epoch: PeerEpoch,
        recvset: &mut HashMap<ServerId, Vote>,
        prior_had_all_quorums: &mut bool,
    ) -> Result<Option<Vote>, FleError> {
        if init_zxid == NO_HISTORY || n.zxid == NO_HISTORY {
            return Ok(None);
        }

        let logicalclock = self.shared.logicalclock.load(AtomicOrdering::Acquire);
        let qv = self.shared.peer.quorum_verifier();

        match n.election_epoch.cmp(&logicalclock) {
            std::cmp::Ordering::Greater => {
                self.shared
                    .logicalclock
                    .store(n.election_epoch, AtomicOrdering::Release);
                recvset.clear();
                if rank::succeeds(&qv, n.leader, n.zxid, n.peer_epoch, init_id, init_zxid, init_peer_epoch) {
                    self.shared.update_proposal(n.leader, n.zxid, n.peer_epoch);
                } else {
                    self.shared.update_proposal(init_id, init_zxid, init_peer_epoch);
                }
                let p = self.shared.get_proposal();
                self.broadcast(p.leader, p.zxid, n.election_epoch, p.peer_epoch);
            }
            std::cmp::Ordering::Less => {
                return Ok(None);
            }
            std::cmp::Ordering::Equal => {
                let p = self.shared.get_proposal();
                if rank::succeeds(&qv, n.leader, n.zxid, n.peer_epoch, p.leader, p.zxid, p.peer_epoch) {
                    self.shared.update_proposal(n.leader, n.zxid, n.peer_epoch);
                    let p = self.shared.get_proposal();
                    self.broadcast(p.leader, p.zxid, logicalclock, p.peer_epoch);
                }
            }
        }

        recvset.insert(
            n.sid,
            Vote::new(n.leader, n.zxid, n.election_epoch, n.peer_epoch, ServerState::Looking),
        );

        let p = self.shared.get_proposal();
        let logicalclock = self.shared.logicalclock.load(AtomicOrdering::Acquire);
        let target = Vote::new(p.leader, p.zxid, logicalclock, p.peer_epoch, ServerState::Looking);
        let tracker = tracker::vote_tracker_for(recvset, &target, self.verifiers());
        *prior_had_all_quorums = tracker.has_all_quorums();

        if !tracker.has_all_quorums() {
            return Ok(None);
        }

        // Termination drain (§4.7): give any notification already in flight
        // a chance to beat the winning proposal before committing to it.
        loop {
            match self.recv_queue.take(self.config.finalize_wait()) {
                None => break,
                Some(n2) => {
                    let qv = self.shared.peer.quorum_verifier();
                    let p = self.shared.get_proposal();
                    if rank::succeeds(&qv, n2.leader, n2.zxid, n2.peer_epoch, p.leader, p.zxid, p.peer_epoch) {
                        self.recv_queue.push_back(n2);
                        return Ok(None); // restart the loop body with the requeued winner
                    }
                }
            }
        }

        let p = self.shared.get_proposal();
        let logicalclock = self.shared.logicalclock.load(AtomicOrdering::Acquire);
        let state = self.set_peer_state(p.leader, recvset.clone());
        let vote = Vote::new(p.leader, p.zxid, logicalclock, p.peer_epoch, state);
        self.leave_instance(&vote);
        Ok(Some(vote))
    }

    /// Shared by the FOLLOWING and LEADING branches (§4.7): does `n`'s
    /// claimed leader already hold a quorum we can corroborate?
    fn received_following_notification(
        &mut self,
        n: &Notification,
        recvset: &mut HashMap<ServerId, Vote>,
        outofelection: &mut HashMap<ServerId, Vote>,
    ) -> Result<Option<Vote>, FleError> {
        let self_id = self.shared.peer.id();
        let logicalclock = self.shared.logicalclock.load(AtomicOrdering::Acquire);

        if n.election_epoch == logicalclock {
            recvset.insert(n.sid, n.as_vote());
            let tracker = tracker::vote_tracker_for(recvset, &n.as_vote(), self.verifiers());
            if tracker.has_all_quorums()
                && tracker::check_leader(recvset, n.leader, n.election_epoch, self_id, logicalclock)
            {
                return Ok(Some(self.finalize_as(
                    n.leader,
                    n.zxid,
                    n.peer_epoch,
                    n.election_epoch,
                    recvset.clone(),
                )));
            }
        }

        outofelection.insert(n.sid, n.as_vote());
        let tracker = tracker::vote_tracker_for(outofelection, &n.as_vote(), self.verifiers());
        if tracker.has_all_quorums()
            && tracker::check_leader(outofelection, n.leader, n.election_epoch, self_id, logicalclock)
        {
            self.shared
                .logicalclock
                .store(n.election_epoch, AtomicOrdering::Release);
            return Ok(Some(self.finalize_as(
                n.leader,
                n.zxid,
                n.peer_epoch,
                n.election_epoch,
                outofelection.clone(),
            )));
        }

        Ok(None)
    }

    fn received_leading_notification(
        &mut self,
        n: &Notification,
        recvset: &mut HashMap<ServerId, Vote>,
        outofelection: &mut HashMap<ServerId, Vote>,
    ) -> Result<Option<Vote>, FleError> {
        if let Some(vote) = self.received_following_notification(n, recvset, outofelection)? {
            return Ok(Some(vote));
        }

        // Open question preserved verbatim (§9): the oracle is asked to
        // *deny* progress, not grant it — `need_oracle() && !ask_oracle()`
        // is the condition under which we finalize anyway.
        let qv = self.shared.peer.quorum_verifier();
        if qv.need_oracle() && !qv.ask_oracle() {
            return Ok(Some(self.finalize_as(
                n.leader,
                n.zxid,
                n.peer_epoch,
                n.election_epoch,
                recvset.clone(),
            )));
        }
        Ok(None)
    }

    fn finalize_as(
        &mut self,
        leader: ServerId,
        zxid: Zxid,
        peer_epoch: PeerEpoch,
        election_epoch: ElectionEpoch,
        vote_set: HashMap<ServerId, Vote>,
    ) -> Vote {
        let state = self.set_peer_state(leader, vote_set);
        let vote = Vote::new(leader, zxid, election_epoch, peer_epoch, state);
        self.leave_instance(&vote);
        vote
    }

    /// Role handoff (§4.8). Returns the state the peer was moved into.
    fn set_peer_state(&self, proposed_leader: ServerId, vote_set: HashMap<ServerId, Vote>) -> ServerState {
        let self_id = self.shared.peer.id();
        let new_state = if proposed_leader == self_id {
            *self.shared.leading_vote_set.lock().unwrap() = Some(vote_set);
            ServerState::Leading
        } else if self.shared.peer.learner_type() == LearnerType::Participant {
            ServerState::Following
        } else {
            ServerState::Observing
        };
        self.shared.peer.set_peer_state(new_state);
        new_state
    }

    fn leave_instance(&mut self, vote: &Vote) {
        log::info!(
            "sid {} leaving election instance with vote leader={} zxid={:#x} state={}",
            self.shared.peer.id(),
            vote.leader,
            vote.zxid,
            vote.state
        );
        self.recv_queue.clear();
    }

    /// A voter under the current config *or* the next one, mirroring
    /// `broadcast`'s target set — a next-config-only peer's reply must still
    /// be tallied so `verifiers()`'s second verifier can ever see a quorum.
    fn is_valid_voter(&self, sid: ServerId) -> bool {
        self.shared
            .peer
            .current_and_next_config_voters()
            .contains(&sid)
    }

    /// The verifier(s) a tally must satisfy: the current one, plus the next
    /// one too if a higher-versioned config has been seen but not yet
    /// adopted (§4.6).
    fn verifiers(&self) -> Vec<QuorumVerifier> {
        let current = self.shared.peer.quorum_verifier();
        let next = self.shared.peer.last_seen_quorum_verifier();
        if next.version() > current.version() {
            vec![current, next]
        } else {
            vec![current]
        }
    }

    fn broadcast(&self, leader: ServerId, zxid: Zxid, election_epoch: ElectionEpoch, peer_epoch: PeerEpoch) {
        let config = self.shared.peer.quorum_verifier().to_config_string();
        for target in self.shared.peer.current_and_next_config_voters() {
            self.send_handle.offer(ToSend {
                target,
                leader,
                zxid,
                election_epoch,
                peer_epoch,
                state: ServerState::Looking,
                config: config.clone(),
            });
        }
    }
}
