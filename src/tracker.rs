//! Vote tracker (C6, spec §4.6): accumulates acknowledgements toward one or
//! two quorum verifiers (the second appears mid-reconfiguration) and answers
//! whether every registered verifier now sees a quorum.

use std::collections::{HashMap, HashSet};

use crate::quorum::QuorumVerifier;
use crate::types::{ElectionEpoch, ServerId, Vote};

/// Accumulates `sid`s that acknowledged one candidate vote, against however
/// many quorum verifiers are currently in play.
pub struct VoteTracker {
    verifiers: Vec<QuorumVerifier>,
    acked: HashSet<ServerId>,
}

impl VoteTracker {
    pub fn new(verifiers: Vec<QuorumVerifier>) -> VoteTracker {
        VoteTracker {
            verifiers,
            acked: HashSet::new(),
        }
    }

    pub fn add_ack(&mut self, sid: ServerId) {
        self.acked.insert(sid);
    }

    /// True iff *every* registered verifier reports a containing quorum on
    /// the ack set so far.
    pub fn has_all_quorums(&self) -> bool {
        !self.verifiers.is_empty() && self.verifiers.iter().all(|v| v.contains_quorum(&self.acked))
    }
}

/// Builds a fresh tracker and populates it with acks from exactly those
/// `sid`s whose stored vote tally-equals `target` (spec §3 vote equality).
pub fn vote_tracker_for(
    votes: &HashMap<ServerId, Vote>,
    target: &Vote,
    verifiers: Vec<QuorumVerifier>,
) -> VoteTracker {
    let mut tracker = VoteTracker::new(verifiers);
    for (&sid, vote) in votes {
        if vote == target {
            tracker.add_ack(sid);
        }
    }
    tracker
}

/// True iff either we are the claimed leader and still in this election
/// instance, or the claimed leader's own last-seen vote says it is LEADING.
/// Guards against electing a crashed peer others still remember as leader.
pub fn check_leader(
    votes: &HashMap<ServerId, Vote>,
    leader: ServerId,
    election_epoch: ElectionEpoch,
    self_id: ServerId,
    logicalclock: ElectionEpoch,
) -> bool {
    if leader == self_id {
        return logicalclock == election_epoch;
    }
    votes
        .get(&leader)
        .is_some_and(|v| v.state == crate::types::ServerState::Leading)
}
