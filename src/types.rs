//! Core data model (spec §3): ids, votes, and the wire-adjacent
//! `Notification`/`ToSend` records exchanged between the election loop and
//! the messenger workers.

use std::fmt;

/// 64-bit signed peer identifier. `NO_VOTE` is the sentinel an observer (or a
/// non-voting member) proposes instead of its own id.
pub type ServerId = i64;

/// Sentinel meaning "no vote" — used by peers that are not voting members.
pub const NO_VOTE: ServerId = i64::MIN;

/// Opaque transaction id. High 32 bits are the epoch of the leader that
/// issued it, low 32 bits a per-epoch counter. `NO_HISTORY` means the peer
/// has never logged a transaction.
pub type Zxid = i64;

/// Sentinel meaning "no history".
pub const NO_HISTORY: Zxid = -1;

/// The epoch of the last leader this peer acknowledged.
pub type PeerEpoch = i64;

/// Per-peer election-instance counter ("logical clock").
pub type ElectionEpoch = i64;

/// Current wire-codec version this crate emits (§4.1, "Versioned").
pub const CURRENT_WIRE_VERSION: i32 = 0x2;

/// The role a peer is in (or is proposing for a candidate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerState {
    Looking,
    Following,
    Leading,
    Observing,
}

impl ServerState {
    /// Maps the wire `rstate` byte onto a `ServerState`. Unknown values are
    /// the caller's problem to drop (§4.4 step 5).
    pub fn from_wire(rstate: i32) -> Option<ServerState> {
        match rstate {
            0 => Some(ServerState::Looking),
            1 => Some(ServerState::Following),
            2 => Some(ServerState::Leading),
            3 => Some(ServerState::Observing),
            _ => None,
        }
    }

    pub fn to_wire(self) -> i32 {
        match self {
            ServerState::Looking => 0,
            ServerState::Following => 1,
            ServerState::Leading => 2,
            ServerState::Observing => 3,
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServerState::Looking => "LOOKING",
            ServerState::Following => "FOLLOWING",
            ServerState::Leading => "LEADING",
            ServerState::Observing => "OBSERVING",
        };
        f.write_str(s)
    }
}

/// Whether a peer is a full voting participant or a non-voting observer.
/// Observers never propose a real `leader` and never count toward a quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnerType {
    Participant,
    Observer,
}

/// A candidate or committed vote. `version` and `state` are carried for the
/// wire format but excluded from equality: two votes "tally equal" iff their
/// `(leader, zxid, peer_epoch, election_epoch)` agree (spec §3).
#[derive(Debug, Clone, Copy)]
pub struct Vote {
    pub version: i32,
    pub leader: ServerId,
    pub zxid: Zxid,
    pub election_epoch: ElectionEpoch,
    pub peer_epoch: PeerEpoch,
    pub state: ServerState,
}

impl Vote {
    pub fn new(
        leader: ServerId,
        zxid: Zxid,
        election_epoch: ElectionEpoch,
        peer_epoch: PeerEpoch,
        state: ServerState,
    ) -> Vote {
        Vote {
            version: CURRENT_WIRE_VERSION,
            leader,
            zxid,
            election_epoch,
            peer_epoch,
            state,
        }
    }
}

impl PartialEq for Vote {
    fn eq(&self, other: &Self) -> bool {
        self.leader == other.leader
            && self.zxid == other.zxid
            && self.peer_epoch == other.peer_epoch
            && self.election_epoch == other.election_epoch
    }
}
impl Eq for Vote {}

/// A decoded inbound message (spec §3). `config` is the sender's raw quorum
/// configuration snapshot, still serialized — `quorum.rs` owns parsing it.
#[derive(Debug, Clone)]
pub struct Notification {
    pub sid: ServerId,
    pub leader: ServerId,
    pub zxid: Zxid,
    pub election_epoch: ElectionEpoch,
    pub peer_epoch: PeerEpoch,
    pub state: ServerState,
    pub version: i32,
    pub config: Option<String>,
}

impl Notification {
    /// Projects the vote-relevant fields of this notification into a `Vote`,
    /// the shape `recvset`/`outofelection` actually store.
    pub fn as_vote(&self) -> Vote {
        Vote {
            version: self.version,
            leader: self.leader,
            zxid: self.zxid,
            election_epoch: self.election_epoch,
            peer_epoch: self.peer_epoch,
            state: self.state,
        }
    }
}

/// An outbound message queued for the sender worker (spec §3).
#[derive(Debug, Clone)]
pub struct ToSend {
    pub target: ServerId,
    pub leader: ServerId,
    pub zxid: Zxid,
    pub election_epoch: ElectionEpoch,
    pub peer_epoch: PeerEpoch,
    pub state: ServerState,
    pub config: String,
}
