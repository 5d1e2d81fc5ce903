//! Peer facade contract (§6): the surface the election core needs from the
//! rest of the peer (data store, config, leader subsystem) without owning
//! any of it. Every method here is a collaborator the host process supplies
//! — this crate only ever calls through the trait.

use std::collections::HashMap;

use crate::error::FleError;
use crate::quorum::QuorumVerifier;
use crate::types::{LearnerType, PeerEpoch, ServerId, ServerState, Vote, Zxid};

/// The subset of the leader subsystem the receiver worker talks to once this
/// peer has become LEADING (§4.4 step 7).
pub trait LeaderFacade: Send + Sync {
    /// Records that `sid` responded to our notification while still LOOKING
    /// — i.e. a follower that hasn't caught up to our leadership yet.
    fn report_looking_sid(&self, sid: ServerId);

    /// Hands the vote set that elected us off to the leader subsystem, once,
    /// the first time a LOOKING peer responds after we've taken office.
    fn set_leading_vote_set(&self, votes: HashMap<ServerId, Vote>);
}

/// Everything the election core needs to read or mutate on the host peer.
pub trait PeerFacade: Send + Sync {
    fn id(&self) -> ServerId;

    fn learner_type(&self) -> LearnerType;

    fn peer_state(&self) -> ServerState;

    fn set_peer_state(&self, state: ServerState);

    /// The epoch of the last leader this peer acknowledged. Failure here is
    /// the one fatal error path in the whole core (§7 `EpochReadFailure`).
    fn current_epoch(&self) -> Result<PeerEpoch, FleError>;

    fn last_logged_zxid(&self) -> Zxid;

    fn quorum_verifier(&self) -> QuorumVerifier;

    fn set_quorum_verifier(&self, qv: QuorumVerifier);

    fn last_seen_quorum_verifier(&self) -> QuorumVerifier;

    fn set_last_seen_quorum_verifier(&self, qv: QuorumVerifier);

    /// Every `sid` that votes in the current configuration and, during a
    /// reconfiguration, the next one too.
    fn current_and_next_config_voters(&self) -> Vec<ServerId>;

    fn current_vote(&self) -> Vote;

    fn set_current_vote(&self, vote: Vote);

    /// Applies a reconfiguration snapshot seen on the wire. Invoked by the
    /// receiver worker when a higher-version, differing verifier arrives
    /// while this peer is LOOKING (§4.4 step 3, §5 "Cancellation").
    fn process_reconfig(&self, qv: &QuorumVerifier);

    /// `None` unless this peer currently believes itself to be the leader.
    fn leader(&self) -> Option<std::sync::Arc<dyn LeaderFacade>>;
}
