//! Vote ranking predicate (C5, spec §4.5): the single tie-breaker used
//! everywhere a candidate is compared against the current proposal.

use crate::quorum::QuorumVerifier;
use crate::types::{PeerEpoch, ServerId, Zxid};

/// True iff `(new_id, new_zxid, new_epoch)` should replace
/// `(cur_id, cur_zxid, cur_epoch)` as the proposal.
///
/// A candidate with zero weight under `qv` (an observer, or a member dropped
/// by a reconfiguration) never succeeds, regardless of how it compares.
/// Otherwise this is lexicographic `(peerEpoch, zxid, serverId)` — epoch
/// dominates, then transaction history, then id only as the final
/// tie-break.
pub fn succeeds(
    qv: &QuorumVerifier,
    new_id: ServerId,
    new_zxid: Zxid,
    new_epoch: PeerEpoch,
    cur_id: ServerId,
    cur_zxid: Zxid,
    cur_epoch: PeerEpoch,
) -> bool {
    if qv.weight(new_id) == 0 {
        return false;
    }
    (new_epoch, new_zxid, new_id) > (cur_epoch, cur_zxid, cur_id)
}
