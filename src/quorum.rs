//! Quorum verifier contract (spec §3, §6) and its concrete variants.
//!
//! The membership/weight/tie-break surface is modeled as one tagged enum
//! rather than a trait object hierarchy (§9 design notes: "the concrete
//! verifier... is one tagged variant"), grounded on the membership/weight
//! abstraction in `other_examples/0a4dcfff_..._cluster-membership.rs`.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::FleError;
use crate::types::ServerId;

/// External tie-breaker consulted by an oracle-majority verifier. Out of
/// scope for this crate to implement (it's an operator-supplied collaborator)
/// — only the contract is defined here.
pub trait Oracle: fmt::Debug + Send + Sync {
    fn ask(&self) -> bool;
}

/// Membership + per-member weight, the common substrate of every verifier
/// kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    version: i64,
    weights: BTreeMap<ServerId, u32>,
}

impl Membership {
    pub fn new(version: i64, weights: BTreeMap<ServerId, u32>) -> Membership {
        Membership { version, weights }
    }

    /// Convenience constructor for a plain one-vote-per-member majority.
    pub fn majority(version: i64, members: impl IntoIterator<Item = ServerId>) -> Membership {
        Membership::new(version, members.into_iter().map(|id| (id, 1)).collect())
    }

    fn total_weight(&self) -> u32 {
        self.weights.values().sum()
    }

    fn weight(&self, sid: ServerId) -> u32 {
        self.weights.get(&sid).copied().unwrap_or(0)
    }

    fn contains_quorum(&self, acked: &HashSet<ServerId>) -> bool {
        let acked_weight: u32 = acked
            .iter()
            .filter_map(|sid| self.weights.get(sid))
            .sum();
        acked_weight * 2 > self.total_weight()
    }

    fn to_config_string(&self) -> String {
        let members = self
            .weights
            .iter()
            .map(|(id, w)| format!("{id}:{w}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("version={};members={}", self.version, members)
    }

    fn from_config_string(s: &str) -> Result<Membership, FleError> {
        let mut version = None;
        let mut weights = BTreeMap::new();
        for part in s.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some(v) = part.strip_prefix("version=") {
                version = Some(v.parse::<i64>().map_err(|e| FleError::ConfigParse {
                    reason: format!("bad version {v:?}: {e}"),
                })?);
            } else if let Some(m) = part.strip_prefix("members=") {
                for member in m.split(',') {
                    if member.is_empty() {
                        continue;
                    }
                    let (id, w) = member.split_once(':').ok_or_else(|| FleError::ConfigParse {
                        reason: format!("malformed member entry {member:?}"),
                    })?;
                    let id: ServerId = id.parse().map_err(|e| FleError::ConfigParse {
                        reason: format!("bad member id {id:?}: {e}"),
                    })?;
                    let w: u32 = w.parse().map_err(|e| FleError::ConfigParse {
                        reason: format!("bad member weight {w:?}: {e}"),
                    })?;
                    weights.insert(id, w);
                }
            }
        }
        let version = version.ok_or_else(|| FleError::ConfigParse {
            reason: "missing version field".to_string(),
        })?;
        Ok(Membership::new(version, weights))
    }
}

/// A pluggable quorum predicate (spec §3's `QuorumVerifier`). Two kinds are
/// modeled: a plain weighted majority, and one augmented with an oracle
/// tie-breaker for configurations (typically 2 voters) that can't otherwise
/// survive a single failure.
#[derive(Debug, Clone)]
pub enum QuorumVerifier {
    Weighted(Membership),
    OracleMajority {
        membership: Membership,
        oracle: Arc<dyn Oracle>,
    },
}

impl PartialEq for QuorumVerifier {
    fn eq(&self, other: &Self) -> bool {
        self.version() == other.version() && self.to_config_string() == other.to_config_string()
    }
}

impl QuorumVerifier {
    pub fn majority(version: i64, members: impl IntoIterator<Item = ServerId>) -> QuorumVerifier {
        QuorumVerifier::Weighted(Membership::majority(version, members))
    }

    pub fn weighted(membership: Membership) -> QuorumVerifier {
        QuorumVerifier::Weighted(membership)
    }

    pub fn oracle_majority(membership: Membership, oracle: Arc<dyn Oracle>) -> QuorumVerifier {
        QuorumVerifier::OracleMajority { membership, oracle }
    }

    fn membership(&self) -> &Membership {
        match self {
            QuorumVerifier::Weighted(m) => m,
            QuorumVerifier::OracleMajority { membership, .. } => membership,
        }
    }

    pub fn voting_members(&self) -> Vec<ServerId> {
        self.membership().weights.keys().copied().collect()
    }

    pub fn weight(&self, sid: ServerId) -> u32 {
        self.membership().weight(sid)
    }

    pub fn contains_quorum(&self, acked: &HashSet<ServerId>) -> bool {
        self.membership().contains_quorum(acked)
    }

    pub fn version(&self) -> i64 {
        self.membership().version
    }

    /// True only for an oracle-majority verifier whose membership can't form
    /// a majority on its own merits — the canonical case is exactly two
    /// voting members (one failure otherwise deadlocks the quorum).
    pub fn need_oracle(&self) -> bool {
        matches!(self, QuorumVerifier::OracleMajority { .. }) && self.voting_members().len() == 2
    }

    pub fn ask_oracle(&self) -> bool {
        match self {
            QuorumVerifier::OracleMajority { oracle, .. } => oracle.ask(),
            QuorumVerifier::Weighted(_) => false,
        }
    }

    /// Re-checks whether `acked` still forms a quorum under this verifier.
    /// Part of the contract surface (§3); the election loop itself only ever
    /// needs `contains_quorum`, so this defers to the caller's own tally by
    /// default, matching the un-exercised `revalidateVoteset` contract slot.
    pub fn revalidate_voteset(&self, acked: &HashSet<ServerId>, currently_has_quorum: bool) -> bool {
        currently_has_quorum && self.contains_quorum(acked)
    }

    pub fn to_config_string(&self) -> String {
        self.membership().to_config_string()
    }

    /// Parses a `Weighted` verifier snapshot as received over the wire. An
    /// oracle verifier is never reconstructed from a wire snapshot — the
    /// oracle collaborator has no wire representation, so peers that need
    /// oracle tie-breaking must be configured with it locally.
    pub fn from_config_string(s: &str) -> Result<QuorumVerifier, FleError> {
        Membership::from_config_string(s).map(QuorumVerifier::Weighted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majority_of_three_needs_two() {
        let qv = QuorumVerifier::majority(1, [1, 2, 3]);
        let mut acked = HashSet::new();
        acked.insert(1);
        assert!(!qv.contains_quorum(&acked));
        acked.insert(2);
        assert!(qv.contains_quorum(&acked));
    }

    #[test]
    fn weight_zero_member_excluded() {
        let mut weights = BTreeMap::new();
        weights.insert(1, 1);
        weights.insert(2, 1);
        weights.insert(3, 0); // observer masquerading as a weighted entry
        let qv = QuorumVerifier::weighted(Membership::new(1, weights));
        assert_eq!(qv.weight(3), 0);
    }

    #[test]
    fn config_round_trip() {
        let qv = QuorumVerifier::majority(4, [1, 2, 3]);
        let s = qv.to_config_string();
        let parsed = QuorumVerifier::from_config_string(&s).unwrap();
        assert_eq!(parsed, qv);
    }

    #[derive(Debug)]
    struct FixedOracle(bool);
    impl Oracle for FixedOracle {
        fn ask(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn need_oracle_only_for_two_voters() {
        let two = QuorumVerifier::oracle_majority(
            Membership::majority(1, [1, 2]),
            Arc::new(FixedOracle(true)),
        );
        assert!(two.need_oracle());
        let three = QuorumVerifier::oracle_majority(
            Membership::majority(1, [1, 2, 3]),
            Arc::new(FixedOracle(true)),
        );
        assert!(!three.need_oracle());
    }
}
