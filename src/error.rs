//! Error taxonomy for the election core (spec §7).
//!
//! Most of the error *kinds* named in §7 are handled as silent branches
//! (`StaleEpoch`, `NonVoter`) rather than `Result` values — they are routine
//! control flow, not failures. What's left here are the cases that really do
//! need to be represented, logged, or escalated.

use thiserror::Error;

/// Errors surfaced by the election core.
///
/// `MalformedFrame`, `ConfigParse`, and `Transport` are always handled locally
/// (logged and dropped) by the worker that produced them; they are public so
/// that embedding code can assert on them in tests. `Interrupted` and
/// `EpochRead` are the two variants that can escape `look_for_leader`.
#[derive(Debug, Error)]
pub enum FleError {
    /// A frame shorter than 28 bytes, or one whose declared config length
    /// doesn't fit the buffer it came from.
    #[error("malformed notification frame: {reason}")]
    MalformedFrame { reason: String },

    /// A quorum-verifier config snapshot failed to parse; the caller keeps
    /// using its existing verifier.
    #[error("failed to parse quorum verifier config: {reason}")]
    ConfigParse { reason: String },

    /// Swallowed at the connection-manager boundary; the transport is
    /// expected to self-recover and this is never propagated out of a worker.
    #[error("transport error: {0}")]
    Transport(String),

    /// A blocking `take` was interrupted (e.g. by `shutdown()`).
    #[error("election loop interrupted")]
    Interrupted,

    /// The peer facade could not report `currentEpoch`. Fatal: a peer that
    /// cannot read its own epoch cannot safely propose a vote.
    #[error("failed to read peer epoch: {0}")]
    EpochRead(String),
}
