//! Fast Leader Election core for a quorum-based coordination service.
//!
//! This crate implements only the election algorithm (§1): given a
//! [`peer::PeerFacade`] describing the host peer and a
//! [`messenger::ConnectionManager`] handling point-to-point delivery, it
//! decides on a leader among a set of voting peers and hands the winner back
//! through [`election::FastLeaderElection::look_for_leader`]. Everything
//! else — the network transport, the data store, the rest of the peer's
//! lifecycle — is a collaborator this crate calls through a trait, never
//! something it owns.
//!
//! ```ignore
//! let (mut election, handle) = FastLeaderElection::new(peer, conn, Config::default());
//! match election.look_for_leader() {
//!     Ok(Some(vote)) => { /* a leader was decided */ }
//!     Ok(None) => { /* shutdown() was called, or a reconfiguration forced a restart */ }
//!     Err(e) => { /* fatal: peer facade could not report its own epoch */ }
//! }
//! ```

pub mod codec;
pub mod config;
pub mod election;
pub mod error;
pub mod messenger;
pub mod peer;
pub mod quorum;
pub mod rank;
pub mod queue;
pub mod tracker;
pub mod types;

pub use config::Config;
pub use election::{ElectionHandle, FastLeaderElection};
pub use error::FleError;
pub use messenger::ConnectionManager;
pub use peer::{LeaderFacade, PeerFacade};
pub use quorum::{Membership, Oracle, QuorumVerifier};
pub use types::{
    LearnerType, Notification, ServerState, ToSend, Vote, CURRENT_WIRE_VERSION, NO_HISTORY, NO_VOTE,
};
