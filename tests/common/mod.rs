//! In-memory test doubles for the `ConnectionManager` and `PeerFacade`
//! contracts, shared by every scenario test in this directory. Each double
//! is as dumb as it can be — the point is to exercise the election core, not
//! to re-implement a transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fast_leader_election::{
    ConnectionManager, FleError, LeaderFacade, LearnerType, PeerFacade, QuorumVerifier,
    ServerState, Vote, NO_HISTORY, NO_VOTE,
};

type ServerId = i64;
type Zxid = i64;
type PeerEpoch = i64;

/// Wires together a fully-connected in-memory cluster: every connection
/// manager can reach every other by `ServerId`.
pub struct Wiring {
    registry: Arc<Mutex<HashMap<ServerId, Sender<(ServerId, Vec<u8>)>>>>,
}

impl Wiring {
    pub fn new() -> Wiring {
        Wiring {
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn connection_for(&self, id: ServerId) -> Arc<FakeConnectionManager> {
        let (tx, rx) = mpsc::channel();
        self.registry.lock().unwrap().insert(id, tx);
        Arc::new(FakeConnectionManager {
            self_id: id,
            registry: self.registry.clone(),
            inbox: Mutex::new(rx),
            halted: AtomicBool::new(false),
        })
    }

    /// Delivers a raw frame as if `from` had sent it to `to`, without `from`
    /// needing a connection manager or election loop of its own — used to
    /// simulate a single inbound notification (e.g. a reconfiguration) in
    /// isolation.
    pub fn inject(&self, from: ServerId, to: ServerId, frame: Vec<u8>) {
        if let Some(tx) = self.registry.lock().unwrap().get(&to) {
            let _ = tx.send((from, frame));
        }
    }
}

pub struct FakeConnectionManager {
    self_id: ServerId,
    registry: Arc<Mutex<HashMap<ServerId, Sender<(ServerId, Vec<u8>)>>>>,
    inbox: Mutex<Receiver<(ServerId, Vec<u8>)>>,
    halted: AtomicBool,
}

impl ConnectionManager for FakeConnectionManager {
    fn send(&self, target: ServerId, frame: Vec<u8>) {
        if let Some(tx) = self.registry.lock().unwrap().get(&target) {
            let _ = tx.send((self.self_id, frame));
        }
    }

    fn poll_recv_queue(&self, timeout: Duration) -> Option<(ServerId, Vec<u8>)> {
        if self.halted.load(Ordering::Acquire) {
            return None;
        }
        self.inbox.lock().unwrap().recv_timeout(timeout).ok()
    }

    fn have_delivered(&self) -> bool {
        true
    }

    fn connect_all(&self) {}

    fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }

    fn connection_thread_count(&self) -> usize {
        self.registry.lock().unwrap().len()
    }
}

pub struct FakePeer {
    id: ServerId,
    learner_type: LearnerType,
    state: Mutex<ServerState>,
    epoch: PeerEpoch,
    zxid: Zxid,
    qv: Mutex<QuorumVerifier>,
    last_seen_qv: Mutex<QuorumVerifier>,
    current_vote: Mutex<Vote>,
    leader: Mutex<Option<Arc<dyn LeaderFacade>>>,
}

impl FakePeer {
    pub fn participant(id: ServerId, zxid: Zxid, epoch: PeerEpoch, qv: QuorumVerifier) -> Arc<FakePeer> {
        Arc::new(FakePeer {
            id,
            learner_type: LearnerType::Participant,
            state: Mutex::new(ServerState::Looking),
            epoch,
            zxid,
            qv: Mutex::new(qv.clone()),
            last_seen_qv: Mutex::new(qv),
            current_vote: Mutex::new(Vote::new(id, zxid, 0, epoch, ServerState::Looking)),
            leader: Mutex::new(None),
        })
    }

    pub fn observer(id: ServerId, qv: QuorumVerifier) -> Arc<FakePeer> {
        Arc::new(FakePeer {
            id,
            learner_type: LearnerType::Observer,
            state: Mutex::new(ServerState::Looking),
            epoch: 0,
            zxid: 0,
            qv: Mutex::new(qv.clone()),
            last_seen_qv: Mutex::new(qv),
            current_vote: Mutex::new(Vote::new(NO_VOTE, NO_HISTORY, 0, NO_VOTE, ServerState::Looking)),
            leader: Mutex::new(None),
        })
    }

    pub fn state(&self) -> ServerState {
        *self.state.lock().unwrap()
    }
}

impl PeerFacade for FakePeer {
    fn id(&self) -> ServerId {
        self.id
    }

    fn learner_type(&self) -> LearnerType {
        self.learner_type
    }

    fn peer_state(&self) -> ServerState {
        *self.state.lock().unwrap()
    }

    fn set_peer_state(&self, state: ServerState) {
        *self.state.lock().unwrap() = state;
    }

    fn current_epoch(&self) -> Result<PeerEpoch, FleError> {
        Ok(self.epoch)
    }

    fn last_logged_zxid(&self) -> Zxid {
        self.zxid
    }

    fn quorum_verifier(&self) -> QuorumVerifier {
        self.qv.lock().unwrap().clone()
    }

    fn set_quorum_verifier(&self, qv: QuorumVerifier) {
        *self.qv.lock().unwrap() = qv;
    }

    fn last_seen_quorum_verifier(&self) -> QuorumVerifier {
        self.last_seen_qv.lock().unwrap().clone()
    }

    fn set_last_seen_quorum_verifier(&self, qv: QuorumVerifier) {
        *self.last_seen_qv.lock().unwrap() = qv;
    }

    fn current_and_next_config_voters(&self) -> Vec<ServerId> {
        let cur = self.qv.lock().unwrap();
        let next = self.last_seen_qv.lock().unwrap();
        let mut ids = cur.voting_members();
        if next.version() > cur.version() {
            for id in next.voting_members() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    fn current_vote(&self) -> Vote {
        *self.current_vote.lock().unwrap()
    }

    fn set_current_vote(&self, vote: Vote) {
        *self.current_vote.lock().unwrap() = vote;
    }

    fn process_reconfig(&self, _qv: &QuorumVerifier) {}

    fn leader(&self) -> Option<Arc<dyn LeaderFacade>> {
        self.leader.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct FakeLeader {
    pub looking_sids: Mutex<Vec<ServerId>>,
    pub vote_set: Mutex<Option<HashMap<ServerId, Vote>>>,
}

impl FakeLeader {
    pub fn new() -> Arc<FakeLeader> {
        Arc::new(FakeLeader::default())
    }
}

impl LeaderFacade for FakeLeader {
    fn report_looking_sid(&self, sid: ServerId) {
        self.looking_sids.lock().unwrap().push(sid);
    }

    fn set_leading_vote_set(&self, votes: HashMap<ServerId, Vote>) {
        *self.vote_set.lock().unwrap() = Some(votes);
    }
}

/// Fast timings so the test suite doesn't spend real seconds in exponential
/// backoff or the termination drain.
pub fn fast_config() -> fast_leader_election::Config {
    fast_leader_election::Config::new(
        Duration::from_millis(10),
        Duration::from_millis(200),
        Duration::from_millis(20),
        Duration::from_millis(30),
    )
}
