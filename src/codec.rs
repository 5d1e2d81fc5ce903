//! Wire codec (C1, spec §4.1).
//!
//! Frames are big-endian binary with three length-distinguished variants:
//! legacy (28 bytes, pre-epoch), classic (40 bytes, no config), and
//! versioned (44+N bytes, carrying a quorum-config snapshot). We always
//! *encode* the versioned form; all three are accepted on *decode* for
//! backward compatibility with peers running an older notification format.

use crate::error::FleError;
use crate::types::{Notification, ServerState, Vote};

const LEGACY_LEN: usize = 28;
const CLASSIC_LEN: usize = 40;
const HEADER_LEN: usize = 44;

/// Encodes `vote` as a versioned frame addressed implicitly to whoever reads
/// it — the sender (`sid`) isn't part of the payload, only the envelope the
/// connection manager wraps it in.
///
/// `config` is the sender's current quorum configuration serialization; it
/// may be empty but is always present (the header is always 44 bytes).
pub fn encode(vote: &Vote, config: &str) -> Vec<u8> {
    let config_bytes = config.as_bytes();
    let mut buf = Vec::with_capacity(HEADER_LEN + config_bytes.len());
    buf.extend_from_slice(&vote.state.to_wire().to_be_bytes());
    buf.extend_from_slice(&vote.leader.to_be_bytes());
    buf.extend_from_slice(&vote.zxid.to_be_bytes());
    buf.extend_from_slice(&vote.election_epoch.to_be_bytes());
    buf.extend_from_slice(&vote.peer_epoch.to_be_bytes());
    buf.extend_from_slice(&crate::types::CURRENT_WIRE_VERSION.to_be_bytes());
    buf.extend_from_slice(&(config_bytes.len() as i32).to_be_bytes());
    buf.extend_from_slice(config_bytes);
    buf
}

/// Decodes a raw frame from `sid`.
///
/// Returns `Ok(None)` for frames that are too short to contain anything
/// (dropped silently); `Err(FleError::MalformedFrame)` for frames that
/// declare an inconsistent config length; `Ok(Some(_))` otherwise. A config
/// snapshot that fails to parse as UTF-8 is not a decode failure — the
/// notification is still returned, just with `config: None`.
pub fn decode(sid: crate::types::ServerId, buf: &[u8]) -> Result<Option<Notification>, FleError> {
    if buf.len() < LEGACY_LEN {
        log::warn!("dropping frame from {sid}: {} bytes < minimum {LEGACY_LEN}", buf.len());
        return Ok(None);
    }

    let state_raw = read_i32(buf, 0)?;
    let leader = read_i64(buf, 4)?;
    let zxid = read_i64(buf, 12)?;
    let election_epoch = read_i64(buf, 20)?;

    let state = match ServerState::from_wire(state_raw) {
        Some(s) => s,
        None => {
            log::warn!("dropping frame from {sid}: unknown server state {state_raw}");
            return Ok(None);
        }
    };

    let (peer_epoch, version, config) = match buf.len() {
        LEGACY_LEN => {
            // Pre-epoch senders never had a peerEpoch field; derive it from
            // the zxid's high word, same as the epoch embedded in any zxid.
            (((zxid as u64) >> 32) as i64, 0, None)
        }
        CLASSIC_LEN => {
            let peer_epoch = read_i64(buf, LEGACY_LEN)?;
            (peer_epoch, 0, None)
        }
        n if n > CLASSIC_LEN => {
            let peer_epoch = read_i64(buf, LEGACY_LEN)?;
            let version = read_i32(buf, 36)?;
            let config = if version > 1 {
                decode_config(sid, buf, n)?
            } else {
                None
            };
            (peer_epoch, version, config)
        }
        n => {
            log::warn!("dropping frame from {sid}: unsupported length {n} bytes");
            return Ok(None);
        }
    };

    Ok(Some(Notification {
        sid,
        leader,
        zxid,
        election_epoch,
        peer_epoch,
        state,
        version,
        config,
    }))
}

fn decode_config(
    sid: crate::types::ServerId,
    buf: &[u8],
    capacity: usize,
) -> Result<Option<String>, FleError> {
    let config_len = read_i32(buf, 40)?;
    if config_len < 0 || config_len as usize > capacity {
        return Err(FleError::MalformedFrame {
            reason: format!(
                "config length {config_len} out of bounds for capacity {capacity} (sid {sid})"
            ),
        });
    }
    let config_len = config_len as usize;
    let end = HEADER_LEN
        .checked_add(config_len)
        .ok_or_else(|| FleError::MalformedFrame {
            reason: format!("config length {config_len} overflows frame bounds"),
        })?;
    if end > buf.len() {
        return Err(FleError::MalformedFrame {
            reason: format!(
                "frame declares {config_len} config bytes but only {} available",
                buf.len().saturating_sub(HEADER_LEN)
            ),
        });
    }
    match std::str::from_utf8(&buf[HEADER_LEN..end]) {
        Ok(s) => Ok(Some(s.to_owned())),
        Err(e) => {
            log::warn!("sid {sid} sent a non-UTF8 quorum config snapshot: {e}");
            Ok(None)
        }
    }
}

fn read_i32(buf: &[u8], offset: usize) -> Result<i32, FleError> {
    buf.get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .map(i32::from_be_bytes)
        .ok_or_else(|| FleError::MalformedFrame {
            reason: format!("truncated i32 at offset {offset}"),
        })
}

fn read_i64(buf: &[u8], offset: usize) -> Result<i64, FleError> {
    buf.get(offset..offset + 8)
        .and_then(|s| s.try_into().ok())
        .map(i64::from_be_bytes)
        .ok_or_else(|| FleError::MalformedFrame {
            reason: format!("truncated i64 at offset {offset}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vote;

    #[test]
    fn versioned_round_trip() {
        let vote = Vote::new(3, 0x100, 7, 1, ServerState::Looking);
        let frame = encode(&vote, "group=a,b,c");
        let decoded = decode(9, &frame).unwrap().unwrap();
        assert_eq!(decoded.leader, vote.leader);
        assert_eq!(decoded.zxid, vote.zxid);
        assert_eq!(decoded.election_epoch, vote.election_epoch);
        assert_eq!(decoded.peer_epoch, vote.peer_epoch);
        assert_eq!(decoded.state, vote.state);
        assert_eq!(decoded.version, crate::types::CURRENT_WIRE_VERSION);
        assert_eq!(decoded.config.as_deref(), Some("group=a,b,c"));
        assert_eq!(decoded.sid, 9);
    }

    #[test]
    fn versioned_round_trip_empty_config() {
        let vote = Vote::new(3, 0x100, 7, 1, ServerState::Leading);
        let frame = encode(&vote, "");
        assert_eq!(frame.len(), 44);
        let decoded = decode(9, &frame).unwrap().unwrap();
        assert_eq!(decoded.config.as_deref(), Some(""));
    }

    #[test]
    fn legacy_28_byte_frame_derives_peer_epoch_from_zxid() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0i32.to_be_bytes()); // LOOKING
        buf.extend_from_slice(&9i64.to_be_bytes()); // leader
        buf.extend_from_slice(&0x0000000500000003i64.to_be_bytes()); // zxid
        buf.extend_from_slice(&42i64.to_be_bytes()); // electionEpoch
        assert_eq!(buf.len(), 28);

        let n = decode(7, &buf).unwrap().unwrap();
        assert_eq!(n.leader, 9);
        assert_eq!(n.zxid, 0x0000000500000003);
        assert_eq!(n.election_epoch, 42);
        assert_eq!(n.peer_epoch, 0x5);
        assert_eq!(n.version, 0);
        assert!(n.config.is_none());
    }

    #[test]
    fn classic_40_byte_frame_has_no_config() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1i32.to_be_bytes()); // FOLLOWING
        buf.extend_from_slice(&2i64.to_be_bytes());
        buf.extend_from_slice(&0x200i64.to_be_bytes());
        buf.extend_from_slice(&3i64.to_be_bytes());
        buf.extend_from_slice(&1i64.to_be_bytes()); // peerEpoch
        assert_eq!(buf.len(), 40);

        let n = decode(2, &buf).unwrap().unwrap();
        assert_eq!(n.peer_epoch, 1);
        assert_eq!(n.version, 0);
        assert!(n.config.is_none());
    }

    #[test]
    fn short_frame_is_dropped_not_errored() {
        let buf = vec![0u8; 10];
        assert!(decode(1, &buf).unwrap().is_none());
    }

    #[test]
    fn oversized_config_len_is_malformed() {
        let vote = Vote::new(1, 1, 1, 1, ServerState::Looking);
        let mut frame = encode(&vote, "x");
        // Corrupt the configLen field to claim far more bytes than exist.
        let bad_len = (frame.len() as i32 + 1000).to_be_bytes();
        frame[40..44].copy_from_slice(&bad_len);
        assert!(matches!(decode(1, &frame), Err(FleError::MalformedFrame { .. })));
    }

    #[test]
    fn unknown_state_is_dropped() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&99i32.to_be_bytes());
        buf.extend_from_slice(&1i64.to_be_bytes());
        buf.extend_from_slice(&1i64.to_be_bytes());
        buf.extend_from_slice(&1i64.to_be_bytes());
        assert!(decode(1, &buf).unwrap().is_none());
    }
}
