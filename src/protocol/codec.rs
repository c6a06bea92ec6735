//! Binary encode/decode for wire frames
//!
//! Frame layout: `[1-byte kind][u32 payload length][payload]`. All multi-byte
//! integers and floats are big-endian. Payload fields are fixed width; the
//! only variable-length field is the Join token (u16 length prefix + UTF-8),
//! which never appears in the per-tick hot path.
//!
//! Decoding is a pure function of the input buffer. Every malformed input
//! yields a [`DecodeError`]; the codec never panics.

use bytes::{Buf, BufMut};

use super::{
    InputAction, InputCommand, Message, PlayerEntry, StateSnapshot, KIND_INPUT, KIND_JOIN,
    KIND_LEAVE, KIND_PING, KIND_PONG, KIND_SNAPSHOT,
};

/// Bytes preceding the payload: kind tag plus length field
pub const FRAME_HEADER_LEN: usize = 5;

/// Fixed payload size of one snapshot player entry
const PLAYER_ENTRY_LEN: usize = 40;

/// Action tags inside an InputCommand payload
const ACTION_MOVE: u8 = 0;
const ACTION_FIRE: u8 = 1;

/// Decode failures; the offending frame is dropped by the caller
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame truncated")]
    Truncated,

    #[error("unknown message kind {0}")]
    UnknownKind(u8),

    #[error("declared payload length {declared} does not match available {available}")]
    LengthMismatch { declared: usize, available: usize },

    #[error("{remaining} trailing bytes after payload")]
    TrailingBytes { remaining: usize },

    #[error("unknown input action {0}")]
    UnknownAction(u8),

    #[error("join token is not valid UTF-8")]
    InvalidToken(#[from] std::string::FromUtf8Error),
}

/// Serialize a message into one wire frame
pub fn encode(message: &Message) -> Vec<u8> {
    let payload = encode_payload(message);
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.put_u8(message.kind());
    frame.put_u32(payload.len() as u32);
    frame.extend_from_slice(&payload);
    frame
}

fn encode_payload(message: &Message) -> Vec<u8> {
    let mut buf = Vec::new();
    match message {
        Message::Join { player_id, token } => {
            buf.put_u32(*player_id);
            buf.put_u16(token.len() as u16);
            buf.extend_from_slice(token.as_bytes());
        }
        Message::Leave { player_id } => {
            buf.put_u32(*player_id);
        }
        Message::Input(input) => {
            buf.put_u32(input.player_id);
            buf.put_u32(input.sequence);
            match input.action {
                InputAction::Move {
                    throttle,
                    steer,
                    turret,
                } => {
                    buf.put_u8(ACTION_MOVE);
                    buf.put_f32(throttle);
                    buf.put_f32(steer);
                    buf.put_f32(turret);
                }
                InputAction::Fire { turret } => {
                    buf.put_u8(ACTION_FIRE);
                    buf.put_f32(turret);
                }
            }
        }
        Message::Snapshot(snapshot) => {
            buf.put_u64(snapshot.tick);
            buf.put_u16(snapshot.players.len() as u16);
            for entry in &snapshot.players {
                buf.put_u32(entry.id);
                buf.put_f32(entry.x);
                buf.put_f32(entry.y);
                buf.put_f32(entry.vel_x);
                buf.put_f32(entry.vel_y);
                buf.put_f32(entry.orientation);
                buf.put_f32(entry.turret);
                buf.put_f32(entry.health);
                buf.put_i32(entry.score);
                buf.put_u32(entry.last_sequence);
            }
        }
        Message::Ping { nonce } => {
            buf.put_u64(*nonce);
        }
        Message::Pong { nonce } => {
            buf.put_u64(*nonce);
        }
    }
    buf
}

/// Parse one wire frame into a message
///
/// The buffer must contain exactly one frame: the declared payload length has
/// to match the bytes that follow the header.
pub fn decode(buf: &[u8]) -> Result<Message, DecodeError> {
    if buf.len() < FRAME_HEADER_LEN {
        return Err(DecodeError::Truncated);
    }

    let kind = buf[0];
    let declared = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
    let payload = &buf[FRAME_HEADER_LEN..];
    if declared != payload.len() {
        return Err(DecodeError::LengthMismatch {
            declared,
            available: payload.len(),
        });
    }

    let mut cursor = payload;
    let message = match kind {
        KIND_JOIN => {
            let player_id = take_u32(&mut cursor)?;
            let token_len = take_u16(&mut cursor)? as usize;
            if cursor.remaining() < token_len {
                return Err(DecodeError::Truncated);
            }
            let token = String::from_utf8(cursor[..token_len].to_vec())?;
            cursor.advance(token_len);
            Message::Join { player_id, token }
        }
        KIND_LEAVE => Message::Leave {
            player_id: take_u32(&mut cursor)?,
        },
        KIND_INPUT => {
            let player_id = take_u32(&mut cursor)?;
            let sequence = take_u32(&mut cursor)?;
            let action = match take_u8(&mut cursor)? {
                ACTION_MOVE => InputAction::Move {
                    throttle: take_f32(&mut cursor)?,
                    steer: take_f32(&mut cursor)?,
                    turret: take_f32(&mut cursor)?,
                },
                ACTION_FIRE => InputAction::Fire {
                    turret: take_f32(&mut cursor)?,
                },
                other => return Err(DecodeError::UnknownAction(other)),
            };
            Message::Input(InputCommand {
                player_id,
                sequence,
                action,
            })
        }
        KIND_SNAPSHOT => {
            let tick = take_u64(&mut cursor)?;
            let count = take_u16(&mut cursor)? as usize;
            if cursor.remaining() < count * PLAYER_ENTRY_LEN {
                return Err(DecodeError::Truncated);
            }
            let mut players = Vec::with_capacity(count);
            for _ in 0..count {
                players.push(PlayerEntry {
                    id: take_u32(&mut cursor)?,
                    x: take_f32(&mut cursor)?,
                    y: take_f32(&mut cursor)?,
                    vel_x: take_f32(&mut cursor)?,
                    vel_y: take_f32(&mut cursor)?,
                    orientation: take_f32(&mut cursor)?,
                    turret: take_f32(&mut cursor)?,
                    health: take_f32(&mut cursor)?,
                    score: take_i32(&mut cursor)?,
                    last_sequence: take_u32(&mut cursor)?,
                });
            }
            Message::Snapshot(StateSnapshot { tick, players })
        }
        KIND_PING => Message::Ping {
            nonce: take_u64(&mut cursor)?,
        },
        KIND_PONG => Message::Pong {
            nonce: take_u64(&mut cursor)?,
        },
        other => return Err(DecodeError::UnknownKind(other)),
    };

    if cursor.has_remaining() {
        return Err(DecodeError::TrailingBytes {
            remaining: cursor.remaining(),
        });
    }
    Ok(message)
}

fn take_u8(buf: &mut &[u8]) -> Result<u8, DecodeError> {
    if buf.remaining() < 1 {
        return Err(DecodeError::Truncated);
    }
    Ok(buf.get_u8())
}

fn take_u16(buf: &mut &[u8]) -> Result<u16, DecodeError> {
    if buf.remaining() < 2 {
        return Err(DecodeError::Truncated);
    }
    Ok(buf.get_u16())
}

fn take_u32(buf: &mut &[u8]) -> Result<u32, DecodeError> {
    if buf.remaining() < 4 {
        return Err(DecodeError::Truncated);
    }
    Ok(buf.get_u32())
}

fn take_i32(buf: &mut &[u8]) -> Result<i32, DecodeError> {
    if buf.remaining() < 4 {
        return Err(DecodeError::Truncated);
    }
    Ok(buf.get_i32())
}

fn take_u64(buf: &mut &[u8]) -> Result<u64, DecodeError> {
    if buf.remaining() < 8 {
        return Err(DecodeError::Truncated);
    }
    Ok(buf.get_u64())
}

fn take_f32(buf: &mut &[u8]) -> Result<f32, DecodeError> {
    if buf.remaining() < 4 {
        return Err(DecodeError::Truncated);
    }
    Ok(buf.get_f32())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_messages() -> Vec<Message> {
        vec![
            Message::Join {
                player_id: 7,
                token: "session-token-abc123".to_string(),
            },
            Message::Join {
                player_id: 1,
                token: String::new(),
            },
            Message::Leave { player_id: 7 },
            Message::Input(InputCommand {
                player_id: 7,
                sequence: 42,
                action: InputAction::Move {
                    throttle: 1.0,
                    steer: -0.5,
                    turret: 1.25,
                },
            }),
            Message::Input(InputCommand {
                player_id: 9,
                sequence: u32::MAX,
                action: InputAction::Fire { turret: 3.0 },
            }),
            Message::Snapshot(StateSnapshot {
                tick: 123_456,
                players: vec![
                    PlayerEntry {
                        id: 1,
                        x: 10.0,
                        y: -20.5,
                        vel_x: 1.5,
                        vel_y: 0.0,
                        orientation: 0.25,
                        turret: 1.0,
                        health: 100.0,
                        score: -3,
                        last_sequence: 17,
                    },
                    PlayerEntry {
                        id: 2,
                        x: 0.0,
                        y: 0.0,
                        vel_x: 0.0,
                        vel_y: 0.0,
                        orientation: 0.0,
                        turret: 0.0,
                        health: 35.5,
                        score: 12,
                        last_sequence: 0,
                    },
                ],
            }),
            Message::Snapshot(StateSnapshot {
                tick: 0,
                players: vec![],
            }),
            Message::Ping { nonce: 0xDEAD_BEEF },
            Message::Pong { nonce: u64::MAX },
        ]
    }

    #[test]
    fn round_trip_all_message_kinds() {
        for message in sample_messages() {
            let frame = encode(&message);
            let decoded = decode(&frame).expect("valid frame must decode");
            assert_eq!(message, decoded);
        }
    }

    #[test]
    fn frame_header_matches_layout() {
        let frame = encode(&Message::Ping { nonce: 1 });
        assert_eq!(frame[0], KIND_PING);
        let declared = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]) as usize;
        assert_eq!(declared, frame.len() - FRAME_HEADER_LEN);
        assert_eq!(declared, 8);
    }

    #[test]
    fn empty_buffer_is_truncated() {
        assert!(matches!(decode(&[]), Err(DecodeError::Truncated)));
        assert!(matches!(decode(&[KIND_PING]), Err(DecodeError::Truncated)));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut frame = encode(&Message::Ping { nonce: 1 });
        frame[0] = 99;
        assert!(matches!(decode(&frame), Err(DecodeError::UnknownKind(99))));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let mut frame = encode(&Message::Leave { player_id: 3 });
        // Declare one byte more than the payload carries
        frame[4] = frame[4].wrapping_add(1);
        assert!(matches!(
            decode(&frame),
            Err(DecodeError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let frame = encode(&Message::Input(InputCommand {
            player_id: 1,
            sequence: 1,
            action: InputAction::Fire { turret: 0.0 },
        }));
        // Chop the payload but fix up the declared length so the frame-level
        // check passes and the field parser has to notice
        let mut short = frame[..frame.len() - 2].to_vec();
        let declared = (short.len() - FRAME_HEADER_LEN) as u32;
        short[1..5].copy_from_slice(&declared.to_be_bytes());
        assert!(matches!(decode(&short), Err(DecodeError::Truncated)));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut frame = encode(&Message::Leave { player_id: 3 });
        frame.push(0xFF);
        let declared = (frame.len() - FRAME_HEADER_LEN) as u32;
        frame[1..5].copy_from_slice(&declared.to_be_bytes());
        assert!(matches!(
            decode(&frame),
            Err(DecodeError::TrailingBytes { remaining: 1 })
        ));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let mut frame = encode(&Message::Input(InputCommand {
            player_id: 1,
            sequence: 1,
            action: InputAction::Fire { turret: 0.0 },
        }));
        // The action tag sits right after player id and sequence
        frame[FRAME_HEADER_LEN + 8] = 7;
        assert!(matches!(decode(&frame), Err(DecodeError::UnknownAction(7))));
    }

    #[test]
    fn invalid_utf8_token_is_rejected() {
        let mut payload = Vec::new();
        payload.put_u32(1);
        payload.put_u16(2);
        payload.extend_from_slice(&[0xFF, 0xFE]);
        let mut frame = Vec::new();
        frame.put_u8(KIND_JOIN);
        frame.put_u32(payload.len() as u32);
        frame.extend_from_slice(&payload);
        assert!(matches!(decode(&frame), Err(DecodeError::InvalidToken(_))));
    }

    #[test]
    fn snapshot_with_short_entry_table_is_rejected() {
        let mut payload = Vec::new();
        payload.put_u64(5);
        payload.put_u16(3); // claims three entries, carries none
        let mut frame = Vec::new();
        frame.put_u8(KIND_SNAPSHOT);
        frame.put_u32(payload.len() as u32);
        frame.extend_from_slice(&payload);
        assert!(matches!(decode(&frame), Err(DecodeError::Truncated)));
    }

    #[test]
    fn garbage_never_panics() {
        let noisy: Vec<Vec<u8>> = vec![
            vec![0; 5],
            vec![255; 64],
            vec![2, 0, 0, 0, 9, 1, 2, 3],
            (0u8..=255).collect(),
        ];
        for buf in noisy {
            let _ = decode(&buf);
        }
    }

    #[test]
    fn identical_snapshots_encode_identically() {
        let snapshot = StateSnapshot {
            tick: 99,
            players: vec![PlayerEntry {
                id: 4,
                x: 1.0,
                y: 2.0,
                vel_x: 0.5,
                vel_y: -0.5,
                orientation: 0.1,
                turret: 0.2,
                health: 80.0,
                score: 5,
                last_sequence: 6,
            }],
        };
        let a = encode(&Message::Snapshot(snapshot.clone()));
        let b = encode(&Message::Snapshot(snapshot));
        assert_eq!(a, b);
    }
}
