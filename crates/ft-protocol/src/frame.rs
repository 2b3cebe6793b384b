//! Byte-at-a-time frame parser.
//!
//! Mirrors `_dsp_receive`'s state machine exactly: `Start → MsgType → MsgId →
//! PayloadLength → Payload`, and on the payload's last byte the completed
//! frame is handed back *in that same call* rather than queued. A caller
//! that stashes the frame for later (instead of dispatching it before
//! feeding the next byte) has reintroduced the bug this design avoids:
//! leaving a fully-received message unhandled until unrelated traffic
//! happens to arrive.

/// First byte of every frame. Chosen so a parser that loses synchronisation
/// (e.g. after a dropped byte) finds a new frame boundary on the next
/// occurrence rather than needing an escape sequence.
pub const START_BYTE: u8 = 0xf0;

/// Largest payload this parser can buffer: the full range the wire format's
/// one-byte length field can declare.
pub const MAX_PAYLOAD_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Start,
    MsgType,
    MsgId,
    PayloadLength,
    Payload,
}

/// A fully received frame, borrowed from the parser's internal buffer.
///
/// The borrow ties this value to the parser: it must be consumed (decoded,
/// dispatched, copied out) before the next call to [`FrameParser::feed`],
/// which is the point — a completed frame is handled immediately, never
/// queued behind the parser.
#[derive(Debug)]
pub struct RawFrame<'a> {
    /// `MODULE` or `SYSTEM` message-space selector.
    pub msg_type: u8,
    /// Message identifier within that space.
    pub msg_id: u8,
    /// Raw payload bytes.
    pub payload: &'a [u8],
}

/// Incremental frame parser driven one received byte at a time.
pub struct FrameParser {
    state: ParseState,
    msg_type: u8,
    msg_id: u8,
    declared_len: u8,
    buf: [u8; MAX_PAYLOAD_LEN],
    received: usize,
}

impl FrameParser {
    /// Creates a parser waiting for a `START_BYTE`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ParseState::Start,
            msg_type: 0,
            msg_id: 0,
            declared_len: 0,
            buf: [0; MAX_PAYLOAD_LEN],
            received: 0,
        }
    }

    /// Feeds one received byte. Returns `Some(frame)` exactly on the byte
    /// that completes a frame; the caller must dispatch it before the next
    /// `feed` call.
    pub fn feed(&mut self, byte: u8) -> Option<RawFrame<'_>> {
        match self.state {
            ParseState::Start => {
                if byte == START_BYTE {
                    self.state = ParseState::MsgType;
                }
            }
            ParseState::MsgType => {
                self.msg_type = byte;
                self.state = ParseState::MsgId;
            }
            ParseState::MsgId => {
                self.msg_id = byte;
                self.state = ParseState::PayloadLength;
            }
            ParseState::PayloadLength => {
                self.declared_len = byte;
                self.received = 0;
                if byte == 0 {
                    self.state = ParseState::Start;
                    return Some(RawFrame {
                        msg_type: self.msg_type,
                        msg_id: self.msg_id,
                        payload: &self.buf[..0],
                    });
                }
                // `declared_len` is a `u8` and the buffer is sized to `u8::MAX`,
                // so every declared length fits; no payload is ever too big to
                // receive in full before resynchronising.
                self.state = ParseState::Payload;
            }
            ParseState::Payload => {
                if let Some(slot) = self.buf.get_mut(self.received) {
                    *slot = byte;
                }
                self.received = self.received.saturating_add(1);
                if self.received >= self.declared_len as usize {
                    self.state = ParseState::Start;
                    return Some(RawFrame {
                        msg_type: self.msg_type,
                        msg_id: self.msg_id,
                        payload: &self.buf[..self.declared_len as usize],
                    });
                }
            }
        }
        None
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialises a frame header + payload into `out`, returning the number of
/// bytes written. `out` must be at least `4 + payload.len()` bytes.
pub fn encode_frame(msg_type: u8, msg_id: u8, payload: &[u8], out: &mut [u8]) -> Option<usize> {
    let total = 4usize.checked_add(payload.len())?;
    if out.len() < total || payload.len() > u8::MAX as usize {
        return None;
    }
    out[0] = START_BYTE;
    out[1] = msg_type;
    out[2] = msg_id;
    #[allow(clippy::cast_possible_truncation)]
    {
        out[3] = payload.len() as u8;
    }
    out.get_mut(4..total)?.copy_from_slice(payload);
    Some(total)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut FrameParser, bytes: &[u8]) -> heapless::Vec<(u8, u8, heapless::Vec<u8, MAX_PAYLOAD_LEN>), 4> {
        let mut frames = heapless::Vec::new();
        for &b in bytes {
            if let Some(frame) = parser.feed(b) {
                let mut payload = heapless::Vec::new();
                payload.extend_from_slice(frame.payload).unwrap();
                frames.push((frame.msg_type, frame.msg_id, payload)).ok();
            }
        }
        frames
    }

    #[test]
    fn parses_single_frame() {
        let mut parser = FrameParser::new();
        let frames = feed_all(&mut parser, &[START_BYTE, 0, 1, 3, b'a', b'b', b'c']);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, 0);
        assert_eq!(frames[0].1, 1);
        assert_eq!(frames[0].2.as_slice(), b"abc");
    }

    #[test]
    fn zero_length_payload_completes_immediately() {
        let mut parser = FrameParser::new();
        let frames = feed_all(&mut parser, &[START_BYTE, 1, 0, 0]);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].2.is_empty());
    }

    #[test]
    fn resyncs_after_garbage_before_start_byte() {
        let mut parser = FrameParser::new();
        let frames = feed_all(&mut parser, &[0xde, 0xad, START_BYTE, 0, 2, 1, 7, 9]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].2.as_slice(), &[7, 9]);
    }

    #[test]
    fn back_to_back_frames_both_parse() {
        let mut parser = FrameParser::new();
        let frames = feed_all(
            &mut parser,
            &[START_BYTE, 0, 0, 1, 1, START_BYTE, 1, 2, 1, 2],
        );
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].2.as_slice(), &[1]);
        assert_eq!(frames[1].2.as_slice(), &[2]);
    }

    #[test]
    fn encode_then_parse_matches() {
        let mut out = [0u8; 16];
        let n = encode_frame(1, 2, &[9, 8, 7], &mut out).unwrap();
        let mut parser = FrameParser::new();
        let frames = feed_all(&mut parser, &out[..n]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, 1);
        assert_eq!(frames[0].1, 2);
        assert_eq!(frames[0].2.as_slice(), &[9, 8, 7]);
    }

    #[test]
    fn max_length_payload_is_received_in_full() {
        let payload = [0xabu8; MAX_PAYLOAD_LEN];
        let mut bytes = heapless::Vec::<u8, { 4 + MAX_PAYLOAD_LEN }>::new();
        bytes.push(START_BYTE).unwrap();
        bytes.push(0).unwrap();
        bytes.push(0).unwrap();
        bytes.push(0xff).unwrap();
        bytes.extend_from_slice(&payload).unwrap();

        let mut parser = FrameParser::new();
        let mut frame_count = 0;
        for &b in bytes.as_slice() {
            if let Some(frame) = parser.feed(b) {
                frame_count += 1;
                assert_eq!(frame.payload, &payload[..]);
            }
        }
        assert_eq!(frame_count, 1);

        // The parser resynchronises cleanly afterwards: no bytes were lost
        // or left pending.
        let frames = feed_all(&mut parser, &[START_BYTE, 3, 4, 0]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, 3);
        assert_eq!(frames[0].1, 4);
        assert!(frames[0].2.is_empty());
    }
}
