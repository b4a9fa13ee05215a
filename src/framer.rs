// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

//! Byte stream to message reassembly.
//!
//! Bytes are pushed one at a time. Both framing rules end a message on CR LF
//! with at least three bytes buffered:
//!
//! - [`FrameRule::Line`]: the CR LF is stripped and the line emitted with the
//!   high bit of every byte cleared.
//! - [`FrameRule::Checksummed`]: the byte before CR LF must be a valid checksum
//!   over the rest; otherwise the LF is kept as payload and reading continues,
//!   since binary replies can contain CR LF.
//!
//! A buffer that hits the size bound is emitted straight away, and a buffer
//! that sits unfinished for longer than the stale timeout is emitted as an
//! incomplete message.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::codec::verify_frame;
use crate::constants::{CR, LF, MAX_MESSAGE_SIZE};

/// Which boundary rule applies to the next message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRule {
    Line,
    Checksummed,
}

/// How a message ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEnd {
    /// CR LF seen (and checksum valid where required)
    Terminated,
    /// Buffer bound reached
    Overflow,
    /// Nothing arrived for too long
    Stale,
}

/// One reassembled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub end: FrameEnd,
}

impl Frame {
    /// Stale messages are the only incomplete ones.
    pub fn is_complete(&self) -> bool {
        self.end != FrameEnd::Stale
    }
}

#[derive(Debug)]
pub struct Framer {
    buffer: Vec<u8>,
    started: Option<Instant>,
    stale_after: Duration,
}

impl Framer {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_MESSAGE_SIZE),
            started: None,
            stale_after,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop anything buffered.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.started = None;
    }

    fn take(&mut self, len: usize, end: FrameEnd) -> Frame {
        let mut bytes = std::mem::take(&mut self.buffer);
        bytes.truncate(len);
        self.started = None;
        Frame { bytes, end }
    }

    /// Feed one byte. Returns a message when this byte finishes one.
    pub fn push(&mut self, byte: u8, rule: FrameRule, now: Instant) -> Option<Frame> {
        if self.buffer.len() >= MAX_MESSAGE_SIZE {
            warn!("Receive buffer full, emitting {} bytes", self.buffer.len());
            let frame = self.take(MAX_MESSAGE_SIZE, FrameEnd::Overflow);
            self.started = Some(now);
            self.buffer.push(byte);
            return Some(frame);
        }

        if self.buffer.is_empty() {
            self.started = Some(now);
        }

        let at_boundary =
            byte == LF && self.buffer.len() > 2 && self.buffer.last() == Some(&CR);

        if at_boundary {
            // Without the CR
            let body_len = self.buffer.len() - 1;
            match rule {
                FrameRule::Line => {
                    let mut frame = self.take(body_len, FrameEnd::Terminated);
                    // Screen text is 7-bit
                    for b in &mut frame.bytes {
                        *b &= 0x7F;
                    }
                    return Some(frame);
                }
                FrameRule::Checksummed => {
                    if verify_frame(&self.buffer[..body_len]).is_some() {
                        debug!("Checksum valid");
                        return Some(self.take(body_len - 1, FrameEnd::Terminated));
                    }
                }
            }
        }

        self.buffer.push(byte);
        None
    }

    /// Force out a message that has been sitting unfinished for too long.
    pub fn poll_stale(&mut self, now: Instant) -> Option<Frame> {
        let started = self.started?;
        if self.buffer.is_empty() || now.saturating_duration_since(started) <= self.stale_after {
            return None;
        }
        debug!("Message failed to complete within {:?}", self.stale_after);
        let len = self.buffer.len();
        Some(self.take(len, FrameEnd::Stale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_frame;

    const STALE: Duration = Duration::from_millis(50);

    fn feed_all(framer: &mut Framer, bytes: &[u8], rule: FrameRule, now: Instant) -> Vec<Frame> {
        bytes.iter().filter_map(|&b| framer.push(b, rule, now)).collect()
    }

    #[test]
    fn test_line_messages() {
        let mut framer = Framer::new(STALE);
        let now = Instant::now();
        let frames = feed_all(&mut framer, b"\"N0000\r\n\"Z00121\r\n", FrameRule::Line, now);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].bytes, b"\"N0000");
        assert_eq!(frames[1].bytes, b"\"Z00121");
        assert!(frames.iter().all(Frame::is_complete));
        assert!(framer.is_empty());
    }

    #[test]
    fn test_line_is_masked_to_seven_bits() {
        let mut framer = Framer::new(STALE);
        let now = Instant::now();
        let frames = feed_all(&mut framer, b"\"Y\xB0\xB0\xB1\r\n", FrameRule::Line, now);
        assert_eq!(frames[0].bytes, b"\"Y001");
    }

    #[test]
    fn test_short_crlf_is_not_a_boundary() {
        let mut framer = Framer::new(STALE);
        let now = Instant::now();
        // Only two bytes buffered when LF arrives
        assert!(feed_all(&mut framer, b"A\r\n", FrameRule::Line, now).is_empty());
        let frames = feed_all(&mut framer, b"\r\n", FrameRule::Line, now);
        assert_eq!(frames[0].bytes, b"A\r\n");
    }

    #[test]
    fn test_checksummed_reply() {
        let mut framer = Framer::new(STALE);
        let now = Instant::now();
        let mut wire = encode_frame(b"OK");
        wire.extend_from_slice(b"\r\n");
        let frames = feed_all(&mut framer, &wire, FrameRule::Checksummed, now);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].bytes, b"OK");
    }

    #[test]
    fn test_embedded_crlf_in_binary_payload() {
        let mut framer = Framer::new(STALE);
        let now = Instant::now();
        let payload = [0x01, 0x00, CR, LF, 0x04, 0x00];
        let mut wire = encode_frame(&payload);
        wire.extend_from_slice(b"\r\n");
        let frames = feed_all(&mut framer, &wire, FrameRule::Checksummed, now);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].bytes, payload);
    }

    #[test]
    fn test_stale_partial_message() {
        let mut framer = Framer::new(STALE);
        let t0 = Instant::now();
        assert!(feed_all(&mut framer, b"\"Do you", FrameRule::Line, t0).is_empty());
        assert!(framer.poll_stale(t0 + STALE).is_none());

        let frame = framer.poll_stale(t0 + STALE + Duration::from_millis(1)).unwrap();
        assert_eq!(frame.bytes, b"\"Do you");
        assert_eq!(frame.end, FrameEnd::Stale);
        assert!(!frame.is_complete());
        assert!(framer.poll_stale(t0 + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_overflow_emits_full_buffer() {
        let mut framer = Framer::new(STALE);
        let now = Instant::now();
        let junk = [b'x'; MAX_MESSAGE_SIZE];
        assert!(feed_all(&mut framer, &junk, FrameRule::Line, now).is_empty());

        let frame = framer.push(b'y', FrameRule::Line, now).unwrap();
        assert_eq!(frame.bytes.len(), MAX_MESSAGE_SIZE);
        assert_eq!(frame.end, FrameEnd::Overflow);
        assert!(frame.is_complete());
        // The byte that overflowed starts the next message
        let next = feed_all(&mut framer, b"es\r\n", FrameRule::Line, now);
        assert_eq!(next[0].bytes, b"yes");
    }

    #[test]
    fn test_chunking_does_not_change_framing() {
        let wire = b"\"A0001\r\n\"  The Cooper's\r\n\"Y0000\r\n";
        let t0 = Instant::now();

        let mut whole = Framer::new(STALE);
        let all_at_once = feed_all(&mut whole, wire, FrameRule::Line, t0);

        let mut split = Framer::new(STALE);
        let mut one_by_one = Vec::new();
        for (i, &b) in wire.iter().enumerate() {
            let now = t0 + Duration::from_millis(i as u64);
            if let Some(frame) = split.poll_stale(now) {
                one_by_one.push(frame);
            }
            one_by_one.extend(split.push(b, FrameRule::Line, now));
        }
        assert_eq!(all_at_once, one_by_one);
    }
}
