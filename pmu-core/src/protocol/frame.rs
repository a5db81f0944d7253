//! The byte-level frame codec (spec.md §4.F): sync/header/payload/CRC/EOF
//! framing with byte-stuffing, plus the TX-staging/RX-ring dance needed to
//! never lose an inbound byte while the single-threaded loop is busy
//! transmitting.

use heapless::{Deque, Vec};

use super::crc::frame_crc;
use crate::hal::HardwareAdapter;
use crate::limits::{MAX_FRAME_PAYLOAD, RX_RING_CAPACITY, TX_STAGING_CAPACITY};

const SYNC_BYTE: u8 = 0xAA;
const STUFF_BYTE: u8 = 0x55;
const EOF_BYTE: u8 = 0x55;
const SYNC_LEN: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    SearchingForSync,
    GotHeader,
    CollectingPayload,
    CollectingCrc,
    AwaitingEof,
}

/// Byte-fed frame parser (spec.md §4.F). Feed it one byte at a time;
/// `feed` returns `Some((cmd, payload))` exactly when a complete, CRC-valid
/// frame has been assembled. Any framing or CRC error silently resets to
/// `SearchingForSync` (spec.md §7: "discard partial frame; reset parser").
pub struct FrameParser {
    state: ParserState,
    sync_count: u8,
    consecutive_aa: u8,
    cmd: u8,
    len: u8,
    payload: Vec<u8, MAX_FRAME_PAYLOAD>,
    crc_bytes: [u8; 4],
    crc_idx: u8,
    header_idx: u8,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub const fn new() -> Self {
        FrameParser {
            state: ParserState::SearchingForSync,
            sync_count: 0,
            consecutive_aa: 0,
            cmd: 0,
            len: 0,
            payload: Vec::new(),
            crc_bytes: [0; 4],
            crc_idx: 0,
            header_idx: 0,
        }
    }

    fn reset_to_search(&mut self) {
        self.state = ParserState::SearchingForSync;
        self.sync_count = 0;
        self.consecutive_aa = 0;
        self.header_idx = 0;
        self.crc_idx = 0;
        self.payload.clear();
    }

    /// Feed one raw (already de-stuffed-by-nothing — stuffing is undone
    /// here) byte from the wire. Returns a completed frame's command id and
    /// a borrow of its payload.
    pub fn feed(&mut self, byte: u8) -> Option<(u8, &[u8])> {
        match self.state {
            ParserState::SearchingForSync => {
                if byte == SYNC_BYTE {
                    self.sync_count += 1;
                    if self.sync_count >= SYNC_LEN {
                        self.state = ParserState::GotHeader;
                        self.consecutive_aa = 0;
                        self.header_idx = 0;
                    }
                } else {
                    self.sync_count = 0;
                }
                None
            }
            ParserState::AwaitingEof => {
                if byte == EOF_BYTE {
                    // Leave `cmd`/`payload` intact for the caller's borrow;
                    // the next frame's GotHeader header_idx reset overwrites
                    // them before they could be read stale.
                    self.state = ParserState::SearchingForSync;
                    self.sync_count = 0;
                    Some((self.cmd, &self.payload))
                } else {
                    self.reset_to_search();
                    None
                }
            }
            _ => self.feed_body(byte),
        }
    }

    fn feed_body(&mut self, byte: u8) -> Option<(u8, &[u8])> {
        if self.consecutive_aa == 2 {
            self.consecutive_aa = 0;
            if byte != STUFF_BYTE {
                self.reset_to_search();
            }
            return None;
        }
        if byte == SYNC_BYTE {
            self.consecutive_aa += 1;
        } else {
            self.consecutive_aa = 0;
        }

        match self.state {
            ParserState::GotHeader => {
                if self.header_idx == 0 {
                    self.cmd = byte;
                    self.header_idx = 1;
                } else {
                    self.len = byte;
                    self.payload.clear();
                    self.state = if self.len == 0 {
                        ParserState::CollectingCrc
                    } else {
                        ParserState::CollectingPayload
                    };
                    self.crc_idx = 0;
                }
                None
            }
            ParserState::CollectingPayload => {
                // Payload buffer can't overflow: `len` is a u8 and
                // `MAX_FRAME_PAYLOAD` == 255.
                let _ = self.payload.push(byte);
                if self.payload.len() == self.len as usize {
                    self.state = ParserState::CollectingCrc;
                    self.crc_idx = 0;
                }
                None
            }
            ParserState::CollectingCrc => {
                self.crc_bytes[self.crc_idx as usize] = byte;
                self.crc_idx += 1;
                if self.crc_idx == 4 {
                    let expected = frame_crc(self.cmd, self.len, &self.payload);
                    let received = u32::from_le_bytes(self.crc_bytes);
                    if expected == received {
                        self.state = ParserState::AwaitingEof;
                    } else {
                        self.reset_to_search();
                    }
                }
                None
            }
            _ => None,
        }
    }

}

/// Build a complete framed message — sync, header, stuffed body, CRC, EOF —
/// into a caller-owned staging buffer (spec.md §4.F: "~600 bytes").
pub fn encode_frame(cmd: u8, payload: &[u8], out: &mut Vec<u8, TX_STAGING_CAPACITY>) -> Result<(), ()> {
    out.clear();
    for _ in 0..SYNC_LEN {
        out.push(SYNC_BYTE).map_err(|_| ())?;
    }

    let crc = frame_crc(cmd, payload.len() as u8, payload);
    let mut consecutive_aa = 0u8;
    let mut push_stuffed = |byte: u8, out: &mut Vec<u8, TX_STAGING_CAPACITY>| -> Result<(), ()> {
        out.push(byte).map_err(|_| ())?;
        if byte == SYNC_BYTE {
            consecutive_aa += 1;
            if consecutive_aa == 2 {
                out.push(STUFF_BYTE).map_err(|_| ())?;
                consecutive_aa = 0;
            }
        } else {
            consecutive_aa = 0;
        }
        Ok(())
    };

    push_stuffed(cmd, out)?;
    push_stuffed(payload.len() as u8, out)?;
    for &b in payload {
        push_stuffed(b, out)?;
    }
    for b in crc.to_le_bytes() {
        push_stuffed(b, out)?;
    }

    out.push(EOF_BYTE).map_err(|_| ())
}

/// Drive the TX-staging buffer out the UART one byte at a time, polling RX
/// into `rx_ring` throughout so no inbound byte is lost while busy-waiting
/// on TX (spec.md §4.F "TX atomicity and RX-during-TX").
pub fn send_staged<H: HardwareAdapter>(
    hal: &mut H,
    staged: &[u8],
    rx_ring: &mut Deque<u8, RX_RING_CAPACITY>,
) {
    for &byte in staged {
        while !hal.uart_tx_ready() {
            drain_rx_into(hal, rx_ring);
        }
        hal.uart_tx_write(byte);
        while !hal.uart_tx_complete() {
            drain_rx_into(hal, rx_ring);
        }
    }
}

fn drain_rx_into<H: HardwareAdapter>(hal: &mut H, rx_ring: &mut Deque<u8, RX_RING_CAPACITY>) {
    while hal.uart_rx_ready() {
        let byte = hal.uart_rx_read();
        let _ = rx_ring.push_back(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut FrameParser, bytes: &[u8]) -> Option<(u8, heapless::Vec<u8, MAX_FRAME_PAYLOAD>)> {
        let mut result = None;
        for &b in bytes {
            if let Some((cmd, payload)) = parser.feed(b) {
                let mut owned = heapless::Vec::new();
                let _ = owned.extend_from_slice(payload);
                result = Some((cmd, owned));
            }
        }
        result
    }

    #[test]
    fn round_trips_a_frame_with_payload() {
        let mut staged = Vec::new();
        encode_frame(0x07, &[1, 2, 3, 4], &mut staged).unwrap();

        let mut parser = FrameParser::new();
        let (cmd, payload) = feed_all(&mut parser, &staged).expect("frame should complete");
        assert_eq!(cmd, 0x07);
        assert_eq!(payload.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn bad_crc_resets_parser() {
        let mut staged = Vec::new();
        encode_frame(0x07, &[1, 2, 3], &mut staged).unwrap();
        // Payload contains no 0xAA, so no stuff byte precedes it: offset 5
        // (after the 3-byte sync, cmd, len) is the first payload byte.
        staged[5] ^= 0xFF;

        let mut parser = FrameParser::new();
        assert!(feed_all(&mut parser, &staged).is_none());
    }

    #[test]
    fn stuffing_round_trips_payload_with_double_sync_bytes() {
        let payload = [0xAA, 0xAA, 0x00, 0xAA, 0xAA, 0xAA];
        let mut staged = Vec::new();
        encode_frame(0x09, &payload, &mut staged).unwrap();

        let mut parser = FrameParser::new();
        let (_, decoded) = feed_all(&mut parser, &staged).expect("frame should complete");
        assert_eq!(decoded.as_slice(), &payload);
    }

    #[test]
    fn idempotent_on_replayed_bytes() {
        let mut staged = Vec::new();
        encode_frame(0x01, &[], &mut staged).unwrap();

        let run = || {
            let mut parser = FrameParser::new();
            feed_all(&mut parser, &staged).map(|(cmd, _)| cmd)
        };

        assert_eq!(run(), run());
    }
}
