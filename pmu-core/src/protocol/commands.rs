//! Command dispatcher (spec.md §4.G): the table mapping an inbound frame's
//! command id to a handler, plus the `Dispatcher` that owns the byte-level
//! transport state (parser, RX ring, TX staging) the handlers ride on.

use heapless::{Deque, Vec};

use super::frame::{encode_frame, send_staged, FrameParser};
use crate::channel::store::ChannelStore;
use crate::engine::Engine;
use crate::flash;
use crate::hal::HardwareAdapter;
use crate::limits::{
    MAX_CHANNELS, MAX_CONFIG_BLOB_LEN, MAX_FRAME_PAYLOAD, MAX_OUTPUT_BINDINGS,
    MAX_POWER_OUTPUTS, MAX_VIRTUAL_CHANNELS, RX_RING_CAPACITY, TX_STAGING_CAPACITY,
};
use crate::output::{self, OutputBinding, OverrideTable};

pub mod ids {
    pub const PING: u8 = 0x01;
    pub const PONG: u8 = 0x02;
    pub const RESET: u8 = 0x03;
    pub const ACK: u8 = 0x04;
    pub const NACK: u8 = 0x05;
    pub const GET_CONFIG: u8 = 0x06;
    pub const CONFIG_DATA: u8 = 0x07;
    pub const LOAD_BINARY: u8 = 0x08;
    pub const BINARY_ACK: u8 = 0x09;
    pub const SAVE_CONFIG: u8 = 0x0A;
    pub const FLASH_ACK: u8 = 0x0B;
    pub const CLEAR_CONFIG: u8 = 0x0C;
    pub const CLEAR_CONFIG_ACK: u8 = 0x0D;
    pub const START_STREAM: u8 = 0x0E;
    pub const STOP_STREAM: u8 = 0x0F;
    pub const SET_OUTPUT: u8 = 0x10;
    pub const OUTPUT_ACK: u8 = 0x11;
    pub const GET_CAPABILITIES: u8 = 0x12;
    pub const CAPABILITIES: u8 = 0x13;
    pub const TELEMETRY: u8 = 0x14;
}

const NACK_UNKNOWN_COMMAND: u8 = 0x01;

/// Owns the byte-level transport: the parser, the RX ring it's fed from,
/// and the TX staging buffer. Handlers never touch these directly — they go
/// through `Dispatcher::send`.
pub struct Dispatcher {
    parser: FrameParser,
    rx_ring: Deque<u8, RX_RING_CAPACITY>,
    tx_buf: Vec<u8, TX_STAGING_CAPACITY>,
    /// Guards `send`. spec.md §5: "a second `send_frame` call while one is
    /// in progress is treated as a nested-handler error — the codec
    /// forcibly clears the flag and restarts".
    tx_in_progress: bool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub const fn new() -> Self {
        Dispatcher {
            parser: FrameParser::new(),
            rx_ring: Deque::new(),
            tx_buf: Vec::new(),
            tx_in_progress: false,
        }
    }

    /// Pull any bytes the UART has ready into the RX ring, then feed the
    /// ring through the parser. Returns the first complete frame, if any.
    pub fn ingest<H: HardwareAdapter>(
        &mut self,
        hal: &mut H,
    ) -> Option<(u8, Vec<u8, MAX_FRAME_PAYLOAD>)> {
        while hal.uart_rx_ready() {
            let byte = hal.uart_rx_read();
            let _ = self.rx_ring.push_back(byte);
        }

        while let Some(byte) = self.rx_ring.pop_front() {
            if let Some((cmd, payload)) = self.parser.feed(byte) {
                let mut owned = Vec::new();
                let _ = owned.extend_from_slice(payload);
                return Some((cmd, owned));
            }
        }
        None
    }

    /// Encode and transmit one frame, polling RX throughout so no inbound
    /// byte is lost (spec.md §4.F).
    pub fn send<H: HardwareAdapter>(&mut self, hal: &mut H, cmd: u8, payload: &[u8]) {
        if self.tx_in_progress {
            // Nested call: better to corrupt one frame than hang forever
            // waiting on a TX that will never be serviced (spec.md §5).
            self.tx_in_progress = false;
        }
        self.tx_in_progress = true;
        if encode_frame(cmd, payload, &mut self.tx_buf).is_ok() {
            send_staged(hal, &self.tx_buf, &mut self.rx_ring);
        }
        self.tx_in_progress = false;
    }
}

/// Everything a command handler needs beyond the dispatcher itself. Bundled
/// so `handle`'s signature stays manageable as the command table grows.
pub struct System<'a> {
    pub store: &'a mut ChannelStore,
    pub engine: &'a mut Engine,
    pub bindings: &'a mut Vec<OutputBinding, MAX_OUTPUT_BINDINGS>,
    pub overrides: &'a mut OverrideTable,
    pub config_blob: &'a mut Vec<u8, MAX_CONFIG_BLOB_LEN>,
    pub stream_active: &'a mut bool,
    pub stream_period_ms: &'a mut u32,
}

/// Handle one complete inbound frame, dispatching per spec.md §4.G's table
/// and sending the response through `dispatcher`.
pub fn handle<H: HardwareAdapter>(
    cmd: u8,
    payload: &[u8],
    sys: &mut System,
    dispatcher: &mut Dispatcher,
    hal: &mut H,
) {
    match cmd {
        ids::PING => dispatcher.send(hal, ids::PONG, &[]),

        ids::RESET => {
            dispatcher.send(hal, ids::ACK, &[cmd]);
            hal.system_reset();
        }

        ids::GET_CONFIG => send_config_chunks(sys, dispatcher, hal),

        ids::LOAD_BINARY => handle_load_binary(payload, sys, dispatcher, hal),

        ids::SAVE_CONFIG => {
            let ok = flash::save(hal, sys.config_blob).is_ok();
            dispatcher.send(hal, ids::FLASH_ACK, &[ok as u8]);
        }

        ids::CLEAR_CONFIG => {
            sys.engine.clear();
            sys.store.clear_virtual();
            sys.bindings.clear();
            sys.overrides.clear_all();
            sys.config_blob.clear();
            let _ = hal.flash_erase_sector();
            dispatcher.send(hal, ids::CLEAR_CONFIG_ACK, &[1]);
        }

        ids::START_STREAM => {
            let rate_hz = if payload.len() >= 2 {
                u16::from_le_bytes([payload[0], payload[1]])
            } else {
                0
            };
            // spec.md §8 invariant 10: 0 -> 10 Hz, clamp to 100 Hz.
            let rate_hz = if rate_hz == 0 { 10 } else { rate_hz.min(100) };
            *sys.stream_period_ms = 1000 / rate_hz as u32;
            *sys.stream_active = true;
            dispatcher.send(hal, ids::ACK, &[cmd]);
        }

        ids::STOP_STREAM => {
            *sys.stream_active = false;
            dispatcher.send(hal, ids::ACK, &[cmd]);
        }

        ids::SET_OUTPUT => {
            if payload.len() >= 2 {
                let (pin, state) = (payload[0], payload[1]);
                sys.overrides.handle_set_output(pin, state);
                output::tick(sys.bindings, sys.overrides, sys.store, hal);
                dispatcher.send(hal, ids::OUTPUT_ACK, &[pin, state]);
            } else {
                dispatcher.send(hal, ids::NACK, &[cmd, NACK_UNKNOWN_COMMAND]);
            }
        }

        ids::GET_CAPABILITIES => {
            let payload = capabilities_payload();
            dispatcher.send(hal, ids::CAPABILITIES, &payload);
        }

        _ => dispatcher.send(hal, ids::NACK, &[cmd, NACK_UNKNOWN_COMMAND]),
    }
}

fn send_config_chunks<H: HardwareAdapter>(sys: &mut System, dispatcher: &mut Dispatcher, hal: &mut H) {
    use crate::limits::CONFIG_CHUNK_PAYLOAD_LEN;

    let blob = sys.config_blob.as_slice();
    let chunks = (blob.len() + CONFIG_CHUNK_PAYLOAD_LEN - 1) / CONFIG_CHUNK_PAYLOAD_LEN;
    let total = chunks.max(1) as u16;
    let mut chunk_payload: Vec<u8, MAX_FRAME_PAYLOAD> = Vec::new();

    for idx in 0..total {
        let start = idx as usize * CONFIG_CHUNK_PAYLOAD_LEN;
        let end = (start + CONFIG_CHUNK_PAYLOAD_LEN).min(blob.len());
        let chunk = blob.get(start..end).unwrap_or(&[]);

        chunk_payload.clear();
        let _ = chunk_payload.extend_from_slice(&idx.to_le_bytes());
        let _ = chunk_payload.extend_from_slice(&total.to_le_bytes());
        let _ = chunk_payload.extend_from_slice(chunk);

        dispatcher.send(hal, ids::CONFIG_DATA, &chunk_payload);
    }
}

fn handle_load_binary<H: HardwareAdapter>(
    payload: &[u8],
    sys: &mut System,
    dispatcher: &mut Dispatcher,
    hal: &mut H,
) {
    *sys.stream_active = false;

    if payload.len() < 4 {
        dispatcher.send(hal, ids::BINARY_ACK, &[0, 0, 0, 0]);
        return;
    }
    let blob = &payload[4..];

    match crate::state::install_config(
        sys.store,
        sys.engine,
        sys.bindings,
        sys.overrides,
        sys.config_blob,
        blob,
    ) {
        Ok(count) => {
            let count_bytes = count.to_le_bytes();
            dispatcher.send(hal, ids::BINARY_ACK, &[1, 0, count_bytes[0], count_bytes[1]]);
        }
        Err(_) => {
            // Prior graph is untouched: `install_config` never mutated
            // anything before the decode failed (spec.md §4.C "no partial
            // load").
            dispatcher.send(hal, ids::BINARY_ACK, &[0, 0, 0, 0]);
        }
    }
}

/// 10-byte device description (SPEC_FULL.md §2): protocol version, a
/// reserved byte, then max channels / max virtual channels / max power
/// outputs / a feature bitmask / max config blob length, all little-endian.
fn capabilities_payload() -> [u8; 10] {
    const PROTOCOL_VERSION: u8 = 1;
    const FEATURE_STREAM: u8 = 0b01;
    const FEATURE_FLASH: u8 = 0b10;

    let mut out = [0u8; 10];
    out[0] = PROTOCOL_VERSION;
    out[1] = 0; // reserved
    out[2..4].copy_from_slice(&(MAX_CHANNELS as u16).to_le_bytes());
    out[4..6].copy_from_slice(&(MAX_VIRTUAL_CHANNELS as u16).to_le_bytes());
    out[6] = MAX_POWER_OUTPUTS as u8;
    out[7] = FEATURE_STREAM | FEATURE_FLASH;
    out[8..10].copy_from_slice(&((MAX_CONFIG_BLOB_LEN as u16).to_le_bytes()));
    out
}
