//! End-to-end seed scenarios (spec.md §8 "End-to-end scenarios"), driven
//! entirely through `EngineState` and a `HardwareAdapter` double, the same
//! way a board integrator would exercise the firmware off-target.

use std::collections::VecDeque;

use pmu_core::hal::HardwareAdapter;
use pmu_core::protocol::commands::ids;
use pmu_core::protocol::crc::frame_crc;
use pmu_core::protocol::frame::FrameParser;
use pmu_core::state::EngineState;

const SYNC_BYTE: u8 = 0xAA;
const STUFF_BYTE: u8 = 0x55;
const EOF_BYTE: u8 = 0x55;

/// A plain byte-stuffed frame encoder mirroring `protocol::frame::encode_frame`,
/// built against `std::vec::Vec` so scenario tests don't need a dev-dependency
/// on `heapless` just to stage a handful of test frames.
fn encode_test_frame(cmd: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![SYNC_BYTE; 3];
    let crc = frame_crc(cmd, payload.len() as u8, payload);

    let mut consecutive_aa = 0u8;
    let mut push = |byte: u8, out: &mut Vec<u8>| {
        out.push(byte);
        if byte == SYNC_BYTE {
            consecutive_aa += 1;
            if consecutive_aa == 2 {
                out.push(STUFF_BYTE);
                consecutive_aa = 0;
            }
        } else {
            consecutive_aa = 0;
        }
    };

    push(cmd, &mut out);
    push(payload.len() as u8, &mut out);
    for &b in payload {
        push(b, &mut out);
    }
    for b in crc.to_le_bytes() {
        push(b, &mut out);
    }
    out.push(EOF_BYTE);
    out
}

/// Parse every complete frame out of a byte stream, keeping only the last
/// one — tests only ever care about the most recent response.
fn last_frame(bytes: &[u8]) -> Option<(u8, Vec<u8>)> {
    let mut parser = FrameParser::new();
    let mut last = None;
    for &b in bytes {
        if let Some((cmd, payload)) = parser.feed(b) {
            last = Some((cmd, payload.to_vec()));
        }
    }
    last
}

struct MockHardware {
    tx: Vec<u8>,
    rx: VecDeque<u8>,
    digital: [bool; 8],
    analog: [u16; 20],
    pins: [Option<bool>; 24],
    flash_sector: Vec<u8>,
}

impl MockHardware {
    fn new() -> Self {
        MockHardware {
            tx: Vec::new(),
            rx: VecDeque::new(),
            digital: [false; 8],
            analog: [0; 20],
            pins: [None; 24],
            flash_sector: vec![0xFFu8; 8200],
        }
    }

    fn push_frame(&mut self, cmd: u8, payload: &[u8]) {
        self.rx.extend(encode_test_frame(cmd, payload));
    }
}

impl HardwareAdapter for MockHardware {
    fn now_ms(&self) -> u32 {
        0
    }
    fn uart_tx_ready(&mut self) -> bool {
        true
    }
    fn uart_tx_write(&mut self, byte: u8) {
        self.tx.push(byte);
    }
    fn uart_tx_complete(&mut self) -> bool {
        true
    }
    fn uart_rx_ready(&mut self) -> bool {
        !self.rx.is_empty()
    }
    fn uart_rx_read(&mut self) -> u8 {
        self.rx.pop_front().unwrap_or(0)
    }
    fn digital_in(&mut self, index: u8) -> bool {
        self.digital[index as usize]
    }
    fn analog_in(&mut self, index: u8) -> u16 {
        self.analog[index as usize]
    }
    fn output_set(&mut self, index: u8, state: bool) {
        self.pins[index as usize] = Some(state);
    }
    fn output_pwm(&mut self, _index: u8, _permille: u16) {}
    fn flash_erase_sector(&mut self) -> bool {
        self.flash_sector.iter_mut().for_each(|b| *b = 0xFF);
        true
    }
    fn flash_write_word(&mut self, addr: u32, word: u32) -> bool {
        let addr = addr as usize;
        self.flash_sector[addr..addr + 4].copy_from_slice(&word.to_le_bytes());
        true
    }
    fn flash_read(&mut self, addr: u32, out: &mut [u8]) {
        let addr = addr as usize;
        out.copy_from_slice(&self.flash_sector[addr..addr + out.len()]);
    }
    fn watchdog_feed(&mut self) {}
    fn system_reset(&mut self) -> ! {
        panic!("mock reset")
    }
}

/// Minimal builder for the TLV config wire format documented on
/// `pmu_core::config` — enough to assemble the handful of records the seed
/// scenarios need.
struct ConfigBuilder {
    records: Vec<u8>,
    count: u16,
}

impl ConfigBuilder {
    fn new() -> Self {
        ConfigBuilder { records: Vec::new(), count: 0 }
    }

    fn record(&mut self, tag: u8, json_id: u16, payload: &[u8]) -> &mut Self {
        self.records.push(tag);
        self.records.extend(json_id.to_le_bytes());
        self.records.push(payload.len() as u8);
        self.records.extend_from_slice(payload);
        self.count += 1;
        self
    }

    fn logic(
        &mut self,
        json_id: u16,
        op: u8,
        input_a: u16,
        input_b: u16,
        time_on_ms: u32,
        time_off_ms: u32,
    ) -> &mut Self {
        let mut p = Vec::new();
        p.push(op);
        p.extend(input_a.to_le_bytes());
        p.extend(input_b.to_le_bytes());
        p.extend(0i32.to_le_bytes()); // threshold
        p.extend(0i32.to_le_bytes()); // lower
        p.extend(0i32.to_le_bytes()); // upper
        p.extend(time_on_ms.to_le_bytes());
        p.extend(time_off_ms.to_le_bytes());
        p.push(0); // flags
        p.extend(0u16.to_le_bytes()); // set_ref
        p.extend(0u16.to_le_bytes()); // reset_ref
        p.extend(0u16.to_le_bytes()); // toggle_ref
        p.extend(0u16.to_le_bytes()); // pulse_count
        self.record(1, json_id, &p)
    }

    fn timer(&mut self, json_id: u16, start_ref: u16, limit_ms: u32) -> &mut Self {
        let mut p = Vec::new();
        p.extend(0u16.to_le_bytes()); // elapsed json id (anonymous)
        p.extend(start_ref.to_le_bytes());
        p.extend(0u16.to_le_bytes()); // stop_ref
        p.push(0b0001); // start_on_rising = true, stop_on_rising = false, CountUp
        p.extend(limit_ms.to_le_bytes());
        self.record(3, json_id, &p)
    }

    fn binding(&mut self, pin: u8, source: u16) -> &mut Self {
        let mut p = Vec::new();
        p.push(1); // pin_count
        p.push(pin);
        p.extend(source.to_le_bytes());
        p.push(0); // flags: pwm disabled
        p.extend(0u16.to_le_bytes()); // duty_fixed_permille
        p.extend(0u16.to_le_bytes()); // duty_source
        p.extend(0u16.to_le_bytes()); // pwm_freq_hz
        p.extend(0u16.to_le_bytes()); // current_limit_ma
        p.extend(0u16.to_le_bytes()); // inrush_ma
        p.extend(0u16.to_le_bytes()); // inrush_time_ms
        p.push(0); // retry_count
        p.extend(0u16.to_le_bytes()); // soft_start_ms
        self.record(6, 0, &p)
    }

    fn build(&self) -> Vec<u8> {
        let mut blob = Vec::new();
        blob.push(1); // version
        blob.push(0); // reserved
        blob.extend(self.count.to_le_bytes());
        blob.extend_from_slice(&self.records);
        blob
    }
}

fn load_binary(state: &mut EngineState, hal: &mut MockHardware, blob: &[u8]) -> (u8, Vec<u8>) {
    let mut payload = vec![0u8, 0, 0, 0];
    payload.extend_from_slice(blob);
    hal.push_frame(ids::LOAD_BINARY, &payload);
    state.poll_protocol(hal);
    last_frame(&hal.tx).expect("a response frame")
}

const DIGITAL_IN_0: u16 = 50; // ChannelId::DIGITAL_IN_BASE

/// op codes from `engine::defs::LogicOp`, by declaration order.
const LOGIC_IS_TRUE: u8 = 0;
const LOGIC_FLASH: u8 = 20;

#[test]
fn s1_ping_gets_pong() {
    let mut state = EngineState::new();
    let mut hal = MockHardware::new();

    hal.push_frame(ids::PING, &[]);
    state.poll_protocol(&mut hal);

    let (cmd, payload) = last_frame(&hal.tx).expect("a response frame");
    assert_eq!(cmd, ids::PONG);
    assert!(payload.is_empty());
}

#[test]
fn s2_toggle_via_digital_input() {
    let mut state = EngineState::new();
    let mut hal = MockHardware::new();

    let blob = ConfigBuilder::new()
        .logic(1000, LOGIC_IS_TRUE, DIGITAL_IN_0, 0, 0, 0)
        .binding(1, 1000)
        .build();
    let (cmd, _) = load_binary(&mut state, &mut hal, &blob);
    assert_eq!(cmd, ids::BINARY_ACK);

    hal.digital[0] = true;
    state.tick(&mut hal, 0, 0);
    assert_eq!(hal.pins[1], Some(true));

    hal.digital[0] = false;
    state.tick(&mut hal, 10, 0);
    assert_eq!(hal.pins[1], Some(false));
}

#[test]
fn s3_flash_node_blinks_within_expected_edge_count() {
    let mut state = EngineState::new();
    let mut hal = MockHardware::new();

    let blob = ConfigBuilder::new()
        .logic(1000, LOGIC_FLASH, DIGITAL_IN_0, 0, 100, 100)
        .binding(1, 1000)
        .build();
    load_binary(&mut state, &mut hal, &blob);

    hal.digital[0] = true;
    let mut rising_edges = 0;
    let mut prev = false;
    for now_ms in (0..=1000).step_by(10) {
        state.tick(&mut hal, now_ms, 0);
        let on = hal.pins[1] == Some(true);
        if on && !prev {
            rising_edges += 1;
        }
        prev = on;
    }

    assert!((4..=6).contains(&rising_edges), "got {rising_edges} rising edges");
}

#[test]
fn s4_timer_counts_up_and_saturates() {
    let mut state = EngineState::new();
    let mut hal = MockHardware::new();

    let blob = ConfigBuilder::new().timer(1000, DIGITAL_IN_0, 2000).build();
    load_binary(&mut state, &mut hal, &blob);

    // First two virtual ids allocated: running=200, elapsed=201.
    use pmu_core::channel::ChannelId;
    let running = ChannelId(200);
    let elapsed = ChannelId(201);

    assert_eq!(state.store.get(running).unwrap().value, 0);

    hal.digital[0] = true;
    state.tick(&mut hal, 0, 0);
    assert_eq!(state.store.get(running).unwrap().value, 1000);

    state.tick(&mut hal, 1500, 0);
    assert_eq!(state.store.get(elapsed).unwrap().value, 1500);

    state.tick(&mut hal, 5000, 0);
    assert_eq!(state.store.get(elapsed).unwrap().value, 2000);
}

#[test]
fn s5_load_binary_with_undecodable_blob_keeps_prior_graph() {
    let mut state = EngineState::new();
    let mut hal = MockHardware::new();

    let good = ConfigBuilder::new()
        .logic(1000, LOGIC_IS_TRUE, DIGITAL_IN_0, 0, 0, 0)
        .binding(3, 1000)
        .build();
    load_binary(&mut state, &mut hal, &good);

    hal.digital[0] = true;
    state.tick(&mut hal, 0, 0);
    assert_eq!(hal.pins[3], Some(true));

    let mut bad = vec![99u8, 0, 0, 0]; // unsupported version
    bad.extend_from_slice(&[1, 2, 3]);
    let (cmd, payload) = load_binary(&mut state, &mut hal, &bad);
    assert_eq!(cmd, ids::BINARY_ACK);
    assert_eq!(payload[0], 0); // ok = 0

    state.tick(&mut hal, 10, 0);
    assert_eq!(hal.pins[3], Some(true)); // unchanged
}

#[test]
fn s6_set_output_override_beats_engine_then_releases() {
    let mut state = EngineState::new();
    let mut hal = MockHardware::new();

    let blob = ConfigBuilder::new()
        .logic(1000, LOGIC_IS_TRUE, DIGITAL_IN_0, 0, 0, 0)
        .binding(2, 1000)
        .build();
    load_binary(&mut state, &mut hal, &blob);

    hal.digital[0] = false; // engine will command OFF
    state.tick(&mut hal, 0, 0);
    assert_eq!(hal.pins[2], Some(false));

    hal.push_frame(ids::SET_OUTPUT, &[2, 1]);
    state.poll_protocol(&mut hal);
    assert_eq!(hal.pins[2], Some(true)); // override applied immediately

    state.tick(&mut hal, 10, 0);
    assert_eq!(hal.pins[2], Some(true)); // still overridden despite engine saying OFF

    hal.push_frame(ids::SET_OUTPUT, &[2, 0]);
    state.poll_protocol(&mut hal);
    state.tick(&mut hal, 20, 0);
    assert_eq!(hal.pins[2], Some(false)); // engine control restored
}
