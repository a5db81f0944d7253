//! `EngineState`: every piece of mutable state the main loop threads through
//! one tick at a time (spec.md §9, "Global mutable state" — owned by the
//! loop, not stashed in statics or behind a lock, since there's only ever
//! one cooperative context touching it).

use heapless::Vec;

use crate::channel::store::ChannelStore;
use crate::channel::{Channel, ChannelId, Direction, Format, HardwareClass};
use crate::config;
use crate::engine::Engine;
use crate::flash;
use crate::hal::HardwareAdapter;
use crate::limits::{
    MAX_ANALOG_INPUTS, MAX_CONFIG_BLOB_LEN, MAX_DIGITAL_INPUTS, MAX_OUTPUT_BINDINGS,
    MAX_POWER_OUTPUTS,
};
use crate::output::{self, OutputBinding, OverrideTable};
use crate::protocol::commands::{self, Dispatcher, System};
use crate::protocol::telemetry;

pub struct EngineState {
    pub store: ChannelStore,
    pub engine: Engine,
    pub bindings: Vec<OutputBinding, MAX_OUTPUT_BINDINGS>,
    pub overrides: OverrideTable,
    pub config_blob: Vec<u8, MAX_CONFIG_BLOB_LEN>,
    dispatcher: Dispatcher,
    stream_active: bool,
    stream_period_ms: u32,
    stream_counter: u32,
    last_emit_ms: u32,
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineState {
    pub fn new() -> Self {
        let mut store = ChannelStore::new();
        register_physical_channels(&mut store);

        EngineState {
            store,
            engine: Engine::new(),
            bindings: Vec::new(),
            overrides: OverrideTable::new(),
            config_blob: Vec::new(),
            dispatcher: Dispatcher::new(),
            stream_active: false,
            stream_period_ms: 100,
            stream_counter: 0,
            last_emit_ms: 0,
        }
    }

    /// Load the config stored in flash, if any (spec.md §4.I "verified
    /// read on boot"). A missing or corrupt sector just leaves the graph
    /// empty; it never panics the boot sequence.
    pub fn boot_load_from_flash<H: HardwareAdapter>(&mut self, hal: &mut H) {
        let mut buf = [0u8; MAX_CONFIG_BLOB_LEN];
        let installed = if let Ok(blob) = flash::load(hal, &mut buf) {
            install_config(
                &mut self.store,
                &mut self.engine,
                &mut self.bindings,
                &mut self.overrides,
                &mut self.config_blob,
                blob,
            )
            .is_ok()
        } else {
            false
        };
        if !installed {
            self.engine.clear();
        }
    }

    /// Drain one inbound frame (if any) and dispatch it (spec.md §4.F/§4.G).
    /// Call every loop iteration, independent of the control-tick cadence.
    pub fn poll_protocol<H: HardwareAdapter>(&mut self, hal: &mut H) {
        if let Some((cmd, payload)) = self.dispatcher.ingest(hal) {
            let mut sys = System {
                store: &mut self.store,
                engine: &mut self.engine,
                bindings: &mut self.bindings,
                overrides: &mut self.overrides,
                config_blob: &mut self.config_blob,
                stream_active: &mut self.stream_active,
                stream_period_ms: &mut self.stream_period_ms,
            };
            commands::handle(cmd, &payload, &mut sys, &mut self.dispatcher, hal);
        }
    }

    /// One control tick: sample inputs, run the engine, drive outputs, and
    /// emit telemetry if due (spec.md §5 "Ordering guarantees").
    pub fn tick<H: HardwareAdapter>(&mut self, hal: &mut H, now_ms: u32, uptime_s: u32) {
        sample_inputs(&mut self.store, hal);
        self.engine.tick(&mut self.store, now_ms);
        output::tick(&self.bindings, &self.overrides, &self.store, hal);

        if telemetry::due(now_ms, self.last_emit_ms, self.stream_period_ms, self.stream_active) {
            let frame = telemetry::build_frame(&self.store, self.stream_counter, now_ms, uptime_s);
            self.dispatcher.send(hal, commands::ids::TELEMETRY, &frame);
            self.stream_counter = self.stream_counter.wrapping_add(1);
            self.last_emit_ms = now_ms;
        }
    }
}

/// Atomically replace the active graph with a decoded config blob: clear
/// virtual channels, re-register them, reload the engine, rebuild output
/// bindings and overrides, and snapshot the blob. The single place this
/// happens, called from both the boot-time flash load and the `LOAD_BINARY`
/// command handler, so the two can never drift (spec.md §4.C "no partial
/// load" applies to every caller, not just one). Returns the decoded
/// channel count on success, for callers that need to report it (e.g. the
/// `BINARY_ACK` response).
pub(crate) fn install_config(
    store: &mut ChannelStore,
    engine: &mut Engine,
    bindings: &mut Vec<OutputBinding, MAX_OUTPUT_BINDINGS>,
    overrides: &mut OverrideTable,
    config_blob: &mut Vec<u8, MAX_CONFIG_BLOB_LEN>,
    blob: &[u8],
) -> Result<u16, crate::error::ConfigError> {
    let decoded = config::decode(blob)?;
    store.clear_virtual();
    for reg in decoded.registrations.iter() {
        let channel = Channel::new(reg.id, "", reg.class, Direction::Virtual, reg.format, reg.min, reg.max, 0);
        let _ = store.register(channel);
    }
    engine.load(decoded.defs);
    bindings.clear();
    for binding in decoded.bindings {
        let _ = bindings.push(binding);
    }
    overrides.clear_all();

    config_blob.clear();
    let _ = config_blob.extend_from_slice(blob);
    Ok(decoded.channel_count)
}

fn register_physical_channels(store: &mut ChannelStore) {
    for index in 0..MAX_ANALOG_INPUTS {
        let _ = store.register(Channel::new(
            ChannelId::analog_in(index as u8),
            "",
            HardwareClass::InputAnalog,
            Direction::PhysicalIn,
            Format::ScaledMilli,
            0,
            i32::MAX,
            index as u8,
        ));
    }
    for index in 0..MAX_DIGITAL_INPUTS {
        let _ = store.register(Channel::new(
            ChannelId::digital_in(index as u8),
            "",
            HardwareClass::InputSwitch,
            Direction::PhysicalIn,
            Format::Boolean,
            0,
            1000,
            index as u8,
        ));
    }
    for index in 0..MAX_POWER_OUTPUTS {
        let _ = store.register(Channel::new(
            ChannelId::power_out(index as u8),
            "",
            HardwareClass::OutputPower,
            Direction::PhysicalOut,
            Format::Boolean,
            0,
            1000,
            index as u8,
        ));
    }
}

/// Sample every physical input channel into the store (spec.md §4.A/§4.B).
/// Values never move the other direction: the engine and output driver
/// never write a `PhysicalIn` channel.
fn sample_inputs<H: HardwareAdapter>(store: &mut ChannelStore, hal: &mut H) {
    for index in 0..MAX_ANALOG_INPUTS as u8 {
        let reading = hal.analog_in(index) as i32;
        store.update_value(ChannelId::analog_in(index), reading);
    }
    for index in 0..MAX_DIGITAL_INPUTS as u8 {
        let on = hal.digital_in(index);
        store.update_value(ChannelId::digital_in(index), crate::channel::from_bool(on));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockHal;

    impl HardwareAdapter for MockHal {
        fn now_ms(&self) -> u32 {
            0
        }
        fn uart_tx_ready(&mut self) -> bool {
            true
        }
        fn uart_tx_write(&mut self, _byte: u8) {}
        fn uart_tx_complete(&mut self) -> bool {
            true
        }
        fn uart_rx_ready(&mut self) -> bool {
            false
        }
        fn uart_rx_read(&mut self) -> u8 {
            0
        }
        fn digital_in(&mut self, _index: u8) -> bool {
            false
        }
        fn analog_in(&mut self, _index: u8) -> u16 {
            0
        }
        fn output_set(&mut self, _index: u8, _state: bool) {}
        fn output_pwm(&mut self, _index: u8, _permille: u16) {}
        fn flash_erase_sector(&mut self) -> bool {
            true
        }
        fn flash_write_word(&mut self, _addr: u32, _word: u32) -> bool {
            true
        }
        fn flash_read(&mut self, _addr: u32, _out: &mut [u8]) {}
        fn watchdog_feed(&mut self) {}
        fn system_reset(&mut self) -> ! {
            panic!("mock reset")
        }
    }

    #[test]
    fn boots_with_physical_channels_registered() {
        let state = EngineState::new();
        assert!(state.store.get(ChannelId::analog_in(0)).is_some());
        assert!(state.store.get(ChannelId::digital_in(0)).is_some());
        assert!(state.store.get(ChannelId::power_out(0)).is_some());
    }

    #[test]
    fn tick_runs_without_panicking_on_an_empty_graph() {
        let mut state = EngineState::new();
        let mut hal = MockHal;
        state.tick(&mut hal, 0, 0);
    }
}
