//! Power-output bindings and the output-driver policy (spec.md §4.E).

use heapless::Vec;

use crate::channel::store::ChannelStore;
use crate::channel::ChannelId;
use crate::hal::HardwareAdapter;
use crate::limits::{MAX_PINS_PER_BINDING, MAX_POWER_OUTPUTS};

/// One configured power-output binding. Soft-start/current-limit/inrush
/// fields are forwarded to the hardware actuator as installation
/// parameters; they are hardware-side policy and don't change this
/// module's own per-tick decision (spec.md §4.E).
#[derive(Debug, Clone)]
pub struct OutputBinding {
    pub pins: Vec<u8, MAX_PINS_PER_BINDING>,
    pub source: ChannelId,
    pub pwm_enable: bool,
    pub duty_fixed_permille: u16,
    pub duty_source: ChannelId,
    pub pwm_freq_hz: u16,
    pub current_limit_ma: u16,
    pub inrush_ma: u16,
    pub inrush_time_ms: u16,
    pub retry_count: u8,
    pub retry_forever: bool,
    pub soft_start_ms: u16,
}

/// Host-commanded output overrides (spec.md §4.A, §5: "the manual-override
/// table is written only by SET_OUTPUT/clear and read by the output
/// driver"). Indexed by physical output pin index.
#[derive(Debug, Clone)]
pub struct OverrideTable {
    slots: [Option<bool>; MAX_POWER_OUTPUTS],
}

impl Default for OverrideTable {
    fn default() -> Self {
        OverrideTable {
            slots: [None; MAX_POWER_OUTPUTS],
        }
    }
}

impl OverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_override(&mut self, pin: u8, state: bool) {
        if let Some(slot) = self.slots.get_mut(pin as usize) {
            *slot = Some(state);
        }
    }

    pub fn clear_override(&mut self, pin: u8) {
        if let Some(slot) = self.slots.get_mut(pin as usize) {
            *slot = None;
        }
    }

    pub fn clear_all(&mut self) {
        self.slots = [None; MAX_POWER_OUTPUTS];
    }

    pub fn get(&self, pin: u8) -> Option<bool> {
        self.slots.get(pin as usize).copied().flatten()
    }

    /// SET_OUTPUT's wire convention: `state == 0` clears the override and
    /// hands the pin back to the engine; any other value latches an
    /// override to that boolean (spec.md §8 scenario S6).
    pub fn handle_set_output(&mut self, pin: u8, state: u8) {
        if state == 0 {
            self.clear_override(pin);
        } else {
            self.set_override(pin, true);
        }
    }
}

/// Drive every configured binding for one tick (spec.md §4.E).
pub fn tick<H: HardwareAdapter>(
    bindings: &[OutputBinding],
    overrides: &OverrideTable,
    store: &ChannelStore,
    hal: &mut H,
) {
    for binding in bindings {
        for &pin in binding.pins.iter() {
            if let Some(state) = overrides.get(pin) {
                hal.output_set(pin, state);
                continue;
            }
            drive_pin(binding, pin, store, hal);
        }
    }
}

fn drive_pin<H: HardwareAdapter>(
    binding: &OutputBinding,
    pin: u8,
    store: &ChannelStore,
    hal: &mut H,
) {
    let Some(source) = store.get(binding.source) else {
        // No resolvable source: leave the pin in its current state
        // (spec.md §8 invariant 5).
        return;
    };
    let active = source.value > 0;

    if !active {
        hal.output_set(pin, false);
        return;
    }

    if !binding.pwm_enable {
        hal.output_set(pin, true);
        return;
    }

    let duty = if binding.duty_source.is_none() {
        binding.duty_fixed_permille
    } else {
        store
            .get(binding.duty_source)
            .map(|c| c.value.clamp(0, 1000) as u16)
            .unwrap_or(binding.duty_fixed_permille)
    };
    hal.output_pwm(pin, duty);
}
