//! Logic node semantics (spec.md §4.D).

use super::defs::{LogicDef, LogicOp};
use super::read;
use super::state::LogicState;
use crate::channel::store::ChannelStore;
use crate::channel::{as_bool, from_bool};

pub fn eval(def: &LogicDef, state: &mut LogicState, store: &ChannelStore, now_ms: u32) -> i32 {
    let a = read(store, def.input_a);
    let b = read(store, def.input_b);
    let bool_a = as_bool(a);
    let bool_b = as_bool(b);

    let result = match def.op {
        LogicOp::IsTrue => bool_a,
        LogicOp::IsFalse => !bool_a,
        LogicOp::And => bool_a && bool_b,
        LogicOp::Or => bool_a || bool_b,
        LogicOp::Xor => bool_a ^ bool_b,
        LogicOp::Not => !bool_a,
        LogicOp::Nand => !(bool_a && bool_b),
        LogicOp::Nor => !(bool_a || bool_b),
        LogicOp::Equal => a == def.threshold,
        LogicOp::NotEqual => a != def.threshold,
        LogicOp::Less => a < def.threshold,
        LogicOp::Greater => a > def.threshold,
        LogicOp::LessEq => a <= def.threshold,
        LogicOp::GreaterEq => a >= def.threshold,
        LogicOp::InRange => a >= def.lower && a <= def.upper,
        LogicOp::Changed => eval_changed(def, state, a, now_ms),
        LogicOp::Hysteresis => eval_hysteresis(def, state, a),
        LogicOp::SrLatch => eval_sr_latch(def, state, store),
        LogicOp::Toggle => eval_toggle(def, state, store),
        LogicOp::Pulse => eval_pulse(def, state, bool_a, now_ms),
        LogicOp::Flash => eval_flash(def, state, bool_a, now_ms),
        LogicOp::EdgeRising => !state.prev_edge_input && bool_a,
        LogicOp::EdgeFalling => state.prev_edge_input && !bool_a,
    };

    state.prev_edge_input = bool_a;
    from_bool(result)
}

fn eval_changed(def: &LogicDef, state: &mut LogicState, a: i32, now_ms: u32) -> bool {
    let delta = (a - state.prev_value_for_changed()).abs();
    if delta >= def.threshold {
        state.changed_hold_until_ms = Some(now_ms.wrapping_add(def.time_on_ms));
    }
    state.changed_last_value = a;

    match state.changed_hold_until_ms {
        Some(until) if now_ms < until => true,
        _ => {
            state.changed_hold_until_ms = None;
            false
        }
    }
}

fn eval_hysteresis(def: &LogicDef, state: &mut LogicState, a: i32) -> bool {
    let (set_level, clear_level) = if def.polarity_inverted {
        (def.lower, def.upper)
    } else {
        (def.upper, def.lower)
    };

    if !def.polarity_inverted {
        if a >= set_level {
            state.latch = true;
        } else if a <= clear_level {
            state.latch = false;
        }
    } else {
        // Inverted: latches true when input falls to/below `lower`, clears
        // when it rises to/above `upper`.
        if a <= set_level {
            state.latch = true;
        } else if a >= clear_level {
            state.latch = false;
        }
    }
    state.latch
}

fn eval_sr_latch(def: &LogicDef, state: &mut LogicState, store: &ChannelStore) -> bool {
    let set_now = as_bool(read(store, def.set_ref));
    let reset_now = as_bool(read(store, def.reset_ref));
    let set_rising = set_now && !state.prev_set;
    let reset_rising = reset_now && !state.prev_reset;

    if set_rising {
        state.latch = true;
    } else if reset_rising {
        state.latch = false;
    }

    state.prev_set = set_now;
    state.prev_reset = reset_now;
    state.latch
}

fn eval_toggle(def: &LogicDef, state: &mut LogicState, store: &ChannelStore) -> bool {
    let set_now = as_bool(read(store, def.set_ref));
    let reset_now = as_bool(read(store, def.reset_ref));
    let toggle_now = as_bool(read(store, def.toggle_ref));
    let toggle_edge = if def.trigger_on_rising {
        toggle_now && !state.prev_edge_input
    } else {
        !toggle_now && state.prev_edge_input
    };

    if set_now {
        state.latch = true;
    } else if reset_now {
        state.latch = false;
    } else if toggle_edge {
        state.latch = !state.latch;
    }

    state.prev_set = set_now;
    state.prev_reset = reset_now;
    state.prev_edge_input = toggle_now;
    state.latch
}

fn eval_pulse(def: &LogicDef, state: &mut LogicState, trigger: bool, now_ms: u32) -> bool {
    let edge = if def.trigger_on_rising {
        trigger && !state.prev_edge_input
    } else {
        !trigger && state.prev_edge_input
    };

    if edge && def.pulse_count > 0 && (!state.pulse_train_active || def.retrigger) {
        state.pulse_train_active = true;
        state.pulses_remaining = def.pulse_count;
        state.phase_started_ms = now_ms;
        state.flash_on = true; // first half-cycle is ON
    }

    if !state.pulse_train_active {
        return false;
    }

    let half_cycle = def.time_on_ms.max(1);
    let elapsed = now_ms.wrapping_sub(state.phase_started_ms);
    let half_cycles_done = elapsed / half_cycle;
    let total_half_cycles = state.pulses_remaining as u32 * 2;

    if half_cycles_done >= total_half_cycles {
        state.pulse_train_active = false;
        state.flash_on = false;
        return false;
    }

    // ON during even half-cycles, OFF during odd ones.
    half_cycles_done % 2 == 0
}

fn eval_flash(def: &LogicDef, state: &mut LogicState, gate: bool, now_ms: u32) -> bool {
    if gate && !state.prev_edge_input {
        // Rising edge of the gate: restart the cycle, starting OFF.
        state.phase_started_ms = now_ms;
        state.flash_on = false;
    }

    if !gate {
        return false;
    }

    let on = def.time_on_ms.max(1);
    let off = def.time_off_ms.max(1);
    let cycle = on + off;
    let elapsed = now_ms.wrapping_sub(state.phase_started_ms) % cycle;

    elapsed >= off
}

impl LogicState {
    fn prev_value_for_changed(&self) -> i32 {
        self.changed_last_value
    }
}
