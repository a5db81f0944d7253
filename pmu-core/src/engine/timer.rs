//! Timer node semantics (spec.md §4.D). Writes two channels per node:
//! `running_id` (bool) and `elapsed_id` (ms, saturating at `limit_ms`).

use super::defs::{TimerDef, TimerMode};
use super::read;
use super::state::TimerState;
use crate::channel::store::ChannelStore;
use crate::channel::as_bool;

pub struct TimerOutput {
    pub running: bool,
    pub elapsed_ms: u32,
}

pub fn eval(def: &TimerDef, state: &mut TimerState, store: &ChannelStore, now_ms: u32) -> TimerOutput {
    let start_now = as_bool(read(store, def.start_ref));
    let stop_now = as_bool(read(store, def.stop_ref));

    let start_edge = if def.start_on_rising {
        start_now && !state.prev_start_edge
    } else {
        !start_now && state.prev_start_edge
    };
    let stop_edge = if def.stop_on_rising {
        stop_now && !state.prev_stop_edge
    } else {
        !stop_now && state.prev_stop_edge
    };

    if start_edge && !state.running {
        state.running = true;
        state.start_ms = now_ms;
    }
    if stop_edge && state.running {
        state.held_elapsed_ms = elapsed_since(state.start_ms, now_ms).min(def.limit_ms);
        state.running = false;
    }

    state.prev_start_edge = start_now;
    state.prev_stop_edge = stop_now;

    let elapsed_ms = if state.running {
        elapsed_since(state.start_ms, now_ms).min(def.limit_ms)
    } else {
        state.held_elapsed_ms
    };

    let reported = match def.mode {
        TimerMode::CountUp => elapsed_ms,
        TimerMode::CountDown => def.limit_ms.saturating_sub(elapsed_ms),
    };

    TimerOutput {
        running: state.running,
        elapsed_ms: reported,
    }
}

fn elapsed_since(start_ms: u32, now_ms: u32) -> u32 {
    now_ms.wrapping_sub(start_ms)
}
