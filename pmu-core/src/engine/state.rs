//! Out-of-line per-channel runtime state (spec.md §3: "previous input
//! values for edge detection, latch state, delay timers, flash phase,
//! filter windows, timer start time, and pulse counters"). Indexed by the
//! order the engine saw the channel, zeroed on every fresh configuration
//! load (spec.md §9 Open Question 1 — the source zeroes unconditionally,
//! and so does this implementation; see DESIGN.md).

use crate::limits::MAX_FILTER_WINDOW;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogicState {
    /// Raw boolean last observed on the node's primary edge-sensitive input.
    pub prev_edge_input: bool,
    pub prev_set: bool,
    pub prev_reset: bool,
    /// Current latched/toggled/pulsing boolean state.
    pub latch: bool,
    /// Set while a `Changed` node's hold timer is running; `None` once expired.
    pub changed_hold_until_ms: Option<u32>,
    pub flash_on: bool,
    pub phase_started_ms: u32,
    pub pulses_remaining: u16,
    pub pulse_train_active: bool,
}

impl LogicState {
    pub fn reset(&mut self, default_state: bool) {
        *self = LogicState {
            latch: default_state,
            ..Default::default()
        };
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimerState {
    pub running: bool,
    pub start_ms: u32,
    /// Elapsed time retained once stopped, so `elapsed` output holds its
    /// last value rather than resetting to 0.
    pub held_elapsed_ms: u32,
    pub prev_start_edge: bool,
    pub prev_stop_edge: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct FilterState {
    pub window: [i32; MAX_FILTER_WINDOW],
    pub filled: u8,
    pub write_idx: u8,
    /// Running EMA value for `LowPass`.
    pub ema: i32,
}

impl Default for FilterState {
    fn default() -> Self {
        FilterState {
            window: [0; MAX_FILTER_WINDOW],
            filled: 0,
            write_idx: 0,
            ema: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchState {
    pub position: i32,
    pub prev_up: bool,
    pub prev_down: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum NodeState {
    Logic(LogicState),
    Timer(TimerState),
    Filter(FilterState),
    Switch(SwitchState),
    /// Math nodes are purely combinational; no runtime state to hold.
    Stateless,
}

impl NodeState {
    pub fn logic_mut(&mut self) -> &mut LogicState {
        match self {
            NodeState::Logic(s) => s,
            _ => unreachable!("node state/definition kind mismatch"),
        }
    }

    pub fn timer_mut(&mut self) -> &mut TimerState {
        match self {
            NodeState::Timer(s) => s,
            _ => unreachable!("node state/definition kind mismatch"),
        }
    }

    pub fn filter_mut(&mut self) -> &mut FilterState {
        match self {
            NodeState::Filter(s) => s,
            _ => unreachable!("node state/definition kind mismatch"),
        }
    }

    pub fn switch_mut(&mut self) -> &mut SwitchState {
        match self {
            NodeState::Switch(s) => s,
            _ => unreachable!("node state/definition kind mismatch"),
        }
    }
}
