//! The virtual-channel evaluation engine (spec.md §4.D). Every virtual
//! channel is re-evaluated exactly once per tick, in the order it appears
//! in the loaded configuration blob — no dependency graph, no topological
//! sort. A virtual channel that reads another virtual channel defined later
//! in the same blob sees that channel's *previous* tick value; spec.md §9
//! accepts the resulting one-tick lag rather than requiring authors to
//! order definitions by dependency (see DESIGN.md Open Question 1).

pub mod defs;
pub mod filter;
pub mod logic;
pub mod math;
pub mod state;
pub mod switch;
pub mod timer;

use heapless::Vec;

use crate::channel::store::ChannelStore;
use crate::channel::{from_bool, ChannelId};
use crate::limits::MAX_VIRTUAL_CHANNELS;
use defs::VirtualChannelDef;
use state::{FilterState, LogicState, NodeState, SwitchState, TimerState};

/// Read a channel's current value, treating `ChannelId::NONE` or a missing
/// channel as `0` (spec.md §4.D: unresolved refs evaluate as the input's
/// inactive value rather than faulting the tick).
pub(crate) fn read(store: &ChannelStore, id: ChannelId) -> i32 {
    if id.is_none() {
        return 0;
    }
    store.get(id).map(|c| c.value).unwrap_or(0)
}

pub struct Engine {
    defs: Vec<VirtualChannelDef, MAX_VIRTUAL_CHANNELS>,
    state: Vec<NodeState, MAX_VIRTUAL_CHANNELS>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub const fn new() -> Self {
        Engine {
            defs: Vec::new(),
            state: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Replace the whole node list, e.g. after a config load. Runtime state
    /// is rebuilt from scratch, zeroed unconditionally (spec.md §9 Open
    /// Question 1 / DESIGN.md).
    pub fn load(&mut self, defs: Vec<VirtualChannelDef, MAX_VIRTUAL_CHANNELS>) {
        self.state.clear();
        for def in defs.iter() {
            let _ = self.state.push(initial_state(def));
        }
        self.defs = defs;
    }

    pub fn clear(&mut self) {
        self.defs.clear();
        self.state.clear();
    }

    /// Re-evaluate every node once, in definition order, writing results
    /// straight back into the store (spec.md §4.D).
    pub fn tick(&mut self, store: &mut ChannelStore, now_ms: u32) {
        for (def, node_state) in self.defs.iter().zip(self.state.iter_mut()) {
            match def {
                VirtualChannelDef::Logic(d) => {
                    let out = logic::eval(d, node_state.logic_mut(), store, now_ms);
                    store.update_value(d.output_id, out);
                }
                VirtualChannelDef::Math(d) => {
                    let out = math::eval(d, store);
                    store.update_value(d.output_id, out);
                }
                VirtualChannelDef::Timer(d) => {
                    let out = timer::eval(d, node_state.timer_mut(), store, now_ms);
                    store.update_value(d.running_id, from_bool(out.running));
                    store.update_value(d.elapsed_id, out.elapsed_ms as i32);
                }
                VirtualChannelDef::Filter(d) => {
                    let out = filter::eval(d, node_state.filter_mut(), store);
                    store.update_value(d.output_id, out);
                }
                VirtualChannelDef::Switch(d) => {
                    let out = switch::eval(d, node_state.switch_mut(), store);
                    store.update_value(d.output_id, out);
                }
            }
        }
    }
}

fn initial_state(def: &VirtualChannelDef) -> NodeState {
    match def {
        VirtualChannelDef::Logic(d) => {
            let mut s = LogicState::default();
            s.reset(d.default_state);
            NodeState::Logic(s)
        }
        VirtualChannelDef::Math(_) => NodeState::Stateless,
        VirtualChannelDef::Timer(_) => NodeState::Timer(TimerState::default()),
        VirtualChannelDef::Filter(_) => NodeState::Filter(FilterState::default()),
        VirtualChannelDef::Switch(d) => {
            let mut s = SwitchState::default();
            s.position = d.default_pos.clamp(d.first, d.last);
            NodeState::Switch(s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, Direction, Format, HardwareClass};
    use defs::{LogicDef, LogicOp};

    #[test]
    fn tick_evaluates_definition_order() {
        let mut store = ChannelStore::new();
        let input = Channel::new(
            ChannelId(1),
            "in",
            HardwareClass::InputSwitch,
            Direction::PhysicalIn,
            Format::Boolean,
            0,
            1000,
            0,
        );
        store.register(input).unwrap();
        let out = Channel::new(
            ChannelId(200),
            "out",
            HardwareClass::Calculated,
            Direction::Virtual,
            Format::Boolean,
            0,
            1000,
            0,
        );
        store.register(out).unwrap();

        let mut defs = Vec::new();
        defs.push(VirtualChannelDef::Logic(LogicDef {
            output_id: ChannelId(200),
            op: LogicOp::IsTrue,
            input_a: ChannelId(1),
            input_b: ChannelId::NONE,
            threshold: 0,
            lower: 0,
            upper: 0,
            time_on_ms: 0,
            time_off_ms: 0,
            polarity_inverted: false,
            trigger_on_rising: true,
            set_ref: ChannelId::NONE,
            reset_ref: ChannelId::NONE,
            toggle_ref: ChannelId::NONE,
            default_state: false,
            pulse_count: 0,
            retrigger: false,
        }))
        .unwrap();

        let mut engine = Engine::new();
        engine.load(defs);

        store.update_value(ChannelId(1), 1000);
        engine.tick(&mut store, 0);
        assert_eq!(store.get(ChannelId(200)).unwrap().value, 1000);
    }
}
