//! Switch node semantics (spec.md §4.D). A bounded rotary/rocker position
//! counter; output is the position scaled x1000.

use super::defs::SwitchDef;
use super::read;
use super::state::SwitchState;
use crate::channel::as_bool;
use crate::channel::store::ChannelStore;

pub fn eval(def: &SwitchDef, state: &mut SwitchState, store: &ChannelStore) -> i32 {
    if state.position < def.first || state.position > def.last {
        state.position = def.default_pos.clamp(def.first, def.last);
    }

    let up_now = as_bool(read(store, def.up_ref));
    let down_now = as_bool(read(store, def.down_ref));

    let up_edge = if def.up_on_rising {
        up_now && !state.prev_up
    } else {
        !up_now && state.prev_up
    };
    let down_edge = if def.down_on_rising {
        down_now && !state.prev_down
    } else {
        !down_now && state.prev_down
    };

    if up_edge && state.position < def.last {
        state.position += 1;
    } else if down_edge && state.position > def.first {
        state.position -= 1;
    }

    state.prev_up = up_now;
    state.prev_down = down_now;

    state.position.saturating_mul(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, ChannelId, Direction, Format, HardwareClass};

    fn def() -> SwitchDef {
        SwitchDef {
            output_id: ChannelId(200),
            up_ref: ChannelId(1),
            down_ref: ChannelId(2),
            up_on_rising: true,
            down_on_rising: true,
            first: 0,
            last: 3,
            default_pos: 0,
        }
    }

    fn store_with(up: i32, down: i32) -> ChannelStore {
        let mut store = ChannelStore::new();
        for (id, v) in [(1u16, up), (2u16, down)] {
            let mut c = Channel::new(
                ChannelId(id),
                "x",
                HardwareClass::Calculated,
                Direction::Virtual,
                Format::Boolean,
                0,
                1000,
                0,
            );
            c.set_value(v);
            store.register(c).unwrap();
        }
        store
    }

    #[test]
    fn increments_and_clamps_at_last() {
        let d = def();
        let mut s = SwitchState::default();
        for _ in 0..5 {
            eval(&d, &mut s, &store_with(0, 0));
            eval(&d, &mut s, &store_with(1000, 0));
        }
        assert_eq!(s.position, 3);
    }

    #[test]
    fn decrements_and_clamps_at_first() {
        let d = def();
        let mut s = SwitchState::default();
        s.position = 1;
        eval(&d, &mut s, &store_with(0, 0));
        eval(&d, &mut s, &store_with(0, 1000));
        assert_eq!(s.position, 0);
        eval(&d, &mut s, &store_with(0, 0));
        eval(&d, &mut s, &store_with(0, 1000));
        assert_eq!(s.position, 0);
    }
}
