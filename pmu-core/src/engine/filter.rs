//! Filter node semantics (spec.md §4.D). All filters read one input
//! channel and write one scalar output.

use super::defs::{FilterDef, FilterKind};
use super::read;
use super::state::FilterState;
use crate::channel::store::ChannelStore;
use crate::limits::MAX_FILTER_WINDOW;

pub fn eval(def: &FilterDef, state: &mut FilterState, store: &ChannelStore) -> i32 {
    let input = read(store, def.input);
    let window_len = (def.window as usize).clamp(1, MAX_FILTER_WINDOW);

    match def.kind {
        FilterKind::MovingAverage => {
            push(state, window_len, input);
            let filled = state.filled as usize;
            let sum: i64 = state.window[..filled].iter().map(|v| *v as i64).sum();
            (sum / filled as i64) as i32
        }
        FilterKind::MinWindow => {
            push(state, window_len, input);
            let filled = state.filled as usize;
            state.window[..filled].iter().copied().min().unwrap_or(0)
        }
        FilterKind::MaxWindow => {
            push(state, window_len, input);
            let filled = state.filled as usize;
            state.window[..filled].iter().copied().max().unwrap_or(0)
        }
        FilterKind::Median => {
            push(state, window_len, input);
            let filled = state.filled as usize;
            let mut sorted = state.window;
            bubble_sort(&mut sorted[..filled]);
            sorted[filled / 2]
        }
        FilterKind::LowPass => {
            // alpha = 1000 / (1 + time_constant_ms*100), clamped [10, 1000]
            // (spec.md §4.D).
            let denom = 1 + def.time_constant_ms as i64 * 100;
            let alpha = (1000i64 / denom).clamp(10, 1000);
            let prev = state.ema as i64;
            state.ema = (prev + (input as i64 - prev) * alpha / 1000) as i32;
            state.ema
        }
    }
}

fn push(state: &mut FilterState, window_len: usize, value: i32) {
    state.window[state.write_idx as usize % window_len] = value;
    state.write_idx = state.write_idx.wrapping_add(1);
    if (state.filled as usize) < window_len {
        state.filled += 1;
    }
}

fn bubble_sort(values: &mut [i32]) {
    let n = values.len();
    if n < 2 {
        return;
    }
    for i in 0..n {
        for j in 0..n - 1 - i {
            if values[j] > values[j + 1] {
                values.swap(j, j + 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, ChannelId, Direction, Format, HardwareClass};

    fn def(kind: FilterKind) -> FilterDef {
        FilterDef {
            output_id: ChannelId(200),
            kind,
            input: ChannelId(1),
            window: 4,
            time_constant_ms: 500,
        }
    }

    fn store_with(v: i32) -> ChannelStore {
        let mut store = ChannelStore::new();
        let mut c = Channel::new(
            ChannelId(1),
            "x",
            HardwareClass::Calculated,
            Direction::Virtual,
            Format::ScaledMilli,
            i32::MIN,
            i32::MAX,
            0,
        );
        c.set_value(v);
        store.register(c).unwrap();
        store
    }

    #[test]
    fn moving_average_over_window() {
        let d = def(FilterKind::MovingAverage);
        let mut s = FilterState::default();
        for v in [100, 200, 300, 400] {
            eval(&d, &mut s, &store_with(v));
        }
        assert_eq!(eval(&d, &mut s, &store_with(500)), (200 + 300 + 400 + 500) / 4);
    }

    #[test]
    fn median_odd_window() {
        let mut d = def(FilterKind::Median);
        d.window = 3;
        let mut s = FilterState::default();
        eval(&d, &mut s, &store_with(5));
        eval(&d, &mut s, &store_with(1));
        assert_eq!(eval(&d, &mut s, &store_with(3)), 3);
    }

    #[test]
    fn low_pass_tracks_toward_input() {
        // With time_constant_ms = 500, alpha clamps to its floor of 10
        // (denom = 1 + 500*100 = 50001), so convergence toward the input
        // is slow; enough iterations are needed to reach the plateau.
        let d = def(FilterKind::LowPass);
        let mut s = FilterState::default();
        let first = eval(&d, &mut s, &store_with(1000));
        assert!(first > 0 && first < 1000);
        for _ in 0..500 {
            eval(&d, &mut s, &store_with(1000));
        }
        assert!(s.ema > 900);
    }
}
