//! Math node semantics (spec.md §4.D). Purely combinational: no runtime
//! state survives between ticks.

use super::defs::{MathDef, MathOp};
use super::read;
use crate::channel::store::ChannelStore;

/// Fixed-point scale shared by every scaled-milli channel (spec.md §3).
const SCALE: i64 = 1000;

pub fn eval(def: &MathDef, store: &ChannelStore) -> i32 {
    let inputs: heapless::Vec<i32, { crate::limits::MAX_MATH_INPUTS }> =
        def.inputs.iter().map(|id| read(store, *id)).collect();

    let result = match def.op {
        MathOp::Constant => def.constant,
        MathOp::Channel => inputs.first().copied().unwrap_or(0),
        MathOp::Add => inputs.iter().fold(0i64, |acc, v| acc + *v as i64),
        MathOp::Subtract => fold_pairwise(&inputs, |a, b| a - b),
        MathOp::Multiply => fold_pairwise_scaled(&inputs),
        MathOp::Divide => divide(&inputs),
        MathOp::Modulo => modulo(&inputs),
        MathOp::Min => inputs
            .iter()
            .copied()
            .fold(i32::MAX, i32::min) as i64,
        MathOp::Max => inputs
            .iter()
            .copied()
            .fold(i32::MIN, i32::max) as i64,
        MathOp::Clamp => inputs
            .first()
            .copied()
            .unwrap_or(0)
            .clamp(def.clamp_min, def.clamp_max) as i64,
        MathOp::LookupN => lookup(def, inputs.first().copied().unwrap_or(0)) as i64,
    };

    result.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn fold_pairwise(inputs: &[i32], f: impl Fn(i64, i64) -> i64) -> i64 {
    let mut iter = inputs.iter();
    let Some(first) = iter.next() else { return 0 };
    iter.fold(*first as i64, |acc, v| f(acc, *v as i64))
}

/// Repeated multiplication divides by `SCALE` after each pairwise product so
/// two scaled-milli inputs multiply back down to scaled-milli, not
/// scaled-micro (spec.md §4.D: "divide by 1000 after each multiply").
fn fold_pairwise_scaled(inputs: &[i32]) -> i64 {
    let mut iter = inputs.iter();
    let Some(first) = iter.next() else { return 0 };
    iter.fold(*first as i64, |acc, v| (acc * *v as i64) / SCALE)
}

fn divide(inputs: &[i32]) -> i64 {
    let mut iter = inputs.iter();
    let Some(first) = iter.next() else { return 0 };
    iter.fold(*first as i64, |acc, v| {
        if *v == 0 {
            0
        } else {
            (acc * SCALE) / *v as i64
        }
    })
}

fn modulo(inputs: &[i32]) -> i64 {
    let mut iter = inputs.iter();
    let Some(first) = iter.next() else { return 0 };
    iter.fold(*first as i64, |acc, v| if *v == 0 { 0 } else { acc % *v as i64 })
}

/// Linear interpolation over sorted `(x, y)` breakpoints; clamps outside
/// the table's domain (spec.md §4.D LookupN).
fn lookup(def: &MathDef, x: i32) -> i32 {
    let points = &def.lookup;
    if points.is_empty() {
        return 0;
    }
    if x <= points[0].0 {
        return points[0].1;
    }
    let last = points[points.len() - 1];
    if x >= last.0 {
        return last.1;
    }
    for w in points.windows(2) {
        let (x0, y0) = w[0];
        let (x1, y1) = w[1];
        if x >= x0 && x <= x1 {
            if x1 == x0 {
                return y0;
            }
            let span = (x1 - x0) as i64;
            let frac = (x - x0) as i64;
            return (y0 as i64 + (y1 as i64 - y0 as i64) * frac / span) as i32;
        }
    }
    last.1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelId;

    fn def(op: MathOp) -> MathDef {
        MathDef {
            output_id: ChannelId(200),
            op,
            inputs: heapless::Vec::new(),
            constant: 0,
            clamp_min: i32::MIN,
            clamp_max: i32::MAX,
            lookup: heapless::Vec::new(),
        }
    }

    #[test]
    fn multiply_rescales() {
        let mut d = def(MathOp::Multiply);
        d.inputs.push(ChannelId(1)).unwrap();
        d.inputs.push(ChannelId(2)).unwrap();
        let mut store = ChannelStore::new();
        use crate::channel::{Channel, Direction, Format, HardwareClass};
        for (id, v) in [(1u16, 2000i32), (2u16, 3000i32)] {
            let mut c = Channel::new(
                ChannelId(id),
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
        }
        // 2.0 * 3.0 = 6.0 -> 6000
        assert_eq!(eval(&d, &store), 6000);
    }

    #[test]
    fn divide_by_zero_is_zero() {
        let mut d = def(MathOp::Divide);
        d.inputs.push(ChannelId(1)).unwrap();
        d.inputs.push(ChannelId(2)).unwrap();
        let store = ChannelStore::new();
        assert_eq!(eval(&d, &store), 0);
    }

    #[test]
    fn lookup_interpolates() {
        let mut d = def(MathOp::LookupN);
        d.inputs.push(ChannelId(1)).unwrap();
        d.lookup.push((0, 0)).unwrap();
        d.lookup.push((1000, 1000)).unwrap();
        d.lookup.push((2000, 0)).unwrap();
        let mut store = ChannelStore::new();
        use crate::channel::{Channel, Direction, Format, HardwareClass};
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
        c.set_value(500);
        store.register(c).unwrap();
        assert_eq!(eval(&d, &store), 500);
    }
}
