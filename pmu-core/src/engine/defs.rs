//! Virtual-channel definitions (spec.md §3). One tagged union per the
//! Design Notes' guidance: a discriminant (`VirtualChannelDef`) with a flat,
//! per-family payload struct, rather than a virtual-method hierarchy. Each
//! struct mirrors the decoded TLV record for that family one-to-one.

use heapless::Vec;

use crate::channel::ChannelId;
use crate::limits::{MAX_LOOKUP_POINTS, MAX_MATH_INPUTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogicOp {
    IsTrue,
    IsFalse,
    And,
    Or,
    Xor,
    Not,
    Nand,
    Nor,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    InRange,
    Changed,
    Hysteresis,
    SrLatch,
    Toggle,
    Pulse,
    Flash,
    EdgeRising,
    EdgeFalling,
}

#[derive(Debug, Clone)]
pub struct LogicDef {
    pub output_id: ChannelId,
    pub op: LogicOp,
    pub input_a: ChannelId,
    pub input_b: ChannelId,
    pub threshold: i32,
    pub lower: i32,
    pub upper: i32,
    pub time_on_ms: u32,
    pub time_off_ms: u32,
    pub polarity_inverted: bool,
    /// For ops with a single configurable edge (`EdgeRising`/`EdgeFalling`
    /// pick one of the two variants instead; this selects the edge used by
    /// `Toggle`'s toggle-ref and `Pulse`'s trigger ref).
    pub trigger_on_rising: bool,
    pub set_ref: ChannelId,
    pub reset_ref: ChannelId,
    pub toggle_ref: ChannelId,
    pub default_state: bool,
    pub pulse_count: u16,
    pub retrigger: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MathOp {
    Constant,
    Channel,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Min,
    Max,
    Clamp,
    LookupN,
}

#[derive(Debug, Clone)]
pub struct MathDef {
    pub output_id: ChannelId,
    pub op: MathOp,
    pub inputs: Vec<ChannelId, MAX_MATH_INPUTS>,
    pub constant: i32,
    pub clamp_min: i32,
    pub clamp_max: i32,
    /// Breakpoints for `LookupN`, sorted ascending by `.0` (x).
    pub lookup: Vec<(i32, i32), MAX_LOOKUP_POINTS>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerMode {
    CountUp,
    CountDown,
}

#[derive(Debug, Clone)]
pub struct TimerDef {
    pub running_id: ChannelId,
    pub elapsed_id: ChannelId,
    pub start_ref: ChannelId,
    pub stop_ref: ChannelId,
    pub start_on_rising: bool,
    pub stop_on_rising: bool,
    pub mode: TimerMode,
    pub limit_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterKind {
    MovingAverage,
    LowPass,
    MinWindow,
    MaxWindow,
    Median,
}

#[derive(Debug, Clone)]
pub struct FilterDef {
    pub output_id: ChannelId,
    pub kind: FilterKind,
    pub input: ChannelId,
    /// Ring size for window-based filters, clamped to `MAX_FILTER_WINDOW`.
    pub window: u8,
    /// Time constant in ms, for `LowPass`.
    pub time_constant_ms: u32,
}

#[derive(Debug, Clone)]
pub struct SwitchDef {
    pub output_id: ChannelId,
    pub up_ref: ChannelId,
    pub down_ref: ChannelId,
    pub up_on_rising: bool,
    pub down_on_rising: bool,
    pub first: i32,
    pub last: i32,
    pub default_pos: i32,
}

#[derive(Debug, Clone)]
pub enum VirtualChannelDef {
    Logic(LogicDef),
    Math(MathDef),
    Timer(TimerDef),
    Filter(FilterDef),
    Switch(SwitchDef),
}

impl VirtualChannelDef {
    /// All channel ids this definition writes to, for reference validation
    /// (spec.md §3 invariant: "every reference ... resolves to a channel
    /// present in the store").
    pub fn output_ids(&self) -> (ChannelId, Option<ChannelId>) {
        match self {
            VirtualChannelDef::Logic(d) => (d.output_id, None),
            VirtualChannelDef::Math(d) => (d.output_id, None),
            VirtualChannelDef::Timer(d) => (d.running_id, Some(d.elapsed_id)),
            VirtualChannelDef::Filter(d) => (d.output_id, None),
            VirtualChannelDef::Switch(d) => (d.output_id, None),
        }
    }
}
