//! The channel data model (spec.md §3): a stable, numerically-addressed
//! slot in the store, driven by hardware, by another channel's computation,
//! or held constant.

pub mod store;

use crate::limits::MAX_NAME_LEN;

/// A 16-bit opaque handle into the channel store. Stable for the lifetime
/// of one loaded configuration; a new load may reassign virtual ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(pub u16);

impl ChannelId {
    /// Sentinel used for "no source" / unresolved references (spec.md §4.C:
    /// "Unresolved references become 0"). Runtime ids therefore start at 1 —
    /// `ANALOG_IN_BASE` is shifted up from the spec's illustrative "0-19" so
    /// analog input 0 never aliases the none-sentinel.
    pub const NONE: ChannelId = ChannelId(0);

    /// First runtime id reserved for physical analog inputs.
    pub const ANALOG_IN_BASE: u16 = 1;
    /// First runtime id reserved for physical digital inputs.
    pub const DIGITAL_IN_BASE: u16 = 50;
    /// First runtime id reserved for physical power outputs.
    pub const POWER_OUT_BASE: u16 = 100;
    /// First runtime id handed out to virtual channels as config is decoded.
    pub const VIRTUAL_BASE: u16 = 200;

    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }

    pub const fn analog_in(index: u8) -> ChannelId {
        ChannelId(Self::ANALOG_IN_BASE + index as u16)
    }

    pub const fn digital_in(index: u8) -> ChannelId {
        ChannelId(Self::DIGITAL_IN_BASE + index as u16)
    }

    pub const fn power_out(index: u8) -> ChannelId {
        ChannelId(Self::POWER_OUT_BASE + index as u16)
    }
}

/// Where a channel's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    PhysicalIn,
    PhysicalOut,
    Virtual,
}

/// Hardware class tag (spec.md §3). Diagnostic/authoring metadata; the
/// engine itself only cares about `Format` and `Direction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardwareClass {
    InputSwitch,
    InputAnalog,
    InputRotary,
    InputCan,
    OutputPower,
    OutputFunction,
    OutputNumber,
    Calculated,
}

/// How a channel's `i32` value should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Format {
    /// value is in {0, 1000} only.
    Boolean,
    Signed,
    /// Scaled x1000, e.g. millivolts/milliamps/milliseconds.
    ScaledMilli,
}

/// Boolean "true" in the uniform x1000 scaled representation (spec.md §3).
pub const BOOL_TRUE: i32 = 1000;
/// Boolean "false" in the uniform x1000 scaled representation.
pub const BOOL_FALSE: i32 = 0;

#[inline]
pub const fn as_bool(value: i32) -> bool {
    value > 0
}

#[inline]
pub const fn from_bool(value: bool) -> i32 {
    if value {
        BOOL_TRUE
    } else {
        BOOL_FALSE
    }
}

/// One channel store entry (spec.md §3).
#[derive(Debug, Clone, Copy)]
pub struct Channel {
    pub id: ChannelId,
    name: [u8; MAX_NAME_LEN],
    name_len: u8,
    pub class: HardwareClass,
    pub direction: Direction,
    pub format: Format,
    pub value: i32,
    pub min: i32,
    pub max: i32,
    pub enabled: bool,
    /// Index into the `HardwareAdapter`'s digital/analog/output pin space,
    /// meaningful only for `PhysicalIn`/`PhysicalOut` channels.
    pub physical_index: u8,
}

impl Channel {
    pub fn new(
        id: ChannelId,
        name: &str,
        class: HardwareClass,
        direction: Direction,
        format: Format,
        min: i32,
        max: i32,
        physical_index: u8,
    ) -> Self {
        let mut name_buf = [0u8; MAX_NAME_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(MAX_NAME_LEN);
        name_buf[..len].copy_from_slice(&bytes[..len]);

        let initial = match format {
            Format::Boolean => BOOL_FALSE,
            _ => 0,
        };

        Channel {
            id,
            name: name_buf,
            name_len: len as u8,
            class,
            direction,
            format,
            value: initial.clamp(min, max),
            min,
            max,
            enabled: true,
            physical_index,
        }
    }

    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or("")
    }

    /// Write a new value, clamping to bounds and, for boolean channels,
    /// snapping to {0, 1000} (spec.md §3 invariants, §4.B).
    pub fn set_value(&mut self, value: i32) {
        self.value = match self.format {
            Format::Boolean => from_bool(as_bool(value)),
            _ => value,
        }
        .clamp(self.min, self.max);
    }
}
