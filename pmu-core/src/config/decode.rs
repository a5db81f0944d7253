use heapless::Vec;

use super::{RecordTag, HEADER_LEN, RECORD_HEADER_LEN, SUPPORTED_VERSION};
use crate::channel::{ChannelId, Format, HardwareClass};
use crate::engine::defs::{
    FilterDef, FilterKind, LogicDef, LogicOp, MathDef, MathOp, SwitchDef, TimerDef, TimerMode,
    VirtualChannelDef,
};
use crate::error::ConfigError;
use crate::limits::{
    MAX_LOOKUP_POINTS, MAX_MATH_INPUTS, MAX_OUTPUT_BINDINGS, MAX_PINS_PER_BINDING,
    MAX_VIRTUAL_CHANNELS,
};
use crate::output::OutputBinding;

/// A registration request for a virtual channel's backing store slot;
/// applied by the caller once the whole blob has decoded successfully.
#[derive(Debug, Clone, Copy)]
pub struct ChannelRegistration {
    pub id: ChannelId,
    pub class: HardwareClass,
    pub format: Format,
    pub min: i32,
    pub max: i32,
}

/// Everything a successful decode produces. Nothing here is applied to the
/// live store/engine until the caller installs it — decoding never mutates
/// shared state (spec.md §4.C: "no partial load").
pub struct DecodedConfig {
    pub registrations: Vec<ChannelRegistration, MAX_VIRTUAL_CHANNELS>,
    pub defs: Vec<VirtualChannelDef, MAX_VIRTUAL_CHANNELS>,
    pub bindings: Vec<OutputBinding, MAX_OUTPUT_BINDINGS>,
    pub channel_count: u16,
}

struct Mapping {
    entries: Vec<(u16, ChannelId), MAX_VIRTUAL_CHANNELS>,
}

impl Mapping {
    fn new() -> Self {
        Mapping { entries: Vec::new() }
    }

    fn insert(&mut self, json_id: u16, runtime: ChannelId) {
        if json_id == 0 {
            return;
        }
        for entry in self.entries.iter_mut() {
            if entry.0 == json_id {
                entry.1 = runtime;
                return;
            }
        }
        let _ = self.entries.push((json_id, runtime));
    }

    /// Resolve a raw reference: a known physical runtime id is used
    /// directly; otherwise fall back to the json-id mapping. Unresolved
    /// references become `ChannelId::NONE` (spec.md §4.C).
    fn resolve(&self, raw: u16) -> ChannelId {
        if raw == 0 {
            return ChannelId::NONE;
        }
        if is_physical_id(raw) {
            return ChannelId(raw);
        }
        self.entries
            .iter()
            .find(|(json_id, _)| *json_id == raw)
            .map(|(_, runtime)| *runtime)
            .unwrap_or(ChannelId::NONE)
    }
}

fn is_physical_id(raw: u16) -> bool {
    use crate::limits::{MAX_ANALOG_INPUTS, MAX_DIGITAL_INPUTS, MAX_POWER_OUTPUTS};
    let analog = ChannelId::ANALOG_IN_BASE..ChannelId::ANALOG_IN_BASE + MAX_ANALOG_INPUTS as u16;
    let digital = ChannelId::DIGITAL_IN_BASE..ChannelId::DIGITAL_IN_BASE + MAX_DIGITAL_INPUTS as u16;
    let output = ChannelId::POWER_OUT_BASE..ChannelId::POWER_OUT_BASE + MAX_POWER_OUTPUTS as u16;
    analog.contains(&raw) || digital.contains(&raw) || output.contains(&raw)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn u8(&mut self) -> Result<u8, ConfigError> {
        let b = *self.bytes.get(self.pos).ok_or(ConfigError::RecordOverrun)?;
        self.pos += 1;
        Ok(b)
    }

    fn u16(&mut self) -> Result<u16, ConfigError> {
        let lo = self.u8()? as u16;
        let hi = self.u8()? as u16;
        Ok(lo | (hi << 8))
    }

    fn i32(&mut self) -> Result<i32, ConfigError> {
        Ok(self.u32()? as i32)
    }

    fn u32(&mut self) -> Result<u32, ConfigError> {
        let b0 = self.u8()? as u32;
        let b1 = self.u8()? as u32;
        let b2 = self.u8()? as u32;
        let b3 = self.u8()? as u32;
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }
}

/// Decode a TLV configuration blob (module docs for the wire layout).
/// Returns the number of virtual channels decoded, or a `ConfigError`; on
/// error the caller must leave the previously active configuration in
/// place (spec.md §4.C).
pub fn decode(blob: &[u8]) -> Result<DecodedConfig, ConfigError> {
    if blob.len() < HEADER_LEN {
        return Err(ConfigError::Truncated);
    }
    let version = blob[0];
    if version != SUPPORTED_VERSION {
        return Err(ConfigError::BadVersion);
    }
    let record_count = u16::from_le_bytes([blob[2], blob[3]]);

    let mut mapping = Mapping::new();
    let mut registrations = Vec::new();
    let mut defs = Vec::new();
    let mut bindings = Vec::new();
    let mut next_virtual_id = ChannelId::VIRTUAL_BASE;

    let mut cursor = Cursor::new(&blob[HEADER_LEN..]);
    let mut decoded = 0u16;

    for _ in 0..record_count {
        if cursor.remaining() < RECORD_HEADER_LEN {
            return Err(ConfigError::RecordOverrun);
        }
        let tag_byte = cursor.u8()?;
        let json_id = cursor.u16()?;
        let len = cursor.u8()? as usize;
        if cursor.remaining() < len {
            return Err(ConfigError::RecordOverrun);
        }
        let payload = &cursor.bytes[cursor.pos..cursor.pos + len];
        cursor.pos += len;

        let tag = RecordTag::from_u8(tag_byte).ok_or(ConfigError::UnknownRecordType)?;

        if registrations.len() >= MAX_VIRTUAL_CHANNELS && tag != RecordTag::PowerOutputBinding {
            return Err(ConfigError::TooManyChannels);
        }

        match tag {
            RecordTag::Logic => {
                let id = alloc_id(&mut next_virtual_id)?;
                mapping.insert(json_id, id);
                let def = decode_logic(id, payload, &mapping)?;
                push_reg(&mut registrations, id, HardwareClass::Calculated, Format::Boolean, 0, 1000)?;
                defs.push(VirtualChannelDef::Logic(def)).map_err(|_| ConfigError::TooManyChannels)?;
            }
            RecordTag::Math => {
                let id = alloc_id(&mut next_virtual_id)?;
                mapping.insert(json_id, id);
                let def = decode_math(id, payload, &mapping)?;
                push_reg(
                    &mut registrations,
                    id,
                    HardwareClass::Calculated,
                    Format::ScaledMilli,
                    i32::MIN,
                    i32::MAX,
                )?;
                defs.push(VirtualChannelDef::Math(def)).map_err(|_| ConfigError::TooManyChannels)?;
            }
            RecordTag::Timer => {
                let running_id = alloc_id(&mut next_virtual_id)?;
                let elapsed_id = alloc_id(&mut next_virtual_id)?;
                mapping.insert(json_id, running_id);
                let (def, elapsed_json) = decode_timer(running_id, elapsed_id, payload, &mapping)?;
                mapping.insert(elapsed_json, elapsed_id);
                push_reg(&mut registrations, running_id, HardwareClass::Calculated, Format::Boolean, 0, 1000)?;
                let limit = def.limit_ms as i32;
                push_reg(&mut registrations, elapsed_id, HardwareClass::Calculated, Format::ScaledMilli, 0, limit)?;
                defs.push(VirtualChannelDef::Timer(def)).map_err(|_| ConfigError::TooManyChannels)?;
            }
            RecordTag::Filter => {
                let id = alloc_id(&mut next_virtual_id)?;
                mapping.insert(json_id, id);
                let def = decode_filter(id, payload, &mapping)?;
                push_reg(
                    &mut registrations,
                    id,
                    HardwareClass::Calculated,
                    Format::ScaledMilli,
                    i32::MIN,
                    i32::MAX,
                )?;
                defs.push(VirtualChannelDef::Filter(def)).map_err(|_| ConfigError::TooManyChannels)?;
            }
            RecordTag::Switch => {
                let id = alloc_id(&mut next_virtual_id)?;
                mapping.insert(json_id, id);
                let def = decode_switch(id, payload, &mapping)?;
                let (first, last) = (def.first * 1000, def.last * 1000);
                push_reg(&mut registrations, id, HardwareClass::Calculated, Format::Signed, first, last)?;
                defs.push(VirtualChannelDef::Switch(def)).map_err(|_| ConfigError::TooManyChannels)?;
            }
            RecordTag::PowerOutputBinding => {
                let binding = decode_binding(payload, &mapping)?;
                bindings.push(binding).map_err(|_| ConfigError::TooManyChannels)?;
                continue;
            }
        }
        decoded += 1;
    }

    Ok(DecodedConfig {
        registrations,
        defs,
        bindings,
        channel_count: decoded,
    })
}

fn alloc_id(next: &mut u16) -> Result<ChannelId, ConfigError> {
    let id = ChannelId(*next);
    *next = next.checked_add(1).ok_or(ConfigError::TooManyChannels)?;
    Ok(id)
}

fn push_reg(
    regs: &mut Vec<ChannelRegistration, MAX_VIRTUAL_CHANNELS>,
    id: ChannelId,
    class: HardwareClass,
    format: Format,
    min: i32,
    max: i32,
) -> Result<(), ConfigError> {
    regs.push(ChannelRegistration { id, class, format, min, max })
        .map_err(|_| ConfigError::TooManyChannels)
}

fn decode_logic(output_id: ChannelId, payload: &[u8], mapping: &Mapping) -> Result<LogicDef, ConfigError> {
    let mut c = Cursor::new(payload);
    let op = logic_op(c.u8()?)?;
    let input_a = mapping.resolve(c.u16()?);
    let input_b = mapping.resolve(c.u16()?);
    let threshold = c.i32()?;
    let lower = c.i32()?;
    let upper = c.i32()?;
    let time_on_ms = c.u32()?;
    let time_off_ms = c.u32()?;
    let flags = c.u8()?;
    let set_ref = mapping.resolve(c.u16()?);
    let reset_ref = mapping.resolve(c.u16()?);
    let toggle_ref = mapping.resolve(c.u16()?);
    let pulse_count = c.u16()?;

    Ok(LogicDef {
        output_id,
        op,
        input_a,
        input_b,
        threshold,
        lower,
        upper,
        time_on_ms,
        time_off_ms,
        polarity_inverted: flags & 0b0001 != 0,
        trigger_on_rising: flags & 0b0010 != 0,
        set_ref,
        reset_ref,
        toggle_ref,
        default_state: flags & 0b0100 != 0,
        pulse_count,
        retrigger: flags & 0b1000 != 0,
    })
}

fn logic_op(raw: u8) -> Result<LogicOp, ConfigError> {
    use LogicOp::*;
    const OPS: [LogicOp; 23] = [
        IsTrue, IsFalse, And, Or, Xor, Not, Nand, Nor, Equal, NotEqual, Less, Greater, LessEq,
        GreaterEq, InRange, Changed, Hysteresis, SrLatch, Toggle, Pulse, Flash, EdgeRising,
        EdgeFalling,
    ];
    OPS.get(raw as usize).copied().ok_or(ConfigError::RecordOverrun)
}

fn decode_math(output_id: ChannelId, payload: &[u8], mapping: &Mapping) -> Result<MathDef, ConfigError> {
    let mut c = Cursor::new(payload);
    let op = math_op(c.u8()?)?;
    let input_count = c.u8()? as usize;
    if input_count > MAX_MATH_INPUTS {
        return Err(ConfigError::RecordOverrun);
    }
    let mut inputs = Vec::new();
    for _ in 0..input_count {
        inputs.push(mapping.resolve(c.u16()?)).map_err(|_| ConfigError::RecordOverrun)?;
    }
    let constant = c.i32()?;
    let clamp_min = c.i32()?;
    let clamp_max = c.i32()?;
    let lookup_count = c.u8()? as usize;
    if lookup_count > MAX_LOOKUP_POINTS {
        return Err(ConfigError::RecordOverrun);
    }
    let mut lookup = Vec::new();
    for _ in 0..lookup_count {
        let x = c.i32()?;
        let y = c.i32()?;
        lookup.push((x, y)).map_err(|_| ConfigError::RecordOverrun)?;
    }

    Ok(MathDef {
        output_id,
        op,
        inputs,
        constant,
        clamp_min,
        clamp_max,
        lookup,
    })
}

fn math_op(raw: u8) -> Result<MathOp, ConfigError> {
    use MathOp::*;
    const OPS: [MathOp; 11] = [
        Constant, Channel, Add, Subtract, Multiply, Divide, Modulo, Min, Max, Clamp, LookupN,
    ];
    OPS.get(raw as usize).copied().ok_or(ConfigError::RecordOverrun)
}

fn decode_timer(
    running_id: ChannelId,
    elapsed_id: ChannelId,
    payload: &[u8],
    mapping: &Mapping,
) -> Result<(TimerDef, u16), ConfigError> {
    let mut c = Cursor::new(payload);
    let elapsed_json_id = c.u16()?;
    let start_ref = mapping.resolve(c.u16()?);
    let stop_ref = mapping.resolve(c.u16()?);
    let flags = c.u8()?;
    let limit_ms = c.u32()?;

    let def = TimerDef {
        running_id,
        elapsed_id,
        start_ref,
        stop_ref,
        start_on_rising: flags & 0b0001 != 0,
        stop_on_rising: flags & 0b0010 != 0,
        mode: if flags & 0b0100 != 0 { TimerMode::CountDown } else { TimerMode::CountUp },
        limit_ms,
    };
    Ok((def, elapsed_json_id))
}

fn decode_filter(output_id: ChannelId, payload: &[u8], mapping: &Mapping) -> Result<FilterDef, ConfigError> {
    let mut c = Cursor::new(payload);
    let kind = filter_kind(c.u8()?)?;
    let input = mapping.resolve(c.u16()?);
    let window = c.u8()?;
    let time_constant_ms = c.u32()?;

    Ok(FilterDef { output_id, kind, input, window, time_constant_ms })
}

fn filter_kind(raw: u8) -> Result<FilterKind, ConfigError> {
    use FilterKind::*;
    const KINDS: [FilterKind; 5] = [MovingAverage, LowPass, MinWindow, MaxWindow, Median];
    KINDS.get(raw as usize).copied().ok_or(ConfigError::RecordOverrun)
}

fn decode_switch(output_id: ChannelId, payload: &[u8], mapping: &Mapping) -> Result<SwitchDef, ConfigError> {
    let mut c = Cursor::new(payload);
    let up_ref = mapping.resolve(c.u16()?);
    let down_ref = mapping.resolve(c.u16()?);
    let flags = c.u8()?;
    let first = c.i32()?;
    let last = c.i32()?;
    let default_pos = c.i32()?;

    Ok(SwitchDef {
        output_id,
        up_ref,
        down_ref,
        up_on_rising: flags & 0b0001 != 0,
        down_on_rising: flags & 0b0010 != 0,
        first,
        last,
        default_pos,
    })
}

fn decode_binding(payload: &[u8], mapping: &Mapping) -> Result<OutputBinding, ConfigError> {
    let mut c = Cursor::new(payload);
    let pin_count = c.u8()? as usize;
    if pin_count > MAX_PINS_PER_BINDING {
        return Err(ConfigError::RecordOverrun);
    }
    let mut pins = Vec::new();
    for _ in 0..pin_count {
        pins.push(c.u8()?).map_err(|_| ConfigError::RecordOverrun)?;
    }
    let source = mapping.resolve(c.u16()?);
    let flags = c.u8()?;
    let duty_fixed_permille = c.u16()?;
    let duty_source = mapping.resolve(c.u16()?);
    let pwm_freq_hz = c.u16()?;
    let current_limit_ma = c.u16()?;
    let inrush_ma = c.u16()?;
    let inrush_time_ms = c.u16()?;
    let retry_count = c.u8()?;
    let soft_start_ms = c.u16()?;

    Ok(OutputBinding {
        pins,
        source,
        pwm_enable: flags & 0b0001 != 0,
        duty_fixed_permille,
        duty_source,
        pwm_freq_hz,
        current_limit_ma,
        inrush_ma,
        inrush_time_ms,
        retry_count,
        retry_forever: flags & 0b0100 != 0,
        soft_start_ms,
    })
}
