//! Telemetry streamer (spec.md §4.H): a fixed-layout snapshot of the store,
//! emitted at a host-selected cadence while streaming is active.

use heapless::Vec;

use crate::channel::store::ChannelStore;
use crate::channel::{ChannelId, Direction};
use crate::limits::{MAX_ANALOG_INPUTS, MAX_FRAME_PAYLOAD, MAX_POWER_OUTPUTS, TELEMETRY_MAX_CHANNELS};

const OUTPUT_STATES_LEN: usize = 30;
const ANALOG_READINGS_LEN: usize = 40;

/// True once `(now - last_emit) >= period` and streaming is active
/// (spec.md §4.H "Cadence").
pub fn due(now_ms: u32, last_emit_ms: u32, period_ms: u32, active: bool) -> bool {
    active && now_ms.wrapping_sub(last_emit_ms) >= period_ms
}

/// Build one telemetry frame payload from a store snapshot (spec.md §4.H
/// byte layout). `counter` is the caller-owned monotonic emission count;
/// the caller increments it after a successful send.
pub fn build_frame(
    store: &ChannelStore,
    counter: u32,
    now_ms: u32,
    uptime_s: u32,
) -> Vec<u8, MAX_FRAME_PAYLOAD> {
    let mut out = Vec::new();
    let _ = out.extend_from_slice(&counter.to_le_bytes());
    let _ = out.extend_from_slice(&now_ms.to_le_bytes());

    let mut output_states = [0u8; OUTPUT_STATES_LEN];
    for index in 0..MAX_POWER_OUTPUTS.min(OUTPUT_STATES_LEN) {
        let active = store
            .get(ChannelId::power_out(index as u8))
            .map(|c| c.value > 0)
            .unwrap_or(false);
        output_states[index] = active as u8;
    }
    let _ = out.extend_from_slice(&output_states);

    let mut analog = [0u8; ANALOG_READINGS_LEN];
    for index in 0..MAX_ANALOG_INPUTS.min(ANALOG_READINGS_LEN / 2) {
        let value = store
            .get(ChannelId::analog_in(index as u8))
            .map(|c| c.value.clamp(0, u16::MAX as i32) as u16)
            .unwrap_or(0);
        let bytes = value.to_le_bytes();
        analog[index * 2] = bytes[0];
        analog[index * 2 + 1] = bytes[1];
    }
    let _ = out.extend_from_slice(&analog);

    let mut digital_packed = 0u8;
    for index in 0..8 {
        let on = store
            .get(ChannelId::digital_in(index))
            .map(|c| c.value > 0)
            .unwrap_or(false);
        if on {
            digital_packed |= 1 << index;
        }
    }
    let _ = out.push(digital_packed);

    let _ = out.extend_from_slice(&uptime_s.to_le_bytes());

    let virtual_channels: Vec<&crate::channel::Channel, TELEMETRY_MAX_CHANNELS> = store
        .iter()
        .filter(|c| c.direction == Direction::Virtual)
        .take(TELEMETRY_MAX_CHANNELS)
        .collect();
    let _ = out.extend_from_slice(&(virtual_channels.len() as u16).to_le_bytes());
    for channel in virtual_channels {
        let _ = out.extend_from_slice(&channel.id.0.to_le_bytes());
        let _ = out.extend_from_slice(&channel.value.to_le_bytes());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, Format, HardwareClass};

    #[test]
    fn due_respects_period_and_active_flag() {
        assert!(!due(1000, 900, 100, false));
        assert!(!due(1000, 950, 100, true));
        assert!(due(1000, 900, 100, true));
    }

    #[test]
    fn frame_reports_virtual_channels() {
        let mut store = ChannelStore::new();
        let c = Channel::new(
            ChannelId(200),
            "v",
            HardwareClass::Calculated,
            Direction::Virtual,
            Format::Signed,
            -1000,
            1000,
            0,
        );
        store.register(c).unwrap();
        store.update_value(ChannelId(200), 42);

        let frame = build_frame(&store, 7, 123, 9);
        assert_eq!(&frame[0..4], &7u32.to_le_bytes());
        assert_eq!(&frame[4..8], &123u32.to_le_bytes());

        let channel_count_offset = 4 + 4 + OUTPUT_STATES_LEN + ANALOG_READINGS_LEN + 1 + 4;
        let count = u16::from_le_bytes([frame[channel_count_offset], frame[channel_count_offset + 1]]);
        assert_eq!(count, 1);
        let record_offset = channel_count_offset + 2;
        let id = u16::from_le_bytes([frame[record_offset], frame[record_offset + 1]]);
        let value = i32::from_le_bytes(frame[record_offset + 2..record_offset + 6].try_into().unwrap());
        assert_eq!(id, 200);
        assert_eq!(value, 42);
    }
}
