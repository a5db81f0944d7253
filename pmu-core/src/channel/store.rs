//! Fixed-capacity keyed channel table (spec.md §4.B). Capacity is a
//! compile-time constant so the binary's footprint is predictable and
//! loading an oversize config fails instead of growing the table
//! (spec.md §8 invariant 4).

use super::{Channel, ChannelId};
use crate::limits::MAX_CHANNELS;

pub struct ChannelStore {
    slots: [Option<Channel>; MAX_CHANNELS],
    len: usize,
}

impl Default for ChannelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelStore {
    pub const fn new() -> Self {
        const NONE: Option<Channel> = None;
        ChannelStore {
            slots: [NONE; MAX_CHANNELS],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        MAX_CHANNELS
    }

    /// Register a new channel, or overwrite an existing entry with the same
    /// id (last-writer-wins, spec.md §4.C). Fails if the store is full and
    /// the id is new.
    pub fn register(&mut self, channel: Channel) -> Result<(), Channel> {
        if let Some(slot) = self.slot_mut(channel.id) {
            *slot = channel;
            return Ok(());
        }
        for slot in self.slots.iter_mut() {
            if slot.is_none() {
                *slot = Some(channel);
                self.len += 1;
                return Ok(());
            }
        }
        Err(channel)
    }

    fn slot_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|channel| channel.id == id)
    }

    pub fn get(&self, id: ChannelId) -> Option<&Channel> {
        self.slots.iter().flatten().find(|channel| channel.id == id)
    }

    pub fn get_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.slot_mut(id)
    }

    /// Name lookup: decoder-time resolution and diagnostics only, never on
    /// the per-tick path (spec.md §4.B).
    pub fn find_by_name(&self, name: &str) -> Option<&Channel> {
        self.slots
            .iter()
            .flatten()
            .find(|channel| channel.name() == name)
    }

    /// Clamp-and-snap a value into a channel (spec.md §4.B). No-op if the
    /// id isn't present.
    pub fn update_value(&mut self, id: ChannelId, value: i32) {
        if let Some(channel) = self.slot_mut(id) {
            channel.set_value(value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.slots.iter().flatten()
    }

    pub fn iter_enabled(&self) -> impl Iterator<Item = &Channel> {
        self.iter().filter(|channel| channel.enabled)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.slots.iter_mut().flatten()
    }

    /// Remove every virtual channel (spec.md §4.C step 1, "Clear all virtual
    /// channels"). Physical channels, created once at boot, are untouched.
    pub fn clear_virtual(&mut self) {
        for slot in self.slots.iter_mut() {
            let is_virtual = matches!(slot, Some(channel) if channel.direction == super::Direction::Virtual);
            if is_virtual {
                *slot = None;
                self.len -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Direction, Format, HardwareClass};

    fn mk(id: u16, value: i32) -> Channel {
        let mut c = Channel::new(
            ChannelId(id),
            "x",
            HardwareClass::Calculated,
            Direction::Virtual,
            Format::Signed,
            -1000,
            1000,
            0,
        );
        c.set_value(value);
        c
    }

    #[test]
    fn register_and_lookup() {
        let mut store = ChannelStore::new();
        store.register(mk(200, 42)).unwrap();
        assert_eq!(store.get(ChannelId(200)).unwrap().value, 42);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn last_writer_wins() {
        let mut store = ChannelStore::new();
        store.register(mk(200, 1)).unwrap();
        store.register(mk(200, 2)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(ChannelId(200)).unwrap().value, 2);
    }

    #[test]
    fn update_value_clamps() {
        let mut store = ChannelStore::new();
        store.register(mk(200, 0)).unwrap();
        store.update_value(ChannelId(200), 5000);
        assert_eq!(store.get(ChannelId(200)).unwrap().value, 1000);
    }

    #[test]
    fn boolean_snaps() {
        let mut store = ChannelStore::new();
        let c = Channel::new(
            ChannelId(201),
            "b",
            HardwareClass::Calculated,
            Direction::Virtual,
            Format::Boolean,
            0,
            1000,
            0,
        );
        store.register(c).unwrap();
        store.update_value(ChannelId(201), 7);
        assert_eq!(store.get(ChannelId(201)).unwrap().value, 1000);
        store.update_value(ChannelId(201), 0);
        assert_eq!(store.get(ChannelId(201)).unwrap().value, 0);
    }

    #[test]
    fn clear_virtual_keeps_physical() {
        let mut store = ChannelStore::new();
        store.register(mk(200, 1)).unwrap();
        let phys = Channel::new(
            ChannelId::digital_in(0),
            "din0",
            HardwareClass::InputSwitch,
            Direction::PhysicalIn,
            Format::Boolean,
            0,
            1000,
            0,
        );
        store.register(phys).unwrap();
        store.clear_virtual();
        assert_eq!(store.len(), 1);
        assert!(store.get(ChannelId::digital_in(0)).is_some());
    }

    #[test]
    fn full_store_rejects_new_id() {
        let mut store = ChannelStore::new();
        for i in 0..MAX_CHANNELS {
            store.register(mk(1000 + i as u16, 0)).unwrap();
        }
        assert!(store.register(mk(9999, 0)).is_err());
    }
}
