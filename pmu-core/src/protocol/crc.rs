//! Frame CRC32 (spec.md §4.F trailer). spec.md names CRC32 but not a
//! polynomial; this implementation uses CRC-32/ISO-HDLC (the common "zip"
//! CRC, polynomial `0xEDB88320`) via the `crc` crate so a host tool can
//! match it against any off-the-shelf CRC32 implementation (SPEC_FULL.md §2).

use crc::{Crc, CRC_32_ISO_HDLC};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC32 over the frame body: command id, payload length, then payload
/// (spec.md §4.F: "CRC32 over (id, length, payload)").
pub fn frame_crc(cmd: u8, len: u8, payload: &[u8]) -> u32 {
    let mut digest = CRC32.digest();
    digest.update(&[cmd, len]);
    digest.update(payload);
    digest.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(frame_crc(5, 3, &[1, 2, 3]), frame_crc(5, 3, &[1, 2, 3]));
    }

    #[test]
    fn differs_on_payload_change() {
        assert_ne!(frame_crc(5, 3, &[1, 2, 3]), frame_crc(5, 3, &[1, 2, 4]));
    }
}
