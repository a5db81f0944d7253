//! Flash config store (spec.md §4.I): atomic write of a config blob plus an
//! integrity header into a dedicated flash sector, verified on read.

use crate::error::FlashError;
use crate::hal::HardwareAdapter;
use crate::limits::MAX_CONFIG_BLOB_LEN;

const MAGIC: u32 = 0x504D_5531; // "PMU1"
const HEADER_LEN: usize = 4 + 2 + 2; // magic:u32, size:u16, crc16:u16

/// CRC16/CCITT-FALSE, chosen to keep the flash header self-contained and
/// cheap — the frame codec's CRC32 (`protocol::crc`) is a different,
/// heavier check over a much larger unit (a whole frame) and isn't reused
/// here to avoid pulling protocol-layer code into the persistence layer.
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Persist `blob` into the config-storage flash sector (spec.md §4.I: "feed
/// watchdog; unlock; erase sector; feed watchdog; write header then payload
/// word-by-word; lock").
pub fn save<H: HardwareAdapter>(hal: &mut H, blob: &[u8]) -> Result<(), FlashError> {
    if blob.len() > MAX_CONFIG_BLOB_LEN {
        return Err(FlashError::SizeOutOfRange);
    }

    hal.watchdog_feed();
    if !hal.flash_erase_sector() {
        return Err(FlashError::WriteFailed);
    }
    hal.watchdog_feed();

    let crc = crc16(blob);
    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    header[4..6].copy_from_slice(&(blob.len() as u16).to_le_bytes());
    header[6..8].copy_from_slice(&crc.to_le_bytes());

    write_words(hal, 0, &header)?;
    write_words(hal, HEADER_LEN as u32, blob)?;
    Ok(())
}

fn write_words<H: HardwareAdapter>(hal: &mut H, base_addr: u32, data: &[u8]) -> Result<(), FlashError> {
    let mut addr = base_addr;
    let mut chunks = data.chunks(4);
    for chunk in &mut chunks {
        let mut word_bytes = [0u8; 4];
        word_bytes[..chunk.len()].copy_from_slice(chunk);
        let word = u32::from_le_bytes(word_bytes);
        if !hal.flash_write_word(addr, word) {
            return Err(FlashError::WriteFailed);
        }
        addr += 4;
    }
    Ok(())
}

/// Read and validate the stored blob into `out`, returning the number of
/// bytes written. Returns an error — never a partial/garbage blob — on any
/// integrity failure (spec.md §4.I: "report failure and do not activate").
pub fn load<'a, H: HardwareAdapter>(
    hal: &mut H,
    out: &'a mut [u8; MAX_CONFIG_BLOB_LEN],
) -> Result<&'a [u8], FlashError> {
    let mut header = [0u8; HEADER_LEN];
    hal.flash_read(0, &mut header);

    let magic = u32::from_le_bytes(header[0..4].try_into().unwrap());
    if magic != MAGIC {
        return Err(FlashError::Empty);
    }
    let size = u16::from_le_bytes(header[4..6].try_into().unwrap()) as usize;
    if size > MAX_CONFIG_BLOB_LEN {
        return Err(FlashError::SizeOutOfRange);
    }
    let stored_crc = u16::from_le_bytes(header[6..8].try_into().unwrap());

    hal.flash_read(HEADER_LEN as u32, &mut out[..size]);
    if crc16(&out[..size]) != stored_crc {
        return Err(FlashError::CrcMismatch);
    }

    Ok(&out[..size])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::MAX_CHANNELS;

    struct MockFlash {
        sector: [u8; 4096],
        erased: bool,
    }

    impl MockFlash {
        fn new() -> Self {
            MockFlash { sector: [0xFF; 4096], erased: false }
        }
    }

    impl HardwareAdapter for MockFlash {
        fn now_ms(&self) -> u32 {
            0
        }
        fn uart_tx_ready(&mut self) -> bool {
            true
        }
        fn uart_tx_write(&mut self, _byte: u8) {}
        fn uart_tx_complete(&mut self) -> bool {
            true
        }
        fn uart_rx_ready(&mut self) -> bool {
            false
        }
        fn uart_rx_read(&mut self) -> u8 {
            0
        }
        fn digital_in(&mut self, _index: u8) -> bool {
            false
        }
        fn analog_in(&mut self, _index: u8) -> u16 {
            0
        }
        fn output_set(&mut self, _index: u8, _state: bool) {}
        fn output_pwm(&mut self, _index: u8, _permille: u16) {}
        fn flash_erase_sector(&mut self) -> bool {
            self.sector = [0xFF; 4096];
            self.erased = true;
            true
        }
        fn flash_write_word(&mut self, addr: u32, word: u32) -> bool {
            let addr = addr as usize;
            self.sector[addr..addr + 4].copy_from_slice(&word.to_le_bytes());
            true
        }
        fn flash_read(&mut self, addr: u32, out: &mut [u8]) {
            let addr = addr as usize;
            out.copy_from_slice(&self.sector[addr..addr + out.len()]);
        }
        fn watchdog_feed(&mut self) {}
        fn system_reset(&mut self) -> ! {
            panic!("mock reset")
        }
    }

    #[test]
    fn round_trips_a_blob() {
        let _ = MAX_CHANNELS;
        let mut hal = MockFlash::new();
        let blob = [1u8, 2, 3, 4, 5, 6, 7];
        save(&mut hal, &blob).unwrap();

        let mut out = [0u8; MAX_CONFIG_BLOB_LEN];
        let loaded = load(&mut hal, &mut out).unwrap();
        assert_eq!(loaded, &blob);
    }

    #[test]
    fn blank_sector_is_empty() {
        let mut hal = MockFlash::new();
        let mut out = [0u8; MAX_CONFIG_BLOB_LEN];
        assert_eq!(load(&mut hal, &mut out).unwrap_err(), FlashError::Empty);
    }

    #[test]
    fn corrupted_payload_fails_crc() {
        let mut hal = MockFlash::new();
        let blob = [9u8; 16];
        save(&mut hal, &blob).unwrap();
        hal.sector[HEADER_LEN] ^= 0xFF;

        let mut out = [0u8; MAX_CONFIG_BLOB_LEN];
        assert_eq!(load(&mut hal, &mut out).unwrap_err(), FlashError::CrcMismatch);
    }
}
