//! The hardware adapter contract (spec.md §6). Everything the core needs
//! from the board lives behind this one trait, so the same engine, codec,
//! and dispatcher compile against real STM32 peripherals in `pmu-firmware`
//! and against a plain in-memory double in tests (see `tests/scenarios.rs`).
//!
//! Only implementations of this trait may touch hardware registers; the
//! rest of this crate never does.

/// Pluggable hardware/board adapter. One value of a type implementing this
/// is owned by the main loop and threaded through the tick, exactly like
/// `EngineState` (spec.md §9, "Global mutable state").
pub trait HardwareAdapter {
    /// Monotonic milliseconds since boot. Never decreases.
    fn now_ms(&self) -> u32;

    /// True once the UART TX register can accept another byte.
    fn uart_tx_ready(&mut self) -> bool;
    /// Write one byte to the UART TX register. Caller has checked `uart_tx_ready`.
    fn uart_tx_write(&mut self, byte: u8);
    /// True once the last-written byte has fully left the shift register.
    fn uart_tx_complete(&mut self) -> bool;

    /// True if the UART RX register holds an unread byte.
    fn uart_rx_ready(&mut self) -> bool;
    /// Read (and consume) the byte in the UART RX register.
    fn uart_rx_read(&mut self) -> u8;

    /// Sample a digital input pin by its physical index.
    fn digital_in(&mut self, index: u8) -> bool;
    /// Sample an analog input channel by its physical index; 12-bit right-aligned.
    fn analog_in(&mut self, index: u8) -> u16;

    /// Drive a power output pin on/off.
    fn output_set(&mut self, index: u8, state: bool);
    /// Drive a power output pin's PWM duty, in permille (0..=1000).
    fn output_pwm(&mut self, index: u8, permille: u16);

    /// Erase the dedicated config-storage flash sector.
    fn flash_erase_sector(&mut self) -> bool;
    /// Write one word at a word-aligned address within the config sector.
    fn flash_write_word(&mut self, addr: u32, word: u32) -> bool;
    /// Read `len` bytes starting at `addr` within the config sector.
    fn flash_read(&mut self, addr: u32, out: &mut [u8]);

    /// Reset the hardware watchdog countdown. Must be called at least twice
    /// within any operation that can exceed ~1s (spec.md §5).
    fn watchdog_feed(&mut self);

    /// Reset the MCU. Never returns.
    fn system_reset(&mut self) -> !;
}
