//! Concrete `HardwareAdapter` for the PMU board: wraps the peripherals
//! `init` hands us and pokes their registers directly for the polled
//! send/receive/sample/drive operations the core crate needs every loop
//! iteration.

use cfg_if::cfg_if;

use hal::{adc::Adc, flash::Flash, gpio::Pin, pac, timer::Timer, usart::Usart};

use pmu_core::limits::{MAX_ANALOG_INPUTS, MAX_DIGITAL_INPUTS, MAX_POWER_OUTPUTS};
use pmu_core::HardwareAdapter;

cfg_if! {
    if #[cfg(feature = "h7")] {
        pub use pac::{ADC1 as ADC, USART2 as UART_HOST};
    } else {
        pub use pac::{ADC2 as ADC, USART1 as UART_HOST};
    }
}

// One flash sector/page reserved for the config blob, well clear of the
// firmware image. Chosen the way the teacher reserves a trailing sector
// for its own config/waypoint stores (main.rs FLASH_CFG_SECTOR).
cfg_if! {
    if #[cfg(feature = "h7")] {
        pub const FLASH_CFG_SECTOR: u8 = 7;
        // H7: 128KB sectors starting at 0x0800_0000.
        const FLASH_CFG_BASE: u32 = 0x0800_0000 + 7 * 128 * 1024;
    } else {
        pub const FLASH_CFG_PAGE: u8 = 127;
        // G4 single-bank mode: 4KB pages starting at 0x0800_0000.
        const FLASH_CFG_BASE: u32 = 0x0800_0000 + 127 * 4 * 1024;
    }
}

pub struct Board {
    uart: Usart<UART_HOST>,
    adc: Adc<ADC>,
    flash: Flash,
    ms_timer: Timer<pac::TIM5>,
    digital_in: [Pin; MAX_DIGITAL_INPUTS],
    analog_in: [u8; MAX_ANALOG_INPUTS],
    power_out: [Pin; MAX_POWER_OUTPUTS],
}

impl Board {
    pub fn new(
        uart: Usart<UART_HOST>,
        adc: Adc<ADC>,
        flash: Flash,
        ms_timer: Timer<pac::TIM5>,
        digital_in: [Pin; MAX_DIGITAL_INPUTS],
        analog_in: [u8; MAX_ANALOG_INPUTS],
        power_out: [Pin; MAX_POWER_OUTPUTS],
    ) -> Self {
        Self { uart, adc, flash, ms_timer, digital_in, analog_in, power_out }
    }
}

impl HardwareAdapter for Board {
    fn now_ms(&self) -> u32 {
        // `ms_timer` free-runs at 1kHz; its counter register is the
        // uptime clock the rest of the firmware reads timestamps from.
        self.ms_timer.read_count()
    }

    fn uart_tx_ready(&mut self) -> bool {
        self.uart.regs.isr.read().txe().bit_is_set()
    }

    fn uart_tx_write(&mut self, byte: u8) {
        self.uart.regs.tdr.write(|w| unsafe { w.tdr().bits(byte as u16) });
    }

    fn uart_tx_complete(&mut self) -> bool {
        self.uart.regs.isr.read().tc().bit_is_set()
    }

    fn uart_rx_ready(&mut self) -> bool {
        self.uart.regs.isr.read().rxne().bit_is_set()
    }

    fn uart_rx_read(&mut self) -> u8 {
        self.uart.regs.rdr.read().rdr().bits() as u8
    }

    fn digital_in(&mut self, index: u8) -> bool {
        self.digital_in[index as usize].is_high()
    }

    fn analog_in(&mut self, index: u8) -> u16 {
        let channel = self.analog_in[index as usize];
        self.adc.read(channel).unwrap_or(0)
    }

    fn output_set(&mut self, index: u8, state: bool) {
        if state {
            self.power_out[index as usize].set_high();
        } else {
            self.power_out[index as usize].set_low();
        }
    }

    fn output_pwm(&mut self, _index: u8, _permille: u16) {
        // Power outputs on this board are on/off switches (MOSFET-driven
        // rails), not PWM-capable channels; duty fades are not wired up.
    }

    fn flash_erase_sector(&mut self) -> bool {
        cfg_if! {
            if #[cfg(feature = "h7")] {
                self.flash.erase_sector(FLASH_CFG_SECTOR).is_ok()
            } else {
                self.flash.erase_page(FLASH_CFG_PAGE).is_ok()
            }
        }
    }

    fn flash_write_word(&mut self, addr: u32, word: u32) -> bool {
        self.flash.write(FLASH_CFG_BASE + addr, &word.to_le_bytes()).is_ok()
    }

    fn flash_read(&mut self, addr: u32, out: &mut [u8]) {
        let base = (FLASH_CFG_BASE + addr) as *const u8;
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = unsafe { core::ptr::read_volatile(base.add(i)) };
        }
    }

    fn watchdog_feed(&mut self) {
        unsafe {
            (*pac::IWDG::ptr()).kr.write(|w| w.bits(0xAAAA));
        }
    }

    fn system_reset(&mut self) -> ! {
        cortex_m::peripheral::SCB::sys_reset();
    }
}
