#![no_main]
#![no_std]

use defmt_rtt as _;
use panic_probe as _;

mod board;
mod setup;

#[rtic::app(device = hal::pac, peripherals = false)]
mod app {
    use hal::pac;
    use hal::timer::{Timer, TimerInterrupt};
    use pmu_core::EngineState;

    use super::board::Board;
    use super::setup;

    #[shared]
    struct Shared {
        board: Board,
        state: EngineState,
        boot_ms: u32,
    }

    #[local]
    struct Local {
        tick_timer: Timer<pac::TIM15>,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        let mut cp = cx.core;
        let dp = pac::Peripherals::take().unwrap();

        cp.SCB.enable_icache();

        let clock_cfg = setup::clock_cfg();
        clock_cfg.setup().unwrap();

        let (mut board, tick_timer) = setup::setup_board(dp, &clock_cfg);

        let mut state = EngineState::new();
        state.boot_load_from_flash(&mut board);

        (
            Shared { board, state, boot_ms: 0 },
            Local { tick_timer },
            init::Monotonics(),
        )
    }

    #[idle(shared = [board])]
    fn idle(mut cx: idle::Context) -> ! {
        loop {
            cx.shared.board.lock(|board| board.watchdog_feed());
            cortex_m::asm::wfi();
        }
    }

    // Drains and dispatches one inbound wire-protocol frame per interrupt,
    // so host commands get a response without waiting for the next tick.
    // Bound per board variant since the host UART sits on a different
    // peripheral per MCU family (`board::UART_HOST`).
    #[cfg(feature = "h7")]
    #[task(binds = USART2, shared = [board, state], priority = 2)]
    fn on_uart_rx(cx: on_uart_rx::Context) {
        on_uart_rx_impl(cx.shared.board, cx.shared.state);
    }

    #[cfg(feature = "g4")]
    #[task(binds = USART1, shared = [board, state], priority = 2)]
    fn on_uart_rx(cx: on_uart_rx::Context) {
        on_uart_rx_impl(cx.shared.board, cx.shared.state);
    }

    fn on_uart_rx_impl(
        mut board: impl rtic::Mutex<T = Board>,
        mut state: impl rtic::Mutex<T = EngineState>,
    ) {
        board.lock(|board| state.lock(|state| state.poll_protocol(board)));
    }

    // Control tick: sample inputs, run the engine, drive outputs, emit
    // telemetry if due (spec.md §5, nominal 1 kHz).
    #[task(binds = TIM1_BRK_TIM15, shared = [board, state, boot_ms], local = [tick_timer], priority = 1)]
    fn on_tick(mut cx: on_tick::Context) {
        cx.local.tick_timer.clear_interrupt(TimerInterrupt::Update);

        (cx.shared.board, cx.shared.state, cx.shared.boot_ms).lock(|board, state, boot_ms| {
            let now = board.now_ms();
            if *boot_ms == 0 {
                *boot_ms = now;
            }
            let uptime_s = now.wrapping_sub(*boot_ms) / 1_000;
            state.tick(board, now, uptime_s);
        });
    }
}
