//! Clock module.
//!
//! The ATmega2560 runs its timer/counter and USART prescalers from the I/O clock, which is
//! the core clock unless the system clock prescaler is used.
use super::time::Hertz;

/// Core clock of an Arduino Mega 2560 board.
pub const DEFAULT_CPU_CLK: Hertz = Hertz::MHz(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clocks {
    cpu_clk: Hertz,
    io_clk: Hertz,
}

impl Clocks {
    /// Clock configuration for an undivided system clock.
    pub const fn new(cpu_clk: Hertz) -> Self {
        Self {
            cpu_clk,
            io_clk: cpu_clk,
        }
    }

    /// Clock configuration for a system clock divided by the CLKPR prescaler.
    ///
    /// Returns [None] if the divisor is not one of the powers of two from 1 to 256 which the
    /// prescaler supports.
    pub const fn new_with_system_prescaler(oscillator: Hertz, divisor: u32) -> Option<Self> {
        if !divisor.is_power_of_two() || divisor > 256 {
            return None;
        }
        let clk = Hertz::from_raw(oscillator.raw() / divisor);
        Some(Self {
            cpu_clk: clk,
            io_clk: clk,
        })
    }

    pub const fn cpu_clk(&self) -> Hertz {
        self.cpu_clk
    }

    /// Clock feeding the timer/counter and USART prescalers.
    pub const fn io_clk(&self) -> Hertz {
        self.io_clk
    }
}

impl Default for Clocks {
    fn default() -> Self {
        Self::new(DEFAULT_CPU_CLK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_16_mhz() {
        let clocks = Clocks::default();
        assert_eq!(clocks.cpu_clk().raw(), 16_000_000);
        assert_eq!(clocks.io_clk(), clocks.cpu_clk());
    }

    #[test]
    fn system_prescaler() {
        let clocks = Clocks::new_with_system_prescaler(Hertz::MHz(16), 8).unwrap();
        assert_eq!(clocks.cpu_clk().raw(), 2_000_000);
        assert!(Clocks::new_with_system_prescaler(Hertz::MHz(16), 3).is_none());
        assert!(Clocks::new_with_system_prescaler(Hertz::MHz(16), 512).is_none());
    }
}
