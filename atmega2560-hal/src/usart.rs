//! # USART driver
//!
//! Blocking asynchronous USART which is used for the serial console and the logger. The frame
//! format is fixed to 8 data bits, no parity and one stop bit.
use core::convert::Infallible;

use atmega2560::usart::{ControlB, ControlC, MmioUsart, StatusA};
use libm::roundf;

use crate::{clocks::Clocks, time::Hertz};

/// UBRRn is a 12-bit register.
pub const MAX_UBRR: u16 = 0x0FFF;

/// Largest baud rate error in percent which is accepted by [calculate_baud_config].
pub const MAX_BAUD_ERROR_PERCENT: f32 = 2.5;

#[derive(Debug, thiserror::Error)]
pub enum BaudRateError {
    #[error("divisor is zero")]
    DivisorZero,
    #[error("baud rate can not be generated from the I/O clock")]
    OutOfRange,
    #[error("smallest baud rate error is {0} %")]
    ErrorTooLarge(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaudConfig {
    ubrr: u16,
    double_speed: bool,
}

impl BaudConfig {
    #[inline]
    pub const fn new(ubrr: u16, double_speed: bool) -> Result<Self, BaudRateError> {
        if ubrr > MAX_UBRR {
            return Err(BaudRateError::OutOfRange);
        }
        Ok(Self { ubrr, double_speed })
    }

    #[inline]
    pub const fn ubrr(&self) -> u16 {
        self.ubrr
    }

    #[inline]
    pub const fn double_speed(&self) -> bool {
        self.double_speed
    }

    #[inline]
    const fn samples(&self) -> u32 {
        if self.double_speed { 8 } else { 16 }
    }

    pub fn actual_baud(&self, io_clk: Hertz) -> f32 {
        io_clk.raw() as f32 / (self.samples() * (self.ubrr as u32 + 1)) as f32
    }
}

/// Calculate the baud configuration with the smallest error for the target baud rate.
///
/// Returns the configuration and the associated error in percent. Normal speed is preferred
/// if both speeds reach the same error, because it samples each bit more often.
pub fn calculate_baud_config(
    io_clk: Hertz,
    target_baud: u32,
) -> Result<(BaudConfig, f32), BaudRateError> {
    if target_baud == 0 {
        return Err(BaudRateError::DivisorZero);
    }
    let mut best: Option<(BaudConfig, f32)> = None;
    for double_speed in [false, true] {
        let samples = if double_speed { 8.0 } else { 16.0 };
        let ubrr = roundf(io_clk.raw() as f32 / (samples * target_baud as f32)) - 1.0;
        if !(0.0..=MAX_UBRR as f32).contains(&ubrr) {
            continue;
        }
        let config = BaudConfig {
            ubrr: ubrr as u16,
            double_speed,
        };
        let baud = config.actual_baud(io_clk);
        let error = ((baud - target_baud as f32) / target_baud as f32).abs() * 100.0;
        if best.is_none_or(|(_, smallest)| error < smallest) {
            best = Some((config, error));
        }
    }
    match best {
        Some((config, error)) if error <= MAX_BAUD_ERROR_PERCENT => Ok((config, error)),
        Some((_, error)) => Err(BaudRateError::ErrorTooLarge(error)),
        None => Err(BaudRateError::OutOfRange),
    }
}

/// Blocking USART driver.
pub struct Usart {
    regs: MmioUsart<'static>,
    tx_pending: bool,
}

impl Usart {
    /// Configure the USART for 8N1 frames at the given baud rate and enable the transmitter
    /// and the receiver.
    pub fn new(
        regs: MmioUsart<'static>,
        clocks: &Clocks,
        baud: u32,
    ) -> Result<Self, BaudRateError> {
        let (config, _error) = calculate_baud_config(clocks.io_clk(), baud)?;
        Ok(Self::new_with_baud_config(regs, config))
    }

    pub fn new_with_baud_config(mut regs: MmioUsart<'static>, config: BaudConfig) -> Self {
        regs.write_ctrl_b(ControlB::DEFAULT);
        regs.write_baud_high((config.ubrr >> 8) as u8);
        regs.write_baud_low(config.ubrr as u8);
        regs.write_status_a(
            StatusA::DEFAULT
                .with_tx_complete(true)
                .with_double_speed(config.double_speed),
        );
        regs.write_ctrl_c(ControlC::DEFAULT);
        regs.write_ctrl_b(
            ControlB::DEFAULT
                .with_tx_enable(true)
                .with_rx_enable(true),
        );
        Self {
            regs,
            tx_pending: false,
        }
    }

    pub fn write_byte_blocking(&mut self, byte: u8) {
        nb::block!(embedded_hal_nb::serial::Write::write(self, byte))
            .unwrap_or_else(|e| match e {});
    }

    pub fn flush_blocking(&mut self) {
        nb::block!(embedded_hal_nb::serial::Write::flush(self))
            .unwrap_or_else(|e| match e {});
    }
}

impl embedded_hal_nb::serial::ErrorType for Usart {
    type Error = Infallible;
}

impl embedded_hal_nb::serial::Write<u8> for Usart {
    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        if !self.regs.read_status_a().data_register_empty() {
            return Err(nb::Error::WouldBlock);
        }
        self.regs.write_data(word);
        self.tx_pending = true;
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        if !self.tx_pending {
            return Ok(());
        }
        let status = self.regs.read_status_a();
        if !status.tx_complete() {
            return Err(nb::Error::WouldBlock);
        }
        // Clear the TX complete flag by writing a one to it.
        self.regs.write_status_a(status.with_tx_complete(true));
        self.tx_pending = false;
        Ok(())
    }
}

impl embedded_io::ErrorType for Usart {
    type Error = Infallible;
}

impl embedded_io::Write for Usart {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for &byte in buf {
            self.write_byte_blocking(byte);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.flush_blocking();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::abs_diff_eq;

    const IO_CLK: Hertz = Hertz::from_raw(16_000_000);

    #[test]
    fn baud_9600_uses_normal_speed() {
        let (config, error) = calculate_baud_config(IO_CLK, 9600).unwrap();
        assert_eq!(config.ubrr(), 103);
        assert!(!config.double_speed());
        assert!(abs_diff_eq!(config.actual_baud(IO_CLK), 9615.385, epsilon = 0.01));
        assert!(abs_diff_eq!(error, 0.16, epsilon = 0.01));
    }

    #[test]
    fn baud_115200_uses_double_speed() {
        let (config, error) = calculate_baud_config(IO_CLK, 115_200).unwrap();
        assert_eq!(config.ubrr(), 16);
        assert!(config.double_speed());
        assert!(abs_diff_eq!(config.actual_baud(IO_CLK), 117_647.06, epsilon = 0.1));
        assert!(error < MAX_BAUD_ERROR_PERCENT);
    }

    #[test]
    fn baud_zero() {
        assert!(matches!(
            calculate_baud_config(IO_CLK, 0),
            Err(BaudRateError::DivisorZero)
        ));
    }

    #[test]
    fn baud_too_slow() {
        assert!(matches!(
            calculate_baud_config(IO_CLK, 50),
            Err(BaudRateError::OutOfRange)
        ));
    }

    #[test]
    fn baud_too_fast() {
        // UBRR 0 gives 1 Mbaud or 2 Mbaud.
        assert!(matches!(
            calculate_baud_config(IO_CLK, 1_500_000),
            Err(BaudRateError::ErrorTooLarge(_))
        ));
    }

    #[test]
    fn config_range() {
        assert!(BaudConfig::new(MAX_UBRR, false).is_ok());
        assert!(BaudConfig::new(MAX_UBRR + 1, true).is_err());
    }
}
