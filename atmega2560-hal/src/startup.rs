//! # Bootstrap
//!
//! Brings up the serial console and the logger. Diagnostics emitted before [init] was called
//! are lost.
use atmega2560::usart::MmioUsart;
use log::LevelFilter;

use crate::{
    clocks::Clocks,
    log::usart_blocking,
    usart::{BaudRateError, Usart},
};

/// Baud rate of the serial console.
pub const CONSOLE_BAUD: u32 = 9600;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub baud: u32,
    pub log_level: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            baud: CONSOLE_BAUD,
            log_level: LevelFilter::Info,
        }
    }
}

/// Configure the console USART, install the blocking logger and print the startup banner.
///
/// Usually called with USART0, which is connected to the USB serial converter on Arduino
/// Mega boards:
///
/// ```ignore
/// let usart = unsafe { atmega2560::usart::Usart::new_mmio_fixed_0() };
/// atmega2560_hal::startup::init(usart, &Clocks::default(), Config::default())?;
/// ```
pub fn init(
    usart: MmioUsart<'static>,
    clocks: &Clocks,
    config: Config,
) -> Result<(), BaudRateError> {
    let usart = Usart::new(usart, clocks, config.baud)?;
    usart_blocking::init_with_locks(usart, config.log_level);
    log::info!("Starting with serial baud rate {}", config.baud);
    Ok(())
}
