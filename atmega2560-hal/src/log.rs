//! # Simple logging providers
//!
//! The diagnostics of this crate are emitted through the [log](https://docs.rs/log) facade.
//! Install one of the loggers below before using the drivers, or use [crate::startup::init]
//! which does this.

/// Blocking USART logger.
pub mod usart_blocking {
    use core::cell::{Cell, RefCell};
    use embedded_io::Write as _;

    use critical_section::Mutex;
    use log::{LevelFilter, Log};

    use crate::usart::Usart;

    pub struct UsartLoggerBlocking(Mutex<RefCell<Option<Usart>>>);

    unsafe impl Send for UsartLoggerBlocking {}
    unsafe impl Sync for UsartLoggerBlocking {}

    static USART_LOGGER_BLOCKING: UsartLoggerBlocking =
        UsartLoggerBlocking(Mutex::new(RefCell::new(None)));

    static LOGGER_INIT_DONE: Mutex<Cell<bool>> = Mutex::new(Cell::new(false));

    /// Initialize the logger with a blocking USART instance.
    ///
    /// This is a blocking logger which performs a write inside a critical section. Interrupts
    /// stay disabled while a record is transmitted, which postpones the timer interrupts by
    /// roughly one millisecond per character at 9600 baud.
    ///
    /// Only the first call installs the logger.
    pub fn init_with_locks(usart: Usart, level: LevelFilter) {
        critical_section::with(|cs| {
            if LOGGER_INIT_DONE.borrow(cs).replace(true) {
                return;
            }
            USART_LOGGER_BLOCKING.0.borrow(cs).replace(Some(usart));
            // AVR has no compare-and-swap. The init flag above serializes the installation.
            unsafe {
                if log::set_logger_racy(&USART_LOGGER_BLOCKING).is_err() {
                    return;
                }
                log::set_max_level_racy(level);
            }
        });
    }

    impl Log for UsartLoggerBlocking {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            critical_section::with(|cs| {
                let mut opt_usart = self.0.borrow(cs).borrow_mut();
                if let Some(usart) = opt_usart.as_mut() {
                    let _ = writeln!(usart, "{} - {}\r", record.level(), record.args());
                }
            })
        }

        fn flush(&self) {
            critical_section::with(|cs| {
                let mut opt_usart = self.0.borrow(cs).borrow_mut();
                if let Some(usart) = opt_usart.as_mut() {
                    usart.flush_blocking();
                }
            });
        }
    }
}
