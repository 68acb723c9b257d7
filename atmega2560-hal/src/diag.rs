//! # Diagnostics
//!
//! Misuse of the drivers is reported with one of three severities:
//!
//! - [Severity::Warning]: the operation proceeds, the report documents a risk.
//! - [Severity::Critical]: the operation proceeds or falls back to a default, the report
//!   documents a misuse.
//! - [Severity::Fatal]: the system halts permanently. [fatal] never returns.
//!
//! Reports are emitted through the [log](https://docs.rs/log) facade and prefixed with the
//! severity tag. Nothing is printed until a logger is installed, see [crate::startup::init].
//!
//! Do not rely on reports from interrupt context. The blocking logger keeps interrupts
//! disabled for the whole transmission.
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Critical,
    Fatal,
}

impl Severity {
    pub const fn tag(self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
            Severity::Fatal => "FATAL",
        }
    }

    pub const fn level(self) -> ::log::Level {
        match self {
            Severity::Warning => ::log::Level::Warn,
            Severity::Critical | Severity::Fatal => ::log::Level::Error,
        }
    }
}

pub fn report(severity: Severity, args: fmt::Arguments<'_>) {
    ::log::log!(severity.level(), "{}: {}", severity.tag(), args);
}

#[inline]
pub fn warning(args: fmt::Arguments<'_>) {
    report(Severity::Warning, args);
}

#[inline]
pub fn critical(args: fmt::Arguments<'_>) {
    report(Severity::Critical, args);
}

/// Report a fatal error and halt.
///
/// The logger is flushed before halting so the report reaches the console.
pub fn fatal(args: fmt::Arguments<'_>) -> ! {
    report(Severity::Fatal, args);
    ::log::logger().flush();
    halt(args)
}

#[cfg(target_arch = "avr")]
fn halt(_args: fmt::Arguments<'_>) -> ! {
    avr_device::interrupt::disable();
    loop {
        avr_device::asm::nop();
    }
}

// Host builds only exist for the unit tests, where halting has to be observable.
#[cfg(not(target_arch = "avr"))]
fn halt(args: fmt::Arguments<'_>) -> ! {
    panic!("{}: {}", Severity::Fatal.tag(), args)
}

macro_rules! warning {
    ($($arg:tt)+) => {
        $crate::diag::warning(format_args!($($arg)+))
    };
}

macro_rules! critical {
    ($($arg:tt)+) => {
        $crate::diag::critical(format_args!($($arg)+))
    };
}

macro_rules! fatal {
    ($($arg:tt)+) => {
        $crate::diag::fatal(format_args!($($arg)+))
    };
}
