//! # Timer/counter drivers
//!
//! The ATmega2560 has six timer/counter units:
//!
//! | Unit | Driver    | Counter | Clock            | Notes                                   |
//! |------|-----------|---------|------------------|-----------------------------------------|
//! | TC0  | [Timer0]  | 8 bit   | [SyncClock]      | overflow reserved for timekeeping       |
//! | TC1  | [Timer1]  | 16 bit  | [SyncClock]      |                                         |
//! | TC2  | [Timer2]  | 8 bit   | [AsyncClock]     | tone generation, asynchronous clocking  |
//! | TC3  | [Timer3]  | 16 bit  | [SyncClock]      |                                         |
//! | TC4  | [Timer4]  | 16 bit  | [SyncClock]      |                                         |
//! | TC5  | [Timer5]  | 16 bit  | [SyncClock]      |                                         |
//!
//! Each unit can be owned by exactly one driver at a time. [Timer8::take] and
//! [Timer16::take] return [TimerTakenError] if the unit is already owned. Dropping a driver
//! deactivates the unit and releases it.
//!
//! All drivers implement the [Timer] trait. Its associated types restrict every driver to the
//! channels, interrupt sources, waveform modes and clock selectors its unit has, so for
//! example channel C can not be used on an 8-bit unit.
//!
//! ## Delays
//!
//! - [Timer::blocking_delay] spins with interrupts disabled until the delay elapsed.
//! - [Timer::start_async_delay] returns immediately. The delay completes inside the compare
//!   match interrupt of the selected channel, which then invokes the callback registered for
//!   that channel. Completion can be polled with [Timer::is_async_delay_finished].
//!
//! Both save the registers of the unit before reprogramming it and restore them when the delay
//! is over. The asynchronous delay needs the compare match vectors of this crate, which are
//! defined when the `rt` feature is enabled. Otherwise call [on_compare_match_interrupt] from
//! the application's vectors.
//!
//! ## Prescaler synchronization
//!
//! The functions in [sync] reset the prescalers or hold all of them in reset, for example to
//! start several timers in lockstep.
use arbitrary_int::u3;
use atmega2560::tc::InterruptBits;

mod common;
mod delay;
mod regs;
pub mod sync;
mod tc16;
mod tc8;
mod unit;

#[cfg(test)]
pub(crate) mod sim;

pub use atmega2560::tc::{CompareOutputMode, TimerId};
pub use atmega2560::tc16::CaptureEdge;
pub use delay::{AsyncPlan, Split, split_ticks, ticks};
pub use regs::{
    AsyncStatusRegisters, RegisterSnapshot, Registers8, Registers16, TimerRegisters,
};
pub use tc8::{AsyncClockInput, BusyFlag, Timer0, Timer2, Timer8, WaveformMode8};
pub use tc16::{Timer1, Timer3, Timer4, Timer5, Timer16, WaveformMode16};
pub use unit::{
    Tc0, Tc1, Tc2, Tc3, Tc4, Tc5, TimerUnit, UnitSlot, on_compare_match_interrupt,
    on_input_capture_interrupt, on_overflow_interrupt,
};

#[derive(Debug, thiserror::Error)]
#[error("{0} is already owned by another driver")]
pub struct TimerTakenError(pub &'static str);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    #[default]
    Milliseconds,
    Microseconds,
}

impl TimeUnit {
    #[inline]
    pub const fn to_micros(self, value: u32) -> u64 {
        match self {
            TimeUnit::Seconds => value as u64 * 1_000_000,
            TimeUnit::Milliseconds => value as u64 * 1_000,
            TimeUnit::Microseconds => value as u64,
        }
    }
}

/// Output compare channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    A = 0,
    B = 1,
    /// 16-bit units only.
    C = 2,
}

impl Channel {
    #[inline]
    pub const fn interrupt(self) -> Interrupt16 {
        match self {
            Channel::A => Interrupt16::CompareMatchA,
            Channel::B => Interrupt16::CompareMatchB,
            Channel::C => Interrupt16::CompareMatchC,
        }
    }
}

/// Output compare channel of an 8-bit unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel8 {
    A,
    B,
}

impl From<Channel8> for Channel {
    #[inline]
    fn from(channel: Channel8) -> Self {
        match channel {
            Channel8::A => Channel::A,
            Channel8::B => Channel::B,
        }
    }
}

/// Interrupt source of an 8-bit unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt8 {
    CompareMatchA,
    CompareMatchB,
    Overflow,
}

/// Interrupt source of a 16-bit unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt16 {
    CompareMatchA = 0,
    CompareMatchB = 1,
    CompareMatchC = 2,
    Overflow = 3,
    InputCapture = 4,
}

impl Interrupt16 {
    /// Mask and flag bit of the source.
    pub const fn bits(self) -> InterruptBits {
        match self {
            Interrupt16::CompareMatchA => InterruptBits::DEFAULT.with_compare_a(true),
            Interrupt16::CompareMatchB => InterruptBits::DEFAULT.with_compare_b(true),
            Interrupt16::CompareMatchC => InterruptBits::DEFAULT.with_compare_c(true),
            Interrupt16::Overflow => InterruptBits::DEFAULT.with_overflow(true),
            Interrupt16::InputCapture => InterruptBits::DEFAULT.with_input_capture(true),
        }
    }
}

impl From<Interrupt8> for Interrupt16 {
    #[inline]
    fn from(source: Interrupt8) -> Self {
        match source {
            Interrupt8::CompareMatchA => Interrupt16::CompareMatchA,
            Interrupt8::CompareMatchB => Interrupt16::CompareMatchB,
            Interrupt8::Overflow => Interrupt16::Overflow,
        }
    }
}

/// Divisor which a delay assumes when the clock selector does not define one.
#[derive(Debug, Clone, Copy)]
pub struct Fallback<C> {
    pub clock: C,
    pub divisor: u32,
}

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Clock selector (CSn2:0) of a unit.
pub trait ClockSource: Copy + PartialEq + core::fmt::Debug + sealed::Sealed {
    const STOPPED: Self;
    /// Used by blocking delays if the clock is stopped.
    const BLOCKING_FALLBACK: Fallback<Self>;
    /// Used by asynchronous delays if the clock is stopped.
    const NON_BLOCKING_FALLBACK: Fallback<Self>;

    fn cs(self) -> u3;

    /// Prescaler divisor. [None] if the counter is stopped or clocked by an external source.
    fn divisor(self) -> Option<u32>;
}

/// Clock selector of the units running from the synchronous prescaler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum SyncClock {
    Stopped = 0b000,
    Div1 = 0b001,
    Div8 = 0b010,
    Div64 = 0b011,
    Div256 = 0b100,
    Div1024 = 0b101,
    /// External clock on the Tn pin, counting falling edges.
    ExternalFalling = 0b110,
    /// External clock on the Tn pin, counting rising edges.
    ExternalRising = 0b111,
}

impl sealed::Sealed for SyncClock {}

impl ClockSource for SyncClock {
    const STOPPED: Self = SyncClock::Stopped;
    const BLOCKING_FALLBACK: Fallback<Self> = Fallback {
        clock: SyncClock::Div256,
        divisor: 256,
    };
    const NON_BLOCKING_FALLBACK: Fallback<Self> = Fallback {
        clock: SyncClock::Div64,
        divisor: 64,
    };

    #[inline]
    fn cs(self) -> u3 {
        u3::new(self as u8)
    }

    fn divisor(self) -> Option<u32> {
        match self {
            SyncClock::Div1 => Some(1),
            SyncClock::Div8 => Some(8),
            SyncClock::Div64 => Some(64),
            SyncClock::Div256 => Some(256),
            SyncClock::Div1024 => Some(1024),
            SyncClock::Stopped | SyncClock::ExternalFalling | SyncClock::ExternalRising => None,
        }
    }
}

/// Clock selector of TC2, which has its own prescaler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum AsyncClock {
    Stopped = 0b000,
    Div1 = 0b001,
    Div8 = 0b010,
    Div32 = 0b011,
    Div64 = 0b100,
    Div128 = 0b101,
    Div256 = 0b110,
    Div1024 = 0b111,
}

impl sealed::Sealed for AsyncClock {}

impl ClockSource for AsyncClock {
    const STOPPED: Self = AsyncClock::Stopped;
    const BLOCKING_FALLBACK: Fallback<Self> = Fallback {
        clock: AsyncClock::Div256,
        divisor: 256,
    };
    const NON_BLOCKING_FALLBACK: Fallback<Self> = Fallback {
        clock: AsyncClock::Div64,
        divisor: 64,
    };

    #[inline]
    fn cs(self) -> u3 {
        u3::new(self as u8)
    }

    fn divisor(self) -> Option<u32> {
        match self {
            AsyncClock::Stopped => None,
            AsyncClock::Div1 => Some(1),
            AsyncClock::Div8 => Some(8),
            AsyncClock::Div32 => Some(32),
            AsyncClock::Div64 => Some(64),
            AsyncClock::Div128 => Some(128),
            AsyncClock::Div256 => Some(256),
            AsyncClock::Div1024 => Some(1024),
        }
    }
}

/// Common interface of the timer/counter drivers.
///
/// Compare values and counter values use the width of the unit. Writing the 16-bit registers
/// happens inside a critical section because the high byte is buffered in a register which
/// all 16-bit registers of a unit share.
pub trait Timer {
    /// Counter and compare register width.
    type Word: Copy;
    type Mode: Copy;
    type Clock: ClockSource;
    type Channel: Copy + Into<Channel>;
    type Interrupt: Copy + Into<Interrupt16>;

    const DEFAULT_BLOCKING_CHANNEL: Self::Channel;
    const DEFAULT_ASYNC_CHANNEL: Self::Channel;

    /// Cancel a running asynchronous delay, disable all interrupts of the unit and zero its
    /// control, counter and compare registers.
    fn deactivate(&mut self);

    fn set_mode(&mut self, mode: Self::Mode);

    /// Store the clock selector. It is written to the hardware by [Self::start].
    fn set_clock(&mut self, clock: Self::Clock);

    fn clock(&self) -> Self::Clock;

    fn set_compare_output_mode(&mut self, channel: Self::Channel, mode: CompareOutputMode);

    fn set_compare_value(&mut self, channel: Self::Channel, value: Self::Word);

    fn compare_value(&self, channel: Self::Channel) -> Self::Word;

    /// Write the stored clock selector to the hardware.
    ///
    /// Halts with a fatal diagnostic if no clock selector was set.
    fn start(&mut self);

    /// Cancel a running asynchronous delay and stop the counter.
    fn stop(&mut self);

    fn counter(&self) -> Self::Word;

    fn set_counter(&mut self, value: Self::Word);

    /// Strobe a forced compare match on the output of the channel. No interrupt is generated.
    fn force_compare(&mut self, channel: Self::Channel);

    /// Register the function called by the interrupt of the given source. [None] removes it.
    fn set_interrupt_callback(&mut self, source: Self::Interrupt, callback: Option<fn()>);

    fn enable_interrupt(&mut self, source: Self::Interrupt);

    fn disable_interrupt(&mut self, source: Self::Interrupt);

    fn interrupt_flag(&mut self, source: Self::Interrupt) -> bool;

    fn clear_interrupt_flag(&mut self, source: Self::Interrupt);

    /// Blocking delay on an explicit channel. The compare register of the channel is used for
    /// the final partial counter cycle.
    fn blocking_delay_on(&mut self, value: u32, unit: TimeUnit, channel: Self::Channel);

    fn blocking_delay_in(&mut self, value: u32, unit: TimeUnit) {
        self.blocking_delay_on(value, unit, Self::DEFAULT_BLOCKING_CHANNEL);
    }

    /// Blocking delay in milliseconds.
    fn blocking_delay(&mut self, ms: u32) {
        self.blocking_delay_in(ms, TimeUnit::Milliseconds);
    }

    fn start_async_delay_on(&mut self, value: u32, unit: TimeUnit, channel: Self::Channel);

    fn start_async_delay_in(&mut self, value: u32, unit: TimeUnit) {
        self.start_async_delay_on(value, unit, Self::DEFAULT_ASYNC_CHANNEL);
    }

    /// Asynchronous delay in milliseconds.
    fn start_async_delay(&mut self, ms: u32) {
        self.start_async_delay_in(ms, TimeUnit::Milliseconds);
    }

    fn is_async_delay_finished(&self) -> bool;

    /// Cancel the running asynchronous delay without invoking its callback. Does nothing if
    /// no delay is running.
    fn stop_async_delay(&mut self);
}
