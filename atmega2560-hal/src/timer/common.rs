//! Driver logic shared by the 8-bit and the 16-bit timers.
use core::marker::PhantomData;

use arbitrary_int::u3;
use atmega2560::tc::{CompareOutputMode, InterruptBits};

use super::{
    Channel, ClockSource, Fallback, Interrupt16, TimeUnit, TimerTakenError,
    delay::{self, AsyncStart},
    regs::{OVERFLOW, TimerRegisters, difference, intersects, union},
    unit::TimerUnit,
};
use crate::clocks::Clocks;

/// Owner of one timer/counter unit.
///
/// Width independent part of [super::Timer8] and [super::Timer16]. Values are widened to
/// [u16].
pub struct TimerCore<U: TimerUnit> {
    pub(super) regs: U::Registers,
    clock: U::Clock,
    cpu_hz: u32,
    // The registers are shared with the interrupt handlers of this core.
    _not_send: PhantomData<*const ()>,
}

impl<U: TimerUnit> TimerCore<U> {
    pub(super) fn take(clocks: &Clocks) -> Result<Self, TimerTakenError> {
        if !U::slot().claim() {
            return Err(TimerTakenError(U::NAME));
        }
        if let Some(service) = U::SHARED_WITH {
            warning!(
                "{} is used by {}, reconfiguring it breaks that service",
                U::NAME,
                service
            );
        }
        Ok(Self {
            // SAFETY: the slot was claimed above, so this is the only owner of the unit.
            regs: unsafe { U::steal_registers() },
            clock: U::Clock::STOPPED,
            cpu_hz: clocks.cpu_clk().raw(),
            _not_send: PhantomData,
        })
    }

    /// Mask bits which [Self::deactivate] does not touch.
    #[inline]
    fn reserved_bits() -> InterruptBits {
        if U::OVERFLOW_RESERVED {
            OVERFLOW
        } else {
            InterruptBits::DEFAULT
        }
    }

    fn warn_shared(action: &str) {
        if !U::OVERFLOW_RESERVED {
            return;
        }
        if let Some(service) = U::SHARED_WITH {
            warning!("{}: {} affects {}", U::NAME, action, service);
        }
    }

    /// Halts if `source` is reserved on this unit.
    fn check_reserved(source: Interrupt16) {
        if U::OVERFLOW_RESERVED && source == Interrupt16::Overflow {
            fatal!(
                "{}: the overflow interrupt is reserved for {}",
                U::NAME,
                U::SHARED_WITH.unwrap_or("the platform")
            );
        }
    }

    pub fn deactivate(&mut self) {
        let regs = &mut self.regs;
        U::slot().with(|state| {
            delay::cancel_async(state, regs);
            regs.reset(Self::reserved_bits());
        });
    }

    pub fn set_clock(&mut self, clock: U::Clock) {
        Self::warn_shared("changing the clock");
        self.clock = clock;
    }

    #[inline]
    pub fn clock(&self) -> U::Clock {
        self.clock
    }

    /// Run the counter with the stored clock. A running asynchronous delay is cancelled first,
    /// so the counter resumes with the configuration saved by that delay.
    pub fn start(&mut self) {
        if self.clock == U::Clock::STOPPED {
            fatal!("{}: clock source was not set, timer does not start", U::NAME);
        }
        Self::warn_shared("starting the counter");
        self.stop_async_delay();
        let cs = self.clock.cs();
        let regs = &mut self.regs;
        critical_section::with(|_| regs.write_clock_select(cs));
    }

    pub fn stop(&mut self) {
        Self::warn_shared("stopping the counter");
        self.stop_async_delay();
        let regs = &mut self.regs;
        critical_section::with(|_| regs.write_clock_select(u3::new(0)));
    }

    pub fn set_compare_output_mode(&mut self, channel: Channel, mode: CompareOutputMode) {
        let regs = &mut self.regs;
        critical_section::with(|_| {
            regs.modify_ctrl_a(|value| match channel {
                Channel::A => value.with_com_a(mode),
                Channel::B => value.with_com_b(mode),
                Channel::C => value.with_com_c(mode),
            })
        });
    }

    pub fn compare_output_mode(&self, channel: Channel) -> CompareOutputMode {
        let value = self.regs.read_ctrl_a();
        match channel {
            Channel::A => value.com_a(),
            Channel::B => value.com_b(),
            Channel::C => value.com_c(),
        }
    }

    #[inline]
    pub fn set_compare_value(&mut self, channel: Channel, value: u16) {
        self.regs.write_compare(channel, value);
    }

    #[inline]
    pub fn compare_value(&self, channel: Channel) -> u16 {
        self.regs.read_compare(channel)
    }

    #[inline]
    pub fn counter(&self) -> u16 {
        self.regs.read_counter()
    }

    #[inline]
    pub fn set_counter(&mut self, value: u16) {
        self.regs.write_counter(value);
    }

    pub fn force_compare(&mut self, channel: Channel) {
        let regs = &mut self.regs;
        critical_section::with(|_| regs.force_compare(channel));
    }

    pub fn set_interrupt_callback(&mut self, source: Interrupt16, callback: Option<fn()>) {
        Self::check_reserved(source);
        U::slot().with(|state| state.callbacks[source as usize] = callback);
    }

    pub fn enable_interrupt(&mut self, source: Interrupt16) {
        Self::check_reserved(source);
        let regs = &mut self.regs;
        critical_section::with(|_| regs.modify_interrupt_mask(|mask| union(mask, source.bits())));
    }

    pub fn disable_interrupt(&mut self, source: Interrupt16) {
        Self::check_reserved(source);
        let regs = &mut self.regs;
        critical_section::with(|_| {
            regs.modify_interrupt_mask(|mask| difference(mask, source.bits()))
        });
    }

    pub fn interrupt_flag(&mut self, source: Interrupt16) -> bool {
        if U::OVERFLOW_RESERVED && source == Interrupt16::Overflow {
            warning!("{}: the overflow flag is consumed by platform timekeeping", U::NAME);
        }
        intersects(self.regs.read_interrupt_flags(), source.bits())
    }

    /// Clearing the reserved overflow flag is refused.
    pub fn clear_interrupt_flag(&mut self, source: Interrupt16) {
        if U::OVERFLOW_RESERVED && source == Interrupt16::Overflow {
            critical!("{}: the overflow flag is reserved and was not cleared", U::NAME);
            return;
        }
        self.regs.clear_interrupt_flags(source.bits());
    }

    /// Clock select and divisor used for a delay. Substitutes `fallback` if the stored clock
    /// has no known divisor.
    fn delay_clock(&self, fallback: Fallback<U::Clock>) -> (U::Clock, u32) {
        if let Some(divisor) = self.clock.divisor() {
            return (self.clock, divisor);
        }
        if self.clock == U::Clock::STOPPED {
            warning!(
                "{}: clock source not set, assuming prescaler {}",
                U::NAME,
                fallback.divisor
            );
        } else {
            critical!(
                "{}: the external clock has no known prescaler, assuming prescaler {}",
                U::NAME,
                fallback.divisor
            );
        }
        (fallback.clock, fallback.divisor)
    }

    /// Blocking delay. Interrupts stay disabled until the delay is over.
    ///
    /// A running asynchronous delay is paused for the duration and resumes afterwards.
    pub fn blocking_delay(&mut self, value: u32, unit: TimeUnit, channel: Channel) {
        let (clock, divisor) = self.delay_clock(U::Clock::BLOCKING_FALLBACK);
        let ticks = delay::ticks(unit.to_micros(value), self.cpu_hz, divisor);
        let regs = &mut self.regs;
        critical_section::with(|_| delay::blocking(regs, ticks, clock.cs(), channel));
    }

    pub fn start_async_delay(&mut self, value: u32, unit: TimeUnit, channel: Channel) {
        let (clock, divisor) = self.delay_clock(U::Clock::NON_BLOCKING_FALLBACK);
        let ticks = delay::ticks(unit.to_micros(value), self.cpu_hz, divisor);
        let regs = &mut self.regs;
        let started =
            U::slot().with(|state| delay::start_async(state, regs, ticks, clock.cs(), channel));
        match started {
            AsyncStart::Started => (),
            AsyncStart::AlreadyActive => warning!(
                "{}: an asynchronous delay is already active, request ignored",
                U::NAME
            ),
            AsyncStart::Elapsed => {
                warning!("{}: zero-length asynchronous delay completes immediately", U::NAME)
            }
        }
    }

    pub fn is_async_delay_finished(&self) -> bool {
        U::slot().with(|state| state.session.is_none())
    }

    pub fn stop_async_delay(&mut self) {
        let regs = &mut self.regs;
        if U::slot().with(|state| delay::cancel_async(state, regs)) {
            warning!("{}: stopping active asynchronous delay", U::NAME);
        }
    }

    /// Blocking delay of at least `ns` nanoseconds, rounded up to whole microseconds.
    pub(super) fn delay_ns(&mut self, ns: u32, channel: Channel) {
        self.blocking_delay(ns.div_ceil(1_000), TimeUnit::Microseconds, channel);
    }
}

impl<U: TimerUnit> Drop for TimerCore<U> {
    fn drop(&mut self) {
        self.deactivate();
        U::slot().release();
    }
}
