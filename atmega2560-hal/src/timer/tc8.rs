//! # 8-bit timer/counter driver (TC0 and TC2)
//!
//! TC0 drives platform timekeeping with its overflow interrupt, so that interrupt is not
//! available. TC2 has its own prescaler ([super::AsyncClock]) and can be clocked from a 32.768 kHz
//! crystal or an external square wave on TOSC1, see [Timer2::set_async_clock].
use atmega2560::tc::CompareOutputMode;
use atmega2560::tc8::Assr;

use super::{
    Channel, Channel8, Interrupt8, TimeUnit, Timer, TimerTakenError,
    common::TimerCore,
    regs::{AsyncStatusRegisters, Registers8, TimerRegisters, split_wgm3},
    unit::{Tc0, Tc2, TimerUnit},
};
use crate::clocks::Clocks;

/// Waveform generation modes of the 8-bit units (WGMn2:0).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive,
)]
#[repr(u8)]
pub enum WaveformMode8 {
    Normal = 0,
    /// TOP is 0xFF.
    PwmPhaseCorrect = 1,
    /// Clear timer on compare match, TOP is OCRnA.
    CtcOcrA = 2,
    /// TOP is 0xFF.
    FastPwm = 3,
    PwmPhaseCorrectOcrA = 5,
    FastPwmOcrA = 7,
}

pub struct Timer8<U: TimerUnit> {
    core: TimerCore<U>,
}

pub type Timer0 = Timer8<Tc0>;
pub type Timer2 = Timer8<Tc2>;

impl<U: TimerUnit> Timer8<U>
where
    U::Registers: Registers8,
{
    /// Take ownership of the unit. Fails if another driver owns it.
    pub fn take(clocks: &Clocks) -> Result<Self, TimerTakenError> {
        Ok(Self {
            core: TimerCore::take(clocks)?,
        })
    }

    /// Waveform mode currently configured. [None] for reserved encodings.
    pub fn mode(&self) -> Option<WaveformMode8> {
        let regs = &self.core.regs;
        let low = regs.read_ctrl_a().wgm_low().value();
        let high = regs.read_ctrl_b().wgm_high() as u8;
        WaveformMode8::try_from(low | (high << 2)).ok()
    }

    #[inline]
    pub fn compare_output_mode(&self, channel: Channel8) -> CompareOutputMode {
        self.core.compare_output_mode(channel.into())
    }
}

impl<U: TimerUnit> Timer for Timer8<U>
where
    U::Registers: Registers8,
{
    type Word = u8;
    type Mode = WaveformMode8;
    type Clock = U::Clock;
    type Channel = Channel8;
    type Interrupt = Interrupt8;

    const DEFAULT_BLOCKING_CHANNEL: Channel8 = Channel8::B;
    const DEFAULT_ASYNC_CHANNEL: Channel8 = Channel8::A;

    delegate::delegate! {
        to self.core {
            fn deactivate(&mut self);
            fn set_clock(&mut self, clock: U::Clock);
            fn clock(&self) -> U::Clock;
            fn start(&mut self);
            fn stop(&mut self);
            fn is_async_delay_finished(&self) -> bool;
            fn stop_async_delay(&mut self);
        }
    }

    fn set_mode(&mut self, mode: WaveformMode8) {
        let (low, high) = split_wgm3(mode.into());
        let regs = &mut self.core.regs;
        critical_section::with(|_| {
            regs.modify_ctrl_a(|value| value.with_wgm_low(low));
            regs.modify_ctrl_b(|value| value.with_wgm_high(high));
        });
    }

    #[inline]
    fn set_compare_output_mode(&mut self, channel: Channel8, mode: CompareOutputMode) {
        self.core.set_compare_output_mode(channel.into(), mode);
    }

    #[inline]
    fn set_compare_value(&mut self, channel: Channel8, value: u8) {
        self.core.set_compare_value(channel.into(), value as u16);
    }

    #[inline]
    fn compare_value(&self, channel: Channel8) -> u8 {
        self.core.compare_value(channel.into()) as u8
    }

    #[inline]
    fn counter(&self) -> u8 {
        self.core.counter() as u8
    }

    #[inline]
    fn set_counter(&mut self, value: u8) {
        self.core.set_counter(value as u16);
    }

    #[inline]
    fn force_compare(&mut self, channel: Channel8) {
        self.core.force_compare(channel.into());
    }

    #[inline]
    fn set_interrupt_callback(&mut self, source: Interrupt8, callback: Option<fn()>) {
        self.core.set_interrupt_callback(source.into(), callback);
    }

    #[inline]
    fn enable_interrupt(&mut self, source: Interrupt8) {
        self.core.enable_interrupt(source.into());
    }

    #[inline]
    fn disable_interrupt(&mut self, source: Interrupt8) {
        self.core.disable_interrupt(source.into());
    }

    #[inline]
    fn interrupt_flag(&mut self, source: Interrupt8) -> bool {
        self.core.interrupt_flag(source.into())
    }

    #[inline]
    fn clear_interrupt_flag(&mut self, source: Interrupt8) {
        self.core.clear_interrupt_flag(source.into());
    }

    #[inline]
    fn blocking_delay_on(&mut self, value: u32, unit: TimeUnit, channel: Channel8) {
        self.core.blocking_delay(value, unit, channel.into());
    }

    #[inline]
    fn start_async_delay_on(&mut self, value: u32, unit: TimeUnit, channel: Channel8) {
        self.core.start_async_delay(value, unit, channel.into());
    }
}

impl<U: TimerUnit> embedded_hal::delay::DelayNs for Timer8<U>
where
    U::Registers: Registers8,
{
    fn delay_ns(&mut self, ns: u32) {
        self.core.delay_ns(ns, Self::DEFAULT_BLOCKING_CHANNEL.into());
    }

    fn delay_us(&mut self, us: u32) {
        self.blocking_delay_in(us, TimeUnit::Microseconds);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.blocking_delay_in(ms, TimeUnit::Milliseconds);
    }
}

/// Clock input of TC2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncClockInput {
    /// Synchronous operation from the I/O clock.
    IoClock,
    /// Crystal oscillator on TOSC1 and TOSC2, usually 32.768 kHz.
    Crystal,
    /// External square wave on TOSC1.
    ExternalClock,
}

impl AsyncClockInput {
    /// AS2
    #[inline]
    pub const fn as2(self) -> bool {
        !matches!(self, AsyncClockInput::IoClock)
    }

    /// EXCLK
    #[inline]
    pub const fn exclk(self) -> bool {
        matches!(self, AsyncClockInput::ExternalClock)
    }
}

/// Update busy flags of TC2 in ASSR.
///
/// While TC2 is clocked asynchronously, a value written to one of its registers needs a few
/// cycles of the asynchronous clock to arrive. The flag of the register is set until then and
/// the register must not be written again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyFlag {
    ControlB,
    ControlA,
    CompareB,
    CompareA,
    Counter,
}

impl BusyFlag {
    pub const ALL: [BusyFlag; 5] = [
        BusyFlag::ControlB,
        BusyFlag::ControlA,
        BusyFlag::CompareB,
        BusyFlag::CompareA,
        BusyFlag::Counter,
    ];

    #[inline]
    pub const fn is_set(self, assr: Assr) -> bool {
        match self {
            BusyFlag::ControlB => assr.ctrl_b_busy(),
            BusyFlag::ControlA => assr.ctrl_a_busy(),
            BusyFlag::CompareB => assr.compare_b_busy(),
            BusyFlag::CompareA => assr.compare_a_busy(),
            BusyFlag::Counter => assr.counter_busy(),
        }
    }
}

fn wait_for_flag<R: AsyncStatusRegisters>(regs: &R, flag: BusyFlag) {
    while flag.is_set(regs.read_assr()) {}
}

/// Waits for `flag` if the unit runs from an asynchronous input.
#[inline]
fn settle<R: AsyncStatusRegisters>(regs: &R, input: AsyncClockInput, flag: BusyFlag) {
    if input.as2() {
        wait_for_flag(regs, flag);
    }
}

impl<U: TimerUnit> Timer8<U>
where
    U::Registers: AsyncStatusRegisters,
{
    /// Select the clock input of TC2.
    ///
    /// Counter, compare and control registers keep their values. While switching to an
    /// asynchronous input they may be corrupted by the hardware, so they are saved before and
    /// written back afterwards, each followed by a wait on its busy flag. Interrupts are
    /// disabled during the switch.
    ///
    /// After switching to an asynchronous input, every register write has to be followed by
    /// [Self::wait_for_update] before the same register is written again. This driver only
    /// does that inside this function.
    pub fn set_async_clock(&mut self, input: AsyncClockInput) {
        let regs = &mut self.core.regs;
        critical_section::with(|_| {
            let ctrl_a = regs.read_ctrl_a();
            let ctrl_b = regs.read_ctrl_b_raw();
            let counter = regs.read_counter();
            let compare_a = regs.read_compare(Channel::A);
            let compare_b = regs.read_compare(Channel::B);
            regs.write_clock_select(arbitrary_int::u3::new(0));

            // EXCLK has to be written before AS2 is set.
            regs.modify_assr(|value| value.with_exclk(input.exclk()));
            regs.modify_assr(|value| value.with_as2(input.as2()));
            if input.as2() {
                warning!("TC2: switched to asynchronous clocking, waiting for pending updates");
                for flag in BusyFlag::ALL {
                    wait_for_flag(regs, flag);
                }
            }

            regs.write_counter(counter);
            settle(regs, input, BusyFlag::Counter);
            regs.write_compare(Channel::A, compare_a);
            settle(regs, input, BusyFlag::CompareA);
            regs.write_compare(Channel::B, compare_b);
            settle(regs, input, BusyFlag::CompareB);
            regs.write_ctrl_a(ctrl_a);
            settle(regs, input, BusyFlag::ControlA);
            regs.write_ctrl_b_raw(ctrl_b);
            settle(regs, input, BusyFlag::ControlB);
        });
    }

    /// Currently selected clock input.
    pub fn async_clock(&self) -> AsyncClockInput {
        let assr = self.core.regs.read_assr();
        match (assr.as2(), assr.exclk()) {
            (false, _) => AsyncClockInput::IoClock,
            (true, false) => AsyncClockInput::Crystal,
            (true, true) => AsyncClockInput::ExternalClock,
        }
    }

    #[inline]
    pub fn busy_flag(&self, flag: BusyFlag) -> bool {
        flag.is_set(self.core.regs.read_assr())
    }

    /// Spin until the register behind `flag` accepted the last write.
    #[inline]
    pub fn wait_for_update(&self, flag: BusyFlag) {
        wait_for_flag(&self.core.regs, flag);
    }
}
