//! # 16-bit timer/counter driver (TC1, TC3, TC4 and TC5)
//!
//! The 16-bit units have a third compare channel and an input capture unit.
use atmega2560::tc::CompareOutputMode;
use atmega2560::tc16::CaptureEdge;

use super::{
    Channel, Interrupt16, TimeUnit, Timer, TimerTakenError,
    common::TimerCore,
    regs::{Registers16, TimerRegisters, split_wgm4},
    unit::{Tc1, Tc3, Tc4, Tc5, TimerUnit},
};
use crate::clocks::Clocks;

/// Waveform generation modes of the 16-bit units (WGMn3:0). Encoding 13 is reserved.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive,
)]
#[repr(u8)]
pub enum WaveformMode16 {
    Normal = 0,
    PwmPhaseCorrect8Bit = 1,
    PwmPhaseCorrect9Bit = 2,
    PwmPhaseCorrect10Bit = 3,
    /// Clear timer on compare match, TOP is OCRnA.
    CtcOcrA = 4,
    FastPwm8Bit = 5,
    FastPwm9Bit = 6,
    FastPwm10Bit = 7,
    PwmPhaseFrequencyCorrectIcr = 8,
    PwmPhaseFrequencyCorrectOcrA = 9,
    PwmPhaseCorrectIcr = 10,
    PwmPhaseCorrectOcrA = 11,
    /// Clear timer on compare match, TOP is ICRn.
    CtcIcr = 12,
    FastPwmIcr = 14,
    FastPwmOcrA = 15,
}

pub struct Timer16<U: TimerUnit> {
    core: TimerCore<U>,
}

pub type Timer1 = Timer16<Tc1>;
pub type Timer3 = Timer16<Tc3>;
pub type Timer4 = Timer16<Tc4>;
pub type Timer5 = Timer16<Tc5>;

impl<U: TimerUnit> Timer16<U>
where
    U::Registers: Registers16,
{
    /// Take ownership of the unit. Fails if another driver owns it.
    pub fn take(clocks: &Clocks) -> Result<Self, TimerTakenError> {
        Ok(Self {
            core: TimerCore::take(clocks)?,
        })
    }

    /// Waveform mode currently configured. [None] for the reserved encoding.
    pub fn mode(&self) -> Option<WaveformMode16> {
        let regs = &self.core.regs;
        let low = regs.read_ctrl_a().wgm_low().value();
        let high = regs.read_ctrl_b().wgm_high().value();
        WaveformMode16::try_from(low | (high << 2)).ok()
    }

    #[inline]
    pub fn compare_output_mode(&self, channel: Channel) -> CompareOutputMode {
        self.core.compare_output_mode(channel)
    }

    /// The noise canceler requires four equal samples of the ICPn pin before a capture is
    /// triggered, which delays the capture by four system clock cycles.
    pub fn set_input_capture_noise_canceler(&mut self, enable: bool) {
        let regs = &mut self.core.regs;
        critical_section::with(|_| regs.modify_ctrl_b(|value| value.with_icnc(enable)));
    }

    pub fn set_input_capture_edge(&mut self, edge: CaptureEdge) {
        let regs = &mut self.core.regs;
        critical_section::with(|_| regs.set_capture_edge(edge));
    }

    #[inline]
    pub fn input_capture_edge(&self) -> CaptureEdge {
        self.core.regs.read_ctrl_b().ices()
    }

    /// Counter value latched by the last capture event.
    #[inline]
    pub fn input_capture(&self) -> u16 {
        self.core.regs.read_input_capture()
    }

    /// Only useful in the waveform modes which use ICRn as TOP.
    #[inline]
    pub fn set_input_capture(&mut self, value: u16) {
        self.core.regs.write_input_capture(value);
    }
}

impl<U: TimerUnit> Timer for Timer16<U>
where
    U::Registers: Registers16,
{
    type Word = u16;
    type Mode = WaveformMode16;
    type Clock = U::Clock;
    type Channel = Channel;
    type Interrupt = Interrupt16;

    const DEFAULT_BLOCKING_CHANNEL: Channel = Channel::B;
    const DEFAULT_ASYNC_CHANNEL: Channel = Channel::A;

    delegate::delegate! {
        to self.core {
            fn deactivate(&mut self);
            fn set_clock(&mut self, clock: U::Clock);
            fn clock(&self) -> U::Clock;
            fn start(&mut self);
            fn stop(&mut self);
            fn set_compare_output_mode(&mut self, channel: Channel, mode: CompareOutputMode);
            fn set_compare_value(&mut self, channel: Channel, value: u16);
            fn compare_value(&self, channel: Channel) -> u16;
            fn counter(&self) -> u16;
            fn set_counter(&mut self, value: u16);
            fn force_compare(&mut self, channel: Channel);
            fn set_interrupt_callback(&mut self, source: Interrupt16, callback: Option<fn()>);
            fn enable_interrupt(&mut self, source: Interrupt16);
            fn disable_interrupt(&mut self, source: Interrupt16);
            fn interrupt_flag(&mut self, source: Interrupt16) -> bool;
            fn clear_interrupt_flag(&mut self, source: Interrupt16);
            fn is_async_delay_finished(&self) -> bool;
            fn stop_async_delay(&mut self);
            #[call(blocking_delay)]
            fn blocking_delay_on(&mut self, value: u32, unit: TimeUnit, channel: Channel);
            #[call(start_async_delay)]
            fn start_async_delay_on(&mut self, value: u32, unit: TimeUnit, channel: Channel);
        }
    }

    fn set_mode(&mut self, mode: WaveformMode16) {
        let (low, high) = split_wgm4(mode.into());
        let regs = &mut self.core.regs;
        critical_section::with(|_| {
            regs.modify_ctrl_a(|value| value.with_wgm_low(low));
            regs.modify_ctrl_b(|value| value.with_wgm_high(high));
        });
    }
}

impl<U: TimerUnit> embedded_hal::delay::DelayNs for Timer16<U>
where
    U::Registers: Registers16,
{
    fn delay_ns(&mut self, ns: u32) {
        self.core.delay_ns(ns, Self::DEFAULT_BLOCKING_CHANNEL);
    }

    fn delay_us(&mut self, us: u32) {
        self.blocking_delay_in(us, TimeUnit::Microseconds);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.blocking_delay_in(ms, TimeUnit::Milliseconds);
    }
}
