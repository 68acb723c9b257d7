//! Register access shared by the 8-bit and the 16-bit units.
//!
//! The delay engine only talks to [TimerRegisters]. Counter and compare values are widened to
//! [u16] so the same code drives both counter widths.
use arbitrary_int::{u2, u3};
use atmega2560::{
    tc::{
        ControlA, InterruptBits, InterruptFlags, InterruptMask, MmioInterruptFlags,
        MmioInterruptMask, TimerId,
    },
    tc8::{self, Assr, AsyncStatus, MmioAsyncStatus, MmioTc8},
    tc16::{self, CaptureEdge, MmioTc16},
};

use super::Channel;

/// Mask and flag bits which exist on any unit.
pub const ALL_INTERRUPTS: InterruptBits = InterruptBits::new_with_raw_value(0x2F);

#[inline]
pub const fn union(a: InterruptBits, b: InterruptBits) -> InterruptBits {
    InterruptBits::new_with_raw_value(a.raw_value() | b.raw_value())
}

/// Bits of `a` which are not set in `b`.
#[inline]
pub const fn difference(a: InterruptBits, b: InterruptBits) -> InterruptBits {
    InterruptBits::new_with_raw_value(a.raw_value() & !b.raw_value())
}

#[inline]
pub const fn intersects(a: InterruptBits, b: InterruptBits) -> bool {
    a.raw_value() & b.raw_value() != 0
}

#[inline]
pub const fn compare_flag(channel: Channel) -> InterruptBits {
    channel.interrupt().bits()
}

pub const OVERFLOW: InterruptBits = InterruptBits::DEFAULT.with_overflow(true);

/// Registers saved before a delay reprograms a unit.
#[derive(Debug, Clone, Copy)]
pub struct RegisterSnapshot {
    pub ctrl_a: ControlA,
    pub ctrl_b: u8,
    pub counter: u16,
    pub compare: [u16; 3],
    pub mask: InterruptBits,
    pub flags: InterruptBits,
}

pub trait TimerRegisters {
    /// Counter value at which the counter overflows in normal mode.
    const COUNTER_MAX: u16;
    /// Output compare channels of the unit.
    const CHANNELS: &'static [Channel];

    fn read_ctrl_a(&self) -> ControlA;
    fn write_ctrl_a(&mut self, value: ControlA);

    fn read_ctrl_b_raw(&self) -> u8;
    fn write_ctrl_b_raw(&mut self, value: u8);

    fn read_clock_select(&self) -> u3;
    /// Only touches the CSn2:0 bits.
    fn write_clock_select(&mut self, cs: u3);

    fn read_counter(&self) -> u16;
    fn write_counter(&mut self, value: u16);

    fn read_compare(&self, channel: Channel) -> u16;
    fn write_compare(&mut self, channel: Channel, value: u16);

    /// Strobe FOCnx.
    fn force_compare(&mut self, channel: Channel);

    fn read_interrupt_mask(&self) -> InterruptBits;
    fn write_interrupt_mask(&mut self, value: InterruptBits);

    fn read_interrupt_flags(&self) -> InterruptBits;
    /// Write-one-to-clear. Flags not set in `bits` are untouched.
    fn clear_interrupt_flags(&mut self, bits: InterruptBits);

    #[inline]
    fn counter_range() -> u32 {
        Self::COUNTER_MAX as u32 + 1
    }

    #[inline]
    fn modify_interrupt_mask(&mut self, f: impl FnOnce(InterruptBits) -> InterruptBits) {
        let mask = self.read_interrupt_mask();
        self.write_interrupt_mask(f(mask));
    }

    #[inline]
    fn modify_ctrl_a(&mut self, f: impl FnOnce(ControlA) -> ControlA) {
        let ctrl_a = self.read_ctrl_a();
        self.write_ctrl_a(f(ctrl_a));
    }

    fn snapshot(&self) -> RegisterSnapshot {
        let mut compare = [0; 3];
        for &channel in Self::CHANNELS {
            compare[channel as usize] = self.read_compare(channel);
        }
        RegisterSnapshot {
            ctrl_a: self.read_ctrl_a(),
            ctrl_b: self.read_ctrl_b_raw(),
            counter: self.read_counter(),
            compare,
            mask: self.read_interrupt_mask(),
            flags: self.read_interrupt_flags(),
        }
    }

    /// Compare flags of all channels of the unit.
    fn compare_flags() -> InterruptBits {
        Self::CHANNELS
            .iter()
            .fold(InterruptBits::DEFAULT, |bits, &channel| {
                union(bits, compare_flag(channel))
            })
    }

    /// Write back a snapshot. Flags in `produced` which were clear when the snapshot was taken
    /// are cleared, all other pending flags stay. The control registers are written last, so
    /// the counter only resumes once everything else is in place.
    fn restore(&mut self, saved: &RegisterSnapshot, produced: InterruptBits) {
        self.write_clock_select(u3::new(0));
        self.write_counter(saved.counter);
        for &channel in Self::CHANNELS {
            self.write_compare(channel, saved.compare[channel as usize]);
        }
        self.clear_interrupt_flags(difference(produced, saved.flags));
        self.write_interrupt_mask(saved.mask);
        self.write_ctrl_a(saved.ctrl_a);
        self.write_ctrl_b_raw(saved.ctrl_b);
    }

    /// Stop the counter, select normal mode with all outputs disconnected and zero the
    /// counter. The clock select has to be written afterwards to start counting.
    fn configure_normal_mode(&mut self) {
        self.write_ctrl_b_raw(0);
        self.write_ctrl_a(ControlA::DEFAULT);
        self.write_counter(0);
    }

    /// Disable the interrupts and zero control, counter and compare registers. Mask bits in
    /// `keep` survive. Pending flags are cleared, except those in `keep`.
    fn reset(&mut self, keep: InterruptBits) {
        self.modify_interrupt_mask(|mask| {
            InterruptBits::new_with_raw_value(mask.raw_value() & keep.raw_value())
        });
        self.write_ctrl_b_raw(0);
        self.write_ctrl_a(ControlA::DEFAULT);
        self.write_counter(0);
        for &channel in Self::CHANNELS {
            self.write_compare(channel, 0);
        }
        self.clear_interrupt_flags(difference(ALL_INTERRUPTS, keep));
    }
}

/// Typed access to TCCRnB of the 8-bit units.
pub trait Registers8: TimerRegisters {
    #[inline]
    fn read_ctrl_b(&self) -> tc8::ControlB {
        tc8::ControlB::new_with_raw_value(self.read_ctrl_b_raw())
    }

    #[inline]
    fn write_ctrl_b(&mut self, value: tc8::ControlB) {
        self.write_ctrl_b_raw(value.raw_value());
    }

    #[inline]
    fn modify_ctrl_b(&mut self, f: impl FnOnce(tc8::ControlB) -> tc8::ControlB) {
        let value = self.read_ctrl_b();
        self.write_ctrl_b(f(value));
    }
}

/// Access to ASSR, which only exists for TC2.
pub trait AsyncStatusRegisters: Registers8 {
    fn read_assr(&self) -> Assr;
    fn write_assr(&mut self, value: Assr);

    #[inline]
    fn modify_assr(&mut self, f: impl FnOnce(Assr) -> Assr) {
        let value = self.read_assr();
        self.write_assr(f(value));
    }
}

/// Typed access to the registers only the 16-bit units have.
pub trait Registers16: TimerRegisters {
    #[inline]
    fn read_ctrl_b(&self) -> tc16::ControlB {
        tc16::ControlB::new_with_raw_value(self.read_ctrl_b_raw())
    }

    #[inline]
    fn write_ctrl_b(&mut self, value: tc16::ControlB) {
        self.write_ctrl_b_raw(value.raw_value());
    }

    #[inline]
    fn modify_ctrl_b(&mut self, f: impl FnOnce(tc16::ControlB) -> tc16::ControlB) {
        let value = self.read_ctrl_b();
        self.write_ctrl_b(f(value));
    }

    fn read_input_capture(&self) -> u16;
    fn write_input_capture(&mut self, value: u16);

    #[inline]
    fn set_capture_edge(&mut self, edge: CaptureEdge) {
        self.modify_ctrl_b(|v| v.with_ices(edge));
    }
}

/// Registers of TC0 or TC2.
pub struct Tc8Registers {
    block: MmioTc8<'static>,
    mask: MmioInterruptMask<'static>,
    flags: MmioInterruptFlags<'static>,
}

impl Tc8Registers {
    /// # Safety
    ///
    /// Circumvents ownership and safety guarantees of the HAL. `id` must be [TimerId::Tc0]
    /// or [TimerId::Tc2] and `block` must be the register block of that unit.
    #[inline]
    pub const unsafe fn new(id: TimerId, block: MmioTc8<'static>) -> Self {
        Self {
            block,
            mask: unsafe { InterruptMask::new_mmio_fixed(id) },
            flags: unsafe { InterruptFlags::new_mmio_fixed(id) },
        }
    }
}

impl TimerRegisters for Tc8Registers {
    const COUNTER_MAX: u16 = u8::MAX as u16;
    const CHANNELS: &'static [Channel] = &[Channel::A, Channel::B];

    #[inline]
    fn read_ctrl_a(&self) -> ControlA {
        self.block.read_ctrl_a()
    }

    #[inline]
    fn write_ctrl_a(&mut self, value: ControlA) {
        self.block.write_ctrl_a(value);
    }

    #[inline]
    fn read_ctrl_b_raw(&self) -> u8 {
        self.block.read_ctrl_b().raw_value()
    }

    #[inline]
    fn write_ctrl_b_raw(&mut self, value: u8) {
        self.block.write_ctrl_b(tc8::ControlB::new_with_raw_value(value));
    }

    #[inline]
    fn read_clock_select(&self) -> u3 {
        self.block.read_ctrl_b().cs()
    }

    #[inline]
    fn write_clock_select(&mut self, cs: u3) {
        self.block.modify_ctrl_b(|v| v.with_cs(cs));
    }

    #[inline]
    fn read_counter(&self) -> u16 {
        self.block.read_counter() as u16
    }

    #[inline]
    fn write_counter(&mut self, value: u16) {
        self.block.write_counter(value as u8);
    }

    #[inline]
    fn read_compare(&self, channel: Channel) -> u16 {
        match channel {
            Channel::A => self.block.read_compare_a() as u16,
            Channel::B => self.block.read_compare_b() as u16,
            Channel::C => 0,
        }
    }

    #[inline]
    fn write_compare(&mut self, channel: Channel, value: u16) {
        match channel {
            Channel::A => self.block.write_compare_a(value as u8),
            Channel::B => self.block.write_compare_b(value as u8),
            Channel::C => (),
        }
    }

    fn force_compare(&mut self, channel: Channel) {
        self.block.modify_ctrl_b(|v| match channel {
            Channel::A => v.with_force_compare_a(true),
            Channel::B => v.with_force_compare_b(true),
            Channel::C => v,
        });
    }

    #[inline]
    fn read_interrupt_mask(&self) -> InterruptBits {
        self.mask.read_mask()
    }

    #[inline]
    fn write_interrupt_mask(&mut self, value: InterruptBits) {
        self.mask.write_mask(value);
    }

    #[inline]
    fn read_interrupt_flags(&self) -> InterruptBits {
        self.flags.read_flags()
    }

    #[inline]
    fn clear_interrupt_flags(&mut self, bits: InterruptBits) {
        self.flags.write_flags(bits);
    }
}

impl Registers8 for Tc8Registers {}

/// Registers of TC2, which adds ASSR to the 8-bit block.
pub struct Tc2Registers {
    timer: Tc8Registers,
    assr: MmioAsyncStatus<'static>,
}

impl Tc2Registers {
    /// # Safety
    ///
    /// Circumvents ownership and safety guarantees of the HAL. `id` must be [TimerId::Tc2]
    /// and `block` must be the register block of TC2.
    #[inline]
    pub const unsafe fn new(id: TimerId, block: MmioTc8<'static>) -> Self {
        Self {
            timer: unsafe { Tc8Registers::new(id, block) },
            assr: unsafe { AsyncStatus::new_mmio_fixed() },
        }
    }
}

impl TimerRegisters for Tc2Registers {
    const COUNTER_MAX: u16 = Tc8Registers::COUNTER_MAX;
    const CHANNELS: &'static [Channel] = Tc8Registers::CHANNELS;

    delegate::delegate! {
        to self.timer {
            fn read_ctrl_a(&self) -> ControlA;
            fn write_ctrl_a(&mut self, value: ControlA);
            fn read_ctrl_b_raw(&self) -> u8;
            fn write_ctrl_b_raw(&mut self, value: u8);
            fn read_clock_select(&self) -> u3;
            fn write_clock_select(&mut self, cs: u3);
            fn read_counter(&self) -> u16;
            fn write_counter(&mut self, value: u16);
            fn read_compare(&self, channel: Channel) -> u16;
            fn write_compare(&mut self, channel: Channel, value: u16);
            fn force_compare(&mut self, channel: Channel);
            fn read_interrupt_mask(&self) -> InterruptBits;
            fn write_interrupt_mask(&mut self, value: InterruptBits);
            fn read_interrupt_flags(&self) -> InterruptBits;
            fn clear_interrupt_flags(&mut self, bits: InterruptBits);
        }
    }
}

impl Registers8 for Tc2Registers {}

impl AsyncStatusRegisters for Tc2Registers {
    #[inline]
    fn read_assr(&self) -> Assr {
        self.assr.read_assr()
    }

    #[inline]
    fn write_assr(&mut self, value: Assr) {
        self.assr.write_assr(value);
    }
}

/// Registers of TC1, TC3, TC4 or TC5.
///
/// The 16-bit registers are accessed through the shared TEMP register, so every 16-bit access
/// happens inside a critical section.
pub struct Tc16Registers {
    block: MmioTc16<'static>,
    mask: MmioInterruptMask<'static>,
    flags: MmioInterruptFlags<'static>,
}

impl Tc16Registers {
    /// # Safety
    ///
    /// Circumvents ownership and safety guarantees of the HAL. `block` must be the register
    /// block of the 16-bit unit `id`.
    #[inline]
    pub const unsafe fn new(id: TimerId, block: MmioTc16<'static>) -> Self {
        Self {
            block,
            mask: unsafe { InterruptMask::new_mmio_fixed(id) },
            flags: unsafe { InterruptFlags::new_mmio_fixed(id) },
        }
    }
}

impl TimerRegisters for Tc16Registers {
    const COUNTER_MAX: u16 = u16::MAX;
    const CHANNELS: &'static [Channel] = &[Channel::A, Channel::B, Channel::C];

    #[inline]
    fn read_ctrl_a(&self) -> ControlA {
        self.block.read_ctrl_a()
    }

    #[inline]
    fn write_ctrl_a(&mut self, value: ControlA) {
        self.block.write_ctrl_a(value);
    }

    #[inline]
    fn read_ctrl_b_raw(&self) -> u8 {
        self.block.read_ctrl_b().raw_value()
    }

    #[inline]
    fn write_ctrl_b_raw(&mut self, value: u8) {
        self.block.write_ctrl_b(tc16::ControlB::new_with_raw_value(value));
    }

    #[inline]
    fn read_clock_select(&self) -> u3 {
        self.block.read_ctrl_b().cs()
    }

    #[inline]
    fn write_clock_select(&mut self, cs: u3) {
        self.block.modify_ctrl_b(|v| v.with_cs(cs));
    }

    fn read_counter(&self) -> u16 {
        critical_section::with(|_| self.block.read_counter())
    }

    fn write_counter(&mut self, value: u16) {
        critical_section::with(|_| self.block.write_counter(value));
    }

    fn read_compare(&self, channel: Channel) -> u16 {
        critical_section::with(|_| match channel {
            Channel::A => self.block.read_compare_a(),
            Channel::B => self.block.read_compare_b(),
            Channel::C => self.block.read_compare_c(),
        })
    }

    fn write_compare(&mut self, channel: Channel, value: u16) {
        critical_section::with(|_| match channel {
            Channel::A => self.block.write_compare_a(value),
            Channel::B => self.block.write_compare_b(value),
            Channel::C => self.block.write_compare_c(value),
        });
    }

    fn force_compare(&mut self, channel: Channel) {
        let strobe = tc16::ControlC::DEFAULT;
        self.block.write_ctrl_c(match channel {
            Channel::A => strobe.with_force_compare_a(true),
            Channel::B => strobe.with_force_compare_b(true),
            Channel::C => strobe.with_force_compare_c(true),
        });
    }

    #[inline]
    fn read_interrupt_mask(&self) -> InterruptBits {
        self.mask.read_mask()
    }

    #[inline]
    fn write_interrupt_mask(&mut self, value: InterruptBits) {
        self.mask.write_mask(value);
    }

    #[inline]
    fn read_interrupt_flags(&self) -> InterruptBits {
        self.flags.read_flags()
    }

    #[inline]
    fn clear_interrupt_flags(&mut self, bits: InterruptBits) {
        self.flags.write_flags(bits);
    }
}

impl Registers16 for Tc16Registers {
    fn read_input_capture(&self) -> u16 {
        critical_section::with(|_| self.block.read_input_capture())
    }

    fn write_input_capture(&mut self, value: u16) {
        critical_section::with(|_| self.block.write_input_capture(value));
    }
}

/// Split a 3-bit waveform mode into WGMn1:0 and WGMn2.
#[inline]
pub(crate) const fn split_wgm3(mode: u8) -> (u2, bool) {
    (u2::new(mode & 0b11), mode & 0b100 != 0)
}

/// Split a 4-bit waveform mode into WGMn1:0 and WGMn3:2.
#[inline]
pub(crate) const fn split_wgm4(mode: u8) -> (u2, u2) {
    (u2::new(mode & 0b11), u2::new((mode >> 2) & 0b11))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::sim::SimState;

    #[test]
    fn interrupt_bit_helpers() {
        let a = InterruptBits::new_with_raw_value(0b0000_0011);
        let b = InterruptBits::new_with_raw_value(0b0000_0110);
        assert_eq!(union(a, b).raw_value(), 0b0000_0111);
        assert_eq!(difference(a, b).raw_value(), 0b0000_0001);
        assert!(intersects(a, b));
        assert!(!intersects(a, InterruptBits::new_with_raw_value(0b0010_0000)));
        assert_eq!(compare_flag(Channel::C).raw_value(), 0b0000_1000);
        assert_eq!(ALL_INTERRUPTS.raw_value(), 0b0010_1111);
    }

    #[test]
    fn wgm_split() {
        let (low, high) = split_wgm3(0b111);
        assert_eq!(low.value(), 0b11);
        assert!(high);
        let (low, high) = split_wgm3(0b010);
        assert_eq!(low.value(), 0b10);
        assert!(!high);
        let (low, high) = split_wgm4(0b1110);
        assert_eq!(low.value(), 0b10);
        assert_eq!(high.value(), 0b11);
    }

    #[test]
    fn snapshot_restore() {
        let mut regs = SimState::registers8();
        regs.write_ctrl_a(ControlA::new_with_raw_value(0b1010_0011));
        regs.write_ctrl_b_raw(0b0000_1011);
        regs.write_counter(17);
        regs.write_compare(Channel::A, 99);
        regs.write_compare(Channel::B, 42);
        regs.write_interrupt_mask(InterruptBits::new_with_raw_value(0b0000_0101));
        let saved = regs.snapshot();
        assert_eq!(saved.ctrl_a.raw_value(), 0b1010_0011);
        assert_eq!(saved.ctrl_b, 0b0000_1011);
        assert_eq!(saved.counter, 17);
        assert_eq!(saved.compare, [99, 42, 0]);

        regs.reset(InterruptBits::DEFAULT);
        assert_eq!(regs.read_ctrl_a().raw_value(), 0);
        assert_eq!(regs.read_ctrl_b_raw(), 0);
        assert_eq!(regs.read_compare(Channel::A), 0);
        assert_eq!(regs.read_interrupt_mask().raw_value(), 0);

        regs.restore(&saved, ALL_INTERRUPTS);
        assert_eq!(regs.read_ctrl_a().raw_value(), 0b1010_0011);
        assert_eq!(regs.read_ctrl_b_raw(), 0b0000_1011);
        assert_eq!(regs.read_counter(), 17);
        assert_eq!(regs.read_compare(Channel::A), 99);
        assert_eq!(regs.read_compare(Channel::B), 42);
        assert_eq!(regs.read_interrupt_mask().raw_value(), 0b0000_0101);
    }

    #[test]
    fn reset_keeps_reserved_mask_bits() {
        let mut regs = SimState::registers8();
        regs.write_interrupt_mask(InterruptBits::new_with_raw_value(0b0000_0111));
        regs.reset(OVERFLOW);
        assert_eq!(regs.read_interrupt_mask().raw_value(), 0b0000_0001);
    }
}
