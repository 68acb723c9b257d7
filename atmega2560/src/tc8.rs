//! 8-bit timer/counter register module (TC0 and TC2).
//!
//! TC2 can additionally be clocked asynchronously from a 32.768 kHz crystal or an external
//! square wave, which is configured with the [AsyncStatus] register.
use arbitrary_int::u3;

pub use crate::tc::{CompareOutputMode, ControlA, InterruptBits};

pub const TC_0_BASE_ADDR: usize = 0x44;
pub const TC_2_BASE_ADDR: usize = 0xB0;
pub const ASSR_ADDR: usize = 0xB6;

/// TCCRnB of the 8-bit units.
#[bitbybit::bitfield(u8, default = 0x0, debug)]
pub struct ControlB {
    /// Force output compare A. Strobe, always reads as zero.
    #[bit(7, rw)]
    force_compare_a: bool,
    /// Force output compare B. Strobe, always reads as zero.
    #[bit(6, rw)]
    force_compare_b: bool,
    /// WGMn2
    #[bit(3, rw)]
    wgm_high: bool,
    /// Clock select CSn2:0. The meaning of the values differs between TC0 and TC2.
    #[bits(0..=2, rw)]
    cs: u3,
}

/// 8-bit timer/counter.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Tc8 {
    ctrl_a: ControlA,
    ctrl_b: ControlB,
    counter: u8,
    compare_a: u8,
    compare_b: u8,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Tc8>(), 5);

impl Tc8 {
    /// Create a new MMIO instance for TC0 at address [TC_0_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    #[inline]
    pub const unsafe fn new_mmio_fixed_0() -> MmioTc8<'static> {
        unsafe { Self::new_mmio_at(TC_0_BASE_ADDR) }
    }

    /// Create a new MMIO instance for TC2 at address [TC_2_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    #[inline]
    pub const unsafe fn new_mmio_fixed_2() -> MmioTc8<'static> {
        unsafe { Self::new_mmio_at(TC_2_BASE_ADDR) }
    }
}

/// ASSR, asynchronous status register of TC2.
///
/// The update busy flags are set by hardware while a value written to the corresponding TC2
/// register is being transferred into the asynchronous clock domain.
#[bitbybit::bitfield(u8, default = 0x0, debug)]
pub struct Assr {
    /// Clock TC2 from an external square wave on TOSC1 instead of the crystal oscillator.
    /// Only relevant if `as2` is set.
    #[bit(6, rw)]
    exclk: bool,
    /// Clock TC2 from TOSC1 instead of the I/O clock.
    #[bit(5, rw)]
    as2: bool,
    #[bit(4, r)]
    counter_busy: bool,
    #[bit(3, r)]
    compare_a_busy: bool,
    #[bit(2, r)]
    compare_b_busy: bool,
    #[bit(1, r)]
    ctrl_a_busy: bool,
    #[bit(0, r)]
    ctrl_b_busy: bool,
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct AsyncStatus {
    assr: Assr,
}

static_assertions::const_assert_eq!(core::mem::size_of::<AsyncStatus>(), 1);

impl AsyncStatus {
    /// Create a new MMIO instance for the ASSR register at address [ASSR_ADDR].
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    #[inline]
    pub const unsafe fn new_mmio_fixed() -> MmioAsyncStatus<'static> {
        unsafe { Self::new_mmio_at(ASSR_ADDR) }
    }
}
