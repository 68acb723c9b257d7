//! 16-bit timer/counter register module (TC1, TC3, TC4 and TC5).
use arbitrary_int::{u2, u3};

pub use crate::tc::{CompareOutputMode, ControlA, InterruptBits};

pub const TC_1_BASE_ADDR: usize = 0x80;
pub const TC_3_BASE_ADDR: usize = 0x90;
pub const TC_4_BASE_ADDR: usize = 0xA0;
pub const TC_5_BASE_ADDR: usize = 0x120;

#[bitbybit::bitenum(u1, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum CaptureEdge {
    Falling = 0b0,
    Rising = 0b1,
}

/// TCCRnB of the 16-bit units.
#[bitbybit::bitfield(u8, default = 0x0, debug)]
pub struct ControlB {
    /// Input capture noise canceler. Delays the capture by four samples.
    #[bit(7, rw)]
    icnc: bool,
    /// Input capture edge select.
    #[bit(6, rw)]
    ices: CaptureEdge,
    /// WGMn3:2
    #[bits(3..=4, rw)]
    wgm_high: u2,
    /// Clock select CSn2:0.
    #[bits(0..=2, rw)]
    cs: u3,
}

/// TCCRnC. All bits are strobes and read as zero.
#[bitbybit::bitfield(u8, default = 0x0, debug)]
pub struct ControlC {
    #[bit(7, rw)]
    force_compare_a: bool,
    #[bit(6, rw)]
    force_compare_b: bool,
    #[bit(5, rw)]
    force_compare_c: bool,
}

/// 16-bit timer/counter.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Tc16 {
    ctrl_a: ControlA,
    ctrl_b: ControlB,
    ctrl_c: ControlC,
    _reserved: u8,
    counter: u16,
    input_capture: u16,
    compare_a: u16,
    compare_b: u16,
    compare_c: u16,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Tc16>(), 14);

impl Tc16 {
    /// Create a new MMIO instance for TC1 at address [TC_1_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    #[inline]
    pub const unsafe fn new_mmio_fixed_1() -> MmioTc16<'static> {
        unsafe { Self::new_mmio_at(TC_1_BASE_ADDR) }
    }

    /// Create a new MMIO instance for TC3 at address [TC_3_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// See [Self::new_mmio_fixed_1].
    #[inline]
    pub const unsafe fn new_mmio_fixed_3() -> MmioTc16<'static> {
        unsafe { Self::new_mmio_at(TC_3_BASE_ADDR) }
    }

    /// Create a new MMIO instance for TC4 at address [TC_4_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// See [Self::new_mmio_fixed_1].
    #[inline]
    pub const unsafe fn new_mmio_fixed_4() -> MmioTc16<'static> {
        unsafe { Self::new_mmio_at(TC_4_BASE_ADDR) }
    }

    /// Create a new MMIO instance for TC5 at address [TC_5_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// See [Self::new_mmio_fixed_1].
    #[inline]
    pub const unsafe fn new_mmio_fixed_5() -> MmioTc16<'static> {
        unsafe { Self::new_mmio_at(TC_5_BASE_ADDR) }
    }
}
