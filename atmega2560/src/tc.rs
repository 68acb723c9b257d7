//! Register definitions shared by all timer/counter units.
//!
//! Control register A, the interrupt mask registers (TIMSKn) and the interrupt flag registers
//! (TIFRn) use the same bit positions on the 8-bit and on the 16-bit units. Fields which only
//! exist on the 16-bit units read as zero on the 8-bit units.
use arbitrary_int::u2;

/// Address of TIMSK0. TIMSKn is located at `TIMSK_BASE_ADDR + n`.
pub const TIMSK_BASE_ADDR: usize = 0x6E;
/// Address of TIFR0. TIFRn is located at `TIFR_BASE_ADDR + n`.
pub const TIFR_BASE_ADDR: usize = 0x35;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimerId {
    Tc0 = 0,
    Tc1 = 1,
    Tc2 = 2,
    Tc3 = 3,
    Tc4 = 4,
    Tc5 = 5,
}

/// Behaviour of an output compare pin on a compare match (COMnx1:0).
///
/// The exact meaning of toggle, clear and set depends on the waveform generation mode.
#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum CompareOutputMode {
    /// Normal port operation, the output compare pin is disconnected.
    Disconnected = 0b00,
    Toggle = 0b01,
    Clear = 0b10,
    Set = 0b11,
}

/// TCCRnA
#[bitbybit::bitfield(u8, default = 0x0, debug)]
pub struct ControlA {
    #[bits(6..=7, rw)]
    com_a: CompareOutputMode,
    #[bits(4..=5, rw)]
    com_b: CompareOutputMode,
    /// Only available on the 16-bit units.
    #[bits(2..=3, rw)]
    com_c: CompareOutputMode,
    /// WGMn1:0
    #[bits(0..=1, rw)]
    wgm_low: u2,
}

/// Bit layout of TIMSKn and TIFRn.
///
/// For the flag register, writing a one to a bit clears the flag. Writing zeros has no effect.
#[bitbybit::bitfield(u8, default = 0x0, debug)]
pub struct InterruptBits {
    /// ICIEn / ICFn, 16-bit units only.
    #[bit(5, rw)]
    input_capture: bool,
    /// OCIEnC / OCFnC, 16-bit units only.
    #[bit(3, rw)]
    compare_c: bool,
    #[bit(2, rw)]
    compare_b: bool,
    #[bit(1, rw)]
    compare_a: bool,
    /// TOIEn / TOVn
    #[bit(0, rw)]
    overflow: bool,
}

/// Timer interrupt mask register TIMSKn.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct InterruptMask {
    mask: InterruptBits,
}

static_assertions::const_assert_eq!(core::mem::size_of::<InterruptMask>(), 1);

impl InterruptMask {
    /// Create a new MMIO instance for the interrupt mask register of the given unit.
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    #[inline]
    pub const unsafe fn new_mmio_fixed(id: TimerId) -> MmioInterruptMask<'static> {
        unsafe { Self::new_mmio_at(TIMSK_BASE_ADDR + id as usize) }
    }
}

/// Timer interrupt flag register TIFRn.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct InterruptFlags {
    #[mmio(PureRead, Write)]
    flags: InterruptBits,
}

static_assertions::const_assert_eq!(core::mem::size_of::<InterruptFlags>(), 1);

impl InterruptFlags {
    /// Create a new MMIO instance for the interrupt flag register of the given unit.
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    #[inline]
    pub const unsafe fn new_mmio_fixed(id: TimerId) -> MmioInterruptFlags<'static> {
        unsafe { Self::new_mmio_at(TIFR_BASE_ADDR + id as usize) }
    }
}
