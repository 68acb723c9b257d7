//! General timer/counter control register.
//!
//! TC0, TC1, TC3, TC4 and TC5 share one synchronous prescaler. TC2 has its own asynchronous
//! prescaler.

pub const GTCCR_ADDR: usize = 0x43;

#[bitbybit::bitfield(u8, default = 0x0, debug)]
pub struct Gtccr {
    /// Timer/counter synchronization mode. While set, the prescaler reset bits stay set and
    /// the prescalers are held in reset.
    #[bit(7, rw)]
    tsm: bool,
    /// Prescaler reset of TC2.
    #[bit(1, rw)]
    psrasy: bool,
    /// Reset of the prescaler shared by the synchronous units.
    #[bit(0, rw)]
    psrsync: bool,
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct GeneralTimerControl {
    gtccr: Gtccr,
}

static_assertions::const_assert_eq!(core::mem::size_of::<GeneralTimerControl>(), 1);

impl GeneralTimerControl {
    /// Create a new MMIO instance at address [GTCCR_ADDR].
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    #[inline]
    pub const unsafe fn new_mmio_fixed() -> MmioGeneralTimerControl<'static> {
        unsafe { Self::new_mmio_at(GTCCR_ADDR) }
    }
}
