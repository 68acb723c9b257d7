//! Physical timer/counter units and their per-unit state.
use core::cell::RefCell;

use atmega2560::{tc::TimerId, tc8::Tc8, tc16::Tc16};
use critical_section::Mutex;

use super::{
    AsyncClock, Channel, ClockSource, Interrupt16, SyncClock,
    delay::{self, AsyncSession},
    regs::{Tc2Registers, Tc8Registers, Tc16Registers, TimerRegisters},
    sealed::Sealed,
};

/// State of a unit which is shared with its interrupt handlers.
#[derive(Debug)]
pub struct UnitState {
    pub(crate) taken: bool,
    /// Indexed by [Interrupt16].
    pub(crate) callbacks: [Option<fn()>; 5],
    pub(crate) session: Option<AsyncSession>,
}

impl UnitState {
    pub const fn new() -> Self {
        Self {
            taken: false,
            callbacks: [None; 5],
            session: None,
        }
    }
}

impl Default for UnitState {
    fn default() -> Self {
        Self::new()
    }
}

/// Ownership record, interrupt callbacks and asynchronous delay session of one unit.
pub struct UnitSlot(Mutex<RefCell<UnitState>>);

impl UnitSlot {
    pub const fn new() -> Self {
        Self(Mutex::new(RefCell::new(UnitState::new())))
    }

    /// Run `f` with interrupts disabled.
    #[inline]
    pub(crate) fn with<T>(&self, f: impl FnOnce(&mut UnitState) -> T) -> T {
        critical_section::with(|cs| f(&mut self.0.borrow_ref_mut(cs)))
    }

    /// Mark the unit as owned. Returns [false] if it already is.
    pub(crate) fn claim(&self) -> bool {
        self.with(|state| {
            if state.taken {
                return false;
            }
            *state = UnitState::new();
            state.taken = true;
            true
        })
    }

    pub(crate) fn release(&self) {
        self.with(|state| {
            state.session = None;
            state.taken = false;
        });
    }

    pub fn is_taken(&self) -> bool {
        self.with(|state| state.taken)
    }
}

impl Default for UnitSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile-time description of one timer/counter unit.
///
/// This trait is sealed, it is implemented for [Tc0] to [Tc5].
pub trait TimerUnit: Sealed + 'static {
    const NAME: &'static str;
    /// Platform service which relies on this unit.
    const SHARED_WITH: Option<&'static str>;
    /// The overflow interrupt belongs to the platform service and can not be used.
    const OVERFLOW_RESERVED: bool;

    type Registers: TimerRegisters;
    type Clock: ClockSource;

    /// # Safety
    ///
    /// Circumvents ownership and safety guarantees of the HAL. The returned registers alias
    /// the registers owned by the driver of the unit.
    unsafe fn steal_registers() -> Self::Registers;

    fn slot() -> &'static UnitSlot;
}

macro_rules! timer_unit {
    (
        $(#[$meta:meta])*
        $Unit:ident, $name:literal, $Regs:ident, $mmio:expr, $Clock:ty,
        shared: $shared:expr, overflow_reserved: $reserved:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub enum $Unit {}

        impl Sealed for $Unit {}

        impl TimerUnit for $Unit {
            const NAME: &'static str = $name;
            const SHARED_WITH: Option<&'static str> = $shared;
            const OVERFLOW_RESERVED: bool = $reserved;

            type Registers = $Regs;
            type Clock = $Clock;

            #[inline]
            unsafe fn steal_registers() -> $Regs {
                unsafe { $Regs::new(TimerId::$Unit, $mmio) }
            }

            #[inline]
            fn slot() -> &'static UnitSlot {
                static SLOT: UnitSlot = UnitSlot::new();
                &SLOT
            }
        }
    };
}

timer_unit!(
    /// TC0, 8-bit. Platform timekeeping runs on its overflow interrupt.
    Tc0, "TC0", Tc8Registers, Tc8::new_mmio_fixed_0(), SyncClock,
    shared: Some("platform timekeeping (millis, micros and delay)"), overflow_reserved: true
);
timer_unit!(
    /// TC1, 16-bit.
    Tc1, "TC1", Tc16Registers, Tc16::new_mmio_fixed_1(), SyncClock,
    shared: None, overflow_reserved: false
);
timer_unit!(
    /// TC2, 8-bit with asynchronous clocking. Used by tone generation.
    Tc2, "TC2", Tc2Registers, Tc8::new_mmio_fixed_2(), AsyncClock,
    shared: Some("tone generation"), overflow_reserved: false
);
timer_unit!(
    /// TC3, 16-bit.
    Tc3, "TC3", Tc16Registers, Tc16::new_mmio_fixed_3(), SyncClock,
    shared: None, overflow_reserved: false
);
timer_unit!(
    /// TC4, 16-bit.
    Tc4, "TC4", Tc16Registers, Tc16::new_mmio_fixed_4(), SyncClock,
    shared: None, overflow_reserved: false
);
timer_unit!(
    /// TC5, 16-bit.
    Tc5, "TC5", Tc16Registers, Tc16::new_mmio_fixed_5(), SyncClock,
    shared: None, overflow_reserved: false
);

/// Compare match interrupt handler.
///
/// Advances the asynchronous delay running on `channel`, or invokes the compare match
/// callback of the channel if no delay runs on it. Once a delay completes, the callback of its
/// channel is invoked as well.
///
/// # Safety
///
/// Must only be called from the compare match vector of `channel` of the unit.
pub unsafe fn on_compare_match_interrupt<U: TimerUnit>(channel: Channel) {
    let callback = U::slot().with(|state| {
        let mut regs = unsafe { U::steal_registers() };
        delay::on_compare_match(state, &mut regs, channel)
    });
    if let Some(callback) = callback {
        callback();
    }
}

/// Overflow interrupt handler.
///
/// # Safety
///
/// Must only be called from the overflow vector of the unit.
pub unsafe fn on_overflow_interrupt<U: TimerUnit>() {
    invoke_callback::<U>(Interrupt16::Overflow);
}

/// Input capture interrupt handler.
///
/// # Safety
///
/// Must only be called from the input capture vector of the unit.
pub unsafe fn on_input_capture_interrupt<U: TimerUnit>() {
    invoke_callback::<U>(Interrupt16::InputCapture);
}

fn invoke_callback<U: TimerUnit>(source: Interrupt16) {
    if let Some(callback) = U::slot().with(|state| state.callbacks[source as usize]) {
        callback();
    }
}

/// Interrupt vectors of all units. TIMER0_OVF is left to platform timekeeping.
#[cfg(all(target_arch = "avr", feature = "rt"))]
mod vectors {
    use super::*;

    macro_rules! compare_vectors {
        ($n:literal, $Unit:ident, [$($ch:ident),+]) => {
            paste::paste! {
                $(
                    #[avr_device::interrupt(atmega2560)]
                    fn [<TIMER $n _COMP $ch>]() {
                        unsafe { on_compare_match_interrupt::<$Unit>(Channel::$ch) }
                    }
                )+
            }
        };
    }

    macro_rules! overflow_vector {
        ($n:literal, $Unit:ident) => {
            paste::paste! {
                #[avr_device::interrupt(atmega2560)]
                fn [<TIMER $n _OVF>]() {
                    unsafe { on_overflow_interrupt::<$Unit>() }
                }
            }
        };
    }

    macro_rules! capture_vector {
        ($n:literal, $Unit:ident) => {
            paste::paste! {
                #[avr_device::interrupt(atmega2560)]
                fn [<TIMER $n _CAPT>]() {
                    unsafe { on_input_capture_interrupt::<$Unit>() }
                }
            }
        };
    }

    compare_vectors!(0, Tc0, [A, B]);

    compare_vectors!(2, Tc2, [A, B]);
    overflow_vector!(2, Tc2);

    compare_vectors!(1, Tc1, [A, B, C]);
    overflow_vector!(1, Tc1);
    capture_vector!(1, Tc1);

    compare_vectors!(3, Tc3, [A, B, C]);
    overflow_vector!(3, Tc3);
    capture_vector!(3, Tc3);

    compare_vectors!(4, Tc4, [A, B, C]);
    overflow_vector!(4, Tc4);
    capture_vector!(4, Tc4);

    compare_vectors!(5, Tc5, [A, B, C]);
    overflow_vector!(5, Tc5);
    capture_vector!(5, Tc5);
}
