//! Register simulator for the host tests.
//!
//! The counter only advances while the flags are polled, that is read again without any other
//! register access in between, which is what the delay engine spins on. It also advances
//! while [SimRegisters::next_interrupt] looks for the next interrupt to dispatch. One
//! simulated tick holds the current counter value. At the end of the tick the compare flags of
//! matching channels and, at `COUNTER_MAX`, the overflow flag are raised, then the counter
//! increments. That is the normal mode timing of the hardware.
use core::cell::RefCell;
use std::{thread::LocalKey, vec::Vec};

use arbitrary_int::u3;
use atmega2560::{
    tc::{ControlA, InterruptBits},
    tc8::Assr,
};

use super::{
    BusyFlag, Channel, Interrupt16,
    regs::{AsyncStatusRegisters, Registers8, Registers16, TimerRegisters},
    unit::{
        TimerUnit, on_compare_match_interrupt, on_input_capture_interrupt, on_overflow_interrupt,
    },
};

/// Flag clear which was observed by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trace {
    Overflow { at: u64 },
    Compare { channel: Channel, value: u16, at: u64 },
}

/// Access to the asynchronous clock domain of an 8-bit unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncEvent {
    Assr { as2: bool, exclk: bool },
    /// Register write while AS2 is set.
    Write(BusyFlag),
    /// Register write while the busy flag of a previous write was still set.
    Overrun(BusyFlag),
    /// The busy flag of a write cleared.
    Settled(BusyFlag),
}

/// ASSR reads for which the busy flag of a write stays set.
pub const BUSY_READS: u8 = 2;

const AS2: u8 = 1 << 5;
const EXCLK: u8 = 1 << 6;

#[derive(Debug, Default)]
pub struct SimState {
    pub ctrl_a: u8,
    pub ctrl_b: u8,
    pub counter: u16,
    pub compare: [u16; 3],
    pub input_capture: u16,
    pub mask: u8,
    pub flags: u8,
    /// Counter value and tick at which each flag bit was raised.
    raised: [(u16, u64); 8],
    /// Ticks counted since the simulation started.
    pub elapsed: u64,
    pub trace: Vec<Trace>,
    pub forced: Vec<Channel>,
    /// The last register access was a flag read.
    polled: bool,
    /// AS2 and EXCLK.
    pub assr: u8,
    /// Remaining ASSR reads until each busy flag clears, indexed by [BusyFlag].
    pub busy: [u8; 5],
    pub async_events: Vec<AsyncEvent>,
}

std::thread_local! {
    static SCRATCH8: RefCell<SimState> = RefCell::new(SimState::new());
    static SCRATCH16: RefCell<SimState> = RefCell::new(SimState::new());
}

const COMPARE_BITS: [(Channel, u8); 3] = [(Channel::A, 1), (Channel::B, 2), (Channel::C, 3)];
const OVERFLOW_BIT: u8 = 0;

impl SimState {
    pub const fn new() -> Self {
        Self {
            ctrl_a: 0,
            ctrl_b: 0,
            counter: 0,
            compare: [0; 3],
            input_capture: 0,
            mask: 0,
            flags: 0,
            raised: [(0, 0); 8],
            elapsed: 0,
            trace: Vec::new(),
            forced: Vec::new(),
            polled: false,
            assr: 0,
            busy: [0; 5],
            async_events: Vec::new(),
        }
    }

    /// Fresh 8-bit registers, private to the calling test thread.
    pub fn registers8() -> SimRegisters<false> {
        SCRATCH8.with(|state| *state.borrow_mut() = SimState::new());
        SimRegisters::new(&SCRATCH8)
    }

    /// Fresh 16-bit registers, private to the calling test thread.
    pub fn registers16() -> SimRegisters<true> {
        SCRATCH16.with(|state| *state.borrow_mut() = SimState::new());
        SimRegisters::new(&SCRATCH16)
    }

    fn running(&self) -> bool {
        self.ctrl_b & 0b111 != 0
    }

    fn raise(&mut self, bit: u8, value: u16) {
        if self.flags & (1 << bit) == 0 {
            self.flags |= 1 << bit;
            self.raised[bit as usize] = (value, self.elapsed);
        }
    }

    fn tick(&mut self, max: u16, channels: usize) {
        self.elapsed += 1;
        let value = self.counter;
        for &(channel, bit) in &COMPARE_BITS[..channels] {
            if self.compare[channel as usize] == value {
                self.raise(bit, value);
            }
        }
        if value == max {
            self.raise(OVERFLOW_BIT, value);
            self.counter = 0;
        } else {
            self.counter = value + 1;
        }
    }

    /// Tick until a flag which was clear gets raised. Gives up after one counter cycle.
    fn advance(&mut self, max: u16, channels: usize) {
        if !self.running() {
            return;
        }
        let before = self.flags;
        for _ in 0..=max as u32 {
            self.tick(max, channels);
            if self.flags & !before != 0 {
                break;
            }
        }
    }

    /// Track a write into the asynchronous clock domain.
    fn written(&mut self, flag: BusyFlag) {
        if self.assr & AS2 == 0 {
            return;
        }
        if self.busy[flag as usize] != 0 {
            self.async_events.push(AsyncEvent::Overrun(flag));
        }
        self.async_events.push(AsyncEvent::Write(flag));
        self.busy[flag as usize] = BUSY_READS;
    }

    fn read_assr(&mut self) -> u8 {
        let mut value = self.assr;
        for flag in BusyFlag::ALL {
            let remaining = &mut self.busy[flag as usize];
            if *remaining == 0 {
                continue;
            }
            value |= 1 << flag as u8;
            *remaining -= 1;
            if *remaining == 0 {
                self.async_events.push(AsyncEvent::Settled(flag));
            }
        }
        value
    }

    fn clear(&mut self, bits: u8) {
        for bit in 0..8 {
            let flag = 1 << bit;
            if bits & flag == 0 || self.flags & flag == 0 {
                continue;
            }
            self.flags &= !flag;
            let (value, at) = self.raised[bit as usize];
            if bit == OVERFLOW_BIT {
                self.trace.push(Trace::Overflow { at });
            } else if let Some(&(channel, _)) = COMPARE_BITS.iter().find(|(_, b)| *b == bit) {
                self.trace.push(Trace::Compare { channel, value, at });
            }
        }
    }
}

/// [TimerRegisters] backed by a thread local [SimState].
#[derive(Clone, Copy)]
pub struct SimRegisters<const WIDE: bool> {
    state: &'static LocalKey<RefCell<SimState>>,
}

impl<const WIDE: bool> SimRegisters<WIDE> {
    const CHANNEL_COUNT: usize = if WIDE { 3 } else { 2 };

    pub const fn new(state: &'static LocalKey<RefCell<SimState>>) -> Self {
        Self { state }
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut SimState) -> T) -> T {
        self.state.with(|state| {
            let mut state = state.borrow_mut();
            state.polled = false;
            f(&mut state)
        })
    }

    /// Tick until an enabled interrupt is pending, then clear its flag like the hardware does
    /// when it enters the vector. Highest priority first.
    pub fn next_interrupt(&self, limit: u64) -> Option<Interrupt16> {
        const PRIORITY: [(Interrupt16, u8); 5] = [
            (Interrupt16::InputCapture, 5),
            (Interrupt16::CompareMatchA, 1),
            (Interrupt16::CompareMatchB, 2),
            (Interrupt16::CompareMatchC, 3),
            (Interrupt16::Overflow, 0),
        ];
        self.with(|state| {
            let mut spent = 0;
            loop {
                let pending = state.flags & state.mask;
                let next = PRIORITY.iter().find(|(_, b)| pending & (1 << b) != 0);
                if let Some(&(source, bit)) = next {
                    state.clear(1 << bit);
                    return Some(source);
                }
                if !state.running() || spent >= limit {
                    return None;
                }
                state.tick(Self::COUNTER_MAX, Self::CHANNEL_COUNT);
                spent += 1;
            }
        })
    }
}

impl<const WIDE: bool> TimerRegisters for SimRegisters<WIDE> {
    const COUNTER_MAX: u16 = if WIDE { u16::MAX } else { u8::MAX as u16 };
    const CHANNELS: &'static [Channel] = if WIDE {
        &[Channel::A, Channel::B, Channel::C]
    } else {
        &[Channel::A, Channel::B]
    };

    fn read_ctrl_a(&self) -> ControlA {
        ControlA::new_with_raw_value(self.with(|s| s.ctrl_a))
    }

    fn write_ctrl_a(&mut self, value: ControlA) {
        self.with(|s| {
            s.ctrl_a = value.raw_value();
            s.written(BusyFlag::ControlA);
        });
    }

    fn read_ctrl_b_raw(&self) -> u8 {
        self.with(|s| s.ctrl_b)
    }

    fn write_ctrl_b_raw(&mut self, value: u8) {
        // FOC strobes read as zero.
        let strobes = if WIDE { 0 } else { 0b1100_0000 };
        self.with(|s| {
            s.ctrl_b = value & !strobes;
            s.written(BusyFlag::ControlB);
        });
    }

    fn read_clock_select(&self) -> u3 {
        u3::new(self.with(|s| s.ctrl_b & 0b111))
    }

    fn write_clock_select(&mut self, cs: u3) {
        self.with(|s| {
            s.ctrl_b = (s.ctrl_b & !0b111) | cs.value();
            s.written(BusyFlag::ControlB);
        });
    }

    fn read_counter(&self) -> u16 {
        self.with(|s| s.counter)
    }

    fn write_counter(&mut self, value: u16) {
        self.with(|s| {
            s.counter = value & Self::COUNTER_MAX;
            s.written(BusyFlag::Counter);
        });
    }

    fn read_compare(&self, channel: Channel) -> u16 {
        if (channel as usize) < Self::CHANNEL_COUNT {
            self.with(|s| s.compare[channel as usize])
        } else {
            0
        }
    }

    fn write_compare(&mut self, channel: Channel, value: u16) {
        if (channel as usize) < Self::CHANNEL_COUNT {
            self.with(|s| {
                s.compare[channel as usize] = value & Self::COUNTER_MAX;
                match channel {
                    Channel::A => s.written(BusyFlag::CompareA),
                    Channel::B => s.written(BusyFlag::CompareB),
                    Channel::C => (),
                }
            });
        }
    }

    fn force_compare(&mut self, channel: Channel) {
        self.with(|s| s.forced.push(channel));
    }

    fn read_interrupt_mask(&self) -> InterruptBits {
        InterruptBits::new_with_raw_value(self.with(|s| s.mask))
    }

    fn write_interrupt_mask(&mut self, value: InterruptBits) {
        self.with(|s| s.mask = value.raw_value());
    }

    fn read_interrupt_flags(&self) -> InterruptBits {
        self.state.with(|state| {
            let mut s = state.borrow_mut();
            if s.polled {
                s.advance(Self::COUNTER_MAX, Self::CHANNEL_COUNT);
            }
            s.polled = true;
            InterruptBits::new_with_raw_value(s.flags)
        })
    }

    fn clear_interrupt_flags(&mut self, bits: InterruptBits) {
        self.with(|s| s.clear(bits.raw_value()));
    }
}

impl Registers8 for SimRegisters<false> {}

impl AsyncStatusRegisters for SimRegisters<false> {
    fn read_assr(&self) -> Assr {
        Assr::new_with_raw_value(self.with(|s| s.read_assr()))
    }

    fn write_assr(&mut self, value: Assr) {
        let raw = value.raw_value() & (AS2 | EXCLK);
        self.with(|s| {
            s.assr = raw;
            s.async_events.push(AsyncEvent::Assr {
                as2: raw & AS2 != 0,
                exclk: raw & EXCLK != 0,
            });
        });
    }
}

impl Registers16 for SimRegisters<true> {
    fn read_input_capture(&self) -> u16 {
        self.with(|s| s.input_capture)
    }

    fn write_input_capture(&mut self, value: u16) {
        self.with(|s| s.input_capture = value);
    }
}

/// Dispatch interrupts of the simulated unit `U` until `done` returns true. Returns false if
/// `limit` interrupts were dispatched or the unit stopped without `done` becoming true.
pub fn run_until<U, const WIDE: bool>(limit: usize, mut done: impl FnMut() -> bool) -> bool
where
    U: TimerUnit<Registers = SimRegisters<WIDE>>,
{
    // SAFETY: the simulator has no hardware behind it.
    let regs = unsafe { U::steal_registers() };
    for _ in 0..limit {
        if done() {
            return true;
        }
        let Some(source) = regs.next_interrupt(1 << 20) else {
            return done();
        };
        unsafe {
            match source {
                Interrupt16::CompareMatchA => on_compare_match_interrupt::<U>(Channel::A),
                Interrupt16::CompareMatchB => on_compare_match_interrupt::<U>(Channel::B),
                Interrupt16::CompareMatchC => on_compare_match_interrupt::<U>(Channel::C),
                Interrupt16::Overflow => on_overflow_interrupt::<U>(),
                Interrupt16::InputCapture => on_input_capture_interrupt::<U>(),
            }
        }
    }
    done()
}

/// Declare a simulated timer unit with its own thread local registers and slot.
///
/// Every test needs its own unit, the slots are shared by all test threads.
macro_rules! sim_unit {
    ($Unit:ident, wide: $wide:literal, $Clock:ty) => {
        $crate::timer::sim::sim_unit!(
            $Unit, wide: $wide, $Clock, shared: None, overflow_reserved: false
        );
    };
    (
        $Unit:ident, wide: $wide:literal, $Clock:ty,
        shared: $shared:expr, overflow_reserved: $reserved:literal
    ) => {
        paste::paste! {
            std::thread_local! {
                static [<$Unit:upper _SIM>]: core::cell::RefCell<$crate::timer::sim::SimState> =
                    core::cell::RefCell::new($crate::timer::sim::SimState::new());
            }

            pub(crate) enum $Unit {}

            impl $crate::timer::sealed::Sealed for $Unit {}

            impl $crate::timer::TimerUnit for $Unit {
                const NAME: &'static str = stringify!($Unit);
                const SHARED_WITH: Option<&'static str> = $shared;
                const OVERFLOW_RESERVED: bool = $reserved;

                type Registers = $crate::timer::sim::SimRegisters<$wide>;
                type Clock = $Clock;

                unsafe fn steal_registers() -> Self::Registers {
                    $crate::timer::sim::SimRegisters::new(&[<$Unit:upper _SIM>])
                }

                fn slot() -> &'static $crate::timer::UnitSlot {
                    static SLOT: $crate::timer::UnitSlot = $crate::timer::UnitSlot::new();
                    &SLOT
                }
            }
        }
    };
}

pub(crate) use sim_unit;
