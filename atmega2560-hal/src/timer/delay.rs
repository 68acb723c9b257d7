//! Delay engine.
//!
//! A delay is converted into timer ticks, which are then counted in full counter cycles plus
//! one partial cycle that ends on a compare match. The counter runs in normal mode from zero,
//! so one full cycle is `COUNTER_MAX + 1` ticks long and ends with an overflow.
use arbitrary_int::u3;

use super::{
    Channel,
    regs::{
        OVERFLOW, RegisterSnapshot, TimerRegisters, compare_flag, difference, intersects, union,
    },
    unit::UnitState,
};

const MICROS_PER_SECOND: u64 = 1_000_000;

/// Number of timer ticks in `micros` microseconds for a timer clocked with
/// `cpu_hz / divisor`.
///
/// The result is truncated. The arithmetic is split into whole seconds and the sub-second
/// rest, so it does not overflow for any duration a [u32] value can express. Values which do
/// not fit into [u64] saturate.
pub fn ticks(micros: u64, cpu_hz: u32, divisor: u32) -> u64 {
    let divisor = divisor.max(1) as u64;
    let cpu_hz = cpu_hz as u64;
    let whole_seconds = (micros / MICROS_PER_SECOND).saturating_mul(cpu_hz);
    let sub_second = (micros % MICROS_PER_SECOND) * cpu_hz;
    // floor((whole_seconds * 1e6 + sub_second) / (divisor * 1e6))
    let quotient = whole_seconds / divisor;
    let rest = (whole_seconds % divisor) * MICROS_PER_SECOND + sub_second;
    quotient.saturating_add(rest / (divisor * MICROS_PER_SECOND))
}

/// Tick count split into full counter cycles and a partial cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub overflows: u64,
    /// Always smaller than the counter range.
    pub remainder: u32,
}

#[inline]
pub const fn split_ticks(ticks: u64, range: u32) -> Split {
    Split {
        overflows: ticks / range as u64,
        remainder: (ticks % range as u64) as u32,
    }
}

/// Compare match schedule of an asynchronous delay.
///
/// Every cycle but the last ends on a compare match at `COUNTER_MAX`. The last one ends on
/// `final_compare`. If the tick count is a multiple of the counter range the last cycle is a
/// full one as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncPlan {
    pub cycles: u64,
    pub final_compare: u16,
}

impl AsyncPlan {
    /// [None] for a zero tick count.
    pub const fn new(ticks: u64, counter_max: u16) -> Option<Self> {
        if ticks == 0 {
            return None;
        }
        let split = split_ticks(ticks, counter_max as u32 + 1);
        Some(if split.remainder == 0 {
            AsyncPlan {
                cycles: split.overflows,
                final_compare: counter_max,
            }
        } else {
            AsyncPlan {
                cycles: split.overflows + 1,
                final_compare: (split.remainder - 1) as u16,
            }
        })
    }

    /// Compare value which ends the cycle when `remaining` cycles are left.
    #[inline]
    pub const fn compare_for(&self, remaining: u64, counter_max: u16) -> u16 {
        if remaining <= 1 {
            self.final_compare
        } else {
            counter_max
        }
    }
}

/// Bookkeeping of a running asynchronous delay.
#[derive(Debug, Clone, Copy)]
pub struct AsyncSession {
    pub target_ticks: u64,
    pub plan: AsyncPlan,
    pub remaining_cycles: u64,
    pub channel: Channel,
    pub saved: RegisterSnapshot,
}

/// Count `ticks` ticks by polling the flags. Must run with interrupts disabled.
///
/// `cs` is the clock select used while counting. The registers are restored afterwards.
pub(crate) fn blocking<R: TimerRegisters>(regs: &mut R, ticks: u64, cs: u3, channel: Channel) {
    if ticks == 0 {
        return;
    }
    let saved = regs.snapshot();
    let split = split_ticks(ticks, R::counter_range());
    let target = compare_flag(channel);

    regs.configure_normal_mode();
    regs.clear_interrupt_flags(union(OVERFLOW, target));
    regs.write_clock_select(cs);

    for _ in 0..split.overflows {
        while !regs.read_interrupt_flags().overflow() {}
        regs.clear_interrupt_flags(OVERFLOW);
    }
    if split.remainder > 0 {
        regs.write_compare(channel, (split.remainder - 1) as u16);
        // A match from one of the full cycles may still be pending.
        regs.clear_interrupt_flags(target);
        while !intersects(regs.read_interrupt_flags(), target) {}
        regs.clear_interrupt_flags(target);
    }

    // The counter of the snapshot was frozen, so every overflow and compare match seen in
    // between came from the delay. Input capture events are external and stay pending.
    regs.restore(&saved, union(OVERFLOW, R::compare_flags()));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AsyncStart {
    Started,
    AlreadyActive,
    /// Zero ticks, nothing to wait for.
    Elapsed,
}

/// Must run with interrupts disabled.
pub(crate) fn start_async<R: TimerRegisters>(
    state: &mut UnitState,
    regs: &mut R,
    ticks: u64,
    cs: u3,
    channel: Channel,
) -> AsyncStart {
    if state.session.is_some() {
        return AsyncStart::AlreadyActive;
    }
    let Some(plan) = AsyncPlan::new(ticks, R::COUNTER_MAX) else {
        return AsyncStart::Elapsed;
    };
    let saved = regs.snapshot();
    let target = compare_flag(channel);

    regs.configure_normal_mode();
    regs.write_compare(channel, plan.compare_for(plan.cycles, R::COUNTER_MAX));
    regs.clear_interrupt_flags(target);
    regs.modify_interrupt_mask(|mask| union(mask, target));
    state.session = Some(AsyncSession {
        target_ticks: ticks,
        plan,
        remaining_cycles: plan.cycles,
        channel,
        saved,
    });
    regs.write_clock_select(cs);
    AsyncStart::Started
}

/// Advance the session of `channel` by one cycle. Returns the callback to invoke once the
/// interrupt state is released.
///
/// Without a session on `channel`, the registered compare match callback is returned.
pub(crate) fn on_compare_match<R: TimerRegisters>(
    state: &mut UnitState,
    regs: &mut R,
    channel: Channel,
) -> Option<fn()> {
    let callback = state.callbacks[channel.interrupt() as usize];
    let Some(session) = state.session.as_mut().filter(|s| s.channel == channel) else {
        return callback;
    };
    session.remaining_cycles = session.remaining_cycles.saturating_sub(1);
    if session.remaining_cycles == 0 {
        let saved = session.saved;
        state.session = None;
        let target = compare_flag(channel);
        regs.modify_interrupt_mask(|mask| difference(mask, target));
        // Other sources keep counting during a session, their pending flags are delivered.
        regs.restore(&saved, target);
        return callback;
    }
    let next = session.plan.compare_for(session.remaining_cycles, R::COUNTER_MAX);
    regs.write_compare(channel, next);
    None
}

/// Cancel the running session without invoking its callback. Returns whether a session was
/// running. Must run with interrupts disabled.
pub(crate) fn cancel_async<R: TimerRegisters>(state: &mut UnitState, regs: &mut R) -> bool {
    let Some(session) = state.session.take() else {
        return false;
    };
    let target = compare_flag(session.channel);
    regs.modify_interrupt_mask(|mask| difference(mask, target));
    regs.clear_interrupt_flags(target);
    regs.restore(&session.saved, target);
    true
}
