//! Prescaler reset and timer synchronization.
//!
//! TC0, TC1, TC3, TC4 and TC5 share the synchronous prescaler, TC2 has the asynchronous one.
//! Resetting a prescaler restarts the count towards the next timer clock, so timers started
//! afterwards tick in phase. For a tighter start, [start_synchronization] holds both prescalers
//! in reset while the timers are configured and [stop_synchronization] releases all of them at
//! once.
//!
//! All operations affect the platform services running on TC0 and TC2.
use atmega2560::gtccr::{GeneralTimerControl, Gtccr, MmioGeneralTimerControl};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrescalerOp {
    ResetSync,
    ResetAsync,
    ResetAll,
    StartSynchronization,
    StopSynchronization,
}

impl PrescalerOp {
    /// New GTCCR value for the operation.
    pub const fn apply(self, value: Gtccr) -> Gtccr {
        match self {
            PrescalerOp::ResetSync => value.with_tsm(false).with_psrsync(true),
            PrescalerOp::ResetAsync => value.with_tsm(false).with_psrasy(true),
            PrescalerOp::ResetAll => value.with_tsm(false).with_psrsync(true).with_psrasy(true),
            PrescalerOp::StartSynchronization => {
                value.with_tsm(true).with_psrsync(true).with_psrasy(true)
            }
            PrescalerOp::StopSynchronization => value.with_tsm(false),
        }
    }

    const fn affected(self) -> &'static str {
        match self {
            PrescalerOp::ResetSync => "platform timekeeping on TC0",
            PrescalerOp::ResetAsync => "tone generation on TC2",
            _ => "platform timekeeping on TC0 and tone generation on TC2",
        }
    }

    const fn action(self) -> &'static str {
        match self {
            PrescalerOp::ResetSync => "resetting the synchronous prescaler",
            PrescalerOp::ResetAsync => "resetting the asynchronous prescaler",
            PrescalerOp::ResetAll => "resetting all prescalers",
            PrescalerOp::StartSynchronization => "holding all prescalers in reset",
            PrescalerOp::StopSynchronization => "releasing all prescalers",
        }
    }
}

fn update_register(gtccr: &mut MmioGeneralTimerControl<'_>, op: PrescalerOp) {
    warning!("{} affects {}", op.action(), op.affected());
    critical_section::with(|_| gtccr.modify_gtccr(|value| op.apply(value)));
}

fn update(op: PrescalerOp) {
    // SAFETY: GTCCR is only modified inside critical sections of this module.
    let mut gtccr = unsafe { GeneralTimerControl::new_mmio_fixed() };
    update_register(&mut gtccr, op);
}

/// Reset the prescaler of TC0, TC1, TC3, TC4 and TC5.
pub fn reset_sync_prescaler() {
    update(PrescalerOp::ResetSync);
}

/// Reset the prescaler of TC2.
pub fn reset_async_prescaler() {
    update(PrescalerOp::ResetAsync);
}

pub fn reset_all_prescalers() {
    update(PrescalerOp::ResetAll);
}

/// Hold both prescalers in reset until [stop_synchronization] is called. Timers configured in
/// between start counting at the same time.
pub fn start_synchronization() {
    update(PrescalerOp::StartSynchronization);
}

pub fn stop_synchronization() {
    update(PrescalerOp::StopSynchronization);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resets_leave_synchronization_mode() {
        let synced = Gtccr::new_with_raw_value(0b1000_0011);
        assert_eq!(PrescalerOp::ResetSync.apply(synced).raw_value(), 0b0000_0011);
        assert_eq!(
            PrescalerOp::ResetSync.apply(Gtccr::DEFAULT).raw_value(),
            0b0000_0001
        );
        assert_eq!(
            PrescalerOp::ResetAsync.apply(Gtccr::DEFAULT).raw_value(),
            0b0000_0010
        );
        assert_eq!(
            PrescalerOp::ResetAll.apply(Gtccr::DEFAULT).raw_value(),
            0b0000_0011
        );
    }

    #[test]
    fn register_update_keeps_other_operations() {
        let mut register = 0_u8;
        // Stands in for GTCCR, the block is one byte wide.
        let mut gtccr = unsafe {
            GeneralTimerControl::new_mmio(&raw mut register as *mut GeneralTimerControl)
        };
        update_register(&mut gtccr, PrescalerOp::StartSynchronization);
        assert_eq!(gtccr.read_gtccr().raw_value(), 0b1000_0011);
        update_register(&mut gtccr, PrescalerOp::StopSynchronization);
        assert_eq!(gtccr.read_gtccr().raw_value(), 0b0000_0011);
        gtccr.write_gtccr(Gtccr::DEFAULT.with_tsm(true));
        update_register(&mut gtccr, PrescalerOp::ResetAsync);
        assert_eq!(gtccr.read_gtccr().raw_value(), 0b0000_0010);
    }

    #[test]
    fn synchronization() {
        let held = PrescalerOp::StartSynchronization.apply(Gtccr::DEFAULT);
        assert_eq!(held.raw_value(), 0b1000_0011);
        let released = PrescalerOp::StopSynchronization.apply(held);
        assert!(!released.tsm());
        assert_eq!(released.raw_value(), 0b0000_0011);
    }
}
