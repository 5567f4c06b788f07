//! Per-cluster error accumulation.

use casemix_stays::{Stay, StayError};

/// Accumulates numeric error codes for one cluster. `main_error` is the
/// highest-priority code seen so far (lower priority values win; ties keep
/// the first).
#[derive(Clone, Debug, Default)]
pub struct ErrorSet {
    main_error: i16,
    priority: i32,
    bits: [u64; 8],
}

impl ErrorSet {
    pub fn new() -> ErrorSet {
        ErrorSet::default()
    }

    pub fn add(&mut self, error: i16, priority: i32) {
        if (0..512).contains(&(error as i32)) {
            self.bits[error as usize / 64] |= 1 << (error as usize % 64);
        }
        if self.main_error == 0 || priority < self.priority {
            self.main_error = error;
            self.priority = priority;
        }
    }

    pub fn contains(&self, error: i16) -> bool {
        (0..512).contains(&(error as i32))
            && self.bits[error as usize / 64] & (1 << (error as usize % 64)) != 0
    }

    pub fn main_error(&self) -> i16 {
        self.main_error
    }

    pub fn is_empty(&self) -> bool {
        self.main_error == 0
    }
}

/// Classification codes for loader-detected anomalies, in priority order
/// (earlier entries win the `main_error` slot).
const STAY_ERROR_CODES: [(StayError, i16); 24] = [
    (StayError::UnknownRumVersion, 59),
    (StayError::MalformedBillId, 61),
    (StayError::MalformedEntryDate, 20),
    (StayError::MalformedExitDate, 29),
    (StayError::MalformedBirthdate, 14),
    (StayError::MalformedSex, 13),
    (StayError::MalformedEntryMode, 25),
    (StayError::MalformedEntryOrigin, 26),
    (StayError::MalformedExitMode, 34),
    (StayError::MalformedExitDestination, 35),
    (StayError::MalformedSessionCount, 36),
    (StayError::MalformedGestationalAge, 41),
    (StayError::MalformedNewbornWeight, 42),
    (StayError::MalformedLastMenstrualPeriod, 43),
    (StayError::MalformedIgs2, 45),
    (StayError::MalformedConfirmation, 46),
    (StayError::MalformedMainDiagnosis, 67),
    (StayError::MalformedLinkedDiagnosis, 68),
    (StayError::MissingOtherDiagnosesCount, 55),
    (StayError::MalformedOtherDiagnosesCount, 56),
    (StayError::MalformedOtherDiagnosis, 70),
    (StayError::MissingProceduresCount, 57),
    (StayError::MalformedProceduresCount, 58),
    (StayError::MalformedProcedureCode, 73),
];

/// Fold a stay's parse anomalies into the cluster error set.
pub fn add_stay_errors(errors: &mut ErrorSet, stay: &Stay) {
    if stay.error_mask == 0 {
        return;
    }
    for (rank, (bit, code)) in STAY_ERROR_CODES.iter().enumerate() {
        if stay.has_error(*bit) {
            errors.add(*code, 100 + rank as i32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_priority_wins_main_error() {
        let mut errors = ErrorSet::new();
        errors.add(70, 120);
        assert_eq!(errors.main_error(), 70);
        errors.add(20, 102);
        assert_eq!(errors.main_error(), 20);
        errors.add(13, 110);
        assert_eq!(errors.main_error(), 20);
        assert!(errors.contains(70));
        assert!(errors.contains(13));
    }

    #[test]
    fn stay_error_mapping() {
        let mut stay = Stay::default();
        stay.set_error(StayError::MalformedSex);
        stay.set_error(StayError::MalformedEntryDate);

        let mut errors = ErrorSet::new();
        add_stay_errors(&mut errors, &stay);
        // Entry date outranks sex in the priority table.
        assert_eq!(errors.main_error(), 20);
        assert!(errors.contains(13));
    }
}
