//! Classification results and the summary monoid.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use casemix_core::{GhmCode, GhsCode, Sector, SupplementCounters, UnitCode};

/// One classified cluster (or one RUM in mono mode). Stays are referenced
/// by position into the caller's input slice so results stay `'static`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyResult {
    pub bill_id: i32,
    pub stays_start: usize,
    pub stays_len: usize,
    /// Index of the main stay, relative to `stays_start`.
    pub main_stay_idx: usize,
    /// Unit of the main stay (per-RUM unit in mono results).
    pub unit: UnitCode,
    pub exit_date: Option<NaiveDate>,

    pub duration: i32,
    pub sector: Sector,

    pub ghm: GhmCode,
    pub main_error: i16,

    pub ghs: GhsCode,
    /// Negative = EXB days, positive = EXH days, 0 = within bounds.
    pub exb_exh: i32,
    pub ghs_cents: i64,
    pub price_cents: i64,
    pub supplement_days: SupplementCounters<i16>,
    pub supplement_cents: SupplementCounters<i32>,
    pub total_cents: i64,
}

impl ClassifyResult {
    pub fn is_failure(&self) -> bool {
        self.ghm.is_error() || !self.ghm.is_valid()
    }
}

/// Monoid over results: counts and euro-cent sums.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub results_count: usize,
    pub stays_count: usize,
    pub failures_count: usize,

    pub ghs_cents: i64,
    pub price_cents: i64,
    pub supplement_days: SupplementCounters<i32>,
    pub supplement_cents: SupplementCounters<i64>,
    pub total_cents: i64,
}

impl std::ops::AddAssign for Summary {
    fn add_assign(&mut self, other: Self) {
        self.results_count += other.results_count;
        self.stays_count += other.stays_count;
        self.failures_count += other.failures_count;
        self.ghs_cents += other.ghs_cents;
        self.price_cents += other.price_cents;
        self.supplement_days += other.supplement_days;
        self.supplement_cents += other.supplement_cents;
        self.total_cents += other.total_cents;
    }
}

impl std::ops::Add for Summary {
    type Output = Summary;

    fn add(mut self, other: Self) -> Summary {
        self += other;
        self
    }
}

pub fn summarize(results: &[ClassifyResult]) -> Summary {
    let mut summary = Summary::default();
    summary.results_count = results.len();
    for result in results {
        summary.stays_count += result.stays_len;
        summary.failures_count += result.is_failure() as usize;
        summary.ghs_cents += result.ghs_cents;
        summary.price_cents += result.price_cents;
        summary.supplement_days += result.supplement_days.widen();
        summary.supplement_cents += result.supplement_cents.widen();
        summary.total_cents += result.total_cents;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_is_a_monoid() {
        let a = Summary { results_count: 1, stays_count: 2, price_cents: 100, ..Default::default() };
        let b = Summary { results_count: 2, stays_count: 3, price_cents: 50, ..Default::default() };
        let sum = a + b;
        assert_eq!(sum.results_count, 3);
        assert_eq!(sum.stays_count, 5);
        assert_eq!(sum.price_cents, 150);
        assert_eq!(Summary::default() + a, a);
    }
}
