//! Dispensation: redistribute each cluster's price across its RUMs' care
//! units.
//!
//! Unit weights are the only floating-point values in the pipeline; the
//! euro split is done once per cluster with integer flooring, and the
//! rounding remainder goes to the last unit touched so the per-cluster sum
//! is conserved exactly.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use casemix_core::{CasemixError, SupplementCounters, UnitCode};

use crate::result::ClassifyResult;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispenseMode {
    /// Weight by mono GHS cents.
    E,
    /// Weight by mono price cents (EXB/EXH included).
    Ex,
    /// Price cents when the cluster hit EXB, GHS cents otherwise.
    Ex2,
    /// Weight by duration (at least 1 day).
    J,
    /// Duration × price cents.
    ExJ,
    /// Duration × (price if EXB else GHS).
    ExJ2,
}

impl DispenseMode {
    pub const ALL: [DispenseMode; 6] = [
        DispenseMode::E,
        DispenseMode::Ex,
        DispenseMode::Ex2,
        DispenseMode::J,
        DispenseMode::ExJ,
        DispenseMode::ExJ2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DispenseMode::E => "e",
            DispenseMode::Ex => "ex",
            DispenseMode::Ex2 => "ex2",
            DispenseMode::J => "j",
            DispenseMode::ExJ => "exj",
            DispenseMode::ExJ2 => "exj2",
        }
    }
}

impl FromStr for DispenseMode {
    type Err = CasemixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DispenseMode::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| CasemixError::MalformedCode(format!("unknown dispensation mode '{s}'")))
    }
}

/// Amount owed to one care unit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Due {
    pub unit: UnitCode,
    pub ghs_cents: i64,
    pub price_cents: i64,
    pub supplement_days: SupplementCounters<i32>,
    pub supplement_cents: SupplementCounters<i64>,
    pub total_cents: i64,
}

fn weight(mode: DispenseMode, cluster: &ClassifyResult, mono: &ClassifyResult) -> f64 {
    match mode {
        DispenseMode::E => mono.ghs_cents as f64,
        DispenseMode::Ex => mono.price_cents as f64,
        DispenseMode::Ex2 => {
            if cluster.exb_exh < 0 {
                mono.price_cents as f64
            } else {
                mono.ghs_cents as f64
            }
        }
        DispenseMode::J => mono.duration.max(1) as f64,
        DispenseMode::ExJ => mono.duration.max(1) as f64 * mono.price_cents as f64,
        DispenseMode::ExJ2 => {
            let cents = if cluster.exb_exh < 0 { mono.price_cents } else { mono.ghs_cents };
            mono.duration.max(1) as f64 * cents as f64
        }
    }
}

/// Split every cluster's price across its units. `mono_results` must hold
/// one result per RUM, in the same order as the clusters.
pub fn dispense(
    results: &[ClassifyResult],
    mono_results: &[ClassifyResult],
    mode: DispenseMode,
) -> Vec<Due> {
    let mut dues: Vec<Due> = Vec::new();
    let mut dues_map: HashMap<UnitCode, usize> = HashMap::new();

    let mut mono_offset = 0;
    for result in results {
        let monos = &mono_results[mono_offset..mono_offset + result.stays_len];
        mono_offset += result.stays_len;

        let mut weights: Vec<f64> = monos.iter().map(|mono| weight(mode, result, mono)).collect();
        let mut total: f64 = weights.iter().sum();
        if total == 0.0 {
            // Everything zero-priced: fall back to day counts.
            weights = monos.iter().map(|mono| weight(DispenseMode::J, result, mono)).collect();
            total = weights.iter().sum();
        }

        let mut distributed_ghs = 0i64;
        let mut distributed_price = 0i64;
        let mut last_due = 0usize;

        for (mono, unit_weight) in monos.iter().zip(&weights) {
            let share = unit_weight / total;
            let ghs_cents = (result.ghs_cents as f64 * share) as i64;
            let price_cents = (result.price_cents as f64 * share) as i64;

            let due_idx = *dues_map.entry(mono.unit).or_insert_with(|| {
                dues.push(Due { unit: mono.unit, ..Default::default() });
                dues.len() - 1
            });
            let due = &mut dues[due_idx];

            due.ghs_cents += ghs_cents;
            due.price_cents += price_cents;
            due.supplement_days += mono.supplement_days.widen();
            due.supplement_cents += mono.supplement_cents.widen();
            // Supplements are not redistributed: each RUM's own supplement
            // cents go with its unit.
            due.total_cents += price_cents + (mono.total_cents - mono.price_cents);

            distributed_ghs += ghs_cents;
            distributed_price += price_cents;
            last_due = due_idx;
        }

        // Flooring remainder goes to the last unit in iteration order.
        if !monos.is_empty() {
            let due = &mut dues[last_due];
            due.ghs_cents += result.ghs_cents - distributed_ghs;
            due.price_cents += result.price_cents - distributed_price;
            due.total_cents += result.price_cents - distributed_price;
        }
    }

    dues.sort_by_key(|due| due.unit);
    dues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(price_cents: i64, stays_len: usize) -> ClassifyResult {
        ClassifyResult {
            price_cents,
            ghs_cents: price_cents,
            total_cents: price_cents,
            stays_len,
            ..Default::default()
        }
    }

    fn mono(unit: i16, duration: i32, price_cents: i64) -> ClassifyResult {
        ClassifyResult {
            unit: UnitCode(unit),
            duration,
            price_cents,
            ghs_cents: price_cents,
            total_cents: price_cents,
            stays_len: 1,
            ..Default::default()
        }
    }

    #[test]
    fn conservation_is_exact() {
        let results = vec![cluster(100_001, 3)];
        let monos = vec![mono(1, 2, 300), mono(2, 3, 700), mono(3, 1, 500)];
        let dues = dispense(&results, &monos, DispenseMode::Ex);
        let total: i64 = dues.iter().map(|due| due.price_cents).sum();
        assert_eq!(total, 100_001);
    }

    #[test]
    fn exj_splits_by_duration_times_price() {
        let results = vec![cluster(90_000, 2)];
        let monos = vec![mono(1, 2, 1_000), mono(2, 2, 2_000)];
        let dues = dispense(&results, &monos, DispenseMode::ExJ);
        // Weights 2000 : 4000 → exactly one third / two thirds.
        assert_eq!(dues[0].price_cents, 30_000);
        assert_eq!(dues[1].price_cents, 60_000);
    }

    #[test]
    fn zero_weights_fall_back_to_days() {
        let results = vec![cluster(100, 2)];
        let monos = vec![mono(1, 3, 0), mono(2, 1, 0)];
        let dues = dispense(&results, &monos, DispenseMode::Ex);
        // Fallback J: weights 3 : 1.
        assert_eq!(dues[0].price_cents, 75);
        assert_eq!(dues[1].price_cents, 25);
    }

    #[test]
    fn same_unit_accumulates() {
        let results = vec![cluster(100, 2)];
        let monos = vec![mono(5, 1, 40), mono(5, 1, 60)];
        let dues = dispense(&results, &monos, DispenseMode::Ex);
        assert_eq!(dues.len(), 1);
        assert_eq!(dues[0].unit, UnitCode(5));
        assert_eq!(dues[0].price_cents, 100);
    }
}
