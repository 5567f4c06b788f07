//! GHS access rules and per-day supplement counting.

use chrono::{Days, NaiveDate};

use casemix_core::{
    GhmCode, GhsCode, Sector, SupplementCounters, SupplementKind, UnitCode, NEONATE_AGE_DAYS,
};
use casemix_stays::Stay;
use casemix_tables::{AuthorizationScope, AuthorizationSet, GhsAccessInfo};

use crate::aggregate::Aggregate;

// ── Supplement functions ─────────────────────────────────────────────────────
//
// Authorization function ids carried by the AUTOREFS table.

pub const FUNCTION_REA: u8 = 1;
pub const FUNCTION_REA_PEDIATRIC: u8 = 2;
pub const FUNCTION_SI: u8 = 3;
pub const FUNCTION_SRC: u8 = 4;
pub const FUNCTION_NN1: u8 = 5;
pub const FUNCTION_NN2: u8 = 6;
pub const FUNCTION_NN3: u8 = 7;
pub const FUNCTION_REP: u8 = 8;

/// IGS2 score below which an adult intensive-care day is counted as REASI
/// instead of REA.
const REA_MIN_IGS2: i16 = 15;
/// IGS2 score qualifying an SRC day without a diagnosis/procedure pair.
const SRC_MIN_IGS2: i16 = 7;

// ── GHS access ───────────────────────────────────────────────────────────────

fn test_ghs_chunk(agg: &Aggregate<'_>, auths: &AuthorizationSet, chunk: &GhsAccessInfo) -> bool {
    let sex = agg.attributes_sex();

    if chunk.minimal_age > 0 && agg.age < chunk.minimal_age as i32 {
        return false;
    }
    if chunk.minimal_duration > 0 && agg.duration < chunk.minimal_duration as i32 {
        return false;
    }
    if chunk.unit_authorization > 0
        && !agg.stays.iter().any(|stay| {
            unit_authorization_kind(auths, stay, agg.exit_date) == Some(chunk.unit_authorization)
        })
    {
        return false;
    }
    if chunk.bed_authorization > 0
        && !agg.stays.iter().any(|stay| stay.bed_authorization == chunk.bed_authorization)
    {
        return false;
    }
    if chunk.main_diagnosis_mask.is_set()
        && !agg
            .main_diag
            .is_some_and(|diag| chunk.main_diagnosis_mask.test(&diag.attributes(sex).raw))
    {
        return false;
    }
    if chunk.diagnosis_mask.is_set()
        && !agg
            .diagnoses
            .iter()
            .any(|diag| chunk.diagnosis_mask.test(&diag.attributes(sex).raw))
    {
        return false;
    }
    if !chunk.procedure_masks.is_empty()
        && !agg.procedures.iter().any(|proc| {
            chunk.procedure_masks.iter().any(|mask| mask.test(&proc.bytes))
        })
    {
        return false;
    }
    true
}

fn unit_authorization_kind(
    auths: &AuthorizationSet,
    stay: &Stay,
    date: Option<NaiveDate>,
) -> Option<u8> {
    let date = date.or(stay.exit.date)?;
    auths.find_unit_at(stay.unit, date).map(|auth| auth.kind)
}

/// Walk the access chunks for the GHM's root; the first chunk whose
/// constraints all pass decides the GHS. A valid GHM with no passing chunk
/// gets the "no GHS" sentinel.
pub fn classify_ghs(
    agg: &Aggregate<'_>,
    auths: &AuthorizationSet,
    ghm: GhmCode,
    sector: Sector,
) -> GhsCode {
    if !ghm.is_valid() || ghm.is_error() {
        return GhsCode(0);
    }

    for chunk in agg.index.compatible_ghs(ghm.root()) {
        if chunk.ghm.mode != 0 && chunk.ghm.mode != ghm.mode {
            continue;
        }
        if test_ghs_chunk(agg, auths, chunk) {
            return chunk.ghs(sector);
        }
    }
    GhsCode::NONE
}

// ── Supplement counting ──────────────────────────────────────────────────────

/// Authorization resolution order for one day: the stay's unit, then the
/// stay's bed authorization, then the facility-wide entry.
fn authorization_function(
    agg: &Aggregate<'_>,
    auths: &AuthorizationSet,
    stay: &Stay,
    day: NaiveDate,
) -> Option<u8> {
    if let Some(auth) = auths.find_unit_at(stay.unit, day) {
        if let Some(info) = agg.index.authorization(AuthorizationScope::Unit, auth.kind) {
            return Some(info.function);
        }
    }
    if stay.bed_authorization != 0 {
        if let Some(info) =
            agg.index.authorization(AuthorizationScope::Bed, stay.bed_authorization)
        {
            return Some(info.function);
        }
    }
    if let Some(auth) = auths.find_unit_at(UnitCode::FACILITY, day) {
        if let Some(info) = agg.index.authorization(AuthorizationScope::Facility, auth.kind) {
            return Some(info.function);
        }
    }
    None
}

/// Does the cluster carry one of the table's (diagnosis, procedure) pairs
/// that qualify SRC days?
fn has_src_pair(agg: &Aggregate<'_>) -> bool {
    agg.index.src_pairs.iter().any(|pairs| {
        pairs.iter().any(|pair| {
            agg.diagnoses.iter().any(|diag| diag.code == pair.diagnosis)
                && agg.procedures.iter().any(|proc| proc.code == pair.procedure)
        })
    })
}

fn supplement_for_function(agg: &Aggregate<'_>, stay: &Stay, function: u8) -> Option<SupplementKind> {
    match function {
        FUNCTION_REA => {
            if stay.igs2.max(agg.igs2) >= REA_MIN_IGS2 || agg.age < 18 {
                Some(SupplementKind::Rea)
            } else {
                Some(SupplementKind::Reasi)
            }
        }
        FUNCTION_REA_PEDIATRIC => (agg.age < 18).then_some(SupplementKind::Rea),
        FUNCTION_SI => Some(SupplementKind::Si),
        FUNCTION_SRC => {
            (agg.igs2 >= SRC_MIN_IGS2 || has_src_pair(agg)).then_some(SupplementKind::Src)
        }
        FUNCTION_NN1 => (agg.age_days <= NEONATE_AGE_DAYS).then_some(SupplementKind::Nn1),
        FUNCTION_NN2 => (agg.age_days <= NEONATE_AGE_DAYS).then_some(SupplementKind::Nn2),
        FUNCTION_NN3 => (agg.age_days <= NEONATE_AGE_DAYS).then_some(SupplementKind::Nn3),
        FUNCTION_REP => Some(SupplementKind::Rep),
        _ => None,
    }
}

/// Count per-day supplements over `[entry, exit)`. Each day is attributed
/// to the stay active on it and yields at most one category.
pub fn count_supplements(
    agg: &Aggregate<'_>,
    auths: &AuthorizationSet,
    counters: &mut SupplementCounters<i16>,
) {
    let (Some(entry), Some(exit)) = (agg.entry_date, agg.exit_date) else {
        return;
    };

    let mut stay_idx = 0;
    let mut day = entry;
    while day < exit {
        while stay_idx + 1 < agg.stays.len()
            && agg.stays[stay_idx].exit.date.is_some_and(|d| d <= day)
        {
            stay_idx += 1;
        }
        let stay = &agg.stays[stay_idx];

        if let Some(function) = authorization_function(agg, auths, stay, day) {
            if let Some(kind) = supplement_for_function(agg, stay, function) {
                counters[kind] += 1;
            }
        }
        day = day + Days::new(1);
    }
}
