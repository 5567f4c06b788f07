//! Cluster aggregation: derive the classification view of one cluster.

use chrono::{Datelike, NaiveDate};

use casemix_core::Sex;
use casemix_stays::Stay;
use casemix_tables::{DiagnosisInfo, ListMask, ProcedureInfo, TableIndex};

use crate::errors::{add_stay_errors, ErrorSet};
use crate::flags::{IGNORE_PROCEDURE_DOC, IGNORE_PROCEDURE_EXTENSION};

// ── Aggregate flags ──────────────────────────────────────────────────────────

pub const FLAG_CHILDBIRTH_DIAGNOSIS: u16 = 1 << 0;
pub const FLAG_CHILDBIRTH_PROCEDURE: u16 = 1 << 1;
pub const FLAG_CHILDBIRTH: u16 = FLAG_CHILDBIRTH_DIAGNOSIS | FLAG_CHILDBIRTH_PROCEDURE;
/// Exactly one delivery category (vaginal vs. caesarean) present — enables
/// the childbirth severity cell lists.
pub const FLAG_CHILDBIRTH_TYPE: u16 = 1 << 2;

// ── Capability-list bits ─────────────────────────────────────────────────────
//
// Fixed positions inside the diagnosis/procedure bit-fields, as published
// with the function-group tables.

/// Diagnosis flags a childbirth.
pub const DIAG_CHILDBIRTH: ListMask = ListMask { offset: 14, value: 0x40 };
/// Vaginal delivery procedure.
pub const PROC_CHILDBIRTH_VAGINAL: ListMask = ListMask { offset: 27, value: 0x10 };
/// Caesarean delivery procedure.
pub const PROC_CHILDBIRTH_CESAREAN: ListMask = ListMask { offset: 27, value: 0x08 };
/// Procedure requires a documentation extension.
pub const PROC_NEEDS_DOC: ListMask = ListMask { offset: 30, value: 0x01 };

// ── Error codes raised during aggregation ────────────────────────────────────

pub const ERR_MISSING_MAIN_DIAGNOSIS: i16 = 40;
pub const ERR_UNKNOWN_MAIN_DIAGNOSIS: i16 = 67;
pub const ERR_UNKNOWN_LINKED_DIAGNOSIS: i16 = 68;
pub const ERR_UNKNOWN_DIAGNOSIS: i16 = 71;
pub const ERR_UNKNOWN_PROCEDURE: i16 = 74;
pub const ERR_PROCEDURE_OUTSIDE_DATES: i16 = 172;
pub const ERR_PROCEDURE_NEEDS_DOC: i16 = 173;

// ── Aggregate ────────────────────────────────────────────────────────────────

/// Everything the GHM/GHS rules look at for one cluster. The diagnosis and
/// procedure lists are deduplicated unions over all stays, resolved through
/// the active table index.
pub struct Aggregate<'a> {
    pub index: &'a TableIndex,
    pub stays: &'a [Stay],
    pub main_stay_idx: usize,

    pub bill_id: i32,
    pub duration: i32,
    pub age: i32,
    pub age_days: i32,
    pub sex: Option<Sex>,

    pub entry_date: Option<NaiveDate>,
    pub exit_date: Option<NaiveDate>,
    pub exit_mode: u8,
    pub session_count: i16,
    pub igs2: i16,
    pub gestational_age: i16,
    pub newborn_weight: i16,
    pub confirmed: bool,

    pub main_diag: Option<&'a DiagnosisInfo>,
    pub linked_diag: Option<&'a DiagnosisInfo>,
    pub diagnoses: Vec<&'a DiagnosisInfo>,
    pub procedures: Vec<&'a ProcedureInfo>,
    /// OR of all realisation activity bitmaps.
    pub proc_activities: u8,

    pub flags: u16,
}

impl Aggregate<'_> {
    pub fn main_stay(&self) -> &Stay {
        &self.stays[self.main_stay_idx]
    }

    pub fn attributes_sex(&self) -> Sex {
        self.sex.unwrap_or(Sex::Male)
    }
}

fn age_in_years(birthdate: NaiveDate, at: NaiveDate) -> i32 {
    let mut age = at.year() - birthdate.year();
    if (at.month(), at.day()) < (birthdate.month(), birthdate.day()) {
        age -= 1;
    }
    age.max(0)
}

/// Build the aggregate for one cluster. Per-stay anomalies become error
/// codes; aggregation itself never fails.
pub fn aggregate<'a>(
    index: &'a TableIndex,
    stays: &'a [Stay],
    flags: u32,
    errors: &mut ErrorSet,
) -> Aggregate<'a> {
    debug_assert!(!stays.is_empty());

    for stay in stays {
        add_stay_errors(errors, stay);
    }

    // The main stay carries the diagnoses: highest session count if any
    // sessions happened, last stay otherwise.
    let main_stay_idx = stays
        .iter()
        .enumerate()
        .filter(|(_, stay)| stay.session_count > 0)
        .max_by_key(|(idx, stay)| (stay.session_count, usize::MAX - idx))
        .map(|(idx, _)| idx)
        .unwrap_or(stays.len() - 1);
    let main_stay = &stays[main_stay_idx];
    let first = &stays[0];
    let last = &stays[stays.len() - 1];

    let entry_date = first.entry.date;
    let exit_date = last.exit.date;
    let duration = match (entry_date, exit_date) {
        (Some(entry), Some(exit)) if exit >= entry => {
            exit.signed_duration_since(entry).num_days() as i32
        }
        _ => 0,
    };

    let birthdate = main_stay.birthdate.or(first.birthdate);
    let (age, age_days) = match (birthdate, entry_date) {
        (Some(birth), Some(entry)) if entry >= birth => (
            age_in_years(birth, entry),
            entry.signed_duration_since(birth).num_days() as i32,
        ),
        _ => (0, 0),
    };

    let sex = stays.iter().find_map(|stay| stay.sex);
    let attr_sex = sex.unwrap_or(Sex::Male);

    let mut agg = Aggregate {
        index,
        stays,
        main_stay_idx,
        bill_id: first.bill_id,
        duration,
        age,
        age_days,
        sex,
        entry_date,
        exit_date,
        exit_mode: last.exit.mode,
        session_count: stays.iter().map(|stay| stay.session_count).max().unwrap_or(0),
        igs2: stays.iter().map(|stay| stay.igs2).max().unwrap_or(0),
        gestational_age: main_stay.gestational_age,
        newborn_weight: main_stay.newborn_weight,
        confirmed: stays.iter().any(|stay| stay.confirmed),
        main_diag: None,
        linked_diag: None,
        diagnoses: Vec::new(),
        procedures: Vec::new(),
        proc_activities: 0,
        flags: 0,
    };

    // ── Main and linked diagnosis ────────────────────────────────────────────
    if !main_stay.main_diagnosis.is_valid() {
        errors.add(ERR_MISSING_MAIN_DIAGNOSIS, 1);
    } else {
        agg.main_diag = index.diagnosis(main_stay.main_diagnosis);
        if agg.main_diag.is_none() {
            errors.add(ERR_UNKNOWN_MAIN_DIAGNOSIS, 2);
        }
    }
    if main_stay.linked_diagnosis.is_valid() {
        agg.linked_diag = index.diagnosis(main_stay.linked_diagnosis);
        if agg.linked_diag.is_none() {
            errors.add(ERR_UNKNOWN_LINKED_DIAGNOSIS, 3);
        }
    }

    // ── Diagnosis union ──────────────────────────────────────────────────────
    let mut push_diag = |agg: &mut Aggregate<'a>, info: &'a DiagnosisInfo| {
        if !agg.diagnoses.iter().any(|other| other.code == info.code) {
            agg.diagnoses.push(info);
        }
    };
    for stay in stays {
        for &code in stay
            .main_diagnosis
            .is_valid()
            .then_some(&stay.main_diagnosis)
            .into_iter()
            .chain(stay.linked_diagnosis.is_valid().then_some(&stay.linked_diagnosis))
            .chain(stay.other_diagnoses.iter())
        {
            match index.diagnosis(code) {
                Some(info) => push_diag(&mut agg, info),
                None => errors.add(ERR_UNKNOWN_DIAGNOSIS, 50),
            }
        }
    }

    // ── Procedure union ──────────────────────────────────────────────────────
    for stay in stays {
        for real in &stay.procedures {
            let date = real.date.or(stay.exit.date);
            let info = match date {
                Some(date) => index.procedure(real.proc, real.phase, date),
                None => None,
            };
            let info = match info {
                Some(info) => Some(info),
                // Fall back to any phase match when validity dates are
                // ignored or the realisation date is missing.
                None => {
                    let any_phase =
                        index.procedures(real.proc).iter().find(|p| p.phase == real.phase);
                    match any_phase {
                        Some(p) if flags & IGNORE_PROCEDURE_EXTENSION != 0 || date.is_none() => {
                            Some(p)
                        }
                        Some(_) => {
                            errors.add(ERR_PROCEDURE_OUTSIDE_DATES, 60);
                            None
                        }
                        None => {
                            errors.add(ERR_UNKNOWN_PROCEDURE, 61);
                            None
                        }
                    }
                }
            };

            if let Some(info) = info {
                if PROC_NEEDS_DOC.test(&info.bytes) && flags & IGNORE_PROCEDURE_DOC == 0 {
                    errors.add(ERR_PROCEDURE_NEEDS_DOC, 62);
                }
                agg.proc_activities |= real.activities;
                if !agg.procedures.iter().any(|other| std::ptr::eq(*other, info)) {
                    agg.procedures.push(info);
                }
            }
        }
    }

    // ── Childbirth flags ─────────────────────────────────────────────────────
    if agg
        .diagnoses
        .iter()
        .any(|diag| DIAG_CHILDBIRTH.test(&diag.attributes(attr_sex).raw))
    {
        agg.flags |= FLAG_CHILDBIRTH_DIAGNOSIS;
    }
    let vaginal = agg.procedures.iter().any(|p| PROC_CHILDBIRTH_VAGINAL.test(&p.bytes));
    let cesarean = agg.procedures.iter().any(|p| PROC_CHILDBIRTH_CESAREAN.test(&p.bytes));
    if vaginal || cesarean {
        agg.flags |= FLAG_CHILDBIRTH_PROCEDURE;
    }
    if vaginal != cesarean {
        agg.flags |= FLAG_CHILDBIRTH_TYPE;
    }

    agg
}
