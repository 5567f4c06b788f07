//! End-to-end classification scenarios over the demo table set.
//!
//! Run with:
//!   cargo test -p casemix-classifier --test pipeline

use chrono::NaiveDate;

use casemix_classifier::flags::{IGNORE_CONFIRMATION, MONO};
use casemix_classifier::{
    classify, classify_parallel, dispense, summarize, ClassifySettings, DispenseMode,
};
use casemix_core::{
    DiagnosisCode, GhsCode, Sector, Sex, SupplementKind, UnitCode, ERR_CHILDBIRTH_PROCEDURE_ONLY,
    ERR_CONFIRMATION_MISSING, ERR_NO_TABLE_INDEX,
};
use casemix_stays::{ProcedureRealisation, Stay, StayEntry, StayExit};
use casemix_tables::demo::{demo_authorization_set, demo_table_set};
use casemix_tables::{AuthorizationSet, TableSet};

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

fn base_stay(bill_id: i32, entry_day: u32, exit_day: u32) -> Stay {
    Stay {
        admin_id: bill_id,
        bill_id,
        sex: Some(Sex::Female),
        birthdate: date(1964, 2, 14),
        entry: StayEntry { date: date(2019, 4, entry_day), mode: b'8', origin: 0 },
        exit: StayExit { date: date(2019, 4, exit_day), mode: b'8', destination: 0 },
        unit: UnitCode(210),
        main_diagnosis: "J181".parse::<DiagnosisCode>().unwrap(),
        ..Default::default()
    }
}

fn delivery_procedure(day: u32) -> ProcedureRealisation {
    ProcedureRealisation {
        proc: "JQGD001".parse().unwrap(),
        phase: 0,
        activities: 1 << 1,
        count: 1,
        date: date(2019, 4, day),
    }
}

struct Fixture {
    tables: TableSet,
    auths: AuthorizationSet,
}

impl Fixture {
    fn new() -> Fixture {
        Fixture { tables: demo_table_set(), auths: demo_authorization_set() }
    }

    fn run(&self, stays: &[Stay], settings: &ClassifySettings) -> casemix_classifier::ClassifyOutput {
        classify(&self.tables, &self.auths, stays, settings).expect("classification runs")
    }
}

// ── Seed scenarios ───────────────────────────────────────────────────────────

#[test]
fn pneumonia_single_rum() {
    let fixture = Fixture::new();
    // Age 55, duration 4 nights, no procedures, public sector.
    let stays = vec![base_stay(1001, 2, 6)];
    let output = fixture.run(&stays, &ClassifySettings::default());

    assert_eq!(output.results.len(), 1);
    let result = &output.results[0];
    assert_eq!(result.ghm.to_string(), "04M051");
    assert_eq!(result.main_error, 0);
    assert_eq!(result.ghs, GhsCode(4005));
    assert_eq!(result.exb_exh, 0);
    assert_eq!(result.price_cents, 200_000);
    assert_eq!(result.total_cents, 200_000);
    assert!(result.supplement_days.values.iter().all(|&days| days == 0));
}

#[test]
fn private_sector_selects_other_ghs_number() {
    let fixture = Fixture::new();
    let stays = vec![base_stay(1002, 2, 6)];
    let settings = ClassifySettings { sector: Sector::Private, ..Default::default() };
    let output = fixture.run(&stays, &settings);

    assert_eq!(output.results[0].ghs, GhsCode(4006));
    assert_eq!(output.results[0].price_cents, 180_000);
}

#[test]
fn icu_cluster_counts_rea_days_and_dispenses() {
    let fixture = Fixture::new();

    // First RUM in the ICU-authorized unit 101 for days [0, 2).
    let mut first = base_stay(2002, 2, 4);
    first.unit = UnitCode(101);
    first.igs2 = 33;
    first.exit.mode = b'6';
    let mut second = base_stay(2002, 4, 6);
    second.entry.mode = b'6';

    let settings = ClassifySettings { flags: MONO, ..Default::default() };
    let output = fixture.run(&[first, second], &settings);

    assert_eq!(output.results.len(), 1);
    assert_eq!(output.mono_results.len(), 2);

    let result = &output.results[0];
    assert_eq!(result.ghm.to_string(), "04M051");
    assert_eq!(result.supplement_days[SupplementKind::Rea], 2);
    assert_eq!(result.supplement_cents[SupplementKind::Rea], 160_000);
    assert_eq!(result.price_cents, 200_000);
    assert_eq!(result.total_cents, 360_000);

    // Dispensation: equal ExJ weights → half the cluster price each, and
    // the ICU supplements stay with unit 101.
    let dues = dispense(&output.results, &output.mono_results, DispenseMode::ExJ);
    assert_eq!(dues.len(), 2);
    let total: i64 = dues.iter().map(|due| due.price_cents).sum();
    assert_eq!(total, result.price_cents);

    let icu = dues.iter().find(|due| due.unit == UnitCode(101)).unwrap();
    assert_eq!(icu.price_cents, 100_000);
    assert_eq!(icu.supplement_days[SupplementKind::Rea], 2);
    assert_eq!(icu.total_cents, 100_000 + 160_000);
}

#[test]
fn childbirth_procedure_without_diagnosis_is_an_error() {
    let fixture = Fixture::new();
    let mut stay = base_stay(3003, 2, 6);
    stay.procedures.push(delivery_procedure(3));

    let output = fixture.run(&[stay], &ClassifySettings::default());
    let result = &output.results[0];
    assert!(result.ghm.is_error());
    assert_eq!(result.main_error, ERR_CHILDBIRTH_PROCEDURE_ONLY);
    assert_eq!(result.ghs, GhsCode(0));
    assert_eq!(result.price_cents, 0);
}

#[test]
fn childbirth_with_matching_diagnosis_grades_by_cell_list() {
    let fixture = Fixture::new();
    let mut stay = base_stay(3004, 2, 5);
    stay.main_diagnosis = "O800".parse().unwrap();
    stay.gestational_age = 39;
    stay.procedures.push(delivery_procedure(3));

    let output = fixture.run(&[stay], &ClassifySettings::default());
    let result = &output.results[0];
    // The childbirth cell list raises severity to 1 and 3 nights sustain it.
    assert_eq!(result.ghm.to_string(), "14Z022");
    assert_eq!(result.main_error, 0);
    assert_eq!(result.ghs, GhsCode(5001));
}

#[test]
fn sessions_take_the_session_leaf_without_exb() {
    let fixture = Fixture::new();
    let mut stay = base_stay(4004, 2, 2);
    stay.session_count = 3;

    let output = fixture.run(&[stay], &ClassifySettings::default());
    let result = &output.results[0];
    assert_eq!(result.ghm.to_string(), "28Z04Z");
    assert_eq!(result.ghs, GhsCode(9621));
    assert_eq!(result.exb_exh, 0);
    assert_eq!(result.price_cents, 30_000);
}

#[test]
fn confirmation_rules_for_short_stays() {
    let fixture = Fixture::new();
    let stays = vec![base_stay(5005, 2, 2)];

    // Without the flag the stay is rejected.
    let output = fixture.run(&stays, &ClassifySettings::default());
    assert!(output.results[0].ghm.is_error());
    assert_eq!(output.results[0].main_error, ERR_CONFIRMATION_MISSING);

    // Ignoring confirmation yields the short-stay mode and the EXB penalty.
    let settings = ClassifySettings { flags: IGNORE_CONFIRMATION, ..Default::default() };
    let output = fixture.run(&stays, &settings);
    let result = &output.results[0];
    assert_eq!(result.ghm.to_string(), "04M05T");
    assert_eq!(result.main_error, 0);
    assert_eq!(result.ghs, GhsCode(4005));
    assert_eq!(result.exb_exh, -2);
    assert_eq!(result.price_cents, 140_000);
}

#[test]
fn confirmed_short_stay_passes() {
    let fixture = Fixture::new();
    let mut stay = base_stay(5006, 2, 2);
    stay.confirmed = true;
    let output = fixture.run(&[stay], &ClassifySettings::default());
    assert_eq!(output.results[0].ghm.to_string(), "04M05T");
    assert_eq!(output.results[0].main_error, 0);
}

#[test]
fn severity_rises_with_comorbidity_and_is_limited_by_duration() {
    let fixture = Fixture::new();

    // Sepsis comorbidity (severity 2) with 6 nights → mode '3'.
    let mut stay = base_stay(6001, 2, 8);
    stay.other_diagnoses.push("A410".parse().unwrap());
    let output = fixture.run(&[stay.clone()], &ClassifySettings::default());
    assert_eq!(output.results[0].ghm.to_string(), "04M053");

    // The same stay over 4 nights only sustains severity 1.
    stay.exit.date = date(2019, 4, 6);
    let output = fixture.run(&[stay], &ClassifySettings::default());
    assert_eq!(output.results[0].ghm.to_string(), "04M052");
}

#[test]
fn ambulatory_root_takes_j_mode_instead_of_demoting() {
    let fixture = Fixture::new();
    // Non-respiratory stay lands on 01M03, an ambulatory-allowed root. The
    // sepsis comorbidity grades severity 2, but one night cannot back it.
    let mut stay = base_stay(6003, 2, 3);
    stay.main_diagnosis = "I10".parse().unwrap();
    stay.other_diagnoses.push("A410".parse().unwrap());

    let output = fixture.run(&[stay.clone()], &ClassifySettings::default());
    let result = &output.results[0];
    assert_eq!(result.ghm.to_string(), "01M03J");
    assert_eq!(result.main_error, 0);
    assert_eq!(result.ghs, GhsCode(1003));

    // With enough nights the graded mode stands.
    stay.exit.date = date(2019, 4, 8);
    let output = fixture.run(&[stay], &ClassifySettings::default());
    assert_eq!(output.results[0].ghm.to_string(), "01M033");
}

#[test]
fn old_age_promotes_severity() {
    let fixture = Fixture::new();
    let mut stay = base_stay(6002, 2, 8);
    stay.birthdate = date(1933, 1, 1);
    let output = fixture.run(&[stay], &ClassifySettings::default());
    // Age 86 with the 80+ limit on 04M05 → severity at least 1.
    assert_eq!(output.results[0].ghm.to_string(), "04M052");
}

#[test]
fn coefficient_applies_when_requested() {
    let fixture = Fixture::new();
    let stays = vec![base_stay(7001, 2, 6)];
    let settings = ClassifySettings { apply_coefficient: true, ..Default::default() };
    let output = fixture.run(&stays, &settings);
    // 200000 × 1.0250.
    assert_eq!(output.results[0].price_cents, 205_000);
}

#[test]
fn missing_index_yields_error_result() {
    let fixture = Fixture::new();
    let mut stay = base_stay(8001, 2, 6);
    stay.entry.date = date(2018, 4, 2);
    stay.exit.date = date(2018, 4, 6);

    let output = fixture.run(&[stay], &ClassifySettings::default());
    let result = &output.results[0];
    assert!(result.ghm.is_error());
    assert_eq!(result.main_error, ERR_NO_TABLE_INDEX);
    assert_eq!(result.price_cents, 0);
}

// ── Determinism and parallel equivalence ─────────────────────────────────────

/// Deterministic pseudo-random stay soup: multi-RUM clusters, varying
/// diagnoses, ages, durations and units.
fn generate_stays(count: usize) -> Vec<Stay> {
    let mut stays = Vec::with_capacity(count);
    let mut state = 0x2545F491_u64;
    let mut next = |modulus: u64| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) % modulus
    };

    let mut bill_id = 10_000;
    while stays.len() < count {
        bill_id += 1;
        let rums = 1 + next(3) as u32;
        let entry_day = 1 + next(10) as u32;
        let mut day = entry_day;

        for rum in 0..rums {
            let nights = next(4) as u32;
            let mut stay = base_stay(bill_id, day, day + nights);
            stay.sex = if next(2) == 0 { Some(Sex::Male) } else { Some(Sex::Female) };
            stay.birthdate = date(1930 + next(85) as i32, 1 + next(12) as u32, 1);
            stay.unit = if next(3) == 0 { UnitCode(101) } else { UnitCode(210) };
            stay.igs2 = next(40) as i16;
            if next(4) == 0 {
                stay.other_diagnoses.push("A410".parse().unwrap());
            }
            if next(5) == 0 {
                stay.main_diagnosis = "I10".parse().unwrap();
            }
            if rum > 0 {
                stay.entry.mode = b'6';
            }
            if rum + 1 < rums {
                stay.exit.mode = b'6';
            }
            day += nights;
            stays.push(stay);
        }
    }
    stays
}

#[test]
fn parallel_equals_sequential() {
    let fixture = Fixture::new();
    let stays = generate_stays(600);
    let settings = ClassifySettings { flags: MONO | IGNORE_CONFIRMATION, ..Default::default() };

    let sequential = fixture.run(&stays, &settings);
    let parallel =
        classify_parallel(&fixture.tables, &fixture.auths, &stays, &settings, None).unwrap();

    assert_eq!(sequential.results, parallel.results);
    assert_eq!(sequential.mono_results, parallel.mono_results);
    assert_eq!(
        sequential.results.iter().map(|r| r.stays_len).sum::<usize>(),
        stays.len()
    );
}

#[test]
fn classification_is_deterministic() {
    let fixture = Fixture::new();
    let stays = generate_stays(200);
    let settings = ClassifySettings { flags: IGNORE_CONFIRMATION, ..Default::default() };

    let first = fixture.run(&stays, &settings);
    let second = fixture.run(&stays, &settings);
    assert_eq!(first.results, second.results);
}

#[test]
fn dispensation_conserves_every_cluster_price() {
    let fixture = Fixture::new();
    let stays = generate_stays(400);
    let settings = ClassifySettings { flags: MONO | IGNORE_CONFIRMATION, ..Default::default() };
    let output = fixture.run(&stays, &settings);

    for mode in DispenseMode::ALL {
        let dues = dispense(&output.results, &output.mono_results, mode);
        let dispensed: i64 = dues.iter().map(|due| due.price_cents).sum();
        let expected: i64 = output.results.iter().map(|r| r.price_cents).sum();
        assert_eq!(dispensed, expected, "mode {}", mode.name());
    }
}

#[test]
fn summary_adds_up() {
    let fixture = Fixture::new();
    let stays = generate_stays(150);
    let settings = ClassifySettings { flags: IGNORE_CONFIRMATION, ..Default::default() };
    let output = fixture.run(&stays, &settings);

    let summary = summarize(&output.results);
    assert_eq!(summary.results_count, output.results.len());
    assert_eq!(summary.stays_count, stays.len());
    let expected_total: i64 = output.results.iter().map(|r| r.total_cents).sum();
    assert_eq!(summary.total_cents, expected_total);
}
