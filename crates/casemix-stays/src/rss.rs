//! RSS / GRP / RSA fixed-column importers.
//!
//! One line per RUM. The RSS layout (0-based, half-open column ranges):
//!
//! ```text
//!   0..10   admin id                 57..59  session count
//!  10..20   bill id                  59..61  IGS2
//!  20..22   RUM version (16..22)     61..63  gestational age (weeks)
//!  22..30   birthdate DDMMYYYY       63..67  newborn weight (grams)
//!  30..31   sex ('1'/'2')            67..75  last menstrual period
//!  31..35   unit                     75..76  confirmation flag ('1')
//!  35..37   bed authorization        76..78  other-diagnosis count
//!  37..45   entry date               78..80  procedure count
//!  45..46   entry mode               80..88  main diagnosis
//!  46..47   entry origin             88..96  linked diagnosis
//!  47..55   exit date
//!  55..56   exit mode                then N × 8   other diagnoses
//!  56..57   exit destination         then M × 19  procedures
//! ```
//!
//! Each procedure block is date (8) + CCAM code (7) + phase (1) +
//! activity digit (1) + count (2).
//!
//! A GRP line is an RSS line prefixed by 16 columns of expected grouping
//! results (GHM 6, error 3, GHS 4, cluster length 3), which feed the
//! `--test` comparison. An RSA line drops the admin id: the leading 10
//! columns are a sequence number reused as bill id.
//!
//! Field-level failures set `error_mask` bits and parsing continues; only a
//! structurally short line fails the file.

use std::collections::HashMap;
use std::ops::Range;

use chrono::NaiveDate;
use tracing::warn;

use casemix_core::{CasemixError, DiagnosisCode, GhmCode, GhsCode, ProcedureCode, Sex, UnitCode};

use crate::stay::{ProcedureRealisation, Stay, StayError, StayTest};

const RSS_BASE_LEN: usize = 96;
const GRP_PREFIX_LEN: usize = 16;
const DIAGNOSIS_LEN: usize = 8;
const PROCEDURE_LEN: usize = 19;

pub(crate) enum TextFormat {
    Rss,
    Grp,
    Rsa,
}

fn field(line: &str, range: Range<usize>) -> &str {
    line.get(range).unwrap_or("").trim()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let day = s[0..2].parse().ok()?;
    let month = s[2..4].parse().ok()?;
    let year = s[4..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_mode(s: &str) -> Option<u8> {
    match s.as_bytes() {
        [c] if c.is_ascii_alphanumeric() => Some(*c),
        [] => Some(0),
        _ => None,
    }
}

/// Parse one RSS-family line. `offset` skips a GRP prefix; RSA folds the
/// sequence number into both ids.
fn parse_stay_line(line: &str, format: &TextFormat) -> Result<Stay, CasemixError> {
    let (offset, rsa) = match format {
        TextFormat::Rss => (0, false),
        TextFormat::Grp => (GRP_PREFIX_LEN, false),
        TextFormat::Rsa => (0, true),
    };
    let col = |range: Range<usize>| field(line, range.start + offset..range.end + offset);

    if line.len() < offset + RSS_BASE_LEN {
        return Err(CasemixError::InvalidStayFile {
            path: String::new(),
            reason: format!("line too short ({} columns)", line.len()),
        });
    }

    let mut stay = Stay::default();

    if rsa {
        // RSA carries a single sequence number instead of admin + bill ids.
        match col(0..10).parse::<i32>() {
            Ok(seq) => {
                stay.admin_id = seq;
                stay.bill_id = seq;
            }
            Err(_) => stay.set_error(StayError::MalformedBillId),
        }
    } else {
        stay.admin_id = col(0..10).parse().unwrap_or(0);
        match col(10..20).parse::<i32>() {
            Ok(bill_id) => stay.bill_id = bill_id,
            Err(_) => stay.set_error(StayError::MalformedBillId),
        }
    }

    match col(20..22).parse::<u32>() {
        Ok(version) if (16..=22).contains(&version) => {}
        _ => stay.set_error(StayError::UnknownRumVersion),
    }

    match parse_date(col(22..30)) {
        Some(date) => stay.birthdate = Some(date),
        None => stay.set_error(StayError::MalformedBirthdate),
    }
    match col(30..31).as_bytes().first().copied().and_then(Sex::from_rum) {
        Some(sex) => stay.sex = Some(sex),
        None => stay.set_error(StayError::MalformedSex),
    }
    stay.unit = UnitCode(col(31..35).parse().unwrap_or(0));
    stay.bed_authorization = col(35..37).parse().unwrap_or(0);

    match parse_date(col(37..45)) {
        Some(date) => stay.entry.date = Some(date),
        None => stay.set_error(StayError::MalformedEntryDate),
    }
    match parse_mode(col(45..46)) {
        Some(mode) if mode != 0 => stay.entry.mode = mode,
        _ => stay.set_error(StayError::MalformedEntryMode),
    }
    match parse_mode(col(46..47)) {
        Some(origin) => stay.entry.origin = origin,
        None => stay.set_error(StayError::MalformedEntryOrigin),
    }

    match parse_date(col(47..55)) {
        Some(date) => stay.exit.date = Some(date),
        None => stay.set_error(StayError::MalformedExitDate),
    }
    match parse_mode(col(55..56)) {
        Some(mode) if mode != 0 => stay.exit.mode = mode,
        _ => stay.set_error(StayError::MalformedExitMode),
    }
    match parse_mode(col(56..57)) {
        Some(dest) => stay.exit.destination = dest,
        None => stay.set_error(StayError::MalformedExitDestination),
    }

    let int_field = |range: Range<usize>, error: StayError, stay: &mut Stay| -> i16 {
        let raw = col(range);
        if raw.is_empty() {
            return 0;
        }
        match raw.parse::<i16>() {
            Ok(n) if n >= 0 => n,
            _ => {
                stay.set_error(error);
                0
            }
        }
    };

    stay.session_count = int_field(57..59, StayError::MalformedSessionCount, &mut stay);
    stay.igs2 = int_field(59..61, StayError::MalformedIgs2, &mut stay);
    stay.gestational_age = int_field(61..63, StayError::MalformedGestationalAge, &mut stay);
    stay.newborn_weight = int_field(63..67, StayError::MalformedNewbornWeight, &mut stay);

    let lmp = col(67..75);
    if !lmp.is_empty() {
        match parse_date(lmp) {
            Some(date) => stay.last_menstrual_period = Some(date),
            None => stay.set_error(StayError::MalformedLastMenstrualPeriod),
        }
    }

    match col(75..76) {
        "1" => stay.confirmed = true,
        "" | "0" => {}
        _ => stay.set_error(StayError::MalformedConfirmation),
    }

    let das_count = match col(76..78).parse::<usize>() {
        Ok(count) => count,
        Err(_) => {
            stay.set_error(if col(76..78).is_empty() {
                StayError::MissingOtherDiagnosesCount
            } else {
                StayError::MalformedOtherDiagnosesCount
            });
            0
        }
    };
    let proc_count = match col(78..80).parse::<usize>() {
        Ok(count) => count,
        Err(_) => {
            stay.set_error(if col(78..80).is_empty() {
                StayError::MissingProceduresCount
            } else {
                StayError::MalformedProceduresCount
            });
            0
        }
    };

    match col(80..88).parse::<DiagnosisCode>() {
        Ok(diag) => stay.main_diagnosis = diag,
        Err(_) => stay.set_error(StayError::MalformedMainDiagnosis),
    }
    let linked = col(88..96);
    if !linked.is_empty() {
        match linked.parse::<DiagnosisCode>() {
            Ok(diag) => stay.linked_diagnosis = diag,
            Err(_) => stay.set_error(StayError::MalformedLinkedDiagnosis),
        }
    }

    let mut cursor = offset + RSS_BASE_LEN;
    for _ in 0..das_count {
        match field(line, cursor..cursor + DIAGNOSIS_LEN).parse::<DiagnosisCode>() {
            Ok(diag) => stay.other_diagnoses.push(diag),
            Err(_) => stay.set_error(StayError::MalformedOtherDiagnosis),
        }
        cursor += DIAGNOSIS_LEN;
    }

    for _ in 0..proc_count {
        let block = cursor..cursor + PROCEDURE_LEN;
        let date = parse_date(field(line, block.start..block.start + 8));
        let code = field(line, block.start + 8..block.start + 15).parse::<ProcedureCode>();
        let phase = field(line, block.start + 15..block.start + 16).parse::<u8>().unwrap_or(0);
        let activity = field(line, block.start + 16..block.start + 17).parse::<u8>();
        let count =
            field(line, block.start + 17..block.start + 19).parse::<i16>().unwrap_or(1).max(1);

        match (code, activity) {
            (Ok(proc), Ok(activity)) if activity <= 7 => {
                stay.procedures.push(ProcedureRealisation {
                    proc,
                    phase,
                    activities: 1u8 << activity,
                    count,
                    date,
                });
            }
            _ => stay.set_error(StayError::MalformedProcedureCode),
        }
        cursor = block.end;
    }

    Ok(stay)
}

/// Expected results carried by a GRP prefix.
fn parse_grp_prefix(line: &str) -> StayTest {
    let mut test = StayTest::default();
    if let Ok(ghm) = field(line, 0..6).parse::<GhmCode>() {
        test.ghm = ghm;
    }
    test.error = field(line, 6..9).parse().unwrap_or(0);
    if let Ok(ghs) = field(line, 9..13).parse::<GhsCode>() {
        test.ghs = ghs;
    }
    test.cluster_len = field(line, 13..16).parse().unwrap_or(0);
    test
}

/// Parse a whole RSS/GRP/RSA text, appending stays (and GRP expected
/// results keyed by bill id) to the output collections.
pub(crate) fn load_text(
    text: &str,
    path: &str,
    format: TextFormat,
    out_stays: &mut Vec<Stay>,
    mut out_tests: Option<&mut HashMap<i32, StayTest>>,
) -> Result<(), CasemixError> {
    for (line_idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let stay = parse_stay_line(line, &format).map_err(|err| match err {
            CasemixError::InvalidStayFile { reason, .. } => CasemixError::InvalidStayFile {
                path: path.to_string(),
                reason: format!("line {}: {}", line_idx + 1, reason),
            },
            other => other,
        })?;

        if stay.error_mask != 0 {
            warn!(path, line = line_idx + 1, mask = format!("{:#x}", stay.error_mask),
                  "stay parsed with anomalies");
        }

        if let (TextFormat::Grp, Some(tests)) = (&format, out_tests.as_deref_mut()) {
            let mut test = parse_grp_prefix(line);
            test.bill_id = stay.bill_id;
            tests.insert(test.bill_id, test);
        }

        out_stays.push(stay);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Line builders shared by the importer tests; they are the inverse of
    //! the layout above.

    use super::*;

    pub fn rss_line(stay: &Stay) -> String {
        let date = |d: Option<NaiveDate>| match d {
            Some(d) => d.format("%d%m%Y").to_string(),
            None => " ".repeat(8),
        };
        let mode = |m: u8| if m == 0 { " ".to_string() } else { (m as char).to_string() };

        let mut line = format!(
            "{:>10}{:>10}17{}{}{:>4}{:>2}{}{}{}{}{}{}{:>2}{:>2}{:>2}{:>4}{}{}{:>2}{:>2}{:<8}{:<8}",
            stay.admin_id,
            stay.bill_id,
            date(stay.birthdate),
            match stay.sex {
                Some(Sex::Male) => "1",
                Some(Sex::Female) => "2",
                None => " ",
            },
            stay.unit.0,
            stay.bed_authorization,
            date(stay.entry.date),
            mode(stay.entry.mode),
            mode(stay.entry.origin),
            date(stay.exit.date),
            mode(stay.exit.mode),
            mode(stay.exit.destination),
            stay.session_count,
            stay.igs2,
            stay.gestational_age,
            stay.newborn_weight,
            date(stay.last_menstrual_period),
            if stay.confirmed { "1" } else { " " },
            stay.other_diagnoses.len(),
            stay.procedures.len(),
            stay.main_diagnosis.as_str(),
            stay.linked_diagnosis.as_str(),
        );
        for diag in &stay.other_diagnoses {
            line.push_str(&format!("{:<8}", diag.as_str()));
        }
        for proc in &stay.procedures {
            let activity = proc.activities.trailing_zeros();
            line.push_str(&format!(
                "{}{}{}{}{:>2}",
                date(proc.date),
                proc.proc.as_str(),
                proc.phase,
                activity,
                proc.count,
            ));
        }
        line
    }

    pub fn grp_line(stay: &Stay, test: &StayTest) -> String {
        format!(
            "{:<6}{:>3}{:>4}{:>3}{}",
            test.ghm.to_string(),
            test.error,
            test.ghs.0,
            test.cluster_len,
            rss_line(stay),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{grp_line, rss_line};
    use super::*;

    fn sample_stay() -> Stay {
        Stay {
            admin_id: 7,
            bill_id: 1001,
            sex: Some(Sex::Female),
            birthdate: NaiveDate::from_ymd_opt(1964, 2, 14),
            entry: crate::stay::StayEntry {
                date: NaiveDate::from_ymd_opt(2019, 4, 2),
                mode: b'8',
                origin: 0,
            },
            exit: crate::stay::StayExit {
                date: NaiveDate::from_ymd_opt(2019, 4, 6),
                mode: b'8',
                destination: 0,
            },
            unit: UnitCode(210),
            igs2: 33,
            main_diagnosis: "J181".parse().unwrap(),
            other_diagnoses: vec!["I10".parse().unwrap()],
            procedures: vec![ProcedureRealisation {
                proc: "EBLA003".parse().unwrap(),
                phase: 0,
                activities: 1 << 1,
                count: 1,
                date: NaiveDate::from_ymd_opt(2019, 4, 3),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn rss_line_roundtrips() {
        let stay = sample_stay();
        let mut stays = Vec::new();
        load_text(&rss_line(&stay), "test.rss", TextFormat::Rss, &mut stays, None).unwrap();
        assert_eq!(stays.len(), 1);
        assert_eq!(stays[0].error_mask, 0);
        assert_eq!(stays[0], stay);
    }

    #[test]
    fn grp_line_yields_stay_and_test() {
        let stay = sample_stay();
        let expected = StayTest {
            bill_id: stay.bill_id,
            cluster_len: 1,
            ghm: "04M051".parse().unwrap(),
            error: 0,
            ghs: GhsCode(4005),
            ..Default::default()
        };

        let mut stays = Vec::new();
        let mut tests = HashMap::new();
        load_text(
            &grp_line(&stay, &expected),
            "test.grp",
            TextFormat::Grp,
            &mut stays,
            Some(&mut tests),
        )
        .unwrap();
        assert_eq!(stays[0], stay);
        assert_eq!(tests[&stay.bill_id], expected);
    }

    #[test]
    fn malformed_fields_set_error_bits() {
        let stay = sample_stay();
        let mut line = rss_line(&stay);
        // Corrupt sex and main diagnosis.
        line.replace_range(30..31, "X");
        line.replace_range(80..84, "@@@@");

        let mut stays = Vec::new();
        load_text(&line, "test.rss", TextFormat::Rss, &mut stays, None).unwrap();
        assert!(stays[0].has_error(StayError::MalformedSex));
        assert!(stays[0].has_error(StayError::MalformedMainDiagnosis));
        // Remaining fields still parsed.
        assert_eq!(stays[0].bill_id, 1001);
        assert_eq!(stays[0].unit, UnitCode(210));
    }

    #[test]
    fn rsa_reuses_the_sequence_number_as_bill_id() {
        let stay = sample_stay();
        let mut line = rss_line(&stay);
        // RSA lines leave the bill column blank; the sequence number leads.
        line.replace_range(10..20, "          ");

        let mut stays = Vec::new();
        load_text(&line, "test.rsa", TextFormat::Rsa, &mut stays, None).unwrap();
        assert_eq!(stays[0].error_mask, 0);
        assert_eq!(stays[0].admin_id, 7);
        assert_eq!(stays[0].bill_id, 7);
    }

    #[test]
    fn short_line_fails_the_file() {
        let mut stays = Vec::new();
        let result = load_text("too short", "test.rss", TextFormat::Rss, &mut stays, None);
        assert!(result.is_err());
    }
}
