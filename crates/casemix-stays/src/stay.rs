use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use casemix_core::{
    DiagnosisCode, GhmCode, GhsCode, ProcedureCode, Sex, SupplementCounters, UnitCode,
};

// ── Stay model ───────────────────────────────────────────────────────────────

/// One procedure performed during a stay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureRealisation {
    pub proc: ProcedureCode,
    pub phase: u8,
    /// Bitmap of CCAM activities (activity `n` in bit `n`).
    pub activities: u8,
    pub count: i16,
    pub date: Option<NaiveDate>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayEntry {
    pub date: Option<NaiveDate>,
    pub mode: u8,
    pub origin: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayExit {
    pub date: Option<NaiveDate>,
    pub mode: u8,
    pub destination: u8,
}

/// Parse-time anomaly bits. The textual loaders accumulate these in
/// `Stay::error_mask` and keep going; aggregation turns them into
/// classification errors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum StayError {
    UnknownRumVersion = 1 << 0,
    MalformedBillId = 1 << 1,
    MalformedBirthdate = 1 << 2,
    MalformedSex = 1 << 3,
    MalformedEntryDate = 1 << 4,
    MalformedEntryMode = 1 << 5,
    MalformedEntryOrigin = 1 << 6,
    MalformedExitDate = 1 << 7,
    MalformedExitMode = 1 << 8,
    MalformedExitDestination = 1 << 9,
    MalformedSessionCount = 1 << 10,
    MalformedGestationalAge = 1 << 11,
    MalformedNewbornWeight = 1 << 12,
    MalformedLastMenstrualPeriod = 1 << 13,
    MalformedIgs2 = 1 << 14,
    MalformedConfirmation = 1 << 15,
    MalformedMainDiagnosis = 1 << 16,
    MalformedLinkedDiagnosis = 1 << 17,
    MissingOtherDiagnosesCount = 1 << 18,
    MalformedOtherDiagnosesCount = 1 << 19,
    MalformedOtherDiagnosis = 1 << 20,
    MissingProceduresCount = 1 << 21,
    MalformedProceduresCount = 1 << 22,
    MalformedProcedureCode = 1 << 23,
}

/// One RUM record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stay {
    pub admin_id: i32,
    /// Cluster key: stays of one hospitalization share it.
    pub bill_id: i32,

    pub sex: Option<Sex>,
    pub birthdate: Option<NaiveDate>,
    pub entry: StayEntry,
    pub exit: StayExit,
    pub unit: UnitCode,
    pub bed_authorization: u8,
    pub session_count: i16,
    pub igs2: i16,
    pub last_menstrual_period: Option<NaiveDate>,
    pub gestational_age: i16,
    pub newborn_weight: i16,
    /// RSS confirmation flag for short stays.
    pub confirmed: bool,

    pub main_diagnosis: DiagnosisCode,
    pub linked_diagnosis: DiagnosisCode,
    pub other_diagnoses: Vec<DiagnosisCode>,
    pub procedures: Vec<ProcedureRealisation>,

    pub error_mask: u32,
}

impl Stay {
    pub fn set_error(&mut self, error: StayError) {
        self.error_mask |= error as u32;
    }

    pub fn has_error(&self, error: StayError) -> bool {
        self.error_mask & error as u32 != 0
    }

    /// Duration in nights; 0 when the dates are missing or inverted.
    pub fn duration(&self) -> i32 {
        match (self.entry.date, self.exit.date) {
            (Some(entry), Some(exit)) if exit >= entry => {
                exit.signed_duration_since(entry).num_days() as i32
            }
            _ => 0,
        }
    }
}

// ── Stay sets ────────────────────────────────────────────────────────────────

/// Expected grouping result for one bill id, carried by GRP files and used
/// by `--test` to compare against the reference grouper.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StayTest {
    pub bill_id: i32,
    pub cluster_len: u16,
    pub ghm: GhmCode,
    pub error: i16,
    pub ghs: GhsCode,
    pub supplement_days: SupplementCounters<i16>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaySet {
    pub stays: Vec<Stay>,
}
