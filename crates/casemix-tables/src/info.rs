//! In-memory table records.
//!
//! The binary layout uses raw byte offsets for cross-section references; here
//! they are carried as `(section index, bit)` style values (`ListMask`,
//! `exclusion_set_idx`) and resolved through `TableIndex` helpers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use casemix_core::{DiagnosisCode, GhmCode, GhmRootCode, GhsCode, ProcedureCode, Sector, Sex};

// ── Table identity ───────────────────────────────────────────────────────────

/// Table kinds, with the on-disk ASCII tag for the binary ones.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TableKind {
    GhmDecisionTree,
    Diagnoses,
    Procedures,
    GhmRoots,
    Severity,
    GhsAccess,
    Authorizations,
    SrcPairs,
    Prices,
    Unknown,
}

impl TableKind {
    pub const COUNT: usize = 10;

    /// All kinds that can appear in an index, in slot order.
    pub const ALL: [TableKind; 10] = [
        TableKind::GhmDecisionTree,
        TableKind::Diagnoses,
        TableKind::Procedures,
        TableKind::GhmRoots,
        TableKind::Severity,
        TableKind::GhsAccess,
        TableKind::Authorizations,
        TableKind::SrcPairs,
        TableKind::Prices,
        TableKind::Unknown,
    ];

    pub fn from_tag(tag: &str) -> TableKind {
        match tag {
            "ARBREDEC" => TableKind::GhmDecisionTree,
            "DIAG10CR" => TableKind::Diagnoses,
            "CCAMCARA" => TableKind::Procedures,
            "RGHMINFO" => TableKind::GhmRoots,
            "TABCOMBI" => TableKind::Severity,
            "GHSINFO" => TableKind::GhsAccess,
            "AUTOREFS" => TableKind::Authorizations,
            "SRCDGACT" => TableKind::SrcPairs,
            _ => TableKind::Unknown,
        }
    }

    pub fn slot(self) -> usize {
        TableKind::ALL.iter().position(|&k| k == self).unwrap_or(9)
    }

    pub fn name(self) -> &'static str {
        match self {
            TableKind::GhmDecisionTree => "GHM decision tree",
            TableKind::Diagnoses => "diagnosis table",
            TableKind::Procedures => "procedure table",
            TableKind::GhmRoots => "GHM root table",
            TableKind::Severity => "severity table",
            TableKind::GhsAccess => "GHS access table",
            TableKind::Authorizations => "authorization table",
            TableKind::SrcPairs => "SRC pair table",
            TableKind::Prices => "price table",
            TableKind::Unknown => "unknown table",
        }
    }
}

/// One section of a binary table: a typed array of fixed-width records.
#[derive(Copy, Clone, Debug, Default)]
pub struct SectionInfo {
    pub raw_offset: usize,
    pub raw_len: usize,
    pub values_count: usize,
    pub value_len: usize,
}

/// Identity and layout of one table revision on disk.
#[derive(Clone, Debug)]
pub struct TableInfo {
    pub path: String,
    pub build_date: NaiveDate,
    pub version: (u16, u16),
    pub limit_from: NaiveDate,
    pub limit_to: NaiveDate,
    pub raw_kind: String,
    pub kind: TableKind,
    pub sections: Vec<SectionInfo>,
}

// ── Bit-field masks ──────────────────────────────────────────────────────────

/// A single-bit reference into a capability bit-field: byte `offset`, bits
/// selected by `value`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMask {
    pub offset: u8,
    pub value: u8,
}

impl ListMask {
    pub fn is_set(&self) -> bool {
        self.value != 0
    }

    /// Test the mask against a capability bit-field.
    pub fn test(&self, bytes: &[u8]) -> bool {
        bytes
            .get(self.offset as usize)
            .is_some_and(|&b| b & self.value != 0)
    }
}

// ── Decision tree ────────────────────────────────────────────────────────────

/// One node of the GHM decision tree. Function 12 records are leaves; all
/// others branch into `children_count` children starting at `children_idx`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GhmDecisionNode {
    Test {
        function: u8,
        params: [u8; 2],
        children_idx: usize,
        children_count: usize,
    },
    Leaf { ghm: GhmCode, error: i16 },
}

// ── Diagnoses ────────────────────────────────────────────────────────────────

/// Per-sex diagnosis attributes: the raw 37-byte bit-field plus decoded
/// shortcuts (CMD routing byte, jump byte, severity level 0–3).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DiagnosisAttributes {
    pub raw: [u8; 37],
    pub cmd: u8,
    pub jump: u8,
    pub severity: u8,
}

impl Default for DiagnosisAttributes {
    fn default() -> Self {
        DiagnosisAttributes { raw: [0; 37], cmd: 0, jump: 0, severity: 0 }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DiagnosisInfo {
    pub code: DiagnosisCode,
    /// Attributes differ between sexes (second entry meaningful).
    pub sex_difference: bool,
    pub attributes: [DiagnosisAttributes; 2],
    pub warnings: u16,
    /// Row of the exclusion bit-matrix listing diagnoses this one excludes.
    pub exclusion_set_idx: u16,
    /// Bit identifying this diagnosis inside other diagnoses' exclusion rows.
    pub cma_exclusion: ListMask,
}

impl DiagnosisInfo {
    pub fn attributes(&self, sex: Sex) -> &DiagnosisAttributes {
        &self.attributes[if self.sex_difference { sex.index() } else { 0 }]
    }
}

/// One row of the CMA exclusion bit-matrix.
#[derive(Clone, Debug)]
pub struct ExclusionInfo {
    pub raw: [u8; 256],
}

impl Default for ExclusionInfo {
    fn default() -> Self {
        ExclusionInfo { raw: [0; 256] }
    }
}

// ── Procedures ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct ProcedureInfo {
    pub code: ProcedureCode,
    pub phase: u8,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    /// 55-byte capability bit-field tested by classifier list masks.
    pub bytes: [u8; 55],
    /// Decoded activity bitmap (activities 1–5 in bits 1–5).
    pub activities: u8,
}

// ── GHM roots ────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, Default)]
pub struct GhmRootInfo {
    pub code: GhmRootCode,

    /// Duration below which an RSS confirmation flag is required (0 = never).
    pub confirm_duration_threshold: u8,

    pub allow_ambulatory: bool,
    pub short_duration_threshold: u8,

    pub young_severity_limit: u8,
    pub young_age_threshold: u8,
    pub old_severity_limit: u8,
    pub old_age_threshold: u8,

    /// 1-based childbirth severity cell list (0 = none).
    pub childbirth_severity_list: u8,

    pub cma_exclusion: ListMask,
}

// ── Severity cells ───────────────────────────────────────────────────────────

/// 2-D range cell: both variables must fall in their `[min, max)` interval
/// for `value` to apply.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ValueRangeCell {
    pub limits: [(i32, i32); 2],
    pub value: i32,
}

impl ValueRangeCell {
    pub fn matches(&self, var1: i32, var2: i32) -> bool {
        (self.limits[0].0..self.limits[0].1).contains(&var1)
            && (self.limits[1].0..self.limits[1].1).contains(&var2)
    }
}

/// Look up the first cell matching `(var1, var2)`.
pub fn find_cell(cells: &[ValueRangeCell], var1: i32, var2: i32) -> Option<i32> {
    cells.iter().find(|c| c.matches(var1, var2)).map(|c| c.value)
}

// ── GHS access ───────────────────────────────────────────────────────────────

/// One GHS access chunk: a GHM pattern plus the constraints that must all be
/// satisfied for the per-sector GHS numbers to apply.
#[derive(Clone, Debug, Default)]
pub struct GhsAccessInfo {
    pub ghm: GhmCode,
    pub ghs: [GhsCode; 2],

    pub unit_authorization: u8,
    pub bed_authorization: u8,
    pub minimal_duration: u8,
    pub minimal_age: u8,

    pub main_diagnosis_mask: ListMask,
    pub diagnosis_mask: ListMask,
    pub procedure_masks: Vec<ListMask>,
}

impl GhsAccessInfo {
    pub fn ghs(&self, sector: Sector) -> GhsCode {
        self.ghs[sector.index()]
    }
}

// ── Prices ───────────────────────────────────────────────────────────────────

/// Per-GHS tariff entry for one sector, in cents.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhsPriceInfo {
    pub ghs: GhsCode,
    pub price_cents: i32,
    pub exh_threshold: i16,
    pub exh_cents: i32,
    pub exb_threshold: i16,
    pub exb_cents: i32,
    /// Low-duration penalty is a lump sum instead of per missing day.
    pub exb_once: bool,
}

// ── Authorizations ───────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AuthorizationScope {
    Facility,
    Unit,
    Bed,
}

/// Maps an authorization `(scope, code)` pair to a supplement function id.
#[derive(Copy, Clone, Debug)]
pub struct AuthorizationInfo {
    pub scope: AuthorizationScope,
    pub code: u8,
    pub function: u8,
}

// ── SRC pairs ────────────────────────────────────────────────────────────────

/// Diagnosis/procedure pair enabling the SRC supplement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SrcPair {
    pub diagnosis: DiagnosisCode,
    pub procedure: ProcedureCode,
}
