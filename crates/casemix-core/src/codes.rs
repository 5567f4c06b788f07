use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CasemixError;

// ── DiagnosisCode ────────────────────────────────────────────────────────────

/// ICD-10 diagnosis code: a 3-character root (letter + two alphanumerics)
/// followed by up to 3 extension characters (digits or '+').
///
/// Stored as a fixed NUL-padded ASCII buffer so codes are `Copy` and hashable
/// without allocation.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiagnosisCode([u8; 8]);

impl DiagnosisCode {
    /// The empty (invalid) code.
    pub const NONE: DiagnosisCode = DiagnosisCode([0; 8]);

    /// Build from raw ASCII bytes, validating shape. Accepts 3 to 6 characters.
    pub fn from_ascii(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 3 || bytes.len() > 6 {
            return None;
        }
        if !bytes[0].is_ascii_uppercase()
            || !bytes[1].is_ascii_alphanumeric()
            || !bytes[2].is_ascii_alphanumeric()
        {
            return None;
        }
        for &b in &bytes[3..] {
            if !b.is_ascii_digit() && b != b'+' {
                return None;
            }
        }
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(DiagnosisCode(buf))
    }

    pub fn is_valid(&self) -> bool {
        self.0[0] != 0
    }

    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(8);
        // Bytes are validated ASCII on construction.
        std::str::from_utf8(&self.0[..len]).unwrap_or("")
    }

    /// The 3-character root, e.g. "J18" for "J181".
    pub fn root(&self) -> &str {
        &self.as_str()[..3.min(self.as_str().len())]
    }
}

impl FromStr for DiagnosisCode {
    type Err = CasemixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiagnosisCode::from_ascii(s.trim().as_bytes())
            .ok_or_else(|| CasemixError::MalformedCode(s.to_string()))
    }
}

impl fmt::Display for DiagnosisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for DiagnosisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiagnosisCode({})", self.as_str())
    }
}

// ── ProcedureCode ────────────────────────────────────────────────────────────

/// CCAM procedure code: three letters, one letter, three digits ("HFFC0044"
/// minus the extension — exactly 7 characters, e.g. "EBLA003").
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcedureCode([u8; 7]);

impl ProcedureCode {
    pub const NONE: ProcedureCode = ProcedureCode([0; 7]);

    pub fn from_ascii(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 7 {
            return None;
        }
        if !bytes[..4].iter().all(|b| b.is_ascii_uppercase())
            || !bytes[4..].iter().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let mut buf = [0u8; 7];
        buf.copy_from_slice(bytes);
        Some(ProcedureCode(buf))
    }

    pub fn is_valid(&self) -> bool {
        self.0[0] != 0
    }

    pub fn as_str(&self) -> &str {
        if self.is_valid() {
            std::str::from_utf8(&self.0).unwrap_or("")
        } else {
            ""
        }
    }
}

impl FromStr for ProcedureCode {
    type Err = CasemixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcedureCode::from_ascii(s.trim().as_bytes())
            .ok_or_else(|| CasemixError::MalformedCode(s.to_string()))
    }
}

impl fmt::Display for ProcedureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ProcedureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProcedureCode({})", self.as_str())
    }
}

// ── GhmRootCode ──────────────────────────────────────────────────────────────

/// GHM root: CMD (two decimal digits, 1–28 or 90 for errors), type letter
/// (C, H, K, M or Z) and a two-digit sequence. Rendered "NNtSS", e.g. "04M05".
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GhmRootCode {
    pub cmd: u8,
    pub kind: u8,
    pub seq: u8,
}

impl GhmRootCode {
    pub const NONE: GhmRootCode = GhmRootCode { cmd: 0, kind: 0, seq: 0 };

    pub fn new(cmd: u8, kind: u8, seq: u8) -> Self {
        GhmRootCode { cmd, kind, seq }
    }

    pub fn is_valid(&self) -> bool {
        self.cmd != 0 && matches!(self.kind, b'C' | b'H' | b'K' | b'M' | b'Z')
    }
}

impl FromStr for GhmRootCode {
    type Err = CasemixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let b = s.as_bytes();
        let malformed = || CasemixError::MalformedCode(s.to_string());
        if b.len() != 5 {
            return Err(malformed());
        }
        let cmd = s[..2].parse::<u8>().map_err(|_| malformed())?;
        let seq = s[3..5].parse::<u8>().map_err(|_| malformed())?;
        let root = GhmRootCode { cmd, kind: b[2], seq };
        if !root.is_valid() {
            return Err(malformed());
        }
        Ok(root)
    }
}

impl fmt::Display for GhmRootCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{}{:02}", self.cmd, self.kind as char, self.seq)
    }
}

impl fmt::Debug for GhmRootCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GhmRootCode({self})")
    }
}

// ── GhmCode ──────────────────────────────────────────────────────────────────

/// Full GHM code: a root plus a mode letter. Rendered "NNtSSm", e.g. "04M051".
///
/// Mode 0 means "not graded yet": the decision tree emits ungraded codes for
/// severity-split roots and the classifier fills the digit in afterwards.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GhmCode {
    pub cmd: u8,
    pub kind: u8,
    pub seq: u8,
    pub mode: u8,
}

/// CMD reserved for grouping errors.
pub const GHM_ERROR_CMD: u8 = 90;

impl GhmCode {
    pub const NONE: GhmCode = GhmCode { cmd: 0, kind: 0, seq: 0, mode: 0 };

    pub fn new(cmd: u8, kind: u8, seq: u8, mode: u8) -> Self {
        GhmCode { cmd, kind, seq, mode }
    }

    /// The generic grouping-error GHM "90Z00Z".
    pub fn error() -> Self {
        GhmCode { cmd: GHM_ERROR_CMD, kind: b'Z', seq: 0, mode: b'Z' }
    }

    pub fn from_root(root: GhmRootCode, mode: u8) -> Self {
        GhmCode { cmd: root.cmd, kind: root.kind, seq: root.seq, mode }
    }

    pub fn root(&self) -> GhmRootCode {
        GhmRootCode { cmd: self.cmd, kind: self.kind, seq: self.seq }
    }

    pub fn is_valid(&self) -> bool {
        self.root().is_valid()
    }

    pub fn is_error(&self) -> bool {
        self.cmd == GHM_ERROR_CMD
    }

    /// Severity level 0–4 encoded by the mode character, or `None` for
    /// non-severity modes (J, T, Z, 0).
    pub fn severity(&self) -> Option<u8> {
        match self.mode {
            b'1'..=b'4' => Some(self.mode - b'1'),
            b'A'..=b'E' => Some(self.mode - b'A'),
            _ => None,
        }
    }

    /// Re-grade the mode to the given severity, preserving the digit/letter
    /// flavor already in place (ungraded codes become digit-graded).
    pub fn with_severity(&self, severity: u8) -> Self {
        let mode = match self.mode {
            0 | b'1'..=b'4' => b'1' + severity,
            b'A'..=b'E' => b'A' + severity,
            _ => self.mode,
        };
        GhmCode { mode, ..*self }
    }

    /// Replace the mode character outright, for the non-severity switches
    /// (ambulatory 'J', short-stay 'T').
    pub fn with_mode(&self, mode: u8) -> Self {
        GhmCode { mode, ..*self }
    }
}

impl FromStr for GhmCode {
    type Err = CasemixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let malformed = || CasemixError::MalformedCode(s.to_string());
        match s.len() {
            5 => Ok(GhmCode::from_root(s.parse::<GhmRootCode>()?, 0)),
            6 => {
                let root = s[..5].parse::<GhmRootCode>()?;
                let mode = s.as_bytes()[5];
                if !matches!(mode, b'A'..=b'E' | b'J' | b'Z' | b'T' | b'1'..=b'4') {
                    return Err(malformed());
                }
                Ok(GhmCode::from_root(root, mode))
            }
            _ => Err(malformed()),
        }
    }
}

impl fmt::Display for GhmCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mode != 0 {
            write!(f, "{}{}", self.root(), self.mode as char)
        } else {
            write!(f, "{}", self.root())
        }
    }
}

impl fmt::Debug for GhmCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GhmCode({self})")
    }
}

// ── GhsCode ──────────────────────────────────────────────────────────────────

/// GHS number (16-bit, positive). 0 is invalid; 9999 is the "no GHS" sentinel
/// used when a valid GHM has no access chunk that passes.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GhsCode(pub u16);

impl GhsCode {
    pub const NONE: GhsCode = GhsCode(9999);

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl FromStr for GhsCode {
    type Err = CasemixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n = s
            .trim()
            .parse::<u16>()
            .map_err(|_| CasemixError::MalformedCode(s.to_string()))?;
        Ok(GhsCode(n))
    }
}

impl fmt::Display for GhsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for GhsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GhsCode({})", self.0)
    }
}

// ── Sex ──────────────────────────────────────────────────────────────────────

/// Patient sex as coded in RUM records ('1' male, '2' female). Diagnosis
/// attributes are stored per sex; `index()` selects the variant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sex {
    Male = 1,
    Female = 2,
}

impl Sex {
    pub fn from_rum(c: u8) -> Option<Sex> {
        match c {
            b'1' => Some(Sex::Male),
            b'2' => Some(Sex::Female),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize - 1
    }
}

// ── UnitCode ─────────────────────────────────────────────────────────────────

/// Care-unit number. `UnitCode::FACILITY` (i16::MAX) is the reserved value
/// meaning "applies to the whole facility".
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitCode(pub i16);

impl UnitCode {
    pub const FACILITY: UnitCode = UnitCode(i16::MAX);

    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for UnitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == UnitCode::FACILITY {
            f.write_str("facility")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Debug for UnitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitCode({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnosis_code_parse_and_format() {
        let code: DiagnosisCode = "J181".parse().unwrap();
        assert!(code.is_valid());
        assert_eq!(code.as_str(), "J181");
        assert_eq!(code.root(), "J18");

        assert!("A01+".parse::<DiagnosisCode>().is_ok());
        assert!("Z99999".parse::<DiagnosisCode>().is_ok());
        assert!("j181".parse::<DiagnosisCode>().is_err());
        assert!("J1".parse::<DiagnosisCode>().is_err());
        assert!("J181abc".parse::<DiagnosisCode>().is_err());
    }

    #[test]
    fn procedure_code_parse() {
        let proc: ProcedureCode = "EBLA003".parse().unwrap();
        assert_eq!(proc.as_str(), "EBLA003");
        assert!("EBLA03".parse::<ProcedureCode>().is_err());
        assert!("EBL0003".parse::<ProcedureCode>().is_err());
    }

    #[test]
    fn ghm_code_roundtrip() {
        let ghm: GhmCode = "04M051".parse().unwrap();
        assert_eq!(ghm.to_string(), "04M051");
        assert_eq!(ghm.root().to_string(), "04M05");
        assert_eq!(ghm.severity(), Some(0));
        assert!(!ghm.is_error());

        let err = GhmCode::error();
        assert_eq!(err.to_string(), "90Z00Z");
        assert!(err.is_error());
    }

    #[test]
    fn ghm_severity_regrade() {
        let ghm: GhmCode = "04M05".parse().unwrap();
        assert_eq!(ghm.mode, 0);
        assert_eq!(ghm.with_severity(2).to_string(), "04M053");

        let graded: GhmCode = "28Z01B".parse().unwrap();
        assert_eq!(graded.severity(), Some(1));
        assert_eq!(graded.with_severity(3).to_string(), "28Z01D");
    }

    #[test]
    fn ghm_mode_switch() {
        let ghm: GhmCode = "04M052".parse().unwrap();
        let ambulatory = ghm.with_mode(b'J');
        assert_eq!(ambulatory.to_string(), "04M05J");
        assert_eq!(ambulatory.severity(), None);
        assert_eq!(ambulatory.root(), ghm.root());
    }

    #[test]
    fn unit_code_facility() {
        assert_eq!(UnitCode::FACILITY.to_string(), "facility");
        assert_eq!(UnitCode(350).to_string(), "350");
        assert!(!UnitCode(0).is_valid());
        assert!(UnitCode(350).is_valid());
    }
}
