//! ─── Casemix protocol constants ──────────────────────────────────────────────
//!
//! French PMSI "MCO" grouping, function groups (FG) 11.10 and later.
//! Monetary amounts are integer cents throughout; the only scaled value is
//! the per-root sector coefficient (fixed-point × 10_000).

// ── Table format ─────────────────────────────────────────────────────────────

/// Oldest supported function-group version (FG 11.10). Older table layouts
/// differ and are rejected at load time.
pub const MIN_TABLE_VERSION: (u16, u16) = (11, 10);

/// Maximum sections per binary table.
pub const MAX_TABLE_SECTIONS: usize = 16;

// ── Classification ───────────────────────────────────────────────────────────

/// Age (in days at admission) up to which a patient counts as a neonate for
/// NN1/NN2/NN3 supplements and day-based age tests.
pub const NEONATE_AGE_DAYS: i32 = 28;

/// Scale of the per-root sector coefficient (4-decimal fixed point).
pub const COEFFICIENT_SCALE: i64 = 10_000;

// ── Main error codes ─────────────────────────────────────────────────────────
//
// Numeric codes emitted by decision-tree leaves and post-leaf rules.
// Lower priority values win when several errors accumulate.

/// RSS confirmation flag required (short stay) and absent.
pub const ERR_CONFIRMATION_MISSING: i16 = 202;

/// Confirmation required and absent, transfer exit ('6'/'7').
pub const ERR_CONFIRMATION_MISSING_TRANSFER: i16 = 201;

/// Childbirth diagnosis present without a matching childbirth procedure.
pub const ERR_CHILDBIRTH_DIAGNOSIS_ONLY: i16 = 80;

/// Childbirth procedure present without a matching childbirth diagnosis.
pub const ERR_CHILDBIRTH_PROCEDURE_ONLY: i16 = 82;

/// GHS resolved but no price entry exists for it in the tariff tables.
pub const ERR_NO_GHS_PRICE: i16 = 370;

/// No table index covers the cluster's exit date.
pub const ERR_NO_TABLE_INDEX: i16 = 502;
