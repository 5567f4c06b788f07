//! casemix-tables — versioned reference-table loading.
//!
//! Parses ATIH binary table files (`.tab`, optionally gzipped) and JSON
//! tariff files into a `TableSet`: a chronologically indexed union of table
//! revisions. Each `TableIndex` covers one maximal date interval during
//! which the set of active tables is constant; unchanged sub-tables are
//! shared between adjacent indexes.

pub mod authorizations;
#[cfg(feature = "demo")]
pub mod demo;
pub mod dump;
pub mod info;
pub mod prices;
pub mod set;
pub mod tab;
pub mod write;

pub use authorizations::{Authorization, AuthorizationSet};
pub use info::*;
pub use prices::PriceTable;
pub use set::{TableIndex, TableSet, TableSetBuilder};
