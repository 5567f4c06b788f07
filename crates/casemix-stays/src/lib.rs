//! casemix-stays — stay (RUM) records and importers.
//!
//! One `Stay` is one RUM; stays sharing a bill id form one hospitalization.
//! Importers cover the packed binary round-trip format (`.dspak`), the ATIH
//! fixed-column RSS/GRP formats (RUM versions 16–22) and the RSA
//! line-per-stay format. Textual importers record per-field anomalies in
//! `Stay::error_mask` instead of failing the file.

pub mod builder;
pub mod pack;
pub mod rss;
pub mod stay;

pub use builder::StaySetBuilder;
pub use stay::{ProcedureRealisation, Stay, StayEntry, StayError, StayExit, StaySet, StayTest};
