//! JSON tariff files.
//!
//! One file holds an array of price tables, each valid from its `date`
//! onwards: per-GHS base price and EXB/EXH parameters for both sectors plus
//! per-day supplement prices. Unknown keys are tolerated; a missing sector
//! inherits the other one.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use casemix_core::{CasemixError, GhsCode, SupplementCounters, SupplementKind, COEFFICIENT_SCALE};

use crate::info::GhsPriceInfo;

/// One tariff revision, already split per sector.
#[derive(Clone, Debug)]
pub struct PriceTable {
    pub build_date: NaiveDate,
    pub date: NaiveDate,
    pub ghs_prices: [Vec<GhsPriceInfo>; 2],
    pub supplement_cents: [SupplementCounters<i32>; 2],
    /// Sector coefficients, fixed-point × 10_000 (10_000 = neutral).
    pub coefficients: [i64; 2],
}

#[derive(Deserialize)]
struct RawPriceTable {
    build_date: NaiveDate,
    date: NaiveDate,
    #[serde(default)]
    ghs: Vec<RawGhsEntry>,
    #[serde(default)]
    supplements: RawSupplements,
    #[serde(default)]
    coefficients: RawCoefficients,
}

#[derive(Deserialize, Default)]
struct RawCoefficients {
    public: Option<i64>,
    private: Option<i64>,
}

#[derive(Deserialize)]
struct RawGhsEntry {
    ghs: u16,
    public: Option<RawSectorPrice>,
    private: Option<RawSectorPrice>,
}

#[derive(Deserialize, Clone, Copy, Default)]
struct RawSectorPrice {
    #[serde(default)]
    price_cents: i32,
    #[serde(default)]
    exh_treshold: i16,
    #[serde(default)]
    exh_cents: i32,
    #[serde(default)]
    exb_treshold: i16,
    #[serde(default)]
    exb_cents: i32,
    #[serde(default)]
    exb_once: bool,
}

#[derive(Deserialize, Default)]
struct RawSupplements {
    public: Option<RawSupplementSector>,
    private: Option<RawSupplementSector>,
}

#[derive(Deserialize, Clone, Copy, Default)]
struct RawSupplementSector {
    #[serde(default)]
    rea_cents: i32,
    /// Priced identically for REASI and SI.
    #[serde(default)]
    stf_cents: i32,
    #[serde(default)]
    src_cents: i32,
    #[serde(default)]
    nn1_cents: i32,
    #[serde(default)]
    nn2_cents: i32,
    #[serde(default)]
    nn3_cents: i32,
    #[serde(default)]
    rep_cents: i32,
}

fn sector_price(ghs: GhsCode, raw: RawSectorPrice) -> GhsPriceInfo {
    GhsPriceInfo {
        ghs,
        price_cents: raw.price_cents,
        exh_threshold: raw.exh_treshold,
        exh_cents: raw.exh_cents,
        exb_threshold: raw.exb_treshold,
        exb_cents: raw.exb_cents,
        exb_once: raw.exb_once,
    }
}

fn supplement_counters(raw: RawSupplementSector) -> SupplementCounters<i32> {
    let mut counters = SupplementCounters::new();
    counters[SupplementKind::Rea] = raw.rea_cents;
    counters[SupplementKind::Reasi] = raw.stf_cents;
    counters[SupplementKind::Si] = raw.stf_cents;
    counters[SupplementKind::Src] = raw.src_cents;
    counters[SupplementKind::Nn1] = raw.nn1_cents;
    counters[SupplementKind::Nn2] = raw.nn2_cents;
    counters[SupplementKind::Nn3] = raw.nn3_cents;
    counters[SupplementKind::Rep] = raw.rep_cents;
    counters
}

/// Parse a tariff file. Entries with no sector data at all are skipped with
/// a warning rather than failing the file.
pub fn parse_prices_json(data: &[u8], path: &str) -> Result<Vec<PriceTable>, CasemixError> {
    let raw_tables: Vec<RawPriceTable> =
        serde_json::from_slice(data).map_err(|err| CasemixError::InvalidPriceFile {
            path: path.to_string(),
            reason: err.to_string(),
        })?;

    let mut tables = Vec::with_capacity(raw_tables.len());
    for raw in raw_tables {
        let mut ghs_prices: [Vec<GhsPriceInfo>; 2] = [Vec::new(), Vec::new()];
        for entry in raw.ghs {
            let ghs = GhsCode(entry.ghs);
            if !ghs.is_valid() {
                warn!(path, "skipping price entry with GHS 0");
                continue;
            }
            let (public, private) = match (entry.public, entry.private) {
                (Some(public), Some(private)) => (public, private),
                (Some(public), None) => (public, public),
                (None, Some(private)) => (private, private),
                (None, None) => {
                    warn!(path, ghs = ghs.0, "skipping price entry with no sector data");
                    continue;
                }
            };
            ghs_prices[0].push(sector_price(ghs, public));
            ghs_prices[1].push(sector_price(ghs, private));
        }

        let (public_sup, private_sup) = match (raw.supplements.public, raw.supplements.private) {
            (Some(public), Some(private)) => (public, private),
            (Some(public), None) => (public, public),
            (None, Some(private)) => (private, private),
            (None, None) => (RawSupplementSector::default(), RawSupplementSector::default()),
        };

        tables.push(PriceTable {
            build_date: raw.build_date,
            date: raw.date,
            ghs_prices,
            supplement_cents: [supplement_counters(public_sup), supplement_counters(private_sup)],
            coefficients: [
                raw.coefficients.public.unwrap_or(COEFFICIENT_SCALE),
                raw.coefficients.private.unwrap_or(COEFFICIENT_SCALE),
            ],
        });
    }

    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_sectors_and_inherits_missing_one() {
        let json = br#"[{
            "build_date": "2019-01-15",
            "date": "2019-03-01",
            "ghs": [
                {"ghs": 4005,
                 "public": {"price_cents": 200000, "exb_treshold": 2, "exb_cents": 30000,
                            "exh_treshold": 20, "exh_cents": 10000},
                 "private": {"price_cents": 150000}},
                {"ghs": 4006, "public": {"price_cents": 90000, "exb_once": true}}
            ],
            "supplements": {"public": {"rea_cents": 80000, "stf_cents": 40000}},
            "future_key": 1
        }]"#;

        let tables = parse_prices_json(json, "test.json").unwrap();
        assert_eq!(tables.len(), 1);
        let table = &tables[0];

        assert_eq!(table.ghs_prices[0].len(), 2);
        assert_eq!(table.ghs_prices[0][0].price_cents, 200_000);
        assert_eq!(table.ghs_prices[0][0].exb_threshold, 2);
        assert_eq!(table.ghs_prices[1][0].price_cents, 150_000);
        // Private inherits public for 4006.
        assert_eq!(table.ghs_prices[1][1].price_cents, 90_000);
        assert!(table.ghs_prices[1][1].exb_once);

        assert_eq!(table.supplement_cents[0][SupplementKind::Rea], 80_000);
        assert_eq!(table.supplement_cents[0][SupplementKind::Reasi], 40_000);
        assert_eq!(table.supplement_cents[0][SupplementKind::Si], 40_000);
        // Supplements inherit too.
        assert_eq!(table.supplement_cents[1][SupplementKind::Rea], 80_000);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_prices_json(b"{", "bad.json").is_err());
    }
}
