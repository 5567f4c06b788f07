//! GHS and supplement pricing. Everything is integer cents; the sector
//! coefficient is fixed-point × 10_000.

use casemix_core::{SupplementCounters, SupplementKind, COEFFICIENT_SCALE};
use casemix_tables::GhsPriceInfo;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GhsPricing {
    pub ghs_cents: i64,
    pub price_cents: i64,
    /// Negative = EXB days, positive = EXH days.
    pub exb_exh: i32,
}

/// Price one GHS for a given stay duration. Death exits count as
/// full-duration stays, so the low-duration penalty never applies to them.
pub fn price_ghs(price: &GhsPriceInfo, duration: i32, death: bool) -> GhsPricing {
    let ghs_cents = price.price_cents as i64;

    if !death && price.exb_threshold > 0 && duration < price.exb_threshold as i32 {
        let exb_exh = duration - price.exb_threshold as i32;
        let penalty = if price.exb_once {
            price.exb_cents as i64
        } else {
            (-exb_exh) as i64 * price.exb_cents as i64
        };
        return GhsPricing {
            ghs_cents,
            price_cents: (ghs_cents - penalty).max(0),
            exb_exh,
        };
    }

    if price.exh_threshold > 0 && duration >= price.exh_threshold as i32 {
        let exb_exh = duration - price.exh_threshold as i32 + 1;
        return GhsPricing {
            ghs_cents,
            price_cents: ghs_cents + exb_exh as i64 * price.exh_cents as i64,
            exb_exh,
        };
    }

    GhsPricing { ghs_cents, price_cents: ghs_cents, exb_exh: 0 }
}

/// Apply a sector coefficient (fixed-point × 10_000) to a cent amount.
pub fn apply_coefficient(cents: i64, coefficient: i64) -> i64 {
    cents * coefficient / COEFFICIENT_SCALE
}

/// Price counted supplement days against the per-day tariffs.
pub fn price_supplements(
    days: &SupplementCounters<i16>,
    tariffs: &SupplementCounters<i32>,
) -> SupplementCounters<i32> {
    let mut cents = SupplementCounters::new();
    for kind in SupplementKind::ALL {
        cents[kind] = days[kind] as i32 * tariffs[kind];
    }
    cents
}

#[cfg(test)]
mod tests {
    use super::*;
    use casemix_core::GhsCode;

    fn price() -> GhsPriceInfo {
        GhsPriceInfo {
            ghs: GhsCode(4005),
            price_cents: 200_000,
            exb_threshold: 2,
            exb_cents: 30_000,
            exh_threshold: 20,
            exh_cents: 10_000,
            exb_once: false,
        }
    }

    #[test]
    fn exb_exh_boundaries() {
        // duration == exb_threshold - 1 → one EXB day.
        let p = price_ghs(&price(), 1, false);
        assert_eq!(p.exb_exh, -1);
        assert_eq!(p.price_cents, 170_000);

        // duration == exb_threshold → no adjustment.
        let p = price_ghs(&price(), 2, false);
        assert_eq!(p.exb_exh, 0);
        assert_eq!(p.price_cents, 200_000);

        // duration == exh_threshold - 1 → still none.
        let p = price_ghs(&price(), 19, false);
        assert_eq!(p.exb_exh, 0);

        // duration == exh_threshold → one EXH day.
        let p = price_ghs(&price(), 20, false);
        assert_eq!(p.exb_exh, 1);
        assert_eq!(p.price_cents, 210_000);
    }

    #[test]
    fn exb_once_is_a_lump_sum() {
        let mut info = price();
        info.exb_once = true;
        let p = price_ghs(&info, 0, false);
        assert_eq!(p.exb_exh, -2);
        assert_eq!(p.price_cents, 170_000);
    }

    #[test]
    fn exb_price_floors_at_zero() {
        let mut info = price();
        info.exb_cents = 150_000;
        let p = price_ghs(&info, 0, false);
        assert_eq!(p.price_cents, 0);
    }

    #[test]
    fn death_skips_exb() {
        let p = price_ghs(&price(), 0, true);
        assert_eq!(p.exb_exh, 0);
        assert_eq!(p.price_cents, 200_000);
    }

    #[test]
    fn coefficient_is_fixed_point() {
        assert_eq!(apply_coefficient(200_000, 10_000), 200_000);
        assert_eq!(apply_coefficient(200_000, 10_250), 205_000);
        assert_eq!(apply_coefficient(199_999, 9_999), 199_979);
    }

    #[test]
    fn supplements_multiply_days_by_tariff() {
        let mut days = SupplementCounters::<i16>::new();
        days[SupplementKind::Rea] = 2;
        let mut tariffs = SupplementCounters::<i32>::new();
        tariffs[SupplementKind::Rea] = 80_000;
        let cents = price_supplements(&days, &tariffs);
        assert_eq!(cents[SupplementKind::Rea], 160_000);
        assert_eq!(cents[SupplementKind::Si], 0);
    }
}
