//! Sequential and parallel classification drivers.
//!
//! The table and authorization sets are read-only; each cluster is a pure
//! computation, so the parallel driver is an ordered map over cluster
//! chunks followed by one concatenation. `results[i]` always corresponds to
//! the i-th cluster in input order, whatever the worker scheduling was.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::warn;

use casemix_core::{
    CasemixError, GhsCode, Sector, SupplementCounters, ERR_NO_GHS_PRICE, ERR_NO_TABLE_INDEX,
};
use casemix_stays::Stay;
use casemix_tables::{AuthorizationSet, TableSet};

use crate::aggregate::aggregate;
use crate::cluster::cluster_ranges;
use crate::errors::ErrorSet;
use crate::flags::MONO;
use crate::ghm::classify_ghm;
use crate::ghs::{classify_ghs, count_supplements};
use crate::pricing::{apply_coefficient, price_ghs, price_supplements, GhsPricing};
use crate::result::ClassifyResult;

/// Clusters per worker chunk.
pub const CLUSTER_CHUNK: usize = 64;

#[derive(Clone, Copy, Debug)]
pub struct ClassifySettings {
    pub flags: u32,
    pub sector: Sector,
    pub apply_coefficient: bool,
}

impl Default for ClassifySettings {
    fn default() -> Self {
        ClassifySettings { flags: 0, sector: Sector::Public, apply_coefficient: false }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ClassifyOutput {
    pub results: Vec<ClassifyResult>,
    /// One result per RUM when the `mono` flag is set, empty otherwise.
    pub mono_results: Vec<ClassifyResult>,
}

/// Classify one cluster (`stays[start..start + len]`) end to end.
fn classify_cluster(
    table_set: &TableSet,
    auths: &AuthorizationSet,
    stays: &[Stay],
    start: usize,
    len: usize,
    settings: &ClassifySettings,
) -> Result<ClassifyResult, CasemixError> {
    let cluster = &stays[start..start + len];
    let last = &cluster[len - 1];

    let mut result = ClassifyResult {
        bill_id: cluster[0].bill_id,
        stays_start: start,
        stays_len: len,
        sector: settings.sector,
        exit_date: last.exit.date,
        ..Default::default()
    };

    let Some(index) = table_set.find_index(last.exit.date) else {
        result.ghm = casemix_core::GhmCode::error();
        result.main_error = ERR_NO_TABLE_INDEX;
        result.unit = cluster[0].unit;
        return Ok(result);
    };

    let mut errors = ErrorSet::new();
    let agg = aggregate(index, cluster, settings.flags, &mut errors);
    result.duration = agg.duration;
    result.main_stay_idx = agg.main_stay_idx;
    result.unit = agg.main_stay().unit;

    result.ghm = classify_ghm(&agg, settings.flags, &mut errors)?;
    result.ghs = classify_ghs(&agg, auths, result.ghm, settings.sector);

    let mut supplement_days = SupplementCounters::new();
    if !result.ghm.is_error() {
        count_supplements(&agg, auths, &mut supplement_days);
    }
    result.supplement_days = supplement_days;

    // ── Pricing ──────────────────────────────────────────────────────────────
    let death = agg.exit_mode == b'9';
    let mut pricing = GhsPricing::default();
    if result.ghs.is_valid() && result.ghs != GhsCode::NONE {
        match index.ghs_price(result.ghs, settings.sector) {
            Some(price) => {
                pricing = price_ghs(price, agg.duration, death);
                if settings.apply_coefficient {
                    let coefficient = index.ghs_coefficients[settings.sector.index()];
                    pricing.ghs_cents = apply_coefficient(pricing.ghs_cents, coefficient);
                    pricing.price_cents = apply_coefficient(pricing.price_cents, coefficient);
                }
            }
            None => errors.add(ERR_NO_GHS_PRICE, 5),
        }
    }
    result.exb_exh = pricing.exb_exh;
    result.ghs_cents = pricing.ghs_cents;
    result.price_cents = pricing.price_cents;

    result.supplement_cents =
        price_supplements(&supplement_days, index.supplement_tariffs(settings.sector));
    let supplement_total: i64 =
        result.supplement_cents.values.iter().map(|&cents| cents as i64).sum();
    result.total_cents = result.price_cents + supplement_total;

    result.main_error = errors.main_error();
    Ok(result)
}

fn classify_chunk(
    table_set: &TableSet,
    auths: &AuthorizationSet,
    stays: &[Stay],
    ranges: &[(usize, usize)],
    settings: &ClassifySettings,
) -> Result<(Vec<ClassifyResult>, Vec<ClassifyResult>), CasemixError> {
    let mut results = Vec::with_capacity(ranges.len());
    let mut mono_results = Vec::new();

    for &(start, len) in ranges {
        results.push(classify_cluster(table_set, auths, stays, start, len, settings)?);
        if settings.flags & MONO != 0 {
            for i in 0..len {
                mono_results.push(classify_cluster(table_set, auths, stays, start + i, 1, settings)?);
            }
        }
    }
    Ok((results, mono_results))
}

/// Classify a whole stay sequence sequentially.
pub fn classify(
    table_set: &TableSet,
    auths: &AuthorizationSet,
    stays: &[Stay],
    settings: &ClassifySettings,
) -> Result<ClassifyOutput, CasemixError> {
    let ranges = cluster_ranges(stays);
    let (results, mono_results) = classify_chunk(table_set, auths, stays, &ranges, settings)?;
    Ok(ClassifyOutput { results, mono_results })
}

/// Classify in parallel over ~64-cluster chunks. Results come back in input
/// order and are bit-identical to the sequential driver's.
///
/// `cancel` is cooperative: chunks already running finish, chunks not yet
/// started are skipped and the output is truncated.
pub fn classify_parallel(
    table_set: &TableSet,
    auths: &AuthorizationSet,
    stays: &[Stay],
    settings: &ClassifySettings,
    cancel: Option<&AtomicBool>,
) -> Result<ClassifyOutput, CasemixError> {
    let ranges = cluster_ranges(stays);

    let processed: Vec<Result<Option<(Vec<ClassifyResult>, Vec<ClassifyResult>)>, CasemixError>> =
        ranges
            .par_chunks(CLUSTER_CHUNK)
            .map(|chunk| {
                if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                    return Ok(None);
                }
                classify_chunk(table_set, auths, stays, chunk, settings).map(Some)
            })
            .collect();

    let mut output = ClassifyOutput::default();
    output.results.reserve(ranges.len());
    for item in processed {
        match item? {
            Some((results, mono_results)) => {
                output.results.extend(results);
                output.mono_results.extend(mono_results);
            }
            None => {
                warn!("classification cancelled, output truncated");
                break;
            }
        }
    }
    Ok(output)
}
