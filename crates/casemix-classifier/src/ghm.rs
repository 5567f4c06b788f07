//! GHM classification: decision-tree walk, severity grading and the
//! post-leaf adjustment rules.

use casemix_core::{
    CasemixError, GhmCode, Sex, ERR_CHILDBIRTH_DIAGNOSIS_ONLY, ERR_CHILDBIRTH_PROCEDURE_ONLY,
    ERR_CONFIRMATION_MISSING, ERR_CONFIRMATION_MISSING_TRANSFER,
};
use casemix_tables::{find_cell, GhmDecisionNode, GhmRootInfo};

use crate::aggregate::{
    Aggregate, ERR_MISSING_MAIN_DIAGNOSIS, FLAG_CHILDBIRTH_DIAGNOSIS, FLAG_CHILDBIRTH_PROCEDURE,
    FLAG_CHILDBIRTH_TYPE,
};
use crate::errors::ErrorSet;
use crate::flags::IGNORE_CONFIRMATION;

/// GHM root missing from the root table for a tree-emitted GHM.
pub const ERR_UNKNOWN_GHM_ROOT: i16 = 4;

// ── Severity / duration interplay ────────────────────────────────────────────

/// Minimum stay duration required to keep a severity level
/// (0 → 0, 1 → 3, 2 → 5, 3 → 7, 4 → 9 nights).
pub fn minimal_duration_for_severity(severity: u8) -> i32 {
    if severity == 0 {
        0
    } else {
        2 * severity as i32 + 1
    }
}

/// Demote a severity until the stay is long enough to support it.
pub fn limit_severity_with_duration(severity: u8, duration: i32) -> u8 {
    let mut severity = severity;
    while severity > 0 && duration < minimal_duration_for_severity(severity) {
        severity -= 1;
    }
    severity
}

// ── Decision tree interpreter ────────────────────────────────────────────────
//
// Test functions by id. Binary tests pick child 1 when the condition holds,
// child 0 otherwise; n-ary tests index children directly. Function 12 is the
// leaf, function 20 the long jump (resolved at parse time), function 28
// records an error and falls through its single child.
//
//   0  main diagnosis attribute byte p0 & mask p1
//   1  any procedure capability byte p0 & mask p1
//   2  age in days > p0
//   3  age in years > p0
//   4  session count > p0
//   5  main or linked diagnosis byte p0 & mask p1
//   6  any diagnosis byte p0 & mask p1
//   7  duration < p0
//   8  duration > p0
//   9  sex == p0 (1 male, 2 female)
//  10  exit mode == p0 (decimal digit)
//  11  procedure activity bit p0 present
//  13  main diagnosis CMD routing byte == p0
//  14  entry mode == p0 (decimal digit)
//  15  linked diagnosis byte p0 & mask p1
//  18  n-ary: gnn cell value for (newborn weight, gestational age), p1 if none
//  19  duration == p0
//  22  n-ary: cma cell list p0 value for (age, main diagnosis severity)
//  26  childbirth aggregate flag & p0
//  28  record error p0, continue
//  30  session count == p0
//  39  confirmation flag present (or confirmation ignored)

fn diag_mask(info: Option<&casemix_tables::DiagnosisInfo>, sex: Sex, offset: u8, mask: u8) -> bool {
    info.is_some_and(|info| {
        info.attributes(sex)
            .raw
            .get(offset as usize)
            .is_some_and(|&byte| byte & mask != 0)
    })
}

fn run_test(
    agg: &Aggregate<'_>,
    flags: u32,
    function: u8,
    params: [u8; 2],
    errors: &mut ErrorSet,
) -> Result<usize, CasemixError> {
    let sex = agg.attributes_sex();
    let [p0, p1] = params;

    let outcome = match function {
        0 => diag_mask(agg.main_diag, sex, p0, p1),
        1 => agg
            .procedures
            .iter()
            .any(|proc| proc.bytes.get(p0 as usize).is_some_and(|&b| b & p1 != 0)),
        2 => agg.age_days > p0 as i32,
        3 => agg.age > p0 as i32,
        4 => agg.session_count > p0 as i16,
        5 => diag_mask(agg.main_diag, sex, p0, p1) || diag_mask(agg.linked_diag, sex, p0, p1),
        6 => agg
            .diagnoses
            .iter()
            .any(|diag| diag_mask(Some(diag), sex, p0, p1)),
        7 => agg.duration < p0 as i32,
        8 => agg.duration > p0 as i32,
        9 => agg.sex.map(|s| s as u8) == Some(p0),
        10 => agg.exit_mode == b'0' + p0,
        11 => agg.proc_activities & (1 << p0) != 0,
        13 => agg
            .main_diag
            .is_some_and(|info| info.attributes(sex).cmd == p0),
        14 => agg.stays[0].entry.mode == b'0' + p0,
        15 => diag_mask(agg.linked_diag, sex, p0, p1),
        18 => {
            let value = find_cell(
                &agg.index.gnn_cells,
                agg.newborn_weight as i32,
                agg.gestational_age as i32,
            )
            .unwrap_or(p1 as i32);
            return Ok(value.max(0) as usize);
        }
        19 => agg.duration == p0 as i32,
        22 => {
            let severity = agg
                .main_diag
                .map(|info| info.attributes(sex).severity)
                .unwrap_or(0);
            let cells = &agg.index.cma_cells[(p0 as usize) % 3];
            let value = find_cell(cells, agg.age, severity as i32).unwrap_or(0);
            return Ok(value.max(0) as usize);
        }
        26 => agg.flags & p0 as u16 != 0,
        28 => {
            errors.add(p0 as i16, 0);
            return Ok(0);
        }
        30 => agg.session_count == p0 as i16,
        39 => agg.confirmed || flags & IGNORE_CONFIRMATION != 0,
        _ => {
            return Err(CasemixError::CorruptTree(format!(
                "unknown test function {function}"
            )));
        }
    };
    Ok(outcome as usize)
}

/// Walk the tree from node 0 to a leaf. The walk must make strictly forward
/// progress; anything else means the table is corrupt.
fn run_tree(
    agg: &Aggregate<'_>,
    flags: u32,
    errors: &mut ErrorSet,
) -> Result<GhmCode, CasemixError> {
    let nodes = &agg.index.ghm_nodes;
    if nodes.is_empty() {
        return Err(CasemixError::CorruptTree("empty tree".to_string()));
    }

    let mut node_idx = 0usize;
    for _ in 0..nodes.len() + 8 {
        match nodes[node_idx] {
            GhmDecisionNode::Leaf { ghm, error } => {
                if error != 0 {
                    errors.add(error, 0);
                }
                return Ok(ghm);
            }
            GhmDecisionNode::Test { function, params, children_idx, children_count } => {
                let child = run_test(agg, flags, function, params, errors)?;
                if child >= children_count {
                    return Err(CasemixError::CorruptTree(format!(
                        "function {function} selected child {child} of {children_count}"
                    )));
                }
                let next = children_idx + child;
                if next <= node_idx || next >= nodes.len() {
                    return Err(CasemixError::CorruptTree(format!(
                        "node {node_idx} does not advance (to {next})"
                    )));
                }
                node_idx = next;
            }
        }
    }
    Err(CasemixError::CorruptTree("step limit exceeded".to_string()))
}

// ── Severity grading ─────────────────────────────────────────────────────────

/// Compute the cluster severity (0–3) from associated diagnoses, honouring
/// both exclusion mechanisms, then the childbirth severity cell list.
fn compute_severity(agg: &Aggregate<'_>, root: &GhmRootInfo) -> u8 {
    let sex = agg.attributes_sex();
    let mut severity = 0u8;

    if let Some(main) = agg.main_diag {
        let exclusion_row = agg.index.exclusion(main);
        for diag in &agg.diagnoses {
            if std::ptr::eq(*diag, main)
                || agg.linked_diag.is_some_and(|linked| std::ptr::eq(*diag, linked))
            {
                continue;
            }
            let attr = diag.attributes(sex);
            if attr.severity <= severity {
                continue;
            }
            // Excluded from CMA for this root?
            if root.cma_exclusion.test(&attr.raw) {
                continue;
            }
            // Excluded by the main diagnosis' exclusion row?
            if exclusion_row.is_some_and(|row| diag.cma_exclusion.test(&row.raw)) {
                continue;
            }
            severity = attr.severity;
        }
    }

    if agg.flags & FLAG_CHILDBIRTH_TYPE != 0 && root.childbirth_severity_list > 0 {
        let cells = &agg.index.cma_cells[(root.childbirth_severity_list as usize - 1) % 3];
        if let Some(value) = find_cell(cells, agg.gestational_age as i32, severity as i32) {
            severity = value.clamp(0, 3) as u8;
        }
    }

    severity
}

// ── Post-leaf adjustments ────────────────────────────────────────────────────

/// Apply the post-leaf rules in order: confirmation, childbirth consistency,
/// age severity promotion, duration demotion, short-stay mode.
fn apply_adjustments(
    agg: &Aggregate<'_>,
    root: &GhmRootInfo,
    mut ghm: GhmCode,
    flags: u32,
    errors: &mut ErrorSet,
) -> GhmCode {
    // 1. Short stays of confirm-listed roots need the RSS confirmation flag.
    if root.confirm_duration_threshold > 0
        && agg.duration < root.confirm_duration_threshold as i32
        && !agg.confirmed
        && flags & IGNORE_CONFIRMATION == 0
    {
        let error = if matches!(agg.exit_mode, b'6' | b'7') {
            ERR_CONFIRMATION_MISSING_TRANSFER
        } else {
            ERR_CONFIRMATION_MISSING
        };
        errors.add(error, 0);
        return GhmCode::error();
    }

    // 2. Childbirth diagnoses and procedures must come together.
    let has_diag = agg.flags & FLAG_CHILDBIRTH_DIAGNOSIS != 0;
    let has_proc = agg.flags & FLAG_CHILDBIRTH_PROCEDURE != 0;
    if has_diag != has_proc {
        errors.add(
            if has_diag { ERR_CHILDBIRTH_DIAGNOSIS_ONLY } else { ERR_CHILDBIRTH_PROCEDURE_ONLY },
            0,
        );
        return GhmCode::error();
    }

    if let Some(severity) = ghm.severity() {
        // 3. Age bands force a minimum severity.
        let mut severity = severity;
        if root.old_severity_limit > 0 && agg.age >= root.old_age_threshold as i32 {
            severity = severity.max(root.old_severity_limit);
        }
        if root.young_severity_limit > 0 && agg.age < root.young_age_threshold as i32 {
            severity = severity.max(root.young_severity_limit);
        }

        // 4. A severity level must be backed by enough nights. Roots that
        //    allow ambulatory care take the 'J' mode instead of dropping
        //    severity levels.
        let limited = limit_severity_with_duration(severity, agg.duration);
        ghm = if limited < severity && root.allow_ambulatory {
            ghm.with_mode(b'J')
        } else {
            ghm.with_severity(limited)
        };
    }

    // 5. Zero-night, zero-session stays of short-listed roots move to 'T'.
    if root.short_duration_threshold > 0
        && agg.duration == 0
        && agg.session_count == 0
        && ghm.severity() == Some(0)
    {
        ghm = ghm.with_mode(b'T');
    }

    ghm
}

/// Classify one aggregated cluster into its final GHM.
pub fn classify_ghm(
    agg: &Aggregate<'_>,
    flags: u32,
    errors: &mut ErrorSet,
) -> Result<GhmCode, CasemixError> {
    if agg.main_diag.is_none() {
        errors.add(ERR_MISSING_MAIN_DIAGNOSIS, 1);
        return Ok(GhmCode::error());
    }

    let mut ghm = run_tree(agg, flags, errors)?;
    if ghm.is_error() || !ghm.is_valid() {
        return Ok(if ghm.is_valid() { ghm } else { GhmCode::error() });
    }

    let Some(root) = agg.index.ghm_root(ghm.root()).copied() else {
        errors.add(ERR_UNKNOWN_GHM_ROOT, 0);
        return Ok(GhmCode::error());
    };

    // Severity-split roots come out of the tree ungraded.
    if ghm.mode == 0 {
        ghm = ghm.with_severity(compute_severity(agg, &root));
    }

    Ok(apply_adjustments(agg, &root, ghm, flags, errors))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_duration_table() {
        assert_eq!(minimal_duration_for_severity(0), 0);
        assert_eq!(minimal_duration_for_severity(1), 3);
        assert_eq!(minimal_duration_for_severity(2), 5);
        assert_eq!(minimal_duration_for_severity(3), 7);
        assert_eq!(minimal_duration_for_severity(4), 9);
    }

    #[test]
    fn severity_is_limited_by_duration() {
        assert_eq!(limit_severity_with_duration(3, 10), 3);
        assert_eq!(limit_severity_with_duration(3, 6), 2);
        assert_eq!(limit_severity_with_duration(3, 4), 1);
        assert_eq!(limit_severity_with_duration(3, 2), 0);
        assert_eq!(limit_severity_with_duration(0, 0), 0);
    }
}
