//! Synthetic demonstration table set (behind the `demo` feature).
//!
//! A minimal but complete FG table set — decision tree, diagnoses,
//! procedures, GHM roots, severity cells, GHS access, authorizations, SRC
//! pairs, tariffs — wired so a handful of well-known scenarios classify end
//! to end. The downstream test suites build on it.
//!
//! Contents, valid from 2019-03-01 to 2020-03-01:
//!
//! - Diagnoses: J181 (pneumonia, respiratory list bit, CMD 04), I10, A410
//!   (sepsis, severity 2), O800 (childbirth, CMD 14).
//! - Procedures: EBLA003 (activity 1), JQGD001 (vaginal delivery).
//! - Tree: childbirth → 14Z02; respiratory + sessions → 28Z04Z;
//!   respiratory → 04M05 (ungraded); otherwise 01M03.
//! - Roots: 01M03 allows ambulatory care ('J'); 04M05 requires confirmation
//!   under 2 nights, allows the 'T' short-stay mode, forces severity ≥ 1 at
//!   age ≥ 80; 14Z02 uses the childbirth severity list.
//! - GHS: 04M05 → 4004 when duration ≥ 30, else 4005 (public) / 4006
//!   (private); 01M03 → 1003; 28Z04Z → 9621; 14Z02 → 5001.
//! - Authorizations: unit code 1 → REA, 2 → NN1, 6 → SRC; bed code 8 → SI;
//!   facility code 9 → REP. Unit 101 holds code 1 through 2019.
//! - Tariffs: GHS 4005 at 2000 € with EXB < 2 nights (300 €/day) and
//!   EXH ≥ 20 nights (100 €/day); public coefficient 1.0250.

use casemix_core::date_to_1980;
use chrono::NaiveDate;

use crate::authorizations::AuthorizationSet;
use crate::set::{TableSet, TableSetBuilder};
use crate::write::{severity_cell, tree_leaf_node, tree_test_node, write_tab_file, TabSection, TabTable};

pub fn demo_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 3, 1).unwrap()
}

pub fn demo_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()
}

// ── Section encoders ─────────────────────────────────────────────────────────

fn be16(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

fn diag_ptr(code456: u16, attr_idx: u16, warn_idx: u8, excl_bit: u16, excl_idx: u16) -> Vec<u8> {
    let mut raw = Vec::with_capacity(9);
    raw.extend_from_slice(&be16(code456));
    raw.extend_from_slice(&be16(attr_idx));
    raw.push(warn_idx);
    raw.extend_from_slice(&be16(excl_bit));
    raw.extend_from_slice(&be16(excl_idx));
    raw
}

fn proc_ptr(char4: u8, seq_phase: u16, bytes_idx: u16, date_min: u16, date_max: u16) -> Vec<u8> {
    let mut raw = Vec::with_capacity(9);
    raw.push(char4);
    raw.extend_from_slice(&be16(seq_phase));
    raw.extend_from_slice(&be16(bytes_idx));
    raw.extend_from_slice(&be16(date_min));
    raw.extend_from_slice(&be16(date_max));
    raw
}

fn ghm_root_record(
    cmd: u8,
    type_seq: u16,
    young_mode: u8,
    old_mode: u8,
    duration_mode: u8,
    confirm_threshold: u8,
    childbirth_mode: u8,
) -> Vec<u8> {
    let mut raw = vec![cmd];
    raw.extend_from_slice(&be16(type_seq));
    raw.extend_from_slice(&[young_mode, old_mode, duration_mode, 0, 0, 0, 0]);
    raw.push(confirm_threshold);
    raw.push(childbirth_mode);
    raw
}

fn ghs_record(
    cmd: u8,
    type_seq: u16,
    function: u8,
    params: [u8; 2],
    ghs: Option<(u16, u16)>,
) -> Vec<u8> {
    let mut raw = vec![cmd];
    raw.extend_from_slice(&be16(type_seq));
    raw.push(0); // low duration mode
    raw.push(function);
    raw.extend_from_slice(&params);
    raw.push(0); // skip after failure
    raw.push(ghs.is_some() as u8);
    let (public, private) = ghs.unwrap_or((0, 0));
    raw.extend_from_slice(&be16(public));
    raw.extend_from_slice(&[0; 4]);
    raw.extend_from_slice(&be16(private));
    raw.extend_from_slice(&[0; 4]);
    raw
}

fn src_record(diag_root: u16, diag_ext: u16, proc_root: u16, proc_ext: u16) -> Vec<u8> {
    let mut raw = Vec::with_capacity(8);
    for value in [diag_root, diag_ext, proc_root, proc_ext] {
        raw.extend_from_slice(&be16(value));
    }
    raw
}

/// Cumulative end-index section for block-indexed tables (diagnoses use
/// 26×100 roots, procedures 26³).
fn root_index_section(root_count: usize, entries: &[(usize, usize)]) -> TabSection {
    let mut data = Vec::with_capacity(root_count * 2);
    let mut end = 0usize;
    let mut it = entries.iter().peekable();
    for root_idx in 0..root_count {
        while let Some(&&(entry_root, count)) = it.peek() {
            if entry_root != root_idx {
                break;
            }
            end += count;
            it.next();
        }
        data.extend_from_slice(&be16(end as u16));
    }
    TabSection::new(2, data)
}

// ── Table assembly ───────────────────────────────────────────────────────────

const ATTR_LEN: usize = 22;
const PROC_BYTES_LEN: usize = 40;

fn diagnoses_table(from: u16, to: u16) -> TabTable {
    // Attribute rows (both sexes identical): [cmd, jump, raw bytes...].
    let mut attrs = Vec::new();
    let mut push_attr = |set: &[(usize, u8)], cmd: u8| {
        let mut row = vec![0u8; ATTR_LEN * 2];
        row[0] = cmd;
        for &(offset, mask) in set {
            row[offset] |= mask;
        }
        let (male, female) = row.split_at_mut(ATTR_LEN);
        female.copy_from_slice(male);
        attrs.extend_from_slice(&row);
    };
    push_attr(&[(21, 0x80)], 18); // A410: severity 2
    push_attr(&[], 5); // I10
    push_attr(&[(2, 0x01)], 4); // J181: respiratory list
    push_attr(&[(14, 0x40)], 14); // O800: childbirth

    // (root_idx, code456, attr_idx, exclusion bit)
    let entries = [
        (41u16, 132u16, 0u16, 0u16),  // A410
        (810, 0, 1, 1),               // I10
        (918, 264, 2, 2),             // J181
        (1480, 132, 3, 3),            // O800
    ];
    let mut ptrs = Vec::new();
    for &(_, code456, attr_idx, bit) in &entries {
        ptrs.extend_from_slice(&diag_ptr(code456, attr_idx, 0, bit, 0));
    }

    TabTable {
        name: "DIAG10CR".to_string(),
        limit_from: from,
        limit_to: to,
        sections: vec![
            root_index_section(2600, &entries.iter().map(|e| (e.0 as usize, 1)).collect::<Vec<_>>()),
            TabSection::new(9, ptrs),
            TabSection::new(ATTR_LEN * 2, attrs),
            TabSection::new(8, vec![0u8; 8]),
            TabSection::new(32, vec![0u8; 32 * 4]),
        ],
    }
}

fn procedures_table(from: u16, to: u16) -> TabTable {
    let mut bytes_rows = vec![0u8; PROC_BYTES_LEN * 2];
    bytes_rows[31] = 0x01; // EBLA003: activity 1
    bytes_rows[PROC_BYTES_LEN + 27] = 0x10; // JQGD001: vaginal delivery
    bytes_rows[PROC_BYTES_LEN + 31] = 0x01;

    let mut ptrs = Vec::new();
    ptrs.extend_from_slice(&proc_ptr(0, 30, 0, 0, u16::MAX)); // EBLA003 phase 0
    ptrs.extend_from_slice(&proc_ptr(3, 10, 1, 0, u16::MAX)); // JQGD001 phase 0

    TabTable {
        name: "CCAMCARA".to_string(),
        limit_from: from,
        limit_to: to,
        sections: vec![
            root_index_section(26 * 26 * 26, &[(2741, 1), (6506, 1)]),
            TabSection::new(9, ptrs),
            TabSection::new(PROC_BYTES_LEN, bytes_rows),
        ],
    }
}

fn tree_table(from: u16, to: u16) -> TabTable {
    let mut nodes = Vec::new();
    // 0: childbirth? (flags & 0b11)
    nodes.extend_from_slice(&tree_test_node(26, [3, 0], 2, 1));
    // 1: respiratory list bit on the main diagnosis?
    nodes.extend_from_slice(&tree_test_node(0, [2, 0x01], 2, 3));
    // 2: childbirth leaf 14Z02, ungraded
    nodes.extend_from_slice(&tree_leaf_node(14, 5, 2, 0, 0));
    // 3: default leaf 01M03, ungraded
    nodes.extend_from_slice(&tree_leaf_node(1, 4, 3, 0, 0));
    // 4: sessions?
    nodes.extend_from_slice(&tree_test_node(4, [0, 0], 2, 5));
    // 5: pneumonia leaf 04M05, ungraded
    nodes.extend_from_slice(&tree_leaf_node(4, 4, 5, 0, 0));
    // 6: session leaf 28Z04Z
    nodes.extend_from_slice(&tree_leaf_node(28, 5, 4, 7, 0));

    TabTable {
        name: "ARBREDEC".to_string(),
        limit_from: from,
        limit_to: to,
        sections: vec![TabSection::new(6, nodes)],
    }
}

fn ghm_roots_table(from: u16, to: u16) -> TabTable {
    let mut records = Vec::new();
    // 01M03: ambulatory-allowed.
    records.extend_from_slice(&ghm_root_record(1, 403, 0, 0, 1, 0, 0));
    // 04M05: confirmation under 2 nights, 'T' under 1 night, severity ≥ 1 at 80+.
    records.extend_from_slice(&ghm_root_record(4, 405, 0, 2, 2, 2, 0));
    records.extend_from_slice(&ghm_root_record(14, 502, 0, 0, 0, 0, 2)); // 14Z02
    records.extend_from_slice(&ghm_root_record(28, 504, 0, 0, 0, 0, 0)); // 28Z04

    TabTable {
        name: "RGHMINFO".to_string(),
        limit_from: from,
        limit_to: to,
        sections: vec![TabSection::new(12, records)],
    }
}

fn severity_table(from: u16, to: u16) -> TabTable {
    TabTable {
        name: "TABCOMBI".to_string(),
        limit_from: from,
        limit_to: to,
        sections: vec![
            // gnn: (newborn weight, gestational age) → 0
            TabSection::new(10, severity_cell((0, 9998), (0, 98), 0)),
            // childbirth list 1: any gestational age, severity 0..3 → 1
            TabSection::new(10, severity_cell((0, 98), (0, 3), 1)),
            TabSection::new(10, severity_cell((0, 98), (0, 3), 0)),
            TabSection::new(10, severity_cell((0, 98), (0, 3), 0)),
        ],
    }
}

fn ghs_access_table(from: u16, to: u16) -> TabTable {
    let mut records = Vec::new();
    // 01M03 → 1003.
    records.extend_from_slice(&ghs_record(1, 40300, 0, [0, 0], Some((1003, 1003))));
    // 04M05, long stays (≥ 30 nights) → 4004/4104.
    records.extend_from_slice(&ghs_record(4, 40500, 6, [0, 29], None));
    records.extend_from_slice(&ghs_record(4, 40500, 0, [0, 0], Some((4004, 4104))));
    // 04M05, all other stays → 4005/4006.
    records.extend_from_slice(&ghs_record(4, 40500, 0, [0, 0], Some((4005, 4006))));
    // 14Z02 → 5001.
    records.extend_from_slice(&ghs_record(14, 50200, 0, [0, 0], Some((5001, 5001))));
    // 28Z04Z → 9621.
    records.extend_from_slice(&ghs_record(28, 50407, 0, [0, 0], Some((9621, 9621))));

    TabTable {
        name: "GHSINFO".to_string(),
        limit_from: from,
        limit_to: to,
        sections: vec![TabSection::new(21, records)],
    }
}

fn authorizations_table(from: u16, to: u16) -> TabTable {
    // Bed authorizations.
    let beds = vec![8, 3, 0]; // code 8 → SI
    // Unit authorizations; the last entry is facility-wide.
    let units = vec![
        1, 1, 0, // code 1 → REA
        2, 5, 0, // code 2 → NN1
        6, 4, 0, // code 6 → SRC
        9, 8, 1, // code 9 → REP (facility)
    ];
    TabTable {
        name: "AUTOREFS".to_string(),
        limit_from: from,
        limit_to: to,
        sections: vec![TabSection::new(3, beds), TabSection::new(3, units)],
    }
}

fn src_pairs_table(from: u16, to: u16) -> TabTable {
    TabTable {
        name: "SRCDGACT".to_string(),
        limit_from: from,
        limit_to: to,
        sections: vec![
            TabSection::new(8, src_record(918, 264, 2741, 3)), // (J181, EBLA003)
            TabSection::new(8, src_record(41, 132, 6506, 3001)), // (A410, JQGD001)
        ],
    }
}

/// The demo `.tab` file bytes.
pub fn demo_tab_bytes() -> Vec<u8> {
    let from = date_to_1980(demo_start());
    let to = date_to_1980(demo_end());
    write_tab_file(
        "1115",
        "010319",
        &[
            tree_table(from, to),
            diagnoses_table(from, to),
            procedures_table(from, to),
            ghm_roots_table(from, to),
            severity_table(from, to),
            ghs_access_table(from, to),
            authorizations_table(from, to),
            src_pairs_table(from, to),
        ],
    )
}

/// The demo tariff file.
pub fn demo_prices_json() -> &'static str {
    r#"[{
        "build_date": "2019-01-15",
        "date": "2019-03-01",
        "ghs": [
            {"ghs": 1003, "public": {"price_cents": 50000}},
            {"ghs": 4004, "public": {"price_cents": 250000}, "private": {"price_cents": 240000}},
            {"ghs": 4005,
             "public": {"price_cents": 200000, "exb_treshold": 2, "exb_cents": 30000,
                        "exh_treshold": 20, "exh_cents": 10000},
             "private": {"price_cents": 180000, "exb_treshold": 2, "exb_cents": 25000,
                         "exh_treshold": 20, "exh_cents": 9000}},
            {"ghs": 4006, "private": {"price_cents": 180000}},
            {"ghs": 4104, "private": {"price_cents": 240000}},
            {"ghs": 5001, "public": {"price_cents": 150000}},
            {"ghs": 9621, "public": {"price_cents": 30000}}
        ],
        "supplements": {
            "public": {"rea_cents": 80000, "stf_cents": 40000, "src_cents": 20000,
                       "nn1_cents": 30000, "nn2_cents": 45000, "nn3_cents": 60000,
                       "rep_cents": 25000}
        },
        "coefficients": {"public": 10250}
    }]"#
}

/// The demo authorization file: unit 101 is an ICU (code 1) through 2019.
pub fn demo_authorizations_json() -> &'static str {
    r#"[
        {"authorization": 1, "unit": 101, "begin_date": "2019-01-01", "end_date": "2020-01-01"},
        {"authorization": 2, "unit": 305, "begin_date": "2019-01-01"}
    ]"#
}

/// Assemble the whole demo `TableSet` (binary tables + tariffs).
pub fn demo_table_set() -> TableSet {
    let mut builder = TableSetBuilder::new();
    builder
        .load_tab_data(&demo_tab_bytes(), "demo.tab")
        .expect("demo tables parse");
    builder
        .load_prices_data(demo_prices_json().as_bytes(), "demo.json")
        .expect("demo prices parse");
    builder.finish().expect("demo set builds")
}

/// The matching demo `AuthorizationSet`.
pub fn demo_authorization_set() -> AuthorizationSet {
    AuthorizationSet::from_json(demo_authorizations_json().as_bytes(), "demo-auth.json")
        .expect("demo authorizations parse")
}
