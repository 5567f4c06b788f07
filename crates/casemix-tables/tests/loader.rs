//! End-to-end loader tests over the synthetic demo table set.
//!
//! Run with:
//!   cargo test -p casemix-tables --test loader

use std::io::Write;

use casemix_core::{CasemixError, DiagnosisCode, GhsCode, ProcedureCode, Sector, SupplementKind};
use casemix_tables::demo::{
    demo_authorization_set, demo_end, demo_prices_json, demo_start, demo_tab_bytes,
    demo_table_set,
};
use casemix_tables::{AuthorizationScope, GhmDecisionNode, TableSetBuilder};
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn demo_set_builds_one_index() {
    let set = demo_table_set();
    assert_eq!(set.indexes.len(), 1);

    let index = &set.indexes[0];
    assert_eq!(index.limit_from, demo_start());
    assert_eq!(index.limit_to, demo_end());

    assert!(set.find_index(Some(date(2019, 6, 1))).is_some());
    assert!(set.find_index(Some(date(2018, 6, 1))).is_none());
    assert!(set.find_index(None).is_some());
}

#[test]
fn decision_tree_decodes() {
    let set = demo_table_set();
    let index = &set.indexes[0];
    assert_eq!(index.ghm_nodes.len(), 7);

    match index.ghm_nodes[0] {
        GhmDecisionNode::Test { function, params, children_idx, children_count } => {
            assert_eq!(function, 26);
            assert_eq!(params, [3, 0]);
            assert_eq!(children_idx, 1);
            assert_eq!(children_count, 2);
        }
        _ => panic!("node 0 should be a test"),
    }
    match index.ghm_nodes[5] {
        GhmDecisionNode::Leaf { ghm, error } => {
            assert_eq!(ghm.to_string(), "04M05");
            assert_eq!(error, 0);
        }
        _ => panic!("node 5 should be a leaf"),
    }
    match index.ghm_nodes[6] {
        GhmDecisionNode::Leaf { ghm, .. } => assert_eq!(ghm.to_string(), "28Z04Z"),
        _ => panic!("node 6 should be a leaf"),
    }
}

#[test]
fn diagnosis_table_decodes() {
    let set = demo_table_set();
    let index = &set.indexes[0];

    let j181 = index.diagnosis("J181".parse::<DiagnosisCode>().unwrap()).unwrap();
    assert!(!j181.sex_difference);
    assert_eq!(j181.attributes[0].cmd, 4);
    assert_eq!(j181.attributes[0].severity, 0);
    assert_eq!(j181.attributes[0].raw[2] & 0x01, 0x01);

    let a410 = index.diagnosis("A410".parse::<DiagnosisCode>().unwrap()).unwrap();
    assert_eq!(a410.attributes[0].severity, 2);

    assert!(index.diagnosis("Z999".parse::<DiagnosisCode>().unwrap()).is_none());
}

#[test]
fn procedure_table_decodes() {
    let set = demo_table_set();
    let index = &set.indexes[0];

    let code = "EBLA003".parse::<ProcedureCode>().unwrap();
    let procs = index.procedures(code);
    assert_eq!(procs.len(), 1);
    assert_eq!(procs[0].activities & (1 << 1), 1 << 1);
    assert!(index.procedure(code, 0, date(2019, 4, 3)).is_some());
    assert!(index.procedure(code, 1, date(2019, 4, 3)).is_none());

    let delivery = "JQGD001".parse::<ProcedureCode>().unwrap();
    assert_eq!(index.procedures(delivery).len(), 1);
}

#[test]
fn ghm_root_table_decodes() {
    let set = demo_table_set();
    let index = &set.indexes[0];

    let root = index.ghm_root("04M05".parse().unwrap()).unwrap();
    assert_eq!(root.confirm_duration_threshold, 2);
    assert_eq!(root.short_duration_threshold, 1);
    assert!(!root.allow_ambulatory);
    assert_eq!(root.old_age_threshold, 80);
    assert_eq!(root.old_severity_limit, 1);

    // Duration mode 1 means ambulatory, exclusive with the 'T' threshold.
    let ambulatory = index.ghm_root("01M03".parse().unwrap()).unwrap();
    assert!(ambulatory.allow_ambulatory);
    assert_eq!(ambulatory.short_duration_threshold, 0);

    let childbirth = index.ghm_root("14Z02".parse().unwrap()).unwrap();
    assert_eq!(childbirth.childbirth_severity_list, 1);
}

#[test]
fn ghs_access_chunks_keep_declaration_order_within_a_root() {
    let set = demo_table_set();
    let index = &set.indexes[0];

    let chunks = index.compatible_ghs("04M05".parse().unwrap());
    assert_eq!(chunks.len(), 2);
    // The duration-constrained chunk is declared first and must stay first.
    assert_eq!(chunks[0].minimal_duration, 30);
    assert_eq!(chunks[0].ghs(Sector::Public), GhsCode(4004));
    assert_eq!(chunks[0].ghs(Sector::Private), GhsCode(4104));
    assert_eq!(chunks[1].minimal_duration, 0);
    assert_eq!(chunks[1].ghs(Sector::Public), GhsCode(4005));
}

#[test]
fn prices_and_coefficients_index() {
    let set = demo_table_set();
    let index = &set.indexes[0];

    let price = index.ghs_price(GhsCode(4005), Sector::Public).unwrap();
    assert_eq!(price.price_cents, 200_000);
    assert_eq!(price.exb_threshold, 2);
    assert_eq!(price.exh_threshold, 20);

    // 4006 only carries private data; public inherits it.
    let inherited = index.ghs_price(GhsCode(4006), Sector::Public).unwrap();
    assert_eq!(inherited.price_cents, 180_000);

    assert_eq!(index.supplement_tariffs(Sector::Public)[SupplementKind::Rea], 80_000);
    assert_eq!(index.supplement_tariffs(Sector::Public)[SupplementKind::Reasi], 40_000);
    assert_eq!(index.supplement_tariffs(Sector::Public)[SupplementKind::Si], 40_000);

    assert_eq!(index.ghs_coefficients[Sector::Public.index()], 10_250);
    assert_eq!(index.ghs_coefficients[Sector::Private.index()], 10_000);
}

#[test]
fn authorization_tables_index_by_scope() {
    let set = demo_table_set();
    let index = &set.indexes[0];

    assert_eq!(index.authorization(AuthorizationScope::Unit, 1).unwrap().function, 1);
    assert_eq!(index.authorization(AuthorizationScope::Bed, 8).unwrap().function, 3);
    assert_eq!(index.authorization(AuthorizationScope::Facility, 9).unwrap().function, 8);
    assert!(index.authorization(AuthorizationScope::Unit, 77).is_none());

    let pair = &index.src_pairs[0][0];
    assert_eq!(pair.diagnosis.as_str(), "J181");
    assert_eq!(pair.procedure.as_str(), "EBLA003");
}

#[test]
fn old_versions_are_rejected() {
    let mut data = demo_tab_bytes();
    // Patch the master header version down to 11.09.
    data[8..12].copy_from_slice(b"1109");
    let mut builder = TableSetBuilder::new();
    let err = builder.load_tab_data(&data, "old.tab").unwrap_err();
    assert!(matches!(err, CasemixError::UnsupportedVersion { major: 11, minor: 9, .. }));
}

#[test]
fn truncated_files_are_rejected() {
    let data = demo_tab_bytes();
    let mut builder = TableSetBuilder::new();
    assert!(builder.load_tab_data(&data[..200], "short.tab").is_err());
    assert!(builder.load_tab_data(&data[..20], "tiny.tab").is_err());
}

#[test]
fn section_length_mismatch_is_rejected() {
    let mut data = demo_tab_bytes();
    // First embedded table starts after the master header, its section
    // descriptor raw_len field at +14 within the descriptor.
    let first_table = 28 + 22 + 8 * 10;
    let raw_len_at = first_table + 28 + 14;
    data[raw_len_at] ^= 0x01;
    let mut builder = TableSetBuilder::new();
    assert!(builder.load_tab_data(&data, "bad.tab").is_err());
}

#[test]
fn gzipped_tables_load() {
    let dir = std::env::temp_dir().join(format!("casemix-loader-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("demo.tab.gz");

    let mut encoder =
        flate2::write::GzEncoder::new(std::fs::File::create(&path).unwrap(), Default::default());
    encoder.write_all(&demo_tab_bytes()).unwrap();
    encoder.finish().unwrap();

    let mut builder = TableSetBuilder::new();
    builder.load_tab(&path).unwrap();
    builder.load_prices_data(demo_prices_json().as_bytes(), "demo.json").unwrap();
    let set = builder.finish().unwrap();
    assert_eq!(set.indexes.len(), 1);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn authorization_set_parses_units_and_facility() {
    let auths = demo_authorization_set();
    assert_eq!(auths.find_unit_at(casemix_core::UnitCode(101), date(2019, 4, 2)).unwrap().kind, 1);
    assert!(auths.find_unit_at(casemix_core::UnitCode(101), date(2020, 4, 2)).is_none());
    // Open-ended entry.
    assert!(auths.find_unit_at(casemix_core::UnitCode(305), date(2030, 1, 1)).is_some());
}
