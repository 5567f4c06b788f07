//! Binary table writing.
//!
//! The inverse of `tab`: serializes section data into the `.tab` container
//! (master header + pointer section + embedded tables). Used to synthesize
//! table files for test sets and tooling.

use byteorder::{BigEndian, ByteOrder};

use crate::tab::{HEADER_LEN, SECTION_LEN, TABLE_PTR_LEN, TAB_MAGIC};

/// One section to embed: fixed-width records, already encoded.
pub struct TabSection {
    pub value_len: usize,
    pub data: Vec<u8>,
}

impl TabSection {
    pub fn new(value_len: usize, data: Vec<u8>) -> TabSection {
        assert!(value_len > 0 && data.len() % value_len == 0, "section data not record-aligned");
        TabSection { value_len, data }
    }

    fn values_count(&self) -> usize {
        self.data.len() / self.value_len
    }
}

/// One embedded table with its validity range (wire day offsets).
pub struct TabTable {
    pub name: String,
    pub limit_from: u16,
    pub limit_to: u16,
    pub sections: Vec<TabSection>,
}

fn push_header(out: &mut Vec<u8>, version: &str, build_date: &str, name: &str, sections: usize) {
    assert!(version.len() == 4 && build_date.len() == 6 && name.len() <= 8);
    out.extend_from_slice(TAB_MAGIC);
    out.extend_from_slice(version.as_bytes());
    out.extend_from_slice(build_date.as_bytes());
    out.extend_from_slice(format!("{name:<8}").as_bytes());
    out.extend_from_slice(&(sections as u16).to_be_bytes());
}

fn push_section_desc(out: &mut Vec<u8>, values_count: usize, value_len: usize, raw_offset: usize) {
    out.extend_from_slice(&[0u8; 10]);
    out.extend_from_slice(&(values_count as u16).to_be_bytes());
    out.extend_from_slice(&(value_len as u16).to_be_bytes());
    out.extend_from_slice(&((values_count * value_len) as u32).to_be_bytes());
    out.extend_from_slice(&(raw_offset as u32).to_be_bytes());
}

fn table_bytes(table: &TabTable, version: &str, build_date: &str) -> Vec<u8> {
    let mut out = Vec::new();
    push_header(&mut out, version, build_date, &table.name, table.sections.len());

    let mut data_offset = HEADER_LEN + table.sections.len() * SECTION_LEN;
    for section in &table.sections {
        push_section_desc(&mut out, section.values_count(), section.value_len, data_offset);
        data_offset += section.data.len();
    }
    for section in &table.sections {
        out.extend_from_slice(&section.data);
    }
    out
}

/// Serialize a complete `.tab` file: `version` is the 4-digit "MMmm" string,
/// `build_date` the 6-digit "DDMMYY" string.
pub fn write_tab_file(version: &str, build_date: &str, tables: &[TabTable]) -> Vec<u8> {
    let bodies: Vec<Vec<u8>> = tables.iter().map(|t| table_bytes(t, version, build_date)).collect();

    let mut out = Vec::new();
    push_header(&mut out, version, build_date, "ATIHTAB", 1);
    push_section_desc(&mut out, tables.len(), TABLE_PTR_LEN, HEADER_LEN + SECTION_LEN);

    let mut body_offset = HEADER_LEN + SECTION_LEN + tables.len() * TABLE_PTR_LEN;
    for (table, body) in tables.iter().zip(&bodies) {
        let mut ptr = [0u8; 10];
        BigEndian::write_u16(&mut ptr[0..2], table.limit_from);
        BigEndian::write_u16(&mut ptr[2..4], table.limit_to);
        BigEndian::write_u32(&mut ptr[6..10], body_offset as u32);
        out.extend_from_slice(&ptr);
        body_offset += body.len();
    }
    for body in &bodies {
        out.extend_from_slice(body);
    }
    out
}

// ── Record encoders ──────────────────────────────────────────────────────────
//
// Helpers mirroring the per-kind record layouts in `tab`.

/// 6-byte decision-tree test node.
pub fn tree_test_node(function: u8, params: [u8; 2], children_count: u8, children_idx: u16) -> Vec<u8> {
    let mut raw = vec![function, params[0], params[1], children_count, 0, 0];
    BigEndian::write_u16(&mut raw[4..6], children_idx);
    raw
}

/// 6-byte decision-tree leaf (function 12). `kind_idx`/`mode_idx` index the
/// packed character tables.
pub fn tree_leaf_node(cmd: u8, kind_idx: u16, seq: u16, mode_idx: u16, error: u8) -> Vec<u8> {
    let packed = kind_idx * 1000 + seq * 10 + mode_idx;
    let mut raw = vec![12, error, cmd, 0, 0, 0];
    BigEndian::write_u16(&mut raw[4..6], packed);
    raw
}

/// 10-byte severity cell (inclusive wire maxima).
pub fn severity_cell(var1: (u16, u16), var2: (u16, u16), value: u16) -> Vec<u8> {
    let mut raw = vec![0u8; 10];
    BigEndian::write_u16(&mut raw[0..2], var1.0);
    BigEndian::write_u16(&mut raw[2..4], var1.1);
    BigEndian::write_u16(&mut raw[4..6], var2.0);
    BigEndian::write_u16(&mut raw[6..8], var2.1);
    BigEndian::write_u16(&mut raw[8..10], value);
    raw
}
