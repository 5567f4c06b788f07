//! ATIH binary table parsing.
//!
//! A `.tab` file is a concatenation of tables behind a master header: the
//! master's single section holds pointer records (validity date range +
//! offset) for each embedded table. Every embedded table repeats the header
//! layout with its own type tag and up to 16 sections of fixed-width
//! records. All multi-byte integers are big-endian; dates are 16-bit day
//! offsets from 1979-12-31.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use chrono::NaiveDate;
use flate2::read::GzDecoder;

use casemix_core::{
    date_from_1980, CasemixError, DiagnosisCode, GhmCode, GhsCode, ProcedureCode,
    MAX_TABLE_SECTIONS, MIN_TABLE_VERSION, WIRE_DAYS_MAX,
};

use crate::info::{
    AuthorizationInfo, AuthorizationScope, DiagnosisInfo, ExclusionInfo, GhmDecisionNode,
    GhmRootInfo, GhsAccessInfo, ListMask, ProcedureInfo, SectionInfo, SrcPair, TableInfo,
    TableKind, ValueRangeCell,
};

/// Table file magic, shared by the master header and embedded tables.
pub const TAB_MAGIC: &[u8; 8] = b"ATIHTAB ";

/// Header: magic[8] + version[4] + build date[6] ("DDMMYY") + name[8] +
/// section count (u16).
pub const HEADER_LEN: usize = 28;

/// Section descriptor: 10 reserved bytes + values_count (u16) +
/// value_len (u16) + raw_len (u32) + raw_offset (u32).
pub const SECTION_LEN: usize = 22;

/// Master-section pointer record: date range (2 × u16) + 2 reserved bytes +
/// raw offset (u32).
pub const TABLE_PTR_LEN: usize = 10;

fn invalid(path: &str, reason: impl Into<String>) -> CasemixError {
    CasemixError::InvalidTable { path: path.to_string(), reason: reason.into() }
}

macro_rules! fail_if {
    ($path:expr, $cond:expr) => {
        if $cond {
            return Err(invalid($path, stringify!($cond)));
        }
    };
}

fn slice<'a>(data: &'a [u8], offset: usize, len: usize, path: &str) -> Result<&'a [u8], CasemixError> {
    data.get(offset..offset.checked_add(len).unwrap_or(usize::MAX))
        .ok_or_else(|| invalid(path, format!("range {offset}+{len} out of file")))
}

/// Read a whole file, transparently decompressing `.gz`.
pub fn read_file_data(path: &Path) -> Result<Vec<u8>, CasemixError> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    if path.extension().is_some_and(|e| e == "gz") {
        GzDecoder::new(file).read_to_end(&mut data)?;
    } else {
        file.read_to_end(&mut data)?;
    }
    Ok(data)
}

// ── Headers ──────────────────────────────────────────────────────────────────

struct RawHeader {
    version: (u16, u16),
    build_date: NaiveDate,
    name: String,
    sections_count: usize,
}

fn parse_header(data: &[u8], offset: usize, path: &str) -> Result<RawHeader, CasemixError> {
    let raw = slice(data, offset, HEADER_LEN, path)?;
    fail_if!(path, &raw[0..8] != TAB_MAGIC);

    let version_str = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    fail_if!(path, !version_str.bytes().all(|b| b.is_ascii_digit()) || version_str.len() != 4);
    let major = version_str[..2].parse::<u16>().map_err(|_| invalid(path, "bad version"))?;
    let minor = version_str[2..].parse::<u16>().map_err(|_| invalid(path, "bad version"))?;

    let date_str = std::str::from_utf8(&raw[12..18]).unwrap_or("");
    let build_date = parse_build_date(date_str)
        .ok_or_else(|| invalid(path, format!("bad build date '{date_str}'")))?;

    let name = std::str::from_utf8(&raw[18..26])
        .unwrap_or("")
        .trim_end_matches([' ', '\0'])
        .to_string();
    let sections_count = BigEndian::read_u16(&raw[26..28]) as usize;

    Ok(RawHeader { version: (major, minor), build_date, name, sections_count })
}

/// "DDMMYY" with a 2000-based year.
fn parse_build_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let day = s[0..2].parse().ok()?;
    let month = s[2..4].parse().ok()?;
    let year: i32 = s[4..6].parse().ok()?;
    NaiveDate::from_ymd_opt(2000 + year, month, day)
}

fn parse_section(data: &[u8], offset: usize, path: &str) -> Result<SectionInfo, CasemixError> {
    let raw = slice(data, offset, SECTION_LEN, path)?;
    Ok(SectionInfo {
        values_count: BigEndian::read_u16(&raw[10..12]) as usize,
        value_len: BigEndian::read_u16(&raw[12..14]) as usize,
        raw_len: BigEndian::read_u32(&raw[14..18]) as usize,
        raw_offset: BigEndian::read_u32(&raw[18..22]) as usize,
    })
}

/// Parse the master header and all embedded table headers of one `.tab` file.
pub fn parse_table_headers(data: &[u8], path: &str) -> Result<Vec<TableInfo>, CasemixError> {
    let master = parse_header(data, 0, path)?;
    fail_if!(path, master.sections_count != 1);
    if master.version < MIN_TABLE_VERSION {
        return Err(CasemixError::UnsupportedVersion {
            path: path.to_string(),
            major: master.version.0,
            minor: master.version.1,
        });
    }

    let master_section = parse_section(data, HEADER_LEN, path)?;
    fail_if!(path, master_section.value_len != TABLE_PTR_LEN);

    let mut tables = Vec::with_capacity(master_section.values_count);
    for i in 0..master_section.values_count {
        let ptr = slice(
            data,
            HEADER_LEN + SECTION_LEN + i * TABLE_PTR_LEN,
            TABLE_PTR_LEN,
            path,
        )?;
        let limit_from = date_from_1980(BigEndian::read_u16(&ptr[0..2]));
        let limit_to = date_from_1980(BigEndian::read_u16(&ptr[2..4]));
        let table_offset = BigEndian::read_u32(&ptr[6..10]) as usize;
        fail_if!(path, limit_to <= limit_from);

        let header = parse_header(data, table_offset, path)?;
        fail_if!(path, header.sections_count == 0);
        fail_if!(path, header.sections_count > MAX_TABLE_SECTIONS);

        let mut sections = Vec::with_capacity(header.sections_count);
        for j in 0..header.sections_count {
            let mut section =
                parse_section(data, table_offset + HEADER_LEN + j * SECTION_LEN, path)?;
            fail_if!(path, section.raw_len != section.values_count * section.value_len);
            section.raw_offset += table_offset;
            fail_if!(path, section.raw_offset + section.raw_len > data.len());
            sections.push(section);
        }

        tables.push(TableInfo {
            path: path.to_string(),
            build_date: header.build_date,
            version: header.version,
            limit_from,
            limit_to,
            kind: TableKind::from_tag(&header.name),
            raw_kind: header.name,
            sections,
        });
    }

    Ok(tables)
}

// ── Code reconstruction ──────────────────────────────────────────────────────

const EXT_CHARS: &[u8; 12] = b" 0123456789+";

/// Rebuild a diagnosis code from its packed root index (0..2600) and
/// base-12-packed extension characters.
fn diagnosis_from_wire(root_idx: u16, code456: u16) -> DiagnosisCode {
    let mut buf = [0u8; 6];
    buf[0] = b'A' + (root_idx / 100) as u8;
    buf[1] = b'0' + ((root_idx / 10) % 10) as u8;
    buf[2] = b'0' + (root_idx % 10) as u8;

    let mut rem = code456 % 1584;
    buf[3] = EXT_CHARS[(rem / 132) as usize];
    rem %= 132;
    buf[4] = EXT_CHARS[(rem / 11) as usize];
    buf[5] = EXT_CHARS[(rem % 11) as usize];

    let mut len = 6;
    while len > 3 && buf[len - 1] == b' ' {
        len -= 1;
    }
    DiagnosisCode::from_ascii(&buf[..len]).unwrap_or_default()
}

/// Rebuild a procedure code from its base-26 root index, packed fourth
/// character and packed digits.
fn procedure_from_wire(root_idx: u16, char4: u8, digits: u16) -> ProcedureCode {
    let mut buf = [0u8; 7];
    let mut rem = root_idx;
    for i in (0..3).rev() {
        buf[i] = b'A' + (rem % 26) as u8;
        rem /= 26;
    }
    buf[3] = b'A' + (char4 % 26);
    buf[4] = b'0' + ((digits / 100) % 10) as u8;
    buf[5] = b'0' + ((digits / 10) % 10) as u8;
    buf[6] = b'0' + (digits % 10) as u8;
    ProcedureCode::from_ascii(&buf).unwrap_or_default()
}

const GHM_KIND_CHARS: [u8; 10] = [0, b'C', b'H', b'K', b'M', b'Z', b' ', b' ', b' ', b' '];
const GHM_MODE_CHARS: [u8; 10] = [0, b'A', b'B', b'C', b'D', b'E', b'J', b'Z', b' ', b' '];
const GHM_MODE_CHARS_EXT: [u8; 13] = [
    0, b'A', b'B', b'C', b'D', b'E', b'J', b'Z', b'T', b'1', b'2', b'3', b'4',
];

// ── Decision tree ────────────────────────────────────────────────────────────

pub fn parse_ghm_decision_tree(
    data: &[u8],
    table: &TableInfo,
) -> Result<Vec<GhmDecisionNode>, CasemixError> {
    let path = table.path.as_str();
    fail_if!(path, table.sections.len() != 1);
    let section = table.sections[0];
    fail_if!(path, section.value_len != 6);

    let mut nodes = Vec::with_capacity(section.values_count);
    for i in 0..section.values_count {
        let raw = slice(data, section.raw_offset + i * 6, 6, path)?;
        let function = raw[0];
        let params = [raw[1], raw[2]];
        let children_count = raw[3] as usize;
        let children_idx = BigEndian::read_u16(&raw[4..6]) as usize;

        let node = if function == 12 {
            GhmDecisionNode::Leaf {
                ghm: GhmCode::new(
                    params[1],
                    GHM_KIND_CHARS[(children_idx / 1000) % 10],
                    ((children_idx / 10) % 100) as u8,
                    GHM_MODE_CHARS[children_idx % 10],
                ),
                error: params[0] as i16,
            }
        } else {
            fail_if!(path, function >= 40);
            let (children_idx, children_count) = if function == 20 {
                // Long jump: children_idx extended by the two parameter bytes.
                (children_idx + ((params[0] as usize) << 8) + params[1] as usize, 1)
            } else {
                (children_idx, children_count)
            };
            fail_if!(path, children_count == 0);
            fail_if!(path, children_idx > section.values_count);
            fail_if!(path, children_count > section.values_count - children_idx);
            GhmDecisionNode::Test { function, params, children_idx, children_count }
        };
        nodes.push(node);
    }

    Ok(nodes)
}

// ── Diagnoses ────────────────────────────────────────────────────────────────

pub fn parse_diagnosis_table(
    data: &[u8],
    table: &TableInfo,
) -> Result<Vec<DiagnosisInfo>, CasemixError> {
    let path = table.path.as_str();
    fail_if!(path, table.sections.len() != 5);
    let [roots, ptrs, attrs, warns, excls] =
        [table.sections[0], table.sections[1], table.sections[2], table.sections[3], table.sections[4]];
    fail_if!(path, roots.values_count != 26 * 100 || roots.value_len != 2);
    fail_if!(path, ptrs.value_len != 9);
    fail_if!(path, attrs.value_len == 0 || attrs.value_len % 2 != 0 || attrs.value_len / 2 > 37);
    fail_if!(path, warns.value_len == 0 || warns.value_len > 16);
    fail_if!(path, excls.value_len == 0);

    let half_len = attrs.value_len / 2;
    let mut diagnoses = Vec::with_capacity(ptrs.values_count);

    let mut block_end = 0usize;
    for root_idx in 0..roots.values_count {
        let block_start = block_end;
        let end_idx =
            BigEndian::read_u16(slice(data, roots.raw_offset + root_idx * 2, 2, path)?) as usize;
        fail_if!(path, end_idx > ptrs.values_count);
        block_end = end_idx;

        for i in block_start..block_end {
            let raw = slice(data, ptrs.raw_offset + i * 9, 9, path)?;
            let code456 = BigEndian::read_u16(&raw[0..2]);
            let attr_idx = BigEndian::read_u16(&raw[2..4]) as usize;
            let warn_idx = raw[4] as usize;
            let excl_bit = BigEndian::read_u16(&raw[5..7]);
            let excl_idx = BigEndian::read_u16(&raw[7..9]);
            fail_if!(path, attr_idx >= attrs.values_count);
            fail_if!(path, warn_idx >= warns.values_count);
            fail_if!(path, (excl_idx as usize) >= excls.values_count);

            let mut diag = DiagnosisInfo {
                code: diagnosis_from_wire(root_idx as u16, code456),
                ..Default::default()
            };

            let sex_data = slice(data, attrs.raw_offset + attr_idx * attrs.value_len, attrs.value_len, path)?;
            diag.attributes[0].raw[..half_len].copy_from_slice(&sex_data[..half_len]);
            diag.attributes[1].raw[..half_len].copy_from_slice(&sex_data[half_len..]);
            diag.sex_difference = diag.attributes[0].raw != diag.attributes[1].raw;

            for attr in &mut diag.attributes {
                attr.cmd = attr.raw[0];
                attr.jump = attr.raw[1];
                attr.severity = if attr.raw[21] & 0x40 != 0 {
                    3
                } else if attr.raw[21] & 0x80 != 0 {
                    2
                } else if attr.raw[20] & 0x1 != 0 {
                    1
                } else {
                    0
                };
            }

            let warn_data = slice(data, warns.raw_offset + warn_idx * warns.value_len, warns.value_len, path)?;
            for (bit, &byte) in warn_data.iter().enumerate() {
                if byte != 0 {
                    diag.warnings |= 1 << bit;
                }
            }

            diag.exclusion_set_idx = excl_idx;
            diag.cma_exclusion = ListMask {
                offset: (excl_bit >> 3) as u8,
                value: 0x80 >> (excl_bit & 0x7),
            };

            diagnoses.push(diag);
        }
    }

    Ok(diagnoses)
}

pub fn parse_exclusion_table(
    data: &[u8],
    table: &TableInfo,
) -> Result<Vec<ExclusionInfo>, CasemixError> {
    let path = table.path.as_str();
    fail_if!(path, table.sections.len() != 5);
    let section = table.sections[4];
    fail_if!(path, section.value_len == 0 || section.value_len > 256);

    let mut exclusions = Vec::with_capacity(section.values_count);
    for i in 0..section.values_count {
        let raw = slice(data, section.raw_offset + i * section.value_len, section.value_len, path)?;
        let mut excl = ExclusionInfo::default();
        excl.raw[..section.value_len].copy_from_slice(raw);
        exclusions.push(excl);
    }
    Ok(exclusions)
}

// ── Procedures ───────────────────────────────────────────────────────────────

pub fn parse_procedure_table(
    data: &[u8],
    table: &TableInfo,
) -> Result<Vec<ProcedureInfo>, CasemixError> {
    let path = table.path.as_str();
    fail_if!(path, table.sections.len() != 3);
    let [roots, ptrs, bytes] = [table.sections[0], table.sections[1], table.sections[2]];
    fail_if!(path, roots.values_count != 26 * 26 * 26 || roots.value_len != 2);
    fail_if!(path, ptrs.value_len != 9);
    fail_if!(path, bytes.value_len == 0 || bytes.value_len > 55);

    let mut procedures = Vec::with_capacity(ptrs.values_count);

    let mut block_end = 0usize;
    for root_idx in 0..roots.values_count {
        let block_start = block_end;
        let end_idx =
            BigEndian::read_u16(slice(data, roots.raw_offset + root_idx * 2, 2, path)?) as usize;
        fail_if!(path, end_idx > ptrs.values_count);
        block_end = end_idx;

        for i in block_start..block_end {
            let raw = slice(data, ptrs.raw_offset + i * 9, 9, path)?;
            let char4 = raw[0];
            let seq_phase = BigEndian::read_u16(&raw[1..3]);
            let bytes_idx = BigEndian::read_u16(&raw[3..5]) as usize;
            let date_min = BigEndian::read_u16(&raw[5..7]);
            let date_max = BigEndian::read_u16(&raw[7..9]);
            fail_if!(path, bytes_idx >= bytes.values_count);

            let mut proc = ProcedureInfo {
                code: procedure_from_wire(root_idx as u16, char4, (seq_phase / 10) % 1000),
                phase: (seq_phase % 10) as u8,
                valid_from: date_from_1980(date_min),
                valid_until: if date_max < WIRE_DAYS_MAX {
                    date_from_1980(date_max + 1)
                } else {
                    date_from_1980(WIRE_DAYS_MAX)
                },
                bytes: [0; 55],
                activities: 0,
            };

            let raw_bytes = slice(data, bytes.raw_offset + bytes_idx * bytes.value_len, bytes.value_len, path)?;
            proc.bytes[..bytes.value_len].copy_from_slice(raw_bytes);

            // Activity flags live at fixed positions of the capability field.
            if proc.bytes[31] & 0x1 != 0 {
                proc.activities |= 1 << 1;
            }
            if proc.bytes[32] & 0x80 != 0 {
                proc.activities |= 1 << 2;
            }
            if proc.bytes[32] & 0x40 != 0 {
                proc.activities |= 1 << 3;
            }
            if proc.bytes[22] & 0x20 != 0 {
                proc.activities |= 1 << 4;
            }
            if proc.bytes[32] & 0x20 != 0 {
                proc.activities |= 1 << 5;
            }

            procedures.push(proc);
        }
    }

    Ok(procedures)
}

// ── GHM roots ────────────────────────────────────────────────────────────────

pub fn parse_ghm_root_table(
    data: &[u8],
    table: &TableInfo,
) -> Result<Vec<GhmRootInfo>, CasemixError> {
    let path = table.path.as_str();
    fail_if!(path, table.sections.len() != 1);
    let section = table.sections[0];
    // The childbirth severity byte appeared in FG 11.15.
    if table.version > (11, 14) {
        fail_if!(path, section.value_len != 12);
    } else {
        fail_if!(path, section.value_len != 11);
    }

    let mut roots = Vec::with_capacity(section.values_count);
    for i in 0..section.values_count {
        let raw = slice(data, section.raw_offset + i * section.value_len, section.value_len, path)?;
        let cmd = raw[0];
        let type_seq = BigEndian::read_u16(&raw[1..3]);
        let young_severity_mode = raw[3];
        let old_severity_mode = raw[4];
        let duration_severity_mode = raw[5];
        let cma_exclusion_offset = raw[8];
        let cma_exclusion_mask = raw[9];
        let confirm_threshold = raw[10];

        let mut root = GhmRootInfo {
            code: casemix_core::GhmRootCode::new(
                cmd,
                GHM_KIND_CHARS[(type_seq / 100) as usize % 10],
                (type_seq % 100) as u8,
            ),
            confirm_duration_threshold: confirm_threshold,
            cma_exclusion: ListMask { offset: cma_exclusion_offset, value: cma_exclusion_mask },
            ..Default::default()
        };

        match duration_severity_mode {
            1 => root.allow_ambulatory = true,
            2 => root.short_duration_threshold = 1,
            3 => root.short_duration_threshold = 2,
            4 => root.short_duration_threshold = 3,
            _ => {}
        }

        if young_severity_mode == 1 {
            root.young_age_threshold = 2;
            root.young_severity_limit = 1;
        }
        match old_severity_mode {
            1 => (root.old_age_threshold, root.old_severity_limit) = (70, 1),
            2 => (root.old_age_threshold, root.old_severity_limit) = (80, 1),
            3 => (root.old_age_threshold, root.old_severity_limit) = (70, 2),
            4 => (root.old_age_threshold, root.old_severity_limit) = (80, 2),
            5 => (root.old_age_threshold, root.old_severity_limit) = (70, 3),
            6 => (root.old_age_threshold, root.old_severity_limit) = (80, 3),
            _ => {}
        }

        if section.value_len >= 12 && raw[11] != 0 {
            fail_if!(path, raw[11] < 2 || raw[11] > 4);
            root.childbirth_severity_list = raw[11] - 1;
        }

        roots.push(root);
    }

    Ok(roots)
}

// ── Severity cells ───────────────────────────────────────────────────────────

pub fn parse_severity_table(
    data: &[u8],
    table: &TableInfo,
    section_idx: usize,
) -> Result<Vec<ValueRangeCell>, CasemixError> {
    let path = table.path.as_str();
    fail_if!(path, section_idx >= table.sections.len());
    let section = table.sections[section_idx];
    fail_if!(path, section.value_len != 10);

    let mut cells = Vec::with_capacity(section.values_count);
    for i in 0..section.values_count {
        let raw = slice(data, section.raw_offset + i * 10, 10, path)?;
        cells.push(ValueRangeCell {
            limits: [
                (
                    BigEndian::read_u16(&raw[0..2]) as i32,
                    BigEndian::read_u16(&raw[2..4]) as i32 + 1,
                ),
                (
                    BigEndian::read_u16(&raw[4..6]) as i32,
                    BigEndian::read_u16(&raw[6..8]) as i32 + 1,
                ),
            ],
            value: BigEndian::read_u16(&raw[8..10]) as i32,
        });
    }
    Ok(cells)
}

// ── GHS access ───────────────────────────────────────────────────────────────

pub fn parse_ghs_access_table(
    data: &[u8],
    table: &TableInfo,
) -> Result<Vec<GhsAccessInfo>, CasemixError> {
    let path = table.path.as_str();
    fail_if!(path, table.sections.len() != 1);
    let section = table.sections[0];
    // 9-byte constraint head + two 6-byte sector blocks.
    fail_if!(path, section.value_len != 21);

    let mut chunks: Vec<GhsAccessInfo> = Vec::new();
    let mut current = GhsAccessInfo::default();

    for i in 0..section.values_count {
        let raw = slice(data, section.raw_offset + i * 21, 21, path)?;
        let cmd = raw[0];
        let type_seq = BigEndian::read_u16(&raw[1..3]);
        let function = raw[4];
        let params = [raw[5], raw[6]];
        let valid_ghs = raw[8];

        if !current.ghm.is_valid() {
            current.ghm = GhmCode::new(
                cmd,
                GHM_KIND_CHARS[(type_seq / 10000) as usize % 6],
                ((type_seq / 100) % 100) as u8,
                GHM_MODE_CHARS_EXT[(type_seq % 100) as usize % 13],
            );
        }

        match function {
            0 => {
                fail_if!(path, valid_ghs == 0);
            }
            1 => {
                current.procedure_masks.push(ListMask { offset: params[0], value: params[1] });
            }
            2 => {
                fail_if!(path, params[0] != 0);
                fail_if!(path, current.unit_authorization != 0);
                current.unit_authorization = params[1];
            }
            3 => {
                fail_if!(path, params[0] != 0);
                fail_if!(path, current.bed_authorization != 0);
                current.bed_authorization = params[1];
            }
            5 => {
                fail_if!(path, current.main_diagnosis_mask.is_set());
                current.main_diagnosis_mask = ListMask { offset: params[0], value: params[1] };
            }
            6 => {
                fail_if!(path, params[0] != 0);
                fail_if!(path, current.minimal_duration != 0);
                current.minimal_duration = params[1] + 1;
            }
            7 => {
                fail_if!(path, current.diagnosis_mask.is_set());
                current.diagnosis_mask = ListMask { offset: params[0], value: params[1] };
            }
            8 => {
                fail_if!(path, params[0] != 0);
                fail_if!(path, current.minimal_age != 0);
                current.minimal_age = params[1];
            }
            _ => {
                return Err(invalid(path, format!("unknown GHS access function {function}")));
            }
        }

        if valid_ghs != 0 {
            // Each sector block is ghs (u16) + duration thresholds, which the
            // price tables carry authoritatively and are ignored here.
            current.ghs[0] = GhsCode(BigEndian::read_u16(&raw[9..11]));
            current.ghs[1] = GhsCode(BigEndian::read_u16(&raw[15..17]));
            chunks.push(std::mem::take(&mut current));
        }
    }

    // Root-major order; within a root, J/T/Z modes come before graded modes so
    // ambulatory chunks are tried first.
    chunks.sort_by(|a, b| {
        let root_cmp = (a.ghm.cmd, a.ghm.kind, a.ghm.seq).cmp(&(b.ghm.cmd, b.ghm.kind, b.ghm.seq));
        root_cmp.then_with(|| {
            let a_late = a.ghm.mode >= b'J';
            let b_late = b.ghm.mode >= b'J';
            b_late.cmp(&a_late).then(a.ghm.mode.cmp(&b.ghm.mode))
        })
    });

    Ok(chunks)
}

// ── Authorizations ───────────────────────────────────────────────────────────

pub fn parse_authorization_table(
    data: &[u8],
    table: &TableInfo,
) -> Result<Vec<AuthorizationInfo>, CasemixError> {
    let path = table.path.as_str();
    fail_if!(path, table.sections.len() != 2);
    fail_if!(path, table.sections[0].value_len != 3 || table.sections[1].value_len != 3);

    let mut auths = Vec::new();
    for (section_idx, section) in table.sections.iter().enumerate() {
        for i in 0..section.values_count {
            let raw = slice(data, section.raw_offset + i * 3, 3, path)?;
            let scope = if section_idx == 0 {
                AuthorizationScope::Bed
            } else if raw[2] == 0 {
                AuthorizationScope::Unit
            } else {
                AuthorizationScope::Facility
            };
            auths.push(AuthorizationInfo { scope, code: raw[0], function: raw[1] });
        }
    }
    Ok(auths)
}

// ── SRC pairs ────────────────────────────────────────────────────────────────

pub fn parse_src_pair_table(
    data: &[u8],
    table: &TableInfo,
    section_idx: usize,
) -> Result<Vec<SrcPair>, CasemixError> {
    let path = table.path.as_str();
    fail_if!(path, section_idx >= table.sections.len());
    let section = table.sections[section_idx];
    fail_if!(path, section.value_len != 8);

    let mut pairs = Vec::with_capacity(section.values_count);
    for i in 0..section.values_count {
        let raw = slice(data, section.raw_offset + i * 8, 8, path)?;
        let diag_root = BigEndian::read_u16(&raw[0..2]);
        let diag_ext = BigEndian::read_u16(&raw[2..4]);
        let proc_root = BigEndian::read_u16(&raw[4..6]);
        let proc_ext = BigEndian::read_u16(&raw[6..8]);

        pairs.push(SrcPair {
            diagnosis: diagnosis_from_wire(diag_root, diag_ext),
            procedure: procedure_from_wire(
                proc_root,
                ((proc_ext / 1000) % 26) as u8,
                proc_ext % 1000,
            ),
        });
    }
    Ok(pairs)
}
