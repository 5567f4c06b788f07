//! Versioned table set assembly.
//!
//! Tables are ordered by `(limit_from, version, build_date)` and walked
//! chronologically; every time the set of active tables changes, a new
//! `TableIndex` is committed for the preceding interval. Sub-tables that did
//! not change between adjacent indexes share their parsed arrays (`Arc`) and
//! their hash maps; the `changed_tables` bitmap records which slots were
//! rebuilt.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use casemix_core::{
    CasemixError, DiagnosisCode, GhmCode, GhmRootCode, GhsCode, ProcedureCode, Sector,
    SupplementCounters,
};

use crate::info::{
    AuthorizationInfo, AuthorizationScope, DiagnosisInfo, ExclusionInfo, GhmDecisionNode,
    GhmRootInfo, GhsAccessInfo, GhsPriceInfo, ProcedureInfo, SrcPair, TableInfo, TableKind,
    ValueRangeCell,
};
use crate::prices::parse_prices_json;
use crate::tab::{self, read_file_data};

// ── TableIndex ───────────────────────────────────────────────────────────────

/// All tables active during one `[limit_from, limit_to)` interval, plus
/// lookup maps. Cloning is cheap: every array is `Arc`-shared.
#[derive(Clone, Debug, Default)]
pub struct TableIndex {
    pub limit_from: NaiveDate,
    pub limit_to: NaiveDate,
    /// Bit per `TableKind` slot that was rebuilt relative to the previous
    /// index.
    pub changed_tables: u32,

    pub ghm_nodes: Arc<Vec<GhmDecisionNode>>,
    pub diagnoses: Arc<Vec<DiagnosisInfo>>,
    pub exclusions: Arc<Vec<ExclusionInfo>>,
    pub procedures: Arc<Vec<ProcedureInfo>>,
    pub ghm_roots: Arc<Vec<GhmRootInfo>>,
    pub gnn_cells: Arc<Vec<ValueRangeCell>>,
    pub cma_cells: [Arc<Vec<ValueRangeCell>>; 3],
    pub ghs: Arc<Vec<GhsAccessInfo>>,
    pub authorizations: Arc<Vec<AuthorizationInfo>>,
    pub src_pairs: [Arc<Vec<SrcPair>>; 2],
    pub ghs_prices: [Arc<Vec<GhsPriceInfo>>; 2],
    pub supplement_cents: [SupplementCounters<i32>; 2],
    /// Sector coefficients, fixed-point × 10_000 (10_000 = neutral).
    pub ghs_coefficients: [i64; 2],

    diagnoses_map: Arc<HashMap<DiagnosisCode, usize>>,
    procedures_map: Arc<HashMap<ProcedureCode, (usize, usize)>>,
    ghm_roots_map: Arc<HashMap<GhmRootCode, usize>>,
    ghm_to_ghs_map: Arc<HashMap<GhmCode, (usize, usize)>>,
    ghm_root_to_ghs_map: Arc<HashMap<GhmRootCode, (usize, usize)>>,
    authorizations_map: Arc<HashMap<(AuthorizationScope, u8), usize>>,
    ghs_price_maps: [Arc<HashMap<GhsCode, usize>>; 2],
}

impl TableIndex {
    pub fn diagnosis(&self, code: DiagnosisCode) -> Option<&DiagnosisInfo> {
        self.diagnoses_map.get(&code).map(|&i| &self.diagnoses[i])
    }

    /// All phase/date variants of a procedure, contiguous in table order.
    pub fn procedures(&self, code: ProcedureCode) -> &[ProcedureInfo] {
        match self.procedures_map.get(&code) {
            Some(&(start, len)) => &self.procedures[start..start + len],
            None => &[],
        }
    }

    /// The variant of a procedure valid for `(phase, date)`.
    pub fn procedure(
        &self,
        code: ProcedureCode,
        phase: u8,
        date: NaiveDate,
    ) -> Option<&ProcedureInfo> {
        self.procedures(code)
            .iter()
            .find(|proc| proc.phase == phase && date >= proc.valid_from && date < proc.valid_until)
    }

    pub fn ghm_root(&self, code: GhmRootCode) -> Option<&GhmRootInfo> {
        self.ghm_roots_map.get(&code).map(|&i| &self.ghm_roots[i])
    }

    /// GHS access chunks whose GHM pattern shares this root.
    pub fn compatible_ghs(&self, root: GhmRootCode) -> &[GhsAccessInfo] {
        match self.ghm_root_to_ghs_map.get(&root) {
            Some(&(start, len)) => &self.ghs[start..start + len],
            None => &[],
        }
    }

    /// GHS access chunks matching this exact (graded) GHM.
    pub fn compatible_ghs_exact(&self, ghm: GhmCode) -> &[GhsAccessInfo] {
        match self.ghm_to_ghs_map.get(&ghm) {
            Some(&(start, len)) => &self.ghs[start..start + len],
            None => &[],
        }
    }

    pub fn authorization(&self, scope: AuthorizationScope, code: u8) -> Option<&AuthorizationInfo> {
        self.authorizations_map
            .get(&(scope, code))
            .map(|&i| &self.authorizations[i])
    }

    pub fn ghs_price(&self, ghs: GhsCode, sector: Sector) -> Option<&GhsPriceInfo> {
        self.ghs_price_maps[sector.index()]
            .get(&ghs)
            .map(|&i| &self.ghs_prices[sector.index()][i])
    }

    pub fn supplement_tariffs(&self, sector: Sector) -> &SupplementCounters<i32> {
        &self.supplement_cents[sector.index()]
    }

    /// The CMA exclusion row referenced by a diagnosis, if the exclusion
    /// table carries it.
    pub fn exclusion(&self, diag: &DiagnosisInfo) -> Option<&ExclusionInfo> {
        self.exclusions.get(diag.exclusion_set_idx as usize)
    }
}

// ── TableSet ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub struct TableSet {
    pub tables: Vec<TableInfo>,
    pub indexes: Vec<TableIndex>,
}

impl TableSet {
    /// The index covering `date`, or the most recent one when `date` is
    /// `None`.
    pub fn find_index(&self, date: Option<NaiveDate>) -> Option<&TableIndex> {
        match date {
            Some(d) => self
                .indexes
                .iter()
                .rev()
                .find(|index| d >= index.limit_from && d < index.limit_to),
            None => self.indexes.last(),
        }
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

/// Parsed payload of one table revision.
#[derive(Clone)]
enum TableContent {
    Tree(Arc<Vec<GhmDecisionNode>>),
    Diagnoses {
        diagnoses: Arc<Vec<DiagnosisInfo>>,
        exclusions: Arc<Vec<ExclusionInfo>>,
    },
    Procedures(Arc<Vec<ProcedureInfo>>),
    GhmRoots(Arc<Vec<GhmRootInfo>>),
    Severity {
        gnn: Arc<Vec<ValueRangeCell>>,
        cma: [Arc<Vec<ValueRangeCell>>; 3],
    },
    GhsAccess(Arc<Vec<GhsAccessInfo>>),
    Authorizations(Arc<Vec<AuthorizationInfo>>),
    SrcPairs([Arc<Vec<SrcPair>>; 2]),
    Prices {
        ghs: [Arc<Vec<GhsPriceInfo>>; 2],
        supplements: [SupplementCounters<i32>; 2],
        coefficients: [i64; 2],
    },
}

#[derive(Default)]
pub struct TableSetBuilder {
    tables: Vec<TableInfo>,
    contents: Vec<TableContent>,
}

impl TableSetBuilder {
    pub fn new() -> TableSetBuilder {
        TableSetBuilder::default()
    }

    /// Load one binary `.tab[.gz]` file; all embedded tables are parsed
    /// eagerly so malformed content fails the load.
    pub fn load_tab(&mut self, path: &Path) -> Result<(), CasemixError> {
        let data = read_file_data(path)?;
        self.load_tab_data(&data, &path.display().to_string())
    }

    /// Load binary table content already in memory.
    pub fn load_tab_data(&mut self, data: &[u8], path_str: &str) -> Result<(), CasemixError> {
        for info in tab::parse_table_headers(data, path_str)? {
            let content = match info.kind {
                TableKind::GhmDecisionTree => {
                    TableContent::Tree(Arc::new(tab::parse_ghm_decision_tree(&data, &info)?))
                }
                TableKind::Diagnoses => TableContent::Diagnoses {
                    diagnoses: Arc::new(tab::parse_diagnosis_table(&data, &info)?),
                    exclusions: Arc::new(tab::parse_exclusion_table(&data, &info)?),
                },
                TableKind::Procedures => {
                    TableContent::Procedures(Arc::new(tab::parse_procedure_table(&data, &info)?))
                }
                TableKind::GhmRoots => {
                    TableContent::GhmRoots(Arc::new(tab::parse_ghm_root_table(&data, &info)?))
                }
                TableKind::Severity => TableContent::Severity {
                    gnn: Arc::new(tab::parse_severity_table(&data, &info, 0)?),
                    cma: [
                        Arc::new(tab::parse_severity_table(&data, &info, 1)?),
                        Arc::new(tab::parse_severity_table(&data, &info, 2)?),
                        Arc::new(tab::parse_severity_table(&data, &info, 3)?),
                    ],
                },
                TableKind::GhsAccess => {
                    TableContent::GhsAccess(Arc::new(tab::parse_ghs_access_table(&data, &info)?))
                }
                TableKind::Authorizations => TableContent::Authorizations(Arc::new(
                    tab::parse_authorization_table(&data, &info)?,
                )),
                TableKind::SrcPairs => TableContent::SrcPairs([
                    Arc::new(tab::parse_src_pair_table(&data, &info, 0)?),
                    Arc::new(tab::parse_src_pair_table(&data, &info, 1)?),
                ]),
                TableKind::Prices | TableKind::Unknown => {
                    warn!(path = %path_str, kind = %info.raw_kind, "skipping unknown table");
                    continue;
                }
            };
            self.tables.push(info);
            self.contents.push(content);
        }
        Ok(())
    }

    /// Load one JSON tariff file (one synthetic table revision per entry).
    pub fn load_prices(&mut self, path: &Path) -> Result<(), CasemixError> {
        let data = read_file_data(path)?;
        self.load_prices_data(&data, &path.display().to_string())
    }

    /// Load tariff JSON content already in memory.
    pub fn load_prices_data(&mut self, data: &[u8], path_str: &str) -> Result<(), CasemixError> {
        for table in parse_prices_json(data, path_str)? {
            self.tables.push(TableInfo {
                path: path_str.to_string(),
                build_date: table.build_date,
                version: (0, 0),
                limit_from: table.date,
                limit_to: casemix_core::date_from_1980(casemix_core::WIRE_DAYS_MAX),
                raw_kind: "PRICESJS".to_string(),
                kind: TableKind::Prices,
                sections: Vec::new(),
            });
            self.contents.push(TableContent::Prices {
                ghs: [Arc::new(table.ghs_prices[0].clone()), Arc::new(table.ghs_prices[1].clone())],
                supplements: table.supplement_cents,
                coefficients: table.coefficients,
            });
        }
        Ok(())
    }

    /// Dispatch on file extension: `.tab[.gz]` binary, `.json[.gz]` /
    /// `.dpri[.gz]` tariff.
    pub fn load_file(&mut self, path: &Path) -> Result<(), CasemixError> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let stem = name.strip_suffix(".gz").unwrap_or(name);
        match stem.rsplit('.').next() {
            Some("tab") => self.load_tab(path),
            Some("json") | Some("dpri") => self.load_prices(path),
            _ => Err(CasemixError::UnknownFormat {
                path: path.display().to_string(),
                extension: stem.rsplit('.').next().unwrap_or("").to_string(),
            }),
        }
    }

    pub fn load_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<(), CasemixError> {
        for path in paths {
            self.load_file(path.as_ref())?;
        }
        Ok(())
    }

    /// Assemble the chronological index list.
    pub fn finish(self) -> Result<TableSet, CasemixError> {
        let mut order: Vec<usize> = (0..self.tables.len()).collect();
        order.sort_by(|&a, &b| {
            let ta = &self.tables[a];
            let tb = &self.tables[b];
            (ta.limit_from, ta.version, ta.build_date).cmp(&(
                tb.limit_from,
                tb.version,
                tb.build_date,
            ))
        });

        let mut indexes: Vec<TableIndex> = Vec::new();
        let mut active: [Option<usize>; TableKind::COUNT] = [None; TableKind::COUNT];
        let mut last_active: [Option<usize>; TableKind::COUNT] = [None; TableKind::COUNT];
        let mut start_date: Option<NaiveDate> = None;
        let mut end_date: Option<NaiveDate> = None;

        for &load in &order {
            let (limit_from, limit_to, slot) = {
                let info = &self.tables[load];
                (info.limit_from, info.limit_to, info.kind.slot())
            };

            while let Some(end) = end_date {
                if limit_from < end {
                    break;
                }
                commit_index(
                    &self.tables,
                    &self.contents,
                    start_date.unwrap_or(end),
                    end,
                    &active,
                    &mut last_active,
                    &mut indexes,
                );

                let mut next_end: Option<NaiveDate> = None;
                for entry in active.iter_mut() {
                    if let Some(idx) = *entry {
                        let to = self.tables[idx].limit_to;
                        if to == end {
                            *entry = None;
                        } else if next_end.is_none_or(|ne| to < ne) {
                            next_end = Some(to);
                        }
                    }
                }
                start_date = Some(limit_from);
                end_date = next_end;
            }

            match start_date {
                Some(start) if limit_from > start => {
                    commit_index(
                        &self.tables,
                        &self.contents,
                        start,
                        limit_from,
                        &active,
                        &mut last_active,
                        &mut indexes,
                    );
                    start_date = Some(limit_from);
                }
                None => start_date = Some(limit_from),
                _ => {}
            }
            if end_date.is_none_or(|end| limit_to < end) {
                end_date = Some(limit_to);
            }

            active[slot] = Some(load);
        }
        if let (Some(start), Some(end)) = (start_date, end_date) {
            commit_index(
                &self.tables,
                &self.contents,
                start,
                end,
                &active,
                &mut last_active,
                &mut indexes,
            );
        }

        Ok(TableSet { tables: self.tables, indexes })
    }

    #[cfg(test)]
    fn push_parsed(&mut self, info: TableInfo, content: TableContent) {
        self.tables.push(info);
        self.contents.push(content);
    }
}

/// Commit one `[start, end)` interval if every mandatory table is active.
fn commit_index(
    tables: &[TableInfo],
    contents: &[TableContent],
    start: NaiveDate,
    end: NaiveDate,
    active: &[Option<usize>; TableKind::COUNT],
    last_active: &mut [Option<usize>; TableKind::COUNT],
    indexes: &mut Vec<TableIndex>,
) {
    if active.iter().all(|slot| slot.is_none()) {
        return;
    }

    // A usable index needs the core classification tables.
    let missing: Vec<&str> = [
        TableKind::GhmDecisionTree,
        TableKind::Diagnoses,
        TableKind::Procedures,
        TableKind::GhmRoots,
        TableKind::GhsAccess,
    ]
    .iter()
    .filter(|kind| active[kind.slot()].is_none())
    .map(|kind| kind.name())
    .collect();
    if !missing.is_empty() {
        debug!(%start, %end, missing = missing.join(", "), "skipping incomplete index");
        return;
    }

    let mut index = TableIndex {
        limit_from: start,
        limit_to: end,
        ghs_coefficients: [casemix_core::COEFFICIENT_SCALE; 2],
        ..Default::default()
    };

    for kind in TableKind::ALL {
        let slot = kind.slot();
        if active[slot] != last_active[slot] {
            index.changed_tables |= 1 << slot;
        }
        let Some(table_idx) = active[slot] else { continue };

        match &contents[table_idx] {
            TableContent::Tree(nodes) => index.ghm_nodes = Arc::clone(nodes),
            TableContent::Diagnoses { diagnoses, exclusions } => {
                index.diagnoses = Arc::clone(diagnoses);
                index.exclusions = Arc::clone(exclusions);
            }
            TableContent::Procedures(procs) => index.procedures = Arc::clone(procs),
            TableContent::GhmRoots(roots) => index.ghm_roots = Arc::clone(roots),
            TableContent::Severity { gnn, cma } => {
                index.gnn_cells = Arc::clone(gnn);
                index.cma_cells = [Arc::clone(&cma[0]), Arc::clone(&cma[1]), Arc::clone(&cma[2])];
            }
            TableContent::GhsAccess(chunks) => index.ghs = Arc::clone(chunks),
            TableContent::Authorizations(auths) => index.authorizations = Arc::clone(auths),
            TableContent::SrcPairs(pairs) => {
                index.src_pairs = [Arc::clone(&pairs[0]), Arc::clone(&pairs[1])]
            }
            TableContent::Prices { ghs, supplements, coefficients } => {
                index.ghs_prices = [Arc::clone(&ghs[0]), Arc::clone(&ghs[1])];
                index.supplement_cents = *supplements;
                index.ghs_coefficients = *coefficients;
            }
        }
    }

    // Rebuild hash maps only for slots that changed; otherwise share the
    // previous index's maps.
    let previous = indexes.last();
    let changed_bits = index.changed_tables;
    let changed =
        |kind: TableKind| -> bool { previous.is_none() || changed_bits & (1 << kind.slot()) != 0 };

    if changed(TableKind::Diagnoses) {
        index.diagnoses_map = Arc::new(build_first_map(&index.diagnoses, |d| d.code));
    } else {
        index.diagnoses_map = Arc::clone(&previous.unwrap().diagnoses_map);
    }
    if changed(TableKind::Procedures) {
        index.procedures_map = Arc::new(build_range_map(&index.procedures, |p| p.code));
    } else {
        index.procedures_map = Arc::clone(&previous.unwrap().procedures_map);
    }
    if changed(TableKind::GhmRoots) {
        index.ghm_roots_map = Arc::new(build_first_map(&index.ghm_roots, |r| r.code));
    } else {
        index.ghm_roots_map = Arc::clone(&previous.unwrap().ghm_roots_map);
    }
    if changed(TableKind::GhsAccess) {
        index.ghm_to_ghs_map = Arc::new(build_range_map(&index.ghs, |g| g.ghm));
        index.ghm_root_to_ghs_map = Arc::new(build_range_map(&index.ghs, |g| g.ghm.root()));
    } else {
        index.ghm_to_ghs_map = Arc::clone(&previous.unwrap().ghm_to_ghs_map);
        index.ghm_root_to_ghs_map = Arc::clone(&previous.unwrap().ghm_root_to_ghs_map);
    }
    if changed(TableKind::Authorizations) {
        index.authorizations_map =
            Arc::new(build_first_map(&index.authorizations, |a| (a.scope, a.code)));
    } else {
        index.authorizations_map = Arc::clone(&previous.unwrap().authorizations_map);
    }
    if changed(TableKind::Prices) {
        index.ghs_price_maps = [
            Arc::new(build_first_map(&index.ghs_prices[0], |p| p.ghs)),
            Arc::new(build_first_map(&index.ghs_prices[1], |p| p.ghs)),
        ];
    } else {
        index.ghs_price_maps = [
            Arc::clone(&previous.unwrap().ghs_price_maps[0]),
            Arc::clone(&previous.unwrap().ghs_price_maps[1]),
        ];
    }

    *last_active = *active;
    indexes.push(index);
}

fn build_first_map<T, K: std::hash::Hash + Eq>(
    items: &[T],
    key: impl Fn(&T) -> K,
) -> HashMap<K, usize> {
    let mut map = HashMap::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        map.entry(key(item)).or_insert(i);
    }
    map
}

/// Map each key to its contiguous `(start, len)` run. Items with equal keys
/// are expected adjacent (table order guarantees it).
fn build_range_map<T, K: std::hash::Hash + Eq + Copy>(
    items: &[T],
    key: impl Fn(&T) -> K,
) -> HashMap<K, (usize, usize)> {
    let mut map: HashMap<K, (usize, usize)> = HashMap::new();
    let mut start = 0;
    for i in 1..=items.len() {
        if i == items.len() || key(&items[i]) != key(&items[start]) {
            map.entry(key(&items[start])).or_insert((start, i - start));
            start = i;
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn info(kind: TableKind, from: NaiveDate, to: NaiveDate) -> TableInfo {
        TableInfo {
            path: "synthetic.tab".to_string(),
            build_date: date(2019, 1, 1),
            version: (11, 10),
            limit_from: from,
            limit_to: to,
            raw_kind: String::new(),
            kind,
            sections: Vec::new(),
        }
    }

    fn content(kind: TableKind) -> TableContent {
        match kind {
            TableKind::GhmDecisionTree => TableContent::Tree(Arc::new(vec![GhmDecisionNode::Leaf {
                ghm: GhmCode::new(4, b'M', 5, 0),
                error: 0,
            }])),
            TableKind::Diagnoses => TableContent::Diagnoses {
                diagnoses: Arc::new(vec![DiagnosisInfo::default()]),
                exclusions: Arc::new(vec![ExclusionInfo::default()]),
            },
            TableKind::Procedures => {
                let proc = ProcedureInfo {
                    code: ProcedureCode::default(),
                    phase: 0,
                    valid_from: date(2000, 1, 1),
                    valid_until: date(2100, 1, 1),
                    bytes: [0; 55],
                    activities: 0,
                };
                TableContent::Procedures(Arc::new(vec![proc]))
            }
            TableKind::GhmRoots => TableContent::GhmRoots(Arc::new(vec![GhmRootInfo {
                code: GhmRootCode::new(4, b'M', 5),
                ..Default::default()
            }])),
            TableKind::GhsAccess => TableContent::GhsAccess(Arc::new(vec![GhsAccessInfo {
                ghm: GhmCode::new(4, b'M', 5, b'1'),
                ghs: [GhsCode(4005), GhsCode(4005)],
                ..Default::default()
            }])),
            _ => unreachable!(),
        }
    }

    const CORE: [TableKind; 5] = [
        TableKind::GhmDecisionTree,
        TableKind::Diagnoses,
        TableKind::Procedures,
        TableKind::GhmRoots,
        TableKind::GhsAccess,
    ];

    fn builder_with_core(from: NaiveDate, to: NaiveDate) -> TableSetBuilder {
        let mut builder = TableSetBuilder::new();
        for kind in CORE {
            builder.push_parsed(info(kind, from, to), content(kind));
        }
        builder
    }

    #[test]
    fn single_revision_single_index() {
        let set = builder_with_core(date(2019, 3, 1), date(2020, 3, 1)).finish().unwrap();
        assert_eq!(set.indexes.len(), 1);
        let index = &set.indexes[0];
        assert_eq!(index.limit_from, date(2019, 3, 1));
        assert_eq!(index.limit_to, date(2020, 3, 1));
        assert!(set.find_index(Some(date(2019, 6, 1))).is_some());
        assert!(set.find_index(Some(date(2020, 3, 1))).is_none());
    }

    #[test]
    fn revision_split_shares_unchanged_tables() {
        let mut builder = builder_with_core(date(2019, 3, 1), date(2021, 3, 1));
        // A diagnoses revision halfway through the interval.
        builder.push_parsed(
            info(TableKind::Diagnoses, date(2020, 3, 1), date(2021, 3, 1)),
            content(TableKind::Diagnoses),
        );
        let set = builder.finish().unwrap();

        assert_eq!(set.indexes.len(), 2);
        let (a, b) = (&set.indexes[0], &set.indexes[1]);
        assert_eq!(a.limit_to, b.limit_from);
        // Tree unchanged → shared arrays and maps.
        assert!(Arc::ptr_eq(&a.ghm_nodes, &b.ghm_nodes));
        assert!(Arc::ptr_eq(&a.procedures_map, &b.procedures_map));
        // Diagnoses changed → rebuilt.
        assert!(!Arc::ptr_eq(&a.diagnoses, &b.diagnoses));
        assert_ne!(b.changed_tables & (1 << TableKind::Diagnoses.slot()), 0);
        assert_eq!(b.changed_tables & (1 << TableKind::GhmDecisionTree.slot()), 0);
    }

    #[test]
    fn date_index_is_total_over_covered_range() {
        let mut builder = builder_with_core(date(2019, 3, 1), date(2021, 3, 1));
        builder.push_parsed(
            info(TableKind::GhmRoots, date(2020, 3, 1), date(2021, 3, 1)),
            content(TableKind::GhmRoots),
        );
        let set = builder.finish().unwrap();

        let mut day = date(2019, 3, 1);
        while day < date(2021, 3, 1) {
            let index = set.find_index(Some(day)).unwrap();
            assert!(day >= index.limit_from && day < index.limit_to);
            day = day + chrono::Days::new(17);
        }
        for pair in set.indexes.windows(2) {
            assert_eq!(pair[0].limit_to, pair[1].limit_from);
        }
    }

    #[test]
    fn duplicate_load_produces_same_index_set() {
        let once = builder_with_core(date(2019, 3, 1), date(2020, 3, 1)).finish().unwrap();

        let mut builder = builder_with_core(date(2019, 3, 1), date(2020, 3, 1));
        for kind in CORE {
            builder.push_parsed(info(kind, date(2019, 3, 1), date(2020, 3, 1)), content(kind));
        }
        let twice = builder.finish().unwrap();

        assert_eq!(once.indexes.len(), twice.indexes.len());
        for (a, b) in once.indexes.iter().zip(&twice.indexes) {
            assert_eq!(a.limit_from, b.limit_from);
            assert_eq!(a.limit_to, b.limit_to);
        }
    }

    #[test]
    fn incomplete_interval_is_dropped() {
        let mut builder = TableSetBuilder::new();
        builder.push_parsed(
            info(TableKind::GhmDecisionTree, date(2019, 3, 1), date(2020, 3, 1)),
            content(TableKind::GhmDecisionTree),
        );
        let set = builder.finish().unwrap();
        assert!(set.indexes.is_empty());
        assert!(set.find_index(None).is_none());
    }
}
