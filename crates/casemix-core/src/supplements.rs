use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Index, IndexMut};

// ── Sector ───────────────────────────────────────────────────────────────────

/// Tariff sector: public hospitals vs. private clinics. Indexes the
/// two-element price arrays carried by GHS tables.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    #[default]
    Public,
    Private,
}

impl Sector {
    pub const ALL: [Sector; 2] = [Sector::Public, Sector::Private];

    pub fn index(self) -> usize {
        match self {
            Sector::Public => 0,
            Sector::Private => 1,
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sector::Public => f.write_str("public"),
            Sector::Private => f.write_str("private"),
        }
    }
}

// ── Supplements ──────────────────────────────────────────────────────────────

/// Per-day supplement categories, in priority order: when several unit
/// authorizations match the same day, the first listed here wins.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SupplementKind {
    /// Intensive care (réanimation).
    Rea,
    /// Intensive care, downgraded stay (réa counted as surveillance).
    Reasi,
    /// Intensive surveillance (soins intensifs).
    Si,
    /// Continuous surveillance (surveillance continue).
    Src,
    /// Neonatology level 1.
    Nn1,
    /// Neonatology level 2.
    Nn2,
    /// Neonatology level 3 (neonatal intensive care).
    Nn3,
    /// Dialysis in-stay (entraînement péritonéal).
    Rep,
}

impl SupplementKind {
    pub const ALL: [SupplementKind; 8] = [
        SupplementKind::Rea,
        SupplementKind::Reasi,
        SupplementKind::Si,
        SupplementKind::Src,
        SupplementKind::Nn1,
        SupplementKind::Nn2,
        SupplementKind::Nn3,
        SupplementKind::Rep,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            SupplementKind::Rea => "REA",
            SupplementKind::Reasi => "REASI",
            SupplementKind::Si => "SI",
            SupplementKind::Src => "SRC",
            SupplementKind::Nn1 => "NN1",
            SupplementKind::Nn2 => "NN2",
            SupplementKind::Nn3 => "NN3",
            SupplementKind::Rep => "REP",
        }
    }
}

impl fmt::Display for SupplementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One counter slot per supplement category. Instantiated with i16 for day
/// counts, i32/i64 for cents; forms a monoid under `+` so per-cluster values
/// roll up into summaries.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplementCounters<T> {
    pub values: [T; 8],
}

impl<T: Copy + Default> SupplementCounters<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T> Index<SupplementKind> for SupplementCounters<T> {
    type Output = T;

    fn index(&self, kind: SupplementKind) -> &T {
        &self.values[kind.index()]
    }
}

impl<T> IndexMut<SupplementKind> for SupplementCounters<T> {
    fn index_mut(&mut self, kind: SupplementKind) -> &mut T {
        &mut self.values[kind.index()]
    }
}

impl<T: Copy + AddAssign> AddAssign for SupplementCounters<T> {
    fn add_assign(&mut self, other: Self) {
        for (slot, value) in self.values.iter_mut().zip(other.values) {
            *slot += value;
        }
    }
}

impl<T: Copy + AddAssign> Add for SupplementCounters<T> {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl SupplementCounters<i16> {
    /// Widen day counts so they can accumulate into i32 summary counters.
    pub fn widen(&self) -> SupplementCounters<i32> {
        let mut out = SupplementCounters::default();
        for kind in SupplementKind::ALL {
            out[kind] = self[kind] as i32;
        }
        out
    }
}

impl SupplementCounters<i32> {
    pub fn widen(&self) -> SupplementCounters<i64> {
        let mut out = SupplementCounters::default();
        for kind in SupplementKind::ALL {
            out[kind] = self[kind] as i64;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_a_monoid() {
        let mut a = SupplementCounters::<i32>::new();
        a[SupplementKind::Rea] = 2;
        let mut b = SupplementCounters::<i32>::new();
        b[SupplementKind::Rea] = 3;
        b[SupplementKind::Nn2] = 1;

        let sum = a + b;
        assert_eq!(sum[SupplementKind::Rea], 5);
        assert_eq!(sum[SupplementKind::Nn2], 1);
        assert_eq!(sum[SupplementKind::Src], 0);
    }

    #[test]
    fn priority_order_matches_enum_order() {
        assert!(SupplementKind::Rea < SupplementKind::Reasi);
        assert!(SupplementKind::Nn3 < SupplementKind::Rep);
    }
}
