//! Facility authorization timelines.
//!
//! A JSON array of `{authorization, unit, begin_date, end_date}` objects.
//! The authorization code may be a number or a numeric string; the unit may
//! be a number, a numeric string, or the literal "facility". A missing
//! `end_date` leaves the authorization open-ended.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use casemix_core::{date_from_1980, CasemixError, UnitCode, WIRE_DAYS_MAX};

use crate::tab::read_file_data;

/// One (unit, date range) → authorization-code entry.
#[derive(Clone, Debug)]
pub struct Authorization {
    pub unit: UnitCode,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub kind: u8,
}

#[derive(Clone, Debug, Default)]
pub struct AuthorizationSet {
    authorizations: Vec<Authorization>,
    by_unit: HashMap<UnitCode, (usize, usize)>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

#[derive(Deserialize)]
struct RawAuthorization {
    authorization: IntOrString,
    unit: IntOrString,
    begin_date: NaiveDate,
    end_date: Option<NaiveDate>,
}

fn invalid(path: &str, reason: impl Into<String>) -> CasemixError {
    CasemixError::InvalidAuthorizationFile { path: path.to_string(), reason: reason.into() }
}

fn parse_kind(value: &IntOrString, path: &str) -> Result<u8, CasemixError> {
    let n = match value {
        IntOrString::Int(n) => *n,
        IntOrString::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(path, format!("invalid authorization type '{s}'")))?,
    };
    if !(0..100).contains(&n) {
        return Err(invalid(path, format!("invalid authorization type {n}")));
    }
    Ok(n as u8)
}

fn parse_unit(value: &IntOrString, path: &str) -> Result<UnitCode, CasemixError> {
    let n = match value {
        IntOrString::Int(n) => *n,
        IntOrString::Str(s) => {
            if s == "facility" {
                return Ok(UnitCode::FACILITY);
            }
            s.trim()
                .parse::<i64>()
                .map_err(|_| invalid(path, format!("invalid unit code '{s}'")))?
        }
    };
    if !(0..10000).contains(&n) {
        return Err(invalid(path, format!("invalid unit code {n}")));
    }
    Ok(UnitCode(n as i16))
}

impl AuthorizationSet {
    /// Load and index an authorization JSON file.
    pub fn load(path: &Path) -> Result<AuthorizationSet, CasemixError> {
        let data = read_file_data(path)?;
        AuthorizationSet::from_json(&data, &path.display().to_string())
    }

    /// Parse and index authorization JSON content already in memory.
    pub fn from_json(data: &[u8], path_str: &str) -> Result<AuthorizationSet, CasemixError> {
        let raw: Vec<RawAuthorization> = serde_json::from_slice(data)
            .map_err(|err| invalid(path_str, err.to_string()))?;

        let mut authorizations = Vec::with_capacity(raw.len());
        for entry in raw {
            authorizations.push(Authorization {
                unit: parse_unit(&entry.unit, &path_str)?,
                from: entry.begin_date,
                to: entry.end_date.unwrap_or_else(|| date_from_1980(WIRE_DAYS_MAX)),
                kind: parse_kind(&entry.authorization, &path_str)?,
            });
        }
        Ok(AuthorizationSet::from_authorizations(authorizations))
    }

    pub fn from_authorizations(mut authorizations: Vec<Authorization>) -> AuthorizationSet {
        authorizations.sort_by_key(|auth| (auth.unit, auth.from));

        let mut by_unit = HashMap::new();
        let mut start = 0;
        for i in 1..=authorizations.len() {
            if i == authorizations.len() || authorizations[i].unit != authorizations[start].unit {
                by_unit.insert(authorizations[start].unit, (start, i - start));
                start = i;
            }
        }
        AuthorizationSet { authorizations, by_unit }
    }

    pub fn is_empty(&self) -> bool {
        self.authorizations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.authorizations.len()
    }

    /// All entries for a unit, in chronological order.
    pub fn find_unit(&self, unit: UnitCode) -> &[Authorization] {
        match self.by_unit.get(&unit) {
            Some(&(start, len)) => &self.authorizations[start..start + len],
            None => &[],
        }
    }

    /// The entry covering `date` for a unit, if any.
    pub fn find_unit_at(&self, unit: UnitCode, date: NaiveDate) -> Option<&Authorization> {
        self.find_unit(unit)
            .iter()
            .find(|auth| date >= auth.from && date < auth.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn set() -> AuthorizationSet {
        AuthorizationSet::from_authorizations(vec![
            Authorization { unit: UnitCode(101), from: date(2019, 1, 1), to: date(2019, 7, 1), kind: 1 },
            Authorization { unit: UnitCode(101), from: date(2019, 7, 1), to: date(2020, 1, 1), kind: 3 },
            Authorization {
                unit: UnitCode::FACILITY,
                from: date(2019, 1, 1),
                to: date(2020, 1, 1),
                kind: 6,
            },
        ])
    }

    #[test]
    fn find_unit_at_respects_half_open_intervals() {
        let set = set();
        assert_eq!(set.find_unit_at(UnitCode(101), date(2019, 6, 30)).unwrap().kind, 1);
        assert_eq!(set.find_unit_at(UnitCode(101), date(2019, 7, 1)).unwrap().kind, 3);
        assert!(set.find_unit_at(UnitCode(101), date(2020, 1, 1)).is_none());
        assert!(set.find_unit_at(UnitCode(999), date(2019, 6, 1)).is_none());
    }

    #[test]
    fn facility_entries_are_addressable() {
        let set = set();
        assert_eq!(set.find_unit(UnitCode::FACILITY).len(), 1);
    }
}
