//! JSON-driven country and group tables.
//!
//! Loads `countries.json` and `groups.json` at compile time via `include_str!`
//! and builds lookup indexes once via `lazy_static`. The tables are never
//! mutated after load.

use std::collections::{BTreeSet, HashMap};

use lazy_static::lazy_static;
use serde::Deserialize;

use crate::errors::RoutingError;
use crate::models::{Country, CountryRecord};

// ── JSON schema ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GroupRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub members: Vec<String>,
}

// ── Tables with pre-built indexes ────────────────────────────────────────────

pub(crate) struct GeographyTables {
    countries: Vec<CountryRecord>,
    groups: Vec<GroupRecord>,
    /// Upper-case alpha-2 → row
    by_alpha2: HashMap<String, usize>,
    /// Upper-case alpha-3 → row
    by_alpha3: HashMap<String, usize>,
    /// Zero-padded UN numeric → row
    by_numeric: HashMap<String, usize>,
    /// Comtrade-only reporter codes → row
    by_comtrade: HashMap<String, usize>,
    /// Normalized name or alias → row
    by_name: HashMap<String, usize>,
    /// Normalized group id, name or alias → group index
    group_by_key: HashMap<String, usize>,
    /// Longest key, in words, across names and group keys
    max_key_words: usize,
}

lazy_static! {
    pub(crate) static ref TABLES: GeographyTables = GeographyTables::load(
        include_str!("countries.json"),
        include_str!("groups.json"),
    )
    .expect("embedded geography tables must be valid");
}

/// Canonical lookup key for geography names.
///
/// Lower-cases, drops dots and apostrophes, treats `-`, `_` and `,` as spaces,
/// collapses whitespace and strips a leading "the".
pub fn normalize_key(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .filter(|c| !matches!(c, '.' | '\''))
        .map(|c| match c {
            '-' | '_' | ',' => ' ',
            other => other,
        })
        .collect::<String>()
        .to_lowercase();
    let collapsed = mapped.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.strip_prefix("the ") {
        Some(rest) => rest.to_string(),
        None => collapsed,
    }
}

fn pad_numeric(code: &str) -> Option<String> {
    if code.is_empty() || code.len() > 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{:0>3}", code))
}

impl GeographyTables {
    pub(crate) fn load(countries_json: &str, groups_json: &str) -> Result<Self, RoutingError> {
        let countries: Vec<CountryRecord> = serde_json::from_str(countries_json)?;
        let groups: Vec<GroupRecord> = serde_json::from_str(groups_json)?;

        let mut tables = Self {
            countries,
            groups,
            by_alpha2: HashMap::new(),
            by_alpha3: HashMap::new(),
            by_numeric: HashMap::new(),
            by_comtrade: HashMap::new(),
            by_name: HashMap::new(),
            group_by_key: HashMap::new(),
            max_key_words: 1,
        };

        for (idx, record) in tables.countries.iter().enumerate() {
            insert_unique(&mut tables.by_alpha2, record.alpha2.to_uppercase(), idx, "alpha-2")?;
            insert_unique(&mut tables.by_alpha3, record.alpha3.to_uppercase(), idx, "alpha-3")?;
            if let Some(numeric) = &record.numeric {
                let padded = pad_numeric(numeric).ok_or_else(|| {
                    RoutingError::Catalog(format!(
                        "{}: numeric code '{}' is not 1-3 digits",
                        record.alpha2, numeric
                    ))
                })?;
                insert_unique(&mut tables.by_numeric, padded, idx, "numeric")?;
            }
            if let Some(comtrade) = &record.comtrade {
                insert_unique(&mut tables.by_comtrade, comtrade.clone(), idx, "comtrade")?;
            }
            for name in std::iter::once(&record.name).chain(record.aliases.iter()) {
                let key = normalize_key(name);
                if key.is_empty() {
                    continue;
                }
                match tables.by_name.get(&key) {
                    Some(&existing) if existing != idx => {
                        return Err(RoutingError::Catalog(format!(
                            "alias '{}' maps to both {} and {}",
                            name, tables.countries[existing].alpha2, record.alpha2
                        )));
                    }
                    _ => {
                        tables.max_key_words = tables.max_key_words.max(word_count(&key));
                        tables.by_name.insert(key, idx);
                    }
                }
            }
        }
        // Comtrade-only codes must not shadow real numeric codes.
        tables
            .by_comtrade
            .retain(|code, _| !tables.by_numeric.contains_key(code));

        for (gidx, group) in tables.groups.iter().enumerate() {
            if group.members.is_empty() {
                return Err(RoutingError::Catalog(format!("group {} is empty", group.id)));
            }
            for member in &group.members {
                if !tables.by_alpha2.contains_key(&member.to_uppercase()) {
                    return Err(RoutingError::Catalog(format!(
                        "group {} lists unknown member {}",
                        group.id, member
                    )));
                }
            }
            let keys = [&group.id, &group.name]
                .into_iter()
                .chain(group.aliases.iter())
                .map(|s| normalize_key(s));
            for key in keys {
                if tables.by_name.contains_key(&key) {
                    return Err(RoutingError::Catalog(format!(
                        "group key '{}' collides with a country name",
                        key
                    )));
                }
                tables.max_key_words = tables.max_key_words.max(word_count(&key));
                tables.group_by_key.insert(key, gidx);
            }
        }

        Ok(tables)
    }

    fn country_at(&'static self, idx: usize) -> Country {
        Country::from_record(&self.countries[idx])
    }

    pub(crate) fn countries(&'static self) -> impl Iterator<Item = Country> {
        self.countries.iter().map(Country::from_record)
    }

    pub(crate) fn country_by_alpha2(&'static self, code: &str) -> Option<Country> {
        self.by_alpha2
            .get(&code.trim().to_uppercase())
            .map(|&idx| self.country_at(idx))
    }

    pub(crate) fn country_by_alpha3(&'static self, code: &str) -> Option<Country> {
        self.by_alpha3
            .get(&code.trim().to_uppercase())
            .map(|&idx| self.country_at(idx))
    }

    /// UN numeric first, then Comtrade-only reporter codes.
    pub(crate) fn country_by_numeric(&'static self, code: &str) -> Option<Country> {
        let padded = pad_numeric(code.trim())?;
        self.by_numeric
            .get(&padded)
            .or_else(|| self.by_comtrade.get(&padded))
            .map(|&idx| self.country_at(idx))
    }

    /// Lookup by an already normalized name or alias.
    pub(crate) fn country_by_key(&'static self, key: &str) -> Option<Country> {
        self.by_name.get(key).map(|&idx| self.country_at(idx))
    }

    /// Any code system, then names.
    pub(crate) fn country_by_code_or_name(&'static self, token: &str) -> Option<Country> {
        let trimmed = token.trim();
        match trimmed.len() {
            2 => self.country_by_alpha2(trimmed),
            3 if trimmed.bytes().all(|b| b.is_ascii_digit()) => self.country_by_numeric(trimmed),
            3 => self.country_by_alpha3(trimmed),
            _ => None,
        }
        .or_else(|| self.country_by_key(&normalize_key(trimmed)))
    }

    pub(crate) fn group_by_key(&'static self, key: &str) -> Option<&'static GroupRecord> {
        self.group_by_key.get(key).map(|&idx| &self.groups[idx])
    }

    pub(crate) fn groups(&'static self) -> &'static [GroupRecord] {
        &self.groups
    }

    pub(crate) fn group_members(&'static self, group: &GroupRecord) -> BTreeSet<Country> {
        group
            .members
            .iter()
            .filter_map(|code| self.country_by_alpha2(code))
            .collect()
    }

    pub(crate) fn max_key_words(&self) -> usize {
        self.max_key_words
    }
}

fn insert_unique(
    index: &mut HashMap<String, usize>,
    key: String,
    idx: usize,
    label: &str,
) -> Result<(), RoutingError> {
    if index.insert(key.clone(), idx).is_some() {
        return Err(RoutingError::Catalog(format!(
            "duplicate {} code {}",
            label, key
        )));
    }
    Ok(())
}

fn word_count(key: &str) -> usize {
    key.split(' ').count()
}
