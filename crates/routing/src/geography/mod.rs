//! Geography resolution.
//!
//! Turns free-text or coded geography tokens into canonical [`Country`]
//! values, expands named groups, converts between country code systems and
//! finds geography mentions in free text.

pub(crate) mod tables;

use std::collections::BTreeSet;
use std::ops::Range;

use log::debug;

use crate::errors::RoutingError;
use crate::models::{
    CodeFormat, Country, DetectedGeography, RequestGeography, ResolvedGeography,
};

pub use tables::normalize_key;
use tables::{GeographyTables, TABLES};

/// Alpha-2 codes that are also common English words. Written bare in text
/// ("IT spending", "NO data") they are not treated as country mentions.
const WORDLIKE_CODES: &[&str] = &[
    "AM", "AS", "AT", "BE", "BY", "DO", "ID", "IN", "IS", "IT", "ME", "MY", "NO", "SO", "TO",
];

/// Resolves geography tokens against the process-wide country and group tables.
#[derive(Clone, Copy)]
pub struct GeographyResolver {
    tables: &'static GeographyTables,
}

impl Default for GeographyResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl GeographyResolver {
    pub fn new() -> Self {
        Self { tables: &*TABLES }
    }

    /// Resolve a token to a single country.
    ///
    /// Accepts alpha-2, alpha-3 and UN numeric codes, names and aliases,
    /// case and whitespace insensitive. Never guesses: anything not in the
    /// tables is `UnknownGeography`, including group names.
    pub fn normalize(&self, token: &str) -> Result<Country, RoutingError> {
        self.tables
            .country_by_code_or_name(token)
            .ok_or_else(|| RoutingError::UnknownGeography(token.trim().to_string()))
    }

    /// Members of a named group, or `None` if `token` is not a group.
    ///
    /// Returns a fresh copy each call.
    pub fn expand_group(&self, token: &str) -> Option<BTreeSet<Country>> {
        let group = self.tables.group_by_key(&normalize_key(token))?;
        Some(self.tables.group_members(group))
    }

    /// Resolve a token as a group if it names one, otherwise as a country.
    pub fn resolve(&self, token: &str) -> Result<ResolvedGeography, RoutingError> {
        if let Some(group) = self.tables.group_by_key(&normalize_key(token)) {
            return Ok(ResolvedGeography::Group {
                name: group.id.clone(),
                members: self.tables.group_members(group),
            });
        }
        self.normalize(token)
            .map(|country| ResolvedGeography::Country { country })
    }

    /// Resolve every token of a request. The first unknown token fails the lot.
    pub fn resolve_all<I, S>(&self, tokens: I) -> Result<RequestGeography, RoutingError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let resolved = tokens
            .into_iter()
            .map(|t| self.resolve(t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if resolved.is_empty() {
            return Err(RoutingError::InvalidRequest(
                "no geography tokens given".to_string(),
            ));
        }
        Ok(RequestGeography::new(resolved))
    }

    /// Convert a country code (any system) or name into `to`.
    ///
    /// ```
    /// use econroute_routing::geography::GeographyResolver;
    /// use econroute_routing::models::CodeFormat;
    ///
    /// let geo = GeographyResolver::new();
    /// assert_eq!(geo.convert("DE", CodeFormat::Alpha3).unwrap(), "DEU");
    /// assert_eq!(geo.convert("USA", CodeFormat::ComtradeReporter).unwrap(), "842");
    /// assert!(geo.convert("XK", CodeFormat::UnNumeric).is_err());
    /// ```
    pub fn convert(&self, code: &str, to: CodeFormat) -> Result<String, RoutingError> {
        let country = self.normalize(code)?;
        self.code_for(&country, to)
    }

    /// The code for an already resolved country in `format`.
    pub fn code_for(&self, country: &Country, format: CodeFormat) -> Result<String, RoutingError> {
        country
            .code(format)
            .map(str::to_string)
            .ok_or_else(|| RoutingError::UnsupportedConversion {
                code: country.alpha2().to_string(),
                format,
            })
    }

    /// Every country in the tables.
    pub fn countries(&self) -> impl Iterator<Item = Country> {
        self.tables.countries()
    }

    /// Ids of all known groups.
    pub fn group_ids(&self) -> Vec<&'static str> {
        self.tables.groups().iter().map(|g| g.id.as_str()).collect()
    }

    /// Find country and group mentions in free text, ordered by position.
    ///
    /// The longest mention wins at each position, and a group wins over a
    /// country with the same extent. Country names listed in parentheses
    /// right after a group that contains them ("G7 (Canada, France, ...)")
    /// are part of the group mention and are not reported separately; any
    /// other explicit mention is kept even if a detected group contains it.
    pub fn detect_in_text(&self, text: &str) -> Vec<DetectedGeography> {
        let words = split_words(text);
        let mut found = Vec::new();
        let mut i = 0;
        while i < words.len() {
            match self.match_at(text, &words, i) {
                Some((consumed, detection)) => {
                    found.push(detection);
                    i += consumed;
                }
                None => i += 1,
            }
        }
        let found = suppress_group_listings(text, found);
        debug!("Detected {} geography mention(s) in '{}'", found.len(), text);
        found
    }

    fn match_at(
        &self,
        text: &str,
        words: &[Range<usize>],
        start: usize,
    ) -> Option<(usize, DetectedGeography)> {
        let max = self.tables.max_key_words().min(words.len() - start);
        for n in (1..=max).rev() {
            let span = words[start].start..words[start + n - 1].end;
            let raw = &text[span.clone()];
            let key = words[start..start + n]
                .iter()
                .map(|w| normalize_key(&text[w.clone()]))
                .collect::<Vec<_>>()
                .join(" ");
            if key.is_empty() || !case_allows(raw, &key) {
                continue;
            }
            let geography = if let Some(group) = self.tables.group_by_key(&key) {
                ResolvedGeography::Group {
                    name: group.id.clone(),
                    members: self.tables.group_members(group),
                }
            } else if let Some(country) = self.tables.country_by_key(&key) {
                ResolvedGeography::Country { country }
            } else if n == 1 {
                match self.bare_code(raw) {
                    Some(country) => ResolvedGeography::Country { country },
                    None => continue,
                }
            } else {
                continue;
            };
            let span = trim_trailing_period(text, span);
            return Some((
                n,
                DetectedGeography {
                    text: text[span.clone()].to_string(),
                    span,
                    geography,
                },
            ));
        }
        None
    }

    /// Upper-case alpha-2/alpha-3 codes written on their own.
    fn bare_code(&self, raw: &str) -> Option<Country> {
        let code = raw.trim_end_matches('.');
        if !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return None;
        }
        match code.len() {
            2 if !WORDLIKE_CODES.contains(&code) => self.tables.country_by_alpha2(code),
            3 => self.tables.country_by_alpha3(code),
            _ => None,
        }
    }
}

/// Short all-letter keys ("us", "uk", "eu") only match when written in
/// capitals, so the pronoun "us" is not the United States.
fn case_allows(raw: &str, key: &str) -> bool {
    let short_letters = key.len() <= 3 && key.bytes().all(|b| b.is_ascii_lowercase());
    !short_letters || !raw.bytes().any(|b| b.is_ascii_lowercase())
}

/// Byte ranges of words. A word is a run of alphanumerics, dots and
/// apostrophes; everything else separates.
fn split_words(text: &str) -> Vec<Range<usize>> {
    let mut words = Vec::new();
    let mut start = None;
    for (idx, ch) in text.char_indices() {
        let in_word = ch.is_alphanumeric() || ch == '.' || ch == '\'';
        match (in_word, start) {
            (true, None) => start = Some(idx),
            (false, Some(s)) => {
                words.push(s..idx);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        words.push(s..text.len());
    }
    words
        .into_iter()
        .filter(|w| text[w.clone()].chars().any(|c| c.is_alphanumeric()))
        .collect()
}

/// "Japan." loses its sentence period; "U.S." keeps its abbreviation dot.
fn trim_trailing_period(text: &str, span: Range<usize>) -> Range<usize> {
    let raw = &text[span.clone()];
    if raw.ends_with('.') && raw.matches('.').count() == 1 {
        span.start..span.end - 1
    } else {
        span
    }
}

fn suppress_group_listings(text: &str, found: Vec<DetectedGeography>) -> Vec<DetectedGeography> {
    let listings: Vec<(Range<usize>, BTreeSet<Country>)> = found
        .iter()
        .filter_map(|d| match &d.geography {
            ResolvedGeography::Group { members, .. } => {
                paren_after(text, d.span.end).map(|range| (range, members.clone()))
            }
            ResolvedGeography::Country { .. } => None,
        })
        .collect();
    if listings.is_empty() {
        return found;
    }
    found
        .into_iter()
        .filter(|d| match &d.geography {
            ResolvedGeography::Country { country } => !listings.iter().any(|(range, members)| {
                range.contains(&d.span.start) && members.contains(country)
            }),
            ResolvedGeography::Group { .. } => true,
        })
        .collect()
}

/// Byte range of a parenthetical that opens right after `pos`.
fn paren_after(text: &str, pos: usize) -> Option<Range<usize>> {
    let rest = &text[pos..];
    let offset = rest.len() - rest.trim_start().len();
    let open = pos + offset;
    if !text[open..].starts_with('(') {
        return None;
    }
    let close = text[open..].find(')').map(|i| open + i)?;
    Some(open..close)
}
