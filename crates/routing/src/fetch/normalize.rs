//! Observation normalisation.
//!
//! Providers label periods in their own way (`2020`, `2020-03`, `2020M03`,
//! `2020-Q1`, `2020Q1`, `2020-03-31`). Every label maps to the first day of
//! its period.

use chrono::NaiveDate;
use log::debug;

use crate::models::{DateRange, Observation, RawObservation};

/// First day of the period a label names, or `None` if unrecognised.
pub fn parse_period(label: &str) -> Option<NaiveDate> {
    let label = label.trim();
    if let Ok(date) = NaiveDate::parse_from_str(label, "%Y-%m-%d") {
        return Some(date);
    }

    let (year, rest) = split_year(label)?;
    let rest = rest.strip_prefix('-').unwrap_or(rest);
    let month = match rest.as_bytes().first() {
        None => 1,
        Some(b'Q' | b'q') => {
            let quarter: u32 = rest[1..].parse().ok()?;
            if !(1..=4).contains(&quarter) {
                return None;
            }
            (quarter - 1) * 3 + 1
        }
        Some(b'M' | b'm') => rest[1..].parse().ok()?,
        Some(_) => rest.parse().ok()?,
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn split_year(label: &str) -> Option<(i32, &str)> {
    if label.len() < 4 || !label.is_char_boundary(4) {
        return None;
    }
    let (year, rest) = label.split_at(4);
    if !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((year.parse().ok()?, rest))
}

/// Parse, drop unusable points, sort ascending, keep the first value
/// reported for each period, and clip to `range`.
pub fn normalize_observations(raw: &[RawObservation], range: Option<&DateRange>) -> Vec<Observation> {
    let mut observations: Vec<Observation> = raw
        .iter()
        .filter_map(|obs| {
            let value = obs.value.filter(|v| v.is_finite())?;
            let Some(date) = parse_period(&obs.date) else {
                debug!("Dropping observation with unrecognised period '{}'", obs.date);
                return None;
            };
            Some(Observation { date, value })
        })
        .filter(|obs| range.map_or(true, |r| r.contains(obs.date)))
        .collect();

    observations.sort_by_key(|obs| obs.date);
    observations.dedup_by_key(|obs| obs.date);
    observations
}
