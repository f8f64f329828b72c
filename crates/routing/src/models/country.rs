use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize, Serializer};

use crate::geography::tables::TABLES;

/// Country code systems used by providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeFormat {
    /// ISO 3166-1 alpha-2 ("US")
    Alpha2,
    /// ISO 3166-1 alpha-3 ("USA")
    Alpha3,
    /// UN M49 / ISO numeric, zero padded ("840")
    UnNumeric,
    /// UN Comtrade reporter codes. Mostly UN numeric, with Comtrade's own
    /// codes for a handful of reporters (e.g. "842" for the United States).
    ComtradeReporter,
}

impl fmt::Display for CodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Alpha2 => "alpha-2",
            Self::Alpha3 => "alpha-3",
            Self::UnNumeric => "UN numeric",
            Self::ComtradeReporter => "Comtrade reporter",
        };
        f.write_str(label)
    }
}

/// One row of the embedded country table.
#[derive(Debug, Clone, Deserialize)]
pub struct CountryRecord {
    pub alpha2: String,
    pub alpha3: String,
    #[serde(default)]
    pub numeric: Option<String>,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Comtrade reporter code when it differs from `numeric`.
    #[serde(default)]
    pub comtrade: Option<String>,
}

/// A canonical country.
///
/// Only obtainable from the geography tables, so every `Country` has a
/// known alpha-2 code. Equality, ordering and hashing use the alpha-2 code.
#[derive(Clone, Copy)]
pub struct Country(&'static CountryRecord);

impl Country {
    pub(crate) fn from_record(record: &'static CountryRecord) -> Self {
        Self(record)
    }

    /// Look up a country by exact alpha-2 code (case-insensitive).
    pub fn from_alpha2(code: &str) -> Option<Self> {
        TABLES.country_by_alpha2(code)
    }

    pub fn alpha2(&self) -> &'static str {
        &self.0.alpha2
    }

    pub fn alpha3(&self) -> &'static str {
        &self.0.alpha3
    }

    pub fn numeric(&self) -> Option<&'static str> {
        self.0.numeric.as_deref()
    }

    /// Comtrade reporter code, falling back to the UN numeric code.
    pub fn comtrade_reporter(&self) -> Option<&'static str> {
        self.0.comtrade.as_deref().or_else(|| self.numeric())
    }

    pub fn name(&self) -> &'static str {
        &self.0.name
    }

    /// The code for this country in `format`, if it has one.
    pub fn code(&self, format: CodeFormat) -> Option<&'static str> {
        match format {
            CodeFormat::Alpha2 => Some(self.alpha2()),
            CodeFormat::Alpha3 => Some(self.alpha3()),
            CodeFormat::UnNumeric => self.numeric(),
            CodeFormat::ComtradeReporter => self.comtrade_reporter(),
        }
    }
}

impl PartialEq for Country {
    fn eq(&self, other: &Self) -> bool {
        self.0.alpha2 == other.0.alpha2
    }
}

impl Eq for Country {}

impl Hash for Country {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.alpha2.hash(state);
    }
}

impl PartialOrd for Country {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Country {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.alpha2.cmp(&other.0.alpha2)
    }
}

impl fmt::Debug for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Country({})", self.alpha2())
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alpha2())
    }
}

impl Serialize for Country {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.alpha2())
    }
}
