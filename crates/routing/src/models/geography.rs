use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

use serde::Serialize;

use super::country::Country;

/// A resolved geography token: one country or a named group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedGeography {
    Country { country: Country },
    Group { name: String, members: BTreeSet<Country> },
}

impl ResolvedGeography {
    /// Individual countries this token stands for.
    pub fn members(&self) -> BTreeSet<Country> {
        match self {
            Self::Country { country } => BTreeSet::from([*country]),
            Self::Group { members, .. } => members.clone(),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group { .. })
    }
}

impl fmt::Display for ResolvedGeography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Country { country } => write!(f, "{}", country),
            Self::Group { name, .. } => f.write_str(name),
        }
    }
}

/// A geography mention found in free text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DetectedGeography {
    /// Byte range of the mention in the scanned text.
    pub span: Range<usize>,
    /// The text as written.
    pub text: String,
    pub geography: ResolvedGeography,
}

/// Which requested countries a routing candidate is expected to cover.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeographyScope {
    /// Global coverage; any requested member.
    All,
    /// Every member of a named group.
    Group { name: String, members: BTreeSet<Country> },
    /// A single country.
    Country { country: Country },
    /// A subset of the requested members.
    Countries { countries: BTreeSet<Country> },
}

impl GeographyScope {
    pub fn includes(&self, country: &Country) -> bool {
        match self {
            Self::All => true,
            Self::Group { members, .. } => members.contains(country),
            Self::Country { country: c } => c == country,
            Self::Countries { countries } => countries.contains(country),
        }
    }

    /// Whether every country in `requested` falls inside this scope.
    pub fn covers_all(&self, requested: &BTreeSet<Country>) -> bool {
        requested.iter().all(|c| self.includes(c))
    }
}

impl fmt::Display for GeographyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Group { name, .. } => f.write_str(name),
            Self::Country { country } => write!(f, "{}", country),
            Self::Countries { countries } => {
                let codes: Vec<_> = countries.iter().map(|c| c.alpha2()).collect();
                write!(f, "{}", codes.join("+"))
            }
        }
    }
}

/// The geography side of a request after every token has been resolved.
#[derive(Clone, Debug)]
pub struct RequestGeography {
    pub tokens: Vec<ResolvedGeography>,
    /// Union of all members, de-duplicated.
    pub members: BTreeSet<Country>,
}

impl RequestGeography {
    pub fn new(tokens: Vec<ResolvedGeography>) -> Self {
        let members = tokens.iter().flat_map(|t| t.members()).collect();
        Self { tokens, members }
    }

    /// A single country named directly (not through a group).
    pub fn single_country(&self) -> Option<Country> {
        match self.tokens.as_slice() {
            [ResolvedGeography::Country { country }] => Some(*country),
            _ if self.members.len() == 1 && !self.tokens.iter().any(|t| t.is_group()) => {
                self.members.iter().next().copied()
            }
            _ => None,
        }
    }

    /// The scope describing "all requested members".
    pub fn full_scope(&self) -> GeographyScope {
        if let Some(country) = self.single_country() {
            return GeographyScope::Country { country };
        }
        match self.tokens.as_slice() {
            [ResolvedGeography::Group { name, members }] => GeographyScope::Group {
                name: name.clone(),
                members: members.clone(),
            },
            _ => GeographyScope::Countries {
                countries: self.members.clone(),
            },
        }
    }
}

impl fmt::Display for RequestGeography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.tokens.iter().map(|t| t.to_string()).collect();
        f.write_str(&parts.join(", "))
    }
}
