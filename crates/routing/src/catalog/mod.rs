//! Indicator catalog.
//!
//! Maps provider-agnostic indicator concepts to per-provider series codes
//! with a confidence estimate. Confidences are only ever compared within one
//! concept.
//!
//! The default catalog is `indicators.json`, embedded at compile time. A
//! catalog is immutable once built; [`CatalogStore`] swaps whole snapshots.

mod fuzzy;
mod store;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use lazy_static::lazy_static;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::FuzzyConfig;
use crate::errors::RoutingError;
use crate::models::{Country, ProviderKind};

pub use fuzzy::normalize_text;
pub use store::CatalogStore;

/// Short aliases ("m2", "cpi") are prone to matching inside longer tokens.
const SHORT_ALIAS_MAX_LEN: usize = 3;

lazy_static! {
    static ref EMBEDDED_CONCEPTS: Vec<IndicatorConcept> =
        serde_json::from_str(include_str!("indicators.json"))
            .expect("indicators.json must be valid");
}

/// One provider's series for a concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: String,
    pub confidence: f64,
    #[serde(default)]
    pub notes: String,
    /// Narrows the provider's default coverage to these alpha-2 codes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<Vec<String>>,
}

impl CatalogEntry {
    pub fn covers(&self, provider: ProviderKind, country: &Country) -> bool {
        match &self.coverage {
            Some(list) => list.iter().any(|c| c.eq_ignore_ascii_case(country.alpha2())),
            None => provider.coverage().covers(country),
        }
    }

    /// Whether this series covers every country.
    pub fn is_global(&self, provider: ProviderKind) -> bool {
        self.coverage.is_none() && provider.coverage().is_global()
    }
}

/// A semantic indicator with its surface forms and per-provider series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConcept {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Phrases that disqualify a text even if it overlaps an alias.
    #[serde(default)]
    pub exclusions: Vec<String>,
    pub providers: BTreeMap<ProviderKind, CatalogEntry>,
}

/// How free text was matched to a concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Alias,
    Fuzzy,
}

/// Result of [`IndicatorCatalog::resolve_concept`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptMatch {
    pub concept: String,
    /// 1.0 for alias hits, the similarity score for fuzzy hits.
    pub confidence: f64,
    pub kind: MatchKind,
}

#[derive(Debug, Clone)]
struct PreparedConcept {
    concept: IndicatorConcept,
    /// Normalized id and aliases.
    aliases: Vec<String>,
    exclusions: Vec<String>,
}

/// An immutable, validated set of indicator concepts.
#[derive(Debug, Clone)]
pub struct IndicatorCatalog {
    concepts: Vec<PreparedConcept>,
    /// Normalized concept id → index
    by_id: HashMap<String, usize>,
    /// Normalized alias → concept indexes
    by_alias: HashMap<String, Vec<usize>>,
    priority: Vec<ProviderKind>,
    fuzzy: FuzzyConfig,
}

impl IndicatorCatalog {
    /// The catalog compiled into the crate.
    pub fn embedded() -> Self {
        // Validated by tests; a broken embedded file is a build defect.
        Self::from_concepts(EMBEDDED_CONCEPTS.clone())
            .expect("embedded indicator catalog must validate")
    }

    pub fn from_json(json: &str) -> Result<Self, RoutingError> {
        let concepts: Vec<IndicatorConcept> = serde_json::from_str(json)?;
        Self::from_concepts(concepts)
    }

    /// Validate and index a list of concepts.
    pub fn from_concepts(concepts: Vec<IndicatorConcept>) -> Result<Self, RoutingError> {
        let mut prepared = Vec::with_capacity(concepts.len());
        let mut by_id = HashMap::new();
        let mut by_alias: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, concept) in concepts.into_iter().enumerate() {
            let prepared_concept = prepare(concept)?;
            let id_key = normalize_text(&prepared_concept.concept.id);
            if by_id.insert(id_key, idx).is_some() {
                return Err(RoutingError::Catalog(format!(
                    "duplicate concept id '{}'",
                    prepared_concept.concept.id
                )));
            }
            for alias in &prepared_concept.aliases {
                let entry = by_alias.entry(alias.clone()).or_default();
                if !entry.contains(&idx) {
                    entry.push(idx);
                }
            }
            prepared.push(prepared_concept);
        }

        Ok(Self {
            concepts: prepared,
            by_id,
            by_alias,
            priority: Vec::new(),
            fuzzy: FuzzyConfig::default(),
        })
    }

    /// Tie-break order for equal confidences.
    pub fn with_priority(mut self, priority: Vec<ProviderKind>) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_fuzzy(mut self, fuzzy: FuzzyConfig) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    pub fn priority(&self) -> &[ProviderKind] {
        &self.priority
    }

    pub fn fuzzy(&self) -> &FuzzyConfig {
        &self.fuzzy
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    pub fn concept_ids(&self) -> impl Iterator<Item = &str> {
        self.concepts.iter().map(|c| c.concept.id.as_str())
    }

    /// A concept by id. Underscores and case are ignored.
    pub fn concept(&self, id: &str) -> Option<&IndicatorConcept> {
        self.prepared(id).map(|c| &c.concept)
    }

    fn prepared(&self, id: &str) -> Option<&PreparedConcept> {
        self.by_id
            .get(&normalize_text(id))
            .map(|&idx| &self.concepts[idx])
    }

    pub fn lookup(&self, concept: &str, provider: ProviderKind) -> Option<&CatalogEntry> {
        self.concept(concept)?.providers.get(&provider)
    }

    /// Providers for a concept, best first.
    ///
    /// Sorted by confidence descending; ties follow the configured provider
    /// priority, then declaration order.
    pub fn best_providers(&self, concept: &str, limit: usize) -> Vec<(ProviderKind, f64)> {
        let Some(concept) = self.concept(concept) else {
            return Vec::new();
        };
        let mut ranked: Vec<(ProviderKind, f64)> = concept
            .providers
            .iter()
            .map(|(provider, entry)| (*provider, entry.confidence))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.priority_rank(a.0).cmp(&self.priority_rank(b.0)))
        });
        ranked.truncate(limit);
        ranked
    }

    /// Position in the priority list; unlisted providers rank after all
    /// listed ones, in declaration order.
    pub fn priority_rank(&self, provider: ProviderKind) -> usize {
        self.priority
            .iter()
            .position(|p| *p == provider)
            .unwrap_or(self.priority.len() + provider as usize)
    }

    /// Whether `candidate_name` should be rejected as a match for `concept`.
    ///
    /// True when the text contains one of the concept's exclusion phrases,
    /// or when a short alias ("m2") shows up only glued inside a longer
    /// token ("CM2") and no alias appears as a phrase of its own. Unknown
    /// concepts exclude nothing.
    ///
    /// ```
    /// use econroute_routing::catalog::IndicatorCatalog;
    ///
    /// let catalog = IndicatorCatalog::embedded();
    /// assert!(catalog.is_false_positive("Pupils enrolled in CM2, total", "m2_money_supply"));
    /// assert!(!catalog.is_false_positive("Money and quasi money (M2)", "m2_money_supply"));
    /// ```
    pub fn is_false_positive(&self, candidate_name: &str, concept: &str) -> bool {
        let Some(prepared) = self.prepared(concept) else {
            return false;
        };
        let text = normalize_text(candidate_name);

        if let Some(exclusion) = prepared.exclusions.iter().find(|e| text.contains(e.as_str())) {
            debug!(
                "'{}' rejected for {}: exclusion '{}'",
                candidate_name, prepared.concept.id, exclusion
            );
            return true;
        }

        let any_alias_whole = prepared
            .aliases
            .iter()
            .any(|alias| fuzzy::contains_phrase(&text, alias));
        if any_alias_whole {
            return false;
        }
        let embedded_short = prepared
            .aliases
            .iter()
            .filter(|alias| alias.len() <= SHORT_ALIAS_MAX_LEN && !alias.contains(' '))
            .find(|alias| fuzzy::embedded_only(&text, alias));
        if let Some(alias) = embedded_short {
            debug!(
                "'{}' rejected for {}: '{}' only appears inside a longer token",
                candidate_name, prepared.concept.id, alias
            );
            return true;
        }
        false
    }

    /// The false-positive gate for text that resolved to no concept.
    ///
    /// Every concept the query names by alias applies its own rules, except
    /// where that alias sits inside a longer alias named by another concept
    /// ("gdp" inside "gdp growth"). Independently, a short query token with
    /// a digit ("m2") must not appear in the candidate only inside a longer
    /// token ("CM2").
    ///
    /// ```
    /// use econroute_routing::catalog::IndicatorCatalog;
    ///
    /// let catalog = IndicatorCatalog::embedded();
    /// let query = "M2 monetary aggregate for China";
    /// assert!(catalog.is_false_positive_for_query("Pupils enrolled in CM2, total", query));
    /// assert!(!catalog.is_false_positive_for_query("Broad money (M2)", query));
    /// ```
    pub fn is_false_positive_for_query(&self, candidate_name: &str, query: &str) -> bool {
        let query = normalize_text(query);
        let named: Vec<(&PreparedConcept, &String)> = self
            .concepts
            .iter()
            .filter_map(|c| {
                c.aliases
                    .iter()
                    .filter(|alias| fuzzy::contains_phrase(&query, alias))
                    .max_by_key(|alias| alias.len())
                    .map(|alias| (c, alias))
            })
            .collect();
        let subsumed = |alias: &str| {
            named
                .iter()
                .any(|(_, other)| other.len() > alias.len() && fuzzy::contains_phrase(other, alias))
        };
        for (concept, alias) in &named {
            if subsumed(alias) {
                continue;
            }
            if self.is_false_positive(candidate_name, &concept.concept.id) {
                return true;
            }
        }

        let text = normalize_text(candidate_name);
        let embedded = query
            .split(' ')
            .filter(|t| t.len() <= SHORT_ALIAS_MAX_LEN && t.chars().any(|c| c.is_ascii_digit()))
            .find(|t| fuzzy::embedded_only(&text, t));
        if let Some(token) = embedded {
            debug!(
                "'{}' rejected for '{}': '{}' only appears inside a longer token",
                candidate_name, query, token
            );
            return true;
        }
        false
    }

    /// Resolve free text to a concept.
    ///
    /// 1. Alias (or concept id) match at confidence 1.0. Two concepts
    ///    sharing the alias is `Ambiguous`.
    /// 2. Otherwise fuzzy matching with a threshold that is stricter for
    ///    shorter text; matches failing [`is_false_positive`](Self::is_false_positive)
    ///    are dropped, and two concepts within the ambiguity margin of each
    ///    other are `Ambiguous`.
    /// 3. Otherwise `NoConceptMatch`.
    pub fn resolve_concept(&self, text: &str) -> Result<ConceptMatch, RoutingError> {
        let key = normalize_text(text);
        if key.is_empty() {
            return Err(RoutingError::NoConceptMatch(text.to_string()));
        }

        if let Some(hits) = self.by_alias.get(&key) {
            return match hits.as_slice() {
                [idx] => Ok(ConceptMatch {
                    concept: self.concepts[*idx].concept.id.clone(),
                    confidence: 1.0,
                    kind: MatchKind::Alias,
                }),
                many => Err(RoutingError::Ambiguous {
                    query: text.to_string(),
                    candidates: many
                        .iter()
                        .map(|idx| self.concepts[*idx].concept.id.clone())
                        .collect(),
                }),
            };
        }

        let threshold = self.fuzzy.threshold_for(key.chars().count());
        let mut scored: Vec<(usize, f64)> = self
            .concepts
            .iter()
            .enumerate()
            .filter_map(|(idx, prepared)| {
                let best = prepared
                    .aliases
                    .iter()
                    .map(|alias| fuzzy::similarity(&key, alias))
                    .fold(0.0_f64, f64::max);
                (best >= threshold).then_some((idx, best))
            })
            .filter(|(idx, _)| !self.is_false_positive(text, &self.concepts[*idx].concept.id))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        match scored.as_slice() {
            [] => Err(RoutingError::NoConceptMatch(text.to_string())),
            [(best, score), rest @ ..] => {
                let tied: Vec<String> = rest
                    .iter()
                    .take_while(|(_, other)| score - other <= self.fuzzy.ambiguity_margin)
                    .map(|(idx, _)| self.concepts[*idx].concept.id.clone())
                    .collect();
                if !tied.is_empty() {
                    let mut candidates = vec![self.concepts[*best].concept.id.clone()];
                    candidates.extend(tied);
                    return Err(RoutingError::Ambiguous {
                        query: text.to_string(),
                        candidates,
                    });
                }
                debug!(
                    "Fuzzy match '{}' -> {} ({:.3} >= {:.2})",
                    text, self.concepts[*best].concept.id, score, threshold
                );
                Ok(ConceptMatch {
                    concept: self.concepts[*best].concept.id.clone(),
                    confidence: *score,
                    kind: MatchKind::Fuzzy,
                })
            }
        }
    }
}

/// What a candidate's description is checked against before acceptance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndicatorGate<'a> {
    /// The rules of the resolved concept.
    Concept(&'a str),
    /// No concept resolved: the rules the query text itself implies.
    Query(&'a str),
}

impl<'a> IndicatorGate<'a> {
    /// The concept's rules when one resolved, otherwise the query's.
    pub fn new(concept: Option<&'a str>, query: &'a str) -> Self {
        concept.map_or(IndicatorGate::Query(query), IndicatorGate::Concept)
    }

    pub fn rejects(&self, catalog: &IndicatorCatalog, candidate_name: &str) -> bool {
        match *self {
            Self::Concept(concept) => catalog.is_false_positive(candidate_name, concept),
            Self::Query(query) => catalog.is_false_positive_for_query(candidate_name, query),
        }
    }
}

impl fmt::Display for IndicatorGate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concept(concept) => f.write_str(concept),
            Self::Query(query) => write!(f, "'{}'", query),
        }
    }
}

fn prepare(concept: IndicatorConcept) -> Result<PreparedConcept, RoutingError> {
    let id = concept.id.trim();
    if id.is_empty() {
        return Err(RoutingError::Catalog("concept with empty id".to_string()));
    }
    if concept.providers.is_empty() {
        return Err(RoutingError::Catalog(format!("concept '{}' has no providers", id)));
    }
    for (provider, entry) in &concept.providers {
        if entry.code.trim().is_empty() {
            return Err(RoutingError::Catalog(format!(
                "concept '{}': empty code for {}",
                id, provider
            )));
        }
        if !(0.0..=1.0).contains(&entry.confidence) {
            return Err(RoutingError::Catalog(format!(
                "concept '{}': confidence {} for {} outside [0, 1]",
                id, entry.confidence, provider
            )));
        }
    }

    let mut seen = HashSet::new();
    let aliases: Vec<String> = std::iter::once(concept.id.as_str())
        .chain(concept.aliases.iter().map(String::as_str))
        .map(normalize_text)
        .filter(|a| !a.is_empty() && seen.insert(a.clone()))
        .collect();
    let exclusions: Vec<String> = concept
        .exclusions
        .iter()
        .map(|e| normalize_text(e))
        .filter(|e| !e.is_empty())
        .collect();

    for alias in &aliases {
        if let Some(exclusion) = exclusions.iter().find(|e| alias.contains(e.as_str())) {
            return Err(RoutingError::Catalog(format!(
                "concept '{}': alias '{}' contains its own exclusion '{}'",
                id, alias, exclusion
            )));
        }
    }

    Ok(PreparedConcept {
        concept,
        aliases,
        exclusions,
    })
}
