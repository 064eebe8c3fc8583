//! Independent match strategies, one per resolver tier.
//!
//! Each strategy looks at one field descriptor and either proposes a target
//! with a confidence or declines. The resolver runs them in order and keeps
//! the first proposal.

use std::collections::BTreeMap;

use fieldlink_model::{FieldDescriptor, MatchMethod, TargetCatalog, TargetRef};
use rapidfuzz::distance::indel;

use crate::history::HistoryIndex;
use crate::synonyms::SynonymTable;
use crate::utils::{label_key, round4};

/// A proposed target for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub target: TargetRef,
    pub confidence: f64,
}

/// One resolver tier.
pub trait MatchStrategy: Send + Sync {
    /// Method recorded on mappings this strategy produces.
    fn method(&self) -> MatchMethod;

    fn propose(&self, field: &FieldDescriptor) -> Option<Candidate>;
}

/// Case-insensitive label equality against the catalog.
///
/// When several objects carry the same label, the highest-priority object
/// is kept.
#[derive(Debug, Clone)]
pub struct ExactLabelMatch {
    labels: BTreeMap<String, TargetRef>,
    confidence: f64,
}

impl ExactLabelMatch {
    pub fn new(catalog: &TargetCatalog, confidence: f64) -> Self {
        let mut labels = BTreeMap::new();
        for (object, field) in catalog.entries() {
            labels
                .entry(label_key(&field.label))
                .or_insert_with(|| TargetRef {
                    object: object.name.clone(),
                    field: field.name.clone(),
                });
        }
        Self { labels, confidence }
    }
}

impl MatchStrategy for ExactLabelMatch {
    fn method(&self) -> MatchMethod {
        MatchMethod::Exact
    }

    fn propose(&self, field: &FieldDescriptor) -> Option<Candidate> {
        self.labels
            .get(&label_key(&field.display_label))
            .map(|target| Candidate {
                target: target.clone(),
                confidence: self.confidence,
            })
    }
}

/// Lookup of the label in a phrase table.
#[derive(Debug, Clone)]
pub struct SynonymMatch {
    table: SynonymTable,
    confidence: f64,
}

impl SynonymMatch {
    pub fn new(table: SynonymTable, confidence: f64) -> Self {
        Self { table, confidence }
    }
}

impl MatchStrategy for SynonymMatch {
    fn method(&self) -> MatchMethod {
        MatchMethod::Synonym
    }

    fn propose(&self, field: &FieldDescriptor) -> Option<Candidate> {
        self.table.get(&field.display_label).map(|target| Candidate {
            target: target.clone(),
            confidence: self.confidence,
        })
    }
}

/// Reuse of a mapping a human already approved on another form.
#[derive(Debug, Clone)]
pub struct HistoryMatch {
    index: HistoryIndex,
    confidence: f64,
}

impl HistoryMatch {
    pub fn new(index: HistoryIndex, confidence: f64) -> Self {
        Self { index, confidence }
    }
}

impl MatchStrategy for HistoryMatch {
    fn method(&self) -> MatchMethod {
        MatchMethod::History
    }

    fn propose(&self, field: &FieldDescriptor) -> Option<Candidate> {
        self.index.lookup(field).map(|target| Candidate {
            target: target.clone(),
            confidence: self.confidence,
        })
    }
}

/// Best edit-distance similarity across every catalog label.
///
/// The ratio is the normalized InDel similarity (`2 * LCS / (|a| + |b|)`).
/// Labels are visited in catalog priority order and only a strictly better
/// ratio replaces the current best, so ties stay with the earlier object.
#[derive(Debug, Clone)]
pub struct FuzzyLabelMatch {
    labels: Vec<(String, TargetRef)>,
    min_ratio: f64,
    scale: f64,
}

impl FuzzyLabelMatch {
    pub fn new(catalog: &TargetCatalog, min_ratio: f64, scale: f64) -> Self {
        let labels = catalog
            .entries()
            .map(|(object, field)| {
                (
                    label_key(&field.label),
                    TargetRef {
                        object: object.name.clone(),
                        field: field.name.clone(),
                    },
                )
            })
            .collect();
        Self {
            labels,
            min_ratio,
            scale,
        }
    }

    /// Best `(ratio, target)` regardless of the acceptance threshold.
    pub fn best(&self, label: &str) -> Option<(f64, &TargetRef)> {
        let key = label_key(label);
        let mut best: Option<(f64, &TargetRef)> = None;
        for (candidate, target) in &self.labels {
            let ratio = similarity_ratio(&key, candidate);
            if best.is_none_or(|(current, _)| ratio > current) {
                best = Some((ratio, target));
            }
        }
        best
    }

    /// `ratio * scale` at four decimals, always strictly below `scale`.
    fn confidence_for(&self, ratio: f64) -> f64 {
        let confidence = round4(ratio * self.scale);
        if confidence < self.scale {
            confidence
        } else {
            round4(self.scale - CONFIDENCE_STEP).max(0.0)
        }
    }
}

impl MatchStrategy for FuzzyLabelMatch {
    fn method(&self) -> MatchMethod {
        MatchMethod::Fuzzy
    }

    fn propose(&self, field: &FieldDescriptor) -> Option<Candidate> {
        let (ratio, target) = self.best(&field.display_label)?;
        if ratio < self.min_ratio {
            return None;
        }
        Some(Candidate {
            target: target.clone(),
            confidence: self.confidence_for(ratio),
        })
    }
}

/// Smallest confidence difference that survives rounding.
const CONFIDENCE_STEP: f64 = 0.0001;

/// Normalized InDel similarity in `[0, 1]`.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    indel::normalized_similarity(a.chars(), b.chars())
}
