//! Four-tier auto-mapping pipeline.
//!
//! The resolver holds an ordered list of [`MatchStrategy`] values and asks
//! each in turn; the first proposal wins. Fields nobody matches still get a
//! mapping with an empty target and zero confidence.

use std::collections::BTreeSet;

use chrono::Utc;
use fieldlink_model::{FieldDescriptor, FieldMapping, FormSchema, MappingSet, TargetCatalog};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::history::HistoryIndex;
use crate::strategy::{ExactLabelMatch, FuzzyLabelMatch, HistoryMatch, MatchStrategy, SynonymMatch};
use crate::synonyms::SynonymTable;

/// Confidence assigned by each tier and the fuzzy acceptance window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverConfig {
    pub exact_confidence: f64,
    pub synonym_confidence: f64,
    pub history_confidence: f64,
    /// Minimum similarity ratio a fuzzy candidate needs.
    pub fuzzy_min_ratio: f64,
    /// Multiplier applied to the fuzzy ratio. Keep below the history tier.
    pub fuzzy_scale: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            exact_confidence: 1.0,
            synonym_confidence: 0.95,
            history_confidence: 0.85,
            fuzzy_min_ratio: 0.7,
            fuzzy_scale: 0.8,
        }
    }
}

impl ResolverConfig {
    #[must_use]
    pub fn with_fuzzy_min_ratio(mut self, ratio: f64) -> Self {
        self.fuzzy_min_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_fuzzy_scale(mut self, scale: f64) -> Self {
        self.fuzzy_scale = scale.clamp(0.0, 1.0);
        self
    }
}

pub struct Resolver {
    strategies: Vec<Box<dyn MatchStrategy>>,
    fallback_object: String,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let methods: Vec<_> = self.strategies.iter().map(|s| s.method()).collect();
        f.debug_struct("Resolver")
            .field("strategies", &methods)
            .field("fallback_object", &self.fallback_object)
            .finish()
    }
}

impl Resolver {
    /// The standard pipeline: exact, synonym, history, fuzzy.
    pub fn new(
        catalog: &TargetCatalog,
        synonyms: SynonymTable,
        history: HistoryIndex,
        config: ResolverConfig,
    ) -> Self {
        let strategies: Vec<Box<dyn MatchStrategy>> = vec![
            Box::new(ExactLabelMatch::new(catalog, config.exact_confidence)),
            Box::new(SynonymMatch::new(synonyms, config.synonym_confidence)),
            Box::new(HistoryMatch::new(history, config.history_confidence)),
            Box::new(FuzzyLabelMatch::new(
                catalog,
                config.fuzzy_min_ratio,
                config.fuzzy_scale,
            )),
        ];
        Self::with_strategies(catalog, strategies)
    }

    /// A pipeline with caller-supplied tiers, tried in the given order.
    pub fn with_strategies(
        catalog: &TargetCatalog,
        strategies: Vec<Box<dyn MatchStrategy>>,
    ) -> Self {
        Self {
            strategies,
            fallback_object: catalog.primary_name().unwrap_or_default().to_string(),
        }
    }

    /// Resolve one mappable field through the tiers.
    pub fn resolve_field(&self, form_id: &str, field: &FieldDescriptor) -> FieldMapping {
        for strategy in &self.strategies {
            if let Some(candidate) = strategy.propose(field) {
                debug!(
                    form_id,
                    field_id = %field.field_id,
                    method = %strategy.method(),
                    confidence = candidate.confidence,
                    target = %candidate.target,
                    "field resolved"
                );
                return FieldMapping {
                    target_object: candidate.target.object,
                    target_field: candidate.target.field,
                    method: strategy.method(),
                    confidence: candidate.confidence,
                    ..FieldMapping::unmapped(form_id, &field.field_id, "")
                };
            }
        }
        debug!(form_id, field_id = %field.field_id, "field unmatched");
        FieldMapping::unmapped(form_id, &field.field_id, &self.fallback_object)
    }

    /// Produce a fresh mapping set for every mappable field of `schema`.
    ///
    /// Exempt fields get no mapping. A field id repeated in the schema is
    /// resolved once.
    pub fn resolve(&self, schema: &FormSchema) -> Result<MappingSet> {
        let mut seen = BTreeSet::new();
        let mut mappings = Vec::new();
        for field in schema.mappable_fields() {
            if !seen.insert(field.field_id.as_str()) {
                warn!(form_id = %schema.form_id, field_id = %field.field_id, "duplicate field id skipped");
                continue;
            }
            mappings.push(self.resolve_field(&schema.form_id, field));
        }

        let mut set = MappingSet::new(schema.form_id.clone(), mappings)?;
        set.last_auto_mapped = Some(Utc::now());

        let summary = set.summary();
        info!(
            form_id = %schema.form_id,
            total = summary.total,
            matched = summary.total - summary.unmatched,
            unmatched = summary.unmatched,
            "form resolved"
        );
        Ok(set)
    }
}
