//! Dataset assembly
//!
//! Groups raw activity rows by `(user_id, project)`, runs the feature
//! extractor per group and collects the usable rows into a table.
//! Groups are independent, so extraction runs on the rayon pool; output
//! order follows the sorted group keys either way.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rayon::prelude::*;

use super::features::{FeatureExtractor, FeatureVector, LabeledFeatureVector, NUM_FEATURES};
use crate::models::{ActivityGroup, ActivityRecord};

/// Group raw records by `(user_id, project)`, sorted by key.
pub fn group_activity(records: &[ActivityRecord]) -> Vec<ActivityGroup> {
    let mut buckets: BTreeMap<(&str, &str), Vec<&ActivityRecord>> = BTreeMap::new();
    for record in records {
        buckets
            .entry((record.user_id.as_str(), record.project.as_str()))
            .or_default()
            .push(record);
    }

    buckets
        .into_iter()
        .map(|((user, project), rows)| ActivityGroup::from_records(user, project, rows))
        .collect()
}

/// Labeled training rows.
#[derive(Debug, Clone, Default)]
pub struct TrainingTable {
    rows: Vec<LabeledFeatureVector>,
}

impl TrainingTable {
    pub fn new(rows: Vec<LabeledFeatureVector>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[LabeledFeatureVector] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of churned rows.
    pub fn positives(&self) -> usize {
        self.rows.iter().filter(|r| r.will_churn).count()
    }

    pub fn negatives(&self) -> usize {
        self.len() - self.positives()
    }

    /// Feature matrix in row order.
    pub fn features(&self) -> Vec<[f64; NUM_FEATURES]> {
        self.rows.iter().map(|r| r.features.values).collect()
    }

    /// Labels in row order.
    pub fn labels(&self) -> Vec<bool> {
        self.rows.iter().map(|r| r.will_churn).collect()
    }
}

/// Builds training tables and prediction inputs from raw activity.
#[derive(Debug, Clone, Default)]
pub struct DatasetBuilder {
    extractor: FeatureExtractor,
}

impl DatasetBuilder {
    pub fn new(extractor: FeatureExtractor) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    fn eligible_groups(&self, records: &[ActivityRecord]) -> Vec<ActivityGroup> {
        let min_rows = self.extractor.windows().min_history_rows;
        group_activity(records)
            .into_iter()
            .filter(|g| g.len() >= min_rows)
            .collect()
    }

    /// Training table. An empty table means "no trainable data", not an error.
    pub fn build_training(&self, records: &[ActivityRecord]) -> TrainingTable {
        let groups = self.eligible_groups(records);
        let rows: Vec<LabeledFeatureVector> = groups
            .par_iter()
            .filter_map(|g| self.extractor.extract_training(g))
            .collect();

        let table = TrainingTable::new(rows);
        tracing::info!(
            "Created training dataset with {} samples from {} groups ({} churned, {} retained)",
            table.len(),
            groups.len(),
            table.positives(),
            table.negatives()
        );
        table
    }

    /// Unlabeled prediction rows anchored at `as_of`.
    pub fn build_prediction(
        &self,
        records: &[ActivityRecord],
        as_of: NaiveDateTime,
    ) -> Vec<FeatureVector> {
        let rows: Vec<FeatureVector> = self
            .eligible_groups(records)
            .par_iter()
            .filter_map(|g| self.extractor.extract_prediction(g, as_of))
            .collect();

        tracing::info!("Created prediction dataset with {} samples", rows.len());
        rows
    }
}
