// Copyright 2025 Veil (https://github.com/veil-privacy/veil)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Run configuration
//!
//! Bundles the criteria conjunction, the metric, the suppression budget
//! and the resource limits of one anonymization run. Validation against
//! a concrete dataset happens in `validate_for`, before any lattice or
//! search state is built.

use serde::{Deserialize, Serialize};

use crate::criteria::PrivacyCriterion;
use crate::data::Dataset;
use crate::error::{Result, VeilError};
use crate::metric::Metric;

/// Default ceiling on materialized lattice nodes.
pub const DEFAULT_MAX_LATTICE_SIZE: u64 = 1_000_000;

/// Budget configuration for the snapshot history cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// A snapshot is admitted only if its class count is at most this
    /// fraction of the dataset's row count.
    pub snapshot_fraction_dataset: f64,
    /// A snapshot rolled up from another snapshot is admitted only if
    /// its class count is at most this fraction of its ancestor's.
    pub snapshot_fraction_snapshot: f64,
    /// Maximum number of resident snapshots before eviction.
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            snapshot_fraction_dataset: 0.2,
            snapshot_fraction_snapshot: 0.8,
            max_entries: 200,
        }
    }
}

/// Configuration of one anonymization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizationConfig {
    /// Conjunction of privacy criteria; every class must satisfy all of
    /// them (or be suppressed within the outlier budget).
    pub criteria: Vec<PrivacyCriterion>,
    /// Information-loss metric to minimize.
    pub metric: Metric,
    /// Maximum fraction of rows that may be suppressed, in [0, 1).
    pub max_outlier_fraction: f64,
    /// Assume monotonicity of the full conjunction even when it cannot
    /// be proven; enables the binary phase for non-monotonic criteria.
    pub practical_monotonicity: bool,
    /// Snapshot cache budget.
    pub history: HistoryConfig,
    /// Hard ceiling on lattice size; exceeding it is fatal.
    pub max_lattice_size: u64,
    /// Row indices of the research subset for d-presence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_subset: Option<Vec<usize>>,
}

impl Default for AnonymizationConfig {
    fn default() -> Self {
        Self {
            criteria: vec![PrivacyCriterion::KAnonymity { k: 2 }],
            metric: Metric::Height,
            max_outlier_fraction: 0.0,
            practical_monotonicity: false,
            history: HistoryConfig::default(),
            max_lattice_size: DEFAULT_MAX_LATTICE_SIZE,
            research_subset: None,
        }
    }
}

impl AnonymizationConfig {
    /// Absolute outlier budget for a dataset of `rows` rows.
    pub fn max_outliers(&self, rows: usize) -> usize {
        (self.max_outlier_fraction * rows as f64).floor() as usize
    }

    /// Whether the criteria conjunction is monotonic under the current
    /// suppression budget.
    pub fn criteria_monotonic(&self, rows: usize) -> bool {
        let with_suppression = self.max_outliers(rows) > 0;
        self.criteria.iter().all(|c| c.is_monotonic(with_suppression))
    }

    /// Whether the binary (monotonic fast-path) traversal phase is valid.
    pub fn binary_phase_valid(&self, rows: usize) -> bool {
        self.practical_monotonicity
            || (self.criteria_monotonic(rows) && self.metric.is_monotonic())
    }

    /// Validates thresholds and dataset-dependent requirements.
    pub fn validate_for(&self, dataset: &Dataset) -> Result<()> {
        if self.criteria.is_empty() {
            return Err(VeilError::InvalidConfiguration(
                "at least one privacy criterion is required".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.max_outlier_fraction) {
            return Err(VeilError::InvalidConfiguration(format!(
                "suppression fraction must be in [0, 1), got {}",
                self.max_outlier_fraction
            )));
        }
        for criterion in &self.criteria {
            criterion.validate()?;
            if criterion.needs_distributions() && dataset.sensitive_attribute().is_none() {
                return Err(VeilError::MissingSensitiveAttribute {
                    criterion: criterion.name(),
                });
            }
            if criterion.needs_subset() {
                let subset = self
                    .research_subset
                    .as_ref()
                    .ok_or(VeilError::MissingResearchSubset)?;
                for &row in subset {
                    if row >= dataset.rows() {
                        return Err(VeilError::SubsetRowOutOfBounds(row, dataset.rows()));
                    }
                }
            }
        }
        Ok(())
    }
}
