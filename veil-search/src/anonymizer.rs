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

//! Top-level anonymization API
//!
//! Wires dataset, configuration, lattice, checker and traversal into
//! one synchronous run and assembles the outputs external collaborators
//! need: the optimal transformation, the row-to-class mapping, output
//! materialization and process statistics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::info;
use veil_core::{
    AnonymizationConfig, AttributeRole, Dataset, Hierarchy, PrivacyCriterion, Result,
};
use veil_engine::{Checker, RowClassification};

use crate::estimate;
use crate::flash::{FlashAlgorithm, NoopListener, ProgressListener};
use crate::lattice::Lattice;

/// Cell rendered for suppressed and removed values.
const SUPPRESSED_CELL: &str = "*";

/// Shared flag for cooperative cancellation; poll-based, so a running
/// check always completes before the traversal aborts.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl ProgressListener for CancellationToken {
    fn is_cancelled(&self) -> bool {
        CancellationToken::is_cancelled(self)
    }
}

/// The transformation selected by the search.
#[derive(Debug, Clone, Serialize)]
pub struct OptimalTransformation {
    pub node_id: usize,
    /// Generalization level per quasi-identifying attribute.
    pub transformation: Vec<u32>,
    pub information_loss: f64,
}

/// Statistics of one completed run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessStatistics {
    pub transformations_total: usize,
    pub transformations_checked: usize,
    /// Nodes resolved by tag propagation alone.
    pub transformations_tagged: usize,
    pub snapshot_rollups: u64,
    pub full_scans: u64,
    pub bounds_tightened: usize,
    pub duration_ms: u64,
}

/// Everything a run produces.
#[derive(Debug)]
pub struct AnonymizationResult {
    pub optimum: Option<OptimalTransformation>,
    /// Row-to-class mapping under the optimum; `None` when no
    /// anonymous transformation exists.
    pub classification: Option<RowClassification>,
    pub statistics: ProcessStatistics,
}

impl AnonymizationResult {
    /// Materializes generalized output rows: quasi-identifiers decoded
    /// at the optimal levels, identifying attributes removed, rows of
    /// suppressed classes fully masked. Returns `None` when no
    /// anonymous transformation exists.
    pub fn materialize(&self, dataset: &Dataset) -> Option<Vec<Vec<String>>> {
        let optimum = self.optimum.as_ref()?;
        let classification = self.classification.as_ref()?;

        let qi = dataset.quasi_identifiers();
        let mut rows = Vec::with_capacity(dataset.rows());
        for row in 0..dataset.rows() {
            let suppressed = classification.suppressed.get(row);
            let mut out = Vec::with_capacity(dataset.attributes().len());
            for (col, attribute) in dataset.attributes().iter().enumerate() {
                if suppressed || attribute.role == AttributeRole::Identifying {
                    out.push(SUPPRESSED_CELL.to_string());
                    continue;
                }
                let code = dataset.matrix().get(row, col);
                let code = match qi.iter().position(|&q| q == col) {
                    Some(i) => dataset
                        .hierarchy(col)
                        .expect("quasi-identifier validated to carry a hierarchy")
                        .generalize(code, optimum.transformation[i] as usize),
                    None => code,
                };
                out.push(
                    dataset
                        .dictionary(col)
                        .resolve(code)
                        .expect("codes produced by the dictionary")
                        .to_string(),
                );
            }
            rows.push(out);
        }
        Some(rows)
    }
}

/// One-shot anonymization runner; one instance serves one run.
pub struct Anonymizer<'a> {
    dataset: &'a Dataset,
    config: &'a AnonymizationConfig,
}

impl<'a> Anonymizer<'a> {
    pub fn new(dataset: &'a Dataset, config: &'a AnonymizationConfig) -> Self {
        Self { dataset, config }
    }

    /// Runs the search to completion.
    pub fn run(&self) -> Result<AnonymizationResult> {
        self.run_with_listener(&mut NoopListener)
    }

    /// Runs the search, polling `listener` after every check.
    pub fn run_with_listener(
        &self,
        listener: &mut dyn ProgressListener,
    ) -> Result<AnonymizationResult> {
        let started = Instant::now();
        self.config.validate_for(self.dataset)?;

        let hierarchies: Vec<&Hierarchy> = self
            .dataset
            .quasi_identifiers()
            .iter()
            .map(|&col| {
                self.dataset
                    .hierarchy(col)
                    .expect("quasi-identifier validated to carry a hierarchy")
            })
            .collect();
        let mut lattice = Lattice::build(&hierarchies, self.config.max_lattice_size)?;
        let mut checker = Checker::new(self.dataset, self.config)?;

        let binary = self.config.binary_phase_valid(self.dataset.rows());
        let has_k = self
            .config
            .criteria
            .iter()
            .any(|c| matches!(c, PrivacyCriterion::KAnonymity { .. }));
        info!(
            nodes = lattice.len(),
            rows = self.dataset.rows(),
            binary,
            "starting anonymization"
        );

        let outcome =
            FlashAlgorithm::new(&mut lattice, &mut checker, binary, has_k).run(listener)?;

        let bounds_tightened = if self.config.metric.is_monotonic() {
            estimate::propagate_bounds(&mut lattice)
        } else {
            0
        };

        let optimum = outcome.optimum.map(|(node_id, loss)| OptimalTransformation {
            node_id,
            transformation: lattice.node(node_id).transformation().to_vec(),
            information_loss: loss,
        });
        let classification = optimum
            .as_ref()
            .map(|o| checker.classify(&o.transformation));

        let checker_stats = checker.stats();
        let statistics = ProcessStatistics {
            transformations_total: lattice.len(),
            transformations_checked: lattice.checked_count(),
            transformations_tagged: lattice.tagged_count() - lattice.checked_count(),
            snapshot_rollups: checker_stats.snapshot_rollups,
            full_scans: checker_stats.full_scans,
            bounds_tightened,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            checked = statistics.transformations_checked,
            total = statistics.transformations_total,
            optimum = ?optimum.as_ref().map(|o| &o.transformation),
            "anonymization finished"
        );

        Ok(AnonymizationResult {
            optimum,
            classification,
            statistics,
        })
    }
}
