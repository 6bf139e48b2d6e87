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

//! Information-loss metric evaluation
//!
//! Per-column input frequencies are precomputed once per run; the
//! entropy metrics then only need the hierarchy tables, not the rows.
//! Class-shaped metrics (discernability, AECS, precision) take the
//! classes of the current transformation plus the suppression marks the
//! checker derived from the criteria.

use std::collections::HashMap;

use veil_core::{Dataset, Hierarchy, Metric};

use crate::groupify::ClassEntry;

/// Evaluator for the configured information-loss metric.
pub struct MetricEvaluator<'a> {
    metric: Metric,
    qi: Vec<usize>,
    hierarchies: Vec<&'a Hierarchy>,
    /// Per quasi-identifier: frequency of each raw code.
    input_freqs: Vec<Vec<u32>>,
    rows: usize,
    /// Entropy loss at full generalization; normalization denominator.
    max_entropy_loss: f64,
}

impl<'a> MetricEvaluator<'a> {
    pub fn new(dataset: &'a Dataset, metric: Metric) -> Self {
        let qi: Vec<usize> = dataset.quasi_identifiers().to_vec();
        let hierarchies: Vec<&Hierarchy> = qi
            .iter()
            .map(|&col| {
                dataset
                    .hierarchy(col)
                    .expect("quasi-identifier validated to carry a hierarchy")
            })
            .collect();

        let mut input_freqs = Vec::with_capacity(qi.len());
        for (i, &col) in qi.iter().enumerate() {
            let mut freqs = vec![0u32; hierarchies[i].num_values()];
            for row in 0..dataset.rows() {
                freqs[dataset.matrix().get(row, col) as usize] += 1;
            }
            input_freqs.push(freqs);
        }

        let mut evaluator = Self {
            metric,
            qi,
            hierarchies,
            input_freqs,
            rows: dataset.rows(),
            max_entropy_loss: 0.0,
        };
        let top: Vec<u32> = evaluator.hierarchies.iter().map(|h| h.max_level()).collect();
        evaluator.max_entropy_loss = evaluator.entropy_loss(&top);
        evaluator
    }

    /// Loss of the transformation `levels` given its classes and the
    /// checker's suppression marks (`suppressed[i]` belongs to
    /// `classes[i]`).
    pub fn evaluate(&self, levels: &[u32], classes: &[ClassEntry], suppressed: &[bool]) -> f64 {
        debug_assert_eq!(classes.len(), suppressed.len());
        match self.metric {
            Metric::Height => levels.iter().map(|&l| l as f64).sum(),
            Metric::Precision => self.precision(levels, classes, suppressed),
            Metric::AverageClassSize => {
                if classes.is_empty() {
                    0.0
                } else {
                    self.rows as f64 / classes.len() as f64
                }
            }
            Metric::Discernability => classes
                .iter()
                .zip(suppressed.iter())
                .map(|(class, &sup)| {
                    let size = class.count as f64;
                    if sup {
                        size * self.rows as f64
                    } else {
                        size * size
                    }
                })
                .sum(),
            Metric::DiscernabilityStar => classes
                .iter()
                .map(|class| {
                    let size = class.count as f64;
                    size * size
                })
                .sum(),
            Metric::NonUniformEntropy => self.entropy_loss(levels),
            Metric::NormalizedNonUniformEntropy => {
                // Exact comparison at the zero boundary: an all-constant
                // dataset has zero loss at every transformation.
                if self.max_entropy_loss == 0.0 {
                    0.0
                } else {
                    self.entropy_loss(levels) / self.max_entropy_loss
                }
            }
        }
    }

    fn precision(&self, levels: &[u32], classes: &[ClassEntry], suppressed: &[bool]) -> f64 {
        if self.rows == 0 || self.qi.is_empty() {
            return 0.0;
        }
        // Generalization ratio of one kept cell, per attribute.
        let ratios: Vec<f64> = levels
            .iter()
            .zip(self.hierarchies.iter())
            .map(|(&level, h)| {
                if h.height() > 1 {
                    level as f64 / (h.height() - 1) as f64
                } else {
                    0.0
                }
            })
            .collect();
        let kept_row: f64 = ratios.iter().sum();
        let suppressed_row = self.qi.len() as f64;

        let mut total = 0.0;
        for (class, &sup) in classes.iter().zip(suppressed.iter()) {
            let per_row = if sup { suppressed_row } else { kept_row };
            total += class.count as f64 * per_row;
        }
        total / (self.rows as f64 * self.qi.len() as f64)
    }

    /// `sum f(v) * log2(f(g(v)) / f(v))` over all quasi-identifier cells.
    fn entropy_loss(&self, levels: &[u32]) -> f64 {
        let mut loss = 0.0;
        for (i, h) in self.hierarchies.iter().enumerate() {
            let level = levels[i] as usize;
            if level == 0 {
                continue;
            }
            let freqs = &self.input_freqs[i];
            let mut out_freqs: HashMap<u32, u64> = HashMap::new();
            for (code, &freq) in freqs.iter().enumerate() {
                if freq > 0 {
                    *out_freqs.entry(h.generalize(code as u32, level)).or_insert(0) +=
                        freq as u64;
                }
            }
            for (code, &freq) in freqs.iter().enumerate() {
                if freq > 0 {
                    let out = out_freqs[&h.generalize(code as u32, level)];
                    loss += freq as f64 * (out as f64 / freq as f64).log2();
                }
            }
        }
        loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::AttributeRole;

    fn dataset() -> Dataset {
        // Four rows, one QI with a 3-level hierarchy.
        Dataset::builder()
            .attribute_with_hierarchy(
                "age",
                AttributeRole::QuasiIdentifying,
                vec![
                    vec!["30".into(), "30-39".into(), "*".into()],
                    vec!["35".into(), "30-39".into(), "*".into()],
                    vec!["45".into(), "40-49".into(), "*".into()],
                ],
            )
            .row(["30"])
            .row(["30"])
            .row(["35"])
            .row(["45"])
            .build()
            .unwrap()
    }

    fn groupify_with(sizes: &[u32]) -> crate::groupify::HashGroupify {
        let mut g = crate::groupify::HashGroupify::with_capacity(sizes.len(), false);
        for (i, &size) in sizes.iter().enumerate() {
            g.add_class(&[i as u32], 0, size, 0, None);
        }
        g
    }

    #[test]
    fn test_height() {
        let ds = dataset();
        let eval = MetricEvaluator::new(&ds, Metric::Height);
        assert_eq!(eval.evaluate(&[2], &[], &[]), 2.0);
    }

    #[test]
    fn test_discernability_penalizes_suppressed() {
        let ds = dataset();
        let eval = MetricEvaluator::new(&ds, Metric::Discernability);
        let g = groupify_with(&[3, 1]);
        // 3^2 + 1 * rows(4)
        assert_eq!(eval.evaluate(&[0], g.classes(), &[false, true]), 13.0);
        let eval = MetricEvaluator::new(&ds, Metric::DiscernabilityStar);
        assert_eq!(eval.evaluate(&[0], g.classes(), &[false, true]), 10.0);
    }

    #[test]
    fn test_precision_bounds() {
        let ds = dataset();
        let eval = MetricEvaluator::new(&ds, Metric::Precision);
        let g = groupify_with(&[4]);
        assert_eq!(eval.evaluate(&[0], g.classes(), &[false]), 0.0);
        assert_eq!(eval.evaluate(&[2], g.classes(), &[false]), 1.0);
        let half = eval.evaluate(&[1], g.classes(), &[false]);
        assert!(half > 0.0 && half < 1.0);
    }

    #[test]
    fn test_entropy_loss_zero_at_identity() {
        let ds = dataset();
        let eval = MetricEvaluator::new(&ds, Metric::NonUniformEntropy);
        assert_eq!(eval.evaluate(&[0], &[], &[]), 0.0);
        // Level 1 merges "30" (2 rows) and "35" (1 row):
        // 2*log2(3/2) + 1*log2(3/1), "45" alone contributes 0.
        let expected = 2.0 * (3.0f64 / 2.0).log2() + (3.0f64).log2();
        let got = eval.evaluate(&[1], &[], &[]);
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_entropy_is_one_at_top() {
        let ds = dataset();
        let eval = MetricEvaluator::new(&ds, Metric::NormalizedNonUniformEntropy);
        let top = eval.evaluate(&[2], &[], &[]);
        assert!((top - 1.0).abs() < 1e-12);
        assert!(eval.evaluate(&[1], &[], &[]) < 1.0);
    }
}
