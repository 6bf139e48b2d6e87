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

//! Encoded dataset
//!
//! The builder interns every attribute through a [`Dictionary`] exactly
//! once; the search core only ever touches the resulting row-major
//! `u32` matrix. Quasi-identifying attributes additionally carry a
//! [`Hierarchy`] whose level-0 codes coincide with the column's codes.

use crate::attribute::{Attribute, AttributeRole};
use crate::dictionary::Dictionary;
use crate::error::{Result, VeilError};
use crate::hierarchy::Hierarchy;

/// Row-major matrix of attribute codes.
#[derive(Debug, Clone)]
pub struct DataMatrix {
    rows: usize,
    cols: usize,
    cells: Vec<u32>,
}

impl DataMatrix {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![0; rows * cols],
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.cells[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: u32) {
        self.cells[row * self.cols + col] = value;
    }

    /// Borrow one full row of codes.
    #[inline]
    pub fn row(&self, row: usize) -> &[u32] {
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }
}

/// Fully encoded dataset with attribute metadata and hierarchies.
#[derive(Debug)]
pub struct Dataset {
    matrix: DataMatrix,
    attributes: Vec<Attribute>,
    dictionaries: Vec<Dictionary>,
    hierarchies: Vec<Option<Hierarchy>>,
    qi_indices: Vec<usize>,
    sensitive_index: Option<usize>,
}

impl Dataset {
    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::default()
    }

    pub fn matrix(&self) -> &DataMatrix {
        &self.matrix
    }

    pub fn rows(&self) -> usize {
        self.matrix.rows()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn dictionary(&self, attribute: usize) -> &Dictionary {
        &self.dictionaries[attribute]
    }

    pub fn hierarchy(&self, attribute: usize) -> Option<&Hierarchy> {
        self.hierarchies[attribute].as_ref()
    }

    /// Column indices of quasi-identifying attributes, in declaration order.
    pub fn quasi_identifiers(&self) -> &[usize] {
        &self.qi_indices
    }

    /// Column index of the sensitive attribute, if one is declared.
    pub fn sensitive_attribute(&self) -> Option<usize> {
        self.sensitive_index
    }

    /// Hierarchy heights of the quasi-identifiers, in `quasi_identifiers()` order.
    pub fn qi_heights(&self) -> Vec<usize> {
        self.qi_indices
            .iter()
            .map(|&qi| {
                self.hierarchies[qi]
                    .as_ref()
                    .expect("quasi-identifier validated to carry a hierarchy")
                    .height()
            })
            .collect()
    }
}

/// Builder that encodes string rows into a [`Dataset`].
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    attributes: Vec<Attribute>,
    hierarchy_materials: Vec<Option<Vec<Vec<String>>>>,
    rows: Vec<Vec<String>>,
}

impl DatasetBuilder {
    /// Declares an attribute without a hierarchy.
    pub fn attribute(mut self, name: impl Into<String>, role: AttributeRole) -> Self {
        self.attributes.push(Attribute::new(name, role));
        self.hierarchy_materials.push(None);
        self
    }

    /// Declares an attribute with its generalization hierarchy.
    ///
    /// `rows` holds one string sequence per distinct input value:
    /// `[value, level-1 generalization, ..., top]`. All sequences must
    /// have the same length (the hierarchy height).
    pub fn attribute_with_hierarchy(
        mut self,
        name: impl Into<String>,
        role: AttributeRole,
        rows: Vec<Vec<String>>,
    ) -> Self {
        self.attributes.push(Attribute::new(name, role));
        self.hierarchy_materials.push(Some(rows));
        self
    }

    /// Appends a data row of raw string values.
    pub fn row<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    /// Appends many data rows.
    pub fn rows<I, R, S>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for row in rows {
            self.rows.push(row.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Encodes the rows and validates the configuration.
    ///
    /// Fails fast on the configuration errors the engine treats as
    /// fatal: a quasi-identifier without a hierarchy, more than one
    /// sensitive attribute, ragged rows, and data values missing from a
    /// hierarchy.
    pub fn build(self) -> Result<Dataset> {
        let cols = self.attributes.len();
        if cols == 0 {
            return Err(VeilError::InvalidConfiguration(
                "dataset has no attributes".into(),
            ));
        }

        let mut qi_indices = Vec::new();
        let mut sensitive_index = None;
        for (i, attr) in self.attributes.iter().enumerate() {
            match attr.role {
                AttributeRole::QuasiIdentifying => {
                    if self.hierarchy_materials[i].is_none() {
                        return Err(VeilError::MissingHierarchy(attr.name.clone()));
                    }
                    qi_indices.push(i);
                }
                AttributeRole::Sensitive => {
                    if sensitive_index.is_some() {
                        return Err(VeilError::InvalidConfiguration(
                            "more than one sensitive attribute declared".into(),
                        ));
                    }
                    sensitive_index = Some(i);
                }
                _ => {}
            }
        }
        if qi_indices.is_empty() {
            return Err(VeilError::InvalidConfiguration(
                "dataset has no quasi-identifying attributes".into(),
            ));
        }

        // Intern hierarchy materials first so level-0 codes are dense
        // and equal to the hierarchy row indices.
        let mut dictionaries: Vec<Dictionary> = (0..cols).map(|_| Dictionary::new()).collect();
        let mut hierarchies: Vec<Option<Hierarchy>> = vec![None; cols];

        for (i, material) in self.hierarchy_materials.iter().enumerate() {
            let Some(material) = material else { continue };
            let dict = &mut dictionaries[i];
            for row in material {
                if let Some(first) = row.first() {
                    dict.register(first);
                }
            }
            let mut code_rows = Vec::with_capacity(material.len());
            for row in material {
                code_rows.push(row.iter().map(|s| dict.register(s)).collect::<Vec<_>>());
            }
            hierarchies[i] = Some(Hierarchy::from_rows(&self.attributes[i].name, &code_rows)?);
        }

        // Encode the data rows.
        let mut matrix = DataMatrix::new(self.rows.len(), cols);
        for (r, row) in self.rows.iter().enumerate() {
            if row.len() != cols {
                return Err(VeilError::RaggedRow {
                    row: r,
                    actual: row.len(),
                    expected: cols,
                });
            }
            for (c, value) in row.iter().enumerate() {
                let code = if hierarchies[c].is_some() {
                    // Hierarchy-backed columns only accept covered values.
                    dictionaries[c].probe(value).ok_or_else(|| {
                        VeilError::ValueNotCovered {
                            attribute: self.attributes[c].name.clone(),
                            value: value.clone(),
                        }
                    })?
                } else {
                    dictionaries[c].register(value)
                };
                // A covered value must map into the hierarchy table.
                if let Some(h) = &hierarchies[c] {
                    if (code as usize) >= h.num_values() {
                        return Err(VeilError::ValueNotCovered {
                            attribute: self.attributes[c].name.clone(),
                            value: value.clone(),
                        });
                    }
                }
                matrix.set(r, c, code);
            }
        }

        for dict in &mut dictionaries {
            dict.finalize();
        }

        Ok(Dataset {
            matrix,
            attributes: self.attributes,
            dictionaries,
            hierarchies,
            qi_indices,
            sensitive_index,
        })
    }
}
