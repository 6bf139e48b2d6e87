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

//! Attribute roles and definitions

use serde::{Deserialize, Serialize};

/// Role of an attribute during anonymization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeRole {
    /// Generalized along a hierarchy to reduce re-identification risk
    QuasiIdentifying,
    /// Protected by l-diversity / t-closeness; never generalized
    Sensitive,
    /// Carried through unchanged
    Insensitive,
    /// Removed from the output entirely
    Identifying,
}

impl AttributeRole {
    /// Parse a role from its CLI spelling
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "qi" | "quasi-identifying" => Some(Self::QuasiIdentifying),
            "sensitive" => Some(Self::Sensitive),
            "insensitive" => Some(Self::Insensitive),
            "identifying" => Some(Self::Identifying),
            _ => None,
        }
    }
}

/// A named attribute with its role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub role: AttributeRole,
}

impl Attribute {
    pub fn new(name: impl Into<String>, role: AttributeRole) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}
