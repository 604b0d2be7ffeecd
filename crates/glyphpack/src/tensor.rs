//! Named weight arrays and the ordered collection handed to the encoder

use crate::{PackError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A named, shaped array of finite `f32` values.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArray {
    name: String,
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl NamedArray {
    /// Create a new array, validating name, shape and values.
    pub fn new(name: impl Into<String>, shape: Vec<usize>, values: Vec<f32>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;

        // An overflowing shape can never match a real value count
        let expected = checked_numel(&shape).unwrap_or(usize::MAX);
        if values.len() != expected {
            return Err(PackError::ShapeMismatch {
                name,
                shape,
                expected,
                actual: values.len(),
            });
        }

        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(PackError::NonFiniteValue { name, index });
        }

        Ok(Self {
            name,
            shape,
            values,
        })
    }

    /// Create a rank-1 array.
    pub fn vector(name: impl Into<String>, values: Vec<f32>) -> Result<Self> {
        let len = values.len();
        Self::new(name, vec![len], values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Number of elements
    pub fn numel(&self) -> usize {
        self.values.len()
    }

    /// `(min, max)` over the values, `None` when empty.
    pub fn range(&self) -> Option<(f32, f32)> {
        value_range(&self.values)
    }
}

/// Product of the dimensions, `None` on overflow.
pub(crate) fn checked_numel(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |n, &d| n.checked_mul(d))
}

/// `(min, max)` of a slice, `None` when empty.
pub(crate) fn value_range(values: &[f32]) -> Option<(f32, f32)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// Names travel in a whitespace-separated metadata line.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(PackError::InvalidArrayName(name.to_string()));
    }
    Ok(())
}

/// Ordered set of named arrays. Insertion order is payload order.
#[derive(Debug, Clone, Default)]
pub struct TensorCollection {
    arrays: IndexMap<String, NamedArray>,
}

impl TensorCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an array; names must be unique.
    pub fn insert(&mut self, array: NamedArray) -> Result<()> {
        if self.arrays.contains_key(array.name()) {
            return Err(PackError::DuplicateArray(array.name().to_string()));
        }
        self.arrays.insert(array.name().to_string(), array);
        Ok(())
    }

    /// Builder-style insert.
    pub fn with(mut self, array: NamedArray) -> Result<Self> {
        self.insert(array)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&NamedArray> {
        self.arrays.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedArray> {
        self.arrays.values()
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Total element count over all arrays
    pub fn total_elements(&self) -> usize {
        self.arrays.values().map(NamedArray::numel).sum()
    }

    /// Build from manifest records, preserving their order.
    pub fn from_manifest(manifest: TensorManifest) -> Result<Self> {
        let mut collection = Self::new();
        for record in manifest.arrays {
            // A missing shape means a flat vector
            let shape = record
                .shape
                .unwrap_or_else(|| vec![record.values.len()]);
            collection.insert(NamedArray::new(record.name, shape, record.values)?)?;
        }
        Ok(collection)
    }

    /// Parse a JSON manifest.
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: TensorManifest = serde_json::from_str(json)?;
        Self::from_manifest(manifest)
    }

    /// Convert back to manifest records.
    pub fn to_manifest(&self) -> TensorManifest {
        TensorManifest {
            arrays: self
                .iter()
                .map(|a| ArrayRecord {
                    name: a.name.clone(),
                    shape: Some(a.shape.clone()),
                    values: a.values.clone(),
                })
                .collect(),
        }
    }
}

/// JSON exchange format for a tensor collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TensorManifest {
    pub arrays: Vec<ArrayRecord>,
}

/// One array in a [`TensorManifest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,
    pub values: Vec<f32>,
}
