use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::axons::{BiasFormat, BiasVector, LayoutSizeMismatch, WeightsFormat, WeightsMatrix};

/// A bag of named flat parameter blobs, as exported by other tools. Layer
/// parameters live under the conventional keys `layer{N}Weights` and
/// `layer{N}Biases`, with `N` the one-based layer position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightStore {
    values: HashMap<String, Vec<f32>>,
}

impl WeightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: HashMap<String, Vec<f32>>) -> Self {
        Self { values }
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open weight store {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to deserialize weight store {}", path.display()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create weight store {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .with_context(|| format!("Failed to serialize weight store {}", path.display()))?;
        Ok(())
    }

    pub fn insert(&mut self, key: impl Into<String>, values: Vec<f32>) {
        self.values.insert(key.into(), values);
    }

    pub fn get(&self, key: &str) -> Option<&[f32]> {
        self.values.get(key).map(Vec::as_slice)
    }

    /// The weights blob of the layer at one-based position `layer`,
    /// interpreted as a `rows` by `cols` row-major matrix.
    pub fn layer_weights(
        &self,
        layer: usize,
        rows: usize,
        cols: usize,
        format: WeightsFormat,
    ) -> Result<WeightsMatrix, StoreError> {
        let key = format!("layer{}Weights", layer);
        let values = self
            .values
            .get(&key)
            .ok_or_else(|| StoreError::MissingEntry { key: key.clone() })?;
        WeightsMatrix::from_row_major(values.clone(), rows, cols, format)
            .map_err(|source| StoreError::Layout { key, source })
    }

    /// The bias blob of the layer at one-based position `layer`.
    pub fn layer_biases(
        &self,
        layer: usize,
        rows: usize,
        format: BiasFormat,
    ) -> Result<BiasVector, StoreError> {
        let key = format!("layer{}Biases", layer);
        let values = self
            .values
            .get(&key)
            .ok_or_else(|| StoreError::MissingEntry { key: key.clone() })?;
        BiasVector::from_row_major(values.clone(), rows, format)
            .map_err(|source| StoreError::Layout { key, source })
    }
}

#[derive(Debug)]
pub enum StoreError {
    MissingEntry { key: String },
    /// A blob was present but its length doesn't fit the requested layout.
    Layout {
        key: String,
        source: LayoutSizeMismatch,
    },
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Layout { source, .. } => Some(source),
            StoreError::MissingEntry { .. } => None,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::MissingEntry { key } => {
                f.write_fmt(format_args!("The weight store has no entry '{}'", key))
            }
            StoreError::Layout { key, source } => f.write_fmt(format_args!(
                "The blob under '{}' does not fit the requested layout: {}",
                key, source
            )),
        }
    }
}
