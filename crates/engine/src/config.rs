//! Vector index configuration via `vector.toml`
//!
//! Same model as the database's `strata.toml`: a commented default file is
//! written next to the data on first open, and settings are changed by editing
//! it. Every field has a default, so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::path::Path;
use strata_core::StrataError;

use crate::vector::buffer::BufferGrowth;
use crate::vector::error::{VectorError, VectorResult};
use crate::vector::types::VectorOptions;

/// Config file name placed in the data directory.
pub const CONFIG_FILE_NAME: &str = "vector.toml";

/// Growth policy of search and registration buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BufferGrowthKind {
    /// Double every time
    #[default]
    Doubling,
    /// Double while small, then x1.5, then x1.25
    Tiered,
}

/// Vector index configuration loaded from `vector.toml`.
///
/// # Example
///
/// ```toml
/// seed = 454
/// number_of_edges = 16
/// number_of_candidates = 64
/// buffer_growth = "doubling"
/// initial_buffer_size = 64
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    /// Base seed for layer assignment
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Default maximum out-degree for new fields
    #[serde(default = "default_edges")]
    pub number_of_edges: usize,
    /// Default construction beam width for new fields
    #[serde(default = "default_candidates")]
    pub number_of_candidates: usize,
    /// Buffer growth policy
    #[serde(default)]
    pub buffer_growth: BufferGrowthKind,
    /// First capacity of a buffer, in elements
    #[serde(default = "default_initial_buffer_size")]
    pub initial_buffer_size: usize,
}

fn default_seed() -> u64 {
    454
}

fn default_edges() -> usize {
    16
}

fn default_candidates() -> usize {
    64
}

fn default_initial_buffer_size() -> usize {
    64
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            number_of_edges: default_edges(),
            number_of_candidates: default_candidates(),
            buffer_growth: BufferGrowthKind::default(),
            initial_buffer_size: default_initial_buffer_size(),
        }
    }
}

impl VectorIndexConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// `InvalidOptions` if the default graph parameters would be rejected by
    /// `VectorOptions::validate`, or the initial buffer size is zero.
    pub fn validate(&self) -> VectorResult<()> {
        VectorOptions::with_defaults(self).validate()?;
        if self.initial_buffer_size == 0 {
            return Err(VectorError::invalid_options(
                "initial_buffer_size must be positive",
            ));
        }
        Ok(())
    }

    /// Buffer growth policy for new sessions
    pub fn buffer_growth(&self) -> BufferGrowth {
        match self.buffer_growth {
            BufferGrowthKind::Doubling => BufferGrowth::Doubling(self.initial_buffer_size),
            BufferGrowthKind::Tiered => BufferGrowth::Tiered(self.initial_buffer_size),
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Strata vector index configuration
#
# Base seed for HNSW layer assignment. Each registration session mixes it
# with the field's node count, so replaying the same inserts rebuilds the
# same graph.
seed = 454

# Defaults for fields created with VectorOptions::with_defaults
#   number_of_edges      = max neighbors per node per layer (2..=512)
#   number_of_candidates = beam width while building the graph
number_of_edges = 16
number_of_candidates = 64

# Result buffer growth: "doubling" (default) or "tiered"
#   "tiered" = x2 below 4096 elements, x1.5 below 65536, x1.25 above
buffer_growth = "doubling"
initial_buffer_size = 64
"#
    }

    /// Parse and validate config text.
    pub fn from_toml_str(content: &str) -> VectorResult<Self> {
        let config: VectorIndexConfig = toml::from_str(content)
            .map_err(|e| VectorError::invalid_options(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> VectorResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StrataError::internal(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: VectorIndexConfig = toml::from_str(&content).map_err(|e| {
            VectorError::invalid_options(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> VectorResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                StrataError::internal(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> VectorResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StrataError::internal(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            StrataError::internal(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(())
    }
}
