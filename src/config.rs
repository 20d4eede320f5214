// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Evaluation configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default file read by [`CsgConfig::load`]
pub const CONFIG_FILE: &str = "csg.toml";

/// Evaluation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsgConfig {
    /// Conversion worker threads (`None` uses the global rayon pool)
    pub threads: Option<usize>,
    /// Edge length of a voxel cell
    pub voxel_pitch: f64,
    /// Slice polygons below this area are dropped by the finishing pass
    pub slice_min_area: f64,
}

impl Default for CsgConfig {
    fn default() -> Self {
        Self {
            threads: None,
            voxel_pitch: 0.1,
            slice_min_area: 1e-6,
        }
    }
}

impl CsgConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: CsgConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if PathBuf::from(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `CSG_*` overrides; a value that does not parse is an error
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(threads) = lookup("CSG_THREADS") {
            self.threads = Some(
                threads
                    .parse()
                    .with_context(|| format!("Invalid CSG_THREADS: {}", threads))?,
            );
        }

        if let Some(pitch) = lookup("CSG_VOXEL_PITCH") {
            self.voxel_pitch = pitch
                .parse()
                .with_context(|| format!("Invalid CSG_VOXEL_PITCH: {}", pitch))?;
        }

        if let Some(area) = lookup("CSG_SLICE_MIN_AREA") {
            self.slice_min_area = area
                .parse()
                .with_context(|| format!("Invalid CSG_SLICE_MIN_AREA: {}", area))?;
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }
}
