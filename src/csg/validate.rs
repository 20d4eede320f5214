// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Pre-flight validation of a part sequence

use super::{CsgPart, StackOp};
use crate::error::Result;
use crate::geometry::{intersection, topology};
use crate::kernel::{guard, place, CsgKernel};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Why a part cannot take part in evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailReason {
    MeshEmpty,
    NotBoundAVolume,
    SelfIntersect,
}

impl FailReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailReason::MeshEmpty => "mesh is empty",
            FailReason::NotBoundAVolume => "mesh does not bound a volume",
            FailReason::SelfIntersect => "mesh self-intersects",
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First failing check of one part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("part {index} ({name}): {reason}")]
pub struct PartFailure {
    pub reason: FailReason,
    pub index: usize,
    pub name: String,
}

/// Outcome of checking every part
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Parts that were checked, i.e. all but push and pop markers
    pub checked: usize,
    /// Failures in sequence order
    pub failures: Vec<PartFailure>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn first(&self) -> Option<&PartFailure> {
        self.failures.first()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Smallest enclosed volume treated as a real solid
const MIN_VOLUME: f64 = 1e-12;

fn run_checks<K: CsgKernel>(kernel: &K, part: &CsgPart<'_>) -> Result<Option<FailReason>> {
    let Some(mesh) = part.mesh() else {
        // Only a group marker may come without a shape
        return Ok((part.stack_op == StackOp::Continue).then_some(FailReason::MeshEmpty));
    };

    // Surface checks run on the placed input so every kernel reports alike
    let placed = place(mesh, &part.transform)?;
    if placed.is_empty() {
        return Ok(Some(FailReason::MeshEmpty));
    }
    if !topology::mesh_is_closed(&placed) || placed.signed_volume() <= MIN_VOLUME {
        return Ok(Some(FailReason::NotBoundAVolume));
    }
    let triangles: Vec<_> = placed
        .triangles
        .iter()
        .map(|t| placed.triangle_positions(t))
        .collect();
    if intersection::has_self_intersections(&triangles) {
        return Ok(Some(FailReason::SelfIntersect));
    }

    // A valid surface can still leave nothing behind, e.g. a slice stack
    // whose heights all miss the shape
    let native = kernel.convert(mesh, &part.transform)?;
    Ok(kernel.is_empty(&native).then_some(FailReason::MeshEmpty))
}

/// Check one part; a shapeless part is valid only as a push or pop marker
pub fn check_part<K: CsgKernel>(kernel: &K, part: &CsgPart<'_>) -> Option<FailReason> {
    guard(|| run_checks(kernel, part)).unwrap_or_else(|err| {
        debug!(name = %part.name, error = %err, "conversion failed during validation");
        Some(FailReason::MeshEmpty)
    })
}

/// Report the lowest-index failing part, if any
pub fn validate<K: CsgKernel>(kernel: &K, parts: &[CsgPart<'_>]) -> std::result::Result<(), PartFailure> {
    let failure = parts.par_iter().enumerate().find_map_first(|(index, part)| {
        check_part(kernel, part).map(|reason| PartFailure {
            reason,
            index,
            name: part.name.clone(),
        })
    });

    match failure {
        Some(failure) => Err(failure),
        None => Ok(()),
    }
}

/// Check every part and collect all failures
pub fn validate_all<K: CsgKernel>(kernel: &K, parts: &[CsgPart<'_>]) -> ValidationReport {
    let failures = parts
        .par_iter()
        .enumerate()
        .filter_map(|(index, part)| {
            check_part(kernel, part).map(|reason| PartFailure {
                reason,
                index,
                name: part.name.clone(),
            })
        })
        .collect();

    ValidationReport {
        checked: parts
            .iter()
            .filter(|p| !p.is_marker() || p.stack_op == StackOp::Continue)
            .count(),
        failures,
    }
}
