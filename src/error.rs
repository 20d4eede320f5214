// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types for kernel conversion, merging and evaluation

use crate::csg::PartFailure;
use thiserror::Error;

/// Failure raised by a kernel or by the evaluator
#[derive(Debug, Error)]
pub enum CsgError {
    #[error("triangle {triangle} references missing vertex {index}")]
    InvalidIndex { triangle: usize, index: usize },

    #[error("mesh contains non-finite coordinates")]
    NonFinite,

    #[error("operand does not bound a closed volume")]
    NotClosed,

    #[error("voxel pitch mismatch: {expected} vs {found}")]
    PitchMismatch { expected: f64, found: f64 },

    #[error("slice levels differ: {expected} vs {found}")]
    LevelMismatch { expected: usize, found: usize },

    #[error("kernel panicked: {0}")]
    KernelPanic(String),

    #[error("numerical failure: {0}")]
    Numerical(String),

    #[error("evaluation interrupted")]
    Interrupted,

    #[error("validation failed: {0}")]
    Validation(#[from] PartFailure),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, CsgError>;
