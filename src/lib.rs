// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe CSG
//!
//! Evaluates flat, stack-annotated sequences of boolean parts. Each part is
//! converted in parallel into the native representation of one of four
//! interchangeable kernels (exact surface, approximate cut, voxel, planar
//! slice) and then folded left to right through a frame stack that models
//! parenthesised sub-expressions.

pub mod config;
pub mod csg;
pub mod error;
pub mod geometry;
pub mod kernel;

pub use config::CsgConfig;
pub use csg::{
    copy_parts_deep, copy_parts_shallow, merge_into, validate_all, CsgOp, CsgPart, Evaluator, FailReason, MeshRef,
    PartFailure, StackOp, ValidationReport,
};
pub use error::CsgError;
pub use geometry::{Mesh, Primitive};
pub use kernel::{CsgKernel, CutKernel, ExactKernel, SliceKernel, VoxelKernel};

/// Evaluate a part sequence with `kernel`, dropping unusable operands
pub fn reduce<K: CsgKernel>(parts: &[CsgPart<'_>], kernel: &K) -> Option<K::Native> {
    csg::reduce(kernel, parts)
}

/// Check every part before evaluation; returns the first failure
pub fn validate<K: CsgKernel>(parts: &[CsgPart<'_>], kernel: &K) -> Result<(), PartFailure> {
    csg::validate(kernel, parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix4, Vector3};

    #[test]
    fn test_basic_union() {
        let parts = vec![
            CsgPart::new(Primitive::unit_cube()),
            CsgPart::new(Primitive::unit_cube())
                .with_transform(Matrix4::new_translation(&Vector3::new(2.0, 0.0, 0.0))),
        ];
        let result = reduce(&parts, &ExactKernel).unwrap();
        assert!((result.volume() - 2.0).abs() < 1e-9);
    }
}
