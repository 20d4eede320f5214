// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Interchangeable geometry kernels driven by the reduction engine
//!
//! A kernel owns one native representation and supplies the two primitives
//! the engine needs: converting a transformed input mesh, and merging one
//! native value into another. Absent operands never reach a kernel; that
//! contract lives in [`crate::csg::merge_into`].

mod cut;
mod exact;
mod slice;
mod voxel;

pub use cut::{CutKernel, CutMesh};
pub use exact::{ExactKernel, ExactSolid};
pub use slice::{LayerStack, SliceKernel};
pub use voxel::{VoxelGrid, VoxelKernel};

use crate::csg::CsgOp;
use crate::error::{CsgError, Result};
use crate::geometry::{Mesh, Polygon};
use nalgebra::Matrix4;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Geometry backend used for one evaluation run
///
/// Implementations write `dst` in [`CsgKernel::merge`] only once the
/// result is complete, so an `Err` (or a caught panic) leaves it unchanged.
pub trait CsgKernel: Sync {
    /// Kernel-native shape representation
    type Native: Send;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Build the native representation of `mesh` placed by `transform`
    fn convert(&self, mesh: &Mesh, transform: &Matrix4<f64>) -> Result<Self::Native>;

    /// Combine `src` into `dst` in place
    fn merge(&self, dst: &mut Self::Native, src: Self::Native, op: CsgOp) -> Result<()>;

    /// Finishing pass applied once to the reduction result
    fn finalize(&self, native: Self::Native) -> Self::Native {
        native
    }

    /// Whether the value holds no geometry
    fn is_empty(&self, native: &Self::Native) -> bool;
}

/// Run a kernel call, mapping a panic to [`CsgError::KernelPanic`]
pub(crate) fn guard<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(CsgError::KernelPanic(panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Validate and place an input mesh, returning a fresh copy
pub(crate) fn place(mesh: &Mesh, transform: &Matrix4<f64>) -> Result<Mesh> {
    mesh.check()?;
    if !transform.iter().all(|c| c.is_finite()) {
        return Err(CsgError::NonFinite);
    }
    Ok(mesh.transformed(transform))
}

/// Non-degenerate triangles of a mesh as polygons
pub(crate) fn mesh_polygons(mesh: &Mesh) -> Vec<Polygon> {
    mesh.triangles
        .iter()
        .filter_map(|tri| Polygon::new(mesh.triangle_positions(tri).to_vec()))
        .collect()
}
