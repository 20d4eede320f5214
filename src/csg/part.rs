// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Flat part sequence: shapes tagged with a boolean operation and a stack op

use crate::geometry::Mesh;
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;

/// How a part's shape combines with the current accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CsgOp {
    #[default]
    Union,
    Difference,
    Intersection,
}

/// Nesting change carried by a part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StackOp {
    /// Open a composite operand; this part's operation applies to the whole group
    Push,
    #[default]
    Continue,
    /// Close the innermost composite operand
    Pop,
}

/// Handle to an input mesh
///
/// Input meshes are never mutated; conversion always works on a transformed
/// copy, so the same mesh may back many parts.
#[derive(Debug, Clone)]
pub enum MeshRef<'a> {
    Owned(Box<Mesh>),
    Shared(Arc<Mesh>),
    Borrowed(&'a Mesh),
}

impl Deref for MeshRef<'_> {
    type Target = Mesh;

    fn deref(&self) -> &Mesh {
        match self {
            MeshRef::Owned(mesh) => mesh,
            MeshRef::Shared(mesh) => mesh,
            MeshRef::Borrowed(mesh) => mesh,
        }
    }
}

impl From<Mesh> for MeshRef<'_> {
    fn from(mesh: Mesh) -> Self {
        MeshRef::Owned(Box::new(mesh))
    }
}

impl From<Arc<Mesh>> for MeshRef<'_> {
    fn from(mesh: Arc<Mesh>) -> Self {
        MeshRef::Shared(mesh)
    }
}

impl<'a> From<&'a Mesh> for MeshRef<'a> {
    fn from(mesh: &'a Mesh) -> Self {
        MeshRef::Borrowed(mesh)
    }
}

/// One element of the flat CSG sequence
#[derive(Debug, Clone)]
pub struct CsgPart<'a> {
    /// `None` for pure push/pop markers
    pub mesh: Option<MeshRef<'a>>,
    pub transform: Matrix4<f64>,
    pub operation: CsgOp,
    pub stack_op: StackOp,
    /// Diagnostic label only
    pub name: String,
}

impl<'a> CsgPart<'a> {
    pub fn new(mesh: impl Into<MeshRef<'a>>) -> Self {
        Self {
            mesh: Some(mesh.into()),
            transform: Matrix4::identity(),
            operation: CsgOp::Union,
            stack_op: StackOp::Continue,
            name: String::new(),
        }
    }

    /// Part without a shape, used only for its stack op
    pub fn marker(operation: CsgOp, stack_op: StackOp) -> Self {
        Self {
            mesh: None,
            transform: Matrix4::identity(),
            operation,
            stack_op,
            name: String::new(),
        }
    }

    pub fn with_operation(mut self, operation: CsgOp) -> Self {
        self.operation = operation;
        self
    }

    pub fn with_stack_op(mut self, stack_op: StackOp) -> Self {
        self.stack_op = stack_op;
        self
    }

    pub fn with_transform(mut self, transform: Matrix4<f64>) -> Self {
        self.transform = transform;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_deref()
    }

    pub fn is_marker(&self) -> bool {
        self.mesh.is_none()
    }
}

/// Copy a sequence as views onto the caller's meshes
pub fn copy_parts_shallow<'a>(parts: &'a [CsgPart<'_>]) -> Vec<CsgPart<'a>> {
    parts
        .iter()
        .map(|part| CsgPart {
            mesh: part.mesh().map(MeshRef::Borrowed),
            transform: part.transform,
            operation: part.operation,
            stack_op: part.stack_op,
            name: part.name.clone(),
        })
        .collect()
}

/// Copy a sequence into independently owned parts
pub fn copy_parts_deep(parts: &[CsgPart<'_>]) -> Vec<CsgPart<'static>> {
    parts
        .iter()
        .map(|part| CsgPart {
            mesh: part.mesh().map(|m| MeshRef::Owned(Box::new(m.clone()))),
            transform: part.transform,
            operation: part.operation,
            stack_op: part.stack_op,
            name: part.name.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;

    #[test]
    fn test_part_builder() {
        let part = CsgPart::new(Primitive::unit_cube())
            .with_operation(CsgOp::Difference)
            .with_stack_op(StackOp::Push)
            .named("hole");

        assert_eq!(part.operation, CsgOp::Difference);
        assert_eq!(part.stack_op, StackOp::Push);
        assert_eq!(part.name, "hole");
        assert!(!part.is_marker());
        assert!(CsgPart::marker(CsgOp::Union, StackOp::Pop).is_marker());
    }

    #[test]
    fn test_shallow_copy_shares_meshes() {
        let shared = Arc::new(Primitive::unit_cube());
        let parts = vec![CsgPart::new(shared.clone()), CsgPart::marker(CsgOp::Union, StackOp::Pop)];

        let copy = copy_parts_shallow(&parts);
        assert!(std::ptr::eq(copy[0].mesh().unwrap(), &*shared));
        assert!(copy[1].mesh().is_none());
    }

    #[test]
    fn test_deep_copy_outlives_source() {
        let copy = {
            let mesh = Primitive::unit_cube();
            let parts = vec![CsgPart::new(&mesh).named("a")];
            copy_parts_deep(&parts)
        };
        assert_eq!(copy[0].name, "a");
        assert_eq!(copy[0].mesh().unwrap().triangle_count(), 12);
    }
}
