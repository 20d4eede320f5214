// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Exact boundary-surface kernel built on BSP polygon booleans

use super::{mesh_polygons, place, CsgKernel};
use crate::csg::CsgOp;
use crate::error::{CsgError, Result};
use crate::geometry::polygon::polygons_volume;
use crate::geometry::{bsp, topology, Mesh, Polygon, Triangle, Vertex};
use nalgebra::Matrix4;

/// Polyhedral boundary surface
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExactSolid {
    pub polygons: Vec<Polygon>,
    /// Whether the surface bounded a volume when it was built
    pub closed: bool,
}

impl ExactSolid {
    pub fn from_mesh(mesh: &Mesh) -> Self {
        Self {
            polygons: mesh_polygons(mesh),
            closed: topology::mesh_is_closed(mesh),
        }
    }

    pub fn volume(&self) -> f64 {
        polygons_volume(&self.polygons)
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Triangulated copy of the surface
    pub fn to_mesh(&self) -> Mesh {
        let mut mesh = Mesh::new();
        for poly in &self.polygons {
            for corners in poly.triangles() {
                let base = mesh.vertex_count();
                for p in corners {
                    mesh.add_vertex(Vertex::new(p, poly.plane.normal));
                }
                mesh.add_triangle(Triangle::new([base, base + 1, base + 2]));
            }
        }
        mesh
    }
}

/// Kernel producing [`ExactSolid`] values
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactKernel;

impl ExactKernel {
    pub fn new() -> Self {
        Self
    }
}

impl CsgKernel for ExactKernel {
    type Native = ExactSolid;

    fn name(&self) -> &'static str {
        "exact"
    }

    fn convert(&self, mesh: &Mesh, transform: &Matrix4<f64>) -> Result<ExactSolid> {
        let placed = place(mesh, transform)?;
        Ok(ExactSolid::from_mesh(&placed))
    }

    fn merge(&self, dst: &mut ExactSolid, src: ExactSolid, op: CsgOp) -> Result<()> {
        // BSP classification is meaningless on open surfaces
        if !dst.closed || !src.closed {
            return Err(CsgError::NotClosed);
        }

        let a = dst.polygons.clone();
        let polygons = match op {
            CsgOp::Union => bsp::union(a, src.polygons),
            CsgOp::Difference => bsp::difference(a, src.polygons),
            CsgOp::Intersection => bsp::intersection(a, src.polygons),
        };

        if polygons.iter().any(|p| !p.vertices.iter().all(|v| v.coords.iter().all(|c| c.is_finite()))) {
            return Err(CsgError::Numerical(format!("{:?} produced non-finite vertices", op)));
        }

        dst.polygons = polygons;
        Ok(())
    }

    fn is_empty(&self, native: &ExactSolid) -> bool {
        native.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn shifted_cube(offset: f64) -> ExactSolid {
        let transform = Matrix4::new_translation(&Vector3::new(offset, offset, offset));
        ExactKernel.convert(&Primitive::unit_cube(), &transform).unwrap()
    }

    #[test]
    fn test_exact_union_volume() {
        let mut dst = shifted_cube(0.0);
        ExactKernel.merge(&mut dst, shifted_cube(0.5), CsgOp::Union).unwrap();
        assert_relative_eq!(dst.volume(), 1.875, epsilon = 1e-9);
    }

    #[test]
    fn test_exact_intersection_volume() {
        let mut dst = shifted_cube(0.0);
        ExactKernel.merge(&mut dst, shifted_cube(0.5), CsgOp::Intersection).unwrap();
        assert_relative_eq!(dst.volume(), 0.125, epsilon = 1e-9);
    }

    #[test]
    fn test_open_operand_is_rejected_unchanged() {
        let mut open = Primitive::unit_cube();
        open.triangles.pop();
        let mut dst = shifted_cube(0.0);
        let before = dst.clone();

        let src = ExactKernel.convert(&open, &Matrix4::identity()).unwrap();
        assert!(matches!(ExactKernel.merge(&mut dst, src, CsgOp::Union), Err(CsgError::NotClosed)));
        assert_eq!(dst, before);
    }

    #[test]
    fn test_to_mesh_preserves_volume() {
        let solid = shifted_cube(0.0);
        assert_relative_eq!(solid.to_mesh().signed_volume(), 1.0, epsilon = 1e-12);
    }
}
