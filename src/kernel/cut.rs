// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Fast approximate cut-and-classify kernel
//!
//! Each operand's faces are fragmented by the planes of the other operand's
//! crossing faces, every fragment is classified against the other solid by
//! winding number, and the operator picks which fragments survive.

use super::{guard, place, CsgKernel};
use crate::csg::CsgOp;
use crate::error::{CsgError, Result};
use crate::geometry::classification::{classify_fragment, Classification};
use crate::geometry::polygon::PLANE_EPSILON;
use crate::geometry::topology::PointKey;
use crate::geometry::{Mesh, Polygon, Triangle, Vertex};
use ahash::AHashMap;
use nalgebra::{Matrix4, Point3};
use rayon::prelude::*;
use tracing::warn;

/// Polygon mesh in flattened arrays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CutMesh {
    /// xyz triples
    pub coords: Vec<f64>,
    /// Concatenated face loops
    pub face_indices: Vec<u32>,
    /// Loop length of each face
    pub face_sizes: Vec<u32>,
}

impl CutMesh {
    pub fn from_mesh(mesh: &Mesh) -> Self {
        Self {
            coords: mesh
                .vertices
                .iter()
                .flat_map(|v| [v.position.x, v.position.y, v.position.z])
                .collect(),
            face_indices: mesh
                .triangles
                .iter()
                .flat_map(|t| t.indices.map(|i| i as u32))
                .collect(),
            face_sizes: vec![3; mesh.triangles.len()],
        }
    }

    /// Build from polygons, welding identical positions
    pub fn from_polygons(polygons: &[Polygon]) -> Self {
        let mut result = Self::default();
        let mut lookup: AHashMap<PointKey, u32> = AHashMap::new();

        for poly in polygons {
            let mut face: Vec<u32> = Vec::with_capacity(poly.vertices.len());
            for p in &poly.vertices {
                let index = *lookup.entry(PointKey::from(p)).or_insert_with(|| {
                    result.coords.extend_from_slice(&[p.x, p.y, p.z]);
                    (result.coords.len() / 3 - 1) as u32
                });
                if face.last() != Some(&index) {
                    face.push(index);
                }
            }
            while face.len() > 1 && face.first() == face.last() {
                face.pop();
            }
            if face.len() >= 3 {
                result.face_sizes.push(face.len() as u32);
                result.face_indices.extend(face);
            }
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.face_sizes.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.coords.len() / 3
    }

    pub fn face_count(&self) -> usize {
        self.face_sizes.len()
    }

    pub fn point(&self, index: u32) -> Point3<f64> {
        let i = index as usize * 3;
        Point3::new(self.coords[i], self.coords[i + 1], self.coords[i + 2])
    }

    /// Face loops as index slices
    pub fn faces(&self) -> impl Iterator<Item = &[u32]> + '_ {
        self.face_sizes.iter().scan(0usize, move |start, &size| {
            let face = &self.face_indices[*start..*start + size as usize];
            *start += size as usize;
            Some(face)
        })
    }

    fn face_points(&self) -> Vec<Vec<Point3<f64>>> {
        self.faces()
            .map(|face| face.iter().map(|&i| self.point(i)).collect())
            .collect()
    }

    /// Non-degenerate faces as polygons
    pub fn polygons(&self) -> Vec<Polygon> {
        self.face_points().into_iter().filter_map(Polygon::new).collect()
    }

    /// Append faces without any boolean processing
    pub fn append(&mut self, other: &CutMesh) {
        let offset = self.vertex_count() as u32;
        self.coords.extend_from_slice(&other.coords);
        self.face_indices
            .extend(other.face_indices.iter().map(|i| i + offset));
        self.face_sizes.extend_from_slice(&other.face_sizes);
    }

    pub fn volume(&self) -> f64 {
        self.faces()
            .map(|face| {
                let origin = self.point(face[0]);
                (1..face.len().saturating_sub(1))
                    .map(|i| {
                        let (b, c) = (self.point(face[i]), self.point(face[i + 1]));
                        origin.coords.dot(&b.coords.cross(&c.coords)) / 6.0
                    })
                    .sum::<f64>()
            })
            .sum()
    }

    /// Fan-triangulated copy
    pub fn to_mesh(&self) -> Mesh {
        let mut mesh = Mesh::with_capacity(self.vertex_count(), self.face_indices.len());
        for i in 0..self.vertex_count() as u32 {
            mesh.add_vertex(Vertex::new(self.point(i), Default::default()));
        }
        for face in self.faces() {
            for i in 1..face.len().saturating_sub(1) {
                mesh.add_triangle(Triangle::new([
                    face[0] as usize,
                    face[i] as usize,
                    face[i + 1] as usize,
                ]));
            }
        }
        mesh.recompute_normals();
        mesh
    }
}

/// Split every subject polygon along the tool faces that cross it
fn fragment(subject: &[Polygon], tool: &[Polygon]) -> Vec<Polygon> {
    let tool_boxes: Vec<_> = tool.iter().map(|t| t.bounding_box().inflated(PLANE_EPSILON)).collect();

    subject
        .par_iter()
        .flat_map_iter(|poly| {
            let bbox = poly.bounding_box();
            let mut pieces = vec![poly.clone()];

            for (face, face_box) in tool.iter().zip(&tool_boxes) {
                if !bbox.overlaps(face_box) || !poly.plane.touches(&face.vertices) {
                    continue;
                }
                pieces = pieces
                    .into_iter()
                    .flat_map(|piece| {
                        if piece.bounding_box().overlaps(face_box) && face.plane.separates(&piece.vertices) {
                            face.plane.cut(&piece)
                        } else {
                            vec![piece]
                        }
                    })
                    .collect();
            }
            pieces
        })
        .collect()
}

fn classify_all(fragments: &[Polygon], other: &[Polygon]) -> Vec<Classification> {
    fragments
        .par_iter()
        .map(|f| classify_fragment(&f.centroid(), &f.plane.normal, other, PLANE_EPSILON))
        .collect()
}

/// Tri-state boolean selection over fragmented operands
fn cut_boolean(a: &[Polygon], b: &[Polygon], op: CsgOp) -> Result<Vec<Polygon>> {
    let (a_frags, b_frags) = rayon::join(|| fragment(a, b), || fragment(b, a));
    let (a_class, b_class) = rayon::join(|| classify_all(&a_frags, b), || classify_all(&b_frags, a));

    let keep_a = |c: &Classification| match op {
        CsgOp::Union => matches!(c, Classification::Outside | Classification::OnBoundary { same_facing: true }),
        CsgOp::Difference => matches!(c, Classification::Outside | Classification::OnBoundary { same_facing: false }),
        CsgOp::Intersection => matches!(c, Classification::Inside | Classification::OnBoundary { same_facing: true }),
    };
    // Coplanar fragments of the tool are always represented by the subject's copy
    let keep_b = |c: &Classification| match op {
        CsgOp::Union => *c == Classification::Outside,
        CsgOp::Difference | CsgOp::Intersection => *c == Classification::Inside,
    };

    let mut result: Vec<Polygon> = a_frags
        .into_iter()
        .zip(&a_class)
        .filter(|&(_, c)| keep_a(c))
        .map(|(p, _)| p)
        .collect();
    result.extend(
        b_frags
            .into_iter()
            .zip(&b_class)
            .filter(|&(_, c)| keep_b(c))
            .map(|(p, _)| if op == CsgOp::Difference { p.flipped() } else { p }),
    );

    if result.iter().any(|p| p.vertices.iter().any(|v| !v.coords.iter().all(|c| c.is_finite()))) {
        return Err(CsgError::Numerical("cut produced non-finite vertices".to_string()));
    }
    Ok(result)
}

/// Kernel producing [`CutMesh`] values
#[derive(Debug, Clone, Copy, Default)]
pub struct CutKernel;

impl CutKernel {
    pub fn new() -> Self {
        Self
    }
}

impl CsgKernel for CutKernel {
    type Native = CutMesh;

    fn name(&self) -> &'static str {
        "cut"
    }

    fn convert(&self, mesh: &Mesh, transform: &Matrix4<f64>) -> Result<CutMesh> {
        let placed = place(mesh, transform)?;
        Ok(CutMesh::from_mesh(&placed))
    }

    fn merge(&self, dst: &mut CutMesh, src: CutMesh, op: CsgOp) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        if dst.is_empty() && op == CsgOp::Union {
            *dst = src;
            return Ok(());
        }

        let a = dst.polygons();
        let b = src.polygons();
        match guard(|| cut_boolean(&a, &b, op)) {
            Ok(polygons) => {
                *dst = CutMesh::from_polygons(&polygons);
                Ok(())
            }
            Err(err) if op == CsgOp::Union => {
                warn!(error = %err, "cut union failed, concatenating operands");
                dst.append(&src);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn is_empty(&self, native: &CutMesh) -> bool {
        native.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn cube_at(x: f64, y: f64, z: f64) -> CutMesh {
        let transform = Matrix4::new_translation(&Vector3::new(x, y, z));
        CutKernel.convert(&Primitive::unit_cube(), &transform).unwrap()
    }

    #[test]
    fn test_cut_difference_volume() {
        let mut dst = cube_at(0.0, 0.0, 0.0);
        CutKernel.merge(&mut dst, cube_at(0.5, 0.5, 0.5), CsgOp::Difference).unwrap();
        assert_relative_eq!(dst.volume(), 0.875, epsilon = 1e-9);
    }

    #[test]
    fn test_cut_union_of_face_sharing_cubes() {
        let mut dst = cube_at(0.0, 0.0, 0.0);
        CutKernel.merge(&mut dst, cube_at(1.0, 0.0, 0.0), CsgOp::Union).unwrap();
        assert_relative_eq!(dst.volume(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_operands() {
        let mut dst = CutMesh::default();
        CutKernel.merge(&mut dst, cube_at(0.0, 0.0, 0.0), CsgOp::Union).unwrap();
        assert_eq!(dst, cube_at(0.0, 0.0, 0.0));

        let before = dst.clone();
        CutKernel.merge(&mut dst, CutMesh::default(), CsgOp::Intersection).unwrap();
        assert_eq!(dst, before);
    }

    #[test]
    fn test_from_polygons_welds_vertices() {
        let cube = cube_at(0.0, 0.0, 0.0);
        let welded = CutMesh::from_polygons(&cube.polygons());
        assert_eq!(welded.vertex_count(), 8);
        assert_eq!(welded.face_count(), 12);
    }
}
