// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Indexed triangle mesh used as the immutable input shape of a CSG part

use super::BoundingBox;
use crate::error::CsgError;
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Vertex with position and normal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
}

impl Vertex {
    pub fn new(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self { position, normal }
    }
}

/// Triangle defined by three vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triangle {
    pub indices: [usize; 3],
}

impl Triangle {
    pub fn new(indices: [usize; 3]) -> Self {
        Self { indices }
    }
}

/// Triangular mesh with shared vertices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self::new()
    }

    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            triangles: Vec::with_capacity(triangle_count),
        }
    }

    /// Build a mesh from raw positions and index triples
    pub fn from_indexed(positions: &[Point3<f64>], indices: &[[usize; 3]]) -> Self {
        let mut mesh = Self::with_capacity(positions.len(), indices.len());
        for p in positions {
            mesh.add_vertex(Vertex::new(*p, Vector3::zeros()));
        }
        for tri in indices {
            mesh.add_triangle(Triangle::new(*tri));
        }
        mesh.recompute_normals();
        mesh
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, vertex: Vertex) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Transform all vertices by a matrix in place
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        // Normals use the inverse transpose; computed once for the whole mesh
        let normal_matrix = matrix
            .try_inverse()
            .map(|m| m.transpose())
            .unwrap_or(*matrix);

        for vertex in &mut self.vertices {
            vertex.position = matrix.transform_point(&vertex.position);
            let n = normal_matrix.transform_vector(&vertex.normal);
            vertex.normal = n.try_normalize(1e-12).unwrap_or(n);
        }

        // Mirroring flips orientation; restore outward winding
        if matrix.fixed_view::<3, 3>(0, 0).into_owned().determinant() < 0.0 {
            for tri in &mut self.triangles {
                tri.indices.swap(1, 2);
            }
        }
    }

    /// Return a transformed copy, leaving `self` untouched
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Mesh {
        let mut copy = self.clone();
        copy.transform(matrix);
        copy
    }

    /// Check index bounds and coordinate finiteness
    pub fn check(&self) -> Result<(), CsgError> {
        if self
            .vertices
            .iter()
            .any(|v| !v.position.coords.iter().all(|c| c.is_finite()))
        {
            return Err(CsgError::NonFinite);
        }

        for (triangle, tri) in self.triangles.iter().enumerate() {
            if let Some(&index) = tri.indices.iter().find(|&&i| i >= self.vertices.len()) {
                return Err(CsgError::InvalidIndex { triangle, index });
            }
        }

        Ok(())
    }

    /// Corner positions of a triangle
    pub fn triangle_positions(&self, triangle: &Triangle) -> [Point3<f64>; 3] {
        [
            self.vertices[triangle.indices[0]].position,
            self.vertices[triangle.indices[1]].position,
            self.vertices[triangle.indices[2]].position,
        ]
    }

    /// Compute bounding box
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.vertices.iter().map(|v| &v.position))
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Append another mesh without any boolean processing
    pub fn merge(&mut self, other: &Mesh) {
        let offset = self.vertices.len();
        self.vertices.extend_from_slice(&other.vertices);

        for triangle in &other.triangles {
            self.triangles.push(Triangle::new([
                triangle.indices[0] + offset,
                triangle.indices[1] + offset,
                triangle.indices[2] + offset,
            ]));
        }
    }

    /// Signed volume enclosed by the surface (positive for outward winding)
    pub fn signed_volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|tri| {
                let [a, b, c] = self.triangle_positions(tri);
                a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
            })
            .sum()
    }

    /// Recompute vertex normals from triangle geometry
    pub fn recompute_normals(&mut self) {
        let mut sums: Vec<Vector3<f64>> = vec![Vector3::zeros(); self.vertices.len()];

        for tri in &self.triangles {
            if tri.indices.iter().any(|&i| i >= self.vertices.len()) {
                continue;
            }
            let [a, b, c] = self.triangle_positions(tri);
            // Area weighted
            let face_normal = (b - a).cross(&(c - a));
            for &idx in &tri.indices {
                sums[idx] += face_normal;
            }
        }

        for (vertex, sum) in self.vertices.iter_mut().zip(sums) {
            vertex.normal = sum.try_normalize(1e-12).unwrap_or_else(Vector3::z);
        }
    }
}
