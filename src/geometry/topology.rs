// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Surface topology checks keyed on exact vertex positions

use super::Mesh;
use ahash::AHashMap;
use nalgebra::Point3;

/// Hashable bit pattern of a position (`-0.0` folds onto `0.0`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointKey([u64; 3]);

impl From<&Point3<f64>> for PointKey {
    fn from(p: &Point3<f64>) -> Self {
        Self([
            (p.x + 0.0).to_bits(),
            (p.y + 0.0).to_bits(),
            (p.z + 0.0).to_bits(),
        ])
    }
}

/// Count directed edges of a set of face loops
fn directed_edges<'a>(faces: impl IntoIterator<Item = &'a [Point3<f64>]>) -> AHashMap<(PointKey, PointKey), u32> {
    let mut edges = AHashMap::new();
    for face in faces {
        let n = face.len();
        for i in 0..n {
            let a = PointKey::from(&face[i]);
            let b = PointKey::from(&face[(i + 1) % n]);
            if a != b {
                *edges.entry((a, b)).or_insert(0) += 1;
            }
        }
    }
    edges
}

/// Check if face loops form a closed, consistently oriented surface
///
/// Every directed edge must appear once and be matched by exactly one
/// opposite edge.
pub fn is_closed<'a>(faces: impl IntoIterator<Item = &'a [Point3<f64>]>) -> bool {
    let edges = directed_edges(faces);
    edges
        .iter()
        .all(|(&(a, b), &count)| count == 1 && edges.get(&(b, a)) == Some(&1))
}

/// Closedness of a triangle mesh, independent of vertex welding
pub fn mesh_is_closed(mesh: &Mesh) -> bool {
    let triangles: Vec<[Point3<f64>; 3]> = mesh
        .triangles
        .iter()
        .map(|t| mesh.triangle_positions(t))
        .collect();
    is_closed(triangles.iter().map(|t| &t[..]))
}
