// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Self-intersection detection for triangle soups

use super::topology::PointKey;
use super::BoundingBox;
use nalgebra::Point3;
use rayon::prelude::*;

const EPSILON: f64 = 1e-9;

/// Test if a segment touches a triangle (Möller-Trumbore, inclusive bounds)
pub fn segment_hits_triangle(start: &Point3<f64>, end: &Point3<f64>, triangle: &[Point3<f64>; 3]) -> bool {
    let direction = end - start;
    let edge1 = triangle[1] - triangle[0];
    let edge2 = triangle[2] - triangle[0];

    let h = direction.cross(&edge2);
    let det = edge1.dot(&h);
    // Parallel or coplanar
    if det.abs() < EPSILON * direction.norm() * edge1.norm().max(edge2.norm()) {
        return false;
    }

    let inv_det = 1.0 / det;
    let s = start - triangle[0];
    let u = inv_det * s.dot(&h);
    if !(-EPSILON..=1.0 + EPSILON).contains(&u) {
        return false;
    }

    let q = s.cross(&edge1);
    let v = inv_det * direction.dot(&q);
    if v < -EPSILON || u + v > 1.0 + EPSILON {
        return false;
    }

    let t = inv_det * edge2.dot(&q);
    (-EPSILON..=1.0 + EPSILON).contains(&t)
}

/// Whether two triangles that share no corner touch anywhere
pub fn triangles_touch(a: &[Point3<f64>; 3], b: &[Point3<f64>; 3]) -> bool {
    (0..3).any(|i| segment_hits_triangle(&a[i], &a[(i + 1) % 3], b))
        || (0..3).any(|i| segment_hits_triangle(&b[i], &b[(i + 1) % 3], a))
}

fn share_corner(a: &[Point3<f64>; 3], b: &[Point3<f64>; 3]) -> bool {
    a.iter()
        .any(|p| b.iter().any(|q| PointKey::from(p) == PointKey::from(q)))
}

/// True when two non-adjacent triangles of the soup touch
///
/// Triangles sharing a corner position are treated as neighbours and never
/// tested against each other. Candidate pairs come from a sweep over the
/// x extent of each triangle's bounding box.
pub fn has_self_intersections(triangles: &[[Point3<f64>; 3]]) -> bool {
    let boxes: Vec<BoundingBox> = triangles
        .iter()
        .map(|t| BoundingBox::from_points(t).inflated(EPSILON))
        .collect();

    let mut order: Vec<usize> = (0..triangles.len()).collect();
    order.sort_by(|&a, &b| boxes[a].min.x.total_cmp(&boxes[b].min.x));

    order.par_iter().enumerate().any(|(rank, &i)| {
        order[rank + 1..]
            .iter()
            .take_while(|&&j| boxes[j].min.x <= boxes[i].max.x)
            .any(|&j| {
                boxes[i].overlaps(&boxes[j])
                    && !share_corner(&triangles[i], &triangles[j])
                    && triangles_touch(&triangles[i], &triangles[j])
            })
    })
}
