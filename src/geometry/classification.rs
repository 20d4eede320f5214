// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Point and fragment classification against closed surfaces
//!
//! Uses the generalized winding number (sum of signed solid angles), which
//! stays well defined for slightly open or self-overlapping input where ray
//! casting gives parity noise.

use super::polygon::Polygon;
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Winding numbers above this are inside
pub const INSIDE_THRESHOLD: f64 = 0.5;

/// Classification of a face fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Fragment is inside the other solid
    Inside,
    /// Fragment is outside the other solid
    Outside,
    /// Fragment lies on a face of the other solid
    OnBoundary { same_facing: bool },
}

/// Signed solid angle of triangle `abc` seen from `p` (Van Oosterom-Strackee)
pub fn solid_angle(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let (a, b, c) = (a - p, b - p, c - p);
    let (la, lb, lc) = (a.norm(), b.norm(), c.norm());
    let numerator = a.dot(&b.cross(&c));
    let denominator = la * lb * lc + a.dot(&b) * lc + a.dot(&c) * lb + b.dot(&c) * la;
    2.0 * numerator.atan2(denominator)
}

/// Generalized winding number of a triangle soup around `point`
pub fn winding_number<'a>(point: &Point3<f64>, triangles: impl IntoIterator<Item = &'a [Point3<f64>; 3]>) -> f64 {
    let total: f64 = triangles
        .into_iter()
        .map(|[a, b, c]| solid_angle(point, a, b, c))
        .sum();
    total / (4.0 * PI)
}

/// Winding number around `point` of a set of convex polygons
pub fn polygon_winding_number(point: &Point3<f64>, polygons: &[Polygon]) -> f64 {
    let total: f64 = polygons
        .iter()
        .flat_map(|poly| poly.triangles())
        .map(|[a, b, c]| solid_angle(point, &a, &b, &c))
        .sum();
    total / (4.0 * PI)
}

pub fn is_inside(point: &Point3<f64>, polygons: &[Polygon]) -> bool {
    polygon_winding_number(point, polygons) > INSIDE_THRESHOLD
}

/// Classify a fragment by its interior point and outward normal
pub fn classify_fragment(
    point: &Point3<f64>,
    normal: &Vector3<f64>,
    other: &[Polygon],
    tolerance: f64,
) -> Classification {
    // Coplanar contact wins over the winding test, which is ambiguous there
    if let Some(face) = other
        .iter()
        .find(|face| face.contains_coplanar_point(point, tolerance))
    {
        return Classification::OnBoundary {
            same_facing: face.plane.normal.dot(normal) > 0.0,
        };
    }

    if is_inside(point, other) {
        Classification::Inside
    } else {
        Classification::Outside
    }
}
