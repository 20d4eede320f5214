// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Planar cross-section kernel: one 2D polygon set per slicing height

use super::{place, CsgKernel};
use crate::config::CsgConfig;
use crate::csg::CsgOp;
use crate::error::{CsgError, Result};
use crate::geometry::topology::PointKey;
use crate::geometry::Mesh;
use ahash::AHashMap;
use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon as GeoPolygon};
use nalgebra::{Matrix4, Point3};
use rayon::prelude::*;

/// Cross-sections of one shape at fixed heights
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStack {
    pub heights: Vec<f64>,
    pub levels: Vec<MultiPolygon<f64>>,
}

impl LayerStack {
    pub fn empty(heights: &[f64]) -> Self {
        Self {
            heights: heights.to_vec(),
            levels: vec![MultiPolygon::new(Vec::new()); heights.len()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(|level| level.0.is_empty())
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Enclosed area at one level (0 for an unknown level)
    pub fn area(&self, level: usize) -> f64 {
        self.levels.get(level).map_or(0.0, |mp| mp.unsigned_area())
    }
}

/// Oriented cross-section segment in the XY plane
type Segment = (Coord<f64>, Coord<f64>);

fn coord_key(c: &Coord<f64>) -> (u64, u64) {
    ((c.x + 0.0).to_bits(), (c.y + 0.0).to_bits())
}

/// Crossing point of an edge with the plane `z = height`
///
/// Endpoints are ordered canonically so the two triangles sharing an edge
/// produce bit-identical points.
fn edge_crossing(p: &Point3<f64>, q: &Point3<f64>, height: f64) -> Coord<f64> {
    let (lo, hi) = if PointKey::from(p) <= PointKey::from(q) { (p, q) } else { (q, p) };
    let t = (height - lo.z) / (hi.z - lo.z);
    Coord {
        x: lo.x + (hi.x - lo.x) * t,
        y: lo.y + (hi.y - lo.y) * t,
    }
}

fn triangle_segment(corners: &[Point3<f64>; 3], height: f64) -> Option<Segment> {
    let above = corners.map(|p| p.z >= height);
    if above.iter().all(|&a| a) || above.iter().all(|&a| !a) {
        return None;
    }

    let mut crossings = Vec::with_capacity(2);
    for i in 0..3 {
        let j = (i + 1) % 3;
        if above[i] != above[j] {
            crossings.push(edge_crossing(&corners[i], &corners[j], height));
        }
    }
    let (start, end) = (crossings[0], crossings[1]);
    if coord_key(&start) == coord_key(&end) {
        return None;
    }

    // Interior on the left: the outward normal must point to the right
    let normal = (corners[1] - corners[0]).cross(&(corners[2] - corners[0]));
    let d = end - start;
    if d.y * normal.x - d.x * normal.y > 0.0 {
        Some((start, end))
    } else {
        Some((end, start))
    }
}

/// Chain oriented segments into closed loops; open chains are dropped
fn chain_loops(segments: &[Segment]) -> Vec<Vec<Coord<f64>>> {
    let mut by_start: AHashMap<(u64, u64), Vec<usize>> = AHashMap::new();
    for (i, (start, _)) in segments.iter().enumerate() {
        by_start.entry(coord_key(start)).or_default().push(i);
    }

    let mut used = vec![false; segments.len()];
    let mut loops = Vec::new();

    for first in 0..segments.len() {
        if used[first] {
            continue;
        }
        used[first] = true;

        let origin = coord_key(&segments[first].0);
        let mut ring = vec![segments[first].0];
        let mut current = segments[first].1;
        let mut closed = false;

        loop {
            if coord_key(&current) == origin {
                closed = true;
                break;
            }
            ring.push(current);
            let next = by_start
                .get(&coord_key(&current))
                .and_then(|candidates| candidates.iter().copied().find(|&i| !used[i]));
            match next {
                Some(i) => {
                    used[i] = true;
                    current = segments[i].1;
                }
                None => break,
            }
        }

        if closed && ring.len() >= 3 {
            loops.push(ring);
        }
    }
    loops
}

/// Build the region enclosed by a set of oriented loops
fn compose_loops(loops: Vec<Vec<Coord<f64>>>) -> MultiPolygon<f64> {
    let mut rings: Vec<(f64, GeoPolygon<f64>)> = loops
        .into_iter()
        .map(|ring| {
            let polygon = GeoPolygon::new(LineString::new(ring), Vec::new());
            (polygon.signed_area(), polygon)
        })
        .filter(|(area, _)| *area != 0.0)
        .collect();
    rings.sort_by(|a, b| b.0.abs().total_cmp(&a.0.abs()));

    rings
        .into_iter()
        .fold(MultiPolygon::new(Vec::new()), |acc, (area, polygon)| {
            if area > 0.0 {
                acc.union(&MultiPolygon::new(vec![polygon]))
            } else {
                let mut hole = polygon.exterior().clone();
                hole.0.reverse();
                acc.difference(&MultiPolygon::new(vec![GeoPolygon::new(hole, Vec::new())]))
            }
        })
}

fn slice_at(triangles: &[[Point3<f64>; 3]], height: f64) -> MultiPolygon<f64> {
    let segments: Vec<Segment> = triangles
        .iter()
        .filter_map(|t| triangle_segment(t, height))
        .collect();
    compose_loops(chain_loops(&segments))
}

fn combine(dst: &MultiPolygon<f64>, src: &MultiPolygon<f64>, op: CsgOp) -> MultiPolygon<f64> {
    match op {
        CsgOp::Union => dst.union(src),
        CsgOp::Difference => dst.difference(src),
        CsgOp::Intersection => dst.intersection(src),
    }
}

/// Drop slivers below `min_area` and dissolve overlaps
fn clean_level(level: &MultiPolygon<f64>, min_area: f64) -> MultiPolygon<f64> {
    level
        .0
        .iter()
        .filter(|p| p.unsigned_area() >= min_area)
        .map(|p| {
            let holes = p
                .interiors()
                .iter()
                .filter(|ring| GeoPolygon::new((*ring).clone(), Vec::new()).unsigned_area() >= min_area)
                .cloned()
                .collect();
            GeoPolygon::new(p.exterior().clone(), holes)
        })
        .fold(MultiPolygon::new(Vec::new()), |acc, p| acc.union(&MultiPolygon::new(vec![p])))
}

/// Kernel producing [`LayerStack`] values
#[derive(Debug, Clone)]
pub struct SliceKernel {
    heights: Vec<f64>,
    min_area: f64,
}

impl SliceKernel {
    pub fn new(heights: Vec<f64>) -> Self {
        Self {
            heights,
            min_area: CsgConfig::default().slice_min_area,
        }
    }

    pub fn from_config(heights: Vec<f64>, config: &CsgConfig) -> Self {
        Self::new(heights).with_min_area(config.slice_min_area)
    }

    pub fn with_min_area(mut self, min_area: f64) -> Self {
        self.min_area = min_area;
        self
    }

    pub fn heights(&self) -> &[f64] {
        &self.heights
    }
}

impl CsgKernel for SliceKernel {
    type Native = LayerStack;

    fn name(&self) -> &'static str {
        "slice"
    }

    fn convert(&self, mesh: &Mesh, transform: &Matrix4<f64>) -> Result<LayerStack> {
        let placed = place(mesh, transform)?;
        let triangles: Vec<[Point3<f64>; 3]> = placed
            .triangles
            .iter()
            .map(|t| placed.triangle_positions(t))
            .collect();

        let levels = self
            .heights
            .par_iter()
            .map(|&height| slice_at(&triangles, height))
            .collect();

        Ok(LayerStack {
            heights: self.heights.clone(),
            levels,
        })
    }

    fn merge(&self, dst: &mut LayerStack, src: LayerStack, op: CsgOp) -> Result<()> {
        if dst.levels.len() != src.levels.len() {
            return Err(CsgError::LevelMismatch {
                expected: dst.levels.len(),
                found: src.levels.len(),
            });
        }
        if op == CsgOp::Union && dst.is_empty() {
            *dst = src;
            return Ok(());
        }

        // Levels are independent of each other
        let levels = dst
            .levels
            .par_iter()
            .zip(src.levels.par_iter())
            .map(|(a, b)| combine(a, b, op))
            .collect();
        dst.levels = levels;
        Ok(())
    }

    fn finalize(&self, mut native: LayerStack) -> LayerStack {
        let min_area = self.min_area;
        native
            .levels
            .par_iter_mut()
            .for_each(|level| *level = clean_level(level, min_area));
        native
    }

    fn is_empty(&self, native: &LayerStack) -> bool {
        native.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_cube_cross_section() {
        let kernel = SliceKernel::new(vec![-0.5, 0.5, 1.5]);
        let stack = kernel.convert(&Primitive::unit_cube(), &Matrix4::identity()).unwrap();

        assert_relative_eq!(stack.area(0), 0.0);
        assert_relative_eq!(stack.area(1), 1.0, epsilon = 1e-9);
        assert_relative_eq!(stack.area(2), 0.0);
    }

    #[test]
    fn test_slice_difference_leaves_hole() {
        let kernel = SliceKernel::new(vec![0.5]);
        let outer = Primitive::cube(Vector3::new(4.0, 4.0, 4.0), true).to_mesh();
        let inner = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), true).to_mesh();
        let shift = Matrix4::identity();

        let mut dst = kernel.convert(&outer, &shift).unwrap();
        kernel.merge(&mut dst, kernel.convert(&inner, &shift).unwrap(), CsgOp::Difference).unwrap();

        assert_relative_eq!(dst.area(0), 12.0, epsilon = 1e-9);
        assert_eq!(dst.levels[0].0[0].interiors().len(), 1);
    }

    #[test]
    fn test_level_mismatch() {
        let mut dst = LayerStack::empty(&[0.0, 1.0]);
        let src = LayerStack::empty(&[0.0]);
        assert!(matches!(
            SliceKernel::new(vec![0.0, 1.0]).merge(&mut dst, src, CsgOp::Union),
            Err(CsgError::LevelMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_finalize_drops_slivers() {
        let kernel = SliceKernel::new(vec![0.5]).with_min_area(0.05);
        let sliver = Primitive::cube(Vector3::new(0.1, 0.1, 1.0), false).to_mesh();
        let stack = kernel.convert(&sliver, &Matrix4::identity()).unwrap();

        assert!(stack.area(0) > 0.0);
        assert!(kernel.finalize(stack).is_empty());
    }
}
