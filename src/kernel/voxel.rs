// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Sparse occupancy-grid kernel

use super::{place, CsgKernel};
use crate::config::CsgConfig;
use crate::csg::CsgOp;
use crate::error::{CsgError, Result};
use crate::geometry::classification::{winding_number, INSIDE_THRESHOLD};
use crate::geometry::Mesh;
use ahash::AHashMap;
use nalgebra::{Matrix4, Point2, Point3};
use rayon::prelude::*;

/// Cell coordinate; cell `i` spans `[i * pitch, (i + 1) * pitch)` per axis
pub type Cell = [i32; 3];

fn cell_center(cell: &Cell, pitch: f64) -> Point3<f64> {
    Point3::new(
        (f64::from(cell[0]) + 0.5) * pitch,
        (f64::from(cell[1]) + 0.5) * pitch,
        (f64::from(cell[2]) + 0.5) * pitch,
    )
}

/// Sparse grid of occupancy values in `(0, 1]`
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    pub pitch: f64,
    pub cells: AHashMap<Cell, f32>,
}

impl PartialEq for VoxelGrid {
    fn eq(&self, other: &Self) -> bool {
        self.pitch == other.pitch && *self.cells == *other.cells
    }
}

impl VoxelGrid {
    pub fn empty(pitch: f64) -> Self {
        Self {
            pitch,
            cells: AHashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn occupancy(&self, cell: &Cell) -> f32 {
        self.cells.get(cell).copied().unwrap_or(0.0)
    }

    /// Cell containing `point`
    pub fn cell_of(&self, point: &Point3<f64>) -> Cell {
        [
            (point.x / self.pitch).floor() as i32,
            (point.y / self.pitch).floor() as i32,
            (point.z / self.pitch).floor() as i32,
        ]
    }

    /// Occupied cells in ascending order
    pub fn sorted_cells(&self) -> Vec<(Cell, f32)> {
        let mut cells: Vec<_> = self.cells.iter().map(|(k, v)| (*k, *v)).collect();
        cells.sort_unstable_by_key(|(k, _)| *k);
        cells
    }

    pub fn volume(&self) -> f64 {
        // Sorted so the float sum does not depend on hash order
        let occupied: f64 = self.sorted_cells().iter().map(|(_, v)| f64::from(*v)).sum();
        occupied * self.pitch.powi(3)
    }

    fn check_pitch(&self, other: &VoxelGrid) -> Result<()> {
        if (self.pitch - other.pitch).abs() > self.pitch.abs() * 1e-12 {
            return Err(CsgError::PitchMismatch {
                expected: self.pitch,
                found: other.pitch,
            });
        }
        Ok(())
    }
}

/// Canonical 2D orientation of `p` against the edge `a -> b`
///
/// Endpoints are ordered before evaluating so a shared edge yields exactly
/// negated values in its two triangles.
fn edge_side(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> f64 {
    let orient = |a: &Point2<f64>, b: &Point2<f64>| (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    if (a.x, a.y) <= (b.x, b.y) {
        orient(a, b)
    } else {
        -orient(b, a)
    }
}

/// Top-left fill rule for a counter-clockwise edge
fn owns_edge(a: &Point2<f64>, b: &Point2<f64>) -> bool {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    dy < 0.0 || (dy == 0.0 && dx < 0.0)
}

/// Height at which the vertical line through `p` crosses `triangle`, with
/// `+1` for a downward-facing triangle (entering) and `-1` for an upward one
fn column_crossing(triangle: &[Point3<f64>; 3], p: &Point2<f64>) -> Option<(f64, i32)> {
    let [a, b, c] = triangle;
    let flat = |q: &Point3<f64>| Point2::new(q.x, q.y);
    let (fa, mut fb, mut fc) = (flat(a), flat(b), flat(c));
    let (mut zb, mut zc) = (b.z, c.z);

    let area = (fb.x - fa.x) * (fc.y - fa.y) - (fb.y - fa.y) * (fc.x - fa.x);
    if area == 0.0 {
        return None;
    }
    let delta = if area > 0.0 { -1 } else { 1 };
    if area < 0.0 {
        std::mem::swap(&mut fb, &mut fc);
        std::mem::swap(&mut zb, &mut zc);
    }

    let mut weights = [0.0; 3];
    for (slot, (from, to)) in [(&fb, &fc), (&fc, &fa), (&fa, &fb)].into_iter().enumerate() {
        let side = edge_side(from, to, p);
        if side < 0.0 || (side == 0.0 && !owns_edge(from, to)) {
            return None;
        }
        weights[slot] = side;
    }

    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let z = (weights[0] * a.z + weights[1] * zb + weights[2] * zc) / total;
    Some((z, delta))
}

/// Column-by-column rasterization of a closed surface
struct Raster<'a> {
    pitch: f64,
    lo: Cell,
    hi: Cell,
    triangles: &'a [[Point3<f64>; 3]],
}

impl Raster<'_> {
    fn center(&self, index: i32) -> f64 {
        (f64::from(index) + 0.5) * self.pitch
    }

    /// Cell index range whose centers fall inside `[min, max]`, padded by
    /// one cell against rounding
    fn span(&self, min: f64, max: f64, axis: usize) -> std::ops::Range<i32> {
        let first = ((min / self.pitch) - 0.5).ceil() as i32 - 1;
        let last = ((max / self.pitch) - 0.5).floor() as i32 + 1;
        first.max(self.lo[axis])..(last + 1).min(self.hi[axis])
    }

    fn fill_row(&self, j: i32) -> Vec<Cell> {
        let y = self.center(j);
        let width = (self.hi[0] - self.lo[0]).max(0) as usize;

        // Triangles binned by the columns their footprint covers
        let mut columns: Vec<Vec<usize>> = vec![Vec::new(); width];
        for (index, t) in self.triangles.iter().enumerate() {
            let (min_y, max_y) = t.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
            if y < min_y || y > max_y {
                continue;
            }
            let (min_x, max_x) = t.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
            for i in self.span(min_x, max_x, 0) {
                columns[(i - self.lo[0]) as usize].push(index);
            }
        }

        let mut cells = Vec::new();
        for (offset, candidates) in columns.iter().enumerate() {
            if candidates.is_empty() {
                continue;
            }
            let i = self.lo[0] + offset as i32;
            self.fill_column(i, j, candidates, &mut cells);
        }
        cells
    }

    fn fill_column(&self, i: i32, j: i32, candidates: &[usize], cells: &mut Vec<Cell>) {
        let p = Point2::new(self.center(i), self.center(j));
        let mut crossings: Vec<(f64, i32)> = candidates
            .iter()
            .filter_map(|&index| column_crossing(&self.triangles[index], &p))
            .collect();
        if crossings.is_empty() {
            return;
        }
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        // A ray that does not leave the solid met a gap or a grazing hit
        if crossings.iter().map(|c| c.1).sum::<i32>() != 0 {
            for k in self.lo[2]..self.hi[2] {
                let cell = [i, j, k];
                if winding_number(&cell_center(&cell, self.pitch), self.triangles) > INSIDE_THRESHOLD {
                    cells.push(cell);
                }
            }
            return;
        }

        let mut winding = 0;
        let mut next = crossings.iter().peekable();
        for k in self.lo[2]..self.hi[2] {
            let z = self.center(k);
            while let Some((_, delta)) = next.next_if(|c| c.0 < z) {
                winding += delta;
            }
            if winding > 0 {
                cells.push([i, j, k]);
            }
        }
    }
}

/// Kernel producing [`VoxelGrid`] values at a fixed pitch
#[derive(Debug, Clone, Copy)]
pub struct VoxelKernel {
    pitch: f64,
}

impl Default for VoxelKernel {
    fn default() -> Self {
        Self::from_config(&CsgConfig::default())
    }
}

impl VoxelKernel {
    pub fn new(pitch: f64) -> Self {
        Self { pitch }
    }

    pub fn from_config(config: &CsgConfig) -> Self {
        Self::new(config.voxel_pitch)
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }
}

impl CsgKernel for VoxelKernel {
    type Native = VoxelGrid;

    fn name(&self) -> &'static str {
        "voxel"
    }

    fn convert(&self, mesh: &Mesh, transform: &Matrix4<f64>) -> Result<VoxelGrid> {
        if !(self.pitch.is_finite() && self.pitch > 0.0) {
            return Err(CsgError::Numerical(format!("invalid voxel pitch {}", self.pitch)));
        }

        let placed = place(mesh, transform)?;
        let mut grid = VoxelGrid::empty(self.pitch);
        if placed.is_empty() {
            return Ok(grid);
        }

        let triangles: Vec<[Point3<f64>; 3]> = placed
            .triangles
            .iter()
            .map(|t| placed.triangle_positions(t))
            .collect();

        let bbox = placed.bounding_box();
        let lo = grid.cell_of(&bbox.min);
        let hi = [
            (bbox.max.x / self.pitch).ceil() as i32,
            (bbox.max.y / self.pitch).ceil() as i32,
            (bbox.max.z / self.pitch).ceil() as i32,
        ];
        let raster = Raster {
            pitch: self.pitch,
            lo,
            hi,
            triangles: &triangles,
        };

        let occupied: Vec<Cell> = (lo[1]..hi[1])
            .into_par_iter()
            .flat_map_iter(|j| raster.fill_row(j))
            .collect();

        grid.cells = occupied.into_iter().map(|cell| (cell, 1.0)).collect();
        Ok(grid)
    }

    fn merge(&self, dst: &mut VoxelGrid, src: VoxelGrid, op: CsgOp) -> Result<()> {
        if op == CsgOp::Union && dst.is_empty() {
            *dst = src;
            return Ok(());
        }
        dst.check_pitch(&src)?;

        match op {
            CsgOp::Union => {
                for (cell, value) in src.cells {
                    let slot = dst.cells.entry(cell).or_insert(0.0);
                    *slot = slot.max(value);
                }
            }
            CsgOp::Difference => {
                for (cell, value) in &src.cells {
                    if let Some(slot) = dst.cells.get_mut(cell) {
                        *slot = slot.min(1.0 - value);
                    }
                }
                dst.cells.retain(|_, value| *value > 0.0);
            }
            CsgOp::Intersection => {
                dst.cells.retain(|cell, value| match src.cells.get(cell) {
                    Some(other) => {
                        *value = value.min(*other);
                        *value > 0.0
                    }
                    None => false,
                });
            }
        }
        Ok(())
    }

    fn is_empty(&self, native: &VoxelGrid) -> bool {
        native.is_empty()
    }
}
