// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Closed primitive meshes with shared vertices

use super::Mesh;
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Geometric primitives
pub enum Primitive {
    Cube { size: Vector3<f64>, center: bool },
    Sphere { r: f64, fn_: u32 },
    Cylinder { h: f64, r: f64, fn_: u32 },
}

impl Primitive {
    pub fn cube(size: Vector3<f64>, center: bool) -> Self {
        Self::Cube { size, center }
    }

    pub fn sphere(r: f64, fn_: u32) -> Self {
        let segments = if fn_ > 0 { fn_ } else { 32 };
        Self::Sphere { r, fn_: segments }
    }

    pub fn cylinder(h: f64, r: f64, fn_: u32) -> Self {
        let segments = if fn_ > 0 { fn_ } else { 32 };
        Self::Cylinder { h, r, fn_: segments }
    }

    /// Unit cube spanning [0, 1]^3
    pub fn unit_cube() -> Mesh {
        Self::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh()
    }

    pub fn to_mesh(&self) -> Mesh {
        match self {
            Self::Cube { size, center } => generate_cube_mesh(*size, *center),
            Self::Sphere { r, fn_ } => generate_sphere_mesh(*r, *fn_),
            Self::Cylinder { h, r, fn_ } => generate_cylinder_mesh(*h, *r, *fn_),
        }
    }
}

fn generate_cube_mesh(size: Vector3<f64>, center: bool) -> Mesh {
    let offset = if center { size / 2.0 } else { Vector3::zeros() };
    let (min_x, min_y, min_z) = (-offset.x, -offset.y, -offset.z);
    let (max_x, max_y, max_z) = (size.x - offset.x, size.y - offset.y, size.z - offset.z);

    let positions = [
        Point3::new(min_x, min_y, min_z),
        Point3::new(max_x, min_y, min_z),
        Point3::new(max_x, max_y, min_z),
        Point3::new(min_x, max_y, min_z),
        Point3::new(min_x, min_y, max_z),
        Point3::new(max_x, min_y, max_z),
        Point3::new(max_x, max_y, max_z),
        Point3::new(min_x, max_y, max_z),
    ];

    // Two triangles per face, counter-clockwise seen from outside
    let faces = [
        [4, 5, 6],
        [4, 6, 7],
        [1, 0, 3],
        [1, 3, 2],
        [5, 1, 2],
        [5, 2, 6],
        [0, 4, 7],
        [0, 7, 3],
        [7, 6, 2],
        [7, 2, 3],
        [0, 1, 5],
        [0, 5, 4],
    ];

    Mesh::from_indexed(&positions, &faces)
}

fn generate_sphere_mesh(r: f64, segments: u32) -> Mesh {
    let segments = segments.max(3) as usize;
    let rings = (segments / 2).max(2);

    let mut positions = Vec::with_capacity(2 + (rings - 1) * segments);
    positions.push(Point3::new(0.0, 0.0, r));
    for ring in 1..rings {
        let phi = PI * ring as f64 / rings as f64;
        for seg in 0..segments {
            let theta = 2.0 * PI * seg as f64 / segments as f64;
            positions.push(Point3::new(
                r * phi.sin() * theta.cos(),
                r * phi.sin() * theta.sin(),
                r * phi.cos(),
            ));
        }
    }
    positions.push(Point3::new(0.0, 0.0, -r));
    let south = positions.len() - 1;

    let ring_start = |ring: usize| 1 + (ring - 1) * segments;
    let mut faces = Vec::new();

    for seg in 0..segments {
        let next = (seg + 1) % segments;
        faces.push([0, ring_start(1) + seg, ring_start(1) + next]);
    }

    for ring in 1..rings - 1 {
        let upper = ring_start(ring);
        let lower = ring_start(ring + 1);
        for seg in 0..segments {
            let next = (seg + 1) % segments;
            faces.push([upper + seg, lower + seg, lower + next]);
            faces.push([upper + seg, lower + next, upper + next]);
        }
    }

    let last = ring_start(rings - 1);
    for seg in 0..segments {
        let next = (seg + 1) % segments;
        faces.push([south, last + next, last + seg]);
    }

    Mesh::from_indexed(&positions, &faces)
}

fn generate_cylinder_mesh(h: f64, r: f64, segments: u32) -> Mesh {
    let segments = segments.max(3) as usize;

    let mut positions = Vec::with_capacity(2 * segments + 2);
    for z in [0.0, h] {
        for seg in 0..segments {
            let theta = 2.0 * PI * seg as f64 / segments as f64;
            positions.push(Point3::new(r * theta.cos(), r * theta.sin(), z));
        }
    }
    let bottom_center = positions.len();
    positions.push(Point3::new(0.0, 0.0, 0.0));
    let top_center = positions.len();
    positions.push(Point3::new(0.0, 0.0, h));

    let mut faces = Vec::with_capacity(4 * segments);
    for seg in 0..segments {
        let next = (seg + 1) % segments;
        let (b0, b1) = (seg, next);
        let (t0, t1) = (segments + seg, segments + next);

        faces.push([b0, b1, t1]);
        faces.push([b0, t1, t0]);
        faces.push([bottom_center, b1, b0]);
        faces.push([top_center, t0, t1]);
    }

    Mesh::from_indexed(&positions, &faces)
}
