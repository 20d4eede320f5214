// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Planar convex polygons and plane splitting

use super::BoundingBox;
use nalgebra::{Point3, Vector3};

/// Tolerance used to decide whether a point lies on a plane
pub const PLANE_EPSILON: f64 = 1e-7;

const COPLANAR: u8 = 0;
const FRONT: u8 = 1;
const BACK: u8 = 2;
const SPANNING: u8 = 3;

/// Oriented plane `normal . p = w`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f64>,
    pub w: f64,
}

impl Plane {
    /// Plane through a polygon loop using Newell's method
    pub fn from_loop(points: &[Point3<f64>]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }

        let mut normal = Vector3::zeros();
        for (i, a) in points.iter().enumerate() {
            let b = &points[(i + 1) % points.len()];
            normal.x += (a.y - b.y) * (a.z + b.z);
            normal.y += (a.z - b.z) * (a.x + b.x);
            normal.z += (a.x - b.x) * (a.y + b.y);
        }

        let normal = normal.try_normalize(1e-18)?;
        let centroid = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / points.len() as f64;
        Some(Self {
            normal,
            w: normal.dot(&centroid),
        })
    }

    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&point.coords) - self.w
    }

    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    fn side_of(&self, point: &Point3<f64>) -> u8 {
        let t = self.signed_distance(point);
        if t < -PLANE_EPSILON {
            BACK
        } else if t > PLANE_EPSILON {
            FRONT
        } else {
            COPLANAR
        }
    }

    /// True when `points` has vertices strictly on both sides
    pub fn separates(&self, points: &[Point3<f64>]) -> bool {
        points.iter().fold(COPLANAR, |acc, p| acc | self.side_of(p)) == SPANNING
    }

    /// False when every point lies strictly on the same side
    pub fn touches(&self, points: &[Point3<f64>]) -> bool {
        let side = points.iter().fold(COPLANAR, |acc, p| acc | self.side_of(p));
        side != FRONT && side != BACK
    }

    /// Split a polygon into the four classification buckets
    pub fn split_polygon(
        &self,
        polygon: &Polygon,
        coplanar_front: &mut Vec<Polygon>,
        coplanar_back: &mut Vec<Polygon>,
        front: &mut Vec<Polygon>,
        back: &mut Vec<Polygon>,
    ) {
        let types: Vec<u8> = polygon.vertices.iter().map(|v| self.side_of(v)).collect();
        let polygon_type = types.iter().fold(COPLANAR, |acc, t| acc | t);

        match polygon_type {
            COPLANAR => {
                if self.normal.dot(&polygon.plane.normal) > 0.0 {
                    coplanar_front.push(polygon.clone());
                } else {
                    coplanar_back.push(polygon.clone());
                }
            }
            FRONT => front.push(polygon.clone()),
            BACK => back.push(polygon.clone()),
            _ => {
                let n = polygon.vertices.len();
                let mut f = Vec::with_capacity(n + 1);
                let mut b = Vec::with_capacity(n + 1);

                for i in 0..n {
                    let j = (i + 1) % n;
                    let (ti, tj) = (types[i], types[j]);
                    let (vi, vj) = (polygon.vertices[i], polygon.vertices[j]);

                    if ti != BACK {
                        f.push(vi);
                    }
                    if ti != FRONT {
                        b.push(vi);
                    }
                    if (ti | tj) == SPANNING {
                        let t = (self.w - self.normal.dot(&vi.coords)) / self.normal.dot(&(vj - vi));
                        let v = vi + (vj - vi) * t;
                        f.push(v);
                        b.push(v);
                    }
                }

                if f.len() >= 3 {
                    front.push(Polygon::with_plane(f, polygon.plane));
                }
                if b.len() >= 3 {
                    back.push(Polygon::with_plane(b, polygon.plane));
                }
            }
        }
    }

    /// Cut a polygon by this plane, returning all resulting pieces
    pub fn cut(&self, polygon: &Polygon) -> Vec<Polygon> {
        let mut pieces = Vec::with_capacity(2);
        let mut coplanar = Vec::new();
        let mut back = Vec::new();
        self.split_polygon(polygon, &mut coplanar, &mut Vec::new(), &mut pieces, &mut back);
        if !coplanar.is_empty() {
            // Coplanar polygons stay whole regardless of facing
            return vec![polygon.clone()];
        }
        pieces.append(&mut back);
        if pieces.is_empty() {
            pieces.push(polygon.clone());
        }
        pieces
    }
}

/// Convex planar polygon
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub vertices: Vec<Point3<f64>>,
    pub plane: Plane,
}

impl Polygon {
    /// Build a polygon, rejecting degenerate loops
    pub fn new(vertices: Vec<Point3<f64>>) -> Option<Self> {
        let plane = Plane::from_loop(&vertices)?;
        Some(Self { vertices, plane })
    }

    pub fn with_plane(vertices: Vec<Point3<f64>>, plane: Plane) -> Self {
        Self { vertices, plane }
    }

    pub fn flip(&mut self) {
        self.vertices.reverse();
        self.plane.flip();
    }

    pub fn flipped(&self) -> Self {
        let mut copy = self.clone();
        copy.flip();
        copy
    }

    pub fn centroid(&self) -> Point3<f64> {
        let sum = self.vertices.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Point3::from(sum / self.vertices.len() as f64)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.vertices)
    }

    /// Fan triangulation of the (convex) loop
    pub fn triangles(&self) -> impl Iterator<Item = [Point3<f64>; 3]> + '_ {
        (1..self.vertices.len().saturating_sub(1))
            .map(move |i| [self.vertices[0], self.vertices[i], self.vertices[i + 1]])
    }

    /// Signed volume contribution of this polygon relative to the origin
    pub fn signed_volume(&self) -> f64 {
        self.triangles()
            .map(|[a, b, c]| a.coords.dot(&b.coords.cross(&c.coords)) / 6.0)
            .sum()
    }

    /// Whether `point` lies on this polygon (within tolerance)
    pub fn contains_coplanar_point(&self, point: &Point3<f64>, tolerance: f64) -> bool {
        if self.plane.signed_distance(point).abs() > tolerance {
            return false;
        }
        let n = self.vertices.len();
        (0..n).all(|i| {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            (b - a).cross(&(point - a)).dot(&self.plane.normal) >= -tolerance
        })
    }
}

/// Sum of polygon volume contributions
pub fn polygons_volume(polygons: &[Polygon]) -> f64 {
    polygons.iter().map(Polygon::signed_volume).sum()
}
