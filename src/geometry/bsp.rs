// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! BSP tree over convex polygons, used by the exact surface kernel

use super::polygon::{Plane, Polygon};

/// One node of a [`BspTree`]; children are arena indices
#[derive(Debug, Clone, Default)]
struct BspNode {
    plane: Option<Plane>,
    front: Option<usize>,
    back: Option<usize>,
    polygons: Vec<Polygon>,
}

/// BSP tree stored as a flat arena
///
/// Convex inputs produce chains as deep as their face count, so every walk
/// is a loop over an explicit work list and no polygon batch outlives the
/// node that consumes it.
#[derive(Debug, Clone)]
pub struct BspTree {
    nodes: Vec<BspNode>,
}

impl Default for BspTree {
    fn default() -> Self {
        Self {
            nodes: vec![BspNode::default()],
        }
    }
}

impl BspTree {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        let mut tree = Self::default();
        tree.build(polygons);
        tree
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn child(&mut self, slot: Option<usize>) -> usize {
        slot.unwrap_or_else(|| {
            self.nodes.push(BspNode::default());
            self.nodes.len() - 1
        })
    }

    /// Insert polygons, splitting them by the node planes
    pub fn build(&mut self, polygons: Vec<Polygon>) {
        let mut work = vec![(0usize, polygons)];

        while let Some((index, polygons)) = work.pop() {
            if polygons.is_empty() {
                continue;
            }
            let node = &mut self.nodes[index];
            let plane = *node.plane.get_or_insert(polygons[0].plane);

            let mut front_polys = Vec::new();
            let mut back_polys = Vec::new();
            let mut coplanar_back = Vec::new();
            for poly in &polygons {
                plane.split_polygon(
                    poly,
                    &mut node.polygons,
                    &mut coplanar_back,
                    &mut front_polys,
                    &mut back_polys,
                );
            }
            node.polygons.append(&mut coplanar_back);
            drop(polygons);

            if !back_polys.is_empty() {
                let back = self.child(self.nodes[index].back);
                self.nodes[index].back = Some(back);
                work.push((back, back_polys));
            }
            if !front_polys.is_empty() {
                let front = self.child(self.nodes[index].front);
                self.nodes[index].front = Some(front);
                work.push((front, front_polys));
            }
        }
    }

    pub fn into_polygons(self) -> Vec<Polygon> {
        self.nodes.into_iter().flat_map(|node| node.polygons).collect()
    }

    /// Remove the parts of this tree's polygons that lie inside `bsp`
    pub fn clip_to(&mut self, bsp: &BspTree) {
        for node in &mut self.nodes {
            let polygons = std::mem::take(&mut node.polygons);
            node.polygons = bsp.clip_polygons(polygons);
        }
    }

    /// Keep only the polygon pieces that lie outside this solid
    pub fn clip_polygons(&self, polygons: Vec<Polygon>) -> Vec<Polygon> {
        let mut result = Vec::new();
        let mut work = vec![(0usize, polygons)];

        while let Some((index, polygons)) = work.pop() {
            let node = &self.nodes[index];
            let Some(plane) = node.plane else {
                result.extend(polygons);
                continue;
            };

            let mut front = Vec::new();
            let mut back = Vec::new();
            let mut coplanar_front = Vec::new();
            let mut coplanar_back = Vec::new();
            for poly in &polygons {
                plane.split_polygon(poly, &mut coplanar_front, &mut coplanar_back, &mut front, &mut back);
            }
            drop(polygons);
            front.append(&mut coplanar_front);
            back.append(&mut coplanar_back);

            // Back leaves are solid
            if let Some(child) = node.back {
                work.push((child, back));
            }
            match node.front {
                Some(child) => work.push((child, front)),
                None => result.extend(front),
            }
        }
        result
    }

    /// Swap solid and empty space
    pub fn invert(&mut self) {
        for node in &mut self.nodes {
            for poly in &mut node.polygons {
                poly.flip();
            }
            if let Some(ref mut plane) = node.plane {
                plane.flip();
            }
            std::mem::swap(&mut node.front, &mut node.back);
        }
    }
}

/// Boundary of `a ∪ b`
pub fn union(a: Vec<Polygon>, b: Vec<Polygon>) -> Vec<Polygon> {
    let mut a = BspTree::new(a);
    let mut b = BspTree::new(b);

    a.clip_to(&b);
    b.clip_to(&a);
    b.invert();
    b.clip_to(&a);
    b.invert();
    a.build(b.into_polygons());
    a.into_polygons()
}

/// Boundary of `a − b`
pub fn difference(a: Vec<Polygon>, b: Vec<Polygon>) -> Vec<Polygon> {
    let mut a = BspTree::new(a);
    let mut b = BspTree::new(b);

    a.invert();
    a.clip_to(&b);
    b.clip_to(&a);
    b.invert();
    b.clip_to(&a);
    b.invert();
    a.build(b.into_polygons());
    a.invert();
    a.into_polygons()
}

/// Boundary of `a ∩ b`
pub fn intersection(a: Vec<Polygon>, b: Vec<Polygon>) -> Vec<Polygon> {
    let mut a = BspTree::new(a);
    let mut b = BspTree::new(b);

    a.invert();
    b.clip_to(&a);
    b.invert();
    a.clip_to(&b);
    b.clip_to(&a);
    a.build(b.into_polygons());
    a.invert();
    a.into_polygons()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::polygon::polygons_volume;
    use crate::geometry::{Mesh, Primitive};
    use approx::assert_relative_eq;
    use nalgebra::{Matrix4, Vector3};

    fn polygons(mesh: &Mesh) -> Vec<Polygon> {
        mesh.triangles
            .iter()
            .filter_map(|tri| Polygon::new(mesh.triangle_positions(tri).to_vec()))
            .collect()
    }

    fn offset_cubes() -> (Vec<Polygon>, Vec<Polygon>) {
        let a = Primitive::unit_cube();
        let b = a.transformed(&Matrix4::new_translation(&Vector3::new(0.5, 0.0, 0.0)));
        (polygons(&a), polygons(&b))
    }

    #[test]
    fn test_bsp_union_volume() {
        let (a, b) = offset_cubes();
        assert_relative_eq!(polygons_volume(&union(a, b)), 1.5, epsilon = 1e-9);
    }

    #[test]
    fn test_bsp_difference_volume() {
        let (a, b) = offset_cubes();
        assert_relative_eq!(polygons_volume(&difference(a, b)), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_bsp_intersection_volume() {
        let (a, b) = offset_cubes();
        assert_relative_eq!(polygons_volume(&intersection(a, b)), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_disjoint_intersection_is_empty() {
        let a = Primitive::unit_cube();
        let b = a.transformed(&Matrix4::new_translation(&Vector3::new(3.0, 0.0, 0.0)));
        assert!(intersection(polygons(&a), polygons(&b)).is_empty());
    }

    #[test]
    fn test_convex_chain_keeps_every_face() {
        // Each planar quad band shares one node; pole fans get one node per face
        let sphere = Primitive::sphere(1.0, 128).to_mesh();
        let faces = polygons(&sphere);
        assert!(faces.len() >= 16_000);

        let tree = BspTree::new(faces.clone());
        assert_eq!(tree.node_count(), 128 * 2 + 128 * 62);
        assert_eq!(tree.into_polygons().len(), faces.len());
    }
}
