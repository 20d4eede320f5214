// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - mesh representation and operations

mod bbox;
pub mod bsp;
pub mod classification;
pub mod intersection;
mod mesh;
pub mod polygon;
mod primitives;
pub mod topology;

pub use bbox::BoundingBox;
pub use mesh::{Mesh, Triangle, Vertex};
pub use polygon::{Plane, Polygon};
pub use primitives::Primitive;
