// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Stack reduction semantics over flat part sequences

use approx::assert_relative_eq;
use nalgebra::{Matrix4, Vector3};
use polyframe_csg::csg::{merge_into, Evaluator};
use polyframe_csg::geometry::{Mesh, Triangle};
use polyframe_csg::kernel::VoxelGrid;
use polyframe_csg::kernel::LayerStack;
use polyframe_csg::{
    copy_parts_deep, reduce, CsgError, CsgKernel, CsgOp, CsgPart, CutKernel, ExactKernel, Primitive, SliceKernel,
    StackOp, VoxelKernel,
};
use std::fmt::Debug;

fn offset(x: f64, y: f64, z: f64) -> Matrix4<f64> {
    Matrix4::new_translation(&Vector3::new(x, y, z))
}

fn cube_part(x: f64, y: f64, z: f64) -> CsgPart<'static> {
    CsgPart::new(Primitive::unit_cube()).with_transform(offset(x, y, z))
}

fn voxels() -> VoxelKernel {
    VoxelKernel::new(0.25)
}

fn grid(kernel: &VoxelKernel, x: f64, y: f64, z: f64) -> Option<VoxelGrid> {
    kernel.convert(&Primitive::unit_cube(), &offset(x, y, z)).ok()
}

/// Identity, absent-operand and empty-union laws for one kernel
fn assert_merge_laws<K>(kernel: &K, same_shape: impl Fn(&K::Native, &K::Native) -> bool)
where
    K: CsgKernel,
    K::Native: Clone + PartialEq + Debug,
{
    let part = cube_part(0.25, 0.25, 0.25);
    let converted = kernel
        .convert(&Primitive::unit_cube(), &part.transform)
        .unwrap();

    let reduced = reduce(&[part], kernel).unwrap();
    assert!(same_shape(&reduced, &converted), "{} changed a lone part", kernel.name());

    for op in [CsgOp::Union, CsgOp::Difference, CsgOp::Intersection] {
        let mut dst = Some(converted.clone());
        merge_into(kernel, &mut dst, None, op);
        assert_eq!(dst.as_ref(), Some(&converted), "{} {:?}", kernel.name(), op);
    }

    let mut empty = None;
    merge_into(kernel, &mut empty, Some(converted.clone()), CsgOp::Union);
    assert_eq!(empty, Some(converted));
}

fn same_levels(a: &LayerStack, b: &LayerStack) -> bool {
    a.level_count() == b.level_count()
        && (0..a.level_count()).all(|level| (a.area(level) - b.area(level)).abs() < 1e-9)
}

#[test]
fn test_merge_laws_hold_for_every_kernel() {
    assert_merge_laws(&ExactKernel, |a, b| a == b);
    assert_merge_laws(&CutKernel, |a, b| a == b);
    assert_merge_laws(&voxels(), |a, b| a == b);
    assert_merge_laws(&SliceKernel::new(vec![0.0, 0.5, 1.0]), same_levels);
}

#[test]
fn test_slice_finishing_pass_keeps_lone_part_area() {
    let kernel = SliceKernel::new(vec![0.5]);
    let stack = reduce(&[cube_part(0.0, 0.0, 0.0)], &kernel).unwrap();
    assert_relative_eq!(stack.area(0), 1.0, epsilon = 1e-9);
}

#[test]
fn test_cut_kernel_subtracts_nested_group() {
    let block = Primitive::cube(Vector3::new(3.0, 3.0, 3.0), false).to_mesh();
    let parts = vec![
        CsgPart::new(&block),
        cube_part(0.5, 0.5, 0.5)
            .with_operation(CsgOp::Difference)
            .with_stack_op(StackOp::Push),
        cube_part(1.0, 1.0, 1.0).with_stack_op(StackOp::Pop),
    ];

    let cut = reduce(&parts, &CutKernel).unwrap();
    let exact = reduce(&parts, &ExactKernel).unwrap();

    assert_relative_eq!(cut.volume(), 27.0 - 1.875, epsilon = 1e-9);
    assert_relative_eq!(exact.volume(), cut.volume(), epsilon = 1e-9);
}

#[test]
fn test_union_of_overlapping_cubes() {
    let parts = vec![cube_part(0.0, 0.0, 0.0), cube_part(0.5, 0.5, 0.5)];

    let exact = reduce(&parts, &ExactKernel).unwrap();
    assert_relative_eq!(exact.volume(), 1.875, epsilon = 1e-9);

    let voxel = reduce(&parts, &VoxelKernel::new(0.1)).unwrap();
    assert_relative_eq!(voxel.volume(), 1.875, epsilon = 1e-9);
}

#[test]
fn test_group_closed_by_marker_equals_difference() {
    let parts = vec![
        cube_part(0.0, 0.0, 0.0).with_stack_op(StackOp::Push),
        cube_part(0.5, 0.5, 0.5).with_operation(CsgOp::Difference),
        CsgPart::marker(CsgOp::Union, StackOp::Pop),
    ];

    let exact = reduce(&parts, &ExactKernel).unwrap();
    assert_relative_eq!(exact.volume(), 0.875, epsilon = 1e-9);

    let kernel = voxels();
    let mut expected = grid(&kernel, 0.0, 0.0, 0.0);
    merge_into(&kernel, &mut expected, grid(&kernel, 0.5, 0.5, 0.5), CsgOp::Difference);
    assert_eq!(reduce(&parts, &kernel), expected);
}

#[test]
fn test_popping_part_merges_before_group_closes() {
    let parts = vec![
        cube_part(0.0, 0.0, 0.0).with_stack_op(StackOp::Push),
        cube_part(0.5, 0.5, 0.5).with_operation(CsgOp::Difference),
        cube_part(1.0, 1.0, 1.0).with_stack_op(StackOp::Pop),
    ];

    let kernel = voxels();
    let mut expected = grid(&kernel, 0.0, 0.0, 0.0);
    merge_into(&kernel, &mut expected, grid(&kernel, 0.5, 0.5, 0.5), CsgOp::Difference);
    merge_into(&kernel, &mut expected, grid(&kernel, 1.0, 1.0, 1.0), CsgOp::Union);
    assert_eq!(reduce(&parts, &kernel), expected);
}

#[test]
fn test_nested_group_subtracts_as_one_operand() {
    let block = Primitive::cube(Vector3::new(3.0, 3.0, 3.0), false).to_mesh();
    let parts = vec![
        CsgPart::new(&block),
        cube_part(0.5, 0.5, 0.5)
            .with_operation(CsgOp::Difference)
            .with_stack_op(StackOp::Push),
        cube_part(1.0, 1.0, 1.0),
        cube_part(1.5, 0.5, 1.5).with_stack_op(StackOp::Pop),
    ];

    let kernel = voxels();
    let mut group = grid(&kernel, 0.5, 0.5, 0.5);
    merge_into(&kernel, &mut group, grid(&kernel, 1.0, 1.0, 1.0), CsgOp::Union);
    merge_into(&kernel, &mut group, grid(&kernel, 1.5, 0.5, 1.5), CsgOp::Union);

    let mut expected = kernel.convert(&block, &Matrix4::identity()).ok();
    merge_into(&kernel, &mut expected, group, CsgOp::Difference);

    assert_eq!(reduce(&parts, &kernel), expected);
}

#[test]
fn test_difference_is_order_sensitive() {
    let a_minus_b = vec![
        cube_part(0.0, 0.0, 0.0),
        cube_part(0.5, 0.0, 0.0).with_operation(CsgOp::Difference),
    ];
    let b_minus_a = vec![
        cube_part(0.5, 0.0, 0.0),
        cube_part(0.0, 0.0, 0.0).with_operation(CsgOp::Difference),
    ];

    let kernel = voxels();
    let first = reduce(&a_minus_b, &kernel).unwrap();
    let second = reduce(&b_minus_a, &kernel).unwrap();

    assert_ne!(first, second);
    assert_eq!(first.cell_count(), second.cell_count());
}

#[test]
fn test_union_is_commutative() {
    let kernel = voxels();
    let forward = vec![cube_part(0.0, 0.0, 0.0), cube_part(0.5, 0.25, 0.0)];
    let backward = vec![cube_part(0.5, 0.25, 0.0), cube_part(0.0, 0.0, 0.0)];

    assert_eq!(reduce(&forward, &kernel), reduce(&backward, &kernel));
}

#[test]
fn test_failed_conversion_is_dropped() {
    let mut broken = Mesh::new();
    broken.add_triangle(Triangle::new([0, 1, 7]));

    let with_broken = vec![
        cube_part(0.0, 0.0, 0.0),
        CsgPart::new(broken).with_operation(CsgOp::Difference).named("broken"),
        cube_part(0.5, 0.5, 0.5),
    ];
    let without = vec![cube_part(0.0, 0.0, 0.0), cube_part(0.5, 0.5, 0.5)];

    let kernel = voxels();
    assert_eq!(reduce(&with_broken, &kernel), reduce(&without, &kernel));
}

#[test]
fn test_leading_difference_into_empty_root_is_noop() {
    let parts = vec![
        cube_part(0.0, 0.0, 0.0).with_operation(CsgOp::Difference),
        cube_part(2.0, 0.0, 0.0),
    ];

    let kernel = voxels();
    assert_eq!(reduce(&parts, &kernel), grid(&kernel, 2.0, 0.0, 0.0));
}

#[test]
fn test_empty_sequence_has_no_result() {
    assert!(reduce(&[], &ExactKernel).is_none());
    assert!(reduce(&[CsgPart::marker(CsgOp::Union, StackOp::Continue)], &voxels()).is_none());
}

#[test]
fn test_thread_count_does_not_change_result() {
    let parts: Vec<CsgPart> = (0..12)
        .map(|i| {
            let t = f64::from(i) * 0.3;
            let op = if i % 3 == 2 { CsgOp::Difference } else { CsgOp::Union };
            cube_part(t, t * 0.5, 0.0).with_operation(op)
        })
        .collect();

    let single = Evaluator::new().with_threads(1);
    let many = Evaluator::new().with_threads(4);

    let kernel = voxels();
    assert_eq!(
        single.evaluate(&kernel, &parts).unwrap(),
        many.evaluate(&kernel, &parts).unwrap()
    );
    assert_eq!(
        single.evaluate(&ExactKernel, &parts).unwrap(),
        many.evaluate(&ExactKernel, &parts).unwrap()
    );
}

#[test]
fn test_deep_copy_evaluates_identically() {
    let mesh = Primitive::unit_cube();
    let parts = vec![
        CsgPart::new(&mesh),
        CsgPart::new(&mesh)
            .with_transform(offset(0.5, 0.0, 0.0))
            .with_operation(CsgOp::Intersection),
    ];
    let owned = copy_parts_deep(&parts);
    drop(parts);

    let result = reduce(&owned, &ExactKernel).unwrap();
    assert_relative_eq!(result.volume(), 0.5, epsilon = 1e-9);
}

#[test]
fn test_interrupt_is_reported() {
    let parts = vec![cube_part(0.0, 0.0, 0.0)];
    let result = Evaluator::new().with_interrupt(|| true).evaluate(&voxels(), &parts);
    assert!(matches!(result, Err(CsgError::Interrupted)));
}
