// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Stack-based reduction of a flat part sequence

use super::convert::{convert_all, InterruptFn};
use super::validate::validate;
use super::{CsgOp, CsgPart, StackOp};
use crate::config::CsgConfig;
use crate::error::{CsgError, Result};
use crate::kernel::{guard, CsgKernel};
use rayon::ThreadPoolBuilder;
use std::sync::Arc;
use tracing::{debug, warn};

/// One open nesting level
struct Frame<N> {
    /// Applied when this frame is popped into its parent
    pending: CsgOp,
    /// `None` is the identity (nothing accumulated yet)
    accumulator: Option<N>,
}

/// Merge `src` into `dst`
///
/// An absent `src` leaves `dst` untouched. An absent `dst` takes `src` under
/// [`CsgOp::Union`] and stays absent for every other operation. A failing
/// kernel merge leaves `dst` unchanged and drops `src`.
pub fn merge_into<K: CsgKernel>(kernel: &K, dst: &mut Option<K::Native>, src: Option<K::Native>, op: CsgOp) {
    let Some(src) = src else {
        return;
    };

    match dst {
        Some(current) => {
            if let Err(err) = guard(|| kernel.merge(current, src, op)) {
                warn!(kernel = kernel.name(), ?op, error = %err, "merge failed, dropping operand");
            }
        }
        None if op == CsgOp::Union => *dst = Some(src),
        None => {}
    }
}

fn top<'a, N>(root: &'a mut Option<N>, open: &'a mut [Frame<N>]) -> &'a mut Option<N> {
    match open.last_mut() {
        Some(frame) => &mut frame.accumulator,
        None => root,
    }
}

fn check_interrupt(interrupt: Option<&InterruptFn>) -> Result<()> {
    if interrupt.is_some_and(|f| f()) {
        return Err(CsgError::Interrupted);
    }
    Ok(())
}

/// Fold already-converted operands through the frame stack
pub fn reduce_converted<K: CsgKernel>(
    kernel: &K,
    parts: &[CsgPart<'_>],
    converted: Vec<Option<K::Native>>,
    interrupt: Option<&InterruptFn>,
) -> Result<Option<K::Native>> {
    let mut root: Option<K::Native> = None;
    let mut open: Vec<Frame<K::Native>> = Vec::new();

    for (index, (part, native)) in parts.iter().zip(converted).enumerate() {
        check_interrupt(interrupt)?;

        if native.is_none() && !part.is_marker() {
            debug!(part = index, name = %part.name, "part has no converted operand");
        }

        // A pushing part is the first operand of its own group
        let op = if part.stack_op == StackOp::Push {
            open.push(Frame {
                pending: part.operation,
                accumulator: None,
            });
            CsgOp::Union
        } else {
            part.operation
        };
        merge_into(kernel, top(&mut root, &mut open), native, op);

        if part.stack_op == StackOp::Pop {
            match open.pop() {
                Some(frame) => merge_into(kernel, top(&mut root, &mut open), frame.accumulator, frame.pending),
                None => warn!(part = index, name = %part.name, "pop without matching push ignored"),
            }
        }
    }

    if !open.is_empty() {
        warn!(unclosed = open.len(), "closing frames left open at end of sequence");
    }
    while let Some(frame) = open.pop() {
        check_interrupt(interrupt)?;
        merge_into(kernel, top(&mut root, &mut open), frame.accumulator, frame.pending);
    }

    Ok(root)
}

/// Runs conversion and reduction for a part sequence
#[derive(Clone, Default)]
pub struct Evaluator {
    threads: Option<usize>,
    interrupt: Option<Arc<InterruptFn>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CsgConfig) -> Self {
        Self {
            threads: config.threads,
            ..Self::default()
        }
    }

    /// Convert on a dedicated pool of `threads` workers
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Poll `interrupt` before each conversion and merge step
    pub fn with_interrupt(mut self, interrupt: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.interrupt = Some(Arc::new(interrupt));
        self
    }

    fn pool(&self) -> Result<Option<rayon::ThreadPool>> {
        self.threads
            .map(|n| ThreadPoolBuilder::new().num_threads(n).build())
            .transpose()
            .map_err(CsgError::from)
    }

    /// Evaluate `parts` with `kernel`; `None` means nothing was accumulated
    pub fn evaluate<K: CsgKernel>(&self, kernel: &K, parts: &[CsgPart<'_>]) -> Result<Option<K::Native>> {
        let pool = self.pool()?;
        self.run(kernel, parts, pool.as_ref())
    }

    /// Validate every part first, failing on the first invalid one
    pub fn evaluate_checked<K: CsgKernel>(&self, kernel: &K, parts: &[CsgPart<'_>]) -> Result<Option<K::Native>> {
        let pool = self.pool()?;
        match pool.as_ref() {
            Some(pool) => pool.install(|| validate(kernel, parts))?,
            None => validate(kernel, parts)?,
        }
        self.run(kernel, parts, pool.as_ref())
    }

    fn run<K: CsgKernel>(
        &self,
        kernel: &K,
        parts: &[CsgPart<'_>],
        pool: Option<&rayon::ThreadPool>,
    ) -> Result<Option<K::Native>> {
        debug!(kernel = kernel.name(), parts = parts.len(), threads = ?self.threads, "evaluating part sequence");
        let interrupt = self.interrupt.as_deref();

        let converted = convert_all(kernel, parts, pool, interrupt)?;
        let Some(result) = reduce_converted(kernel, parts, converted, interrupt)? else {
            return Ok(None);
        };
        guard(|| Ok(kernel.finalize(result))).map(Some)
    }
}

/// Best-effort evaluation on the global pool
///
/// Errors are logged and reported as an empty result.
pub fn reduce<K: CsgKernel>(kernel: &K, parts: &[CsgPart<'_>]) -> Option<K::Native> {
    Evaluator::new().evaluate(kernel, parts).unwrap_or_else(|err| {
        warn!(kernel = kernel.name(), error = %err, "evaluation failed");
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use crate::kernel::{VoxelGrid, VoxelKernel};
    use nalgebra::{Matrix4, Vector3};

    fn kernel() -> VoxelKernel {
        VoxelKernel::new(0.25)
    }

    fn cube() -> VoxelGrid {
        kernel().convert(&Primitive::unit_cube(), &Matrix4::identity()).unwrap()
    }

    #[test]
    fn test_absent_source_is_noop() {
        for op in [CsgOp::Union, CsgOp::Difference, CsgOp::Intersection] {
            let mut dst = Some(cube());
            merge_into(&kernel(), &mut dst, None, op);
            assert_eq!(dst, Some(cube()));
        }
    }

    #[test]
    fn test_absent_destination() {
        let mut dst = None;
        merge_into(&kernel(), &mut dst, Some(cube()), CsgOp::Difference);
        assert!(dst.is_none());

        merge_into(&kernel(), &mut dst, Some(cube()), CsgOp::Intersection);
        assert!(dst.is_none());

        merge_into(&kernel(), &mut dst, Some(cube()), CsgOp::Union);
        assert_eq!(dst, Some(cube()));
    }

    #[test]
    fn test_unmatched_pop_is_ignored() {
        let parts = vec![
            CsgPart::new(Primitive::unit_cube()),
            CsgPart::marker(CsgOp::Union, StackOp::Pop),
        ];
        assert_eq!(reduce(&kernel(), &parts), Some(cube()));
    }

    #[test]
    fn test_open_frames_close_at_end() {
        let far = Matrix4::new_translation(&Vector3::new(5.0, 0.0, 0.0));
        let parts = vec![
            CsgPart::new(Primitive::unit_cube()),
            CsgPart::new(Primitive::unit_cube())
                .with_transform(far)
                .with_operation(CsgOp::Difference)
                .with_stack_op(StackOp::Push),
        ];
        // The open group subtracts a disjoint cube
        assert_eq!(reduce(&kernel(), &parts), Some(cube()));
    }

    #[test]
    fn test_interrupt_aborts_evaluation() {
        let parts = vec![CsgPart::new(Primitive::unit_cube())];
        let result = Evaluator::new().with_interrupt(|| true).evaluate(&kernel(), &parts);
        assert!(matches!(result, Err(CsgError::Interrupted)));
    }
}
