// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Parallel per-part conversion into kernel-native values

use super::CsgPart;
use crate::error::{CsgError, Result};
use crate::kernel::{guard, CsgKernel};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Caller-supplied "should evaluation stop" poll
pub type InterruptFn = dyn Fn() -> bool + Send + Sync;

/// Convert one part; failures become an absent operand
pub fn convert_part<K: CsgKernel>(kernel: &K, part: &CsgPart<'_>, index: usize) -> Option<K::Native> {
    let mesh = part.mesh()?;
    match guard(|| kernel.convert(mesh, &part.transform)) {
        Ok(native) => Some(native),
        Err(err) => {
            debug!(part = index, name = %part.name, kernel = kernel.name(), error = %err, "conversion failed, dropping operand");
            None
        }
    }
}

/// Convert every part in parallel, preserving sequence order
///
/// Runs on `pool` when given, otherwise on the global rayon pool. The
/// interrupt poll is checked before each part; once it fires the remaining
/// conversions are skipped and [`CsgError::Interrupted`] is returned.
pub fn convert_all<K: CsgKernel>(
    kernel: &K,
    parts: &[CsgPart<'_>],
    pool: Option<&rayon::ThreadPool>,
    interrupt: Option<&InterruptFn>,
) -> Result<Vec<Option<K::Native>>> {
    let stopped = AtomicBool::new(false);

    let run = || {
        parts
            .par_iter()
            .enumerate()
            .map(|(index, part)| {
                if stopped.load(Ordering::Relaxed) || interrupt.is_some_and(|f| f()) {
                    stopped.store(true, Ordering::Relaxed);
                    return None;
                }
                convert_part(kernel, part, index)
            })
            .collect::<Vec<_>>()
    };

    let converted = match pool {
        Some(pool) => pool.install(run),
        None => run(),
    };

    if stopped.load(Ordering::Relaxed) {
        return Err(CsgError::Interrupted);
    }
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csg::{CsgOp, StackOp};
    use crate::geometry::{Mesh, Primitive, Triangle};
    use crate::kernel::VoxelKernel;

    #[test]
    fn test_failed_and_marker_parts_are_absent() {
        let mut broken = Mesh::new();
        broken.add_triangle(Triangle::new([0, 1, 2]));

        let parts = vec![
            CsgPart::new(Primitive::unit_cube()),
            CsgPart::new(broken),
            CsgPart::marker(CsgOp::Union, StackOp::Pop),
        ];
        let converted = convert_all(&VoxelKernel::new(0.25), &parts, None, None).unwrap();

        assert!(converted[0].is_some());
        assert!(converted[1].is_none());
        assert!(converted[2].is_none());
    }

    #[test]
    fn test_interrupt_stops_conversion() {
        let parts = vec![CsgPart::new(Primitive::unit_cube())];
        let result = convert_all(&VoxelKernel::new(0.25), &parts, None, Some(&|| true));
        assert!(matches!(result, Err(CsgError::Interrupted)));
    }
}
