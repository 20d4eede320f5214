// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Flat CSG expressions: data model, conversion, reduction and validation

mod convert;
mod evaluator;
mod part;
mod validate;

pub use convert::{convert_all, convert_part, InterruptFn};
pub use evaluator::{merge_into, reduce, reduce_converted, Evaluator};
pub use part::{copy_parts_deep, copy_parts_shallow, CsgOp, CsgPart, MeshRef, StackOp};
pub use validate::{check_part, validate, validate_all, FailReason, PartFailure, ValidationReport};
