//! # Shape Analysis
//!
//! Checks that run on a batch before any accumulator is touched.
//!
//! ```text
//! predictions, labels -> squeeze rule -> identical shapes? -> metric update
//! ```
//!
//! The only reconciliation performed is the squeeze rule in
//! [`remove_squeezable_dimensions`](shape::remove_squeezable_dimensions):
//! when ranks differ by exactly one and the higher-rank operand ends in a
//! dimension of length 1, that dimension is dropped. Everything else must
//! already match; nothing is broadcast.

pub mod shape;

pub use shape::{align, ensure_axis, ensure_rank, ensure_same_shape, remove_squeezable_dimensions, ShapeError};
