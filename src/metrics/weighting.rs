//! Приведение маски игнорирования и весов к единому виду.

use super::{MetricError, Result};
use crate::analysis::ensure_same_shape;
use crate::runtime::Backend;
use ndarray::{ArrayD, ArrayViewD};

/// Turns the two batch-filtering mechanisms into one optional weight array.
///
/// - mask: `true` means "ignore", so the weight is `!mask` as 0/1;
/// - weights: copied as given;
/// - neither: `None`, i.e. every element has weight 1.
///
/// Supplying both is an error, as is any shape other than `batch_shape`.
pub fn resolve_weights(
    backend: &dyn Backend,
    mask: Option<ArrayViewD<'_, bool>>,
    weights: Option<ArrayViewD<'_, f32>>,
    batch_shape: &[usize],
) -> Result<Option<ArrayD<f32>>> {
    match (mask, weights) {
        (Some(_), Some(_)) => Err(MetricError::ConflictingWeighting),
        (Some(mask), None) => {
            ensure_same_shape("ignore_mask", batch_shape, mask.shape())?;
            let keep = backend.logical_not(mask);
            Ok(Some(backend.cast_to_float(keep.view())))
        }
        (None, Some(weights)) => {
            ensure_same_shape("weights", batch_shape, weights.shape())?;
            Ok(Some(weights.to_owned()))
        }
        (None, None) => Ok(None),
    }
}
