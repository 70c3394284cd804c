//! CPU-реализация [`Backend`] поверх `ndarray`.
//!
//! Каждая операция соответствует одному примитиву `ndarray` (`Zip`, `mapv`,
//! `sum_axis`, ...). Формы проверяются заранее и возвращаются как
//! [`RuntimeError`], а не как паника внутри `ndarray`.

use super::backend::{Backend, RuntimeError};
use ndarray::{Array1, ArrayD, ArrayView1, ArrayView2, ArrayViewD, Axis, Dimension, IxDyn, Zip};

#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

fn ensure_same_shape(op: &'static str, lhs: &[usize], rhs: &[usize]) -> Result<(), RuntimeError> {
    if lhs == rhs {
        Ok(())
    } else {
        Err(RuntimeError::ShapeMismatch {
            op,
            left: lhs.to_vec(),
            right: rhs.to_vec(),
        })
    }
}

fn zip_map<A, B, C, F>(
    op: &'static str,
    lhs: ArrayViewD<'_, A>,
    rhs: ArrayViewD<'_, B>,
    f: F,
) -> Result<ArrayD<C>, RuntimeError>
where
    A: Copy,
    B: Copy,
    F: Fn(A, B) -> C,
{
    ensure_same_shape(op, lhs.shape(), rhs.shape())?;
    Ok(Zip::from(&lhs).and(&rhs).map_collect(|&a, &b| f(a, b)))
}

impl Backend for CpuBackend {
    fn equal(&self, lhs: ArrayViewD<'_, f32>, rhs: ArrayViewD<'_, f32>) -> Result<ArrayD<bool>, RuntimeError> {
        zip_map("equal", lhs, rhs, |a, b| a == b)
    }

    fn equal_scalar(&self, operand: ArrayViewD<'_, f32>, scalar: f32) -> ArrayD<bool> {
        operand.mapv(|x| x == scalar)
    }

    fn greater(&self, lhs: ArrayViewD<'_, f32>, rhs: ArrayViewD<'_, f32>) -> Result<ArrayD<bool>, RuntimeError> {
        zip_map("greater", lhs, rhs, |a, b| a > b)
    }

    fn less_scalar(&self, operand: ArrayViewD<'_, f32>, scalar: f32) -> ArrayD<bool> {
        operand.mapv(|x| x < scalar)
    }

    fn logical_and(&self, lhs: ArrayViewD<'_, bool>, rhs: ArrayViewD<'_, bool>) -> Result<ArrayD<bool>, RuntimeError> {
        zip_map("logical_and", lhs, rhs, |a, b| a && b)
    }

    fn logical_not(&self, operand: ArrayViewD<'_, bool>) -> ArrayD<bool> {
        operand.mapv(|x| !x)
    }

    fn cast_to_float(&self, operand: ArrayViewD<'_, bool>) -> ArrayD<f32> {
        operand.mapv(|x| if x { 1.0 } else { 0.0 })
    }

    fn cast_to_bool(&self, operand: ArrayViewD<'_, f32>) -> ArrayD<bool> {
        operand.mapv(|x| x != 0.0)
    }

    fn subtract(&self, lhs: ArrayViewD<'_, f32>, rhs: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, RuntimeError> {
        zip_map("subtract", lhs, rhs, |a, b| a - b)
    }

    fn multiply(&self, lhs: ArrayViewD<'_, f32>, rhs: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, RuntimeError> {
        zip_map("multiply", lhs, rhs, |a, b| a * b)
    }

    fn divide(&self, lhs: ArrayViewD<'_, f32>, rhs: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, RuntimeError> {
        zip_map("divide", lhs, rhs, |a, b| a / b)
    }

    fn abs(&self, operand: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        operand.mapv(f32::abs)
    }

    fn square(&self, operand: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        operand.mapv(|x| x * x)
    }

    fn sqrt(&self, operand: ArrayViewD<'_, f64>) -> ArrayD<f64> {
        operand.mapv(f64::sqrt)
    }

    fn reduce_sum(&self, operand: ArrayViewD<'_, f32>) -> f64 {
        operand.iter().map(|&x| x as f64).sum()
    }

    fn reduce_sum_axis(
        &self,
        operand: ArrayViewD<'_, f32>,
        axis: usize,
        keep_dims: bool,
    ) -> Result<ArrayD<f32>, RuntimeError> {
        if axis >= operand.ndim() {
            return Err(RuntimeError::AxisOutOfRange {
                op: "reduce_sum_axis",
                axis,
                rank: operand.ndim(),
            });
        }
        let summed = operand.sum_axis(Axis(axis));
        Ok(if keep_dims { summed.insert_axis(Axis(axis)) } else { summed })
    }

    fn reshape(&self, operand: ArrayViewD<'_, f32>, shape: &[usize]) -> Result<ArrayD<f32>, RuntimeError> {
        let reshaped = operand
            .to_shape(IxDyn(shape))
            .map_err(|e| RuntimeError::ShapeError(e.to_string()))?;
        Ok(reshaped.into_owned())
    }

    fn transpose(&self, operand: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        operand.reversed_axes().to_owned()
    }

    fn tile(&self, operand: ArrayViewD<'_, f32>, reps: &[usize]) -> Result<ArrayD<f32>, RuntimeError> {
        if reps.len() != operand.ndim() {
            return Err(RuntimeError::ShapeError(format!(
                "tile ожидает по одному повторению на ось: осей {}, повторений {}",
                operand.ndim(),
                reps.len()
            )));
        }
        let shape = operand.shape().to_vec();
        let tiled_shape: Vec<usize> = shape.iter().zip(reps).map(|(&dim, &rep)| dim * rep).collect();
        Ok(ArrayD::from_shape_fn(IxDyn(&tiled_shape), |index| {
            let source: Vec<usize> = index
                .slice()
                .iter()
                .zip(&shape)
                .map(|(&i, &dim)| i % dim)
                .collect();
            operand[IxDyn(&source)]
        }))
    }

    fn linspace(&self, start: f32, stop: f32, num: usize) -> ArrayD<f32> {
        Array1::linspace(start, stop, num).into_dyn()
    }

    fn in_top_k(
        &self,
        predictions: ArrayView2<'_, f32>,
        targets: ArrayView1<'_, i64>,
        k: usize,
    ) -> Result<ArrayD<bool>, RuntimeError> {
        let (batch, num_classes) = predictions.dim();
        ensure_same_shape("in_top_k", &[batch], targets.shape())?;

        let hits: Array1<bool> = predictions
            .outer_iter()
            .zip(targets.iter())
            .map(|(row, &target)| {
                let class = match usize::try_from(target) {
                    Ok(class) if class < num_classes => class,
                    _ => return false,
                };
                if row.iter().any(|score| !score.is_finite()) {
                    return false;
                }
                let target_score = row[class];
                let better = row.iter().filter(|&&score| score > target_score).count();
                better < k
            })
            .collect();
        Ok(hits.into_dyn())
    }
}
