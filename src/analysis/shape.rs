//! Правила форм для входных данных метрик.

use ndarray::{ArrayViewD, Axis};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("Несовместимые формы для '{op}': {shape1:?} и {shape2:?}. \
             После удаления завершающей размерности длины 1 формы входов должны совпадать.")]
    IncompatibleShapes {
        op: String,
        shape1: Vec<usize>,
        shape2: Vec<usize>,
    },

    #[error("Неверный ранг для '{op}': ожидался {expected}D, получен {actual}D.")]
    InvalidRank {
        op: String,
        expected: usize,
        actual: usize,
    },

    #[error("Неверная ось {axis} для '{op}' при входе ранга {rank}.")]
    InvalidAxis {
        op: String,
        axis: usize,
        rank: usize,
    },
}

pub type Result<T> = std::result::Result<T, ShapeError>;

/// Applies the squeeze rule to a pair of arrays.
///
/// If one operand has rank exactly one greater than the other and its last
/// dimension is 1, that dimension is removed. Otherwise both views are
/// returned unchanged.
pub fn remove_squeezable_dimensions<'a, 'b, A, B>(
    lhs: ArrayViewD<'a, A>,
    rhs: ArrayViewD<'b, B>,
) -> (ArrayViewD<'a, A>, ArrayViewD<'b, B>) {
    let (lhs_rank, rhs_rank) = (lhs.ndim(), rhs.ndim());
    if lhs_rank == rhs_rank + 1 && lhs.shape().last() == Some(&1) {
        (lhs.index_axis_move(Axis(lhs_rank - 1), 0), rhs)
    } else if rhs_rank == lhs_rank + 1 && rhs.shape().last() == Some(&1) {
        (lhs, rhs.index_axis_move(Axis(rhs_rank - 1), 0))
    } else {
        (lhs, rhs)
    }
}

pub fn ensure_same_shape(op: &str, shape1: &[usize], shape2: &[usize]) -> Result<()> {
    if shape1 == shape2 {
        Ok(())
    } else {
        Err(ShapeError::IncompatibleShapes {
            op: op.to_string(),
            shape1: shape1.to_vec(),
            shape2: shape2.to_vec(),
        })
    }
}

pub fn ensure_rank(op: &str, shape: &[usize], expected: usize) -> Result<()> {
    if shape.len() == expected {
        Ok(())
    } else {
        Err(ShapeError::InvalidRank {
            op: op.to_string(),
            expected,
            actual: shape.len(),
        })
    }
}

pub fn ensure_axis(op: &str, axis: usize, rank: usize) -> Result<()> {
    if axis < rank {
        Ok(())
    } else {
        Err(ShapeError::InvalidAxis { op: op.to_string(), axis, rank })
    }
}

/// Squeezes `predictions` against `labels`, then requires identical shapes.
pub fn align<'a, 'b, A, B>(
    op: &str,
    predictions: ArrayViewD<'a, A>,
    labels: ArrayViewD<'b, B>,
) -> Result<(ArrayViewD<'a, A>, ArrayViewD<'b, B>)> {
    let (predictions, labels) = remove_squeezable_dimensions(predictions, labels);
    ensure_same_shape(op, predictions.shape(), labels.shape())?;
    Ok((predictions, labels))
}
