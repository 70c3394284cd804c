//! Модуль, определяющий абстрактный интерфейс (трейт) для исполнительной
//! среды массивов, в которой метрики выполняют поэлементные операции и редукции.
//!
//! Метрики никогда не обращаются к элементам массивов напрямую: каждое
//! сравнение, арифметическое преобразование и редукция проходит через
//! [`Backend`], поэтому логика накопления не зависит от движка массивов.

use ndarray::{ArrayD, ArrayView1, ArrayView2, ArrayViewD};
use std::fmt;
use thiserror::Error;

/// Ошибки, которые могут возникнуть при выполнении операции над массивами.
/// Этот тип ошибок является общим для всех бэкендов.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Операция '{op}' ожидала операнды одинаковой формы, получены {left:?} и {right:?}. Выровняйте массивы перед вызовом бэкенда.")]
    ShapeMismatch {
        op: &'static str,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    #[error("Операция '{op}' получила ось {axis} для массива ранга {rank}.")]
    AxisOutOfRange {
        op: &'static str,
        axis: usize,
        rank: usize,
    },

    #[error("Ошибка формы тензора: {0}. Проверьте размерности входных массивов.")]
    ShapeError(String),
}

/// Trait defining the array operations the metric engine relies on.
///
/// Binary operations never broadcast: operands must have identical shapes,
/// callers tile explicitly when they need a larger shape.
pub trait Backend: Send + Sync + fmt::Debug {
    /// Element-wise `lhs == rhs`.
    fn equal(&self, lhs: ArrayViewD<'_, f32>, rhs: ArrayViewD<'_, f32>) -> Result<ArrayD<bool>, RuntimeError>;

    /// Element-wise `operand == scalar`.
    fn equal_scalar(&self, operand: ArrayViewD<'_, f32>, scalar: f32) -> ArrayD<bool>;

    /// Element-wise `lhs > rhs`.
    fn greater(&self, lhs: ArrayViewD<'_, f32>, rhs: ArrayViewD<'_, f32>) -> Result<ArrayD<bool>, RuntimeError>;

    /// Element-wise `operand < scalar`.
    fn less_scalar(&self, operand: ArrayViewD<'_, f32>, scalar: f32) -> ArrayD<bool>;

    fn logical_and(&self, lhs: ArrayViewD<'_, bool>, rhs: ArrayViewD<'_, bool>) -> Result<ArrayD<bool>, RuntimeError>;

    fn logical_not(&self, operand: ArrayViewD<'_, bool>) -> ArrayD<bool>;

    /// `true` becomes `1.0`, `false` becomes `0.0`.
    fn cast_to_float(&self, operand: ArrayViewD<'_, bool>) -> ArrayD<f32>;

    /// Non-zero becomes `true`. `NaN` counts as non-zero.
    fn cast_to_bool(&self, operand: ArrayViewD<'_, f32>) -> ArrayD<bool>;

    fn subtract(&self, lhs: ArrayViewD<'_, f32>, rhs: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, RuntimeError>;

    fn multiply(&self, lhs: ArrayViewD<'_, f32>, rhs: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, RuntimeError>;

    /// Element-wise division. Division by zero follows IEEE semantics.
    fn divide(&self, lhs: ArrayViewD<'_, f32>, rhs: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, RuntimeError>;

    fn abs(&self, operand: ArrayViewD<'_, f32>) -> ArrayD<f32>;

    fn square(&self, operand: ArrayViewD<'_, f32>) -> ArrayD<f32>;

    fn sqrt(&self, operand: ArrayViewD<'_, f64>) -> ArrayD<f64>;

    /// Sum over all elements, accumulated in `f64`.
    fn reduce_sum(&self, operand: ArrayViewD<'_, f32>) -> f64;

    /// Sum along one axis. With `keep_dims` the reduced axis stays with length 1.
    fn reduce_sum_axis(
        &self,
        operand: ArrayViewD<'_, f32>,
        axis: usize,
        keep_dims: bool,
    ) -> Result<ArrayD<f32>, RuntimeError>;

    /// Reshapes to `shape`; the element count must not change.
    fn reshape(&self, operand: ArrayViewD<'_, f32>, shape: &[usize]) -> Result<ArrayD<f32>, RuntimeError>;

    /// Reverses the order of the axes.
    fn transpose(&self, operand: ArrayViewD<'_, f32>) -> ArrayD<f32>;

    /// Repeats the array `reps[i]` times along axis `i`.
    fn tile(&self, operand: ArrayViewD<'_, f32>, reps: &[usize]) -> Result<ArrayD<f32>, RuntimeError>;

    /// `num` evenly spaced values over `[start, stop]`, as a rank-1 array.
    fn linspace(&self, start: f32, stop: f32, num: usize) -> ArrayD<f32>;

    /// For each row of `predictions` (`[batch, classes]`), whether the score of
    /// class `targets[row]` is among the `k` largest of that row.
    ///
    /// Ties straddling the top-k boundary count as hits. Rows with a
    /// non-finite score and out-of-range targets are misses.
    fn in_top_k(
        &self,
        predictions: ArrayView2<'_, f32>,
        targets: ArrayView1<'_, i64>,
        k: usize,
    ) -> Result<ArrayD<bool>, RuntimeError>;
}
