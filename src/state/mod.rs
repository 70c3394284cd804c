//! # Состояние аккумуляторов
//!
//! Долговременное числовое состояние, общее для всех метрик.
//!
//! ```text
//! metric constructor -> get_or_create(name, shape) -> AccumulatorHandle
//! metric update      -> increment_by(handle, delta)
//! metric value       -> read(handle)
//! ```
//!
//! Сброс и просмотр аккумуляторов выполняет владелец хранилища,
//! сами метрики этого никогда не делают.

pub mod store;

pub use store::{
    AccumulatorHandle, AccumulatorShape, AccumulatorSnapshot, AccumulatorStore, ScopeLock,
    StateError, StateResult,
};
