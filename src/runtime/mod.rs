//! Модуль, содержащий исполнительные среды для операций над массивами.
//!
//! `backend` задаёт контракт, каждый другой подмодуль - одна его реализация.

pub mod backend;
pub mod cpu_backend;

pub use backend::{Backend, RuntimeError};
pub use cpu_backend::CpuBackend;
