//! Domain layer for the percolator
//!
//! This module contains core business logic, domain models and ports.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, ErrorKind};
