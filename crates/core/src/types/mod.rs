//! Core types for Stockroom.
//!
//! This module provides type-safe wrappers for catalog concepts.

pub mod id;
pub mod product;
pub mod validation;

pub use id::*;
pub use product::{Product, ProductInput, filter_products, matches_search};
pub use validation::{Field, ValidationError, validate, violations};
