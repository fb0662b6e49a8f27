//! Stockroom Core - Shared catalog types.
//!
//! This crate provides the types used across all Stockroom components:
//! - `admin` - Catalog admin server and the optimistic mutation coordinator
//! - `cli` - Command-line catalog management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no caches. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Product records, type-safe IDs, validation rules and search

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
