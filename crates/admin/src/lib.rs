//! Stockroom admin library.
//!
//! This crate provides the admin functionality as a library,
//! allowing it to be tested and reused by the CLI.
//!
//! - [`catalog`]: remote catalog client, product list cache and the
//!   optimistic mutation coordinator
//! - [`routes`]: products page and JSON API
//! - [`notify`]: success/error notices raised by mutations

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod error;
pub mod notify;
pub mod routes;
pub mod state;
