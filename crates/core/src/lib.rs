//! Orderflow Core - Shared types library.
//!
//! This crate provides the canonical data model used across all Orderflow
//! components:
//! - `server` - Integration sync and warehouse routing service
//! - `integration-tests` - Cross-module test suite
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, the canonical `Order`/`Product` model,
//!   integration records, and warehouse routing configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
