//! Warehouse routing and integration synchronization service.
//!
//! Connects e-commerce platforms (Shopify, WooCommerce, Etsy) and shipping
//! carriers (USPS, UPS) to one canonical order/product model. The pieces:
//!
//! - [`vault`] - per-account credential storage with redacted secrets
//! - [`integrations`] - platform adapters behind capability traits, built
//!   through a provider registry
//! - [`oauth`] - CSRF state coordination, callback signature checks, and
//!   authorization-code exchange
//! - [`sync`] - the orchestrator driving fetch, merge, and watermark
//!   bookkeeping with partial-failure tolerance
//! - [`merge`] - pure reconciliation policies (supplied-fields-win,
//!   customization-preserving)
//! - [`routing`] - warehouse resolution and census-region auto-assignment
//! - [`storage`] - engine-agnostic persistence trait with an in-memory
//!   implementation
//! - [`routes`] - the axum HTTP surface

pub mod config;
pub mod error;
pub mod integrations;
pub mod merge;
pub mod oauth;
pub mod routes;
pub mod routing;
pub mod state;
pub mod storage;
pub mod sync;
pub mod vault;
