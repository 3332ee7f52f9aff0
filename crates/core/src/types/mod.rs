//! Canonical types for the Orderflow data model.

pub mod id;
pub mod integration;
pub mod order;
pub mod product;
pub mod status;
pub mod warehouse;

pub use id::*;
pub use integration::*;
pub use order::*;
pub use product::*;
pub use status::*;
pub use warehouse::*;
