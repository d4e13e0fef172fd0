//! Adapters for the gateway.
//!
//! Infrastructure implementations of the ports and error conversions.

pub mod error_conversions;
pub mod graph;

pub use graph::GraphClient;
