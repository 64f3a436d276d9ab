//! Canvas API access.
//!
//! This module provides the HTTP client and paginated fetcher used by the
//! aggregation pipeline.

pub mod client;

pub use client::{CanvasClient, ClientConfig};
