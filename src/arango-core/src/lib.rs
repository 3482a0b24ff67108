//! arango Core Library
//!
//! This crate provides the building blocks shared by the client, including:
//! - Document handles, edge directions and store records
//! - The error taxonomy
//! - Connection configuration
//! - The transport seam and its reqwest implementation
//! - Lazy resultsets
//! - Client-side graph analysis over fetched edges

pub mod config;
pub mod error;
pub mod graph;
pub mod models;
pub mod resultset;
pub mod transport;

// Re-export commonly used types
pub use config::ConnectionConfig;
pub use error::{Error, Result};
pub use graph::{EdgeGraph, GraphStatistics, ShortestPath};
pub use models::*;
pub use resultset::{ResultSource, Resultset};
pub use transport::{HttpTransport, Method, Request, Response, Transport};
