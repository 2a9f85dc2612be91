//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the Repository and JobQueue ports
//! - HTTP clients for the SearchIndex and Newsletter ports

pub mod duckdb;
pub mod http;
