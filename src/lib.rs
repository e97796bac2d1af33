//! Attribute rating and review aggregation.
//!
//! Accepts per-item rating and review submissions over HTTP and folds them
//! into JSON documents kept in a remote key-value field store.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod router;
pub mod server;
pub mod store;
