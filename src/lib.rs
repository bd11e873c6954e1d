//! docsight host core
//!
//! The desktop application's host side: supervision of the bundled analysis
//! sidecar and bootstrap of the local SQLite store.

pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod error;
pub mod sidecar;
pub mod store;

pub use error::{Error, Result};
