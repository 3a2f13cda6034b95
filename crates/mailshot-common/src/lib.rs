//! Mailshot Common - Shared types and utilities
//!
//! This crate provides the configuration, error taxonomy and small value
//! types shared by every Mailshot component.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
