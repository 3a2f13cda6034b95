//! API request handlers

pub mod health;
pub mod logs;
pub mod messages;
pub mod recipients;
pub mod send;

pub use health::*;
