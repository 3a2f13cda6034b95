//! Mailshot Storage - Database abstraction
//!
//! This crate provides the persisted state of the dispatcher (messages,
//! explicit recipients, delivery logs), read access to the contact-group
//! store, and an in-memory implementation of the same repositories.

pub mod db;
pub mod memory;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
pub use memory::InMemoryStore;
pub use models::*;
pub use repository::*;
