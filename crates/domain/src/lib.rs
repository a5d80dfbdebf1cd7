//! Domain layer for the tutorials backend.
//!
//! This crate contains:
//! - The `Tutorial` model
//! - Request and response payloads with their validation rules

pub mod models;
