//! Shared utilities and common types for the tutorials backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Offset pagination math and the paged response envelope
//! - Common validation logic

pub mod pagination;
pub mod validation;
