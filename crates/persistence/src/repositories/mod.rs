//! Repository implementations for database operations.

pub mod tutorial;

pub use tutorial::{like_pattern, TutorialRepository, TutorialStatements};
