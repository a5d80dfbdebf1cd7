//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod tutorial;

pub use tutorial::TutorialEntity;
