//! Domain models for the tutorials backend.

pub mod tutorial;

pub use tutorial::{
    CreateTutorialRequest, ListTutorialsQuery, MessageResponse, NewTutorial, Tutorial,
    TutorialChanges, TutorialPageResponse, UpdateTutorialRequest,
};
