//! Terminal output helpers.

pub mod progress;
pub mod report;
