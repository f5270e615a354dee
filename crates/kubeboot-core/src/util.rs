//! Common utility functions.

pub mod data;
pub mod fs;

// Re-export commonly used items
pub use data::{deep_merge, get_path};
pub use fs::{expand_path, slurp, file_exists, ensure_dir, write_atomic};
