// Shared utility functions

pub mod filesystem;

pub use filesystem::{default_download_dir, ensure_dir, sanitize_filename};
